//! SmartAPI request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::error::{AngelOneError, AngelOneResult};
use crate::{Candle, Interval};

/// Envelope every SmartAPI endpoint responds with
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "errorcode")]
    pub error_code: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Unwrap `data`, turning a failed envelope into an API error
    pub fn into_data(self) -> AngelOneResult<T> {
        if !self.status {
            return Err(AngelOneError::Api(format!(
                "{} (errorcode: {})",
                self.message, self.error_code
            )));
        }
        self.data
            .ok_or_else(|| AngelOneError::Parse(format!("response has no data: {}", self.message)))
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub clientcode: &'a str,
    pub password: &'a str,
    pub totp: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub jwt_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub feed_token: String,
}

#[derive(Debug, Serialize)]
pub struct CandleRequest<'a> {
    pub exchange: &'a str,
    pub symboltoken: &'a str,
    pub interval: Interval,
    pub fromdate: String,
    pub todate: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutRequest<'a> {
    pub clientcode: &'a str,
}

/// Parse the `data` field of a getCandleData response.
///
/// The payload must be a list of `[timestamp, open, high, low, close, volume]`
/// rows; anything else is a parse error. Rows that are well-formed but fail
/// candle validation are skipped with a warning.
pub fn parse_candle_rows(token: &str, data: &Value) -> AngelOneResult<Vec<Candle>> {
    let rows = data
        .as_array()
        .ok_or_else(|| AngelOneError::Parse(format!("Unexpected response format: {}", data)))?;

    let mut candles = Vec::with_capacity(rows.len());
    let mut invalid_count = 0;

    for (row_idx, row) in rows.iter().enumerate() {
        let fields = row
            .as_array()
            .filter(|f| f.len() >= 6)
            .ok_or_else(|| AngelOneError::Parse(format!("row {} is not a candle: {}", row_idx, row)))?;

        let datetime = fields[0]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                AngelOneError::Parse(format!("row {} has bad timestamp: {}", row_idx, fields[0]))
            })?;

        let price = |i: usize| {
            fields[i].as_f64().ok_or_else(|| {
                AngelOneError::Parse(format!("row {} field {} is not a number", row_idx, i))
            })
        };
        let volume = fields[5]
            .as_u64()
            .or_else(|| fields[5].as_f64().filter(|v| *v >= 0.0).map(|v| v.round() as u64))
            .ok_or_else(|| AngelOneError::Parse(format!("row {} has bad volume", row_idx)))?;

        match Candle::new(datetime, price(1)?, price(2)?, price(3)?, price(4)?, volume) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                invalid_count += 1;
                warn!("Skipping invalid candle at row {} for token {}: {}", row_idx, token, e);
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            "Skipped {} invalid candles out of {} for token {}",
            invalid_count,
            invalid_count + candles.len(),
            token
        );
    }

    Ok(candles)
}
