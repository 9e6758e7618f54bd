//! Angel One SmartAPI client
//!
//! Blocking HTTP client. Pacing and retries are the scanner's job; this
//! client makes exactly one request per call.

use chrono::{NaiveDateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::{generate_totp, Credentials};
use super::error::{AngelOneError, AngelOneResult};
use super::types::*;
use super::{API_BASE_URL, DATE_FORMAT};
use crate::scanner::{FetchError, FetchOutcome, HistoricalFetcher};
use crate::{Candle, CandleSeries, Interval};

const LOGIN_PATH: &str = "/rest/auth/angelbroking/user/v1/loginByPassword";
const CANDLE_PATH: &str = "/rest/secure/angelbroking/historical/v1/getCandleData";
const LOGOUT_PATH: &str = "/rest/secure/angelbroking/user/v1/logout";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Exchange segment for candle requests
    pub exchange: String,
    pub local_ip: String,
    pub public_ip: String,
    pub mac_address: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            exchange: "NSE".to_string(),
            local_ip: "127.0.0.1".to_string(),
            public_ip: "127.0.0.1".to_string(),
            mac_address: "00:00:00:00:00:00".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }
}

pub struct AngelOneClient {
    client: Client,
    credentials: Credentials,
    config: ClientConfig,
    session: Option<SessionTokens>,
}

impl AngelOneClient {
    pub fn new(credentials: Credentials) -> AngelOneResult<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    pub fn with_config(credentials: Credentials, config: ClientConfig) -> AngelOneResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            credentials,
            config,
            session: None,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn feed_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.feed_token.as_str())
    }

    /// Log in with client code, PIN and a freshly generated TOTP
    pub fn connect(&mut self) -> AngelOneResult<()> {
        let missing = self.credentials.missing_fields();
        if !missing.is_empty() {
            return Err(AngelOneError::Auth(format!(
                "missing credentials: {}",
                missing.join(", ")
            )));
        }

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let totp = generate_totp(&self.credentials.totp_secret, now)?;
        let body = LoginRequest {
            clientcode: &self.credentials.client_id,
            password: &self.credentials.pin,
            totp: &totp,
        };

        let tokens: SessionTokens = self.post(LOGIN_PATH, &body, false)?;
        self.session = Some(tokens);
        info!("Successfully connected to Angel One API");
        Ok(())
    }

    /// Fetch historical candles for an instrument token
    ///
    /// An empty list means upstream has no data for the window.
    pub fn get_candle_data(
        &self,
        symbol_token: &str,
        interval: Interval,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AngelOneResult<Vec<Candle>> {
        let body = CandleRequest {
            exchange: &self.config.exchange,
            symboltoken: symbol_token,
            interval,
            fromdate: from.format(DATE_FORMAT).to_string(),
            todate: to.format(DATE_FORMAT).to_string(),
        };

        let data: Value = self.post(CANDLE_PATH, &body, true)?;
        parse_candle_rows(symbol_token, &data)
    }

    /// Terminate the session. Safe to call when not connected.
    pub fn close(&mut self) {
        if self.session.is_some() {
            let body = LogoutRequest {
                clientcode: &self.credentials.client_id,
            };
            if let Err(e) = self.post::<Value, _>(LOGOUT_PATH, &body, true) {
                warn!("Logout failed: {}", e);
            }
            self.session = None;
        }
        info!("Closed AngelOne connection");
    }

    fn request(&self, path: &str, authorized: bool) -> AngelOneResult<RequestBuilder> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-UserType", "USER")
            .header("X-SourceID", "WEB")
            .header("X-ClientLocalIP", &self.config.local_ip)
            .header("X-ClientPublicIP", &self.config.public_ip)
            .header("X-MACAddress", &self.config.mac_address)
            .header("X-PrivateKey", &self.credentials.api_key);

        if authorized {
            let session = self.session.as_ref().ok_or(AngelOneError::NotConnected)?;
            builder = builder.bearer_auth(&session.jwt_token);
        }

        Ok(builder)
    }

    fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        authorized: bool,
    ) -> AngelOneResult<T> {
        let response = self.request(path, authorized)?.json(body).send()?;
        let status = response.status();
        debug!("POST {} -> {}", path, status);

        if !status.is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AngelOneError::Api(format!("{}: {}", status, error_text)));
        }

        let envelope: ApiResponse<T> = response
            .json()
            .map_err(|e| AngelOneError::Parse(e.to_string()))?;
        envelope.into_data()
    }
}

impl HistoricalFetcher for AngelOneClient {
    fn fetch(
        &self,
        token: &str,
        interval: Interval,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<FetchOutcome, FetchError> {
        let candles = self.get_candle_data(token, interval, from, to)?;
        if candles.is_empty() {
            warn!("No data returned for symbol token {}", token);
            return Ok(FetchOutcome::NoData);
        }
        Ok(FetchOutcome::Candles(CandleSeries::new(candles)))
    }
}

impl Drop for AngelOneClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.close();
        }
    }
}
