//! Credentials and TOTP generation for SmartAPI login

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::error::{AngelOneError, AngelOneResult};

type HmacSha1 = Hmac<Sha1>;

const TOTP_STEP_SECS: u64 = 30;
const TOTP_DIGITS: u32 = 6;

#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub client_id: String,
    pub pin: String,
    /// Base32 TOTP seed shown when 2FA was enabled on the account
    pub totp_secret: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        client_id: impl Into<String>,
        pin: impl Into<String>,
        totp_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            client_id: client_id.into(),
            pin: pin.into(),
            totp_secret: totp_secret.into(),
        }
    }

    /// Names of the fields that are still empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("api_key");
        }
        if self.client_id.is_empty() {
            missing.push("client_id");
        }
        if self.pin.is_empty() {
            missing.push("pin");
        }
        if self.totp_secret.is_empty() {
            missing.push("totp_secret");
        }
        missing
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("client_id", &self.client_id)
            .field("pin", &"***")
            .field("totp_secret", &"***")
            .finish()
    }
}

/// RFC 6238 TOTP (HMAC-SHA1, 30 second step, 6 digits) for a unix timestamp
pub fn generate_totp(secret_base32: &str, unix_secs: u64) -> AngelOneResult<String> {
    let key = decode_base32(secret_base32)?;
    let counter = unix_secs / TOTP_STEP_SECS;

    let mut mac = HmacSha1::new_from_slice(&key)
        .map_err(|e| AngelOneError::Auth(format!("invalid TOTP key: {}", e)))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(TOTP_DIGITS);

    Ok(format!("{:0width$}", code, width = TOTP_DIGITS as usize))
}

/// RFC 4648 base32, case-insensitive, ignoring padding and whitespace
fn decode_base32(input: &str) -> AngelOneResult<Vec<u8>> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.is_empty() {
        return Err(AngelOneError::Auth("empty TOTP secret".to_string()));
    }

    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| AngelOneError::Auth(format!("invalid base32 TOTP secret: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ASCII "12345678901234567890", the RFC 6238 SHA1 test key
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_totp_rfc6238_vectors() {
        assert_eq!(generate_totp(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(generate_totp(RFC_SECRET, 1_111_111_109).unwrap(), "081804");
        assert_eq!(generate_totp(RFC_SECRET, 1_234_567_890).unwrap(), "005924");
    }

    #[test]
    fn test_base32_is_case_and_padding_insensitive() {
        let upper = decode_base32("MZXW6===").unwrap();
        let lower = decode_base32("mzxw 6").unwrap();
        assert_eq!(upper, b"foo".to_vec());
        assert_eq!(lower, upper);

        let rfc_key = decode_base32(&RFC_SECRET.to_lowercase()).unwrap();
        assert_eq!(rfc_key, b"12345678901234567890".to_vec());
    }

    #[test]
    fn test_invalid_secret_is_an_auth_error() {
        assert!(matches!(
            generate_totp("not-base32!", 0),
            Err(AngelOneError::Auth(_))
        ));
        assert!(generate_totp("", 0).is_err());
    }

    #[test]
    fn test_missing_fields_and_redacted_debug() {
        let creds = Credentials::new("key", "", "1234", "");
        assert_eq!(creds.missing_fields(), vec!["client_id", "totp_secret"]);

        let debug = format!("{:?}", creds);
        assert!(!debug.contains("1234"));
    }
}
