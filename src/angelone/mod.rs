//! Angel One SmartAPI integration
//!
//! Blocking client for the SmartAPI REST endpoints the scanner needs:
//! password + TOTP login, historical candles, and logout.

pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use auth::{generate_totp, Credentials};
pub use client::{AngelOneClient, ClientConfig};
pub use error::{AngelOneError, AngelOneResult};
pub use types::*;

pub const API_BASE_URL: &str = "https://apiconnect.angelone.in";

/// Wire format for `fromdate` / `todate`
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
