//! Authentication for the Riot API.
//!
//! Every request carries the application key in the `X-Riot-Token` header.
//! The key is held as a [`secrecy::SecretString`] and redacted from debug output.

mod api_key;

pub use api_key::{API_KEY_ENV, ApiKey, ApiKeyProvider};

/// Header carrying the API key.
pub const RIOT_TOKEN_HEADER: &str = "X-Riot-Token";
