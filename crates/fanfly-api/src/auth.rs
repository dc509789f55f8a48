use secrecy::{ExposeSecret, SecretString};

/// Credentials issued out-of-band by the vendor app.
///
/// Both values are opaque bearer secrets. They are held in memory only and
/// redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: SecretString,
    pub refresh_token: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }

    /// `true` when either secret is empty after trimming whitespace.
    pub fn is_incomplete(&self) -> bool {
        self.api_key.expose_secret().trim().is_empty()
            || self.refresh_token.expose_secret().trim().is_empty()
    }
}

/// Short-lived token obtained by exchanging a refresh token.
///
/// `expires_in` is whatever the server declared; nothing refreshes the
/// token pre-emptively.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: SecretString,
    pub expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            expires_in,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.secret.expose_secret().is_empty()
    }
}
