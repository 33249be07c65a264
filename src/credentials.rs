//! API key gate.
//!
//! The check is purely syntactic: a key is accepted when it starts with the
//! provider's prefix. No request is made to the provider. Outbound clients
//! take an [`ApiKey`], which can only be obtained through the gate, so a
//! rejected key never reaches the network.

use std::fmt;

use tracing::{info, warn};

use crate::error::{Error, Result};

/// Prefix carried by provider-issued secret keys.
pub const DEFAULT_KEY_PREFIX: &str = "sk-";

/// Returns `true` if `key` starts with the default provider prefix.
pub fn is_valid_key(key: &str) -> bool {
    CredentialGate::default().is_valid(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Valid,
    Invalid,
}

impl KeyStatus {
    pub fn message(self) -> &'static str {
        match self {
            KeyStatus::Valid => "Valid API Key",
            KeyStatus::Invalid => "Invalid API Key",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialGate {
    prefix: String,
}

impl Default for CredentialGate {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl CredentialGate {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_valid(&self, key: &str) -> bool {
        !key.is_empty() && key.starts_with(&self.prefix)
    }

    /// Checks a key and logs the outcome.
    pub fn check(&self, key: &str) -> KeyStatus {
        if self.is_valid(key) {
            info!("{}", KeyStatus::Valid.message());
            KeyStatus::Valid
        } else {
            warn!("{}", KeyStatus::Invalid.message());
            KeyStatus::Invalid
        }
    }
}

/// A key that passed the [`CredentialGate`]. Held in memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn parse(raw: &str, gate: &CredentialGate) -> Result<Self> {
        let trimmed = raw.trim();
        if gate.is_valid(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(Error::InvalidCredential(format!(
                "expected a key starting with '{}'",
                gate.prefix()
            )))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_prefixed_key() {
        assert!(is_valid_key("sk-abc123"));
        assert!(is_valid_key("sk-"));
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("s"));
        assert!(!is_valid_key("pk-abc"));
        assert!(!is_valid_key(" sk-abc"));
        assert!(!is_valid_key("SK-abc"));
    }

    #[test]
    fn check_reports_status() {
        let gate = CredentialGate::default();
        assert_eq!(gate.check("sk-x"), KeyStatus::Valid);
        assert_eq!(gate.check("nope"), KeyStatus::Invalid);
        assert_eq!(KeyStatus::Invalid.message(), "Invalid API Key");
    }

    #[test]
    fn custom_prefix() {
        let gate = CredentialGate::new("gsk_");
        assert!(gate.is_valid("gsk_123"));
        assert!(!gate.is_valid("sk-123"));
    }

    #[test]
    fn parse_trims_and_redacts() {
        let gate = CredentialGate::default();
        let key = ApiKey::parse("  sk-secret \n", &gate).unwrap();
        assert_eq!(key.expose(), "sk-secret");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
    }

    #[test]
    fn parse_rejects_invalid() {
        let gate = CredentialGate::default();
        let err = ApiKey::parse("hello", &gate).unwrap_err();
        assert!(matches!(err, Error::InvalidCredential(_)));
    }
}
