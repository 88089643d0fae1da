//! Bot identity
//!
//! Wraps the `nostr_sdk::Keys` derived from the configured secret. The secret
//! never leaves this module in any printable form: `Identity` implements
//! `Debug` by hand and only exposes the public half.

use nostr_sdk::{FromBech32, Keys, PublicKey, ToBech32};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, Result};

/// Base URL used to link identities from the status page
pub const PROFILE_BASE_URL: &str = "https://njump.me";

pub struct Identity {
    keys: Keys,
    npub: String,
}

impl Identity {
    /// Derive the identity from a 64-character hex secret or a bech32 `nsec`
    pub fn from_secret(secret: &SecretString) -> Result<Self> {
        let key_str = secret.expose_secret().trim();

        if key_str.is_empty() {
            return Err(ConfigError::MissingField("PRIVATE_KEY_NSEC".to_string()).into());
        }

        let keys = if key_str.len() == 64 || key_str.starts_with("nsec") {
            // The parse error never echoes the input
            Keys::parse(key_str).map_err(|e| ConfigError::InvalidKey(e.to_string()))?
        } else {
            return Err(ConfigError::InvalidKey(
                "key must be 64-character hex or bech32 nsec format".to_string(),
            )
            .into());
        };

        Ok(Self::from_keys(keys))
    }

    pub fn from_keys(keys: Keys) -> Self {
        let public_key = keys.public_key();
        let npub = encode_npub(&public_key);
        Self { keys, npub }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub fn npub(&self) -> &str {
        &self.npub
    }

    pub fn public_key_hex(&self) -> String {
        self.keys.public_key().to_hex()
    }

    /// Link to the bot's public profile
    pub fn profile_url(&self) -> String {
        profile_url(&self.npub)
    }

    pub(crate) fn keys(&self) -> &Keys {
        &self.keys
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("npub", &self.npub)
            .finish_non_exhaustive()
    }
}

/// Parse a public identity given as `npub…` or 64-character hex
pub fn parse_public_key(input: &str) -> std::result::Result<PublicKey, ConfigError> {
    let input = input.trim();
    let parsed = if input.starts_with("npub") {
        PublicKey::from_bech32(input).map_err(|e| e.to_string())
    } else {
        PublicKey::from_hex(input).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| ConfigError::invalid("AUTHOR_NPUB", reason))
}

pub fn encode_npub(public_key: &PublicKey) -> String {
    public_key
        .to_bech32()
        .unwrap_or_else(|_| public_key.to_hex())
}

pub fn profile_url(npub: &str) -> String {
    format!("{}/{}", PROFILE_BASE_URL, npub)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn test_identity_from_hex_and_nsec_match() {
        let keys = Keys::generate();
        let hex = keys.secret_key().to_secret_hex();
        let nsec = keys.secret_key().to_bech32().unwrap();

        let from_hex = Identity::from_secret(&secret(&hex)).unwrap();
        let from_nsec = Identity::from_secret(&secret(&nsec)).unwrap();

        assert_eq!(from_hex.public_key(), keys.public_key());
        assert_eq!(from_hex.npub(), from_nsec.npub());
        assert!(from_hex.npub().starts_with("npub1"));
    }

    #[test]
    fn test_identity_rejects_garbage() {
        let result = Identity::from_secret(&secret("not-a-key"));
        assert!(matches!(
            result,
            Err(crate::GmcastError::Config(ConfigError::InvalidKey(_)))
        ));
    }

    #[test]
    fn test_identity_rejects_empty_secret() {
        let result = Identity::from_secret(&secret("   "));
        assert!(matches!(
            result,
            Err(crate::GmcastError::Config(ConfigError::MissingField(_)))
        ));
    }

    #[test]
    fn test_identity_rejects_corrupted_nsec() {
        let keys = Keys::generate();
        let mut nsec = keys.secret_key().to_bech32().unwrap();
        let last = nsec.pop().unwrap();
        nsec.push(if last == 'q' { 'p' } else { 'q' });

        assert!(Identity::from_secret(&secret(&nsec)).is_err());
    }

    #[test]
    fn test_debug_output_hides_secret() {
        let keys = Keys::generate();
        let hex = keys.secret_key().to_secret_hex();
        let identity = Identity::from_secret(&secret(&hex)).unwrap();

        let debug = format!("{:?}", identity);
        assert!(!debug.contains(&hex));
        assert!(debug.contains(identity.npub()));
    }

    #[test]
    fn test_parse_public_key_accepts_npub_and_hex() {
        let keys = Keys::generate();
        let npub = keys.public_key().to_bech32().unwrap();
        let hex = keys.public_key().to_hex();

        assert_eq!(parse_public_key(&npub).unwrap(), keys.public_key());
        assert_eq!(parse_public_key(&hex).unwrap(), keys.public_key());
        assert!(parse_public_key("npub1nope").is_err());
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(profile_url("npub1abc"), "https://njump.me/npub1abc");
    }
}
