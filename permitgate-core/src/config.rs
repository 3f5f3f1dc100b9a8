//! Gate configuration.
//!
//! Implements: REQ-CFG-001
//!
//! One immutable `GateConfig` value is constructed at process start (from
//! defaults, a builder chain, or the environment) and passed by reference
//! into every component constructor. There is no ambient global state: a
//! component that needs a knob receives it here.

use std::path::PathBuf;
use std::time::Duration;

/// Immutable gate configuration.
///
/// Implements: REQ-CFG-001
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Directory holding the audit ledger, permit log, and receipts.
    pub data_dir: PathBuf,
    /// Policy document path. `None` selects the embedded default document.
    pub policy_path: Option<PathBuf>,
    /// Permit time-to-live from issuance.
    pub permit_ttl: Duration,
    /// Ledger HMAC signing secret. Required in strict mode unless
    /// `allow_unsigned` is set.
    pub ledger_secret: Option<String>,
    /// Strict mode: refuse to run an unsigned ledger.
    pub strict: bool,
    /// Explicitly allow unsigned ledger entries in strict mode.
    pub allow_unsigned: bool,
    /// Use the simulated notarization backend.
    pub notary_simulate: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            policy_path: None,
            permit_ttl: Duration::from_secs(300),
            ledger_secret: None,
            strict: true,
            allow_unsigned: false,
            notary_simulate: true,
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables.
    ///
    /// Implements: REQ-CFG-001
    ///
    /// # Environment Variables
    ///
    /// - `PERMITGATE_DATA_DIR` - Data directory (default: `data`)
    /// - `PERMITGATE_POLICY_FILE` - Policy document path (default: embedded)
    /// - `PERMITGATE_PERMIT_TTL_SECS` - Permit TTL in seconds (default: 300)
    /// - `PERMITGATE_LEDGER_SECRET` - HMAC secret for ledger signatures
    /// - `PERMITGATE_STRICT` - "0" disables strict mode (default: "1")
    /// - `PERMITGATE_ALLOW_UNSIGNED` - "1" permits an unsigned ledger in
    ///   strict mode (default: "0")
    /// - `PERMITGATE_NOTARY_SIMULATE` - "0" selects a real backend wired by
    ///   the embedder (default: "1")
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("PERMITGATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let policy_path = std::env::var("PERMITGATE_POLICY_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let permit_ttl = std::env::var("PERMITGATE_PERMIT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.permit_ttl);

        let ledger_secret = std::env::var("PERMITGATE_LEDGER_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let strict = std::env::var("PERMITGATE_STRICT")
            .map(|s| s != "0")
            .unwrap_or(defaults.strict);

        let allow_unsigned = std::env::var("PERMITGATE_ALLOW_UNSIGNED")
            .map(|s| s == "1")
            .unwrap_or(defaults.allow_unsigned);

        let notary_simulate = std::env::var("PERMITGATE_NOTARY_SIMULATE")
            .map(|s| s != "0")
            .unwrap_or(defaults.notary_simulate);

        Self {
            data_dir,
            policy_path,
            permit_ttl,
            ledger_secret,
            strict,
            allow_unsigned,
            notary_simulate,
        }
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the policy document path.
    #[must_use]
    pub fn with_policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_path = Some(path.into());
        self
    }

    /// Sets the permit TTL.
    #[must_use]
    pub fn with_permit_ttl(mut self, ttl: Duration) -> Self {
        self.permit_ttl = ttl;
        self
    }

    /// Sets the ledger signing secret.
    #[must_use]
    pub fn with_ledger_secret(mut self, secret: impl Into<String>) -> Self {
        self.ledger_secret = Some(secret.into());
        self
    }

    /// Enables or disables strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Explicitly allows unsigned ledger entries in strict mode.
    #[must_use]
    pub fn with_allow_unsigned(mut self, allow: bool) -> Self {
        self.allow_unsigned = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_fail_closed() {
        let config = GateConfig::default();
        assert!(config.strict);
        assert!(!config.allow_unsigned);
        assert_eq!(config.permit_ttl, Duration::from_secs(300));
        assert!(config.notary_simulate);
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        unsafe {
            std::env::set_var("PERMITGATE_DATA_DIR", "/tmp/gate-data");
            std::env::set_var("PERMITGATE_PERMIT_TTL_SECS", "42");
            std::env::set_var("PERMITGATE_LEDGER_SECRET", "s3cret");
            std::env::set_var("PERMITGATE_STRICT", "0");
        }

        let config = GateConfig::from_env();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/gate-data"));
        assert_eq!(config.permit_ttl, Duration::from_secs(42));
        assert_eq!(config.ledger_secret.as_deref(), Some("s3cret"));
        assert!(!config.strict);

        unsafe {
            std::env::remove_var("PERMITGATE_DATA_DIR");
            std::env::remove_var("PERMITGATE_PERMIT_TTL_SECS");
            std::env::remove_var("PERMITGATE_LEDGER_SECRET");
            std::env::remove_var("PERMITGATE_STRICT");
        }
    }

    #[test]
    #[serial]
    fn from_env_ignores_malformed_ttl() {
        unsafe {
            std::env::set_var("PERMITGATE_PERMIT_TTL_SECS", "not-a-number");
        }
        let config = GateConfig::from_env();
        assert_eq!(config.permit_ttl, Duration::from_secs(300));
        unsafe {
            std::env::remove_var("PERMITGATE_PERMIT_TTL_SECS");
        }
    }

    #[test]
    fn builder_chain() {
        let config = GateConfig::default()
            .with_data_dir("/var/lib/permitgate")
            .with_ledger_secret("k")
            .with_permit_ttl(Duration::from_secs(60))
            .with_strict(false);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/permitgate"));
        assert_eq!(config.ledger_secret.as_deref(), Some("k"));
        assert!(!config.strict);
    }
}
