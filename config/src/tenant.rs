//! Tenant configuration types, TOML loading, and policy hashing.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use attest_types::TenantId;

fn default_pass_threshold() -> f64 {
    0.7
}

fn default_training_attempts() -> u32 {
    3
}

/// Pass/fail policy for training sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPolicy {
    /// Aggregate score at or above this passes.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// Total attempts (initial + remediations) before exhaustion.
    #[serde(default = "default_training_attempts")]
    pub max_attempts: u32,
}

impl Default for TrainingPolicy {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            max_attempts: default_training_attempts(),
        }
    }
}

fn default_upload_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    5_000
}

fn default_max_delay_ms() -> u64 {
    300_000
}

/// Retry envelope for compliance uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_upload_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_upload_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// A platform credential. Displayed and debugged redacted so it cannot leak
/// through logs or error chains.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The secret value, for request construction only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Tenant's compliance integration, absent when none is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSettings {
    /// Stable provider key, matched against the provider registry.
    pub provider: String,
    pub credential: Credential,
    /// Platform-side destination (workspace, folder, account id).
    pub target: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Full configuration snapshot for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub display_name: String,
    pub app_version: String,
    #[serde(default)]
    pub training: TrainingPolicy,
    #[serde(default)]
    pub compliance: Option<ComplianceSettings>,
}

/// Hash of the policy-bearing configuration fields, used to bind evidence
/// records to the exact policy in force.
///
/// The digest is computed over a canonical (sorted-key) JSON rendering of
/// the training policy and app version; credentials and delivery settings
/// do not participate. 64 lowercase hex chars.
#[must_use]
pub fn policy_hash(config: &TenantConfig) -> String {
    #[derive(Serialize)]
    struct PolicyFields<'a> {
        app_version: &'a str,
        pass_threshold: f64,
        max_attempts: u32,
    }

    let fields = PolicyFields {
        app_version: &config.app_version,
        pass_threshold: config.training.pass_threshold,
        max_attempts: config.training.max_attempts,
    };
    // serde_json maps sort keys, so the rendering is insertion-order
    // independent and reproducible.
    let value = serde_json::to_value(&fields).unwrap_or_default();
    let canonical = value.to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration for tenant '{0}'")]
    UnknownTenant(TenantId),

    #[error("invalid tenant id '{0}' for file lookup")]
    InvalidTenantId(TenantId),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Capability interface for resolving a tenant's configuration snapshot.
pub trait ConfigProvider: Send + Sync {
    fn tenant_config(&self, tenant: &TenantId) -> Result<TenantConfig, ConfigError>;
}

/// Loads `<root>/<tenant>.toml` on each lookup.
pub struct TomlConfigProvider {
    root: PathBuf,
}

impl TomlConfigProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn tenant_path(&self, tenant: &TenantId) -> Result<PathBuf, ConfigError> {
        let raw = tenant.as_str();
        // Tenant ids become file names; anything that could escape the
        // config root is rejected up front.
        let safe = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(ConfigError::InvalidTenantId(tenant.clone()));
        }
        Ok(self.root.join(format!("{raw}.toml")))
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn tenant_config(&self, tenant: &TenantId) -> Result<TenantConfig, ConfigError> {
        let path = self.tenant_path(tenant)?;
        if !path.exists() {
            return Err(ConfigError::UnknownTenant(tenant.clone()));
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: TenantConfig =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
        tracing::debug!(tenant = %tenant, "loaded tenant configuration");
        Ok(config)
    }
}

/// In-memory provider for tests and embedded setups.
#[derive(Default)]
pub struct StaticConfigProvider {
    configs: HashMap<TenantId, TenantConfig>,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: TenantId, config: TenantConfig) -> Self {
        self.configs.insert(tenant, config);
        self
    }

    pub fn insert(&mut self, tenant: TenantId, config: TenantConfig) {
        self.configs.insert(tenant, config);
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn tenant_config(&self, tenant: &TenantId) -> Result<TenantConfig, ConfigError> {
        self.configs
            .get(tenant)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTenant(tenant.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_config() -> TenantConfig {
        TenantConfig {
            display_name: "Acme Logistics".to_owned(),
            app_version: "1.4.0".to_owned(),
            training: TrainingPolicy::default(),
            compliance: Some(ComplianceSettings {
                provider: "veridesk".to_owned(),
                credential: Credential::new("vd_live_secret"),
                target: "acme-workspace".to_owned(),
                retry: RetryPolicy::default(),
            }),
        }
    }

    #[test]
    fn training_policy_defaults() {
        let policy = TrainingPolicy::default();
        assert_eq!(policy.pass_threshold, 0.7);
        assert_eq!(policy.max_attempts, 3);
    }

    #[test]
    fn retry_policy_defaults() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay_ms, 5_000);
        assert_eq!(retry.max_delay_ms, 300_000);
    }

    #[test]
    fn toml_defaults_fill_missing_sections() {
        let config: TenantConfig = toml::from_str(
            r#"
            display_name = "Acme"
            app_version = "1.0.0"
            "#,
        )
        .unwrap();
        assert_eq!(config.training.pass_threshold, 0.7);
        assert_eq!(config.training.max_attempts, 3);
        assert!(config.compliance.is_none());
    }

    #[test]
    fn toml_parses_compliance_with_default_retry() {
        let config: TenantConfig = toml::from_str(
            r#"
            display_name = "Acme"
            app_version = "1.0.0"

            [compliance]
            provider = "complyline"
            credential = "cl_key"
            target = "dock-7"
            "#,
        )
        .unwrap();
        let compliance = config.compliance.unwrap();
        assert_eq!(compliance.provider, "complyline");
        assert_eq!(compliance.retry.max_attempts, 5);
    }

    #[test]
    fn credential_debug_is_redacted() {
        let settings = sample_config().compliance.unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("vd_live_secret"));
        assert!(debug.contains("Credential(***)"));
    }

    #[test]
    fn policy_hash_is_stable_and_sensitive() {
        let config = sample_config();
        let first = policy_hash(&config);
        let second = policy_hash(&config);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let mut bumped = config.clone();
        bumped.training.pass_threshold = 0.8;
        assert_ne!(policy_hash(&bumped), first);

        // Credentials never participate in the hash.
        let mut rotated = config;
        if let Some(compliance) = rotated.compliance.as_mut() {
            compliance.credential = Credential::new("rotated");
        }
        assert_eq!(policy_hash(&rotated), first);
    }

    #[test]
    fn toml_provider_loads_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "display_name = \"Acme\"\napp_version = \"1.0.0\"").unwrap();

        let provider = TomlConfigProvider::new(dir.path());
        let config = provider.tenant_config(&TenantId::new("acme")).unwrap();
        assert_eq!(config.display_name, "Acme");

        let missing = provider.tenant_config(&TenantId::new("globex"));
        assert!(matches!(missing, Err(ConfigError::UnknownTenant(_))));
    }

    #[test]
    fn toml_provider_rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path());
        let err = provider
            .tenant_config(&TenantId::new("../etc/passwd"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTenantId(_)));
    }

    #[test]
    fn static_provider_round_trip() {
        let provider = StaticConfigProvider::new()
            .with_tenant(TenantId::new("acme"), sample_config());
        assert!(provider.tenant_config(&TenantId::new("acme")).is_ok());
        assert!(provider.tenant_config(&TenantId::new("other")).is_err());
    }
}
