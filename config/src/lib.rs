//! Tenant configuration for Attest.
//!
//! Configuration is consumed through an explicitly injected
//! [`ConfigProvider`] capability rather than ambient process state, so every
//! component receives the exact configuration snapshot it ran under and the
//! policy hash can bind evidence records to it.
//!
//! The on-disk format is one TOML file per tenant:
//!
//! ```toml
//! display_name = "Acme Logistics"
//! app_version = "1.4.0"
//!
//! [training]
//! pass_threshold = 0.7
//! max_attempts = 3
//!
//! [compliance]
//! provider = "veridesk"
//! credential = "vd_live_..."
//! target = "acme-workspace"
//!
//! [compliance.retry]
//! max_attempts = 5
//! initial_delay_ms = 5000
//! max_delay_ms = 300000
//! ```

mod tenant;

pub use tenant::{
    policy_hash, ComplianceSettings, ConfigError, ConfigProvider, Credential, RetryPolicy,
    StaticConfigProvider, TenantConfig, TomlConfigProvider, TrainingPolicy,
};
