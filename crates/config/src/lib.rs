//! Configuration loading, validation, and env substitution.
//!
//! Config files: `calmcp.toml`, `calmcp.yaml`, `calmcp.yml` or `calmcp.json`.
//! Searched in `./` then `~/.config/calmcp/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all string
//! values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_or_default_config_path, load_config, save_config},
    schema::{CalDavAccountConfig, CalDavConfig, CalmcpConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
