use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::CalmcpConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["calmcp.toml", "calmcp.yaml", "calmcp.yml", "calmcp.json"];

const APP_NAME: &str = "calmcp";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<CalmcpConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./calmcp.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/calmcp/calmcp.{toml,yaml,yml,json}` (user-global)
///
/// Returns `CalmcpConfig::default()` if no config file is found or the file
/// fails to load.
pub fn discover_and_load() -> CalmcpConfig {
    let search_dirs: Vec<PathBuf> = std::iter::once(PathBuf::from("."))
        .chain(config_dir())
        .collect();
    load_from_dirs(&search_dirs)
}

fn load_from_dirs(dirs: &[PathBuf]) -> CalmcpConfig {
    if let Some(path) = find_config_file(dirs) {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    CalmcpConfig::default()
}

/// Find the first config file in `dirs`, trying every file name per directory.
fn find_config_file(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/calmcp/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    let search_dirs: Vec<PathBuf> = std::iter::once(PathBuf::from("."))
        .chain(config_dir())
        .collect();
    if let Some(path) = find_config_file(&search_dirs) {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calmcp.toml")
}

/// Serialize `config` to TOML and write it to `path`.
///
/// Creates parent directories if needed.
pub fn save_config(config: &CalmcpConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<CalmcpConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
