use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::LilacConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["lilac.toml", "lilac.yaml", "lilac.yml", "lilac.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<LilacConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./lilac.{toml,yaml,yml,json}`
/// 2. `~/.config/lilac/lilac.{toml,yaml,yml,json}`
///
/// Returns the path that was loaded, if any, alongside the config. A file
/// that fails to parse is logged and replaced by defaults.
pub fn discover_and_load() -> (LilacConfig, Option<PathBuf>) {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return (LilacConfig::default(), None);
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => (cfg, Some(path)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            (LilacConfig::default(), None)
        },
    }
}

fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new(".")).or_else(|| config_dir().and_then(|dir| find_in(&dir)))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/lilac/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "lilac").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lilac.toml")
}

/// Serialize `config` to `path`, in the format its extension names.
///
/// Creates parent directories if needed.
pub fn save_config(config: &LilacConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let out = match extension(path) {
        "toml" => toml::to_string_pretty(config)?,
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        ext => anyhow::bail!("unsupported config format: .{ext}"),
    };
    std::fs::write(path, out)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<LilacConfig> {
    match extension(path) {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        ext => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    use crate::schema::BusKind;

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("lilac.toml", "[manager]\nname = \"a\"\n"),
            ("lilac.yaml", "manager:\n  name: a\n"),
            ("lilac.json", r#"{"manager": {"name": "a"}}"#),
        ];
        for (name, body) in cases {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            assert_eq!(load_config(&path).unwrap().manager.name, "a", "{name}");
        }
    }

    #[test]
    fn rejects_unknown_extensions_and_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let ini = dir.path().join("lilac.ini");
        std::fs::write(&ini, "x=1").unwrap();
        assert!(load_config(&ini).is_err());

        let toml = dir.path().join("lilac.toml");
        std::fs::write(&toml, "[manager\n").unwrap();
        assert!(load_config(&toml).is_err());

        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn first_matching_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_in(dir.path()), None);
        std::fs::write(dir.path().join("lilac.json"), "{}").unwrap();
        std::fs::write(dir.path().join("lilac.yaml"), "{}").unwrap();
        assert_eq!(find_in(dir.path()), Some(dir.path().join("lilac.yaml")));
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lilac.yaml");
        let mut cfg = LilacConfig::default();
        cfg.manager.bus = BusKind::System;
        cfg.capabilities.poll_delay_secs = 3;

        save_config(&cfg, &path).unwrap();
        let back = load_config(&path).unwrap();
        assert_eq!(back.manager.bus, BusKind::System);
        assert_eq!(back.capabilities.poll_delay_secs, 3);
    }
}
