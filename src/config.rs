use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// ConfigFile — deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(default)]
    pub viewer: ViewerConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub scroll_step: Option<u32>,
    pub page_step: Option<u32>,
    pub tick_ms: Option<u64>,
    pub watch_interval_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config — resolved (all fields concrete)
// ---------------------------------------------------------------------------

pub struct Config {
    pub viewer: ViewerConfig,
}

pub struct ViewerConfig {
    /// Rows moved by j/k.
    pub scroll_step: u32,
    /// Rows moved by Ctrl-D/Ctrl-U.
    pub page_step: u32,
    /// Render loop sleep between event polls.
    pub tick: Duration,
    pub watch_interval: Duration,
}

impl ConfigFile {
    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let config = Config {
            viewer: ViewerConfig {
                scroll_step: self.viewer.scroll_step.unwrap_or(1),
                page_step: self.viewer.page_step.unwrap_or(15),
                tick: Duration::from_millis(self.viewer.tick_ms.unwrap_or(10)),
                watch_interval: Duration::from_millis(
                    self.viewer.watch_interval_ms.unwrap_or(200),
                ),
            },
        };
        info!(
            "config: resolved scroll_step={}, page_step={}, tick={}ms, watch_interval={}ms",
            config.viewer.scroll_step,
            config.viewer.page_step,
            config.viewer.tick.as_millis(),
            config.viewer.watch_interval.as_millis(),
        );
        config
    }
}

/// Resolve the XDG config path for nbview.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config"))
        })?;
    Some(config_dir.join("nbview").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.viewer.scroll_step, 1);
        assert_eq!(resolved.viewer.page_step, 15);
        assert_eq!(resolved.viewer.tick, Duration::from_millis(10));
        assert_eq!(resolved.viewer.watch_interval, Duration::from_millis(200));
    }

    #[test]
    fn partial_toml() {
        let text = r#"
            [viewer]
            page_step = 25
            watch_interval_ms = 500
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.viewer.page_step, 25);
        assert_eq!(resolved.viewer.watch_interval, Duration::from_millis(500));
        // Defaults for unspecified fields
        assert_eq!(resolved.viewer.scroll_step, 1);
        assert_eq!(resolved.viewer.tick, Duration::from_millis(10));
    }

    #[test]
    fn invalid_toml() {
        let text = "this is not valid toml [[[";
        let result = toml::from_str::<ConfigFile>(text);
        assert!(result.is_err());
    }
}
