use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::probe::Rect;

/// Fixed shop grid, row-major, as laid out on a 1280x720 capture.
pub const DEFAULT_GRID_REGIONS: [Rect; 8] = [
    Rect::new(638, 159, 114, 133),
    Rect::new(791, 157, 114, 133),
    Rect::new(941, 157, 114, 133),
    Rect::new(1094, 162, 114, 133),
    Rect::new(641, 359, 114, 133),
    Rect::new(791, 361, 114, 133),
    Rect::new(943, 360, 114, 133),
    Rect::new(1093, 361, 114, 133),
];

pub const DEFAULT_BLANK_AREA: Rect = Rect::new(471, 486, 335, 216);
pub const DEFAULT_BACK_BUTTON: Rect = Rect::new(50, 17, 37, 38);

/// Tunables for one shop flow invocation. Every field has a default so a partial TOML file works.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FlowSettings {
    /// Wall-clock budget for the whole loop. Expiry still reports success.
    pub timeout_secs: f64,
    /// Pause after a click so the UI transition can settle.
    pub settle_ms: u64,
    /// Consecutive unclassifiable frames before the flow is considered done.
    pub complete_threshold: u32,
    /// How many times to look for the "cannot refresh" marker after a refresh click.
    pub refresh_polls: u32,
    pub grid_regions: Vec<Rect>,
    pub blank_area: Rect,
    /// Clicked when the back button cannot be located.
    pub back_button: Rect,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 200.0,
            settle_ms: 1000,
            complete_threshold: 3,
            refresh_polls: 3,
            grid_regions: DEFAULT_GRID_REGIONS.to_vec(),
            blank_area: DEFAULT_BLANK_AREA,
            back_button: DEFAULT_BACK_BUTTON,
        }
    }
}

impl FlowSettings {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.timeout_secs.is_finite() {
            anyhow::bail!("timeout_secs must be finite");
        }
        if Duration::try_from_secs_f64(self.timeout_secs.max(0.0)).is_err() {
            anyhow::bail!("timeout_secs out of range: {}", self.timeout_secs);
        }
        if self.complete_threshold == 0 {
            anyhow::bail!("complete_threshold must be at least 1");
        }
        if self.grid_regions.is_empty() {
            anyhow::bail!("grid_regions must not be empty");
        }
        Ok(())
    }
}

/// Minimal TOML config loader.
///
/// Search order:
/// 1) `TOWER_AGENT_CONFIG_DIR/<relative_path>`
/// 2) `./<relative_path>`
/// 3) `<crate_root>/../../config/<relative_path>` (repo-local convenience)
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn parse_from_file<T: DeserializeOwned>(relative_path: &str) -> anyhow::Result<T> {
        let path = Self::resolve_path(relative_path)?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse_from_string(&text)
    }

    pub fn parse_from_string<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).with_context(|| "Failed to parse TOML")
    }

    /// Loads flow settings, falling back to defaults when no file is found.
    /// A file that exists but does not parse is still an error.
    pub fn load_flow_settings(relative_path: &str) -> anyhow::Result<FlowSettings> {
        let settings = match Self::resolve_path(relative_path) {
            Ok(_) => Self::parse_from_file::<FlowSettings>(relative_path)?,
            Err(_) => {
                tracing::info!(path = relative_path, "config.flow_settings.default");
                FlowSettings::default()
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    fn resolve_path(relative_path: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(relative_path);

        if let Some(root) = env::var_os("TOWER_AGENT_CONFIG_DIR") {
            let candidate = PathBuf::from(root).join(rel);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if let Ok(cwd) = env::current_dir() {
            let candidate = cwd.join(rel);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        // This crate lives at <repo_root>/crates/tower-core.
        let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(2)
            .ok_or_else(|| anyhow::anyhow!("CARGO_MANIFEST_DIR has insufficient ancestors"))?
            .join("config")
            .join(rel);
        if candidate.is_file() {
            return Ok(candidate);
        }

        anyhow::bail!("Config file not found for {:?}", rel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let s: FlowSettings =
            ConfigLoader::parse_from_string("timeout_secs = 30.0\nsettle_ms = 250\n").unwrap();
        assert_eq!(s.timeout(), Duration::from_secs(30));
        assert_eq!(s.settle(), Duration::from_millis(250));
        assert_eq!(s.complete_threshold, 3);
        assert_eq!(s.grid_regions.len(), 8);
        assert_eq!(s.blank_area, DEFAULT_BLANK_AREA);
    }

    #[test]
    fn rects_parse_from_arrays() {
        let s: FlowSettings = ConfigLoader::parse_from_string(
            "blank_area = [1, 2, 3, 4]\ngrid_regions = [[0, 0, 10, 10]]\n",
        )
        .unwrap();
        assert_eq!(s.blank_area, Rect::new(1, 2, 3, 4));
        assert_eq!(s.grid_regions, vec![Rect::new(0, 0, 10, 10)]);
    }

    #[test]
    fn validate_rejects_zero_threshold_and_empty_grid() {
        let mut s = FlowSettings {
            complete_threshold: 0,
            ..FlowSettings::default()
        };
        assert!(s.validate().is_err());
        s.complete_threshold = 3;
        s.grid_regions.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_unrepresentable_timeout() {
        for timeout_secs in [1e20, f64::INFINITY, f64::NAN] {
            let s = FlowSettings {
                timeout_secs,
                ..FlowSettings::default()
            };
            assert!(s.validate().is_err(), "{timeout_secs}");
        }
        let s = FlowSettings {
            timeout_secs: -5.0,
            ..FlowSettings::default()
        };
        assert!(s.validate().is_ok());
        assert_eq!(s.timeout(), Duration::ZERO);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let s = ConfigLoader::load_flow_settings("shop_flow.toml").unwrap();
        assert_eq!(s, FlowSettings::default());
    }
}
