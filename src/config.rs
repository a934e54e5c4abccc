//! Simulation parameters, loadable from TOML.

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimConfig {
    /// Straight-line distance within which a wiring tool reuses an
    /// existing attachment instead of creating a new one.
    pub wire_snap_radius: f32,
    /// Per-cell air seeded into the starter hull's enclosed zone.
    pub starter_air: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            wire_snap_radius: 0.025,
            starter_air: 1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SimConfigFile {
    #[serde(default)]
    wire_snap_radius: Option<f32>,
    #[serde(default)]
    starter_air: Option<f32>,
}

impl SimConfig {
    pub fn load_from_path(path: &Path) -> Result<SimConfig, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        let file: SimConfigFile = toml::from_str(&s)?;
        Ok(SimConfig::from_file(&file))
    }

    fn from_file(file: &SimConfigFile) -> SimConfig {
        let d = SimConfig::default();
        SimConfig {
            wire_snap_radius: file.wire_snap_radius.unwrap_or(d.wire_snap_radius),
            starter_air: file.starter_air.unwrap_or(d.starter_air),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let file: SimConfigFile = toml::from_str("wire_snap_radius = 0.1").unwrap();
        let cfg = SimConfig::from_file(&file);
        assert_eq!(cfg.wire_snap_radius, 0.1);
        assert_eq!(cfg.starter_air, SimConfig::default().starter_air);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let file: SimConfigFile = toml::from_str("").unwrap();
        assert_eq!(SimConfig::from_file(&file), SimConfig::default());
    }
}
