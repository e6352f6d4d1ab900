// Copyright @yucwang 2026

use crate::math::constants::Float;

use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Process-wide render settings. Installed once before rendering; readers
/// get the installed snapshot or the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target micropolygon edge length as a fraction of the ray footprint.
    pub dice_rate: Float,
    /// Patches whose footprint falls below this render as one micropolygon.
    pub min_upoly_size: Float,
    /// Cap on the per-patch dicing rate before splitting is preferred.
    pub max_grid_size: usize,
    /// Microsurface cache budget in bytes.
    pub grid_cache_size: usize,
    /// Pixel bucket edge length used by hosts that render in buckets.
    pub bucket_size: usize,
    /// Margin added to surface bounds so displacement stays inside them.
    pub displace_distance: Float,
    /// Scales the lens differentials used for defocus footprints.
    pub focus_factor: Float,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dice_rate: 1.0,
            min_upoly_size: 1e-4,
            max_grid_size: 64,
            grid_cache_size: 64 * 1024 * 1024,
            bucket_size: 32,
            displace_distance: 0.0,
            focus_factor: 0.333,
        }
    }
}

impl Config {
    /// Installs the snapshot. Returns false (and leaves the existing
    /// snapshot in place) if one was already installed.
    pub fn install(config: Config) -> bool {
        let installed = CONFIG.set(config).is_ok();
        if !installed {
            log::warn!("render config already installed, ignoring new settings");
        }
        installed
    }

    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert!(config.min_upoly_size > 0.0);
        assert!(config.max_grid_size >= 2);
        assert!(config.grid_cache_size > 0);
    }
}
