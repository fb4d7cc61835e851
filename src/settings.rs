use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::split::SplitRule;
use crate::features::{ImageLayout, LocationScale};

/// Tunable knobs of a run. Read from an optional JSON file; command-line
/// flags override individual fields afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `imgN.bmp`; defaults to `<table dir>/imgs`.
    pub image_dir: Option<PathBuf>,
    /// Directory holding `imgN_msk.bmp`; defaults to `<image_dir>/msk`.
    pub mask_dir: Option<PathBuf>,
    pub split: SplitRule,
    pub location: LocationScale,
    /// Fraction of the largest feature variance added to every variance.
    pub var_smoothing: f64,
    /// Gray level per unit of importance label.
    pub importance_step: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_dir: None,
            mask_dir: None,
            split: SplitRule::default(),
            location: LocationScale::default(),
            var_smoothing: 1e-9,
            importance_step: 127.5,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        log::debug!("Loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }

    /// Resolve the image directories for a given table file.
    pub fn layout(&self, table: &Path) -> ImageLayout {
        let default = ImageLayout::beside_table(table);
        let image_dir = self.image_dir.clone().unwrap_or(default.image_dir);
        let mask_dir = self
            .mask_dir
            .clone()
            .unwrap_or_else(|| image_dir.join("msk"));
        ImageLayout { image_dir, mask_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"split": {"at_image": 75}, "location": {"scale": 1.0}}"#)
                .unwrap();
        assert_eq!(settings.split, SplitRule::AtImage(75));
        assert_eq!(settings.location.scale, 1.0);
        assert_eq!(settings.location.normalization, 289.13175);
        assert_eq!(settings.importance_step, 127.5);
    }

    #[test]
    fn mask_dir_follows_image_dir_override() {
        let settings = Settings {
            image_dir: Some(PathBuf::from("/data/pictures")),
            ..Settings::default()
        };
        let layout = settings.layout(Path::new("/data/table.csv"));
        assert_eq!(layout.image_dir, Path::new("/data/pictures"));
        assert_eq!(layout.mask_dir, Path::new("/data/pictures/msk"));

        let layout = Settings::default().layout(Path::new("/data/table.csv"));
        assert_eq!(layout.mask_dir, Path::new("/data/imgs/msk"));
    }
}
