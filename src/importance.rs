use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{GrayImage, Luma, RgbImage};

use crate::data::model::MaskColor;
use crate::features::{FeatureError, ImageLayout};

/// Gray level of a label: `label * step`, clamped to 0..=255.
pub fn importance_level(label: i64, step: f64) -> u8 {
    (label as f64 * step).round().clamp(0.0, 255.0) as u8
}

/// Paint each object's importance onto a black raster the size of `mask`.
/// Pixels whose color belongs to no listed object stay 0.
pub fn paint_map(mask: &RgbImage, objects: &[(MaskColor, i64)], step: f64) -> GrayImage {
    let levels: HashMap<MaskColor, u8> = objects
        .iter()
        .map(|&(color, label)| (color, importance_level(label, step)))
        .collect();

    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let color = MaskColor::from_pixel(mask.get_pixel(x, y));
        Luma([levels.get(&color).copied().unwrap_or(0)])
    })
}

/// Everything shown for one image: the rasters and both importance maps.
#[derive(Debug, Clone)]
pub struct ImageMaps {
    pub image: String,
    pub source: RgbImage,
    pub mask: RgbImage,
    pub truth: GrayImage,
    pub predicted: GrayImage,
}

impl ImageMaps {
    /// Load `image`'s rasters and paint ground-truth and predicted maps.
    /// `objects` holds `(color, truth, prediction)` for each object of the image.
    pub fn build(
        layout: &ImageLayout,
        image: &str,
        objects: &[(MaskColor, i64, i64)],
        step: f64,
    ) -> Result<Self, FeatureError> {
        let source = layout.load_source(image)?;
        let mask = layout.load_mask(image)?;
        if source.dimensions() != mask.dimensions() {
            return Err(FeatureError::DimensionMismatch {
                image: image.to_string(),
                source_dims: source.dimensions(),
                mask_dims: mask.dimensions(),
            });
        }

        let truth: Vec<(MaskColor, i64)> = objects.iter().map(|&(c, t, _)| (c, t)).collect();
        let predicted: Vec<(MaskColor, i64)> = objects.iter().map(|&(c, _, p)| (c, p)).collect();

        Ok(Self {
            image: image.to_string(),
            truth: paint_map(&mask, &truth, step),
            predicted: paint_map(&mask, &predicted, step),
            source,
            mask,
        })
    }

    /// Write `<image>_gt.png` and `<image>_pred.png` into `dir`.
    pub fn save_png(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        let truth_path = dir.join(format!("{}_gt.png", self.image));
        let predicted_path = dir.join(format!("{}_pred.png", self.image));
        self.truth
            .save(&truth_path)
            .with_context(|| format!("writing {}", truth_path.display()))?;
        self.predicted
            .save(&predicted_path)
            .with_context(|| format!("writing {}", predicted_path.display()))?;
        Ok((truth_path, predicted_path))
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgb};

    use super::*;

    const RED: MaskColor = MaskColor::new(255, 0, 0);
    const GREEN: MaskColor = MaskColor::new(0, 255, 0);

    #[test]
    fn levels_scale_and_clamp() {
        assert_eq!(importance_level(0, 127.5), 0);
        assert_eq!(importance_level(1, 127.5), 128);
        assert_eq!(importance_level(2, 127.5), 255);
        assert_eq!(importance_level(5, 127.5), 255);
        assert_eq!(importance_level(-1, 127.5), 0);
    }

    #[test]
    fn map_paints_only_object_pixels() {
        // left half red, right half green, one unlisted blue pixel
        let mask: RgbImage = ImageBuffer::from_fn(4, 2, |x, y| match (x, y) {
            (3, 1) => Rgb([0, 0, 255]),
            (0..=1, _) => RED.to_pixel(),
            _ => GREEN.to_pixel(),
        });
        let map = paint_map(&mask, &[(RED, 1), (GREEN, 0)], 127.5);

        assert_eq!(map.dimensions(), (4, 2));
        assert_eq!(map.get_pixel(0, 0)[0], 128);
        assert_eq!(map.get_pixel(1, 1)[0], 128);
        assert_eq!(map.get_pixel(2, 0)[0], 0);
        assert_eq!(map.get_pixel(3, 1)[0], 0);
    }

    #[test]
    fn maps_are_built_from_files_and_saved() {
        let dir = tempfile::TempDir::new().unwrap();
        let layout = ImageLayout {
            image_dir: dir.path().to_path_buf(),
            mask_dir: dir.path().join("msk"),
        };
        std::fs::create_dir_all(&layout.mask_dir).unwrap();

        let source: RgbImage = ImageBuffer::from_fn(3, 3, |_, _| Rgb([90, 90, 90]));
        let mask: RgbImage = ImageBuffer::from_fn(3, 3, |x, _| {
            if x == 0 {
                RED.to_pixel()
            } else {
                GREEN.to_pixel()
            }
        });
        source.save(layout.source_path("img1")).unwrap();
        mask.save(layout.mask_path("img1")).unwrap();

        let maps = ImageMaps::build(&layout, "img1", &[(RED, 1, 0), (GREEN, 0, 1)], 127.5).unwrap();
        assert_eq!(maps.truth.get_pixel(0, 2)[0], 128);
        assert_eq!(maps.predicted.get_pixel(0, 2)[0], 0);
        assert_eq!(maps.predicted.get_pixel(2, 2)[0], 128);

        let (gt, pred) = maps.save_png(&dir.path().join("out")).unwrap();
        assert!(gt.ends_with("img1_gt.png"));
        assert!(pred.exists());
    }

    #[test]
    fn mismatched_rasters_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let layout = ImageLayout {
            image_dir: dir.path().to_path_buf(),
            mask_dir: dir.path().to_path_buf(),
        };
        let source: RgbImage = ImageBuffer::new(4, 4);
        let mask: RgbImage = ImageBuffer::new(2, 2);
        source.save(layout.source_path("img1")).unwrap();
        mask.save(layout.mask_path("img1")).unwrap();

        let err = ImageMaps::build(&layout, "img1", &[], 127.5).unwrap_err();
        assert!(matches!(err, FeatureError::DimensionMismatch { .. }));
    }
}
