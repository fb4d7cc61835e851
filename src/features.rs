use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::model::{ImportanceDataset, MaskColor, ObjectFeatures};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("failed to read image {}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{image}: object '{object}' has mask color {color}, which never appears in the mask")]
    ColorNotFound {
        image: String,
        object: String,
        color: MaskColor,
    },
    #[error("{image}: objects '{first}' and '{second}' share mask color {color}")]
    DuplicateColor {
        image: String,
        first: String,
        second: String,
        color: MaskColor,
    },
    #[error("{image}: source is {source_dims:?} but mask is {mask_dims:?}")]
    DimensionMismatch {
        image: String,
        source_dims: (u32, u32),
        mask_dims: (u32, u32),
    },
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

/// Where the `imgN.bmp` / `imgN_msk.bmp` files of a table live.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayout {
    pub image_dir: PathBuf,
    pub mask_dir: PathBuf,
}

impl ImageLayout {
    /// `<table dir>/imgs` for sources and `<table dir>/imgs/msk` for masks.
    pub fn beside_table(table: &Path) -> Self {
        let root = table.parent().unwrap_or_else(|| Path::new("."));
        let image_dir = root.join("imgs");
        let mask_dir = image_dir.join("msk");
        Self { image_dir, mask_dir }
    }

    pub fn source_path(&self, image: &str) -> PathBuf {
        self.image_dir.join(format!("{image}.bmp"))
    }

    pub fn mask_path(&self, image: &str) -> PathBuf {
        self.mask_dir.join(format!("{image}_msk.bmp"))
    }

    pub fn load_source(&self, image: &str) -> Result<RgbImage, FeatureError> {
        open_rgb(&self.source_path(image))
    }

    pub fn load_mask(&self, image: &str) -> Result<RgbImage, FeatureError> {
        open_rgb(&self.mask_path(image))
    }
}

fn open_rgb(path: &Path) -> Result<RgbImage, FeatureError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| FeatureError::Image {
            path: path.to_path_buf(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Location scaling
// ---------------------------------------------------------------------------

/// `location = scale * distance / normalization`. Only the ratio matters to
/// the classifier; the defaults reproduce the reference feature values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationScale {
    pub scale: f64,
    pub normalization: f64,
}

impl Default for LocationScale {
    fn default() -> Self {
        Self {
            scale: 100.0,
            normalization: 289.13175,
        }
    }
}

impl LocationScale {
    pub fn apply(&self, distance: f64) -> f64 {
        self.scale * distance / self.normalization
    }
}

// ---------------------------------------------------------------------------
// Pixel scan
// ---------------------------------------------------------------------------

/// Pixel count and coordinate sums of one mask color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionStats {
    pub count: u64,
    pub sum_row: u64,
    pub sum_col: u64,
}

impl RegionStats {
    /// Mean `(row, col)` of the region; `None` for an empty region.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some((self.sum_row as f64 / n, self.sum_col as f64 / n))
    }
}

/// Scan the mask once and bucket every pixel by its exact color.
pub fn region_stats(mask: &RgbImage) -> HashMap<MaskColor, RegionStats> {
    let mut regions: HashMap<MaskColor, RegionStats> = HashMap::new();
    for (col, row, px) in mask.enumerate_pixels() {
        let stats = regions.entry(MaskColor::from_pixel(px)).or_default();
        stats.count += 1;
        stats.sum_row += row as u64;
        stats.sum_col += col as u64;
    }
    regions
}

/// Size and location of one region inside a `rows × cols` image.
/// `None` when the region is empty.
pub fn region_features(
    stats: &RegionStats,
    rows: u32,
    cols: u32,
    scale: &LocationScale,
) -> Option<ObjectFeatures> {
    let (avg_r, avg_c) = stats.centroid()?;
    let dr = avg_r - rows as f64 / 2.0;
    let dc = avg_c - cols as f64 / 2.0;
    Some(ObjectFeatures {
        size: stats.count as f64,
        location: scale.apply((dr * dr + dc * dc).sqrt()),
    })
}

/// Compute features for the rows of one image from its mask.
pub fn extract_image_features(
    dataset: &mut ImportanceDataset,
    image: &str,
    mask: &RgbImage,
    scale: &LocationScale,
) -> Result<(), FeatureError> {
    let rows = dataset.rows_for_image(image);

    let mut seen: HashMap<MaskColor, usize> = HashMap::new();
    for &row in &rows {
        let obj = &dataset.objects[row];
        if let Some(&first) = seen.get(&obj.color) {
            return Err(FeatureError::DuplicateColor {
                image: image.to_string(),
                first: dataset.objects[first].name.clone(),
                second: obj.name.clone(),
                color: obj.color,
            });
        }
        seen.insert(obj.color, row);
    }

    let regions = region_stats(mask);
    for row in rows {
        let obj = &mut dataset.objects[row];
        let features = regions
            .get(&obj.color)
            .and_then(|stats| region_features(stats, mask.height(), mask.width(), scale))
            .ok_or_else(|| FeatureError::ColorNotFound {
                image: image.to_string(),
                object: obj.name.clone(),
                color: obj.color,
            })?;
        log::debug!(
            "{image}/{}: size={} loc={:.4}",
            obj.name,
            features.size,
            features.location
        );
        obj.features = Some(features);
    }
    Ok(())
}

/// Load every image's mask and fill in the features of all rows.
pub fn extract_features(
    dataset: &mut ImportanceDataset,
    layout: &ImageLayout,
    scale: &LocationScale,
) -> Result<(), FeatureError> {
    let images = dataset.image_names.clone();
    let total = images.len();
    for (i, image) in images.iter().enumerate() {
        let mask = layout.load_mask(image)?;
        extract_image_features(dataset, image, &mask, scale)?;
        if (i + 1) % 25 == 0 || i + 1 == total {
            log::info!("Computed features for {}/{total} images", i + 1);
        }
    }
    Ok(())
}
