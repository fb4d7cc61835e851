use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a pass-through column
// ---------------------------------------------------------------------------

/// A dynamically-typed table value mirroring common spreadsheet dtypes.
/// Columns the model does not consume are carried through as these.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => Ok(()),
        }
    }
}

impl MetadataValue {
    /// Interpret the value as an integer, accepting whole floats
    /// (spreadsheet exports often store `1` as `1.0`).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            MetadataValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            MetadataValue::Bool(b) => Some(*b as i64),
            MetadataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// MaskColor – the RGB key of an object inside its mask raster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl MaskColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_pixel(px: &image::Rgb<u8>) -> Self {
        Self::new(px[0], px[1], px[2])
    }

    #[cfg(test)]
    pub fn to_pixel(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }
}

impl fmt::Display for MaskColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

// ---------------------------------------------------------------------------
// ObjectFeatures / ObjectRecord – one row of the object table
// ---------------------------------------------------------------------------

/// Names of the model features, in the column order used for training.
pub const FEATURE_NAMES: [&str; 2] = ["size", "loc"];

/// Geometric descriptors derived from an object's mask pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectFeatures {
    /// Number of mask pixels carrying the object's color.
    pub size: f64,
    /// Scaled distance of the object's centroid from the image center.
    pub location: f64,
}

impl ObjectFeatures {
    pub fn to_vec(self) -> Vec<f64> {
        vec![self.size, self.location]
    }
}

/// A single segmented object (one row of the source table).
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// Image identifier, e.g. `img12`.
    pub image: String,
    /// Object identifier within its image.
    pub name: String,
    pub color: MaskColor,
    /// Ground-truth importance label.
    pub class: i64,
    /// Filled in by the feature extractor.
    pub features: Option<ObjectFeatures>,
    /// Remaining columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

// ---------------------------------------------------------------------------
// ImportanceDataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed table, rows kept in file order.
#[derive(Debug, Clone, Default)]
pub struct ImportanceDataset {
    pub objects: Vec<ObjectRecord>,
    /// Image identifiers in order of first appearance.
    pub image_names: Vec<String>,
    /// Ordered list of pass-through column names.
    pub metadata_columns: Vec<String>,
}

impl ImportanceDataset {
    /// Build the image index from the loaded rows.
    pub fn from_objects(objects: Vec<ObjectRecord>, metadata_columns: Vec<String>) -> Self {
        let mut image_names: Vec<String> = Vec::new();
        for obj in &objects {
            if !image_names.iter().any(|n| n == &obj.image) {
                image_names.push(obj.image.clone());
            }
        }
        ImportanceDataset {
            objects,
            image_names,
            metadata_columns,
        }
    }

    /// Number of objects (rows).
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Row indices belonging to one image, in table order.
    pub fn rows_for_image(&self, image: &str) -> Vec<usize> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.image == image)
            .map(|(i, _)| i)
            .collect()
    }

    /// Feature rows for the given indices. `None` if any row lacks features.
    pub fn feature_matrix(&self, rows: &[usize]) -> Option<Vec<Vec<f64>>> {
        rows.iter()
            .map(|&i| self.objects[i].features.map(ObjectFeatures::to_vec))
            .collect()
    }

    /// Ground-truth labels for the given indices.
    pub fn labels(&self, rows: &[usize]) -> Vec<i64> {
        rows.iter().map(|&i| self.objects[i].class).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn object(image: &str, name: &str, color: MaskColor, class: i64) -> ObjectRecord {
        ObjectRecord {
            image: image.to_string(),
            name: name.to_string(),
            color,
            class,
            features: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn image_names_follow_first_appearance() {
        let ds = ImportanceDataset::from_objects(
            vec![
                object("img2", "a", MaskColor::new(1, 0, 0), 0),
                object("img1", "b", MaskColor::new(2, 0, 0), 1),
                object("img2", "c", MaskColor::new(3, 0, 0), 0),
            ],
            Vec::new(),
        );
        assert_eq!(ds.image_names, vec!["img2", "img1"]);
        assert_eq!(ds.rows_for_image("img2"), vec![0, 2]);
    }

    #[test]
    fn feature_matrix_requires_every_row() {
        let mut ds = ImportanceDataset::from_objects(
            vec![
                object("img1", "a", MaskColor::new(1, 0, 0), 0),
                object("img1", "b", MaskColor::new(2, 0, 0), 1),
            ],
            Vec::new(),
        );
        ds.objects[0].features = Some(ObjectFeatures { size: 4.0, location: 1.5 });
        assert!(ds.feature_matrix(&[0, 1]).is_none());
        assert_eq!(ds.feature_matrix(&[0]), Some(vec![vec![4.0, 1.5]]));
        assert_eq!(ds.labels(&[1, 0]), vec![1, 0]);
    }

    #[test]
    fn whole_floats_read_as_integers() {
        assert_eq!(MetadataValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(MetadataValue::Float(3.5).as_i64(), None);
        assert_eq!(MetadataValue::String(" 7 ".into()).as_i64(), Some(7));
    }
}
