use std::path::Path;

use anyhow::{Context, Result};

use super::loader::{CLASS_COLUMN, COLOR_COLUMNS, IMAGE_COLUMN, OBJECT_COLUMN};
use super::model::{FEATURE_NAMES, ImportanceDataset};

/// Write the object table with the derived features as CSV.
///
/// Column order: pass-through columns, `img_name, obj_name, R, G, B`,
/// then the features, then `class` (features sit just before the label).
pub fn export_features(dataset: &ImportanceDataset, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let header: Vec<&str> = dataset
        .metadata_columns
        .iter()
        .map(String::as_str)
        .chain([IMAGE_COLUMN, OBJECT_COLUMN])
        .chain(COLOR_COLUMNS)
        .chain(FEATURE_NAMES)
        .chain([CLASS_COLUMN])
        .collect();
    writer.write_record(&header).context("writing CSV header")?;

    for (row_no, obj) in dataset.objects.iter().enumerate() {
        let mut record: Vec<String> = dataset
            .metadata_columns
            .iter()
            .map(|col| obj.metadata.get(col).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        record.push(obj.image.clone());
        record.push(obj.name.clone());
        record.extend([obj.color.r, obj.color.g, obj.color.b].map(|c| c.to_string()));
        match obj.features {
            Some(f) => {
                record.push(f.size.to_string());
                record.push(f.location.to_string());
            }
            None => record.extend([String::new(), String::new()]),
        }
        record.push(obj.class.to_string());

        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }

    writer.flush().context("flushing CSV")?;
    log::info!("Exported {} rows to {}", dataset.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::object;
    use crate::data::model::{MaskColor, MetadataValue, ObjectFeatures};

    #[test]
    fn features_are_written_before_the_class_column() {
        let mut first = object("img1", "sky", MaskColor::new(1, 2, 3), 1);
        first.features = Some(ObjectFeatures { size: 12.0, location: 3.5 });
        first.metadata.insert("num_objs".into(), MetadataValue::Integer(2));
        let second = object("img1", "dog", MaskColor::new(4, 5, 6), 0);
        let ds = ImportanceDataset::from_objects(vec![first, second], vec!["num_objs".into()]);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("features.csv");
        export_features(&ds, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "num_objs,img_name,obj_name,R,G,B,size,loc,class");
        assert_eq!(lines[1], "2,img1,sky,1,2,3,12,3.5,1");
        assert_eq!(lines[2], ",img1,dog,4,5,6,,,0");
    }
}
