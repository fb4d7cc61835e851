use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::classifier::GaussianNb;
use crate::data::loader::load_table;
use crate::data::model::{ImportanceDataset, MaskColor};
use crate::data::split::{Split, split_rows};
use crate::features::{ImageLayout, extract_features};
use crate::importance::ImageMaps;
use crate::metrics::ClassificationReport;
use crate::settings::Settings;

/// Result of one end-to-end run over a table.
#[derive(Debug, Clone)]
pub struct Session {
    pub table: PathBuf,
    pub settings: Settings,
    pub layout: ImageLayout,
    /// Rows with features filled in.
    pub dataset: ImportanceDataset,
    pub split: Split,
    pub model: GaussianNb,
    /// Predicted label of every row, in table order.
    pub predictions: Vec<i64>,
    /// Class probabilities of every row, columns ordered as `model.classes()`.
    pub probabilities: Vec<Vec<f64>>,
    pub train_report: ClassificationReport,
    /// `None` when the split leaves no testing rows.
    pub test_report: Option<ClassificationReport>,
}

/// Load → extract features → split → fit → evaluate.
pub fn run(table: &Path, settings: &Settings) -> Result<Session> {
    let mut dataset = load_table(table)?;
    if dataset.is_empty() {
        bail!("{} contains no objects", table.display());
    }

    let layout = settings.layout(table);
    log::info!(
        "Reading images from {} and masks from {}",
        layout.image_dir.display(),
        layout.mask_dir.display()
    );
    extract_features(&mut dataset, &layout, &settings.location)?;

    let split = split_rows(&dataset, settings.split)?;
    log::info!(
        "Training on {} rows, testing on {} rows",
        split.train.len(),
        split.test.len()
    );

    let all_rows: Vec<usize> = (0..dataset.len()).collect();
    let x = dataset
        .feature_matrix(&all_rows)
        .context("features missing after extraction")?;
    let y = dataset.labels(&all_rows);

    let mut model = GaussianNb::new(settings.var_smoothing);
    model
        .fit(&x[..split.boundary()], &y[..split.boundary()])
        .context("fitting classifier")?;
    let predictions = model.predict(&x).context("predicting importance")?;
    let probabilities = model.predict_proba(&x).context("predicting importance")?;
    for class in model.classes() {
        log::debug!(
            "class {}: prior={:.3} mean={:?} var={:?}",
            class.label,
            class.prior,
            class.mean,
            class.var
        );
    }

    let (y_train, y_test) = y.split_at(split.boundary());
    let (p_train, p_test) = predictions.split_at(split.boundary());
    let train_report = ClassificationReport::new(y_train, p_train);
    let test_report = (!y_test.is_empty()).then(|| ClassificationReport::new(y_test, p_test));

    log::info!("Training accuracy: {:.4}", train_report.accuracy);
    match &test_report {
        Some(report) => log::info!("Testing accuracy: {:.4}", report.accuracy),
        None => log::warn!("Split leaves no testing rows"),
    }

    Ok(Session {
        table: table.to_path_buf(),
        settings: settings.clone(),
        layout,
        dataset,
        split,
        model,
        predictions,
        probabilities,
        train_report,
        test_report,
    })
}

impl Session {
    /// `(color, truth, prediction)` for every object of `image`.
    pub fn image_objects(&self, image: &str) -> Vec<(MaskColor, i64, i64)> {
        self.dataset
            .rows_for_image(image)
            .into_iter()
            .map(|row| {
                let obj = &self.dataset.objects[row];
                (obj.color, obj.class, self.predictions[row])
            })
            .collect()
    }

    /// Images whose first row lies in the testing partition.
    pub fn test_images(&self) -> Vec<&str> {
        self.dataset
            .image_names
            .iter()
            .filter(|name| {
                self.dataset
                    .objects
                    .iter()
                    .position(|o| &o.image == *name)
                    .is_some_and(|row| self.split.is_test_row(row))
            })
            .map(String::as_str)
            .collect()
    }

    pub fn image_maps(&self, image: &str) -> Result<ImageMaps> {
        if !self.dataset.image_names.iter().any(|n| n == image) {
            bail!("image '{image}' is not in {}", self.table.display());
        }
        let objects = self.image_objects(image);
        log::info!("Rendering importance maps for {image} ({} objects)", objects.len());
        Ok(ImageMaps::build(
            &self.layout,
            image,
            &objects,
            self.settings.importance_step,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use image::{ImageBuffer, Rgb, RgbImage};

    use super::*;
    use crate::data::split::SplitRule;

    const BIG: MaskColor = MaskColor::new(200, 10, 10);
    const SMALL: MaskColor = MaskColor::new(10, 10, 200);

    /// Four 24×24 images: a large centered object (important) and a small
    /// corner object (not important).
    fn write_dataset(dir: &Path) -> PathBuf {
        let layout = ImageLayout::beside_table(&dir.join("table.csv"));
        std::fs::create_dir_all(&layout.mask_dir).unwrap();

        let mut table = std::fs::File::create(dir.join("table.csv")).unwrap();
        writeln!(table, "num_objs,img_name,obj_name,R,G,B,class").unwrap();

        for (i, (half, corner)) in [(5u32, 2u32), (6, 1), (4, 3), (5, 2)].iter().enumerate() {
            let name = format!("img{}", i + 1);
            let mask: RgbImage = ImageBuffer::from_fn(24, 24, |x, y| {
                if x.abs_diff(12) < *half && y.abs_diff(12) < *half {
                    BIG.to_pixel()
                } else if x < *corner && y < *corner {
                    SMALL.to_pixel()
                } else {
                    Rgb([0, 0, 0])
                }
            });
            let source: RgbImage = ImageBuffer::from_fn(24, 24, |_, _| Rgb([128, 128, 128]));
            mask.save(layout.mask_path(&name)).unwrap();
            source.save(layout.source_path(&name)).unwrap();

            writeln!(table, "2,{name},thing,{},{},{},1", BIG.r, BIG.g, BIG.b).unwrap();
            writeln!(table, "2,{name},speck,{},{},{},0", SMALL.r, SMALL.g, SMALL.b).unwrap();
        }
        dir.join("table.csv")
    }

    fn settings() -> Settings {
        Settings {
            split: SplitRule::AtImage(2),
            ..Settings::default()
        }
    }

    #[test]
    fn end_to_end_run_on_separable_dataset() {
        let dir = tempfile::TempDir::new().unwrap();
        let table = write_dataset(dir.path());

        let session = run(&table, &settings()).unwrap();

        assert_eq!(session.split.train, vec![0, 1, 2, 3]);
        assert_eq!(session.split.test, vec![4, 5, 6, 7]);
        // img1: 9×9 block, 2×2 corner
        let first = session.dataset.objects[0].features.unwrap();
        assert_eq!(first.size, 81.0);
        assert_eq!(session.dataset.objects[1].features.unwrap().size, 4.0);

        assert_eq!(session.train_report.accuracy, 1.0);
        assert_eq!(session.test_report.as_ref().unwrap().accuracy, 1.0);
        assert_eq!(session.test_images(), vec!["img3", "img4"]);
    }

    #[test]
    fn maps_reflect_predictions() {
        let dir = tempfile::TempDir::new().unwrap();
        let table = write_dataset(dir.path());
        let session = run(&table, &settings()).unwrap();

        let maps = session.image_maps("img4").unwrap();
        assert_eq!(maps.truth.get_pixel(12, 12)[0], 128);
        assert_eq!(maps.predicted.get_pixel(12, 12)[0], 128);
        assert_eq!(maps.predicted.get_pixel(0, 0)[0], 0);
        assert!(session.image_maps("img99").is_err());
    }

    #[test]
    fn missing_mask_fails_the_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let table = write_dataset(dir.path());
        std::fs::remove_file(dir.path().join("imgs/msk/img3_msk.bmp")).unwrap();

        let err = run(&table, &settings()).unwrap_err();
        assert!(format!("{err:#}").contains("img3_msk.bmp"));
    }
}
