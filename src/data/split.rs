use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::ImportanceDataset;

// ---------------------------------------------------------------------------
// Split rule: where the training rows end
// ---------------------------------------------------------------------------

/// How to cut the table into a training prefix and a testing suffix.
/// Rows are never reshuffled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    /// Rows `[0, n)` train, the rest test.
    AtRow(usize),
    /// Training ends at the first row of the `k`-th image (0-based,
    /// first-appearance order).
    AtImage(usize),
}

impl Default for SplitRule {
    /// The reference table puts its first 75 images in rows `0..302`.
    fn default() -> Self {
        SplitRule::AtRow(302)
    }
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("cannot split at image {index}: the table only has {available} images")]
    ImageOutOfRange { index: usize, available: usize },
}

/// Disjoint, order-preserving partition of row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// The first test row, i.e. the row offset of test-relative indices.
    pub fn boundary(&self) -> usize {
        self.train.len()
    }

    pub fn is_test_row(&self, row: usize) -> bool {
        row >= self.boundary()
    }
}

/// Partition the dataset's rows according to `rule`.
pub fn split_rows(dataset: &ImportanceDataset, rule: SplitRule) -> Result<Split, SplitError> {
    let len = dataset.len();
    let boundary = match rule {
        SplitRule::AtRow(n) => {
            if n > len {
                log::warn!("Split row {n} is past the end of the table ({len} rows); clamping");
            }
            n.min(len)
        }
        SplitRule::AtImage(k) => {
            if k == dataset.image_names.len() {
                len
            } else {
                let name = dataset.image_names.get(k).ok_or(SplitError::ImageOutOfRange {
                    index: k,
                    available: dataset.image_names.len(),
                })?;
                dataset
                    .objects
                    .iter()
                    .position(|o| &o.image == name)
                    .unwrap_or(len)
            }
        }
    };

    log::debug!("Splitting {len} rows at row {boundary}");
    Ok(Split {
        train: (0..boundary).collect(),
        test: (boundary..len).collect(),
    })
}
