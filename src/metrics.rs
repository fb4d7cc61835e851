use std::fmt;

/// Fraction of predictions equal to the truth. `0.0` for empty input.
pub fn accuracy(y_true: &[i64], y_pred: &[i64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

// ---------------------------------------------------------------------------
// Confusion matrix
// ---------------------------------------------------------------------------

/// Counts indexed `[truth][prediction]` over the sorted union of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub labels: Vec<i64>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(y_true: &[i64], y_pred: &[i64]) -> Self {
        let mut labels: Vec<i64> = y_true.iter().chain(y_pred).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (t, p) in y_true.iter().zip(y_pred) {
            if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
                counts[i][j] += 1;
            }
        }
        Self { labels, counts }
    }

    fn index(&self, label: i64) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

    pub fn count(&self, truth: i64, predicted: i64) -> usize {
        match (self.index(truth), self.index(predicted)) {
            (Some(i), Some(j)) => self.counts[i][j],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "true\\pred")?;
        for label in &self.labels {
            write!(f, "{label:>8}")?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "{label:>10}")?;
            for count in row {
                write!(f, "{count:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-class summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub label: i64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Precision / recall / F1 per class plus overall accuracy.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn new(y_true: &[i64], y_pred: &[i64]) -> Self {
        let confusion = ConfusionMatrix::new(y_true, y_pred);
        let classes = confusion
            .labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let tp = confusion.count(label, label) as f64;
                let predicted: usize = confusion.counts.iter().map(|row| row[i]).sum();
                let support: usize = confusion.counts[i].iter().sum();
                let precision = ratio(tp, predicted as f64);
                let recall = ratio(tp, support as f64);
                ClassScores {
                    label,
                    precision,
                    recall,
                    f1: ratio(2.0 * precision * recall, precision + recall),
                    support,
                }
            })
            .collect();
        Self {
            classes,
            accuracy: accuracy(y_true, y_pred),
            confusion,
        }
    }

    /// Unweighted mean of (precision, recall, f1) over classes.
    pub fn macro_average(&self) -> (f64, f64, f64) {
        let n = self.classes.len() as f64;
        if n == 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            (acc.0 + c.precision, acc.1 + c.recall, acc.2 + c.f1)
        });
        (sum.0 / n, sum.1 / n, sum.2 / n)
    }
}

/// Division that yields 0 when the denominator is 0.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>10}{:>11}{:>9}{:>10}{:>9}",
            "class", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>10}{:>11.2}{:>9.2}{:>10.2}{:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        let total = self.confusion.total();
        let (p, r, f1) = self.macro_average();
        writeln!(f)?;
        writeln!(f, "{:>10}{:>11}{:>9}{:>10.2}{:>9}", "accuracy", "", "", self.accuracy, total)?;
        writeln!(f, "{:>10}{:>11.2}{:>9.2}{:>10.2}{:>9}", "macro avg", p, r, f1, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn confusion_matrix_rows_are_truth() {
        let cm = ConfusionMatrix::new(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]);
        assert_eq!(cm.labels, vec![0, 1]);
        assert_eq!(cm.counts, vec![vec![1, 1], vec![1, 2]]);
        assert_eq!(cm.count(1, 0), 1);
        assert_eq!(cm.count(7, 0), 0);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn report_scores_per_class() {
        let report = ClassificationReport::new(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]);
        let one = &report.classes[1];
        assert_eq!(one.support, 3);
        assert!((one.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((one.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.accuracy - 0.6).abs() < 1e-12);

        let text = report.to_string();
        assert!(text.contains("macro avg"));
    }

    #[test]
    fn never_predicted_class_has_zero_precision() {
        let report = ClassificationReport::new(&[0, 1], &[0, 0]);
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
    }
}
