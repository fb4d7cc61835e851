use std::f64::consts::PI;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
    #[error("{rows} feature rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("row {row} has {found} features, expected {expected}")]
    FeatureCount {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("model has not been fitted")]
    NotFitted,
}

/// Per-class Gaussian parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassModel {
    pub label: i64,
    pub prior: f64,
    pub mean: Vec<f64>,
    pub var: Vec<f64>,
}

/// Gaussian Naive Bayes.
///
/// Each feature is modelled per class as an independent normal
/// distribution. Variances are smoothed by `var_smoothing` times the largest
/// feature variance of the training data, so constant features stay finite.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianNb {
    pub var_smoothing: f64,
    classes: Vec<ClassModel>,
    n_features: usize,
}

impl Default for GaussianNb {
    fn default() -> Self {
        Self::new(1e-9)
    }
}

impl GaussianNb {
    pub fn new(var_smoothing: f64) -> Self {
        Self {
            var_smoothing,
            classes: Vec::new(),
            n_features: 0,
        }
    }

    /// Fitted classes, sorted by label.
    pub fn classes(&self) -> &[ClassModel] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[i64]) -> Result<(), ModelError> {
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::LengthMismatch {
                rows: x.len(),
                labels: y.len(),
            });
        }
        let n_features = x[0].len();
        check_widths(x, n_features)?;

        let epsilon = self.var_smoothing
            * (0..n_features)
                .map(|j| variance(x.iter().map(|row| row[j])))
                .fold(0.0, f64::max);

        let mut labels: Vec<i64> = y.to_vec();
        labels.sort_unstable();
        labels.dedup();

        let n = x.len() as f64;
        self.classes = labels
            .into_iter()
            .map(|label| {
                let members: Vec<&Vec<f64>> = x
                    .iter()
                    .zip(y)
                    .filter(|(_, l)| **l == label)
                    .map(|(row, _)| row)
                    .collect();
                let means = (0..n_features)
                    .map(|j| mean(members.iter().map(|row| row[j])))
                    .collect();
                let vars = (0..n_features)
                    .map(|j| variance(members.iter().map(|row| row[j])) + epsilon)
                    .collect();
                ClassModel {
                    label,
                    prior: members.len() as f64 / n,
                    mean: means,
                    var: vars,
                }
            })
            .collect();
        self.n_features = n_features;

        log::debug!(
            "Fitted Gaussian NB on {} rows, {} features, classes {:?}",
            x.len(),
            n_features,
            self.classes.iter().map(|c| c.label).collect::<Vec<_>>()
        );
        Ok(())
    }

    /// Unnormalised log posterior of every class for one sample.
    fn joint_log_likelihood(&self, sample: &[f64]) -> Vec<f64> {
        self.classes
            .iter()
            .map(|c| {
                let mut jll = c.prior.ln();
                for ((&xi, &mu), &var) in sample.iter().zip(&c.mean).zip(&c.var) {
                    jll -= 0.5 * (2.0 * PI * var).ln();
                    jll -= 0.5 * (xi - mu).powi(2) / var;
                }
                jll
            })
            .collect()
    }

    fn check_input(&self, x: &[Vec<f64>]) -> Result<(), ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        check_widths(x, self.n_features)
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<i64>, ModelError> {
        self.check_input(x)?;
        Ok(x.iter()
            .map(|sample| {
                let jll = self.joint_log_likelihood(sample);
                // first maximum wins, so ties resolve to the smaller label
                let best = jll
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, &v)| if v > jll[best] { i } else { best });
                self.classes[best].label
            })
            .collect())
    }

    /// Log class probabilities, columns ordered as [`GaussianNb::classes`].
    pub fn predict_log_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        self.check_input(x)?;
        Ok(x.iter()
            .map(|sample| {
                let jll = self.joint_log_likelihood(sample);
                let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let log_norm = max + jll.iter().map(|v| (v - max).exp()).sum::<f64>().ln();
                jll.into_iter().map(|v| v - log_norm).collect()
            })
            .collect())
    }

    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        Ok(self
            .predict_log_proba(x)?
            .into_iter()
            .map(|row| row.into_iter().map(f64::exp).collect())
            .collect())
    }
}

fn check_widths(x: &[Vec<f64>], expected: usize) -> Result<(), ModelError> {
    match x.iter().position(|row| row.len() != expected) {
        Some(row) => Err(ModelError::FeatureCount {
            row,
            expected,
            found: x[row].len(),
        }),
        None => Ok(()),
    }
}

fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Population variance.
fn variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mu = mean(values.clone());
    values.map(|v| (v - mu).powi(2)).sum::<f64>() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::accuracy;

    fn separable() -> (Vec<Vec<f64>>, Vec<i64>) {
        let x = vec![
            vec![100.0, 80.0],
            vec![120.0, 75.0],
            vec![90.0, 85.0],
            vec![110.0, 90.0],
            vec![5000.0, 5.0],
            vec![5200.0, 8.0],
            vec![4800.0, 3.0],
            vec![5100.0, 6.0],
        ];
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn separable_data_is_classified_perfectly() {
        let (x, y) = separable();
        let mut model = GaussianNb::default();
        model.fit(&x, &y).unwrap();

        let train_pred = model.predict(&x).unwrap();
        assert_eq!(accuracy(&y, &train_pred), 1.0);

        let unseen = vec![vec![105.0, 82.0], vec![4900.0, 4.0]];
        assert_eq!(model.predict(&unseen).unwrap(), vec![0, 1]);
    }

    #[test]
    fn fitted_parameters_match_closed_form() {
        let x = vec![vec![1.0], vec![3.0], vec![10.0], vec![14.0]];
        let y = vec![0, 0, 1, 1];
        let mut model = GaussianNb::new(0.0);
        model.fit(&x, &y).unwrap();

        let classes = model.classes();
        assert_eq!(classes[0].label, 0);
        assert_eq!(classes[0].mean, vec![2.0]);
        assert_eq!(classes[0].var, vec![1.0]);
        assert_eq!(classes[1].mean, vec![12.0]);
        assert_eq!(classes[1].var, vec![4.0]);
        assert_eq!(classes[1].prior, 0.5);
    }

    #[test]
    fn constant_features_are_smoothed() {
        let x = vec![vec![1.0, 0.0], vec![1.0, 10.0], vec![2.0, 0.0], vec![2.0, 10.0]];
        let y = vec![0, 0, 1, 1];
        let mut model = GaussianNb::default();
        model.fit(&x, &y).unwrap();
        // first feature is constant inside each class
        assert!(model.classes()[0].var[0] > 0.0);
        assert_eq!(model.predict(&[vec![1.0, 5.0]]).unwrap(), vec![0]);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (x, y) = separable();
        let mut model = GaussianNb::default();
        model.fit(&x, &y).unwrap();
        for row in model.predict_proba(&[vec![1000.0, 40.0]]).unwrap() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn misuse_is_reported() {
        let mut model = GaussianNb::default();
        assert_eq!(model.predict(&[vec![1.0]]), Err(ModelError::NotFitted));
        assert_eq!(model.fit(&[], &[]), Err(ModelError::EmptyTrainingSet));
        assert_eq!(
            model.fit(&[vec![1.0]], &[0, 1]),
            Err(ModelError::LengthMismatch { rows: 1, labels: 2 })
        );
        assert_eq!(
            model.fit(&[vec![1.0, 2.0], vec![1.0]], &[0, 1]),
            Err(ModelError::FeatureCount { row: 1, expected: 2, found: 1 })
        );

        model.fit(&[vec![1.0, 2.0], vec![3.0, 4.0]], &[0, 1]).unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ModelError::FeatureCount { .. })
        ));
    }
}
