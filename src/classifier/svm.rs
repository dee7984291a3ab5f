//! Binary RBF C-SVC trained with sequential minimal optimisation.

use crate::error::{Error, Result};

/// Stopping tolerance on the maximal KKT violation.
const KKT_TOLERANCE: f64 = 1e-3;
/// Floor for the curvature of a pair update.
const TAU: f64 = 1e-12;

/// Gaussian RBF kernel `exp(-gamma * |a - b|²)`.
#[inline]
pub(crate) fn rbf(a: &[f64], b: &[f64], gamma: f64) -> f64 {
    let squared: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * squared).exp()
}

/// A trained two-class model; positive decisions favour the first class.
#[derive(Clone, Debug)]
pub(crate) struct BinaryModel {
    support: Vec<Vec<f64>>,
    coef: Vec<f64>,
    rho: f64,
    gamma: f64,
}

impl BinaryModel {
    /// Train on `positive` (+1) versus `negative` (-1) samples.
    #[allow(clippy::many_single_char_names)]
    pub(crate) fn train(
        positive: &[&[f64]],
        negative: &[&[f64]],
        c: f64,
        gamma: f64,
    ) -> Result<Self> {
        if positive.is_empty() || negative.is_empty() {
            return Err(Error::Classifier(
                "both classes of a pair need training samples".to_owned(),
            ));
        }
        let x: Vec<&[f64]> = positive.iter().chain(negative).copied().collect();
        let y: Vec<f64> = core::iter::repeat_n(1.0, positive.len())
            .chain(core::iter::repeat_n(-1.0, negative.len()))
            .collect();
        let l = x.len();

        let mut kernel = vec![0.0; l * l];
        for i in 0..l {
            for j in i..l {
                let k = rbf(x[i], x[j], gamma);
                kernel[i * l + j] = k;
                kernel[j * l + i] = k;
            }
        }
        let q = |i: usize, j: usize| y[i] * y[j] * kernel[i * l + j];

        let mut alpha = vec![0.0; l];
        let mut grad = vec![-1.0; l];
        let max_iterations = (100 * l).max(100_000);
        let mut converged = false;

        for _ in 0..max_iterations {
            let mut g_max = f64::NEG_INFINITY;
            let mut g_min = f64::INFINITY;
            let (mut i, mut j) = (usize::MAX, usize::MAX);
            for t in 0..l {
                let score = -y[t] * grad[t];
                let up = if y[t] > 0.0 { alpha[t] < c } else { alpha[t] > 0.0 };
                let low = if y[t] > 0.0 { alpha[t] > 0.0 } else { alpha[t] < c };
                if up && score >= g_max {
                    g_max = score;
                    i = t;
                }
                if low && score <= g_min {
                    g_min = score;
                    j = t;
                }
            }
            if i == usize::MAX || j == usize::MAX || g_max - g_min < KKT_TOLERANCE {
                converged = true;
                break;
            }

            let (old_i, old_j) = (alpha[i], alpha[j]);
            let (k_ii, k_jj) = (kernel[i * l + i], kernel[j * l + j]);
            if y[i] == y[j] {
                let quad = (k_ii + k_jj - 2.0 * q(i, j)).max(TAU);
                let delta = (grad[i] - grad[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            } else {
                let quad = (k_ii + k_jj + 2.0 * q(i, j)).max(TAU);
                let delta = (-grad[i] - grad[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            }

            let (delta_i, delta_j) = (alpha[i] - old_i, alpha[j] - old_j);
            for (t, g) in grad.iter_mut().enumerate() {
                *g += q(t, i) * delta_i + q(t, j) * delta_j;
            }
        }

        if !converged {
            trace_warn!(samples = l, "SVM optimisation stopped at the iteration cap");
        }

        let rho = bias(&y, &grad, &alpha, c);
        let mut support = Vec::new();
        let mut coef = Vec::new();
        for t in 0..l {
            if alpha[t] > 0.0 {
                support.push(x[t].to_vec());
                coef.push(alpha[t] * y[t]);
            }
        }
        Ok(Self {
            support,
            coef,
            rho,
            gamma,
        })
    }

    /// Signed decision value at `x`.
    pub(crate) fn decision(&self, x: &[f64]) -> f64 {
        let sum: f64 = self
            .support
            .iter()
            .zip(&self.coef)
            .map(|(sv, coef)| coef * rbf(sv, x, self.gamma))
            .sum();
        sum - self.rho
    }

    /// Number of support vectors.
    pub(crate) fn support_count(&self) -> usize {
        self.support.len()
    }
}

/// Offset from free multipliers, or the midpoint of the feasible interval.
#[allow(clippy::cast_precision_loss)]
fn bias(y: &[f64], grad: &[f64], alpha: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free = 0_usize;
    for t in 0..y.len() {
        let yg = y[t] * grad[t];
        let at_upper = alpha[t] >= c;
        let at_lower = alpha[t] <= 0.0;
        if at_upper {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if at_lower {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free += 1;
            free_sum += yg;
        }
    }
    if free > 0 {
        free_sum / free as f64
    } else {
        (upper + lower) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_clusters() {
        let pos: Vec<Vec<f64>> = vec![vec![0.0, 0.0], vec![0.2, 0.1], vec![0.1, 0.3]];
        let neg: Vec<Vec<f64>> = vec![vec![2.0, 2.0], vec![2.1, 1.8], vec![1.9, 2.2]];
        let pos_refs: Vec<&[f64]> = pos.iter().map(Vec::as_slice).collect();
        let neg_refs: Vec<&[f64]> = neg.iter().map(Vec::as_slice).collect();
        let model = BinaryModel::train(&pos_refs, &neg_refs, 10.0, 0.5).unwrap();
        assert!(model.support_count() > 0);
        for p in &pos {
            assert!(model.decision(p) > 0.0);
        }
        for n in &neg {
            assert!(model.decision(n) < 0.0);
        }
        assert!(model.decision(&[-0.5, -0.5]) > 0.0);
        assert!(model.decision(&[2.5, 2.5]) < 0.0);
    }

    #[test]
    fn symmetric_problem_has_zero_bias() {
        let pos = [[0.0_f64]];
        let neg = [[1.0_f64]];
        let pos_refs: Vec<&[f64]> = pos.iter().map(|p| p.as_slice()).collect();
        let neg_refs: Vec<&[f64]> = neg.iter().map(|p| p.as_slice()).collect();
        let model = BinaryModel::train(&pos_refs, &neg_refs, 1.0, 1.0).unwrap();
        assert!((model.decision(&[0.0]) + model.decision(&[1.0])).abs() < 1e-9);
        assert!(model.decision(&[0.0]) > 0.0);
    }

    #[test]
    fn empty_class_is_rejected() {
        let pos = [[0.0_f64]];
        let pos_refs: Vec<&[f64]> = pos.iter().map(|p| p.as_slice()).collect();
        assert!(BinaryModel::train(&pos_refs, &[], 1.0, 1.0).is_err());
    }
}
