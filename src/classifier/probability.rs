//! Turning decision values into probabilities: Platt scaling per class pair
//! and pairwise coupling across all labels.

const PLATT_MAX_ITERATIONS: usize = 100;
const PLATT_MIN_STEP: f64 = 1e-10;
const PLATT_SIGMA: f64 = 1e-12;
const PLATT_EPS: f64 = 1e-5;
/// Pairwise probabilities are kept away from 0 and 1 before coupling.
const MIN_PAIRWISE: f64 = 1e-7;

/// `P(first class | decision) = 1 / (1 + exp(a·decision + b))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Sigmoid {
    a: f64,
    b: f64,
}

/// Log-loss contribution of one sample, evaluated without overflow.
fn log_loss(f_ap_b: f64, target: f64) -> f64 {
    if f_ap_b >= 0.0 {
        target * f_ap_b + (-f_ap_b).exp().ln_1p()
    } else {
        (target - 1.0) * f_ap_b + f_ap_b.exp().ln_1p()
    }
}

impl Sigmoid {
    /// Fit with Newton's method and backtracking on regularised targets.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn fit(decisions: &[f64], positive: &[bool]) -> Self {
        let prior1 = positive.iter().filter(|p| **p).count() as f64;
        let prior0 = positive.len() as f64 - prior1;
        let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
        let lo_target = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = positive
            .iter()
            .map(|p| if *p { hi_target } else { lo_target })
            .collect();

        let objective = |a: f64, b: f64| -> f64 {
            decisions
                .iter()
                .zip(&targets)
                .map(|(d, t)| log_loss(d * a + b, *t))
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut value = objective(a, b);

        for _ in 0..PLATT_MAX_ITERATIONS {
            let (mut h11, mut h22, mut h21) = (PLATT_SIGMA, PLATT_SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (d, t) in decisions.iter().zip(&targets) {
                let f_ap_b = d * a + b;
                let (p, q) = if f_ap_b >= 0.0 {
                    let e = (-f_ap_b).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f_ap_b.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += d * d * d2;
                h22 += d2;
                h21 += d * d2;
                let d1 = t - p;
                g1 += d * d1;
                g2 += d1;
            }
            if g1.abs() < PLATT_EPS && g2.abs() < PLATT_EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let step_a = -(h22 * g1 - h21 * g2) / det;
            let step_b = -(-h21 * g1 + h11 * g2) / det;
            let directional = g1 * step_a + g2 * step_b;

            let mut step = 1.0;
            while step >= PLATT_MIN_STEP {
                let (new_a, new_b) = (a + step * step_a, b + step * step_b);
                let new_value = objective(new_a, new_b);
                if new_value < value + 1e-4 * step * directional {
                    a = new_a;
                    b = new_b;
                    value = new_value;
                    break;
                }
                step /= 2.0;
            }
            if step < PLATT_MIN_STEP {
                trace_debug!("Platt scaling line search failed");
                break;
            }
        }
        Self { a, b }
    }

    /// Probability of the first class.
    pub(crate) fn predict(self, decision: f64) -> f64 {
        let f_ap_b = decision * self.a + self.b;
        if f_ap_b >= 0.0 {
            let e = (-f_ap_b).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f_ap_b.exp())
        }
    }
}

/// Combine pairwise probabilities `r[i][j] = P(i | i or j)` into class
/// probabilities (Wu, Lin and Weng, method 2).
#[allow(clippy::cast_precision_loss, clippy::needless_range_loop)]
pub(crate) fn couple(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 1 {
        return vec![1.0];
    }
    let pair = |i: usize, j: usize| r[i][j].clamp(MIN_PAIRWISE, 1.0 - MIN_PAIRWISE);
    if k == 2 {
        let p0 = pair(0, 1);
        return vec![p0, 1.0 - p0];
    }

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j != t {
                q[t][t] += pair(j, t) * pair(j, t);
                q[t][j] = -pair(j, t) * pair(t, j);
            }
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let max_iterations = 100.max(k);
    let eps = 0.005 / k as f64;
    for _ in 0..max_iterations {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp
            .iter()
            .map(|v| (v - pqp).abs())
            .fold(0.0_f64, f64::max);
        if max_error < eps {
            break;
        }
        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
    p
}
