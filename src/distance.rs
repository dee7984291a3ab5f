//! Distance functions between per-voxel feature vectors.
//!
//! The diffusion solver turns the distance between the feature vectors of two
//! neighbouring voxels into an edge weight. Each channel of a parameter range
//! declares which of these functions a generator may choose from; a parameter
//! set records its choice as an index into that declared list.
//!
//! | Function | Short name | Definition |
//! |----------|------------|------------|
//! | [`L1`](DistanceFunction::L1) | `l1` | `Σ |aᵢ - bᵢ|` |
//! | [`L2`](DistanceFunction::L2) | `l2` | `sqrt(Σ (aᵢ - bᵢ)²)` |
//! | [`LInfinity`](DistanceFunction::LInfinity) | `linf` | `max |aᵢ - bᵢ|` |
//! | [`Cosine`](DistanceFunction::Cosine) | `cos` | `1 - cos θ`, 0 for a zero-length vector |
//! | [`JensenShannon`](DistanceFunction::JensenShannon) | `js` | square root of the JS divergence of the normalised vectors |
//! | [`KullbackLeibler`](DistanceFunction::KullbackLeibler) | `kl` | `Σ pᵢ ln(pᵢ / qᵢ)` over the normalised vectors |
//! | [`ChiSquare`](DistanceFunction::ChiSquare) | `cs` | `½ Σ (pᵢ - qᵢ)² / (pᵢ + qᵢ)` over the normalised vectors |
//! | [`EarthMovers`](DistanceFunction::EarthMovers) | `em` | `Σ |cumulative(p - q)|` over the normalised vectors |
//! | [`Squared`](DistanceFunction::Squared) | `sq` | `Σ (aᵢ - bᵢ)²` |
//! | [`Null`](DistanceFunction::Null) | `null` | always 0 |
//!
//! "Normalised" means divided by the component sum; a vector whose sum is not
//! positive is used unchanged.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A distance between two equally long feature vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistanceFunction {
    /// Manhattan distance.
    L1,
    /// Euclidean distance.
    L2,
    /// Chebyshev distance.
    LInfinity,
    /// One minus the cosine of the angle between the vectors.
    Cosine,
    /// Jensen-Shannon distance.
    JensenShannon,
    /// Kullback-Leibler divergence.
    KullbackLeibler,
    /// Chi-square distance.
    ChiSquare,
    /// Earth mover's distance for one-dimensional histograms.
    EarthMovers,
    /// Squared Euclidean distance.
    Squared,
    /// Constant zero.
    Null,
}

impl DistanceFunction {
    /// Every distance function, in registry order.
    pub const ALL: [Self; 10] = [
        Self::L1,
        Self::L2,
        Self::LInfinity,
        Self::Cosine,
        Self::JensenShannon,
        Self::KullbackLeibler,
        Self::ChiSquare,
        Self::EarthMovers,
        Self::Squared,
        Self::Null,
    ];

    /// The token used in parameter range files and descriptors.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::LInfinity => "linf",
            Self::Cosine => "cos",
            Self::JensenShannon => "js",
            Self::KullbackLeibler => "kl",
            Self::ChiSquare => "cs",
            Self::EarthMovers => "em",
            Self::Squared => "sq",
            Self::Null => "null",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::L1 => "L1 norm",
            Self::L2 => "L2 norm",
            Self::LInfinity => "L-infinity norm",
            Self::Cosine => "Cosine distance",
            Self::JensenShannon => "Jensen-Shannon distance",
            Self::KullbackLeibler => "Kullback-Leibler divergence",
            Self::ChiSquare => "Chi-square distance",
            Self::EarthMovers => "Earth mover's distance",
            Self::Squared => "Squared distance",
            Self::Null => "Null distance",
        }
    }

    /// Look a function up by its short name.
    #[must_use]
    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.short_name() == name)
    }

    /// Distance between `a` and `b`.
    ///
    /// Only the common prefix is compared if the lengths differ.
    #[must_use]
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        let n = a.len().min(b.len());
        let (a, b) = (&a[..n], &b[..n]);
        match self {
            Self::L1 => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Self::L2 => squared(a, b).sqrt(),
            Self::LInfinity => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            Self::Cosine => cosine(a, b),
            Self::JensenShannon => jensen_shannon(&normalized(a), &normalized(b)),
            Self::KullbackLeibler => kullback_leibler(&normalized(a), &normalized(b)),
            Self::ChiSquare => chi_square(&normalized(a), &normalized(b)),
            Self::EarthMovers => earth_movers(&normalized(a), &normalized(b)),
            Self::Squared => squared(a, b),
            Self::Null => 0.0,
        }
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

fn squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let len_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let len_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if len_a == 0.0 || len_b == 0.0 {
        return 0.0;
    }
    1.0 - (dot / (len_a * len_b)).clamp(-1.0, 1.0)
}

fn normalized(v: &[f64]) -> Vec<f64> {
    let sum: f64 = v.iter().sum();
    if sum > 0.0 {
        v.iter().map(|x| x / sum).collect()
    } else {
        v.to_vec()
    }
}

fn kullback_leibler(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .map(|(pi, qi)| pi * (pi / qi).ln())
        .filter(|term| term.is_finite())
        .sum()
}

fn jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    let m: Vec<f64> = p.iter().zip(q).map(|(x, y)| 0.5 * (x + y)).collect();
    let divergence = 0.5 * kullback_leibler(p, &m) + 0.5 * kullback_leibler(q, &m);
    divergence.max(0.0).sqrt()
}

fn chi_square(p: &[f64], q: &[f64]) -> f64 {
    let sum: f64 = p
        .iter()
        .zip(q)
        .filter(|(x, y)| *x + *y != 0.0)
        .map(|(x, y)| (x - y) * (x - y) / (x + y))
        .sum();
    sum / 2.0
}

fn earth_movers(p: &[f64], q: &[f64]) -> f64 {
    let mut carried = 0.0;
    let mut total = 0.0;
    for (x, y) in p.iter().zip(q) {
        carried += x - y;
        total += f64::abs(carried);
    }
    total
}
