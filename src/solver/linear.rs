//! Sparse symmetric system and a Jacobi-preconditioned conjugate gradient.

use crate::error::{Error, Result};

/// Compressed sparse row matrix holding off-diagonal entries, plus a
/// separate diagonal.
#[derive(Clone, Debug)]
pub(crate) struct CsrMatrix {
    row_start: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<f64>,
    diagonal: Vec<f64>,
}

impl CsrMatrix {
    /// The weighted graph Laplacian of `edges` over `n` nodes, with
    /// `extra_diagonal` added to its diagonal.
    pub(crate) fn laplacian(
        n: usize,
        edges: &[(usize, usize, f64)],
        extra_diagonal: &[f64],
    ) -> Self {
        let mut degree = vec![0_usize; n];
        for &(a, b, _) in edges {
            degree[a] += 1;
            degree[b] += 1;
        }
        let mut row_start = Vec::with_capacity(n + 1);
        row_start.push(0);
        for d in &degree {
            let last = row_start[row_start.len() - 1];
            row_start.push(last + d);
        }

        let nnz = row_start[n];
        let mut columns = vec![0; nnz];
        let mut values = vec![0.0; nnz];
        let mut fill = row_start[..n].to_vec();
        let mut diagonal = extra_diagonal.to_vec();
        for &(a, b, w) in edges {
            columns[fill[a]] = b;
            values[fill[a]] = -w;
            fill[a] += 1;
            columns[fill[b]] = a;
            values[fill[b]] = -w;
            fill[b] += 1;
            diagonal[a] += w;
            diagonal[b] += w;
        }
        Self {
            row_start,
            columns,
            values,
            diagonal,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.diagonal.len()
    }

    /// `out = self · x`.
    pub(crate) fn multiply(&self, x: &[f64], out: &mut [f64]) {
        for (row, o) in out.iter_mut().enumerate() {
            let span = self.row_start[row]..self.row_start[row + 1];
            let off: f64 = self.columns[span.clone()]
                .iter()
                .zip(&self.values[span])
                .map(|(c, v)| v * x[*c])
                .sum();
            *o = self.diagonal[row] * x[row] + off;
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Outcome of one converged solve.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Convergence {
    pub(crate) iterations: usize,
    pub(crate) relative_residual: f64,
}

/// Solve `matrix · x = rhs` starting from zero.
///
/// Converges when `|r| <= tolerance · |rhs|`.
#[allow(clippy::needless_range_loop)]
pub(crate) fn conjugate_gradient(
    matrix: &CsrMatrix,
    rhs: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> Result<(Vec<f64>, Convergence)> {
    let n = matrix.size();
    if rhs.len() != n {
        return Err(Error::SolverFailed(format!(
            "right-hand side has {} entries for a {n}x{n} system",
            rhs.len()
        )));
    }
    let mut x = vec![0.0; n];
    let rhs_norm = dot(rhs, rhs).sqrt();
    if rhs_norm == 0.0 {
        return Ok((
            x,
            Convergence {
                iterations: 0,
                relative_residual: 0.0,
            },
        ));
    }

    let inverse_diagonal: Vec<f64> = matrix
        .diagonal
        .iter()
        .map(|d| if *d > 0.0 { 1.0 / d } else { 1.0 })
        .collect();
    let mut r = rhs.to_vec();
    let mut z: Vec<f64> = r.iter().zip(&inverse_diagonal).map(|(a, b)| a * b).collect();
    let mut p = z.clone();
    let mut ap = vec![0.0; n];
    let mut rz = dot(&r, &z);
    let mut residual = 1.0;

    for iteration in 1..=max_iterations {
        matrix.multiply(&p, &mut ap);
        let curvature = dot(&p, &ap);
        if !(curvature.is_finite() && curvature > 0.0) {
            return Err(Error::SolverFailed(format!(
                "conjugate gradient broke down at iteration {iteration}"
            )));
        }
        let alpha = rz / curvature;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }
        residual = dot(&r, &r).sqrt() / rhs_norm;
        if !residual.is_finite() {
            return Err(Error::SolverFailed(format!(
                "residual is not finite at iteration {iteration}"
            )));
        }
        if residual <= tolerance {
            return Ok((
                x,
                Convergence {
                    iterations: iteration,
                    relative_residual: residual,
                },
            ));
        }
        for i in 0..n {
            z[i] = r[i] * inverse_diagonal[i];
        }
        let rz_next = dot(&r, &z);
        let beta = rz_next / rz;
        rz = rz_next;
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
    }

    Err(Error::SolverFailed(format!(
        "no convergence after {max_iterations} iterations (relative residual {residual:.3e})"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laplacian_rows_sum_to_extra_diagonal() {
        let edges = [(0, 1, 2.0), (1, 2, 0.5)];
        let matrix = CsrMatrix::laplacian(3, &edges, &[1.0, 0.0, 3.0]);
        let mut out = vec![0.0; 3];
        matrix.multiply(&[1.0, 1.0, 1.0], &mut out);
        assert_eq!(out, vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn solves_small_system() {
        let edges = [(0, 1, 1.0), (1, 2, 1.0)];
        let matrix = CsrMatrix::laplacian(3, &edges, &[1.0, 1.0, 1.0]);
        let rhs = [1.0, 2.0, 3.0];
        let (x, convergence) = conjugate_gradient(&matrix, &rhs, 10, 1e-10).unwrap();
        assert!(convergence.iterations <= 3);
        let mut check = vec![0.0; 3];
        matrix.multiply(&x, &mut check);
        for (c, b) in check.iter().zip(rhs) {
            assert!((c - b).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_rhs_needs_no_iterations() {
        let matrix = CsrMatrix::laplacian(2, &[(0, 1, 1.0)], &[0.0, 0.0]);
        let (x, convergence) = conjugate_gradient(&matrix, &[0.0, 0.0], 0, 1e-6).unwrap();
        assert_eq!(x, vec![0.0, 0.0]);
        assert_eq!(convergence.iterations, 0);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let edges = [(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)];
        let matrix = CsrMatrix::laplacian(4, &edges, &[0.01; 4]);
        let result = conjugate_gradient(&matrix, &[1.0, 0.0, 0.0, 0.0], 1, 1e-12);
        assert!(matches!(result, Err(Error::SolverFailed(_))));
    }
}
