//! Sparse symmetric system solver.
//!
//! A compressed sparse row matrix and a Jacobi-preconditioned conjugate
//! gradient solver, sized for the per-chart LSCM systems.

use nalgebra::DVector;

use crate::error::{BakeError, Result};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from `(row, col, value)` triplets.
    ///
    /// Entries at the same position are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols, "triplet ({}, {}) out of bounds", row, col);
            if last == Some((row, col)) {
                if let Some(acc) = values.last_mut() {
                    *acc += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }

        // Prefix sum turns per-row counts into offsets.
        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Diagonal entries (zero where none is stored).
    pub fn diagonal(&self) -> DVector<f64> {
        let n = self.rows.min(self.cols);
        let mut diag = DVector::zeros(n);
        for i in 0..n {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                if self.col_idx[k] == i {
                    diag[i] += self.values[k];
                }
            }
        }
        diag
    }

    /// Multiply matrix by vector: `y = A * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "Vector dimension mismatch");

        DVector::from_iterator(
            self.rows,
            (0..self.rows).map(|i| {
                (self.row_ptr[i]..self.row_ptr[i + 1])
                    .map(|k| self.values[k] * x[self.col_idx[k]])
                    .sum::<f64>()
            }),
        )
    }
}

/// Solve `A * x = b` with Jacobi-preconditioned conjugate gradient.
///
/// `a` must be symmetric positive definite. Convergence is declared when the
/// residual norm relative to `b` drops below `tolerance`.
///
/// # Errors
///
/// Returns [`BakeError::ConvergenceFailed`] if the tolerance is not reached in
/// `max_iter` iterations.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    conjugate_gradient_from(a, b, DVector::zeros(b.len()), max_iter, tolerance)
}

/// [`conjugate_gradient`] starting from the initial guess `x0`.
pub fn conjugate_gradient_from(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: DVector<f64>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "Matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "Matrix must be square");
    assert_eq!(x0.len(), n, "Initial guess dimension mismatch");

    let b_norm = b.norm();
    if b_norm < 1e-300 {
        return Ok(DVector::zeros(n));
    }

    let mut x = x0;
    let mut r = b - a.mul_vec(&x);
    if r.norm() / b_norm < tolerance {
        return Ok(x);
    }

    let inv_diag = a
        .diagonal()
        .map(|d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 });

    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for _ in 0..max_iter {
        let ap = a.mul_vec(&p);
        let p_ap = p.dot(&ap);
        if p_ap.abs() < 1e-300 {
            break;
        }
        let alpha = rz / p_ap;

        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        if r.norm() / b_norm < tolerance {
            return Ok(x);
        }

        z = r.component_mul(&inv_diag);
        let rz_next = r.dot(&z);
        let beta = rz_next / rz;
        p = &z + beta * &p;
        rz = rz_next;
    }

    if r.norm() / b_norm < tolerance {
        return Ok(x);
    }

    Err(BakeError::ConvergenceFailed {
        iterations: max_iter,
    })
}
