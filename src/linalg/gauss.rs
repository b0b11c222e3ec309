//! Gauss-Jordan elimination with partial pivoting, for arbitrary n. This is
//! the one general-purpose dense solve the rest of the kernel builds on:
//! 4x4 inverse, PnP/essential-matrix linear systems, and the
//! Levenberg-Marquardt normal equations all route through it.

/// Solve `a * x = b` for a square system of size n via Gauss-Jordan
/// elimination with partial pivoting. `a` is consumed as a working copy.
/// Returns `None` if any pivot's magnitude falls below `1e-10` (spec §4.1
/// "singular pivot").
#[must_use]
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = a.len();
    assert_eq!(b.len(), n);
    assert!(a.iter().all(|row| row.len() == n));

    // augmented matrix [A | b]
    let mut aug: Vec<Vec<f64>> = a
        .iter()
        .zip(b.iter())
        .map(|(row, &bi)| {
            let mut r = row.clone();
            r.push(bi);
            r
        })
        .collect();

    for col in 0..n {
        // partial pivot: largest magnitude entry in this column, at or below the diagonal
        let mut pivot_row = col;
        let mut pivot_val = aug[col][col].abs();
        for r in (col + 1)..n {
            if aug[r][col].abs() > pivot_val {
                pivot_val = aug[r][col].abs();
                pivot_row = r;
            }
        }
        if pivot_val < 1e-10 {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = aug[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..=n {
                aug[r][c] -= factor * aug[col][c];
            }
        }
    }

    Some((0..n).map(|r| aug[r][n]).collect())
}

/// Invert an n x n matrix by solving `A x_i = e_i` for each standard basis
/// vector. `None` on a singular pivot.
#[must_use]
pub fn invert(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut columns = Vec::with_capacity(n);
    for i in 0..n {
        let mut e = vec![0.0; n];
        e[i] = 1.0;
        columns.push(solve(a, &e)?);
    }
    // columns[i] is the i-th column of the inverse; transpose into rows
    let mut inv = vec![vec![0.0; n]; n];
    for (i, col) in columns.iter().enumerate() {
        for (r, &v) in col.iter().enumerate() {
            inv[r][i] = v;
        }
    }
    Some(inv)
}

/// Multiply an m x n matrix by an n-vector.
#[must_use]
pub fn mat_vec(a: &[Vec<f64>], x: &[f64]) -> Vec<f64> {
    a.iter().map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum()).collect()
}

/// `A^T * A` for an m x n matrix.
#[must_use]
pub fn ata(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let m = a.len();
    let n = if m == 0 { 0 } else { a[0].len() };
    let mut out = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            out[i][j] = (0..m).map(|k| a[k][i] * a[k][j]).sum();
        }
    }
    out
}

/// `A^T * b` for an m x n matrix `a` and length-m vector `b`.
#[must_use]
pub fn atb(a: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let m = a.len();
    let n = if m == 0 { 0 } else { a[0].len() };
    (0..n).map(|i| (0..m).map(|k| a[k][i] * b[k]).sum()).collect()
}
