//! Smallest-eigenvalue eigenvector via shifted inverse power iteration
//! (spec §4.1): at most 100 iterations, shift 1e-6, stop when `‖y‖ < 1e-10`.
//! This is the kernel's substitute for a full SVD — every place the rest of
//! the crate would reach for "solve the homogeneous system `Ax=0`" instead
//! calls `smallest_singular_vector`, which runs this on `AᵀA`.

use super::gauss;

const MAX_ITERATIONS: usize = 100;
const SHIFT: f64 = 1e-6;
const DEGENERATE_NORM: f64 = 1e-10;

/// Eigenvector corresponding to the smallest eigenvalue of a symmetric
/// matrix `m`, found by inverse power iteration on the shifted matrix
/// `m + shift * I`. Returns `None` if the shifted matrix is itself singular
/// at some iteration, or if the iterate degenerates to (near) zero.
#[must_use]
pub fn smallest_eigenvector(m: &[Vec<f64>]) -> Option<Vec<f64>> {
    let n = m.len();
    if n == 0 {
        return None;
    }

    let mut shifted = m.to_vec();
    for i in 0..n {
        shifted[i][i] += SHIFT;
    }

    let mut x = vec![1.0 / (n as f64).sqrt(); n];
    for _ in 0..MAX_ITERATIONS {
        let y = gauss::solve(&shifted, &x)?;
        let norm: f64 = y.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm < DEGENERATE_NORM {
            return None;
        }
        let next: Vec<f64> = y.iter().map(|v| v / norm).collect();

        let delta: f64 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if delta < 1e-12 {
            break;
        }
    }
    Some(x)
}

/// Finds the unit vector `h` minimizing `‖A h‖` subject to `‖h‖ = 1`, by
/// taking the smallest eigenvector of `AᵀA`. Used for homogeneous linear
/// systems (vanishing-point fit, DLT homography/essential-matrix solves).
#[must_use]
pub fn smallest_singular_vector(a: &[Vec<f64>]) -> Option<Vec<f64>> {
    let ata = gauss::ata(a);
    smallest_eigenvector(&ata)
}

/// Eigenvector of the largest eigenvalue of a symmetric matrix, by plain
/// power iteration (no shift needed: the dominant eigenvalue is what the
/// iteration converges to directly).
#[must_use]
pub fn largest_eigenvector(m: &[Vec<f64>]) -> Option<Vec<f64>> {
    let n = m.len();
    if n == 0 {
        return None;
    }
    let mut x = vec![1.0 / (n as f64).sqrt(); n];
    for _ in 0..MAX_ITERATIONS {
        let y = gauss::mat_vec(m, &x);
        let norm: f64 = y.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm < DEGENERATE_NORM {
            return None;
        }
        let next: Vec<f64> = y.iter().map(|v| v / norm).collect();
        let delta: f64 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if delta < 1e-12 {
            break;
        }
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smallest_eigenvector_of_diagonal_matches_smallest_entry() {
        let m = vec![
            vec![5.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 9.0],
        ];
        let v = smallest_eigenvector(&m).unwrap();
        // eigenvector for eigenvalue 1 is e_1 (up to sign)
        assert!(v[0].abs() < 1e-4);
        assert!((v[1].abs() - 1.0).abs() < 1e-4);
        assert!(v[2].abs() < 1e-4);
    }

    #[test]
    fn singular_vector_solves_homogeneous_system() {
        // Ax=0 exactly for x=(1,-1,0)/sqrt2 given rows orthogonal to it
        let a = vec![vec![1.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
        let h = smallest_singular_vector(&a).unwrap();
        let residual = h[0] + h[1];
        assert!(residual.abs() < 1e-4);
    }
}
