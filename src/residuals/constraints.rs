//! Residuals for every `ConstraintKind` variant (spec §4.8 / §3).

use super::autodiff::Dual;
use crate::types::constraint::ConstraintKind;
use crate::types::ids::PointId;
use crate::types::Line;

fn sub(a: &[Dual; 3], b: &[Dual; 3]) -> [Dual; 3] {
    [&a[0] - &b[0], &a[1] - &b[1], &a[2] - &b[2]]
}

fn dot(a: &[Dual; 3], b: &[Dual; 3]) -> Dual {
    &(&(&a[0] * &b[0]) + &(&a[1] * &b[1])) + &(&a[2] * &b[2])
}

fn cross(a: &[Dual; 3], b: &[Dual; 3]) -> [Dual; 3] {
    [
        &(&a[1] * &b[2]) - &(&a[2] * &b[1]),
        &(&a[2] * &b[0]) - &(&a[0] * &b[2]),
        &(&a[0] * &b[1]) - &(&a[1] * &b[0]),
    ]
}

fn norm(a: &[Dual; 3]) -> Dual {
    dot(a, a).sqrt()
}

fn normalize(a: &[Dual; 3], n: usize) -> [Dual; 3] {
    let len = norm(a);
    if len.value.abs() < 1e-12 {
        return [Dual::constant(0.0, n), Dual::constant(0.0, n), Dual::constant(0.0, n)];
    }
    [&a[0] / &len, &a[1] / &len, &a[2] / &len]
}

/// `FixedPoint`: one residual per fixed axis, `optimized - target`. Note
/// this is distinct from a user *lock* (which removes the axis from the
/// parameter vector entirely) — a `FixedPoint` constraint instead pins an
/// otherwise-free axis via a soft residual, useful when the same point
/// needs to participate in other residuals as a true variable.
#[must_use]
pub fn fixed_point(point: &[Dual; 3], target: [Option<f64>; 3]) -> Vec<Dual> {
    let n = point[0].n_params();
    (0..3)
        .filter_map(|axis| target[axis].map(|t| &point[axis] - &Dual::constant(t, n)))
        .collect()
}

/// `Distance`: `||pA - pB|| - target`.
#[must_use]
pub fn distance(point_a: &[Dual; 3], point_b: &[Dual; 3], target: f64) -> Dual {
    let d = sub(point_a, point_b);
    let n = norm(&d);
    n.add_scalar(-target)
}

/// `Angle`: angle at `vertex` between `pA` and `pC`, minus `target_radians`.
#[must_use]
pub fn angle(point_a: &[Dual; 3], vertex: &[Dual; 3], point_c: &[Dual; 3], target_radians: f64) -> Dual {
    let n = vertex[0].n_params();
    let u = normalize(&sub(point_a, vertex), n);
    let w = normalize(&sub(point_c, vertex), n);
    dot(&u, &w).acos().add_scalar(-target_radians)
}

/// `ParallelLines`: `1 - |dot(unit_dir_a, unit_dir_b)|` (zero when parallel
/// or anti-parallel).
#[must_use]
pub fn parallel_lines(dir_a: &[Dual; 3], dir_b: &[Dual; 3]) -> Dual {
    let n = dir_a[0].n_params();
    let ua = normalize(dir_a, n);
    let ub = normalize(dir_b, n);
    let d = dot(&ua, &ub);
    let one = Dual::constant(1.0, n);
    &one - &d.abs()
}

/// `PerpendicularLines`: `dot(unit_dir_a, unit_dir_b)`, zero when orthogonal.
#[must_use]
pub fn perpendicular_lines(dir_a: &[Dual; 3], dir_b: &[Dual; 3]) -> Dual {
    let n = dir_a[0].n_params();
    let ua = normalize(dir_a, n);
    let ub = normalize(dir_b, n);
    dot(&ua, &ub)
}

/// `CollinearPoints`: for each point beyond the first two, the normalized
/// cross-product magnitude of `(p_i - p0)` and `(p1 - p0)`.
#[must_use]
pub fn collinear_points(points: &[[Dual; 3]]) -> Vec<Dual> {
    if points.len() < 3 {
        return Vec::new();
    }
    let n = points[0][0].n_params();
    let base = sub(&points[1], &points[0]);
    let base_len = norm(&base);
    points[2..]
        .iter()
        .map(|p| {
            let v = sub(p, &points[0]);
            let v_len = norm(&v);
            let c = cross(&v, &base);
            let denom = &base_len * &v_len;
            if denom.value.abs() < 1e-9 {
                Dual::constant(0.0, n)
            } else {
                &norm(&c) / &denom
            }
        })
        .collect()
}

/// `CoplanarPoints` (n>=4): scalar triple product of the first four points,
/// then one more residual per extra point against the basis established by
/// the first three.
#[must_use]
pub fn coplanar_points(points: &[[Dual; 3]]) -> Vec<Dual> {
    if points.len() < 4 {
        return Vec::new();
    }
    let e1 = sub(&points[1], &points[0]);
    let e2 = sub(&points[2], &points[0]);
    let normal = cross(&e1, &e2);
    points[3..].iter().map(|p| dot(&sub(p, &points[0]), &normal)).collect()
}

/// `EqualDistances`: for k pairs, `k-1` residuals `dist_i - dist_0`. Callers
/// compute each pair's distance with `distance()` and pass the results here.
#[must_use]
pub fn equal_distances(distances: &[Dual]) -> Vec<Dual> {
    if distances.len() < 2 {
        return Vec::new();
    }
    distances[1..].iter().map(|d| d - &distances[0]).collect()
}

/// `EqualAngles`: analogous, `k-1` residuals in radians.
#[must_use]
pub fn equal_angles(angles: &[Dual]) -> Vec<Dual> {
    if angles.len() < 2 {
        return Vec::new();
    }
    angles[1..].iter().map(|a| a - &angles[0]).collect()
}

/// A `Line`'s direction vector in world space (unnormalized), from its two
/// endpoints' current `Dual` coordinates.
#[must_use]
pub fn line_direction(line: &Line, xyz_of: impl Fn(PointId) -> [Dual; 3]) -> [Dual; 3] {
    sub(&xyz_of(line.point_b), &xyz_of(line.point_a))
}

/// True for every variant that produces at least one residual given the
/// constraint's structural arity (checked separately by
/// `ConstraintKind::is_structurally_valid` at scene-validation time).
#[must_use]
pub fn participates_in_residuals(kind: &ConstraintKind) -> bool {
    kind.is_structurally_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(v: [f64; 3], n: usize, base: usize) -> [Dual; 3] {
        std::array::from_fn(|i| Dual::variable(v[i], base + i, n))
    }

    #[test]
    fn distance_residual_is_zero_at_target() {
        let n = 6;
        let a = point([0.0, 0.0, 0.0], n, 0);
        let b = point([3.0, 4.0, 0.0], n, 3);
        let r = distance(&a, &b, 5.0);
        assert!(r.value.abs() < 1e-9);
    }

    #[test]
    fn collinear_residual_is_zero_for_points_on_a_line() {
        let n = 9;
        let p0 = point([0.0, 0.0, 0.0], n, 0);
        let p1 = point([1.0, 0.0, 0.0], n, 3);
        let p2 = point([2.0, 0.0, 0.0], n, 6);
        let r = collinear_points(&[p0, p1, p2]);
        assert_eq!(r.len(), 1);
        assert!(r[0].value.abs() < 1e-9);
    }

    #[test]
    fn perpendicular_residual_is_zero_for_orthogonal_directions() {
        let n = 6;
        let dir_a = [Dual::constant(1.0, n), Dual::constant(0.0, n), Dual::constant(0.0, n)];
        let dir_b = [Dual::constant(0.0, n), Dual::constant(1.0, n), Dual::constant(0.0, n)];
        let r = perpendicular_lines(&dir_a, &dir_b);
        assert!(r.value.abs() < 1e-12);
    }
}
