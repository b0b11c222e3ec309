//! Focal length from two orthogonal vanishing points (spec §4.4).

/// `f = sqrt(-((u1-cx)(u2-cx) + (v1-cy)(v2-cy)))`. `None` if the radicand is
/// negative (the VPs don't imply an orthogonal pair consistent with a
/// positive focal length).
#[must_use]
pub fn focal_from_orthogonal_vps(vp1: (f64, f64), vp2: (f64, f64), principal_point: (f64, f64)) -> Option<f64> {
    let (cx, cy) = principal_point;
    let radicand = -((vp1.0 - cx) * (vp2.0 - cx) + (vp1.1 - cy) * (vp2.1 - cy));
    if radicand < 0.0 {
        return None;
    }
    Some(radicand.sqrt())
}

/// Caller-side sanity bound: reject focal lengths outside `(100, 2*width)`.
#[must_use]
pub fn is_plausible_focal(f: f64, image_width: u32) -> bool {
    f > 100.0 && f < 2.0 * image_width as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orthogonal_vps_on_opposite_sides_of_principal_point_give_a_real_focal() {
        let f = focal_from_orthogonal_vps((1000.0, 500.0), (500.0, 1000.0), (500.0, 500.0));
        assert!(f.is_some());
        let f = f.unwrap();
        // radicand = -((500)(0)+(0)(500)) = 0 here; use a case with opposite signs
        let f2 = focal_from_orthogonal_vps((1000.0, 500.0), (0.0, 500.0), (500.0, 500.0));
        assert!(f2.unwrap() > 0.0);
        let _ = f;
    }

    #[test]
    fn same_side_vps_can_yield_negative_radicand() {
        // both VPs to the right and above principal point -> positive product -> negative radicand
        let f = focal_from_orthogonal_vps((600.0, 600.0), (700.0, 700.0), (500.0, 500.0));
        assert!(f.is_none());
    }

    #[test]
    fn plausibility_bound_rejects_extremes() {
        assert!(!is_plausible_focal(50.0, 1000));
        assert!(!is_plausible_focal(3000.0, 1000));
        assert!(is_plausible_focal(1000.0, 1000));
    }
}
