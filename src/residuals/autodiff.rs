//! Forward-mode scalar automatic differentiation (spec §4.8): "every
//! quantity [is] either a constant or a node with recorded partial
//! derivatives; arithmetic, trig, and vector ops propagate them forward."
//!
//! Each `Dual` carries a value plus a dense gradient over the whole packed
//! parameter vector. Dense rather than truly sparse — simpler, and the
//! packed vector in this system (a handful of cameras and world points) is
//! small enough that a sparse representation would just add bookkeeping
//! without changing the asymptotics that matter here.

use std::ops::{Add, Div, Mul, Neg, Sub};

#[derive(Debug, Clone)]
pub struct Dual {
    pub value: f64,
    pub grad: Vec<f64>,
}

impl Dual {
    #[must_use]
    pub fn constant(value: f64, n_params: usize) -> Self {
        Self { value, grad: vec![0.0; n_params] }
    }

    #[must_use]
    pub fn variable(value: f64, index: usize, n_params: usize) -> Self {
        let mut grad = vec![0.0; n_params];
        grad[index] = 1.0;
        Self { value, grad }
    }

    #[must_use]
    pub fn sqrt(&self) -> Self {
        let v = self.value.max(0.0).sqrt();
        let scale = if v.abs() < 1e-12 { 0.0 } else { 0.5 / v };
        Self { value: v, grad: self.grad.iter().map(|g| g * scale).collect() }
    }

    #[must_use]
    pub fn sin(&self) -> Self {
        let c = self.value.cos();
        Self { value: self.value.sin(), grad: self.grad.iter().map(|g| g * c).collect() }
    }

    #[must_use]
    pub fn cos(&self) -> Self {
        let s = -self.value.sin();
        Self { value: self.value.cos(), grad: self.grad.iter().map(|g| g * s).collect() }
    }

    #[must_use]
    pub fn abs(&self) -> Self {
        let sign = if self.value < 0.0 { -1.0 } else { 1.0 };
        Self { value: self.value.abs(), grad: self.grad.iter().map(|g| g * sign).collect() }
    }

    #[must_use]
    pub fn acos(&self) -> Self {
        let v = self.value.clamp(-1.0, 1.0);
        let denom = (1.0 - v * v).sqrt();
        let scale = if denom < 1e-9 { 0.0 } else { -1.0 / denom };
        Self { value: v.acos(), grad: self.grad.iter().map(|g| g * scale).collect() }
    }

    #[must_use]
    pub fn n_params(&self) -> usize {
        self.grad.len()
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
        self.grad.iter().zip(&other.grad).map(|(&a, &b)| f(a, b)).collect()
    }
}

impl Add for &Dual {
    type Output = Dual;
    fn add(self, rhs: &Dual) -> Dual {
        Dual { value: self.value + rhs.value, grad: self.zip_with(rhs, |a, b| a + b) }
    }
}

impl Sub for &Dual {
    type Output = Dual;
    fn sub(self, rhs: &Dual) -> Dual {
        Dual { value: self.value - rhs.value, grad: self.zip_with(rhs, |a, b| a - b) }
    }
}

impl Mul for &Dual {
    type Output = Dual;
    fn mul(self, rhs: &Dual) -> Dual {
        let (u, v) = (self.value, rhs.value);
        Dual { value: u * v, grad: self.zip_with(rhs, |du, dv| du * v + u * dv) }
    }
}

impl Div for &Dual {
    type Output = Dual;
    fn div(self, rhs: &Dual) -> Dual {
        let (u, v) = (self.value, rhs.value);
        let v2 = v * v;
        Dual { value: u / v, grad: self.zip_with(rhs, |du, dv| (du * v - u * dv) / v2) }
    }
}

impl Neg for &Dual {
    type Output = Dual;
    fn neg(self) -> Dual {
        Dual { value: -self.value, grad: self.grad.iter().map(|g| -g).collect() }
    }
}

impl Dual {
    #[must_use]
    pub fn scale(&self, s: f64) -> Self {
        Self { value: self.value * s, grad: self.grad.iter().map(|g| g * s).collect() }
    }

    #[must_use]
    pub fn add_scalar(&self, s: f64) -> Self {
        Self { value: self.value + s, grad: self.grad.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_rule_matches_hand_derivative() {
        let n = 1;
        let x = Dual::variable(3.0, 0, n);
        let y = &x * &x; // y = x^2, dy/dx = 2x = 6
        assert!((y.value - 9.0).abs() < 1e-12);
        assert!((y.grad[0] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn quotient_rule_matches_hand_derivative() {
        let n = 1;
        let x = Dual::variable(2.0, 0, n);
        let c = Dual::constant(10.0, n);
        let y = &c / &x; // y = 10/x, dy/dx = -10/x^2 = -2.5
        assert!((y.value - 5.0).abs() < 1e-12);
        assert!((y.grad[0] + 2.5).abs() < 1e-9);
    }

    #[test]
    fn sqrt_of_variable_matches_hand_derivative() {
        let n = 1;
        let x = Dual::variable(4.0, 0, n);
        let y = x.sqrt(); // dy/dx = 1/(2*sqrt(x)) = 0.25
        assert!((y.value - 2.0).abs() < 1e-12);
        assert!((y.grad[0] - 0.25).abs() < 1e-9);
    }
}
