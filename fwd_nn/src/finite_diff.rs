//! Finite difference utilities for derivative verification.
//!
//! Provides numerical parameter derivatives for testing the forward-mode
//! derivatives produced by [`Unit::evaluate_with_derivative`].

use fwd_tensor::Tensor;

use crate::error::Result;
use crate::unit::Unit;

/// Derivative of every output of `unit` with respect to one parameter.
///
/// Uses central differences `(f(w + eps) - f(w - eps)) / (2 * eps)` and
/// restores the parameter afterwards, also when evaluation fails.
///
/// # Example
/// ```
/// use fwd_nn::{finite_diff::parameter_finite_diff, Affine};
/// use fwd_tensor::Tensor;
///
/// // y = ReLU(2x + 1); dy/dw = x
/// let mut unit = Affine::new(vec![vec![2.0]], vec![1.0]).unwrap();
/// let x = Tensor::vector(vec![3.0]).unwrap();
/// let d = parameter_finite_diff(&mut unit, &x, 0, 1e-2).unwrap();
///
/// assert!((d[0] - 3.0).abs() < 1e-3);
/// ```
pub fn parameter_finite_diff(
    unit: &mut dyn Unit,
    input: &Tensor,
    parameter: usize,
    eps: f32,
) -> Result<Vec<f32>> {
    let original = unit.parameter(parameter)?;

    let mut shifted = |delta: f32| -> Result<Tensor> {
        unit.set_parameter(parameter, original + delta)?;
        unit.evaluate(input)
    };
    let plus = shifted(eps);
    let minus = shifted(-eps);
    unit.set_parameter(parameter, original)?;

    let (plus, minus) = (plus?, minus?);
    Ok(plus
        .iter()
        .zip(minus.iter())
        .map(|(p, m)| (p - m) / (2.0 * eps))
        .collect())
}

/// Maximum absolute elementwise difference between two derivative vectors.
///
/// Vectors of different lengths are compared over their common prefix.
pub fn max_abs_error(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Affine;

    #[test]
    fn test_finite_diff_restores_parameter() {
        let mut unit = Affine::new(vec![vec![1.0, -2.0]], vec![0.5]).unwrap();
        let x = Tensor::vector(vec![4.0, 1.0]).unwrap();
        let d = parameter_finite_diff(&mut unit, &x, 1, 1e-2).unwrap();
        // y = x0 - 2 x1 + 0.5 = 2.5 > 0, so dy/dw01 = x1.
        assert!((d[0] - 1.0).abs() < 1e-3);
        assert_eq!(unit.parameter(1).unwrap(), -2.0);
    }

    #[test]
    fn test_finite_diff_out_of_range() {
        let mut unit = Affine::new(vec![vec![1.0]], vec![0.0]).unwrap();
        let x = Tensor::vector(vec![1.0]).unwrap();
        assert!(parameter_finite_diff(&mut unit, &x, 2, 1e-2).is_err());
    }

    #[test]
    fn test_max_abs_error() {
        let err = max_abs_error(&[1.0, 2.0, 3.0], &[1.1, 2.0, 2.8]);
        assert!((err - 0.2).abs() < 1e-6);
    }
}
