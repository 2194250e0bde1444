//! The differentiable unit protocol.
//!
//! A unit maps an input tensor to an output tensor and owns a flat vector of
//! learnable parameters. Derivatives are forward-mode and one parameter at a
//! time: [`Unit::evaluate_with_derivative`] pushes a directional derivative of
//! the input through the unit and adds the derivative with respect to a single
//! selected parameter. A full gradient over `P` parameters costs `P` calls.

use std::fmt;
use std::io::Write;

use fwd_tensor::Tensor;

use crate::error::{check_size, Result};
use crate::persist::UnitTag;

/// Forward value together with its directional derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Tensor,
    pub derivative: Tensor,
}

/// A differentiable computation block owning learnable parameters.
pub trait Unit: Send + Sync + fmt::Debug {
    /// Number of input elements accepted.
    fn input_size(&self) -> usize;

    /// Number of output elements produced.
    fn output_size(&self) -> usize;

    /// Size of the flat parameter address space.
    fn variable_count(&self) -> usize;

    /// Forward pass without side effects.
    fn evaluate(&self, input: &Tensor) -> Result<Tensor>;

    /// Forward pass plus the derivative of every output.
    ///
    /// The derivative combines the chain rule through `input_derivative`
    /// (zeros when `None`) with the unit's own derivative with respect to
    /// `parameter`. A parameter that is `None` or not below
    /// [`Unit::variable_count`] contributes nothing; it is not an error.
    fn evaluate_with_derivative(
        &self,
        input: &Tensor,
        input_derivative: Option<&Tensor>,
        parameter: Option<usize>,
    ) -> Result<Evaluation>;

    /// Add `values[i]` to parameter `i` for every parameter.
    fn add_all(&mut self, values: &[f32]) -> Result<()>;

    /// Read a single parameter.
    fn parameter(&self, index: usize) -> Result<f32>;

    /// Overwrite a single parameter.
    fn set_parameter(&mut self, index: usize, value: f32) -> Result<()>;

    /// Persistence tag identifying the concrete unit kind.
    fn tag(&self) -> UnitTag;

    /// Write everything after the tag; see [`crate::persist`].
    fn write_payload(&self, writer: &mut dyn Write) -> Result<()>;
}

/// ReLU applied jointly to a pre-activation sum and its derivative.
///
/// At or below zero both are clipped so no derivative leaks through.
pub fn relu_gate(raw: f32, derivative: f32) -> (f32, f32) {
    if raw <= 0.0 {
        (0.0, 0.0)
    } else {
        (raw, derivative)
    }
}

/// Resolve an optional input derivative against the input it belongs to.
pub(crate) fn input_derivative_or_zeros(
    input: &Tensor,
    input_derivative: Option<&Tensor>,
) -> Result<Tensor> {
    match input_derivative {
        Some(d) => {
            check_size(input.len(), d.len())?;
            Ok(d.clone())
        }
        None => Ok(input.zeros_like()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu_gate() {
        assert_eq!(relu_gate(2.5, 3.0), (2.5, 3.0));
        assert_eq!(relu_gate(-1.0, 3.0), (0.0, 0.0));
        // The kink itself is a regular clipped value.
        assert_eq!(relu_gate(0.0, 7.0), (0.0, 0.0));
    }

    #[test]
    fn test_default_input_derivative() {
        let input = Tensor::vector(vec![1.0, 2.0, 3.0]).unwrap();
        let d = input_derivative_or_zeros(&input, None).unwrap();
        assert_eq!(d.as_slice(), &[0.0, 0.0, 0.0]);

        let bad = Tensor::vector(vec![1.0]).unwrap();
        assert!(input_derivative_or_zeros(&input, Some(&bad)).is_err());
    }
}
