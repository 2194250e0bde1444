//! Scalar losses consumed by the trainer.

use fwd_tensor::Tensor;

use crate::error::{check_size, NnError, Result};

/// A scalar loss value with its directional derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarEvaluation {
    pub value: f32,
    pub derivative: f32,
}

/// Reduces a unit's prediction (and optional label) to a scalar.
pub trait Loss: Send + Sync {
    fn evaluate(&self, prediction: &Tensor, label: Option<&Tensor>) -> Result<f32>;

    /// Loss value plus its derivative along `prediction_derivative`.
    fn evaluate_with_derivative(
        &self,
        prediction: &Tensor,
        prediction_derivative: &Tensor,
        label: Option<&Tensor>,
    ) -> Result<ScalarEvaluation>;
}

/// Uses the first prediction element as the loss; labels are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Loss for Passthrough {
    fn evaluate(&self, prediction: &Tensor, _label: Option<&Tensor>) -> Result<f32> {
        Ok(prediction.get_linear(0)?)
    }

    fn evaluate_with_derivative(
        &self,
        prediction: &Tensor,
        prediction_derivative: &Tensor,
        _label: Option<&Tensor>,
    ) -> Result<ScalarEvaluation> {
        Ok(ScalarEvaluation {
            value: prediction.get_linear(0)?,
            derivative: prediction_derivative.get_linear(0)?,
        })
    }
}

/// Mean squared error against a required label: mean((pred - label)^2).
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredError;

impl SquaredError {
    fn residuals<'a>(
        prediction: &'a Tensor,
        label: Option<&'a Tensor>,
    ) -> Result<impl Iterator<Item = f32> + 'a> {
        let label = label.ok_or(NnError::MissingLabel)?;
        check_size(prediction.len(), label.len())?;
        Ok(prediction.iter().zip(label.iter()).map(|(p, l)| p - l))
    }
}

impl Loss for SquaredError {
    fn evaluate(&self, prediction: &Tensor, label: Option<&Tensor>) -> Result<f32> {
        let n = prediction.len() as f32;
        Ok(Self::residuals(prediction, label)?.map(|r| r * r).sum::<f32>() / n)
    }

    fn evaluate_with_derivative(
        &self,
        prediction: &Tensor,
        prediction_derivative: &Tensor,
        label: Option<&Tensor>,
    ) -> Result<ScalarEvaluation> {
        check_size(prediction.len(), prediction_derivative.len())?;
        let n = prediction.len() as f32;
        let (mut value, mut derivative) = (0.0, 0.0);
        for (r, d) in Self::residuals(prediction, label)?.zip(prediction_derivative.iter()) {
            value += r * r;
            derivative += 2.0 * r * d;
        }
        Ok(ScalarEvaluation {
            value: value / n,
            derivative: derivative / n,
        })
    }
}
