//! Affine (fully connected) unit: y = ReLU(W x + b).

use std::io::{Read, Write};

use fwd_tensor::{Shape, Tensor};
use log::trace;
use rand::Rng;

use crate::error::{check_size, NnError, Result};
use crate::persist::{self, UnitTag};
use crate::unit::{input_derivative_or_zeros, relu_gate, Evaluation, Unit};

/// An affine unit with a ReLU activation.
///
/// Parameters `0..in*out` are the weights, parameter `o*in + i` being
/// `W[o][i]`; parameters `in*out..in*out + out` are the biases.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine {
    /// Weight matrix stored with shape `[in, out]`, so the tensor's linear
    /// index of `[i, o]` is the parameter index of `W[o][i]`.
    weights: Tensor,
    /// Bias vector `[out]`.
    bias: Tensor,
}

/// Which value a parameter index addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Weight { output: usize, input: usize },
    Bias { output: usize },
    Nothing,
}

impl Affine {
    /// Create an affine unit from weight rows (one per output) and a bias.
    pub fn new(matrix: Vec<Vec<f32>>, bias: Vec<f32>) -> Result<Self> {
        let output_size = matrix.len();
        let input_size = matrix.first().map_or(0, Vec::len);
        if output_size == 0 || input_size == 0 {
            return Err(NnError::ShapeMismatch(
                "affine weight matrix must be non-empty".to_string(),
            ));
        }
        if let Some(row) = matrix.iter().position(|r| r.len() != input_size) {
            return Err(NnError::ShapeMismatch(format!(
                "affine weight row {} has {} entries, row 0 has {}",
                row,
                matrix[row].len(),
                input_size
            )));
        }
        if bias.len() != output_size {
            return Err(NnError::ShapeMismatch(format!(
                "affine bias has {} entries for {} outputs",
                bias.len(),
                output_size
            )));
        }

        let weights = matrix.into_iter().flatten().collect();
        Self::from_flat(input_size, output_size, weights, bias)
    }

    /// Create an affine unit from augmented rows `[w_0, .., w_{in-1}, b]`.
    pub fn from_augmented(rows: Vec<Vec<f32>>) -> Result<Self> {
        let mut matrix = Vec::with_capacity(rows.len());
        let mut bias = Vec::with_capacity(rows.len());
        for mut row in rows {
            let b = row.pop().ok_or_else(|| {
                NnError::ShapeMismatch("augmented affine row is empty".to_string())
            })?;
            matrix.push(row);
            bias.push(b);
        }
        Self::new(matrix, bias)
    }

    /// Create an affine unit with Kaiming-uniform weights and zero bias.
    pub fn kaiming<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Result<Self> {
        // Kaiming initialization: std = sqrt(2 / fan_in)
        let std = (2.0 / input_size.max(1) as f32).sqrt();
        let weights = (0..input_size * output_size)
            .map(|_| rng.gen::<f32>() * std * 2.0 - std)
            .collect();
        Self::from_flat(input_size, output_size, weights, vec![0.0; output_size])
    }

    /// Build from out-major weights (`W[o][i]` at `o*in + i`) and a bias.
    fn from_flat(
        input_size: usize,
        output_size: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self> {
        let weights = Tensor::from_vec(weights, Shape::new(vec![input_size, output_size])?)?;
        let bias = Tensor::from_vec(bias, Shape::vector(output_size)?)?;
        trace!("affine unit {} -> {}", input_size, output_size);
        Ok(Affine { weights, bias })
    }

    /// Weights with shape `[in, out]`.
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// The weights feeding output `o`, contiguous because dimension 0 is `in`.
    fn row(&self, o: usize) -> &[f32] {
        let n = self.input_size();
        &self.weights.as_slice()[o * n..(o + 1) * n]
    }

    fn decode(&self, parameter: Option<usize>) -> Target {
        let n = self.input_size();
        let weight_count = self.weights.len();
        match parameter {
            Some(p) if p < weight_count => Target::Weight {
                output: p / n,
                input: p % n,
            },
            Some(p) if p < weight_count + self.bias.len() => Target::Bias {
                output: p - weight_count,
            },
            _ => Target::Nothing,
        }
    }

    fn pre_activation(&self, o: usize, input: &[f32]) -> f32 {
        let dot: f32 = self.row(o).iter().zip(input).map(|(w, x)| w * x).sum();
        dot + self.bias.as_slice()[o]
    }

    pub(crate) fn read_payload(reader: &mut dyn Read) -> Result<Self> {
        let output_size = persist::read_len(reader)?;
        let input_size = persist::read_len(reader)?;
        let count = output_size.checked_mul(input_size).ok_or_else(|| {
            NnError::UnsupportedFormat(format!(
                "affine record: {} x {} weights overflow",
                output_size, input_size
            ))
        })?;
        let weights = persist::read_f32s(reader, count)?;
        let bias = persist::read_f32s(reader, output_size)?;
        Self::from_flat(input_size, output_size, weights, bias)
            .map_err(|e| NnError::UnsupportedFormat(format!("affine record: {}", e)))
    }
}

impl Unit for Affine {
    fn input_size(&self) -> usize {
        self.weights.shape().dim(0)
    }

    fn output_size(&self) -> usize {
        self.weights.shape().dim(1)
    }

    fn variable_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    fn evaluate(&self, input: &Tensor) -> Result<Tensor> {
        check_size(self.input_size(), input.len())?;
        let x = input.as_slice();
        let values = (0..self.output_size())
            .map(|o| relu_gate(self.pre_activation(o, x), 0.0).0)
            .collect();
        Ok(Tensor::vector(values)?)
    }

    fn evaluate_with_derivative(
        &self,
        input: &Tensor,
        input_derivative: Option<&Tensor>,
        parameter: Option<usize>,
    ) -> Result<Evaluation> {
        check_size(self.input_size(), input.len())?;
        let dx = input_derivative_or_zeros(input, input_derivative)?;
        let x = input.as_slice();
        let target = self.decode(parameter);

        let mut values = Vec::with_capacity(self.output_size());
        let mut derivatives = Vec::with_capacity(self.output_size());
        for o in 0..self.output_size() {
            let raw = self.pre_activation(o, x);
            let chained: f32 = self
                .row(o)
                .iter()
                .zip(dx.as_slice())
                .map(|(w, d)| w * d)
                .sum();
            let own = match target {
                Target::Weight { output, input: i } if output == o => x[i],
                Target::Bias { output } if output == o => 1.0,
                _ => 0.0,
            };
            let (value, derivative) = relu_gate(raw, chained + own);
            values.push(value);
            derivatives.push(derivative);
        }

        Ok(Evaluation {
            value: Tensor::vector(values)?,
            derivative: Tensor::vector(derivatives)?,
        })
    }

    fn add_all(&mut self, values: &[f32]) -> Result<()> {
        check_size(self.variable_count(), values.len())?;
        let (w, b) = values.split_at(self.weights.len());
        self.weights.map_linear_inplace(|i, v| v + w[i]);
        self.bias.map_linear_inplace(|i, v| v + b[i]);
        Ok(())
    }

    fn parameter(&self, index: usize) -> Result<f32> {
        match self.decode(Some(index)) {
            Target::Weight { .. } => Ok(self.weights.get_linear(index)?),
            Target::Bias { output } => Ok(self.bias.get_linear(output)?),
            Target::Nothing => Err(NnError::ParameterOutOfRange {
                index,
                count: self.variable_count(),
            }),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f32) -> Result<()> {
        match self.decode(Some(index)) {
            Target::Weight { .. } => Ok(self.weights.set_linear(index, value)?),
            Target::Bias { output } => Ok(self.bias.set_linear(output, value)?),
            Target::Nothing => Err(NnError::ParameterOutOfRange {
                index,
                count: self.variable_count(),
            }),
        }
    }

    fn tag(&self) -> UnitTag {
        UnitTag::Affine
    }

    fn write_payload(&self, writer: &mut dyn Write) -> Result<()> {
        persist::write_len(writer, self.output_size())?;
        persist::write_len(writer, self.input_size())?;
        persist::write_f32s(writer, self.weights.as_slice())?;
        persist::write_f32s(writer, self.bias.as_slice())?;
        Ok(())
    }
}
