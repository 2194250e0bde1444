//! N-dimensional convolution unit averaging kernel-weighted input taps.
//!
//! For an output position `p` the kernel window starts at `offset + p`, where
//! `offset[d] = (in[d] - out[d] - k[d]) / 2` (truncating division). Taps that
//! fall outside the input are skipped and do not count towards the average.
//! There is no bias and no activation.

use std::io::{Read, Write};

use fwd_tensor::{Shape, Tensor};
use log::trace;
use rand::Rng;

use crate::error::{check_size, NnError, Result};
use crate::persist::{self, UnitTag};
use crate::unit::{input_derivative_or_zeros, Evaluation, Unit};

#[derive(Debug, Clone, PartialEq)]
pub struct Convolution {
    kernel: Tensor,
    input_shape: Shape,
    output_shape: Shape,
    offsets: Vec<isize>,
}

impl Convolution {
    /// Create a convolution; kernel, input and output must share a rank.
    pub fn new(kernel: Tensor, input_shape: Shape, output_shape: Shape) -> Result<Self> {
        let rank = kernel.rank();
        if input_shape.rank() != rank || output_shape.rank() != rank {
            return Err(NnError::ShapeMismatch(format!(
                "convolution ranks differ: kernel {}, input {}, output {}",
                kernel.shape(),
                input_shape,
                output_shape
            )));
        }

        let offsets = (0..rank)
            .map(|d| {
                let (i, o, k) = (
                    input_shape.dim(d) as isize,
                    output_shape.dim(d) as isize,
                    kernel.shape().dim(d) as isize,
                );
                (i - o - k) / 2
            })
            .collect();

        trace!(
            "convolution {} -> {} with kernel {}",
            input_shape,
            output_shape,
            kernel.shape()
        );
        Ok(Convolution {
            kernel,
            input_shape,
            output_shape,
            offsets,
        })
    }

    /// Create a convolution with a kernel drawn uniformly from `[-1, 1)`.
    pub fn random<R: Rng + ?Sized>(
        kernel_shape: Shape,
        input_shape: Shape,
        output_shape: Shape,
        rng: &mut R,
    ) -> Result<Self> {
        let data: Vec<f32> = (0..kernel_shape.numel())
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        Self::new(Tensor::from_vec(data, kernel_shape)?, input_shape, output_shape)
    }

    pub fn kernel(&self) -> &Tensor {
        &self.kernel
    }

    /// Per-dimension start of the window for output index 0.
    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// View any tensor with the right element count under the input shape.
    fn view(&self, t: &Tensor) -> Result<Tensor> {
        check_size(self.input_shape.numel(), t.len())?;
        Ok(t.clone().reshape(self.input_shape.clone())?)
    }

    /// Input position read by kernel tap `k` for output `p`; `None` below zero.
    fn tap(&self, p: &[usize], k: &[usize]) -> Option<Vec<usize>> {
        self.offsets
            .iter()
            .zip(p)
            .zip(k)
            .map(|((&offset, &p), &k)| usize::try_from(offset + p as isize + k as isize).ok())
            .collect()
    }

    pub(crate) fn read_payload(reader: &mut dyn Read) -> Result<Self> {
        let rank = persist::read_len(reader)?;
        let mut read_shape = |what: &str| -> Result<Shape> {
            let dims = (0..rank)
                .map(|_| persist::read_len(&mut *reader))
                .collect::<Result<Vec<_>>>()?;
            Shape::new(dims)
                .map_err(|e| NnError::UnsupportedFormat(format!("convolution {}: {}", what, e)))
        };
        let kernel_shape = read_shape("kernel")?;
        let input_shape = read_shape("input")?;
        let output_shape = read_shape("output")?;
        let data = persist::read_f32s(reader, kernel_shape.numel())?;
        Self::new(Tensor::from_vec(data, kernel_shape)?, input_shape, output_shape)
    }
}

impl Unit for Convolution {
    fn input_size(&self) -> usize {
        self.input_shape.numel()
    }

    fn output_size(&self) -> usize {
        self.output_shape.numel()
    }

    fn variable_count(&self) -> usize {
        self.kernel.len()
    }

    fn evaluate(&self, input: &Tensor) -> Result<Tensor> {
        let image = self.view(input)?;
        let mut output = Tensor::zeros(self.output_shape.clone());
        output.map_inplace(|p, _| {
            let mut average = 0.0;
            let mut count = 1.0;
            for (k, weight) in self.kernel.indexed_iter() {
                if let Some(x) = self.tap(p, &k).and_then(|t| image.try_get(&t)) {
                    average += (weight * x - average) / count;
                    count += 1.0;
                }
            }
            average
        });
        Ok(output)
    }

    fn evaluate_with_derivative(
        &self,
        input: &Tensor,
        input_derivative: Option<&Tensor>,
        parameter: Option<usize>,
    ) -> Result<Evaluation> {
        let image = self.view(input)?;
        let image_derivative = self.view(&input_derivative_or_zeros(input, input_derivative)?)?;
        let target = parameter
            .filter(|&p| p < self.kernel.len())
            .and_then(|p| self.kernel.unravel(p).ok());

        let n = self.output_size();
        let mut values = Vec::with_capacity(n);
        let mut derivatives = Vec::with_capacity(n);
        for p in self.output_shape.indices() {
            let mut average = 0.0;
            let mut average_derivative = 0.0;
            let mut count = 1.0;
            for (k, weight) in self.kernel.indexed_iter() {
                let Some(t) = self.tap(&p, &k) else { continue };
                let Some(x) = image.try_get(&t) else { continue };
                let dx = image_derivative.try_get(&t).unwrap_or(0.0);
                let own = if target.as_deref() == Some(k.as_slice()) { x } else { 0.0 };

                average += (weight * x - average) / count;
                average_derivative += (weight * dx + own - average_derivative) / count;
                count += 1.0;
            }
            values.push(average);
            derivatives.push(average_derivative);
        }

        Ok(Evaluation {
            value: Tensor::from_vec(values, self.output_shape.clone())?,
            derivative: Tensor::from_vec(derivatives, self.output_shape.clone())?,
        })
    }

    fn add_all(&mut self, values: &[f32]) -> Result<()> {
        check_size(self.kernel.len(), values.len())?;
        self.kernel.map_linear_inplace(|i, v| v + values[i]);
        Ok(())
    }

    fn parameter(&self, index: usize) -> Result<f32> {
        self.kernel
            .get_linear(index)
            .map_err(|_| NnError::ParameterOutOfRange {
                index,
                count: self.kernel.len(),
            })
    }

    fn set_parameter(&mut self, index: usize, value: f32) -> Result<()> {
        let count = self.kernel.len();
        self.kernel
            .set_linear(index, value)
            .map_err(|_| NnError::ParameterOutOfRange { index, count })
    }

    fn tag(&self) -> UnitTag {
        UnitTag::Convolution
    }

    fn write_payload(&self, writer: &mut dyn Write) -> Result<()> {
        persist::write_len(writer, self.kernel.rank())?;
        for shape in [self.kernel.shape(), &self.input_shape, &self.output_shape] {
            for &len in shape.dims() {
                persist::write_len(writer, len)?;
            }
        }
        persist::write_f32s(writer, self.kernel.as_slice())
    }
}
