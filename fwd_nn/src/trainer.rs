//! Minibatch training by forward-mode gradient estimation.
//!
//! Each step draws a batch without replacement and, for every sample and every
//! parameter, runs one [`Unit::evaluate_with_derivative`] pass. The mean
//! derivative vector is rescaled to `step_size` and applied in one
//! [`Unit::add_all`]. With `workers > 1` the per-parameter passes of a sample
//! are spread over scoped threads; all of them borrow the unit immutably and
//! join before the update borrows it mutably.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use fwd_tensor::Tensor;
use log::{debug, info, trace};
use rand::Rng;

use crate::data::Samples;
use crate::error::Result;
use crate::loss::Loss;
use crate::unit::Unit;

/// Whether a step moves down or up the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

/// Settings for [`Trainer::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Length of each parameter update.
    pub step_size: f32,
    /// Samples per batch; `None` uses the whole training set.
    pub batch_size: Option<usize>,
    /// Number of batches to run.
    pub batches: usize,
    pub direction: Direction,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            step_size: 0.01,
            batch_size: None,
            batches: 100,
            direction: Direction::Minimize,
        }
    }
}

impl TrainConfig {
    pub fn new(step_size: f32) -> Self {
        TrainConfig {
            step_size,
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_batches(mut self, batches: usize) -> Self {
        self.batches = batches;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// Outcome of [`Trainer::fit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    /// Pre-rescale gradient length of every batch that ran.
    pub gradient_lengths: Vec<f32>,
    /// The cancellation flag stopped training early.
    pub cancelled: bool,
}

impl TrainReport {
    pub fn final_gradient_length(&self) -> Option<f32> {
        self.gradient_lengths.last().copied()
    }
}

/// Trains units against a loss over borrowed training and testing samples.
pub struct Trainer<'a, R: Rng> {
    training: &'a dyn Samples,
    testing: &'a dyn Samples,
    loss: &'a dyn Loss,
    rng: R,
    workers: usize,
}

impl<'a, R: Rng> Trainer<'a, R> {
    pub fn new(
        training: &'a dyn Samples,
        testing: &'a dyn Samples,
        loss: &'a dyn Loss,
        rng: R,
    ) -> Self {
        Trainer {
            training,
            testing,
            loss,
            rng,
            workers: 1,
        }
    }

    /// Spread each sample's per-parameter passes over `workers` threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Draw up to `batch_size` distinct indices below `len`.
    fn draw(&mut self, len: usize, batch_size: Option<usize>) -> Vec<usize> {
        let n = batch_size.map_or(len, |b| b.min(len));
        let mut pool: Vec<usize> = (0..len).collect();
        (0..n)
            .map(|_| {
                let pick = self.rng.gen_range(0..pool.len());
                pool.swap_remove(pick)
            })
            .collect()
    }

    /// Mean loss derivative per parameter over one training batch.
    pub fn gradient(&mut self, unit: &dyn Unit, batch_size: Option<usize>) -> Result<Vec<f32>> {
        let batch = self.draw(self.training.len(), batch_size);
        let mut mean = vec![0.0f32; unit.variable_count()];
        for (seen, &index) in batch.iter().enumerate() {
            let derivatives = sample_derivatives(
                unit,
                self.loss,
                self.training.input(index),
                self.training.label(index),
                self.workers,
            )?;
            let count = (seen + 1) as f32;
            for (m, d) in mean.iter_mut().zip(derivatives) {
                *m += (d - *m) / count;
            }
            trace!("sample {} folded into gradient ({} of {})", index, seen + 1, batch.len());
        }
        Ok(mean)
    }

    /// Take one normalised step and return the gradient length before rescaling.
    ///
    /// A zero gradient leaves the unit untouched.
    pub fn train(
        &mut self,
        unit: &mut dyn Unit,
        step_size: f32,
        batch_size: Option<usize>,
        direction: Direction,
    ) -> Result<f32> {
        let mut gradient = self.gradient(&*unit, batch_size)?;
        let length = gradient.iter().map(|g| g * g).sum::<f32>().sqrt();

        if length > 0.0 {
            let scale = match direction {
                Direction::Minimize => -step_size / length,
                Direction::Maximize => step_size / length,
            };
            gradient.iter_mut().for_each(|g| *g *= scale);
            unit.add_all(&gradient)?;
        }

        debug!(
            "step over {} parameters, gradient length {:.6}",
            gradient.len(),
            length
        );
        Ok(length)
    }

    /// Running mean loss over a testing batch. The unit is not modified.
    pub fn test(&mut self, unit: &dyn Unit, batch_size: Option<usize>) -> Result<f32> {
        let batch = self.draw(self.testing.len(), batch_size);
        let mut mean = 0.0f32;
        for (seen, &index) in batch.iter().enumerate() {
            let prediction = unit.evaluate(self.testing.input(index))?;
            let loss = self.loss.evaluate(&prediction, self.testing.label(index))?;
            mean += (loss - mean) / (seen + 1) as f32;
        }
        debug!("test loss {:.6} over {} samples", mean, batch.len());
        Ok(mean)
    }

    /// Run `config.batches` training steps, checking `cancel` between them.
    pub fn fit(
        &mut self,
        unit: &mut dyn Unit,
        config: &TrainConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<TrainReport> {
        let mut report = TrainReport::default();
        for batch in 0..config.batches {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!("training cancelled after {} batches", batch);
                report.cancelled = true;
                break;
            }
            let length = self.train(unit, config.step_size, config.batch_size, config.direction)?;
            report.gradient_lengths.push(length);
        }

        if let Some(length) = report.final_gradient_length() {
            info!(
                "trained {} batches, final gradient length {:.6}",
                report.gradient_lengths.len(),
                length
            );
        }
        Ok(report)
    }
}

/// Loss derivative with respect to one parameter for one sample.
fn parameter_derivative(
    unit: &dyn Unit,
    loss: &dyn Loss,
    input: &Tensor,
    label: Option<&Tensor>,
    parameter: usize,
) -> Result<f32> {
    let eval = unit.evaluate_with_derivative(input, None, Some(parameter))?;
    Ok(loss
        .evaluate_with_derivative(&eval.value, &eval.derivative, label)?
        .derivative)
}

/// Loss derivatives for every parameter of `unit` on one sample.
fn sample_derivatives(
    unit: &dyn Unit,
    loss: &dyn Loss,
    input: &Tensor,
    label: Option<&Tensor>,
    workers: usize,
) -> Result<Vec<f32>> {
    let count = unit.variable_count();
    if workers <= 1 || count < 2 {
        return (0..count)
            .map(|p| parameter_derivative(unit, loss, input, label, p))
            .collect();
    }

    let chunk = count.div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..count)
            .step_by(chunk)
            .map(|start| {
                let end = (start + chunk).min(count);
                scope.spawn(move || {
                    (start..end)
                        .map(|p| parameter_derivative(unit, loss, input, label, p))
                        .collect::<Result<Vec<f32>>>()
                })
            })
            .collect();

        let mut derivatives = Vec::with_capacity(count);
        for handle in handles {
            let part = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;
            derivatives.extend(part);
        }
        Ok(derivatives)
    })
}
