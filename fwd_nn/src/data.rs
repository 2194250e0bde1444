//! Sample collections fed to the trainer.

use fwd_tensor::Tensor;

use crate::error::{check_size, Result};

/// Indexed inputs with optional labels.
pub trait Samples: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Input `index`; callers stay below [`Samples::len`].
    fn input(&self, index: usize) -> &Tensor;

    fn label(&self, _index: usize) -> Option<&Tensor> {
        None
    }
}

impl Samples for Vec<Tensor> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn input(&self, index: usize) -> &Tensor {
        &self[index]
    }
}

/// Inputs paired one to one with labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    inputs: Vec<Tensor>,
    labels: Vec<Tensor>,
}

impl Dataset {
    pub fn labelled(inputs: Vec<Tensor>, labels: Vec<Tensor>) -> Result<Self> {
        check_size(inputs.len(), labels.len())?;
        Ok(Dataset { inputs, labels })
    }

    pub fn inputs(&self) -> &[Tensor] {
        &self.inputs
    }
}

impl Samples for Dataset {
    fn len(&self) -> usize {
        self.inputs.len()
    }

    fn input(&self, index: usize) -> &Tensor {
        &self.inputs[index]
    }

    fn label(&self, index: usize) -> Option<&Tensor> {
        self.labels.get(index)
    }
}
