//! Dense tensor storage.

use std::fmt;

use crate::error::{Result, TensorError};
use crate::shape::{Shape, Strides};

/// A dense N-dimensional array with a fixed shape.
///
/// Element `[i0, i1, ...]` lives at `i0 + i1*stride[1] + ...` in the backing
/// store (see [`crate::shape`]). Flat iteration order and multi-index
/// iteration order agree.
#[derive(Clone, PartialEq)]
pub struct Tensor<T = f32> {
    data: Vec<T>,
    shape: Shape,
    strides: Strides,
}

impl<T: Copy> Tensor<T> {
    /// Create a tensor from flat data in linear order.
    pub fn from_vec(data: Vec<T>, shape: Shape) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(TensorError::SizeMismatch {
                expected: shape.numel(),
                got: data.len(),
            });
        }
        let strides = shape.strides();
        Ok(Tensor { data, shape, strides })
    }

    /// Rank-1 tensor holding `data`.
    pub fn vector(data: Vec<T>) -> Result<Self> {
        let shape = Shape::vector(data.len())?;
        Self::from_vec(data, shape)
    }

    /// Tensor with every element set to `value`.
    pub fn full(shape: Shape, value: T) -> Self {
        let strides = shape.strides();
        Tensor {
            data: vec![value; shape.numel()],
            shape,
            strides,
        }
    }

    /// Same data viewed under a different shape with the same element count.
    pub fn reshape(self, shape: Shape) -> Result<Self> {
        Self::from_vec(self.data, shape)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; shapes have positive lengths.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn offset(&self, indices: &[usize]) -> Result<usize> {
        if !self.shape.contains(indices) {
            return Err(TensorError::IndexOutOfRange {
                index: indices.to_vec(),
                dims: self.shape.dims().to_vec(),
            });
        }
        Ok(self.strides.index(indices))
    }

    /// Get the element at a full multi-index.
    pub fn get(&self, indices: &[usize]) -> Result<T> {
        self.offset(indices).map(|i| self.data[i])
    }

    /// Like [`Tensor::get`], but an out-of-range index is `None` rather than an error.
    pub fn try_get(&self, indices: &[usize]) -> Option<T> {
        self.offset(indices).ok().map(|i| self.data[i])
    }

    /// Set the element at a full multi-index.
    pub fn set(&mut self, indices: &[usize], value: T) -> Result<()> {
        let i = self.offset(indices)?;
        self.data[i] = value;
        Ok(())
    }

    /// Get the element at a flat index.
    pub fn get_linear(&self, index: usize) -> Result<T> {
        self.data
            .get(index)
            .copied()
            .ok_or(TensorError::LinearIndexOutOfRange {
                index,
                len: self.data.len(),
            })
    }

    /// Set the element at a flat index.
    pub fn set_linear(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or(TensorError::LinearIndexOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Multi-index of a flat index.
    pub fn unravel(&self, index: usize) -> Result<Vec<usize>> {
        if index >= self.data.len() {
            return Err(TensorError::LinearIndexOutOfRange {
                index,
                len: self.data.len(),
            });
        }
        Ok(self.strides.unravel(index))
    }

    /// Values in linear order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied()
    }

    /// `(multi-index, value)` pairs in linear order.
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Vec<usize>, T)> + '_ {
        self.shape.indices().zip(self.data.iter().copied())
    }

    /// Replace every element with `f(multi-index, value)`.
    pub fn map_inplace<F>(&mut self, mut f: F)
    where
        F: FnMut(&[usize], T) -> T,
    {
        for (indices, slot) in self.shape.indices().zip(self.data.iter_mut()) {
            *slot = f(&indices, *slot);
        }
    }

    /// Replace every element with `f(linear index, value)`.
    pub fn map_linear_inplace<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, T) -> T,
    {
        for (i, slot) in self.data.iter_mut().enumerate() {
            *slot = f(i, *slot);
        }
    }
}

impl<T: Copy + Default> Tensor<T> {
    /// Tensor filled with `T::default()`.
    pub fn zeros(shape: Shape) -> Self {
        Self::full(shape, T::default())
    }

    /// Zero tensor with the same shape as `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{} {:?}", self.shape, self.data)
    }
}
