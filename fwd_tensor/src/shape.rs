//! Shape and stride utilities for tensors.
//!
//! The layout convention is fixed for the whole workspace: the first dimension
//! varies fastest. For a shape `[l0, l1, l2]` the strides are `[1, l0, l0*l1]`
//! and the linear index of `[i0, i1, i2]` is `i0 + i1*l0 + i2*l0*l1`.
//! Both directions of the conversion live on [`Strides`].

use std::fmt;

use crate::error::{Result, TensorError};

/// A tensor shape (dimension lengths). Always rank >= 1 with positive lengths.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from dimensions.
    ///
    /// Rejects an empty shape, a zero length, and any shape whose element
    /// count does not fit in `usize`.
    pub fn new(dims: Vec<usize>) -> Result<Self> {
        let numel = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        if dims.is_empty() || dims.contains(&0) || numel.is_none() {
            return Err(TensorError::InvalidShape { dims });
        }
        Ok(Shape(dims))
    }

    /// Rank-1 shape of the given length.
    pub fn vector(len: usize) -> Result<Self> {
        Self::new(vec![len])
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Get dimension at index.
    pub fn dim(&self, idx: usize) -> usize {
        self.0[idx]
    }

    /// Get dimensions as slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Total number of elements. Never overflows, see [`Shape::new`].
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Running product of the lower dimension lengths.
    pub fn strides(&self) -> Strides {
        let mut strides = Vec::with_capacity(self.0.len());
        let mut step = 1usize;
        for &len in &self.0 {
            strides.push(step);
            step *= len;
        }
        Strides(strides)
    }

    /// Whether `indices` is a full, in-bounds multi-index for this shape.
    pub fn contains(&self, indices: &[usize]) -> bool {
        indices.len() == self.0.len() && indices.iter().zip(&self.0).all(|(i, len)| i < len)
    }

    /// Iterate over every multi-index in linear order.
    pub fn indices(&self) -> Indices<'_> {
        Indices {
            shape: self,
            current: vec![0; self.0.len()],
            done: false,
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Tensor strides (step size in each dimension).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Strides(Vec<usize>);

impl Strides {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Compute flat index from multi-dimensional indices.
    ///
    /// Callers are responsible for bounds; see [`Shape::contains`].
    pub fn index(&self, indices: &[usize]) -> usize {
        debug_assert_eq!(self.0.len(), indices.len());
        self.0.iter().zip(indices.iter()).map(|(s, i)| s * i).sum()
    }

    /// Inverse of [`Strides::index`] for an in-bounds linear index.
    pub fn unravel(&self, linear: usize) -> Vec<usize> {
        let mut indices = vec![0usize; self.0.len()];
        let mut rest = linear;
        for d in (0..self.0.len()).rev() {
            indices[d] = rest / self.0[d];
            rest %= self.0[d];
        }
        indices
    }
}

/// Iterator over all multi-indices of a shape, first dimension fastest.
pub struct Indices<'a> {
    shape: &'a Shape,
    current: Vec<usize>,
    done: bool,
}

impl Iterator for Indices<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        // Odometer, leftmost digit first.
        let mut d = 0;
        loop {
            if d == self.current.len() {
                self.done = true;
                break;
            }
            self.current[d] += 1;
            if self.current[d] < self.shape.dim(d) {
                break;
            }
            self.current[d] = 0;
            d += 1;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dims: &[usize]) -> Shape {
        Shape::new(dims.to_vec()).unwrap()
    }

    #[test]
    fn test_shape_basics() {
        let s = shape(&[2, 3, 4]);
        assert_eq!(s.rank(), 3);
        assert_eq!(s.dim(0), 2);
        assert_eq!(s.dim(2), 4);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.to_string(), "(2, 3, 4)");
        assert_eq!(shape(&[5]).to_string(), "(5,)");
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(Shape::new(vec![]), Err(TensorError::InvalidShape { .. })));
        assert!(matches!(Shape::new(vec![3, 0]), Err(TensorError::InvalidShape { .. })));
    }

    #[test]
    fn test_overflowing_shape_is_invalid() {
        let huge = usize::MAX / 2 + 1;
        assert!(matches!(
            Shape::new(vec![huge, 2]),
            Err(TensorError::InvalidShape { .. })
        ));
        assert!(matches!(
            Shape::new(vec![3, usize::MAX, 1]),
            Err(TensorError::InvalidShape { .. })
        ));
        assert_eq!(shape(&[usize::MAX, 1]).numel(), usize::MAX);
    }

    #[test]
    fn test_strides_first_dim_fastest() {
        assert_eq!(shape(&[2, 3, 4]).strides().as_slice(), &[1, 2, 6]);
        assert_eq!(shape(&[7]).strides().as_slice(), &[1]);
    }

    #[test]
    fn test_stride_index() {
        let strides = shape(&[2, 3, 4]).strides();
        assert_eq!(strides.index(&[0, 0, 0]), 0);
        assert_eq!(strides.index(&[1, 0, 0]), 1);
        assert_eq!(strides.index(&[0, 1, 0]), 2);
        assert_eq!(strides.index(&[0, 0, 1]), 6);
        assert_eq!(strides.index(&[1, 2, 3]), 1 + 4 + 18);
    }

    #[test]
    fn test_unravel_inverts_index() {
        for dims in [vec![1], vec![5], vec![3, 4], vec![2, 3, 4], vec![3, 1, 2, 5]] {
            let s = shape(&dims);
            let strides = s.strides();
            for i in 0..s.numel() {
                let multi = strides.unravel(i);
                assert!(s.contains(&multi), "{:?} not in {}", multi, s);
                assert_eq!(strides.index(&multi), i, "shape {}", s);
            }
        }
    }

    #[test]
    fn test_indices_follow_linear_order() {
        let s = shape(&[2, 3, 2]);
        let strides = s.strides();
        let all: Vec<Vec<usize>> = s.indices().collect();
        assert_eq!(all.len(), s.numel());
        for (i, multi) in all.iter().enumerate() {
            assert_eq!(strides.index(multi), i);
        }
        assert_eq!(all[1], vec![1, 0, 0]);
        assert_eq!(all[2], vec![0, 1, 0]);
    }

    #[test]
    fn test_contains() {
        let s = shape(&[2, 3]);
        assert!(s.contains(&[1, 2]));
        assert!(!s.contains(&[2, 0]));
        assert!(!s.contains(&[0]));
        assert!(!s.contains(&[0, 0, 0]));
    }
}
