//! # fwd_tensor - Dense N-dimensional arrays
//!
//! Storage for the `fwd_nn` units: a fixed [`Shape`], precomputed [`Strides`]
//! and a flat backing store.
//!
//! ## Index convention
//!
//! The first dimension varies fastest. Conversions between multi-indices and
//! linear indices go through [`Strides::index`] and [`Strides::unravel`] only,
//! so flat iteration, multi-index iteration and persistence order always agree.
//!
//! ## Example
//!
//! ```
//! use fwd_tensor::{Shape, Tensor};
//!
//! let shape = Shape::new(vec![2, 3]).unwrap();
//! let mut t: Tensor = Tensor::zeros(shape);
//! t.set(&[1, 2], 5.0).unwrap();
//!
//! assert_eq!(t.get_linear(1 + 2 * 2).unwrap(), 5.0);
//! assert_eq!(t.try_get(&[2, 0]), None);
//! ```

pub mod error;
pub mod shape;
pub mod tensor;

pub use error::TensorError;
pub use shape::{Indices, Shape, Strides};
pub use tensor::Tensor;
