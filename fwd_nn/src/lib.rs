//! # fwd_nn - Forward-mode neural network units
//!
//! Units built on [`fwd_tensor::Tensor`] that compute directional derivatives
//! one parameter at a time:
//!
//! - **Units**: Affine (ReLU), Convolution, Composite
//! - **Persistence**: tagged little-endian binary records
//! - **Losses**: Passthrough, Squared error
//! - **Training**: normalised minibatch steps with optional worker threads
//!
//! ## Example: Training a Single Affine Unit
//!
//! ```
//! use fwd_nn::{Affine, Dataset, Direction, SquaredError, Trainer, Unit};
//! use fwd_tensor::Tensor;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! // Learn y = 2x + 1 on a few points.
//! let xs: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
//! let inputs = xs.iter().map(|&x| Tensor::vector(vec![x]).unwrap()).collect();
//! let labels = xs.iter().map(|&x| Tensor::vector(vec![2.0 * x + 1.0]).unwrap()).collect();
//! let data = Dataset::labelled(inputs, labels).unwrap();
//!
//! let mut unit = Affine::new(vec![vec![0.5]], vec![0.0]).unwrap();
//! let mut trainer = Trainer::new(&data, &data, &SquaredError, StdRng::seed_from_u64(0));
//!
//! let before = trainer.test(&unit, None).unwrap();
//! for _ in 0..50 {
//!     trainer.train(&mut unit, 0.05, None, Direction::Minimize).unwrap();
//! }
//! assert!(trainer.test(&unit, None).unwrap() < before);
//! assert_eq!(unit.variable_count(), 2);
//! ```

pub mod data;
pub mod error;
pub mod finite_diff;
pub mod layers;
pub mod loss;
pub mod persist;
pub mod trainer;
pub mod unit;

// Re-exports for convenience
pub use data::{Dataset, Samples};
pub use error::{NnError, Result};
pub use layers::{Affine, Composite, Convolution};
pub use loss::{Loss, Passthrough, ScalarEvaluation, SquaredError};
pub use persist::{load_from_file, read_unit, save_to_file, write_unit, UnitTag};
pub use trainer::{Direction, TrainConfig, TrainReport, Trainer};
pub use unit::{relu_gate, Evaluation, Unit};
