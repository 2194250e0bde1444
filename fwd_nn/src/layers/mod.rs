//! Concrete unit kinds.

pub mod affine;
pub mod composite;
pub mod conv;

pub use affine::Affine;
pub use composite::Composite;
pub use conv::Convolution;
