//! Edge building blocks: Sobel gradients over normalized planes.
//!
//! Used by the preprocessor (vertical gradient plane for the snow-line
//! detector) and by the tilt calibrator (orientation of stake edges).

pub mod grad;

pub use grad::{sobel_gradients, sobel_vertical, Grad};
