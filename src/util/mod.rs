//! Shared math and sampling utilities.

pub mod colorspace;
pub mod frame;
pub mod rng;
pub mod sampling;

pub use frame::Frame;
