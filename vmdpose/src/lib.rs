//! Pure Rust runtime for retargeting VMD humanoid motion onto arbitrary
//! skeletons (unofficial).
//!
//! The crate is renderer- and engine-agnostic, and IO-free: hosts decode a
//! clip into [`MotionData`] (or parse VMD bytes with the `binary` feature),
//! describe their model as a [`TargetSkeleton`], and drive a
//! [`MotionController`] once per rendered frame with an absolute time in
//! frames.

#![forbid(unsafe_code)]

mod error;
mod model;
mod runtime;
mod settings;
mod tables;

#[cfg(feature = "binary")]
mod binary;

pub use error::*;
pub use model::*;
pub use runtime::*;
pub use settings::*;
pub use tables::*;
