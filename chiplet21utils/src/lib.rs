//!
//! # Chiplet21 Internal Utilities Crate
//!
//! Serialization, error-context, and enum-string helpers shared by the model crates.
//!

pub mod ser;
pub use ser::*;

pub mod error;
pub use error::*;

pub mod context;
pub use context::*;

pub mod enumstr;
pub use enumstr::*;
