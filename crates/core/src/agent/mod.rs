//! Agent module
//!
//! Agent definitions: the creation spec sent by the caller and the record
//! returned by the platform.

mod model;

pub use model::*;
