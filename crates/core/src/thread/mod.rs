//! Thread module
//!
//! A thread is the durable conversation a run reads from and appends to.

mod model;

pub use model::*;
