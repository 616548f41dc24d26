//! Report generation for aggregated responses.

mod generator;

pub use generator::*;
