//! Command-line entry points.

pub mod engines;
pub mod run;
