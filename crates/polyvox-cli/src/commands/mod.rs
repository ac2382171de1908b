//! CLI command implementations.

pub mod bounce;
pub mod common;
pub mod json;
pub mod params;
pub mod run;
pub mod units;
