pub mod bridges;
pub mod common;
pub mod datasets;
pub mod errors;
