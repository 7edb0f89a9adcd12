// Temporal sampling pipeline: config -> offsets -> indices -> fetch -> transform -> assemble

pub mod assembler;
pub mod classifier;
pub mod config;
pub mod driver;
pub mod error;
pub mod indices;
pub mod offsets;
pub mod orchestrator;
pub mod transform;
