//! Core bootstrap logic: plan types, config parsing, plan resolution and the step pipeline.

pub mod deps;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod planner;
pub mod steps;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;
