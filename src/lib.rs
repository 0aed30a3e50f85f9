pub mod builder;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod datatypes;
pub mod engine;
pub mod error;
pub mod memo;
pub mod operators;
pub mod optimizer;
pub mod plan;
pub mod rules;
pub mod statistics;
#[cfg(test)]
pub mod testing;
#[cfg(test)]
mod tests;
