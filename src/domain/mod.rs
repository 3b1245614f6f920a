//! Domain layer for tf-checkpoint
//!
//! Architecture: Domain-Driven Design - Pure domain models with no external dependencies
//! - Check results and reports are plain values
//! - Aggregation is expressed as folds over immutable results

pub mod checks;
