//! Shared primitives for the repdiv diversity-testing crates.
//!
//! - **Error types** — [`RepdivError`] and [`Result`] for structured error handling
//! - **Traits** — [`Scored`] and [`Summarizable`], implemented by test results
//!   and p-value matrices in `repdiv-stats`

pub mod error;
pub mod traits;

pub use error::{RepdivError, Result};
pub use traits::*;
