//! PRICAT Common Library
//!
//! Shared types, identifier helpers, logging and error handling for the
//! PRICAT import workspace.
//!
//! - **Error Handling**: [`PricatError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Types**: GLN validation and identifier normalization shared by the
//!   parser, the entity store and the FTP supplier sync
//!
//! # Example
//!
//! ```
//! use pricat_common::types::{strip_leading_zeros, Gln};
//!
//! assert_eq!(strip_leading_zeros("0000001872"), "1872");
//! assert!(Gln::parse("4023017000005").is_ok());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

pub use error::{PricatError, Result};
