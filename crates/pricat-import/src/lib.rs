//! PRICAT import
//!
//! Converts supplier catalogue feeds in the PRICAT CSV layout into import
//! packages for the Elena ERP: a 90-column import CSV, an XLSX run report and
//! the product images, uploaded via FTP and activated over HTTP.
//!
//! - [`parser`]: feed decoding and row parsing into a [`models::CatalogueBatch`]
//! - [`storage`]: supplier / manufacturer / brand master data
//! - [`export`]: Elena CSV and report workbook
//! - [`images`], [`ftp`], [`notifier`]: the network side
//! - [`pipeline`]: the state machine tying it together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pricat_import::config::Config;
//! use pricat_import::pipeline::{FeedSource, Pipeline, PipelineOptions, PipelineServices};
//! use pricat_import::storage::MemoryEntityStore;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let services = PipelineServices::from_config(&config, Arc::new(MemoryEntityStore::new()))?;
//! let run = Pipeline::new(services)
//!     .run(&PipelineOptions::new(FeedSource::Local("feed.csv".into())))
//!     .await;
//! println!("{} articles", run.article_count);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ftp;
pub mod images;
pub mod models;
pub mod notifier;
pub mod parser;
pub mod pipeline;
pub mod storage;

pub use cli::{Cli, Commands, RunArgs};
pub use error::{ImportError, Result};
