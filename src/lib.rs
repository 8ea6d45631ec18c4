//! lcopy - copy files into a destination tree from a declarative, nested config.
//!
//! This library provides the core functionality for lcopy, including:
//! - Configuration parsing into a typed node tree with labels and includes
//! - Glob rule evaluation with last-match-wins precedence
//! - Plan resolution across included sources, with cycle detection
//! - Plan execution with conflict policies, purge and concatenated output
//!
//! # Example
//!
//! ```no_run
//! use lcopy_cli::config::parse_config_file;
//! use lcopy_cli::plan::resolve_plan;
//! use std::collections::BTreeSet;
//! use std::path::Path;
//!
//! let config = parse_config_file(Path::new(".lcopy.toml")).unwrap();
//! let labels: BTreeSet<String> = ["dev".to_string()].into_iter().collect();
//! let plan = resolve_plan(&config, &labels).unwrap();
//!
//! for op in &plan.operations {
//!     println!("{} -> {}", op.source.display(), op.destination.display());
//! }
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod plan;
pub mod rules;

pub use error::{LcopyError, Result};
