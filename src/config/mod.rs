//! Configuration loading and parsing for lcopy.
//!
//! This module handles:
//! - TOML config parsing into a typed node tree
//! - The run-wide source registry
//! - Label gating and label discovery

pub mod labels;
pub mod parser;
pub mod paths;
pub mod sources;
pub mod types;

pub use labels::{collect_labels, is_active, list_all_labels};
pub use parser::{parse_config_file, parse_config_str, parse_include};
pub use sources::SourceRegistry;
pub use types::{
	CONFIG_FILE_NAME, Config, ConfigNode, ConflictPolicy, Include, LOCAL_SOURCE, NodeEntry,
	Options, Rule, SourceDecl,
};
