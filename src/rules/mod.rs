//! Pattern matching for lcopy.
//!
//! This module handles:
//! - Compiling glob rules into ordered tiers (default ignores, extra ignores, node rules)
//! - Last-match-wins decisions for individual paths
//! - Directory enumeration with short-circuiting of excluded directories

pub mod matcher;

pub use matcher::{
	CompiledRule, DEFAULT_IGNORE, IgnoreTiers, PatternMatcher, Tier, Verdict, validate_pattern,
};
