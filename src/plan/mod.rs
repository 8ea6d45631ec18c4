//! Plan resolution for lcopy.
//!
//! This module handles:
//! - Walking the label-filtered node tree and emitting copy operations
//! - Splicing in the file selections of included sources
//! - Duplicate-destination detection on the final plan

pub mod builder;
pub mod include;
pub mod types;

pub use builder::PlanBuilder;
pub use include::IncludeResolver;
pub use types::{Conflict, CopyOperation, Plan};

use crate::config::{Config, ConfigNode, LOCAL_SOURCE, SourceRegistry, is_active};
use crate::error::Result;
use crate::rules::IgnoreTiers;
use std::collections::BTreeSet;

/// Resolve the complete, de-duplicated plan for an entry config.
pub fn resolve_plan(config: &Config, labels: &BTreeSet<String>) -> Result<Plan> {
	let options = config.options.clone().unwrap_or_default();
	let ignore = IgnoreTiers::from_options(&options)?;
	let mut registry = SourceRegistry::for_config(config)?;
	let mut includes = IncludeResolver::new(LOCAL_SOURCE);

	let plan = PlanBuilder::new(&mut registry, &mut includes, &ignore, labels, LOCAL_SOURCE)
		.build(&config.files, &config.dir)?;

	Ok(plan.finalize())
}

/// Render the active part of the node tree, one node per line.
pub fn describe_nodes(root: &ConfigNode, labels: &BTreeSet<String>) -> String {
	let mut out = String::new();
	describe_into(root, labels, 0, &mut out);
	out
}

fn describe_into(node: &ConfigNode, labels: &BTreeSet<String>, depth: usize, out: &mut String) {
	if !is_active(node, labels, true) {
		return;
	}

	let indent = "  ".repeat(depth);
	let name = if node.name.is_empty() { "/" } else { &node.name };
	out.push_str(&format!("{indent}{name}"));
	if let Some(cd) = &node.cd {
		out.push_str(&format!(" (cd: {})", cd.display()));
	}
	if node.fan_out {
		out.push_str(" (each sub-directory)");
	}
	if !node.labels.is_empty() {
		out.push_str(&format!(" [labels: {}]", node.labels.join(", ")));
	}
	out.push('\n');

	for rule in node.rules() {
		let sign = if rule.include { '+' } else { '-' };
		out.push_str(&format!("{indent}  {sign} {}\n", rule.pattern));
	}
	for include in &node.includes {
		out.push_str(&format!("{indent}  <- {include}\n"));
	}
	for child in node.children() {
		describe_into(child, labels, depth + 1, out);
	}
}
