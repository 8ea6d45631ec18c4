use crate::config::paths::normalize;
use crate::config::{ConfigNode, SourceRegistry, is_active};
use crate::error::{LcopyError, Result};
use crate::plan::include::IncludeResolver;
use crate::plan::types::Plan;
use crate::rules::{IgnoreTiers, PatternMatcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Walks one configuration tree and emits its copy operations.
///
/// Traversal is depth-first in declaration order. At each active node the
/// node's own rules are evaluated first, then its includes are spliced in,
/// then its children are visited.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
	registry: &'a mut SourceRegistry,
	includes: &'a mut IncludeResolver,
	ignore: &'a IgnoreTiers,
	labels: &'a BTreeSet<String>,
	/// Name of the source whose tree is being walked.
	source: &'a str,
	plan: Plan,
}

impl<'a> PlanBuilder<'a> {
	pub fn new(
		registry: &'a mut SourceRegistry,
		includes: &'a mut IncludeResolver,
		ignore: &'a IgnoreTiers,
		labels: &'a BTreeSet<String>,
		source: &'a str,
	) -> Self {
		PlanBuilder {
			registry,
			includes,
			ignore,
			labels,
			source,
			plan: Plan::default(),
		}
	}

	/// Build the plan for the tree rooted at `root`, whose source directory is
	/// `source_dir`. Destinations are relative to the tree's own root.
	pub fn build(mut self, root: &ConfigNode, source_dir: &Path) -> Result<Plan> {
		self.visit(root, source_dir, Path::new(""), true)?;
		Ok(self.plan)
	}

	fn visit(
		&mut self,
		node: &ConfigNode,
		parent_source: &Path,
		parent_dest: &Path,
		parent_active: bool,
	) -> Result<()> {
		if !is_active(node, self.labels, parent_active) {
			tracing::debug!(
				"Skipping node '{}': labels {:?} not requested",
				node.name,
				node.labels
			);
			return Ok(());
		}

		if node.fan_out {
			for name in self.subdirectories(parent_source)? {
				let expanded = parent_source.join(&name);
				let source_dir = match &node.cd {
					Some(cd) => normalize(&expanded.join(cd)),
					None => expanded,
				};
				self.visit_at(node, &source_dir, &parent_dest.join(&name))?;
			}
			return Ok(());
		}

		let source_dir = match &node.cd {
			Some(cd) => normalize(&parent_source.join(cd)),
			None => parent_source.to_path_buf(),
		};
		let dest = if node.name.is_empty() {
			parent_dest.to_path_buf()
		} else {
			parent_dest.join(&node.name)
		};

		self.visit_at(node, &source_dir, &dest)
	}

	fn visit_at(&mut self, node: &ConfigNode, source_dir: &Path, dest: &Path) -> Result<()> {
		let origin = format!("{}:{}", self.source, dest.display());

		if node.has_rules() {
			if source_dir.is_dir() {
				let matcher = PatternMatcher::new(self.ignore, node.rules())?;
				for relative in matcher.select_files(source_dir)? {
					tracing::debug!("Selected {} for {}", relative.display(), origin);
					self.plan.push(
						source_dir.join(&relative),
						dest.join(&relative),
						origin.clone(),
					);
				}
			} else {
				tracing::warn!(
					"Source directory {} of node '{}' does not exist",
					source_dir.display(),
					origin
				);
			}
		}

		for include in &node.includes {
			tracing::info!("Including '{}' at {}", include, origin);
			let sub = self.includes.resolve(
				self.registry,
				self.ignore,
				include,
				self.source,
				self.labels,
			)?;
			self.plan.splice(sub, dest);
		}

		for child in node.children() {
			self.visit(child, source_dir, dest, true)?;
		}

		Ok(())
	}

	/// Immediate sub-directories of `dir`, sorted, minus those the ignore tiers exclude.
	fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>> {
		if !dir.is_dir() {
			tracing::warn!("Cannot expand sub-directories of missing {}", dir.display());
			return Ok(Vec::new());
		}

		let ignore_only = PatternMatcher::new(self.ignore, std::iter::empty())?;
		let entries = std::fs::read_dir(dir).map_err(|source| LcopyError::io(dir, source))?;

		let mut names = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|source| LcopyError::io(dir, source))?;
			let name = PathBuf::from(entry.file_name());
			if entry.path().is_dir() && ignore_only.should_descend(&name) {
				names.push(name);
			}
		}
		names.sort();
		Ok(names)
	}
}
