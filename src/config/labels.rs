use crate::config::parser::parse_config_file;
use crate::config::types::{CONFIG_FILE_NAME, Config, ConfigNode};
use crate::error::Result;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

/// Whether `node` takes part in a run with the given requested labels.
///
/// Gating is top-down: an inactive parent deactivates the whole subtree.
/// Unlabelled nodes are always active; labelled ones are opt-in.
pub fn is_active(node: &ConfigNode, requested: &BTreeSet<String>, parent_active: bool) -> bool {
	if !parent_active {
		return false;
	}
	node.labels.is_empty() || node.labels.iter().any(|label| requested.contains(label))
}

/// Union of every label declared anywhere in the tree.
pub fn collect_labels(node: &ConfigNode) -> BTreeSet<String> {
	let mut labels = BTreeSet::new();
	collect_into(node, &mut labels);
	labels
}

fn collect_into(node: &ConfigNode, labels: &mut BTreeSet<String>) {
	labels.extend(node.labels.iter().cloned());
	for child in node.children() {
		collect_into(child, labels);
	}
}

/// Labels of `config` plus those of every declared source that has its own
/// config, the latter prefixed with `<source>.` so they can be used in
/// `__include__` references. Each config file is visited once.
pub fn list_all_labels(config: &Config) -> Result<BTreeSet<String>> {
	let mut labels = collect_labels(&config.files);
	let mut visited = HashSet::from([config.path.clone()]);
	collect_source_labels(config, &mut labels, &mut visited)?;
	Ok(labels)
}

fn collect_source_labels(
	config: &Config,
	labels: &mut BTreeSet<String>,
	visited: &mut HashSet<PathBuf>,
) -> Result<()> {
	for decl in &config.sources {
		let config_path = decl.path.join(CONFIG_FILE_NAME);
		if !visited.insert(config_path.clone()) || !config_path.is_file() {
			continue;
		}

		tracing::info!(path = %config_path.display(), "reading labels from source config");
		let source_config = parse_config_file(&config_path)?;
		labels.extend(
			collect_labels(&source_config.files)
				.into_iter()
				.map(|label| format!("{}.{}", decl.name, label)),
		);
		collect_source_labels(&source_config, labels, visited)?;
	}
	Ok(())
}
