use serde::Deserialize;
use std::path::PathBuf;

/// File name of a source's own configuration, looked up at the source root.
pub const CONFIG_FILE_NAME: &str = ".lcopy.toml";

/// Name under which a configuration refers to its own source.
pub const LOCAL_SOURCE: &str = ".";

/// What to do when a destination file exists with different content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
	/// Keep the existing file.
	#[default]
	Skip,
	/// Replace the existing file.
	Overwrite,
	/// Ask for each file.
	Prompt,
}

/// The `[options]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
	/// Destination root. Required for the entry configuration.
	pub destination: Option<String>,

	pub conflict: ConflictPolicy,

	pub verbose: bool,

	/// Delete destination files that are not part of the plan.
	pub purge: bool,

	pub dry_run: bool,

	/// Seed the matcher with the built-in ignore list.
	pub default_ignore: bool,

	/// Extra exclusion globs applied before a node's own rules.
	pub extra_ignore: Vec<String>,

	/// Optional single file receiving the concatenation of every copied file.
	pub concatenated_output_filename: Option<String>,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			destination: None,
			conflict: ConflictPolicy::Skip,
			verbose: false,
			purge: false,
			dry_run: false,
			default_ignore: true,
			extra_ignore: Vec::new(),
			concatenated_output_filename: None,
		}
	}
}

/// A glob pattern and whether matching paths are included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
	pub pattern: String,
	pub include: bool,
}

/// A reference to another source's file selection, optionally scoped to one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
	pub source: String,
	pub label: Option<String>,
}

impl std::fmt::Display for Include {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.label {
			Some(label) => write!(f, "{}.{}", self.source, label),
			None => write!(f, "{}", self.source),
		}
	}
}

/// One entry of a node body, disambiguated once at parse time.
#[derive(Debug, Clone)]
pub enum NodeEntry {
	Rule(Rule),
	Child(ConfigNode),
}

/// One level of the file-selection tree.
#[derive(Debug, Clone, Default)]
pub struct ConfigNode {
	/// Destination segment. Empty for the root.
	pub name: String,

	/// Source directory remap, relative to the parent's effective source directory.
	pub cd: Option<PathBuf>,

	/// Expand into one child per sub-directory of the source directory (`(<x>)` keys).
	pub fan_out: bool,

	/// Activation labels; empty means always active.
	pub labels: Vec<String>,

	pub includes: Vec<Include>,

	/// Rules and children in declaration order.
	pub entries: Vec<NodeEntry>,
}

impl ConfigNode {
	/// The node's own rules, in declaration order.
	pub fn rules(&self) -> impl Iterator<Item = &Rule> {
		self.entries.iter().filter_map(|entry| match entry {
			NodeEntry::Rule(rule) => Some(rule),
			NodeEntry::Child(_) => None,
		})
	}

	/// The node's children, in declaration order.
	pub fn children(&self) -> impl Iterator<Item = &ConfigNode> {
		self.entries.iter().filter_map(|entry| match entry {
			NodeEntry::Child(child) => Some(child),
			NodeEntry::Rule(_) => None,
		})
	}

	pub fn has_rules(&self) -> bool {
		self.rules().next().is_some()
	}
}

/// A source declared in the `[sources]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDecl {
	pub name: String,
	pub path: PathBuf,
}

/// A fully parsed configuration file.
#[derive(Debug, Clone)]
pub struct Config {
	/// The file this config was loaded from.
	pub path: PathBuf,

	/// Directory containing the file; the binding of `.` for this config.
	pub dir: PathBuf,

	pub sources: Vec<SourceDecl>,

	pub options: Option<Options>,

	/// Root of the file-selection tree.
	pub files: ConfigNode,
}

impl Config {
	/// Options of an entry configuration, which must name a destination.
	pub fn entry_options(&self) -> crate::Result<&Options> {
		match &self.options {
			Some(options) if options.destination.is_some() => Ok(options),
			_ => Err(crate::LcopyError::invalid(
				&self.path,
				"missing required option 'destination'",
			)),
		}
	}
}
