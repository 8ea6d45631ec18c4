use crate::config::types::{Options, Rule};
use crate::error::{LcopyError, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Exclusions seeded ahead of every node's rules when `default_ignore` is on.
pub const DEFAULT_IGNORE: &[&str] = &[
	"*.pyc",
	"__pycache__",
	".DS_Store",
	".git",
	".gitignore",
	".svn",
	".hg",
	".idea",
	"*.swp",
	"*.bak",
	"*.tmp",
	"*.log",
];

/// Where a rule came from. Tiers are concatenated in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
	Default,
	Extra,
	Node,
}

/// Outcome of evaluating a path against an ordered rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Included,
	Excluded,
	/// No rule matched. Files are then excluded; directories are descended.
	Unmatched,
}

/// A rule compiled for matching.
#[derive(Debug, Clone)]
pub struct CompiledRule {
	/// The pattern as written.
	pub pattern: String,

	pub include: bool,

	pub tier: Tier,

	/// Pattern had a trailing `/`: it names directories and their contents.
	dir_only: bool,

	matcher: GlobMatcher,

	/// Matches everything beneath a directory named by a `dir_only` pattern.
	subtree: Option<GlobMatcher>,
}

impl CompiledRule {
	/// Compile a rule.
	///
	/// Ignore-tier patterns without a `/` match a basename at any depth;
	/// node patterns are anchored at the node's source directory.
	pub fn new(pattern: &str, include: bool, tier: Tier) -> Result<Self> {
		let (body, dir_only) = match pattern.strip_suffix('/') {
			Some(body) => (body, true),
			None => (pattern, false),
		};

		let anchored = if tier != Tier::Node && !body.contains('/') {
			format!("**/{body}")
		} else {
			body.to_string()
		};

		let matcher = compile_glob(pattern, &anchored)?;
		let subtree = if dir_only {
			Some(compile_glob(pattern, &format!("{anchored}/**"))?)
		} else {
			None
		};

		Ok(CompiledRule {
			pattern: pattern.to_string(),
			include,
			tier,
			dir_only,
			matcher,
			subtree,
		})
	}

	/// Check if this rule applies to `path` (relative to the source directory).
	///
	/// Directories are only claimed by trailing-`/` patterns and by
	/// exclusions; a positive plain pattern such as `*` selects files only.
	pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
		let in_subtree = self
			.subtree
			.as_ref()
			.is_some_and(|subtree| subtree.is_match(path));

		if is_dir {
			if !self.dir_only && self.include {
				return false;
			}
			return self.matcher.is_match(path) || in_subtree;
		}

		if self.dir_only {
			in_subtree
		} else {
			self.matcher.is_match(path)
		}
	}
}

/// Compile a glob where `*` stays within one path segment.
fn compile_glob(pattern: &str, glob: &str) -> Result<GlobMatcher> {
	GlobBuilder::new(glob)
		.literal_separator(true)
		.build()
		.map(|glob| glob.compile_matcher())
		.map_err(|source| LcopyError::InvalidGlob {
			pattern: pattern.to_string(),
			source,
		})
}

/// Check that a node pattern compiles.
pub fn validate_pattern(pattern: &str) -> Result<()> {
	CompiledRule::new(pattern, true, Tier::Node).map(|_| ())
}

/// The default and `extra_ignore` tiers, built once per run.
#[derive(Debug, Clone, Default)]
pub struct IgnoreTiers {
	rules: Vec<CompiledRule>,
}

impl IgnoreTiers {
	pub fn new(default_ignore: bool, extra_ignore: &[String]) -> Result<Self> {
		let mut rules = Vec::new();
		if default_ignore {
			for pattern in DEFAULT_IGNORE {
				rules.push(CompiledRule::new(pattern, false, Tier::Default)?);
			}
		}
		for pattern in extra_ignore {
			rules.push(CompiledRule::new(pattern, false, Tier::Extra)?);
		}
		tracing::info!("Using {} ignore patterns", rules.len());
		Ok(IgnoreTiers { rules })
	}

	pub fn from_options(options: &Options) -> Result<Self> {
		Self::new(options.default_ignore, &options.extra_ignore)
	}

	pub fn rules(&self) -> &[CompiledRule] {
		&self.rules
	}
}

/// Ordered rule tiers for one node: ignore tiers first, then the node's own
/// rules in declaration order. The last matching rule decides.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
	rules: Vec<CompiledRule>,
}

impl PatternMatcher {
	pub fn new<'r>(ignore: &IgnoreTiers, node_rules: impl IntoIterator<Item = &'r Rule>) -> Result<Self> {
		let mut rules = ignore.rules().to_vec();
		for rule in node_rules {
			rules.push(CompiledRule::new(&rule.pattern, rule.include, Tier::Node)?);
		}
		Ok(PatternMatcher { rules })
	}

	/// The last rule that matches `path`, if any.
	pub fn deciding_rule(&self, path: &Path, is_dir: bool) -> Option<&CompiledRule> {
		self.rules.iter().rev().find(|rule| rule.matches(path, is_dir))
	}

	pub fn evaluate(&self, path: &Path, is_dir: bool) -> Verdict {
		match self.deciding_rule(path, is_dir) {
			Some(rule) if rule.include => Verdict::Included,
			Some(_) => Verdict::Excluded,
			None => Verdict::Unmatched,
		}
	}

	/// Whether `path` is selected. Inclusion is opt-in: no match means no.
	pub fn decide(&self, path: &Path, is_dir: bool) -> bool {
		self.evaluate(path, is_dir) == Verdict::Included
	}

	/// Whether traversal may enter `dir`. An excluded directory is never
	/// entered, whatever rules exist for paths beneath it.
	pub fn should_descend(&self, dir: &Path) -> bool {
		self.evaluate(dir, true) != Verdict::Excluded
	}

	/// Enumerate `root` and return the selected files, relative to `root`,
	/// in sorted depth-first order.
	pub fn select_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
		let walker = WalkDir::new(root)
			.min_depth(1)
			.follow_links(true)
			.sort_by_file_name()
			.into_iter()
			.filter_entry(|entry| {
				if !entry.file_type().is_dir() {
					return true;
				}
				let Ok(relative) = entry.path().strip_prefix(root) else {
					return false;
				};
				let descend = self.should_descend(relative);
				if !descend {
					tracing::debug!("Pruning excluded directory {}", relative.display());
				}
				descend
			});

		let mut selected = Vec::new();
		for entry in walker {
			let entry = match entry {
				Ok(entry) => entry,
				Err(err) if is_dangling_link(&err) => {
					self.report_dangling_link(root, &err);
					continue;
				}
				Err(source) => {
					return Err(LcopyError::WalkError {
						path: source.path().unwrap_or(root).to_path_buf(),
						source,
					});
				}
			};
			if entry.file_type().is_dir() {
				continue;
			}
			let Ok(relative) = entry.path().strip_prefix(root) else {
				continue;
			};
			if self.decide(relative, false) {
				selected.push(relative.to_path_buf());
			} else {
				tracing::trace!("Not selected: {}", relative.display());
			}
		}
		Ok(selected)
	}

	/// A dangling link is judged like a file; it is never copied.
	fn report_dangling_link(&self, root: &Path, err: &walkdir::Error) {
		let Some(relative) = err.path().and_then(|path| path.strip_prefix(root).ok()) else {
			return;
		};
		if self.decide(relative, false) {
			tracing::warn!("Skipping {}: symlink target does not exist", relative.display());
		} else {
			tracing::debug!("Ignoring dangling symlink {}", relative.display());
		}
	}
}

/// Whether a walk error comes from a symlink whose target is missing.
fn is_dangling_link(err: &walkdir::Error) -> bool {
	let missing = err
		.io_error()
		.is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);
	missing
		&& err
			.path()
			.and_then(|path| path.symlink_metadata().ok())
			.is_some_and(|meta| meta.file_type().is_symlink())
}
