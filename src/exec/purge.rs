use crate::error::{LcopyError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files under the destination root that the plan does not produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSet {
	/// Destination-relative file paths, sorted.
	pub files: Vec<PathBuf>,
}

impl PurgeSet {
	/// Compare the files on disk under `root` with the plan's destinations.
	/// `keep` names extra destination-relative paths to leave alone, such as
	/// the concatenated output file.
	pub fn compute(root: &Path, planned: &BTreeSet<&Path>, keep: &[PathBuf]) -> Result<Self> {
		if !root.is_dir() {
			return Ok(PurgeSet::default());
		}

		let mut files = Vec::new();
		for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
			let entry = entry.map_err(|source| LcopyError::WalkError {
				path: root.to_path_buf(),
				source,
			})?;
			if entry.file_type().is_dir() {
				continue;
			}
			let Ok(relative) = entry.path().strip_prefix(root) else {
				continue;
			};
			if planned.contains(relative) || keep.iter().any(|k| k == relative) {
				continue;
			}
			files.push(relative.to_path_buf());
		}

		Ok(PurgeSet { files })
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}

	/// Delete the files, then every directory left empty, deepest first.
	/// The root itself is never removed. Returns the removed directories.
	pub fn apply(&self, root: &Path) -> Result<Vec<PathBuf>> {
		for file in &self.files {
			let path = root.join(file);
			tracing::info!("Purging {}", path.display());
			std::fs::remove_file(&path).map_err(|source| LcopyError::io(&path, source))?;
		}

		let mut directories = Vec::new();
		for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
			let entry = entry.map_err(|source| LcopyError::WalkError {
				path: root.to_path_buf(),
				source,
			})?;
			if !entry.file_type().is_dir() {
				continue;
			}
			let path = entry.path();
			let is_empty = std::fs::read_dir(path)
				.map_err(|source| LcopyError::io(path, source))?
				.next()
				.is_none();
			if is_empty {
				tracing::info!("Removing empty directory {}", path.display());
				std::fs::remove_dir(path).map_err(|source| LcopyError::io(path, source))?;
				if let Ok(relative) = path.strip_prefix(root) {
					directories.push(relative.to_path_buf());
				}
			}
		}

		Ok(directories)
	}
}
