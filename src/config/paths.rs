use crate::error::{LcopyError, Result};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Placeholder replaced by the requested labels in destination paths.
const LABELS_PLACEHOLDER: &str = "{labels}";

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> Result<PathBuf> {
	if raw == "~" {
		return dirs::home_dir().ok_or(LcopyError::HomeDirectoryNotFound);
	}
	if let Some(rest) = raw.strip_prefix("~/") {
		let home = dirs::home_dir().ok_or(LcopyError::HomeDirectoryNotFound)?;
		return Ok(home.join(rest));
	}
	Ok(PathBuf::from(raw))
}

/// Resolve `raw` against `base` (unless it is absolute) and normalise it.
pub fn resolve_path(base: &Path, raw: &str) -> Result<PathBuf> {
	let expanded = expand_home(raw)?;
	Ok(normalize(&base.join(expanded)))
}

/// Lexically remove `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if !out.pop() {
					out.push("..");
				}
			}
			other => out.push(other.as_os_str()),
		}
	}
	out
}

/// Replace `{labels}` with the requested labels joined by `.`.
pub fn substitute_labels(raw: &str, labels: &BTreeSet<String>) -> String {
	if !raw.contains(LABELS_PLACEHOLDER) {
		return raw.to_string();
	}
	let joined = labels.iter().map(String::as_str).collect::<Vec<_>>().join(".");
	raw.replace(LABELS_PLACEHOLDER, &joined)
}
