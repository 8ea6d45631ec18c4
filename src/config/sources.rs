use crate::config::paths::normalize;
use crate::config::types::{Config, LOCAL_SOURCE};
use crate::error::{LcopyError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Run-wide mapping of source names to absolute directories.
///
/// A name is immutable once registered: registering it again with the same
/// path is a no-op, with a different path an error.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
	entries: BTreeMap<String, PathBuf>,
}

impl SourceRegistry {
	/// Create a registry seeded with the entry config's own directory (`.`)
	/// and every source it declares.
	pub fn for_config(config: &Config) -> Result<Self> {
		let mut registry = Self::default();
		registry.register(LOCAL_SOURCE, &config.dir)?;
		registry.register_declared(config)?;
		Ok(registry)
	}

	/// Register the sources declared by `config`.
	pub fn register_declared(&mut self, config: &Config) -> Result<()> {
		for decl in &config.sources {
			self.register(&decl.name, &decl.path)?;
		}
		Ok(())
	}

	pub fn register(&mut self, name: &str, path: &Path) -> Result<()> {
		let path = std::path::absolute(path)
			.map(|p| normalize(&p))
			.map_err(|source| LcopyError::io(path, source))?;

		match self.entries.get(name) {
			Some(existing) if *existing == path => Ok(()),
			Some(existing) => Err(LcopyError::DuplicateSource {
				name: name.to_string(),
				existing: existing.clone(),
				requested: path,
			}),
			None => {
				tracing::debug!(source = name, path = %path.display(), "registered source");
				self.entries.insert(name.to_string(), path);
				Ok(())
			}
		}
	}

	pub fn resolve(&self, name: &str) -> Result<&Path> {
		self.entries
			.get(name)
			.map(PathBuf::as_path)
			.ok_or_else(|| LcopyError::UnknownSource {
				name: name.to_string(),
			})
	}
}
