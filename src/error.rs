use std::path::PathBuf;

/// Library-level structured errors for lcopy.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum LcopyError {
	#[error("Config file not found: {path}")]
	ConfigNotFound { path: PathBuf },

	#[error("Failed to read config file: {path}")]
	ConfigReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParseError {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid config in {path}: {message}")]
	InvalidConfig { path: PathBuf, message: String },

	#[error("Invalid glob pattern: {pattern}")]
	InvalidGlob {
		pattern: String,
		#[source]
		source: globset::Error,
	},

	#[error("Unknown source: {name}")]
	UnknownSource { name: String },

	#[error("Source '{name}' is bound to {existing}, cannot rebind it to {requested}")]
	DuplicateSource {
		name: String,
		existing: PathBuf,
		requested: PathBuf,
	},

	#[error("Cyclic include: {}", chain.join(" -> "))]
	CyclicInclude { chain: Vec<String> },

	#[error("Failed to walk directory: {path}")]
	WalkError {
		path: PathBuf,
		#[source]
		source: walkdir::Error,
	},

	#[error("I/O error on {path}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("No answer to overwrite prompt for {path} (input closed)")]
	PromptClosed { path: PathBuf },

	#[error("Failed to read answer to overwrite prompt for {path}")]
	PromptFailed {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

impl LcopyError {
	/// Shorthand for an [`LcopyError::InvalidConfig`].
	pub fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
		LcopyError::InvalidConfig {
			path: path.into(),
			message: message.into(),
		}
	}

	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		LcopyError::Io {
			path: path.into(),
			source,
		}
	}
}

/// Result type alias using LcopyError.
pub type Result<T> = std::result::Result<T, LcopyError>;
