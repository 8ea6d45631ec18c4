use crate::error::{LcopyError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 80;

/// Writes the content of every planned file into one traceable output.
#[derive(Debug)]
pub struct ConcatWriter<W> {
	out: W,
	written: Vec<PathBuf>,
	skipped: Vec<PathBuf>,
}

/// What went into the concatenated output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcatSummary {
	pub output: PathBuf,
	pub written: Vec<PathBuf>,
	/// Files left out because their content is not UTF-8 text.
	pub skipped: Vec<PathBuf>,
}

impl<W: Write> ConcatWriter<W> {
	pub fn new(out: W) -> Self {
		ConcatWriter {
			out,
			written: Vec::new(),
			skipped: Vec::new(),
		}
	}

	/// Append `content` under a delimiter naming `destination`.
	/// Undecodable content is skipped with a warning.
	pub fn append(&mut self, destination: &Path, content: Vec<u8>, output: &Path) -> Result<()> {
		let Ok(text) = String::from_utf8(content) else {
			tracing::warn!(
				"Skipping binary file {} in concatenated output",
				destination.display()
			);
			self.skipped.push(destination.to_path_buf());
			return Ok(());
		};

		let rule = "=".repeat(RULE_WIDTH);
		write!(
			self.out,
			"\n\n{rule}\n=== FILE: {} ===\n{rule}\n\n{text}",
			destination.display()
		)
		.map_err(|source| LcopyError::io(output, source))?;
		self.written.push(destination.to_path_buf());
		Ok(())
	}

	pub fn finish(mut self, output: &Path) -> Result<ConcatSummary> {
		self.out
			.flush()
			.map_err(|source| LcopyError::io(output, source))?;
		Ok(ConcatSummary {
			output: output.to_path_buf(),
			written: self.written,
			skipped: self.skipped,
		})
	}
}
