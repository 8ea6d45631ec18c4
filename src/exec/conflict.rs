use crate::config::ConflictPolicy;
use crate::error::{LcopyError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

/// Decision for one copy operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	/// Destination absent.
	Copy,
	/// Destination present with identical content.
	Unchanged,
	/// Destination present and different; existing file kept.
	Skip,
	/// Destination present and different; replaced.
	Overwrite,
	/// Dry-run under the prompt policy: the user would be asked.
	Ask,
}

impl Action {
	/// Whether executing the action writes the destination.
	pub fn writes(self) -> bool {
		matches!(self, Action::Copy | Action::Overwrite)
	}

	pub fn describe(self, dry_run: bool) -> &'static str {
		match (self, dry_run) {
			(Action::Copy, false) => "copied",
			(Action::Copy, true) => "would copy",
			(Action::Overwrite, false) => "overwritten",
			(Action::Overwrite, true) => "would overwrite",
			(Action::Skip, _) => "skipped (exists)",
			(Action::Unchanged, _) => "unchanged",
			(Action::Ask, _) => "would ask",
		}
	}
}

/// Answer to an overwrite prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
	OverwriteOne,
	SkipOne,
	OverwriteAll,
	SkipAll,
}

/// Source of answers for the prompt policy.
pub trait Prompt {
	/// Ask whether `destination` should be replaced by `source`.
	fn ask(&mut self, source: &Path, destination: &Path) -> Result<PromptAnswer>;
}

/// Prompt on a text stream, re-asking until a valid answer arrives.
#[derive(Debug)]
pub struct StreamPrompt<R, W> {
	input: R,
	output: W,
}

impl<R: BufRead, W: Write> StreamPrompt<R, W> {
	pub fn new(input: R, output: W) -> Self {
		StreamPrompt { input, output }
	}
}

impl<R: BufRead, W: Write> Prompt for StreamPrompt<R, W> {
	fn ask(&mut self, _source: &Path, destination: &Path) -> Result<PromptAnswer> {
		loop {
			write!(
				self.output,
				"File exists and differs: {}. Overwrite? [y]es/[n]o/[a]ll/[d]on't overwrite any: ",
				destination.display()
			)
			.and_then(|()| self.output.flush())
			.map_err(|source| LcopyError::PromptFailed {
				path: destination.to_path_buf(),
				source,
			})?;

			let mut line = String::new();
			let read = self
				.input
				.read_line(&mut line)
				.map_err(|source| LcopyError::PromptFailed {
					path: destination.to_path_buf(),
					source,
				})?;
			if read == 0 {
				return Err(LcopyError::PromptClosed {
					path: destination.to_path_buf(),
				});
			}

			match line.trim() {
				"y" | "Y" | "yes" => return Ok(PromptAnswer::OverwriteOne),
				"n" | "N" | "no" => return Ok(PromptAnswer::SkipOne),
				"a" | "A" | "all" => return Ok(PromptAnswer::OverwriteAll),
				"d" | "D" | "none" => return Ok(PromptAnswer::SkipAll),
				other => tracing::debug!("Unrecognised prompt answer '{}'", other),
			}
		}
	}
}

/// Sticky choice made with an "all" answer, valid for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct PromptSession {
	sticky: Option<Action>,
}

impl PromptSession {
	pub fn sticky(&self) -> Option<Action> {
		self.sticky
	}
}

/// Applies the conflict policy to individual operations.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
	policy: ConflictPolicy,
	dry_run: bool,
}

impl ConflictResolver {
	pub fn new(policy: ConflictPolicy, dry_run: bool) -> Self {
		ConflictResolver { policy, dry_run }
	}

	/// Decide what happens to `destination`. Identical content is never a
	/// conflict and never prompts.
	pub fn decide(
		&self,
		source: &Path,
		destination: &Path,
		session: &mut PromptSession,
		prompt: &mut dyn Prompt,
	) -> Result<Action> {
		if !destination.exists() {
			return Ok(Action::Copy);
		}
		if same_content(source, destination)? {
			return Ok(Action::Unchanged);
		}

		match self.policy {
			ConflictPolicy::Skip => Ok(Action::Skip),
			ConflictPolicy::Overwrite => Ok(Action::Overwrite),
			ConflictPolicy::Prompt => {
				if let Some(sticky) = session.sticky {
					return Ok(sticky);
				}
				if self.dry_run {
					return Ok(Action::Ask);
				}
				Ok(match prompt.ask(source, destination)? {
					PromptAnswer::OverwriteOne => Action::Overwrite,
					PromptAnswer::SkipOne => Action::Skip,
					PromptAnswer::OverwriteAll => {
						session.sticky = Some(Action::Overwrite);
						Action::Overwrite
					}
					PromptAnswer::SkipAll => {
						session.sticky = Some(Action::Skip);
						Action::Skip
					}
				})
			}
		}
	}
}

/// Byte-for-byte comparison; both handles are closed on return.
pub fn same_content(a: &Path, b: &Path) -> Result<bool> {
	let meta_a = std::fs::metadata(a).map_err(|source| LcopyError::io(a, source))?;
	let meta_b = std::fs::metadata(b).map_err(|source| LcopyError::io(b, source))?;
	if meta_a.len() != meta_b.len() || meta_a.is_dir() != meta_b.is_dir() {
		return Ok(false);
	}

	let mut reader_a = BufReader::new(File::open(a).map_err(|source| LcopyError::io(a, source))?);
	let mut reader_b = BufReader::new(File::open(b).map_err(|source| LcopyError::io(b, source))?);
	let mut buf_a = [0u8; 8192];
	let mut buf_b = [0u8; 8192];

	loop {
		let read = reader_a
			.read(&mut buf_a)
			.map_err(|source| LcopyError::io(a, source))?;
		if read == 0 {
			return Ok(true);
		}
		reader_b
			.read_exact(&mut buf_b[..read])
			.map_err(|source| LcopyError::io(b, source))?;
		if buf_a[..read] != buf_b[..read] {
			return Ok(false);
		}
	}
}
