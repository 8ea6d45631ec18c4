//! Plan execution for lcopy.
//!
//! This module handles:
//! - Applying the conflict policy to each copy operation
//! - Copying files into the destination tree
//! - Purging destination files the plan no longer produces
//! - Writing the optional concatenated output

pub mod concat;
pub mod conflict;
pub mod purge;

pub use concat::{ConcatSummary, ConcatWriter};
pub use conflict::{
	Action, ConflictResolver, Prompt, PromptAnswer, PromptSession, StreamPrompt, same_content,
};
pub use purge::PurgeSet;

use crate::config::ConflictPolicy;
use crate::error::{LcopyError, Result};
use crate::plan::Plan;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Settings for one execution of a plan.
#[derive(Debug, Clone)]
pub struct ExecOptions {
	/// Absolute destination root.
	pub destination: PathBuf,
	pub policy: ConflictPolicy,
	pub dry_run: bool,
	pub purge: bool,
	/// Absolute path of the concatenated output file, if any.
	pub concat_output: Option<PathBuf>,
}

/// What happened to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
	pub destination: PathBuf,
	pub action: Action,
}

/// A per-file error that did not stop the run.
#[derive(Debug)]
pub struct Failure {
	pub destination: PathBuf,
	pub error: LcopyError,
}

#[derive(Debug, Default)]
pub struct RunReport {
	pub outcomes: Vec<Outcome>,
	pub failures: Vec<Failure>,
	/// Files deleted by the purge (or that would be, in dry-run).
	pub purged_files: Vec<PathBuf>,
	pub purged_dirs: Vec<PathBuf>,
	/// Purge was requested but suppressed by earlier failures.
	pub purge_suppressed: bool,
	pub concat: Option<ConcatSummary>,
}

impl RunReport {
	/// Number of operations that write (or would write) their destination.
	pub fn written(&self) -> usize {
		self.outcomes.iter().filter(|o| o.action.writes()).count()
	}

	pub fn has_failures(&self) -> bool {
		!self.failures.is_empty()
	}
}

/// Execute `plan` against the destination tree.
///
/// Per-file copy errors are recorded and the remaining operations continue.
/// Prompt failures abort the run; work already done is not rolled back.
/// Purge runs last and only if no operation failed.
pub fn execute(plan: &Plan, options: &ExecOptions, prompt: &mut dyn Prompt) -> Result<RunReport> {
	let resolver = ConflictResolver::new(options.policy, options.dry_run);
	let mut session = PromptSession::default();
	let mut report = RunReport::default();

	for op in &plan.operations {
		let target = options.destination.join(&op.destination);
		let action = match resolver.decide(&op.source, &target, &mut session, prompt) {
			Ok(action) => action,
			Err(err @ (LcopyError::PromptClosed { .. } | LcopyError::PromptFailed { .. })) => {
				return Err(err);
			}
			Err(error) => {
				tracing::error!("Cannot compare {}: {}", target.display(), error);
				report.failures.push(Failure {
					destination: op.destination.clone(),
					error,
				});
				continue;
			}
		};

		tracing::debug!("{} -> {}: {:?}", op.source.display(), target.display(), action);
		if action.writes() && !options.dry_run {
			if let Err(error) = copy_file(&op.source, &target) {
				tracing::error!("Failed to copy {}: {}", op.source.display(), error);
				report.failures.push(Failure {
					destination: op.destination.clone(),
					error,
				});
				continue;
			}
		}

		report.outcomes.push(Outcome {
			destination: op.destination.clone(),
			action,
		});
	}

	if let Some(output) = &options.concat_output {
		write_concat(plan, options, &mut report, output)?;
	}

	if options.purge {
		if report.has_failures() {
			tracing::warn!("Skipping purge because {} operations failed", report.failures.len());
			report.purge_suppressed = true;
		} else {
			purge(plan, options, &mut report)?;
		}
	}

	Ok(report)
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
	if let Some(parent) = target.parent() {
		std::fs::create_dir_all(parent).map_err(|source| LcopyError::io(parent, source))?;
	}
	std::fs::copy(source, target).map_err(|err| LcopyError::io(target, err))?;
	Ok(())
}

fn write_concat(
	plan: &Plan,
	options: &ExecOptions,
	report: &mut RunReport,
	output: &Path,
) -> Result<()> {
	let failed: HashSet<PathBuf> = report
		.failures
		.iter()
		.map(|failure| failure.destination.clone())
		.collect();

	let sink: Box<dyn Write> = if options.dry_run {
		Box::new(io::sink())
	} else {
		if let Some(parent) = output.parent() {
			std::fs::create_dir_all(parent).map_err(|source| LcopyError::io(parent, source))?;
		}
		let file = File::create(output).map_err(|source| LcopyError::io(output, source))?;
		Box::new(BufWriter::new(file))
	};

	let mut writer = ConcatWriter::new(sink);
	for op in plan.operations.iter().filter(|op| !failed.contains(&op.destination)) {
		let path = if options.dry_run {
			op.source.clone()
		} else {
			options.destination.join(&op.destination)
		};
		match std::fs::read(&path) {
			Ok(content) => writer.append(&op.destination, content, output)?,
			Err(source) => {
				tracing::error!("Cannot read {} for concatenated output: {}", path.display(), source);
				report.failures.push(Failure {
					destination: op.destination.clone(),
					error: LcopyError::io(&path, source),
				});
			}
		}
	}

	tracing::info!("Wrote concatenated output to {}", output.display());
	report.concat = Some(writer.finish(output)?);
	Ok(())
}

fn purge(plan: &Plan, options: &ExecOptions, report: &mut RunReport) -> Result<()> {
	let root = &options.destination;
	let keep: Vec<PathBuf> = options
		.concat_output
		.iter()
		.filter_map(|output| output.strip_prefix(root).ok())
		.map(Path::to_path_buf)
		.collect();

	let set = PurgeSet::compute(root, &plan.destinations(), &keep)?;
	if !options.dry_run && !set.is_empty() {
		report.purged_dirs = set.apply(root)?;
	}
	report.purged_files = set.files;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use std::io::Cursor;

	struct Fixture {
		_temp_dir: tempfile::TempDir,
		source: PathBuf,
		dest: PathBuf,
	}

	fn fixture(files: &[(&str, &str)]) -> Fixture {
		let temp_dir = tempfile::tempdir().unwrap();
		let source = temp_dir.path().join("src");
		let dest = temp_dir.path().join("out");
		for (name, content) in files {
			let path = source.join(name);
			fs::create_dir_all(path.parent().unwrap()).unwrap();
			fs::write(path, content).unwrap();
		}
		Fixture {
			_temp_dir: temp_dir,
			source,
			dest,
		}
	}

	fn plan_of(fixture: &Fixture, names: &[&str]) -> Plan {
		let mut plan = Plan::default();
		for name in names {
			plan.push(fixture.source.join(name), PathBuf::from(name), "test".to_string());
		}
		plan
	}

	fn options(fixture: &Fixture, policy: ConflictPolicy) -> ExecOptions {
		ExecOptions {
			destination: fixture.dest.clone(),
			policy,
			dry_run: false,
			purge: false,
			concat_output: None,
		}
	}

	fn no_input() -> StreamPrompt<Cursor<&'static str>, Vec<u8>> {
		StreamPrompt::new(Cursor::new(""), Vec::new())
	}

	fn actions(report: &RunReport) -> Vec<Action> {
		report.outcomes.iter().map(|o| o.action).collect()
	}

	#[test]
	fn test_copies_and_second_run_is_idempotent() {
		let fx = fixture(&[("a.txt", "a"), ("nested/b.txt", "b")]);
		let plan = plan_of(&fx, &["a.txt", "nested/b.txt"]);
		let opts = ExecOptions {
			purge: true,
			..options(&fx, ConflictPolicy::Skip)
		};

		let first = execute(&plan, &opts, &mut no_input()).unwrap();
		assert_eq!(first.written(), 2);
		assert_eq!(fs::read_to_string(fx.dest.join("nested/b.txt")).unwrap(), "b");

		let second = execute(&plan, &opts, &mut no_input()).unwrap();
		assert_eq!(second.written(), 0);
		assert_eq!(actions(&second), vec![Action::Unchanged, Action::Unchanged]);
		assert!(second.purged_files.is_empty());
	}

	#[test]
	fn test_skip_and_overwrite_policies() {
		let fx = fixture(&[("a.txt", "new")]);
		let plan = plan_of(&fx, &["a.txt"]);
		fs::create_dir_all(&fx.dest).unwrap();
		fs::write(fx.dest.join("a.txt"), "old").unwrap();

		let report = execute(&plan, &options(&fx, ConflictPolicy::Skip), &mut no_input()).unwrap();
		assert_eq!(actions(&report), vec![Action::Skip]);
		assert_eq!(fs::read_to_string(fx.dest.join("a.txt")).unwrap(), "old");

		let report =
			execute(&plan, &options(&fx, ConflictPolicy::Overwrite), &mut no_input()).unwrap();
		assert_eq!(actions(&report), vec![Action::Overwrite]);
		assert_eq!(fs::read_to_string(fx.dest.join("a.txt")).unwrap(), "new");
	}

	#[test]
	fn test_prompt_answers_apply_in_plan_order() {
		let fx = fixture(&[("a.txt", "new"), ("b.txt", "new"), ("c.txt", "new")]);
		let plan = plan_of(&fx, &["a.txt", "b.txt", "c.txt"]);
		fs::create_dir_all(&fx.dest).unwrap();
		for name in ["a.txt", "b.txt", "c.txt"] {
			fs::write(fx.dest.join(name), "old").unwrap();
		}

		let mut prompt = StreamPrompt::new(Cursor::new("n\nd\n"), Vec::new());
		let report = execute(&plan, &options(&fx, ConflictPolicy::Prompt), &mut prompt).unwrap();

		assert_eq!(actions(&report), vec![Action::Skip, Action::Skip, Action::Skip]);
		assert_eq!(fs::read_to_string(fx.dest.join("c.txt")).unwrap(), "old");
	}

	#[test]
	fn test_prompt_eof_aborts_without_rollback() {
		let fx = fixture(&[("a.txt", "a"), ("b.txt", "new")]);
		let plan = plan_of(&fx, &["a.txt", "b.txt"]);
		fs::create_dir_all(&fx.dest).unwrap();
		fs::write(fx.dest.join("b.txt"), "old").unwrap();

		let result = execute(&plan, &options(&fx, ConflictPolicy::Prompt), &mut no_input());

		assert!(matches!(result, Err(LcopyError::PromptClosed { .. })));
		assert!(fx.dest.join("a.txt").exists());
		assert_eq!(fs::read_to_string(fx.dest.join("b.txt")).unwrap(), "old");
	}

	#[test]
	fn test_dry_run_mutates_nothing() {
		let fx = fixture(&[("a.txt", "a")]);
		let plan = plan_of(&fx, &["a.txt"]);
		fs::create_dir_all(&fx.dest).unwrap();
		fs::write(fx.dest.join("stale.txt"), "stale").unwrap();
		let opts = ExecOptions {
			dry_run: true,
			purge: true,
			concat_output: Some(fx.dest.join("all.txt")),
			..options(&fx, ConflictPolicy::Skip)
		};

		let report = execute(&plan, &opts, &mut no_input()).unwrap();

		assert_eq!(report.written(), 1);
		assert_eq!(report.purged_files, vec![PathBuf::from("stale.txt")]);
		assert!(!fx.dest.join("a.txt").exists());
		assert!(fx.dest.join("stale.txt").exists());
		assert!(!fx.dest.join("all.txt").exists());
		assert_eq!(report.concat.unwrap().written, vec![PathBuf::from("a.txt")]);
	}

	#[test]
	fn test_purge_removes_stale_files_only_when_enabled() {
		let fx = fixture(&[("a.txt", "a")]);
		let plan = plan_of(&fx, &["a.txt"]);
		fs::create_dir_all(fx.dest.join("old")).unwrap();
		fs::write(fx.dest.join("stale.txt"), "stale").unwrap();
		fs::write(fx.dest.join("old/gone.txt"), "gone").unwrap();

		execute(&plan, &options(&fx, ConflictPolicy::Skip), &mut no_input()).unwrap();
		assert!(fx.dest.join("stale.txt").exists());

		let opts = ExecOptions {
			purge: true,
			..options(&fx, ConflictPolicy::Skip)
		};
		let report = execute(&plan, &opts, &mut no_input()).unwrap();
		assert!(!fx.dest.join("stale.txt").exists());
		assert!(!fx.dest.join("old").exists());
		assert!(fx.dest.join("a.txt").exists());
		assert_eq!(report.purged_dirs, vec![PathBuf::from("old")]);
	}

	#[test]
	fn test_copy_failure_is_recorded_and_suppresses_purge() {
		let fx = fixture(&[("a.txt", "a")]);
		let mut plan = plan_of(&fx, &["a.txt"]);
		plan.push(fx.source.join("missing.txt"), PathBuf::from("missing.txt"), "test".to_string());
		fs::create_dir_all(&fx.dest).unwrap();
		fs::write(fx.dest.join("stale.txt"), "stale").unwrap();
		let opts = ExecOptions {
			purge: true,
			..options(&fx, ConflictPolicy::Skip)
		};

		let report = execute(&plan, &opts, &mut no_input()).unwrap();

		assert!(report.has_failures());
		assert_eq!(report.failures[0].destination, PathBuf::from("missing.txt"));
		assert!(fx.dest.join("a.txt").exists());
		assert!(report.purge_suppressed);
		assert!(fx.dest.join("stale.txt").exists());
	}

	#[test]
	fn test_concat_read_error_is_recorded_and_run_continues() {
		let fx = fixture(&[("a.txt", "alpha")]);
		let plan = plan_of(&fx, &["missing.txt", "a.txt"]);
		let opts = ExecOptions {
			dry_run: true,
			purge: true,
			concat_output: Some(fx.dest.join("all.txt")),
			..options(&fx, ConflictPolicy::Skip)
		};

		let report = execute(&plan, &opts, &mut no_input()).unwrap();

		assert_eq!(report.failures.len(), 1);
		assert_eq!(report.failures[0].destination, PathBuf::from("missing.txt"));
		assert!(report.purge_suppressed);
		assert_eq!(report.concat.unwrap().written, vec![PathBuf::from("a.txt")]);
	}

	#[test]
	fn test_concat_follows_plan_order_and_skips_binary() {
		let fx = fixture(&[("b.txt", "beta"), ("a.txt", "alpha")]);
		fs::write(fx.source.join("logo.png"), [0xff, 0xfe, 0x00]).unwrap();
		let plan = plan_of(&fx, &["b.txt", "logo.png", "a.txt"]);
		let output = fx.dest.join("all.txt");
		let opts = ExecOptions {
			purge: true,
			concat_output: Some(output.clone()),
			..options(&fx, ConflictPolicy::Skip)
		};

		let report = execute(&plan, &opts, &mut no_input()).unwrap();

		let concat = report.concat.unwrap();
		assert_eq!(concat.skipped, vec![PathBuf::from("logo.png")]);
		let text = fs::read_to_string(&output).unwrap();
		let beta = text.find("=== FILE: b.txt ===").unwrap();
		let alpha = text.find("=== FILE: a.txt ===").unwrap();
		assert!(beta < alpha);
		assert!(!text.contains("logo.png"));
		// The output lives inside the destination and survives the purge.
		assert!(output.exists());
	}
}
