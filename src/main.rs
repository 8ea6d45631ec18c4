use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use lcopy_cli::config::paths::{resolve_path, substitute_labels};
use lcopy_cli::config::{Config, parse_config_file};
use lcopy_cli::exec::{ExecOptions, RunReport, StreamPrompt, execute};
use lcopy_cli::plan::{Plan, describe_nodes, resolve_plan};

#[derive(Parser)]
#[command(name = "lcopy")]
#[command(
	author,
	version,
	about = "Copy files into a destination tree as described by a labelled config"
)]
struct Cli {
	/// Path to the configuration file
	config_file: PathBuf,

	/// Activate nodes carrying this label (repeatable)
	#[arg(short, long = "label", value_name = "LABEL")]
	labels: Vec<String>,

	/// Report what would happen without touching the filesystem
	#[arg(long)]
	dry_run: bool,

	/// Print every label the config and its sources declare, then exit
	#[arg(long)]
	list_labels: bool,

	/// Print the label-filtered node tree before copying
	#[arg(long)]
	print_nodes: bool,

	/// Increase log verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();

	let config = parse_config_file(&cli.config_file)
		.with_context(|| format!("Failed to load {}", cli.config_file.display()))?;

	let config_verbose = config.options.as_ref().is_some_and(|options| options.verbose);
	setup_logging(cli.verbose.max(u8::from(config_verbose)));

	if cli.list_labels {
		return handle_list_labels(&config);
	}

	handle_copy(&cli, &config)
}

fn setup_logging(verbosity: u8) {
	let level = match verbosity {
		0 => LevelFilter::WARN,
		1 => LevelFilter::INFO,
		_ => LevelFilter::DEBUG,
	};

	let filter = EnvFilter::builder()
		.with_default_directive(level.into())
		.from_env_lossy();

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.init();
}

fn handle_list_labels(config: &Config) -> Result<ExitCode> {
	let labels = lcopy_cli::config::list_all_labels(config).context("Failed to collect labels")?;

	println!("Available labels:");
	for label in &labels {
		println!("  {}", label);
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_copy(cli: &Cli, config: &Config) -> Result<ExitCode> {
	let options = config.entry_options()?;
	let verbose = cli.verbose > 0 || options.verbose;

	let labels: BTreeSet<String> = cli.labels.iter().cloned().collect();
	let dry_run = cli.dry_run || options.dry_run;

	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let raw_destination = options
		.destination
		.as_deref()
		.context("options.destination is required")?;
	let destination = resolve_path(&cwd, &substitute_labels(raw_destination, &labels))?;
	let concat_output = options
		.concatenated_output_filename
		.as_deref()
		.map(|raw| resolve_path(&config.dir, &substitute_labels(raw, &labels)))
		.transpose()?;

	if cli.print_nodes {
		print!("{}", describe_nodes(&config.files, &labels));
	}

	let plan = resolve_plan(config, &labels).context("Failed to resolve copy plan")?;
	report_conflicts(&plan);

	let exec_options = ExecOptions {
		destination: destination.clone(),
		policy: options.conflict,
		dry_run,
		purge: options.purge,
		concat_output,
	};

	let stdin = io::stdin();
	let mut prompt = StreamPrompt::new(stdin.lock(), io::stderr());
	let report = execute(&plan, &exec_options, &mut prompt)
		.with_context(|| format!("Copy into {} aborted", destination.display()))?;

	print_report(&report, &destination, dry_run, verbose);

	if report.has_failures() {
		return Ok(ExitCode::FAILURE);
	}
	Ok(ExitCode::SUCCESS)
}

fn report_conflicts(plan: &Plan) {
	for conflict in &plan.conflicts {
		eprintln!(
			"Warning: {} is claimed by both {} and {}; keeping the first",
			conflict.destination.display(),
			conflict.kept.display(),
			conflict.dropped.display()
		);
	}
}

fn print_report(report: &RunReport, destination: &Path, dry_run: bool, verbose: bool) {
	if verbose {
		for outcome in &report.outcomes {
			println!("  {}: {}", outcome.action.describe(dry_run), outcome.destination.display());
		}
	}

	for failure in &report.failures {
		eprintln!("Failed: {}: {:?}", failure.destination.display(), failure.error);
	}

	let verb = if dry_run { "Would copy" } else { "Copied" };
	println!("{} {} files to {}", verb, report.written(), destination.display());

	let purge_verb = if dry_run { "Would purge" } else { "Purged" };
	for file in &report.purged_files {
		println!("{}: {}", purge_verb, file.display());
	}
	for dir in &report.purged_dirs {
		println!("Removed empty directory: {}", dir.display());
	}
	if report.purge_suppressed {
		eprintln!("Purge skipped because some files failed to copy");
	}

	if let Some(concat) = &report.concat {
		let verb = if dry_run { "Would write" } else { "Wrote" };
		println!(
			"{} {} files to {}",
			verb,
			concat.written.len(),
			concat.output.display()
		);
		for skipped in &concat.skipped {
			eprintln!("Warning: skipped binary file {} in concatenated output", skipped.display());
		}
	}
}
