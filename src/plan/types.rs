use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// One source file copied to one destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOperation {
	/// Absolute path of the file to copy.
	pub source: PathBuf,

	/// Path relative to the destination root.
	pub destination: PathBuf,

	/// Position in declaration-order depth-first traversal.
	pub sequence: usize,

	/// `<source>:<node path>` of the node that produced the operation.
	pub origin: String,
}

/// Two operations targeting the same destination from different sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
	pub destination: PathBuf,

	/// Source of the operation that stays in the plan (declared first).
	pub kept: PathBuf,

	pub dropped: PathBuf,
}

/// Ordered list of copy operations for one run.
#[derive(Debug, Clone, Default)]
pub struct Plan {
	pub operations: Vec<CopyOperation>,
	pub conflicts: Vec<Conflict>,
}

impl Plan {
	/// Append an operation; it receives the next sequence index.
	pub fn push(&mut self, source: PathBuf, destination: PathBuf, origin: String) {
		let sequence = self.operations.len();
		self.operations.push(CopyOperation {
			source,
			destination,
			sequence,
			origin,
		});
	}

	/// Append a sub-plan, placing its destinations under `prefix`.
	pub fn splice(&mut self, sub: Plan, prefix: &Path) {
		for op in sub.operations {
			self.push(op.source, prefix.join(op.destination), op.origin);
		}
	}

	/// Collapse repeated (source, destination) pairs and record conflicts for
	/// destinations claimed by more than one source. The first claim wins.
	/// Sequence indices are renumbered afterwards.
	pub fn finalize(self) -> Plan {
		let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
		let mut plan = Plan {
			operations: Vec::with_capacity(self.operations.len()),
			conflicts: self.conflicts,
		};

		for op in self.operations {
			match claimed.get(&op.destination) {
				Some(kept) if *kept == op.source => {
					tracing::debug!("Collapsing repeated operation for {}", op.destination.display());
				}
				Some(kept) => {
					tracing::warn!(
						"Conflicting sources for {}: keeping {}, dropping {}",
						op.destination.display(),
						kept.display(),
						op.source.display()
					);
					plan.conflicts.push(Conflict {
						destination: op.destination,
						kept: kept.clone(),
						dropped: op.source,
					});
				}
				None => {
					claimed.insert(op.destination.clone(), op.source.clone());
					plan.push(op.source, op.destination, op.origin);
				}
			}
		}

		plan
	}

	/// Every destination path in the plan.
	pub fn destinations(&self) -> BTreeSet<&Path> {
		self.operations
			.iter()
			.map(|op| op.destination.as_path())
			.collect()
	}

	pub fn len(&self) -> usize {
		self.operations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.operations.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn plan_of(pairs: &[(&str, &str)]) -> Plan {
		let mut plan = Plan::default();
		for (source, destination) in pairs {
			plan.push(PathBuf::from(source), PathBuf::from(destination), "test".to_string());
		}
		plan
	}

	#[test]
	fn test_finalize_collapses_identical_repeats() {
		let plan = plan_of(&[("/s/a", "a"), ("/s/b", "b"), ("/s/a", "a")]).finalize();

		assert_eq!(plan.len(), 2);
		assert!(plan.conflicts.is_empty());
		let sequences: Vec<_> = plan.operations.iter().map(|op| op.sequence).collect();
		assert_eq!(sequences, vec![0, 1]);
	}

	#[test]
	fn test_finalize_records_conflicts() {
		let plan = plan_of(&[("/one/a", "a"), ("/two/a", "a")]).finalize();

		assert_eq!(plan.len(), 1);
		assert_eq!(plan.operations[0].source, PathBuf::from("/one/a"));
		assert_eq!(
			plan.conflicts,
			vec![Conflict {
				destination: PathBuf::from("a"),
				kept: PathBuf::from("/one/a"),
				dropped: PathBuf::from("/two/a"),
			}]
		);
	}

	#[test]
	fn test_splice_prefixes_and_continues_sequence() {
		let mut plan = plan_of(&[("/s/a", "a")]);
		plan.splice(plan_of(&[("/lib/x", "x"), ("/lib/y", "y")]), Path::new("vendor"));

		let destinations: Vec<_> = plan
			.operations
			.iter()
			.map(|op| (op.destination.clone(), op.sequence))
			.collect();
		assert_eq!(
			destinations,
			vec![
				(PathBuf::from("a"), 0),
				(PathBuf::from("vendor/x"), 1),
				(PathBuf::from("vendor/y"), 2),
			]
		);
	}
}
