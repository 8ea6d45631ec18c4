use crate::config::{
	CONFIG_FILE_NAME, Config, Include, LOCAL_SOURCE, SourceRegistry, parse_config_file,
};
use crate::error::{LcopyError, Result};
use crate::plan::builder::PlanBuilder;
use crate::plan::types::Plan;
use crate::rules::IgnoreTiers;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// Resolves `__include__` references into sub-plans.
///
/// Parsed configs are cached per source name for the run. Resolution itself
/// is never cached because each inclusion point may bring different labels.
/// The stack of sources currently being resolved forms the path through the
/// include graph; revisiting a source on that path is a cycle.
#[derive(Debug)]
pub struct IncludeResolver {
	cache: HashMap<String, Rc<Config>>,
	in_progress: Vec<String>,
}

impl IncludeResolver {
	/// `root_source` is the name of the tree resolution starts from.
	pub fn new(root_source: &str) -> Self {
		IncludeResolver {
			cache: HashMap::new(),
			in_progress: vec![root_source.to_string()],
		}
	}

	/// Resolve `include`, referenced from a node of `including_source`.
	///
	/// The included tree is resolved with `caller_labels` plus the include's
	/// qualifier label. Destinations of the returned plan are relative to the
	/// included tree's root.
	pub fn resolve(
		&mut self,
		registry: &mut SourceRegistry,
		ignore: &IgnoreTiers,
		include: &Include,
		including_source: &str,
		caller_labels: &BTreeSet<String>,
	) -> Result<Plan> {
		let name = if include.source == LOCAL_SOURCE {
			including_source
		} else {
			include.source.as_str()
		};

		if self.in_progress.iter().any(|active| active == name) {
			let mut chain = self.in_progress.clone();
			chain.push(name.to_string());
			return Err(LcopyError::CyclicInclude { chain });
		}

		let config = self.load(registry, name)?;
		let source_dir = registry.resolve(name)?.to_path_buf();

		let mut labels = caller_labels.clone();
		if let Some(label) = &include.label {
			labels.insert(label.clone());
		}

		self.in_progress.push(name.to_string());
		let result = PlanBuilder::new(registry, self, ignore, &labels, name)
			.build(&config.files, &source_dir);
		self.in_progress.pop();

		let plan = result?;
		tracing::debug!("Include '{}' resolved to {} operations", include, plan.len());
		Ok(plan)
	}

	/// Load and cache the config of source `name`, registering the sources it declares.
	fn load(&mut self, registry: &mut SourceRegistry, name: &str) -> Result<Rc<Config>> {
		if let Some(config) = self.cache.get(name) {
			return Ok(Rc::clone(config));
		}

		let config_path = registry.resolve(name)?.join(CONFIG_FILE_NAME);
		tracing::info!("Loading config of source '{}' from {}", name, config_path.display());
		let config = parse_config_file(&config_path)?;
		registry.register_declared(&config)?;

		let config = Rc::new(config);
		self.cache.insert(name.to_string(), Rc::clone(&config));
		Ok(config)
	}
}
