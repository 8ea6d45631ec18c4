use crate::config::paths::{normalize, resolve_path};
use crate::config::types::{
	Config, ConfigNode, Include, LOCAL_SOURCE, NodeEntry, Options, Rule, SourceDecl,
};
use crate::error::{LcopyError, Result};
use crate::rules::matcher::validate_pattern;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use toml::{Table, Value};

const KEY_CD: &str = "__cd__";
const KEY_LABELS: &str = "__labels__";
const KEY_INCLUDE: &str = "__include__";
const KEY_SNIPPETS: &str = "__snippets__";

/// `source` or `source.label`.
static INCLUDE_REF: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(?<source>[^.\s]+)(?:\.(?<label>\S+))?$").expect("include pattern is valid")
});

/// Parse a config file from the given path.
pub fn parse_config_file(path: &Path) -> Result<Config> {
	if !path.is_file() {
		return Err(LcopyError::ConfigNotFound {
			path: path.to_path_buf(),
		});
	}

	let absolute = std::path::absolute(path).map_err(|source| LcopyError::ConfigReadError {
		path: path.to_path_buf(),
		source,
	})?;

	let content =
		std::fs::read_to_string(&absolute).map_err(|source| LcopyError::ConfigReadError {
			path: absolute.clone(),
			source,
		})?;

	parse_config_str(&content, &normalize(&absolute))
}

/// Parse a config from a string (useful for testing).
///
/// `path` is the location the config is considered to live at; its parent
/// directory anchors relative source paths and binds the `.` source.
pub fn parse_config_str(content: &str, path: &Path) -> Result<Config> {
	let document: Table = toml::from_str(content).map_err(|source| LcopyError::ConfigParseError {
		path: path.to_path_buf(),
		source,
	})?;

	let dir = path
		.parent()
		.map(Path::to_path_buf)
		.unwrap_or_else(|| PathBuf::from(LOCAL_SOURCE));

	let mut sources = Vec::new();
	let mut options = None;
	let mut files = None;
	let mut snippets = None;

	for (key, value) in &document {
		match key.as_str() {
			"sources" => sources = parse_sources(path, &dir, value)?,
			"options" => options = Some(parse_options(path, value)?),
			"files" => files = Some(value),
			"snippets" => {
				snippets = Some(value.as_table().ok_or_else(|| {
					LcopyError::invalid(path, "'snippets' must be a table of tables")
				})?)
			}
			other => {
				return Err(LcopyError::invalid(
					path,
					format!("unknown top-level key '{other}'"),
				));
			}
		}
	}

	let files = files
		.ok_or_else(|| LcopyError::invalid(path, "missing required 'files' table"))?
		.as_table()
		.ok_or_else(|| LcopyError::invalid(path, "'files' must be a table"))?;

	let parser = NodeParser { path, snippets };
	let mut root = ConfigNode::default();
	parser.parse_body(&mut root, files, &mut Vec::new())?;

	Ok(Config {
		path: path.to_path_buf(),
		dir,
		sources,
		options,
		files: root,
	})
}

fn parse_sources(path: &Path, dir: &Path, value: &Value) -> Result<Vec<SourceDecl>> {
	let table = value
		.as_table()
		.ok_or_else(|| LcopyError::invalid(path, "'sources' must map paths to names"))?;

	table
		.iter()
		.map(|(source_path, name)| {
			let name = name.as_str().ok_or_else(|| {
				LcopyError::invalid(
					path,
					format!("source '{source_path}' must be given a string name"),
				)
			})?;
			if name.is_empty() || name == LOCAL_SOURCE || name.contains('.') {
				return Err(LcopyError::invalid(
					path,
					format!("invalid source name '{name}'"),
				));
			}
			Ok(SourceDecl {
				name: name.to_string(),
				path: resolve_path(dir, source_path)?,
			})
		})
		.collect()
}

fn parse_options(path: &Path, value: &Value) -> Result<Options> {
	value
		.clone()
		.try_into::<Options>()
		.map_err(|source| LcopyError::ConfigParseError {
			path: path.to_path_buf(),
			source,
		})
}

/// Parse an `__include__` reference.
pub fn parse_include(reference: &str) -> Option<Include> {
	if reference == LOCAL_SOURCE {
		return Some(Include {
			source: LOCAL_SOURCE.to_string(),
			label: None,
		});
	}
	let captures = INCLUDE_REF.captures(reference)?;
	Some(Include {
		source: captures["source"].to_string(),
		label: captures.name("label").map(|m| m.as_str().to_string()),
	})
}

/// Split a child key into (name, cd, fan_out), handling the `(x)` and `(<x>)` forms.
fn child_key(key: &str) -> Option<(String, Option<PathBuf>, bool)> {
	let Some(inner) = key.strip_prefix('(').and_then(|k| k.strip_suffix(')')) else {
		return Some((key.to_string(), None, false));
	};
	if inner.is_empty() {
		return None;
	}
	if inner.len() > 2 && inner.starts_with('<') && inner.ends_with('>') {
		return Some((inner.to_string(), None, true));
	}
	Some((inner.to_string(), Some(PathBuf::from(inner)), false))
}

struct NodeParser<'a> {
	path: &'a Path,
	snippets: Option<&'a Table>,
}

impl NodeParser<'_> {
	fn invalid(&self, message: impl Into<String>) -> LcopyError {
		LcopyError::invalid(self.path, message)
	}

	fn parse_body(&self, node: &mut ConfigNode, table: &Table, stack: &mut Vec<String>) -> Result<()> {
		let mut snippet_names = Vec::new();

		for (key, value) in table {
			match key.as_str() {
				KEY_CD => {
					let cd = value
						.as_str()
						.ok_or_else(|| self.invalid(format!("'{KEY_CD}' must be a string")))?;
					if node.cd.is_some() {
						return Err(self.invalid(format!(
							"node '{}' sets '{KEY_CD}' twice",
							node.name
						)));
					}
					node.cd = Some(PathBuf::from(cd));
				}
				KEY_LABELS => node.labels.extend(self.string_list(key, value)?),
				KEY_INCLUDE => {
					for reference in self.string_list(key, value)? {
						let include = parse_include(&reference).ok_or_else(|| {
							self.invalid(format!(
								"invalid include reference '{reference}' (expected 'source' or 'source.label')"
							))
						})?;
						node.includes.push(include);
					}
				}
				KEY_SNIPPETS => snippet_names.extend(self.string_list(key, value)?),
				reserved if reserved.starts_with("__") && reserved.ends_with("__") => {
					return Err(self.invalid(format!("unknown reserved key '{reserved}'")));
				}
				_ => match value {
					Value::Boolean(include) => {
						validate_pattern(key)?;
						node.entries.push(NodeEntry::Rule(Rule {
							pattern: key.clone(),
							include: *include,
						}));
					}
					Value::Table(child_table) => {
						let child = self.parse_child(key, child_table, stack)?;
						node.entries.push(NodeEntry::Child(child));
					}
					other => {
						return Err(self.invalid(format!(
							"value of '{key}' must be a boolean or a table, found {}",
							other.type_str()
						)));
					}
				},
			}
		}

		for name in snippet_names {
			self.apply_snippet(node, &name, stack)?;
		}

		Ok(())
	}

	fn parse_child(&self, key: &str, table: &Table, stack: &mut Vec<String>) -> Result<ConfigNode> {
		let (name, cd, fan_out) =
			child_key(key).ok_or_else(|| self.invalid(format!("invalid node key '{key}'")))?;

		let mut child = ConfigNode {
			name,
			cd,
			fan_out,
			..Default::default()
		};
		self.parse_body(&mut child, table, stack)?;
		Ok(child)
	}

	fn apply_snippet(&self, node: &mut ConfigNode, name: &str, stack: &mut Vec<String>) -> Result<()> {
		if stack.iter().any(|active| active == name) {
			return Err(self.invalid(format!("snippet '{name}' includes itself")));
		}
		let body = self
			.snippets
			.and_then(|snippets| snippets.get(name))
			.ok_or_else(|| self.invalid(format!("unknown snippet '{name}'")))?
			.as_table()
			.ok_or_else(|| self.invalid(format!("snippet '{name}' must be a table")))?;

		stack.push(name.to_string());
		let result = self.parse_body(node, body, stack);
		stack.pop();
		result
	}

	fn string_list(&self, key: &str, value: &Value) -> Result<Vec<String>> {
		match value {
			Value::String(single) => Ok(vec![single.clone()]),
			Value::Array(items) => items
				.iter()
				.map(|item| {
					item.as_str().map(str::to_string).ok_or_else(|| {
						self.invalid(format!("'{key}' must contain only strings"))
					})
				})
				.collect(),
			_ => Err(self.invalid(format!("'{key}' must be a string or an array of strings"))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::types::ConflictPolicy;

	fn parse(content: &str) -> Result<Config> {
		parse_config_str(content, Path::new("/project/.lcopy.toml"))
	}

	#[test]
	fn test_parse_minimal_config() {
		let config = parse("[files]\n").unwrap();

		assert_eq!(config.dir, PathBuf::from("/project"));
		assert!(config.sources.is_empty());
		assert!(config.options.is_none());
		assert!(config.files.entries.is_empty());
	}

	#[test]
	fn test_parse_options_and_defaults() {
		let config = parse(
			r#"
[options]
destination = "~/out"
conflict = "overwrite"
purge = true
extra_ignore = ["*.orig"]

[files]
"#,
		)
		.unwrap();

		let options = config.entry_options().unwrap();
		assert_eq!(options.destination.as_deref(), Some("~/out"));
		assert_eq!(options.conflict, ConflictPolicy::Overwrite);
		assert!(options.purge);
		assert!(!options.dry_run);
		assert!(options.default_ignore);
		assert_eq!(options.extra_ignore, vec!["*.orig".to_string()]);
	}

	#[test]
	fn test_missing_destination_is_rejected() {
		let config = parse("[options]\nconflict = \"skip\"\n[files]\n").unwrap();
		assert!(matches!(
			config.entry_options(),
			Err(LcopyError::InvalidConfig { .. })
		));
	}

	#[test]
	fn test_unknown_option_is_rejected() {
		let result = parse("[options]\ndestination = \"x\"\ncolour = true\n[files]\n");
		assert!(matches!(result, Err(LcopyError::ConfigParseError { .. })));
	}

	#[test]
	fn test_missing_files_is_rejected() {
		let result = parse("[options]\ndestination = \"x\"\n");
		match result.unwrap_err() {
			LcopyError::InvalidConfig { message, .. } => assert!(message.contains("files")),
			other => panic!("Expected InvalidConfig, got {other:?}"),
		}
	}

	#[test]
	fn test_parse_sources_relative_to_config_dir() {
		let config = parse(
			r#"
[sources]
"../shared" = "shared"
"/abs/lib" = "lib"

[files]
"#,
		)
		.unwrap();

		assert_eq!(
			config.sources,
			vec![
				SourceDecl {
					name: "shared".to_string(),
					path: PathBuf::from("/shared"),
				},
				SourceDecl {
					name: "lib".to_string(),
					path: PathBuf::from("/abs/lib"),
				},
			]
		);
	}

	#[test]
	fn test_rules_and_children_keep_declaration_order() {
		let config = parse(
			r#"
[files.docs]
"*.md" = true
"draft.md" = false

[files.docs.api]
"*.html" = true

[files.assets]
"**/*.png" = true
"#,
		)
		.unwrap();

		let children: Vec<_> = config.files.children().map(|c| c.name.as_str()).collect();
		assert_eq!(children, vec!["docs", "assets"]);

		let docs = config.files.children().next().unwrap();
		let rules: Vec<_> = docs.rules().cloned().collect();
		assert_eq!(
			rules,
			vec![
				Rule {
					pattern: "*.md".to_string(),
					include: true,
				},
				Rule {
					pattern: "draft.md".to_string(),
					include: false,
				},
			]
		);
		assert_eq!(docs.children().next().unwrap().name, "api");
	}

	#[test]
	fn test_parenthesized_key_sets_cd() {
		let config = parse("[files.\"(src)\"]\n\"*.rs\" = true\n").unwrap();
		let child = config.files.children().next().unwrap();

		assert_eq!(child.name, "src");
		assert_eq!(child.cd, Some(PathBuf::from("src")));
		assert!(!child.fan_out);
	}

	#[test]
	fn test_angle_key_fans_out() {
		let config = parse("[files.\"(<pkg>)\"]\n\"*.rs\" = true\n").unwrap();
		let child = config.files.children().next().unwrap();

		assert!(child.fan_out);
		assert!(child.cd.is_none());
	}

	#[test]
	fn test_cd_twice_is_rejected() {
		let result = parse("[files.\"(src)\"]\n__cd__ = \"lib\"\n");
		assert!(matches!(result, Err(LcopyError::InvalidConfig { .. })));
	}

	#[test]
	fn test_labels_and_includes() {
		let config = parse(
			r#"
[files.tools]
__labels__ = "dev"
__include__ = ["shared", "shared.docs"]
"#,
		)
		.unwrap();
		let tools = config.files.children().next().unwrap();

		assert_eq!(tools.labels, vec!["dev".to_string()]);
		assert_eq!(
			tools.includes,
			vec![
				Include {
					source: "shared".to_string(),
					label: None,
				},
				Include {
					source: "shared".to_string(),
					label: Some("docs".to_string()),
				},
			]
		);
	}

	#[test]
	fn test_invalid_include_reference() {
		let result = parse("[files]\n__include__ = [\"bad ref\"]\n");
		assert!(matches!(result, Err(LcopyError::InvalidConfig { .. })));
	}

	#[test]
	fn test_unknown_reserved_key() {
		let result = parse("[files]\n__bogus__ = true\n");
		match result.unwrap_err() {
			LcopyError::InvalidConfig { message, .. } => assert!(message.contains("__bogus__")),
			other => panic!("Expected InvalidConfig, got {other:?}"),
		}
	}

	#[test]
	fn test_non_boolean_rule_value() {
		let result = parse("[files]\n\"*.md\" = \"yes\"\n");
		assert!(matches!(result, Err(LcopyError::InvalidConfig { .. })));
	}

	#[test]
	fn test_invalid_glob() {
		let result = parse("[files]\n\"src/[a\" = true\n");
		assert!(matches!(result, Err(LcopyError::InvalidGlob { .. })));
	}

	#[test]
	fn test_snippets_are_appended() {
		let config = parse(
			r#"
[snippets.markdown]
"*.md" = true

[snippets.no_drafts]
"drafts/" = false

[files.docs]
__snippets__ = ["markdown", "no_drafts"]
"*.txt" = true
"#,
		)
		.unwrap();
		let docs = config.files.children().next().unwrap();
		let patterns: Vec<_> = docs.rules().map(|r| r.pattern.as_str()).collect();

		assert_eq!(patterns, vec!["*.txt", "*.md", "drafts/"]);
	}

	#[test]
	fn test_unknown_and_recursive_snippets() {
		let unknown = parse("[files]\n__snippets__ = \"missing\"\n");
		assert!(matches!(unknown, Err(LcopyError::InvalidConfig { .. })));

		let recursive = parse(
			r#"
[snippets.loop]
__snippets__ = "loop"

[files]
__snippets__ = "loop"
"#,
		);
		assert!(matches!(recursive, Err(LcopyError::InvalidConfig { .. })));
	}

	#[test]
	fn test_parse_include_reference() {
		assert_eq!(
			parse_include("lib.dev"),
			Some(Include {
				source: "lib".to_string(),
				label: Some("dev".to_string()),
			})
		);
		assert_eq!(parse_include(".").unwrap().source, ".");
		assert!(parse_include("").is_none());
		assert!(parse_include(".dev").is_none());
	}

	#[test]
	fn test_parse_config_file_not_found() {
		let result = parse_config_file(Path::new("/nonexistent/.lcopy.toml"));
		assert!(matches!(result, Err(LcopyError::ConfigNotFound { .. })));
	}
}
