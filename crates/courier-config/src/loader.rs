//! Multi-file configuration loading.
//!
//! A main file may pull in other files with `include`. Top-level sections are
//! merged, and a section defined in two files is rejected rather than merged
//! field by field.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a configuration file together with its includes.
pub struct ConfigLoader {
	/// Directory relative includes are resolved against
	base_path: PathBuf,
	/// Canonical paths already read, for cycle detection
	loaded_files: HashSet<PathBuf>,
	/// Section name -> file that defined it
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads, merges and validates the configuration rooted at `config_path`.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let content = self.read_file(&config_path).await?;
		let mut root: toml::Value = toml::from_str(&content)?;

		let includes = Self::take_includes(&mut root)?;
		if includes.is_empty() {
			return content.parse();
		}

		self.record_sections(&root, &config_path)?;
		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let include_content = self.read_file(&include_path).await?;
			let included: toml::Value = toml::from_str(&include_content)?;
			self.record_sections(&included, &include_path)?;

			if let (Some(target), toml::Value::Table(source)) = (root.as_table_mut(), included) {
				target.extend(source);
			}
		}

		let merged = toml::to_string(&root).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		merged.parse()
	}

	/// Reads a file once, resolving environment variables.
	async fn read_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	/// Removes the `include` directive and returns the listed paths.
	fn take_includes(root: &mut toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		let Some(table) = root.as_table_mut() else {
			return Ok(Vec::new());
		};

		match table.remove("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.into_iter()
				.map(|item| match item {
					toml::Value::String(path) => Ok(PathBuf::from(path)),
					_ => Err(ConfigError::Validation(
						"Include array must contain only strings".into(),
					)),
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	/// Remembers which file defined each top-level section.
	fn record_sections(&mut self, value: &toml::Value, source: &Path) -> Result<(), ConfigError> {
		let Some(table) = value.as_table() else {
			return Ok(());
		};

		for key in table.keys() {
			if key == "include" {
				return Err(ConfigError::Validation(format!(
					"Nested include in {} is not supported",
					source.display()
				)));
			}
			if let Some(existing) = self.section_sources.get(key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources.insert(key.clone(), source.to_path_buf());
		}
		Ok(())
	}

	/// Resolves a path against the base path and checks it exists.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const PARTNER: &str = r#"
[partner]
id = "partner-042"
name = "Ravi K."
"#;

	const BACKENDS: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]

[settlement]
primary = "breakdown"
finalizing_delay_ms = 250
[settlement.implementations.breakdown]
currency = "INR"
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, format!("{}{}", PARTNER, BACKENDS)).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.partner.id, "partner-042");
		assert_eq!(config.settlement.finalizing_delay_ms, 250);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = [\"backends.toml\"]\n{}", PARTNER);
		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(temp_dir.path().join("backends.toml"), BACKENDS).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.partner.name.as_deref(), Some("Ravi K."));
		assert_eq!(config.storage.primary, "memory");
	}

	#[tokio::test]
	async fn test_single_string_include() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = \"backends.toml\"\n{}", PARTNER);
		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(temp_dir.path().join("backends.toml"), BACKENDS).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(loader.load_config("main.toml").await.is_ok());
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = [\"duplicate.toml\"]\n{}", PARTNER);
		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(
			temp_dir.path().join("duplicate.toml"),
			"[partner]\nid = \"someone-else\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Duplicate section 'partner'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let config = format!("include = [\"self.toml\"]\n{}", PARTNER);
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("self.toml").await.unwrap_err();
		assert!(err.to_string().contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include_file() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = [\"nowhere.toml\"]\n{}", PARTNER);
		fs::write(temp_dir.path().join("main.toml"), main).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(matches!(err, ConfigError::Io(_)));
	}

	#[tokio::test]
	async fn test_from_file_resolves_seed_file_relative_to_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		let content = format!(
			"{}{}\n[orders]\nseed_file = \"orders.json\"\n",
			PARTNER, BACKENDS
		);
		fs::write(&config_path, content).unwrap();

		let config = Config::from_file(&config_path).await.unwrap();
		let seed = config.orders.seed_file.unwrap();
		assert_eq!(Path::new(&seed), temp_dir.path().join("orders.json"));
	}
}
