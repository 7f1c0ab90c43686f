//! Configuration module for the courier fulfillment system.
//!
//! Loads configuration from TOML files, resolves `${VAR}` references from the
//! environment and validates the result before anything is built from it.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files

mod loader;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, not the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of the delivery partner running this instance.
	pub partner: PartnerConfig,
	/// Storage backend for order records and fulfillment sessions.
	pub storage: StorageConfig,
	/// Fulfillment flow settings.
	#[serde(default)]
	pub fulfillment: FulfillmentConfig,
	/// Earnings settlement backend and timing.
	pub settlement: SettlementConfig,
	/// Where order records come from.
	#[serde(default)]
	pub orders: OrdersConfig,
	/// Withdrawal limits and bank accounts.
	#[serde(default)]
	pub payout: PayoutConfig,
}

/// Delivery partner identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartnerConfig {
	/// Unique partner identifier.
	pub id: String,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Fulfillment flow settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FulfillmentConfig {
	/// Number of digits the UI expects in a handoff OTP.
	#[serde(default = "default_otp_length")]
	pub otp_length: usize,
}

impl Default for FulfillmentConfig {
	fn default() -> Self {
		Self {
			otp_length: default_otp_length(),
		}
	}
}

fn default_otp_length() -> usize {
	6
}

/// Configuration for earnings settlement.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettlementConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of settlement implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Delay before earnings are finalized after delivery, in milliseconds.
	#[serde(default = "default_finalizing_delay_ms")]
	pub finalizing_delay_ms: u64,
}

fn default_finalizing_delay_ms() -> u64 {
	1500
}

/// Source of order records.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// JSON file of order records loaded at startup.
	/// Relative paths are resolved against the main configuration file.
	/// When unset, the built-in demo orders are used.
	pub seed_file: Option<String>,
}

/// Withdrawal settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayoutConfig {
	/// Smallest amount a single withdrawal may request.
	#[serde(default = "default_min_withdrawal")]
	pub min_withdrawal: Decimal,
	/// Balance carried over from before this instance started.
	#[serde(default)]
	pub opening_balance: Decimal,
	/// Time a withdrawal spends processing before it is submitted, in milliseconds.
	#[serde(default = "default_processing_delay_ms")]
	pub processing_delay_ms: u64,
	/// Bank accounts withdrawals may be sent to.
	#[serde(default)]
	pub accounts: Vec<BankAccount>,
}

impl Default for PayoutConfig {
	fn default() -> Self {
		Self {
			min_withdrawal: default_min_withdrawal(),
			opening_balance: Decimal::ZERO,
			processing_delay_ms: default_processing_delay_ms(),
			accounts: Vec::new(),
		}
	}
}

fn default_min_withdrawal() -> Decimal {
	Decimal::from(100)
}

fn default_processing_delay_ms() -> u64 {
	500
}

/// A bank account registered for withdrawals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BankAccount {
	pub id: String,
	pub bank_name: String,
	/// Masked account number, e.g. "**** 1234".
	pub account_number: String,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME` and supports defaults
/// with `${VAR_NAME:-default_value}`. Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..whole.start()]);
		result.push_str(&value);
		last = whole.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// A relative `orders.seed_file` is rewritten to be relative to the
	/// directory of `path`.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;

		let mut loader = loader::ConfigLoader::new(base_dir);
		let mut config = loader.load_config(file_name).await?;

		if let Some(seed) = config.orders.seed_file.as_mut() {
			let seed_path = Path::new(seed.as_str());
			if seed_path.is_relative() {
				*seed = base_dir.join(seed_path).to_string_lossy().into_owned();
			}
		}

		Ok(config)
	}

	/// Validates the configuration.
	///
	/// - Partner id is not empty
	/// - Storage and settlement primaries name a configured implementation
	/// - OTP length is between 4 and 8 digits
	/// - Finalizing and processing delays are at most one minute
	/// - Minimum withdrawal is positive and the opening balance is not negative
	/// - Bank account ids are unique
	fn validate(&self) -> Result<(), ConfigError> {
		if self.partner.id.trim().is_empty() {
			return Err(ConfigError::Validation("Partner ID cannot be empty".into()));
		}

		validate_primary("storage", &self.storage.primary, &self.storage.implementations)?;
		validate_primary(
			"settlement",
			&self.settlement.primary,
			&self.settlement.implementations,
		)?;

		if !(4..=8).contains(&self.fulfillment.otp_length) {
			return Err(ConfigError::Validation(format!(
				"fulfillment.otp_length must be between 4 and 8, got {}",
				self.fulfillment.otp_length
			)));
		}

		if self.settlement.finalizing_delay_ms > 60_000 {
			return Err(ConfigError::Validation(
				"settlement.finalizing_delay_ms cannot exceed 60000 (1 minute)".into(),
			));
		}

		if self.payout.processing_delay_ms > 60_000 {
			return Err(ConfigError::Validation(
				"payout.processing_delay_ms cannot exceed 60000 (1 minute)".into(),
			));
		}
		if self.payout.min_withdrawal <= Decimal::ZERO {
			return Err(ConfigError::Validation(
				"payout.min_withdrawal must be greater than zero".into(),
			));
		}
		if self.payout.opening_balance < Decimal::ZERO {
			return Err(ConfigError::Validation(
				"payout.opening_balance cannot be negative".into(),
			));
		}
		let mut seen = std::collections::HashSet::new();
		for account in &self.payout.accounts {
			if !seen.insert(account.id.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Duplicate bank account id '{}'",
					account.id
				)));
			}
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved first and the result is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[partner]
id = "partner-042"

[storage]
primary = "memory"
[storage.implementations.memory]

[settlement]
primary = "breakdown"
[settlement.implementations.breakdown]
currency = "INR"
"#;

	#[test]
	fn test_minimal_config_uses_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.partner.id, "partner-042");
		assert_eq!(config.partner.name, None);
		assert_eq!(config.fulfillment.otp_length, 6);
		assert_eq!(config.settlement.finalizing_delay_ms, 1500);
		assert!(config.orders.seed_file.is_none());
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("COURIER_TEST_HOST", "localhost");
		std::env::set_var("COURIER_TEST_PORT", "5432");

		let input = "host = \"${COURIER_TEST_HOST}:${COURIER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("COURIER_TEST_HOST");
		std::env::remove_var("COURIER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${COURIER_MISSING_VAR:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${COURIER_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("COURIER_MISSING_VAR"));
	}

	#[test]
	fn test_partner_id_from_env() {
		std::env::set_var("COURIER_TEST_PARTNER", "partner-from-env");
		let config: Config = MINIMAL
			.replace("partner-042", "${COURIER_TEST_PARTNER}")
			.parse()
			.unwrap();
		assert_eq!(config.partner.id, "partner-from-env");
		std::env::remove_var("COURIER_TEST_PARTNER");
	}

	#[test]
	fn test_unknown_storage_primary_rejected() {
		let input = MINIMAL.replace("primary = \"memory\"", "primary = \"redis\"");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'redis'"));
	}

	#[test]
	fn test_unknown_settlement_primary_rejected() {
		let input = MINIMAL.replace("primary = \"breakdown\"", "primary = \"flat\"");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary settlement 'flat'"));
	}

	#[test]
	fn test_empty_partner_id_rejected() {
		let input = MINIMAL.replace("partner-042", " ");
		assert!(input.parse::<Config>().is_err());
	}

	#[test]
	fn test_otp_length_bounds() {
		let input = format!("{}\n[fulfillment]\notp_length = 12\n", MINIMAL);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("otp_length"));

		let input = format!("{}\n[fulfillment]\notp_length = 4\n", MINIMAL);
		let config: Config = input.parse().unwrap();
		assert_eq!(config.fulfillment.otp_length, 4);
	}

	#[test]
	fn test_finalizing_delay_limit() {
		let input = MINIMAL.replace(
			"primary = \"breakdown\"",
			"primary = \"breakdown\"\nfinalizing_delay_ms = 120000",
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("finalizing_delay_ms"));
	}

	#[test]
	fn test_payout_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.payout.min_withdrawal, Decimal::from(100));
		assert_eq!(config.payout.opening_balance, Decimal::ZERO);
		assert_eq!(config.payout.processing_delay_ms, 500);
		assert!(config.payout.accounts.is_empty());
	}

	#[test]
	fn test_payout_section() {
		let input = format!(
			r#"{}
[payout]
min_withdrawal = 50
opening_balance = "2458.50"

[[payout.accounts]]
id = "acc1"
bank_name = "State Bank of India"
account_number = "**** 1234"
"#,
			MINIMAL
		);
		let config: Config = input.parse().unwrap();
		assert_eq!(config.payout.min_withdrawal, Decimal::from(50));
		assert_eq!(config.payout.opening_balance, Decimal::new(245850, 2));
		assert_eq!(config.payout.accounts.len(), 1);
		assert_eq!(config.payout.accounts[0].bank_name, "State Bank of India");
	}

	#[test]
	fn test_payout_validation() {
		let zero_minimum = format!("{}\n[payout]\nmin_withdrawal = 0\n", MINIMAL);
		let err = zero_minimum.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("min_withdrawal"));

		let negative_balance = format!("{}\n[payout]\nopening_balance = -1\n", MINIMAL);
		let err = negative_balance.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("opening_balance"));

		let duplicate = format!(
			r#"{}
[[payout.accounts]]
id = "acc1"
bank_name = "State Bank of India"
account_number = "**** 1234"

[[payout.accounts]]
id = "acc1"
bank_name = "HDFC Bank"
account_number = "**** 5678"
"#,
			MINIMAL
		);
		let err = duplicate.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Duplicate bank account id 'acc1'"));
	}

	#[test]
	fn test_parse_error_is_reported_without_input_dump() {
		let err = "[partner\nid = 1".parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}
}
