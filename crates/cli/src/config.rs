//! Bot configuration loaded from a JSON file, with CLI overrides on top.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use codegate::{Columns, DisclosureSettings, LayoutOptions, Presentation, TableRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

const CONFIG_DIR: &str = "codegate";
const CONFIG_FILE: &str = "config.json";

/// Persisted bot settings. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
	pub sheet_name: String,
	pub worksheet_name: String,
	/// Seconds a revealed code stays visible.
	pub hide_after_secs: u64,
	/// Labels longer than this get a button row of their own.
	pub max_inline_label: usize,
	pub columns_per_row: usize,
	pub columns: Columns,
}

impl Default for BotConfig {
	fn default() -> Self {
		Self {
			sheet_name: "teleg-bot-passw".to_string(),
			worksheet_name: "page1".to_string(),
			hide_after_secs: 60,
			max_inline_label: 24,
			columns_per_row: 2,
			columns: Columns::default(),
		}
	}
}

/// Values from the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
	pub sheet: Option<String>,
	pub worksheet: Option<String>,
	pub hide_after_secs: Option<u64>,
}

impl BotConfig {
	/// `<config_dir>/codegate/config.json`, when the platform has a config dir.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
	}

	/// Loads `explicit` (which must exist), else the default path if present, else defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		let config = match explicit {
			Some(path) => Self::from_file(path)?,
			None => match Self::default_path().filter(|path| path.is_file()) {
				Some(path) => Self::from_file(&path)?,
				None => {
					debug!(target = "codegate.config", "no config file; using defaults");
					Self::default()
				}
			},
		};
		config.validate()?;
		Ok(config)
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path).map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
		let config: Self = serde_json::from_str(&content).map_err(|e| CliError::Config(format!("invalid {}: {e}", path.display())))?;
		debug!(target = "codegate.config", path = %path.display(), "config loaded");
		Ok(config)
	}

	pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
		if let Some(sheet) = overrides.sheet {
			self.sheet_name = sheet;
		}
		if let Some(worksheet) = overrides.worksheet {
			self.worksheet_name = worksheet;
		}
		if let Some(secs) = overrides.hide_after_secs {
			self.hide_after_secs = secs;
		}
		self.validate()?;
		Ok(self)
	}

	pub fn validate(&self) -> Result<()> {
		if self.hide_after_secs == 0 {
			return Err(CliError::Config("hide_after_secs must be positive".into()));
		}
		if self.columns_per_row == 0 {
			return Err(CliError::Config("columns_per_row must be at least 1".into()));
		}
		if self.sheet_name.trim().is_empty() || self.worksheet_name.trim().is_empty() {
			return Err(CliError::Config("sheet_name and worksheet_name must not be empty".into()));
		}
		Ok(())
	}

	pub fn hide_after(&self) -> Duration {
		Duration::from_secs(self.hide_after_secs)
	}

	pub fn table(&self) -> TableRef {
		TableRef::new(&self.sheet_name, &self.worksheet_name)
	}

	pub fn settings(&self) -> DisclosureSettings {
		DisclosureSettings {
			table: self.table(),
			columns: self.columns.clone(),
			presentation: Presentation {
				layout: LayoutOptions {
					max_inline_label: self.max_inline_label,
					columns: self.columns_per_row,
				},
				hide_after: self.hide_after(),
			},
		}
	}
}
