use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "codegate")]
#[command(about = "Time-limited disclosure of object access codes for chat bots")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Configuration file (defaults to <config dir>/codegate/config.json when present)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Process inbound events from stdin and write render instructions to stdout, one JSON object per line
	Serve {
		#[command(flatten)]
		source: SourceArgs,

		/// Seconds a revealed code stays visible
		#[arg(long, value_name = "SECS")]
		hide_after: Option<u64>,
	},

	/// Parse a range expression and print the resulting ids
	Parse { expression: String },

	/// Show the objects a user is authorized for, with codes masked
	Resolve {
		#[command(flatten)]
		source: SourceArgs,

		/// User key to look up
		#[arg(long = "user", value_name = "KEY")]
		user_key: String,
	},
}

/// Where rows come from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
	/// JSON file holding the table rows
	#[arg(long, value_name = "FILE", required_unless_present = "source_url", conflicts_with = "source_url")]
	pub rows_file: Option<PathBuf>,

	/// Base URL of an HTTP endpoint serving `<sheet>/<worksheet>` as JSON rows
	#[arg(long, value_name = "URL", env = "CODEGATE_SOURCE_URL")]
	pub source_url: Option<String>,

	/// Bearer token sent to the HTTP source
	#[arg(long, value_name = "TOKEN", env = "CODEGATE_SOURCE_TOKEN", hide_env_values = true)]
	pub source_token: Option<String>,

	/// Spreadsheet name
	#[arg(long, value_name = "NAME")]
	pub sheet: Option<String>,

	/// Worksheet name
	#[arg(long, value_name = "NAME")]
	pub worksheet: Option<String>,
}
