use std::sync::Arc;

use codegate::{Disclosure, MISSING_CODE, ObjectRecord, RowSource, TokioScheduler, parse_ranges, resolve};
use serde_json::json;
use tracing::info;

use crate::cli::{Cli, Commands, SourceArgs};
use crate::config::{BotConfig, ConfigOverrides};
use crate::error::{CliError, Result};
use crate::serve;
use crate::source::{FileSource, HttpSource};

const MASK: &str = "****";

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config_path = cli.config;
	match cli.command {
		Commands::Serve { source, hide_after } => {
			let config = load_config(config_path.as_deref(), &source, hide_after)?;
			serve_stdio(config, &source).await
		}
		Commands::Parse { expression } => {
			let ids: Vec<_> = parse_ranges(expression.as_str()).into_iter().collect();
			println!("{}", serde_json::to_string(&ids)?);
			Ok(())
		}
		Commands::Resolve { source, user_key } => {
			let config = load_config(config_path.as_deref(), &source, None)?;
			resolve_user(config, &source, &user_key).await
		}
	}
}

fn load_config(path: Option<&std::path::Path>, source: &SourceArgs, hide_after_secs: Option<u64>) -> Result<BotConfig> {
	BotConfig::load(path)?.with_overrides(ConfigOverrides {
		sheet: source.sheet.clone(),
		worksheet: source.worksheet.clone(),
		hide_after_secs,
	})
}

fn build_source(args: &SourceArgs) -> Result<Arc<dyn RowSource>> {
	match (&args.rows_file, &args.source_url) {
		(Some(path), _) => Ok(Arc::new(FileSource::new(path))),
		(None, Some(url)) => Ok(Arc::new(HttpSource::new(url, args.source_token.clone())?)),
		(None, None) => Err(CliError::Config("either --rows-file or --source-url is required".into())),
	}
}

async fn serve_stdio(config: BotConfig, args: &SourceArgs) -> Result<()> {
	let source = build_source(args)?;
	let (scheduler, due_rx) = TokioScheduler::new(config.hide_after());
	let service = Arc::new(Disclosure::new(source, Arc::new(scheduler), config.settings()));
	info!(
		target = "codegate.serve",
		sheet = %config.sheet_name,
		worksheet = %config.worksheet_name,
		hide_after_secs = config.hide_after_secs,
		"serving on stdin/stdout"
	);
	serve::run(service, due_rx, tokio::io::stdin(), tokio::io::stdout()).await
}

async fn resolve_user(config: BotConfig, args: &SourceArgs, user_key: &str) -> Result<()> {
	let source = build_source(args)?;
	let rows = source.fetch(&config.table()).await?;
	let resolution = resolve(user_key, &rows, &config.columns);
	let objects: Vec<_> = resolution.objects.iter().map(masked).collect();
	let report = json!({
		"authorized": resolution.authorized,
		"emptyReason": resolution.empty_reason(),
		"objects": objects,
		"missing": resolution.missing,
	});
	println!("{}", serde_json::to_string_pretty(&report)?);
	Ok(())
}

fn masked(object: &ObjectRecord) -> ObjectRecord {
	let code = if object.code == MISSING_CODE { MISSING_CODE } else { MASK };
	ObjectRecord {
		code: code.to_string(),
		..object.clone()
	}
}
