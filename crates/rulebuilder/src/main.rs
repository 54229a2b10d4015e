//! Rule builder command line tool.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rulebuilder::Config;
use rulebuilder::registry::{BuildingBlocks, RuleBuilderRegistry};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rulebuilder")]
#[command(about = "Inspect rule builder building blocks and fragment templates")]
struct Args {
	/// YAML or JSON config file
	#[arg(short, long, value_name = "FILE", default_value = "rulebuilder.yaml")]
	config: PathBuf,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List condition building blocks
	Conditions {
		#[arg(long)]
		json: bool,
	},
	/// List action building blocks
	Actions {
		#[arg(long)]
		json: bool,
	},
	/// Render a fragment template
	Render {
		name: String,
		/// Template context as a JSON object
		#[arg(long, default_value = "{}")]
		context: String,
	},
	/// Build the catalog and fragments once and report broken templates
	Check,
	/// Keep the registry up to date with the fragment file until Ctrl-C
	Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	let config = Config::load(&args.config)
		.with_context(|| format!("failed to load config {}", args.config.display()))?;
	rulebuilder::telemetry::init(&config.logging, args.verbose)
		.context("failed to initialize logging")?;

	let catalog = config.catalog().context("failed to build function catalog")?;
	let registry = Arc::new(RuleBuilderRegistry::new(
		Arc::new(catalog),
		config.fragment_service(),
	));
	registry
		.initialize()
		.await
		.context("failed to load rule fragments")?;

	match args.command {
		Command::Conditions { json } => print_blocks(&*registry.conditions()?, json)?,
		Command::Actions { json } => print_blocks(&*registry.actions()?, json)?,
		Command::Render { name, context } => {
			let context: Value =
				serde_json::from_str(&context).context("--context must be valid JSON")?;
			println!("{}", registry.snapshot()?.render(&name, &context)?);
		},
		Command::Check => check(&registry)?,
		Command::Watch => watch(&registry, &config).await?,
	}
	Ok(())
}

fn print_blocks(blocks: &BuildingBlocks, json: bool) -> anyhow::Result<()> {
	if json {
		println!("{}", serde_json::to_string_pretty(blocks)?);
		return Ok(());
	}
	let width = blocks.keys().map(String::len).max().unwrap_or(0);
	for (name, block) in blocks {
		let kind = if block.is_fragment() { "fragment" } else { "function" };
		println!(
			"{name:<width$}  {:<10}  {kind}  {}",
			block.descriptor.return_type.as_str(),
			block.descriptor.display_name()
		);
	}
	Ok(())
}

fn check(registry: &RuleBuilderRegistry) -> anyhow::Result<()> {
	let snapshot = registry.snapshot()?;
	println!(
		"{} functions, {} conditions, {} actions, {} fragment templates",
		registry.catalog().len(),
		snapshot.conditions().len(),
		snapshot.actions().len(),
		snapshot.templates().len()
	);
	let errors = snapshot.fragment_errors();
	if errors.is_empty() {
		return Ok(());
	}
	for error in errors {
		eprintln!("{}: {}", error.name, error.error);
	}
	bail!("{} fragment template(s) failed to compile", errors.len())
}

async fn watch(registry: &Arc<RuleBuilderRegistry>, config: &Config) -> anyhow::Result<()> {
	let Some(path) = config.fragments.path.as_deref() else {
		bail!("no fragment file configured (fragments.path)");
	};
	if !config.fragments.watch {
		warn!(target: "rule_builder", "fragments.watch is disabled, file changes will not be picked up");
	}
	let watch_path = config.fragments.watch.then_some(path);
	let (publisher, handles) = registry
		.start_background_tasks(watch_path)
		.context("failed to start background tasks")?;

	info!(target: "rule_builder", "Serving rule builder registry, press Ctrl-C to stop");
	tokio::signal::ctrl_c()
		.await
		.context("failed to listen for Ctrl-C")?;

	drop(publisher);
	for handle in handles {
		handle.abort();
	}
	info!(
		target: "rule_builder",
		"Stopped at generation {}",
		registry.snapshot()?.generation()
	);
	Ok(())
}
