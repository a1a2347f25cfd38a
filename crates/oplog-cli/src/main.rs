// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `oplog` - drive the capture pipeline from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use oplog_capture::{
	CaptureDispatcher, GuardedOperation, HandleStatus, HttpRequestContext, MetadataDeclaration,
	Principal, SinkFactory,
};
use oplog_config::CaptureConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "oplog", about = "Operation audit capture pipeline", version)]
struct Cli {
	/// Config file (defaults to /etc/oplog/capture.toml)
	#[arg(long, global = true, env = "OPLOG_CONFIG")]
	config: Option<PathBuf>,

	/// Emit logs as JSON
	#[arg(long, global = true)]
	json: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Load and validate configuration, then print the resolved settings
	CheckConfig,
	/// Capture a synthetic request end to end
	Capture(CaptureArgs),
	/// Show version information
	Version,
}

#[derive(Args, Debug)]
struct CaptureArgs {
	/// Request path and query, e.g. `/orders?source=web`
	#[arg(long)]
	url: String,

	#[arg(long, default_value = "GET")]
	method: String,

	#[arg(long)]
	client_ip: Option<String>,

	#[arg(long)]
	user_agent: Option<String>,

	#[arg(long)]
	body: Option<String>,

	/// Acting user name
	#[arg(long)]
	user: Option<String>,

	#[arg(long)]
	event: Option<String>,

	#[arg(long)]
	business_type: Option<String>,

	#[arg(long)]
	description: Option<String>,

	/// Capture as an audit record instead of a plain log record
	#[arg(long)]
	audit: bool,

	/// Mark the business operation as failed
	#[arg(long)]
	failed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	if let Command::Version = cli.command {
		println!("oplog {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	let config = load(cli.config.as_ref())?;
	init_tracing(&config, cli.json);

	match cli.command {
		Command::CheckConfig => check_config(&config),
		Command::Capture(args) => capture(&config, args).await,
		Command::Version => Ok(()),
	}
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<CaptureConfig> {
	let config = match path {
		Some(path) => oplog_config::load_config_with_file(path)
			.with_context(|| format!("loading {}", path.display()))?,
		None => oplog_config::load_config().context("loading configuration")?,
	};
	Ok(config)
}

fn init_tracing(config: &CaptureConfig, json: bool) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(json.then(|| {
			tracing_subscriber::fmt::layer()
				.json()
				.with_writer(std::io::stderr)
		}))
		.with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
		.init();
}

fn check_config(config: &CaptureConfig) -> anyhow::Result<()> {
	let factory = SinkFactory::new(config.sink.clone()).context("invalid sink configuration")?;

	println!("enabled:            {}", config.enabled);
	println!(
		"client ip header:   {}",
		config.client_ip_header.as_deref().unwrap_or("-")
	);
	println!("user agent:         {}", config.user_agent_enabled);
	match &config.geoip {
		Some(geoip) => println!(
			"geoip:              {} (timeout {}ms)",
			geoip.database_path, geoip.timeout_ms
		),
		None => println!("geoip:              disabled"),
	}
	println!("sink:               {:?}", factory.config());
	println!("log level:          {}", config.logging.level);

	tracing::info!(backend = %config.sink.backend, "configuration ok");
	Ok(())
}

async fn capture(config: &CaptureConfig, args: CaptureArgs) -> anyhow::Result<()> {
	let principal = args.user.as_ref().map(|user| Principal::new(user.clone(), user.clone()));
	let dispatcher = CaptureDispatcher::from_config(config, Arc::new(move || principal.clone()))
		.context("building capture dispatcher")?;

	let ctx = build_context(config, &args)?;
	let op = build_operation(&args);
	let failed = args.failed;

	let guarded = dispatcher
		.guard_with(
			&op,
			&ctx,
			async move {
				if failed {
					Err("operation failed")
				} else {
					Ok(())
				}
			},
			|result| {
				let input = match result {
					Ok(()) => oplog_capture::CaptureInput::success(),
					Err(e) => oplog_capture::CaptureInput::failure().with_extra("error", *e),
				};
				match &args.description {
					Some(description) => input.with_description(description.clone()),
					None => input,
				}
			},
		)
		.await;

	println!("{}", serde_json::to_string_pretty(&guarded.captures)?);

	if guarded
		.captures
		.iter()
		.any(|c| c.status == HandleStatus::Submitted)
	{
		tracing::debug!(timeout_ms = config.sink.timeout_ms, "waiting for asynchronous delivery");
		tokio::time::sleep(Duration::from_millis(config.sink.timeout_ms)).await;
	}

	if guarded.any_failed() {
		bail!("capture failed for at least one record");
	}
	Ok(())
}

fn build_context(config: &CaptureConfig, args: &CaptureArgs) -> anyhow::Result<HttpRequestContext> {
	let mut builder = http::Request::builder()
		.method(args.method.to_ascii_uppercase().as_str())
		.uri(args.url.as_str());

	if let Some(ua) = &args.user_agent {
		builder = builder.header(http::header::USER_AGENT, ua.as_str());
	}
	if let Some(ip) = &args.client_ip {
		let header = config.client_ip_header.as_deref().unwrap_or("x-forwarded-for");
		builder = builder.header(header, ip.as_str());
	}

	let request = builder
		.body(args.body.clone().unwrap_or_default())
		.context("building request")?;

	Ok(HttpRequestContext::from_request(request).with_client_ip_header(config.client_ip_header.clone()))
}

fn build_operation(args: &CaptureArgs) -> GuardedOperation {
	let mut declaration = MetadataDeclaration::new();
	declaration.event = args.event.clone();
	declaration.business_type = args.business_type.clone();

	let builder = GuardedOperation::builder("oplog-cli::capture");
	if args.audit {
		builder.method_audit(declaration).build()
	} else {
		builder.method_log(declaration).build()
	}
}
