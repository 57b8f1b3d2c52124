use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use dropfs_sdk::{auth::Client, consts::SHUTDOWN_TIMEOUT, crawler::Crawler};
use log::{LevelFilter, error, info, warn};

#[cfg(unix)]
use dropfs_sdk::{cache::FileCache, consts::CACHE_DIR, fs::DropboxFs};

#[cfg(unix)]
mod mount;

#[derive(Debug, Parser)]
#[clap(name = "dropfs", version)]
struct CliArgs {
	/// `init` starts a fresh index, `load` resumes from the saved snapshot
	#[arg(value_enum, default_value = "load")]
	action: Action,

	/// Dropbox OAuth token (required for `init`)
	#[arg(short, long)]
	token: Option<String>,

	/// Remote base path: '' for the Dropbox root, otherwise must start with '/'
	#[arg(short, long, default_value = "")]
	path: String,

	/// Pre-seeded local Dropbox folder used to short-circuit getattr/open
	#[arg(short, long)]
	local_folder: Option<PathBuf>,

	/// Mount the filesystem here once the initial crawl has completed
	#[cfg(unix)]
	#[arg(short, long)]
	mountpoint: Option<PathBuf>,

	/// Debug-level logging
	#[arg(short, long)]
	verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
	Init,
	Load,
}

fn init_logging(verbose: bool) {
	let level = if verbose {
		LevelFilter::Debug
	} else {
		LevelFilter::Info
	};
	env_logger::Builder::from_default_env()
		.filter_level(LevelFilter::Warn)
		.filter_module("dropfs_sdk", level)
		.filter_module("dropfs", level)
		.init();
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = CliArgs::parse();
	init_logging(args.verbose);
	match run(args).await {
		Ok(code) => code,
		Err(e) => {
			error!("{e:#}");
			ExitCode::FAILURE
		}
	}
}

async fn run(args: CliArgs) -> Result<ExitCode> {
	let snapshot_dir = std::env::current_dir().context("resolving working directory")?;

	let crawler = match args.action {
		Action::Init => {
			let Some(token) = args.token else {
				bail!("initialization requires a dropbox token (-t)");
			};
			if !args.path.is_empty() && !args.path.starts_with('/') {
				bail!("remote base path must be '' or start with '/'");
			}
			let local_folder = match args.local_folder {
				Some(local) => {
					if !local.exists() {
						bail!("local dropbox folder {} not found", local.display());
					}
					Some(local)
				}
				None => {
					warn!("no local dropbox folder specified");
					None
				}
			};
			let client = Client::connect(&token)?;
			let account = client.current_account().await?;
			info!("authenticated as {}", account.email);
			Crawler::init(client, token, args.path, local_folder, snapshot_dir).await?
		}
		Action::Load => match Crawler::load(snapshot_dir, Client::connect) {
			Ok(crawler) => crawler,
			Err(e) => {
				error!("loading data failed: {e}");
				return Ok(ExitCode::FAILURE);
			}
		},
	};
	let crawler = Arc::new(crawler);

	let crawler_task = tokio::spawn({
		let crawler = crawler.clone();
		async move { crawler.crawl().await }
	});

	#[cfg(unix)]
	let _mount_task = args.mountpoint.map(|mountpoint| {
		let cache = Arc::new(FileCache::new(
			PathBuf::from(CACHE_DIR),
			crawler.client().clone(),
		));
		let fs = Arc::new(DropboxFs::new(crawler.clone(), cache));
		let crawler = crawler.clone();
		tokio::spawn(async move {
			crawler.initial_crawl_done().await;
			info!("mounting filesystem at {}", mountpoint.display());
			match mount::mount(fs, &mountpoint) {
				// the session unmounts on drop, so hold it until shutdown
				Ok(_session) => crawler.finished().await,
				Err(e) => error!("mounting failed: {e:#}"),
			}
		})
	});

	tokio::select! {
		result = crawler_task => {
			// the crawl task only ends on its own when something fatal happened;
			// the error was already logged there
			match result {
				Ok(Ok(())) => Ok(ExitCode::SUCCESS),
				Ok(Err(_)) => Ok(ExitCode::FAILURE),
				Err(e) => {
					error!("crawler task panicked: {e}");
					Ok(ExitCode::FAILURE)
				}
			}
		}
		_ = tokio::signal::ctrl_c() => {
			info!("waiting for crawler task to finish (this might take around 30s)");
			crawler.request_stop();
			let finished = tokio::time::timeout(SHUTDOWN_TIMEOUT, crawler.finished());
			tokio::select! {
				result = finished => match result {
					Ok(()) => Ok(ExitCode::SUCCESS),
					Err(_) => {
						error!("crawler task timed out! data may be lost");
						Ok(ExitCode::FAILURE)
					}
				},
				_ = tokio::signal::ctrl_c() => {
					warn!("exiting anyway.. (data may be lost!)");
					Ok(ExitCode::FAILURE)
				}
			}
		}
	}
}
