use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use tg_sweeper::config::{self, Config};
use tg_sweeper::journal;
use tg_sweeper::prompt::TerminalPrompter;
use tg_sweeper::remote::GatewayClient;
use tg_sweeper::sweeper::{RunReport, SweepSettings, Sweeper};
use tg_sweeper::SweepError;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Delete your own old messages from selected Telegram groups"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// List what would be deleted without deleting anything.
    #[arg(long)]
    dry_run: bool,

    /// Do not record runs in the local deletion journal.
    #[arg(long)]
    no_journal: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(args.config.as_path()))
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    match run(&cfg, &args).await {
        Ok(report) => {
            let swept = report.chats.len();
            info!(run_id = ?report.run_id, swept, "run finished");
            Ok(())
        }
        Err(err) => {
            if err.suggests_api_change() {
                error!(%err, "unexpected response from the gateway");
                println!("Probably the API has changed; the gateway or this tool may need an update.");
            }
            Err(err.into())
        }
    }
}

async fn run(cfg: &Config, args: &Args) -> Result<RunReport, SweepError> {
    let settings = SweepSettings::from_config(cfg, args.dry_run);
    let api = Arc::new(GatewayClient::new(
        &cfg.gateway.base_url,
        cfg.gateway.token.clone(),
    )?);
    let mut sweeper = Sweeper::new(api, &settings)?;

    if !args.no_journal {
        cfg.ensure_dirs()
            .map_err(|e| SweepError::Configuration(format!("cannot create data dir: {e}")))?;
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.journal_url());
        let pool = journal::init_pool(&database_url).await?;
        journal::run_migrations(&pool).await?;
        info!(database_url = %database_url, "deletion journal ready");
        sweeper = sweeper.with_journal(pool);
    }

    let mut prompter = TerminalPrompter::new()?;
    let chats = sweeper.select_groups(&mut prompter).await?;
    let policy = sweeper.select_cutoff(&mut prompter, Utc::now())?;
    sweeper.run(&chats, &policy, &mut prompter).await
}
