use clap::Parser;
use oddsagent::application::maintenance::MaintenanceUseCase;
use oddsagent::application::status::StatusUseCase;
use oddsagent::cli::commands::{Cli, Commands};
use oddsagent::config::settings::Settings;
use oddsagent::config::strategy::StrategyConfig;
use oddsagent::domain::error::DomainError;
use oddsagent::domain::ports::match_store::MatchStore;
use oddsagent::domain::values::lifecycle::MatchStatus;
use oddsagent::infrastructure::sqlite::match_store::SqliteMatchStore;
use oddsagent::OddsAgent;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,oddsagent=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run_command(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(cmd: Commands) -> Result<(), DomainError> {
    match cmd {
        Commands::Run => {
            let settings = Settings::from_env()?;
            let agent = OddsAgent::new(&settings)?;
            let summary = agent.run_cycle().await?;
            print_json(&summary)?;
        }
        Commands::Status { status, limit } => {
            let status: Option<MatchStatus> = status
                .map(|s| s.parse().map_err(DomainError::InvalidInput))
                .transpose()?;
            let report = StatusUseCase::new(open_store()?).report(status, limit)?;
            print_json(&report)?;
        }
        Commands::History { match_id } => {
            let history = StatusUseCase::new(open_store()?).history(&match_id)?;
            print_json(&history)?;
        }
        Commands::Reset { match_id } => {
            let previous = MaintenanceUseCase::new(open_store()?).reset(&match_id)?;
            print_json(&serde_json::json!({
                "match_id": match_id,
                "previous_status": previous,
                "status": MatchStatus::New,
            }))?;
        }
        Commands::Runs { limit } => {
            let runs = StatusUseCase::new(open_store()?).recent_runs(limit)?;
            print_json(&runs)?;
        }
        Commands::CheckConfig { path } => {
            let (path, explicit) = match path {
                Some(p) => (PathBuf::from(p), true),
                None => Settings::strategy_path_from_env(),
            };
            let strategy = StrategyConfig::load_or_default(&path, explicit)?;
            print_json(&strategy)?;
        }
    }
    Ok(())
}

fn open_store() -> Result<Arc<dyn MatchStore>, DomainError> {
    let store = SqliteMatchStore::open(&Settings::db_path_from_env())?;
    Ok(Arc::new(store))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DomainError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| DomainError::Parse(format!("failed to encode output: {e}")))?;
    println!("{out}");
    Ok(())
}
