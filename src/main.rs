use anyhow::Context;
use csdp_fsm_core::clock::SystemClock;
use csdp_fsm_core::config::{Command, Options};
use csdp_fsm_core::db::Database;
use csdp_fsm_core::events::{Actor, Envelope, Role};
use csdp_fsm_core::orchestrator::Orchestrator;
use csdp_fsm_core::schema_registry::SchemaRegistry;
use csdp_fsm_core::{kpi, logging, metrics, shutdown};
use structopt::StructOpt;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let options = Options::from_args();
    let mut database = Database::connect(&options.db).await?;

    let metrics_handle = tokio::spawn(metrics::serve(options.metrics));
    let shutdown_handle = tokio::spawn(shutdown::signal_shutdown());

    match options.command {
        Command::Ingest { path, role, actor_id } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading envelope at {}", path.display()))?;
            let raw_value: serde_json::Value = serde_json::from_str(&raw)?;
            let envelope: Envelope = serde_json::from_value(raw_value.clone())?;
            let role: Role = role.parse().with_context(|| format!("unknown role {role}"))?;
            let actor = Actor { role, actor_id };

            let schema_registry = SchemaRegistry::new();
            let clock = SystemClock;
            let orchestrator = Orchestrator::new(&schema_registry, &clock);
            let decision = orchestrator.ingest(&mut database, &raw_value, &envelope, &actor)?;
            info!(?decision, "ingestion complete");
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::RebuildKpi { from, to } => {
            kpi::rebuild_daily(&database, from, to)?;
            info!(%from, %to, "kpi_daily rebuilt");
        }
    }

    metrics_handle.abort();
    shutdown_handle.abort();
    Ok(())
}
