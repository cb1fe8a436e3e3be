//! Top-level CLI options, composed from each subsystem's own `Options`
//! struct via `#[structopt(flatten)]`.

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "csdp-fsm-core")]
pub struct Options {
    #[structopt(flatten)]
    pub db: crate::db::Options,

    #[structopt(flatten)]
    pub metrics: crate::metrics::Options,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Validate, append, and apply a single event envelope read from a file.
    Ingest {
        /// Path to a JSON envelope document.
        path: std::path::PathBuf,
        /// Role the event is submitted as.
        #[structopt(long, default_value = "SYSTEM")]
        role: String,
        /// Actor id, required for ENGINEER-role submissions.
        #[structopt(long)]
        actor_id: Option<String>,
    },
    /// Rebuild kpi_daily for a date range.
    RebuildKpi {
        /// Inclusive start date, YYYY-MM-DD.
        from: chrono::NaiveDate,
        /// Inclusive end date, YYYY-MM-DD.
        to: chrono::NaiveDate,
    },
}
