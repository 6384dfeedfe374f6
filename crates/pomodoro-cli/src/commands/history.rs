use clap::Subcommand;
use pomodoro_core::{Database, PhaseKind, RecordStore};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List recorded sessions, oldest first
    List {
        /// Only sessions of this kind (work, short-break, long-break)
        #[arg(long)]
        kind: Option<PhaseKind>,
        /// Only sessions completed at or after this epoch millisecond
        #[arg(long, default_value_t = 0)]
        since: i64,
        /// Only sessions completed at or before this epoch millisecond
        #[arg(long, default_value_t = i64::MAX)]
        until: i64,
    },
    /// Delete every recorded session
    Clear,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { kind, since, until } => {
            if since > until {
                return Err(format!("--since ({since}) is after --until ({until})").into());
            }
            let records = db.query_range(since, until, kind)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        HistoryAction::Clear => {
            let removed = db.delete_all()?;
            println!("removed {removed} sessions");
        }
    }
    Ok(())
}
