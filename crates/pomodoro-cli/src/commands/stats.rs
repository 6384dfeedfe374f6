use chrono::Local;
use clap::Subcommand;
use pomodoro_core::stats::local_day_start;
use pomodoro_core::{Database, RecordStore};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Work sessions and minutes completed since local midnight
    Today,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::Today => {
            let summary = db.work_summary_since(local_day_start(Local::now()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
