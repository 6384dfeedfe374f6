//! Foreground timer driven by line commands on stdin.

use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;

use clap::Args;
use pomodoro_core::error::Result as CoreResult;
use pomodoro_core::{
    Config, Database, Event, MemoryStore, PhaseKind, RecordStore, Settings, SettingsStore,
    StorageError, TimerService, TimerSnapshot, TimerStatus, TomlSettingsStore,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

#[derive(Args)]
pub struct RunArgs {
    /// Phase to begin with (work, short-break, long-break)
    #[arg(long)]
    phase: Option<PhaseKind>,
    /// Task id attached to every completed session
    #[arg(long)]
    task: Option<i64>,
    /// Keep sessions in memory and leave stored settings alone
    #[arg(long)]
    ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Start,
    Pause,
    Reset,
    Skip,
    Select(PhaseKind),
    Task(Option<i64>),
    Settings(Settings),
    Status,
    Today,
    Help,
    Quit,
}

const HELP: &str = "commands: start | pause | reset | skip | select <work|short|long> | \
task <id|none> | settings <work> <short> <long> <cycles> | status | today | help | quit";

/// Parse one input line. Blank lines yield `None`.
fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let expect_args = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("{head} takes {n} argument(s), got {}", args.len()))
        }
    };

    let cmd = match head.to_ascii_lowercase().as_str() {
        "start" | "resume" => Command::Start,
        "pause" => Command::Pause,
        "reset" => Command::Reset,
        "skip" => Command::Skip,
        "status" => Command::Status,
        "today" => Command::Today,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "select" => {
            expect_args(1)?;
            Command::Select(args[0].parse()?)
        }
        "task" => {
            expect_args(1)?;
            match args[0] {
                "none" | "-" => Command::Task(None),
                id => Command::Task(Some(
                    id.parse().map_err(|e| format!("invalid task id '{id}': {e}"))?,
                )),
            }
        }
        "settings" => {
            expect_args(4)?;
            let mut values = [0u32; 4];
            for (slot, raw) in values.iter_mut().zip(&args) {
                *slot = raw
                    .parse()
                    .map_err(|e| format!("invalid number '{raw}': {e}"))?;
            }
            let [work, short, long, cycles] = values;
            Command::Settings(Settings {
                work_minutes: work,
                short_break_minutes: short,
                long_break_minutes: long,
                cycles_before_long_break: cycles,
            })
        }
        other => return Err(format!("unknown command: {other} (try 'help')")),
    };
    Ok(Some(cmd))
}

fn status_word(status: TimerStatus) -> &'static str {
    match status {
        TimerStatus::Idle => "idle",
        TimerStatus::Running => "running",
        TimerStatus::Paused => "paused",
    }
}

fn status_line(snap: &TimerSnapshot) -> String {
    let mut line = format!(
        "{} {} [{}] streak {}/{}",
        snap.state.phase.label(),
        snap.display,
        status_word(snap.state.status),
        snap.streak,
        snap.settings.cycles_before_long_break,
    );
    if let Some(task) = snap.linked_task_id {
        line.push_str(&format!(" task #{task}"));
    }
    line
}

struct Screen {
    tty: bool,
}

impl Screen {
    /// Redraws in place on a terminal, one line per update otherwise.
    fn status(&self, snap: &TimerSnapshot) {
        let mut out = std::io::stdout().lock();
        let line = status_line(snap);
        let _ = if self.tty {
            write!(out, "\r\x1b[K{line}")
        } else {
            writeln!(out, "{line}")
        };
        let _ = out.flush();
    }

    fn message(&self, text: &str) {
        if self.tty {
            print!("\r\x1b[K");
        }
        println!("{text}");
    }
}

/// Forward stdin lines from a plain thread; a pending blocking read must not
/// hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_session(args))
}

async fn run_session(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let settings_store = if args.ephemeral {
        None
    } else {
        Some(TomlSettingsStore::open_default()?)
    };
    let settings = settings_store
        .as_ref()
        .map_or(config.timer, |store| store.load());

    let store: Arc<dyn RecordStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(Database::open()?)
    };

    let (err_tx, mut storage_errors) = mpsc::unbounded_channel::<StorageError>();
    let service = TimerService::with_error_sink(settings, store, err_tx)?;
    if let Some(phase) = args.phase {
        service.select_phase(phase)?;
    }
    if args.task.is_some() {
        service.set_linked_task(args.task);
    }

    let screen = Screen {
        tty: std::io::stdout().is_terminal(),
    };
    let mut snapshots = service.subscribe();
    let mut events = service.subscribe_events();
    let mut lines = spawn_stdin_reader();

    screen.message(HELP);
    screen.status(&service.snapshot());

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                screen.status(&snap);
            }
            event = events.recv() => match event {
                Ok(Event::PhaseCompleted { phase, next, .. }) => {
                    screen.message(&format!("{} complete, next: {}", phase.label(), next.label()));
                    if config.auto_start_next {
                        service.start();
                    }
                }
                Ok(other) => debug!(?other, "timer event"),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(err) = storage_errors.recv() => {
                screen.message(&format!("warning: session not saved: {err}"));
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(cmd)) => {
                        let outcome =
                            execute(&service, settings_store.as_ref(), &screen, cmd).await;
                        if let Err(e) = outcome {
                            screen.message(&format!("error: {e}"));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => screen.message(&format!("error: {e}")),
                }
            }
        }
    }

    let persisted = service.shutdown().await;
    screen.message(&format!("stopped, {persisted} session(s) saved"));
    Ok(())
}

async fn execute(
    service: &TimerService,
    settings_store: Option<&TomlSettingsStore>,
    screen: &Screen,
    cmd: Command,
) -> CoreResult<()> {
    match cmd {
        Command::Start => {
            service.start();
        }
        Command::Pause => {
            service.pause();
        }
        Command::Reset => {
            service.reset();
        }
        Command::Skip => {
            service.skip();
        }
        Command::Select(kind) => {
            service.select_phase(kind)?;
        }
        Command::Task(task) => {
            service.set_linked_task(task);
        }
        Command::Settings(settings) => {
            service.apply_settings(settings)?;
            if let Some(store) = settings_store {
                store.save(&settings)?;
            }
        }
        Command::Status => {
            screen.message(&serde_json::to_string(&service.snapshot())?);
        }
        Command::Today => {
            screen.message(&serde_json::to_string(&service.today_summary().await?)?);
        }
        Command::Help => screen.message(HELP),
        Command::Quit => {}
    }
    Ok(())
}
