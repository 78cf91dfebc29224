use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use focus_timer_lib::{
    cache::{default_cache_path, SessionCache},
    duration::{format_time, CustomDuration, DurationChoice, Preset},
    init_logging,
    models::{minutes_to_secs, SessionStatus},
    settings::{default_settings_path, SettingsStore},
    store::{HttpSessionStore, MemorySessionStore, SessionStore},
    timer::{Clock, FinishReason, SystemClock},
    TimerConfig, TimerController, TimerEvent, TimerSnapshot, TimerStatus,
};

#[derive(Parser)]
#[command(author, version, about = "Focus timer sessions kept in sync with a session store")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session store base URL, e.g. http://localhost:5000/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep sessions in memory instead of talking to the store
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the reconciled timer
    Status,
    /// Start a session, or resume a paused one
    Start {
        /// half, short or pomodoro
        #[arg(long, conflicts_with_all = ["minutes", "hms"])]
        preset: Option<Preset>,
        #[arg(long, conflicts_with = "hms")]
        minutes: Option<f64>,
        /// Custom duration as H:M:S or M:S
        #[arg(long)]
        hms: Option<CustomDuration>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Stop the active session if a new duration was requested
        #[arg(long)]
        force: bool,
        /// Follow the countdown until it finishes
        #[arg(long)]
        watch: bool,
    },
    Pause,
    /// Resume a paused session and follow it
    Resume,
    Stop,
    Reset,
    /// Follow the running countdown
    Watch,
    History,
    Rename {
        /// Session to rename (defaults to the active one)
        #[arg(long)]
        id: Option<String>,
        name: String,
    },
    Note {
        #[arg(long)]
        id: String,
        note: String,
    },
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let settings_path = cli
        .config
        .clone()
        .or_else(default_settings_path)
        .context("No config directory available; pass --config")?;
    let mut settings = SettingsStore::new(settings_path)?
        .settings()?
        .with_env_overrides();
    if let Some(url) = cli.api_url.clone() {
        settings.api.base_url = url;
    }

    let cache = SessionCache::new(
        default_cache_path().context("No data directory available for the session cache")?,
    );
    let cached = cache.load();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn SessionStore> = if cli.offline {
        let memory = MemorySessionStore::new(clock.clone());
        if let Some(session) = &cached {
            memory.insert(session.clone()).await;
        }
        Arc::new(memory)
    } else {
        Arc::new(HttpSessionStore::new(&settings.api)?)
    };

    let controller = TimerController::new(store, clock, TimerConfig::from(&settings.timer));
    controller.restore(cached).await;
    if let Err(err) = controller.sync().await {
        warn!("Showing cached state; session store unavailable: {err}");
    }

    let outcome = run(&controller, cli.command).await;

    let snapshot = controller.snapshot().await;
    cache.store(snapshot.active_session.as_ref())?;
    controller.shutdown().await;
    outcome
}

async fn run(controller: &TimerController, command: Command) -> Result<()> {
    match command {
        Command::Status => print_snapshot(&controller.snapshot().await),
        Command::Start {
            preset,
            minutes,
            hms,
            name,
            note,
            force,
            watch,
        } => {
            let requested = match (preset, minutes, hms) {
                (Some(preset), _, _) => Some(DurationChoice::Preset(preset).total_seconds()?),
                (_, Some(minutes), _) => Some(minutes_to_secs(minutes)),
                (_, _, Some(custom)) => Some(DurationChoice::Custom(custom).total_seconds()?),
                _ => None,
            };

            let current = controller.snapshot().await;
            match requested {
                Some(seconds) if force => {
                    controller.replace_duration(seconds).await?;
                }
                Some(seconds) => {
                    controller.select_duration(seconds).await.map_err(|err| {
                        anyhow::Error::new(err).context("Pass --force to stop the active session")
                    })?;
                }
                None if current.initial_time == 0 => {
                    controller
                        .select_duration(Preset::Pomodoro.total_seconds())
                        .await?;
                }
                None => {}
            }

            let snapshot = controller.start(name, note).await?;
            print_snapshot(&snapshot);
            if watch {
                follow(controller).await;
            }
        }
        Command::Pause => print_snapshot(&controller.pause().await?),
        Command::Resume => {
            print_snapshot(&controller.resume().await?);
            follow(controller).await;
        }
        Command::Stop => {
            let record = controller.stop().await?;
            println!(
                "Stopped {} after {}",
                record.name.as_deref().unwrap_or(&record.id),
                format_time(record.elapsed_secs())
            );
        }
        Command::Reset => print_snapshot(&controller.reset().await?),
        Command::Watch => {
            print_snapshot(&controller.snapshot().await);
            follow(controller).await;
        }
        Command::History => {
            let entries = controller.history_entries().await;
            if entries.is_empty() {
                println!("No sessions yet");
            }
            for entry in entries {
                let planned = match DurationChoice::classify(entry.planned_secs) {
                    DurationChoice::Preset(preset) => format!("{preset:?}"),
                    DurationChoice::Custom(custom) => custom.to_string(),
                };
                println!(
                    "{}  {:<9} {:>8} of {:<10} {}  {}",
                    entry.started_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                    entry.status.as_str(),
                    format_time(entry.elapsed_secs),
                    planned,
                    entry.name.as_deref().unwrap_or("-"),
                    entry.id,
                );
            }
        }
        Command::Rename { id, name } => {
            let renamed = match id {
                Some(id) => Some(controller.rename_session(&id, &name).await?),
                None => controller.rename(&name).await?,
            };
            match renamed {
                Some(record) => println!("Renamed {} to {name}", record.id),
                None => println!("Next session will be named {name}"),
            }
        }
        Command::Note { id, note } => {
            controller.update_details(&id, None, Some(note)).await?;
            println!("Updated note on {id}");
        }
        Command::Delete { id } => {
            controller.delete(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

/// Follows the countdown until the session leaves the running state or the
/// user interrupts.
async fn follow(controller: &TimerController) {
    if controller.snapshot().await.status != TimerStatus::Running {
        return;
    }

    let mut events = controller.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                if controller.should_confirm_exit().await {
                    eprintln!();
                    let stored = controller
                        .snapshot()
                        .await
                        .active_session
                        .map(|session| session.status);
                    if stored == Some(SessionStatus::Paused) {
                        eprintln!(
                            "The session is still paused on the server; time since resuming is not saved."
                        );
                    } else {
                        eprintln!("The session is still running on the server and keeps counting.");
                    }
                }
                break;
            }
            event = events.recv() => match event {
                Ok(TimerEvent::Tick { time_left }) => {
                    print!("\r{}   ", format_time(time_left));
                    let _ = io::stdout().flush();
                }
                Ok(TimerEvent::Warning { time_left }) => {
                    println!();
                    println!("{time_left} seconds left");
                }
                Ok(TimerEvent::SessionCompleted(session)) => {
                    println!();
                    info!("Session {} completed", session.id);
                    println!("Session complete");
                    break;
                }
                Ok(TimerEvent::MutationFailed { mutation, message }) => {
                    eprintln!();
                    eprintln!("{mutation} failed: {message}");
                    if mutation == "complete" {
                        break;
                    }
                }
                Ok(TimerEvent::StateChanged(snapshot)) => {
                    if !matches!(
                        snapshot.status,
                        TimerStatus::Running | TimerStatus::Finished(FinishReason::Completed)
                    ) {
                        println!();
                        print_snapshot(&snapshot);
                        break;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn print_snapshot(snapshot: &TimerSnapshot) {
    let label = snapshot.name.as_deref().unwrap_or("");
    println!(
        "{:<9} {} / {}  {}",
        snapshot.status.as_str(),
        format_time(snapshot.time_left),
        format_time(snapshot.initial_time),
        label
    );
}
