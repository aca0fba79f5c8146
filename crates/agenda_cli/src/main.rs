use agenda_cli::cli::{Cli, Command, collect_overrides};
use agenda_core::agenda_api;
use agenda_core::clock::format_local;
use agenda_core::config::{Config, Palette, load_config_with_fallback, merge_overrides, palette_for_theme};
use agenda_core::engine::{AgendaItem, Rejected};
use agenda_core::error::AppError;
use agenda_core::model::{Alarm, Task};
use agenda_core::recurrence::NextFire;
use agenda_core::window::TaskWindow;
use clap::Parser;
use clap::error::ErrorKind;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::{OffsetDateTime, UtcOffset};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

#[derive(Tabled)]
struct AgendaRow {
    kind: &'static str,
    id: i64,
    title: String,
    status: String,
    when: String,
}

#[derive(Tabled)]
struct AlarmRow {
    id: i64,
    time: String,
    repeat: String,
    next: String,
}

#[derive(Tabled)]
struct RejectedRow {
    kind: &'static str,
    id: i64,
    field: String,
    reason: String,
}

fn print_table<R: Tabled>(rows: Vec<R>) {
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn task_window_text(task: &Task) -> Result<String, AppError> {
    Ok(format!("{} -> {}", task.start.format()?, task.end.format()?))
}

fn window_label(window: TaskWindow, palette: &Palette) -> String {
    match window {
        TaskWindow::Overdue => palette.alert(window.label()),
        TaskWindow::Upcoming | TaskWindow::Completed => palette.mute(window.label()),
        TaskWindow::Active => window.label().to_string(),
    }
}

fn alarm_title(alarm: &Alarm) -> String {
    if alarm.music_path.trim().is_empty() {
        format!("alarm {}", alarm.time)
    } else {
        format!("alarm {} ({})", alarm.time, alarm.music_path)
    }
}

fn alarm_json(alarm: &Alarm) -> Result<serde_json::Value, AppError> {
    let record = alarm.to_record()?;
    let mut value =
        serde_json::to_value(&record).map_err(|err| AppError::invalid_data(err.to_string()))?;
    value["time"] = serde_json::json!(alarm.time.to_string());
    Ok(value)
}

fn task_json(task: &Task, window: TaskWindow) -> Result<serde_json::Value, AppError> {
    let record = task.to_record()?;
    let mut value =
        serde_json::to_value(&record).map_err(|err| AppError::invalid_data(err.to_string()))?;
    value["window"] = serde_json::json!(window);
    Ok(value)
}

fn next_fire_text(next: &NextFire) -> Result<String, AppError> {
    match next {
        NextFire::At(local) => format_local(*local),
        NextFire::NoFutureFire => Ok("spent".to_string()),
    }
}

fn utc_text(instant: OffsetDateTime) -> Result<String, AppError> {
    instant
        .checked_to_offset(UtcOffset::UTC)
        .ok_or_else(|| AppError::invalid_data("fire time is outside the supported range"))?
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

fn report_rejections(rejected: &[Rejected]) {
    if !rejected.is_empty() {
        eprintln!(
            "WARN: {} record(s) rejected; run `agenda check` for details",
            rejected.len()
        );
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn init_logging() {
    let level = std::env::var("AGENDA_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<Config, AppError> {
    let loaded = load_config_with_fallback();
    if let Some(err) = loaded.error {
        eprintln!("WARN: using default config: {err}");
    }
    let overrides = collect_overrides(&cli.config_override).map_err(AppError::invalid_input)?;
    Ok(merge_overrides(&loaded.config, &overrides))
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;
    let palette = palette_for_theme(config.theme.as_deref());
    let at = cli.at.as_deref();
    tracing::debug!(command = ?cli.command, at = ?at, "dispatching");

    match &cli.command {
        Command::Agenda { user } => {
            let report = agenda_api::agenda(user.as_deref(), at, &config)?;
            report_rejections(&report.rejected);
            let agenda = &report.agenda;

            if cli.json {
                let mut items = Vec::with_capacity(agenda.items.len());
                for item in &agenda.items {
                    let value = match item {
                        AgendaItem::Alarm(alarm) => {
                            serde_json::json!({ "kind": "alarm", "alarm": alarm_json(alarm)? })
                        }
                        AgendaItem::Task { task, window } => {
                            serde_json::json!({ "kind": "task", "task": task_json(task, *window)? })
                        }
                    };
                    items.push(value);
                }
                println!(
                    "{}",
                    serde_json::json!({
                        "user_id": agenda.user_id,
                        "reference": format_local(agenda.reference.local())?,
                        "items": items,
                        "rejected": report.rejected.len(),
                    })
                );
            } else if agenda.items.is_empty() {
                println!("Nothing on the agenda for {}", agenda.user_id);
            } else {
                let mut rows = Vec::with_capacity(agenda.items.len());
                for item in &agenda.items {
                    rows.push(match item {
                        AgendaItem::Alarm(alarm) => AgendaRow {
                            kind: "alarm",
                            id: alarm.id,
                            title: alarm_title(alarm),
                            status: if alarm.puzzle_mode {
                                palette.alert("due (puzzle)")
                            } else {
                                palette.alert("due")
                            },
                            when: format_local(agenda.reference.minute())?,
                        },
                        AgendaItem::Task { task, window } => AgendaRow {
                            kind: "task",
                            id: task.id,
                            title: task.title.clone(),
                            status: window_label(*window, &palette),
                            when: task_window_text(task)?,
                        },
                    });
                }
                print_table(rows);
            }
        }
        Command::Completed { user } => {
            let tasks = agenda_api::completed(user.as_deref(), &config)?;
            if cli.json {
                let mut payload = Vec::with_capacity(tasks.len());
                for task in &tasks {
                    payload.push(task_json(task, TaskWindow::Completed)?);
                }
                println!("{}", serde_json::Value::Array(payload));
            } else if tasks.is_empty() {
                println!("No completed tasks");
            } else {
                let mut rows = Vec::with_capacity(tasks.len());
                for task in &tasks {
                    rows.push(AgendaRow {
                        kind: "task",
                        id: task.id,
                        title: task.title.clone(),
                        status: window_label(TaskWindow::Completed, &palette),
                        when: task_window_text(task)?,
                    });
                }
                print_table(rows);
            }
        }
        Command::Upcoming { user } => {
            let upcoming = agenda_api::upcoming(user.as_deref(), at, &config)?;
            if cli.json {
                let mut payload = Vec::with_capacity(upcoming.len());
                for entry in &upcoming {
                    let mut value = alarm_json(&entry.alarm)?;
                    value["next_fire"] = match entry.next.local() {
                        Some(local) => serde_json::json!(format_local(local)?),
                        None => serde_json::Value::Null,
                    };
                    payload.push(value);
                }
                println!("{}", serde_json::Value::Array(payload));
            } else if upcoming.is_empty() {
                println!("No alarms");
            } else {
                let mut rows = Vec::with_capacity(upcoming.len());
                for entry in &upcoming {
                    rows.push(AlarmRow {
                        id: entry.alarm.id,
                        time: entry.alarm.time.to_string(),
                        repeat: entry.alarm.repeat.to_string(),
                        next: next_fire_text(&entry.next)?,
                    });
                }
                print_table(rows);
            }
        }
        Command::Status { id, user } => {
            let (task, window) = agenda_api::task_status(user.as_deref(), *id, at, &config)?;
            if cli.json {
                println!("{}", task_json(&task, window)?);
            } else {
                println!(
                    "Task {} ({}) is {}",
                    task.title,
                    task.id,
                    window_label(window, &palette)
                );
            }
        }
        Command::Next { id, user } => {
            let report = agenda_api::next_fire(user.as_deref(), *id, at, &config)?;
            let instant = report.instant.map(utc_text).transpose()?;
            if cli.json {
                let mut value = alarm_json(&report.alarm)?;
                value["next_fire"] = match report.next.local() {
                    Some(local) => serde_json::json!(format_local(local)?),
                    None => serde_json::Value::Null,
                };
                value["next_fire_instant"] = serde_json::json!(instant);
                println!("{value}");
            } else {
                match (report.next, instant) {
                    (NextFire::At(local), Some(instant)) => println!(
                        "Alarm {} fires at {} ({})",
                        report.alarm.id,
                        format_local(local)?,
                        instant
                    ),
                    _ => println!("Alarm {} will not fire again", report.alarm.id),
                }
            }
        }
        Command::Ring => {
            let outcome = agenda_api::ring(at, &config)?;
            if cli.json {
                let mut payload = Vec::with_capacity(outcome.alarms.len());
                for alarm in &outcome.alarms {
                    payload.push(alarm_json(alarm)?);
                }
                println!(
                    "{}",
                    serde_json::json!({
                        "reference": format_local(outcome.reference.minute())?,
                        "alarms": payload,
                        "spent": outcome.recorded,
                    })
                );
            } else if outcome.alarms.is_empty() {
                println!("No alarms due");
            } else {
                for alarm in &outcome.alarms {
                    let puzzle = if alarm.puzzle_mode { " [puzzle]" } else { "" };
                    println!(
                        "RING: {} for {} ({}){}",
                        alarm_title(alarm),
                        alarm.user_id,
                        alarm.id,
                        puzzle
                    );
                }
            }
        }
        Command::Check => {
            let ingested = agenda_api::check(&config)?;
            if cli.json {
                let rejected: Vec<serde_json::Value> = ingested
                    .rejected
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "kind": entry.kind.label(),
                            "id": entry.id,
                            "code": entry.error.code(),
                            "field": entry.error.field(),
                            "message": entry.error.to_string(),
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "tasks": ingested.tasks.len(),
                        "alarms": ingested.alarms.len(),
                        "rejected": rejected,
                    })
                );
            } else {
                println!(
                    "{} task(s) and {} alarm(s) valid",
                    ingested.tasks.len(),
                    ingested.alarms.len()
                );
                if !ingested.rejected.is_empty() {
                    let rows: Vec<RejectedRow> = ingested
                        .rejected
                        .iter()
                        .map(|entry| RejectedRow {
                            kind: entry.kind.label(),
                            id: entry.id,
                            field: entry.error.field().unwrap_or("-").to_string(),
                            reason: match &entry.error {
                                AppError::Validation { reason, .. } => reason.clone(),
                                other => other.to_string(),
                            },
                        })
                        .collect();
                    print_table(rows);
                }
            }

            if !ingested.rejected.is_empty() {
                return Err(AppError::invalid_data(format!(
                    "{} record(s) rejected",
                    ingested.rejected.len()
                )));
            }
        }
    }

    Ok(())
}

fn main() {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
