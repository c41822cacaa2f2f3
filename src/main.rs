use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use mood_relay::dispatch::DispatchOutcome;
use mood_relay::emotion::{DayEstimate, EmotionLabel};
use mood_relay::events::{handle_event, SensorEvent, WebhookBody};
use mood_relay::{AppState, EngineConfig};

// ========= CLI =========

#[derive(Parser, Debug)]
#[command(name = "mood-relay", version, about = "Daily emotion estimate and message rotation")]
struct Cli {
    /// Config file (default: $MOOD_RELAY_CONFIG, then ./mood-relay.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON export of measurement records (overrides [source] path)
    #[arg(long, global = true)]
    records: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// One line per recorded day with label, mean and std
    Report {
        #[arg(long)]
        subject: String,
    },

    /// Label for a single day
    Estimate {
        #[arg(long)]
        subject: String,

        /// YYYY-MM-DD or YYYY/MM/DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Run the dispatch decision for a subject detected at a location
    Decide {
        #[arg(long)]
        location: String,

        #[arg(long)]
        subject: String,
    },

    /// Feed a webhook body (JSON file, or stdin when omitted)
    Event {
        #[arg(long)]
        payload: Option<PathBuf>,
    },

    /// Rotation counters and last dispatch date
    Status {
        /// Single location (default: every known location)
        #[arg(long)]
        location: Option<String>,
    },

    /// Zero the rotation counters of a location
    Reset {
        #[arg(long)]
        location: String,
    },

    /// List the message catalog
    Messages,
}

fn main() -> Result<()> {
    // init tracing from env MOOD_RELAY_LOG or RUST_LOG
    let filter = std::env::var("MOOD_RELAY_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load_or_default(cli.config.as_deref());
    if let Some(records) = cli.records {
        config.source.path = records;
    }
    let state = AppState::from_config(config);

    let result = run(&state, cli.cmd, cli.json);
    state.store.flush().context("flushing rotation state")?;
    result
}

fn run(state: &AppState, cmd: Commands, as_json: bool) -> Result<()> {
    match cmd {
        Commands::Report { subject } => {
            let reports = state.decider.aggregator().aggregate_subject(&subject);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
                return Ok(());
            }
            if reports.is_empty() {
                println!("No measurements for {}", subject);
                return Ok(());
            }

            let mut breakdown: BTreeMap<EmotionLabel, usize> =
                EmotionLabel::ALL.into_iter().map(|l| (l, 0)).collect();
            for r in &reports {
                *breakdown.entry(r.label).or_default() += 1;
                println!(
                    "{}  {} {:<8}  n={:<3} mean={:.2} std={:.2}",
                    r.date,
                    r.label.emoji(),
                    r.label,
                    r.record_count,
                    r.mean_valence,
                    r.std_valence
                );
            }
            println!();
            println!("{} days for {}", reports.len(), subject);
            for (label, days) in breakdown {
                println!("  {} {:<8} {}", label.emoji(), label, days);
            }
        }

        Commands::Estimate { subject, date } => {
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => Local::now().date_naive(),
            };
            let estimate = state.decider.aggregator().estimate_single_day(&subject, date);
            if as_json {
                let label = estimate.label().map(|l| l.as_str());
                println!(
                    "{}",
                    json!({ "subject_id": subject, "date": date, "label": label })
                );
                return Ok(());
            }
            match estimate {
                DayEstimate::Classified(label) => {
                    println!("{} {}: {} {}", subject, date, label.emoji(), label)
                }
                DayEstimate::NoData => println!("{} {}: no data", subject, date),
            }
        }

        Commands::Decide { location, subject } => {
            let outcome = state.decider.decide_outcome(&location, &subject);
            print_outcome(&location, &outcome, as_json);
        }

        Commands::Event { payload } => {
            let raw = match payload {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("reading payload {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("reading payload from stdin")?;
                    buf
                }
            };
            let body: WebhookBody =
                serde_json::from_str(&raw).context("payload is not a webhook body")?;
            let Some(event) = SensorEvent::from_webhook(&body, &state.config.routing) else {
                bail!("payload has no event name, or no location / subject could be resolved");
            };

            let message = handle_event(&state.decider, &event);
            if as_json {
                println!(
                    "{}",
                    json!({
                        "event": format!("{}.{}", event.sensor_type, event.event_type),
                        "location_id": event.location_id,
                        "subject_id": event.subject_id,
                        "message": message,
                    })
                );
            } else {
                match message {
                    Some(m) => println!("{}: {}", event.location_id, m),
                    None => println!("{}: (silent)", event.location_id),
                }
            }
        }

        Commands::Status { location } => {
            let entries: Vec<(String, BTreeMap<EmotionLabel, usize>, Option<NaiveDate>)> =
                match location {
                    Some(loc) => vec![(
                        loc.clone(),
                        state.store.counter_status(&loc),
                        state.store.last_dispatch_date(&loc),
                    )],
                    None => state
                        .store
                        .snapshot()
                        .into_iter()
                        .map(|(loc, record)| {
                            let counters = EmotionLabel::ALL
                                .into_iter()
                                .map(|l| (l, record.cursor(l)))
                                .collect();
                            (loc, counters, record.last_dispatch_date)
                        })
                        .collect(),
                };

            if as_json {
                let out: Vec<_> = entries
                    .iter()
                    .map(|(loc, counters, last)| {
                        json!({ "location_id": loc, "counters": counters, "last_dispatch_date": last })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("No rotation state recorded");
            }
            for (loc, counters, last) in entries {
                let last = last.map(|d| d.to_string()).unwrap_or_else(|| "never".into());
                println!("{} (last dispatch: {})", loc, last);
                for (label, cursor) in counters {
                    println!(
                        "  {} {:<8} {}/{}",
                        label.emoji(),
                        label,
                        cursor,
                        state.catalog.len_for(label)
                    );
                }
            }
        }

        Commands::Reset { location } => {
            let reset = state.store.reset(&location);
            if as_json {
                println!("{}", json!({ "location_id": location, "reset": reset }));
            } else if reset {
                println!("Counters reset for {}", location);
            } else {
                println!("No rotation state for {}", location);
            }
        }

        Commands::Messages => {
            if as_json {
                let out: BTreeMap<EmotionLabel, &[String]> = EmotionLabel::ALL
                    .into_iter()
                    .map(|l| (l, state.catalog.messages_for(l)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }
            for label in EmotionLabel::ALL {
                let messages = state.catalog.messages_for(label);
                println!("{} {} ({})", label.emoji(), label, messages.len());
                for (i, m) in messages.iter().enumerate() {
                    println!("  {:>2}. {}", i, m);
                }
            }
        }
    }

    Ok(())
}

fn print_outcome(location: &str, outcome: &DispatchOutcome, as_json: bool) {
    if as_json {
        let (status, label, message) = match outcome {
            DispatchOutcome::Delivered { label, message } => {
                ("delivered", Some(label.as_str()), Some(message.as_str()))
            }
            DispatchOutcome::Suppressed { label } => ("suppressed", Some(label.as_str()), None),
            DispatchOutcome::NoData => ("no_data", None, None),
        };
        println!(
            "{}",
            json!({ "location_id": location, "outcome": status, "label": label, "message": message })
        );
        return;
    }
    match outcome {
        DispatchOutcome::Delivered { label, message } => {
            println!("{} {} {}: {}", location, label.emoji(), label, message)
        }
        DispatchOutcome::Suppressed { label } => {
            println!("{} {} {}: (already served today or no message)", location, label.emoji(), label)
        }
        DispatchOutcome::NoData => println!("{}: no measurements today", location),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .with_context(|| format!("invalid date {:?} (expected YYYY-MM-DD)", s))
}
