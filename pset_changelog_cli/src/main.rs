// SPDX-License-Identifier: AGPL-3.0-or-later

#![allow(clippy::uninlined_format_args)]
mod config;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use log::info;
use pset_changelog::export::Row;
use pset_changelog::filter::{DateRange, FilterSpec};
use pset_changelog::types::{LogKey, NewLogRecord, Snapshot};
use pset_changelog::ChangeLogService;
use serde::Serialize;

use crate::config::{load_config, log_filter, ConfigArgs};

/// Review and amend the revision history of tool parameter sets (PSETs).
#[derive(Parser, Debug)]
#[command(name = "pset-changelog", long_about = None, version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the latest revision of every log record matching the filter.
    ///
    /// Filters are shortcuts, not combined: "--all-time" wins over the week filters, which win
    /// over devices and date range.
    Refresh {
        /// Show all log records, ignoring every other filter.
        #[arg(long)]
        all_time: bool,

        /// Log records registered during the current week.
        #[arg(long)]
        current_week: bool,

        /// Log records registered during the previous week.
        #[arg(long)]
        previous_week: bool,

        /// Log records on this device, repeat for several. "All" lifts the restriction.
        #[arg(long, value_name = "DEVICE")]
        device: Vec<String>,

        /// Log records registered at or after this time (RFC 3339), requires "--to".
        #[arg(long, value_name = "TIME")]
        from: Option<DateTime<Utc>>,

        /// Log records registered at or before this time (RFC 3339), requires "--from".
        #[arg(long, value_name = "TIME")]
        to: Option<DateTime<Utc>>,

        /// Print a labelled table instead of rows.
        #[arg(long)]
        table: bool,
    },

    /// Show all revisions of a log record.
    History {
        /// Identifier of the log record.
        key: LogKey,
    },

    /// Append a revision with a note to a log record.
    Edit {
        /// Identifier of the log record.
        key: LogKey,

        /// Why the edit was made.
        #[arg(long)]
        note: String,

        /// Who made the edit.
        #[arg(long)]
        author: String,
    },

    /// List the fields which differ between two revisions of a log record.
    Compare {
        /// Identifier of the log record.
        key: LogKey,

        /// Position of the first revision in the history.
        left: usize,

        /// Position of the second revision in the history.
        right: usize,
    },

    /// Export the history of a log record as a labelled table.
    Export {
        /// Identifier of the log record.
        key: LogKey,
    },

    /// List all devices.
    Devices {
        /// Group devices by production line.
        #[arg(long)]
        grouped: bool,
    },

    /// Register a new log record with its base revision.
    Insert {
        /// Identifier of the new log record.
        key: LogKey,

        /// Controller the tool is connected to.
        #[arg(long)]
        controller_id: String,

        /// Device (station) name.
        #[arg(long)]
        device: String,

        /// Parameter set on the controller.
        #[arg(long)]
        pset: String,

        #[arg(long)]
        torque_min: f64,

        #[arg(long)]
        torque_target: f64,

        #[arg(long)]
        torque_max: f64,

        #[arg(long)]
        angle_min: f64,

        #[arg(long)]
        angle_target: f64,

        #[arg(long)]
        angle_max: f64,

        /// Time the tool program was last changed on the controller (RFC 3339).
        #[arg(long, value_name = "TIME")]
        time_last_change: Option<DateTime<Utc>>,

        /// Author of the base revision.
        #[arg(long)]
        author: Option<String>,

        /// Note of the base revision.
        #[arg(long)]
        note: Option<String>,
    },
}

impl Cli {
    // Run custom validators on parsed CLI input
    fn validate(self) -> Self {
        if let Command::Refresh { from, to, .. } = &self.command {
            if from.is_some() != to.is_some() {
                // Print a help message about the missing value and exit
                Cli::command()
                    .error(
                        ClapErrorKind::MissingRequiredArgument,
                        "'--from' and '--to' must both be provided for a date range",
                    )
                    .exit()
            }
        }

        self
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(service: &ChangeLogService, command: Command) -> Result<()> {
    match command {
        Command::Refresh {
            all_time,
            current_week,
            previous_week,
            device,
            from,
            to,
            table,
        } => {
            let date_range = match (from, to) {
                (Some(start), Some(end)) => Some(DateRange { start, end }),
                _ => None,
            };

            let spec = FilterSpec {
                all_time,
                current_week,
                previous_week,
                devices: device.into_iter().collect(),
                date_range,
            };

            let rows: Vec<Row> = service.refresh(&spec).await?;
            if table {
                print_json(&service.export_rows(&rows))
            } else {
                print_json(&rows)
            }
        }
        Command::History { key } => print_json(&service.history(key).await),
        Command::Edit { key, note, author } => {
            let rev = service.edit_note(key, &note, &author).await?;
            print_json(&rev)
        }
        Command::Compare { key, left, right } => {
            print_json(&service.compare(key, left, right).await?)
        }
        Command::Export { key } => print_json(&service.export_history(key).await),
        Command::Devices { grouped } => {
            if grouped {
                print_json(&service.device_groups().await)
            } else {
                print_json(&service.devices().await)
            }
        }
        Command::Insert {
            key,
            controller_id,
            device,
            pset,
            torque_min,
            torque_target,
            torque_max,
            angle_min,
            angle_target,
            angle_max,
            time_last_change,
            author,
            note,
        } => {
            let snapshot = Snapshot {
                torque_min,
                torque_target,
                torque_max,
                angle_min,
                angle_target,
                angle_max,
            };

            let record = NewLogRecord {
                time_last_change,
                author,
                note,
                ..NewLogRecord::new(key, &controller_id, &device, &pset, snapshot)
            };

            print_json(&service.insert(record).await?)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments and run custom validators
    let cli = Cli::parse().validate();

    // Load configuration parameters and apply defaults
    let (config_file_path, config, log_level) =
        load_config(&cli.config).context("Could not load configuration")?;

    env_logger::Builder::new()
        .parse_filters(&log_filter(&log_level))
        .init();

    if let Some(path) = config_file_path {
        info!("Loaded config file from {}", path.display());
    }

    let service = ChangeLogService::open(&config)
        .await
        .context("Could not open change log store")?;

    // Close the store even when the command failed
    let result = run(&service, cli.command).await;
    service.close().await;

    result
}
