//! Events command: print the records of an event stream.

use super::models::EventsArgs;
use super::utils::Session;
use crate::events::{EventRecord, EventSource};
use crate::formats::{FormatRegistry, StreamKind};
use anyhow::{anyhow, Context, Result};
use colored::*;
use log::info;
use std::io;

/// Execute the events command
pub fn execute_events(session: &mut Session, args: EventsArgs) -> Result<()> {
    let file = args.file.clone();
    let (stream, events) = session.run(&format!("open {}", args.file.display()), move |_| {
        let mut log = io::stderr();
        let mut data = FormatRegistry::standard()
            .open(&file, &mut log)
            .with_context(|| format!("Failed to open {}", file.display()))?
            .into_data()?;

        let stream = data
            .streams()
            .into_iter()
            .find(|descriptor| descriptor.kind == StreamKind::Events)
            .map(|descriptor| descriptor.name)
            .ok_or_else(|| anyhow!("{} has no event streams", file.display()))?;

        let events: EventSource = data.open_stream(&stream, &mut log)?.into_events()?;
        Ok((stream, events))
    })?;

    println!(
        "\n{} {} / {} ({} records)",
        "Events:".bold(),
        args.file.display().to_string().cyan(),
        stream,
        events.len()
    );
    println!("Event names: {}", events.event_names().join(", "));
    println!("---------------------------------------------------");

    let mut cursor = events.open();
    while cursor.position() < args.limit {
        match cursor.next_record() {
            Some(record) => println!("{}", format_record(record)),
            None => break,
        }
    }
    if events.len() > args.limit {
        println!("  ... {} more records", events.len() - args.limit);
    }

    info!("Printed {} of {} records", cursor.position(), events.len());
    Ok(())
}

/// One line per record: time, process, name, then `key=value` fields
pub fn format_record(record: &EventRecord) -> String {
    let process = record
        .process_id
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string());
    let fields: Vec<String> = record
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    format!(
        "{:>12.3}  {:>6}  {:<24} {}",
        record.time_relative_msec,
        process,
        record.event_name,
        fields.join(" ")
    )
    .trim_end()
    .to_string()
}
