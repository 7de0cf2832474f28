//! CSV-exported event traces (`.etl.csv`, zipped as `.csvz`).
//!
//! Required columns are `EventName` and `TimeMsec`. `ProcessID`, `Metric`
//! (default 1) and `Stack` (root-first `module!name` frames separated by
//! `;`) are optional; any other column is kept as an event field.
//!
//! The file exposes an `Events` stream with every row, plus one stack
//! stream per event name that carries stacks. Rows are validated when the
//! stream that uses them is opened, so a bad row only breaks its streams.

use super::adapter::{DataFile, FormatAdapter, LogicalStream, OpenedFile, StreamDescriptor, StreamKind};
use super::input::{read_bytes, read_zip_entry};
use crate::events::{EventRecord, EventSource};
use crate::model::{StackSource, StackSourceBuilder};
use crate::utils::error::FormatError;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const EVENTS_STREAM: &str = "Events";
// Stack stream of events literally named `Events`
const EVENTS_STACK_STREAM: &str = "Events (stacks)";

fn stack_stream_name(event_name: &str) -> String {
    if event_name == EVENTS_STREAM {
        EVENTS_STACK_STREAM.to_string()
    } else {
        event_name.to_string()
    }
}

const EVENT_NAME: &str = "EventName";
const TIME_MSEC: &str = "TimeMsec";
const PROCESS_ID: &str = "ProcessID";
const METRIC: &str = "Metric";
const STACK: &str = "Stack";

#[derive(Debug)]
struct Columns {
    event_name: usize,
    time: usize,
    process_id: Option<usize>,
    metric: Option<usize>,
    stack: Option<usize>,
    // (index, header) of every column kept as a field
    fields: Vec<(usize, String)>,
}

/// Rows of a CSV trace, validated lazily per stream
#[derive(Debug)]
pub struct CsvTable {
    path: PathBuf,
    columns: Columns,
    rows: Vec<StringRecord>,
}

struct Row<'a> {
    event_name: &'a str,
    time: f64,
    process_id: Option<u32>,
    metric: f64,
    stack: &'a str,
}

impl CsvTable {
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self, FormatError> {
        let corrupt = |detail: String| FormatError::corrupt(path, EVENTS_STREAM, detail);

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|e| corrupt(format!("invalid header: {}", e)))?
            .clone();

        let position = |name: &str| headers.iter().position(|h| h == name);
        let required =
            |name: &str| position(name).ok_or_else(|| corrupt(format!("missing column {}", name)));

        let columns = Columns {
            event_name: required(EVENT_NAME)?,
            time: required(TIME_MSEC)?,
            process_id: position(PROCESS_ID),
            metric: position(METRIC),
            stack: position(STACK),
            fields: headers
                .iter()
                .enumerate()
                .filter(|(_, h)| ![EVENT_NAME, TIME_MSEC, PROCESS_ID, METRIC, STACK].contains(h))
                .map(|(i, h)| (i, h.to_string()))
                .collect(),
        };

        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt(format!("invalid row: {}", e)))?;
        debug!("Read {} CSV rows from {}", rows.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            rows,
        })
    }

    fn cell<'a>(&self, row: &'a StringRecord, column: Option<usize>) -> &'a str {
        column.and_then(|i| row.get(i)).unwrap_or_default()
    }

    fn event_name<'a>(&self, row: &'a StringRecord) -> &'a str {
        self.cell(row, Some(self.columns.event_name))
    }

    fn line(row: &StringRecord) -> u64 {
        row.position().map_or(0, |p| p.line())
    }

    fn decode<'a>(&self, row: &'a StringRecord, stream: &str) -> Result<Row<'a>, FormatError> {
        let corrupt = |what: &str, value: &str| {
            FormatError::corrupt(
                &self.path,
                stream,
                format!("line {}: invalid {} '{}'", Self::line(row), what, value),
            )
        };

        let time_text = self.cell(row, Some(self.columns.time));
        let time = time_text.parse::<f64>().map_err(|_| corrupt(TIME_MSEC, time_text))?;

        let pid_text = self.cell(row, self.columns.process_id);
        let process_id = if pid_text.is_empty() {
            None
        } else {
            Some(pid_text.parse::<u32>().map_err(|_| corrupt(PROCESS_ID, pid_text))?)
        };

        let metric_text = self.cell(row, self.columns.metric);
        let metric = if metric_text.is_empty() {
            1.0
        } else {
            metric_text.parse::<f64>().map_err(|_| corrupt(METRIC, metric_text))?
        };

        Ok(Row {
            event_name: self.event_name(row),
            time,
            process_id,
            metric,
            stack: self.cell(row, self.columns.stack),
        })
    }

    /// Event names whose rows carry stacks, in first-seen order
    pub fn stack_stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in &self.rows {
            if self.cell(row, self.columns.stack).is_empty() {
                continue;
            }
            let name = stack_stream_name(self.event_name(row));
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn events(&self) -> Result<EventSource, FormatError> {
        let records = self
            .rows
            .iter()
            .map(|row| -> Result<EventRecord, FormatError> {
                let decoded = self.decode(row, EVENTS_STREAM)?;
                Ok(EventRecord {
                    event_name: decoded.event_name.to_string(),
                    time_relative_msec: decoded.time,
                    process_id: decoded.process_id,
                    fields: self
                        .columns
                        .fields
                        .iter()
                        .map(|(i, name)| (name.clone(), row.get(*i).unwrap_or_default().to_string()))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, FormatError>>()?;
        Ok(EventSource::new(records))
    }

    /// Stack samples of the rows named `event_name`
    /// Stack stream `stream`, as named by `stack_stream_names`
    pub fn stacks(&self, stream: &str) -> Result<StackSource, FormatError> {
        let event_name = if stream == EVENTS_STACK_STREAM { EVENTS_STREAM } else { stream };
        let mut builder = StackSourceBuilder::new(stream, "count");
        for row in self.rows.iter().filter(|row| self.event_name(row) == event_name) {
            let decoded = self.decode(row, stream)?;
            if decoded.stack.is_empty() {
                continue;
            }
            let frames = decoded.stack.split(';').map(str::trim).filter(|f| !f.is_empty());
            builder.add_stack(frames, decoded.metric, decoded.time, decoded.process_id);
        }
        Ok(builder.build())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

pub struct CsvTraceAdapter;

impl FormatAdapter for CsvTraceAdapter {
    fn format_name(&self) -> &'static str {
        "CSV Trace"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".etl.csv", ".csvz"]
    }

    fn open(&self, path: &Path, log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let zipped = path.to_string_lossy().to_ascii_lowercase().ends_with(".csvz");
        let bytes = if zipped {
            read_zip_entry(path, ".csv", EVENTS_STREAM)?
        } else {
            read_bytes(path)?
        };
        let table = CsvTable::parse(path, &bytes)?;

        let mut streams = vec![StreamDescriptor::new(EVENTS_STREAM, StreamKind::Events)];
        streams.extend(
            table
                .stack_stream_names()
                .into_iter()
                .map(|name| StreamDescriptor::new(name, StreamKind::Stack)),
        );
        let _ = writeln!(
            log,
            "Read {} rows, {} streams from {}",
            table.row_count(),
            streams.len(),
            path.display()
        );

        let loader = Box::new(move |stream: &str, _: &mut dyn Write| {
            if stream == EVENTS_STREAM {
                table.events().map(LogicalStream::Events)
            } else {
                table
                    .stacks(stream)
                    .map(|source| LogicalStream::Stack(Arc::new(source)))
            }
        });

        Ok(OpenedFile::Data(DataFile::new(path, self.format_name(), streams, loader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeRange;

    const SAMPLE: &str = "\
EventName,TimeMsec,ProcessID,Metric,Stack,Size
Alloc,1.0,10,64,app!Main;app!New,64
Sample,2.0,10,,app!Main;app!Work,
Alloc,3.0,10,32,app!Main,32
Marker,4.0,,,,
";

    #[test]
    fn test_streams_and_fields() {
        let table = CsvTable::parse(Path::new("t.etl.csv"), SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.stack_stream_names(), vec!["Alloc", "Sample"]);

        let events = table.events().unwrap();
        assert_eq!(events.len(), 4);
        let first = events.open().next().unwrap();
        assert_eq!(first.field("Size"), Some("64"));
        assert_eq!(first.process_id, Some(10));
    }

    #[test]
    fn test_stack_stream_metrics() {
        let table = CsvTable::parse(Path::new("t.etl.csv"), SAMPLE.as_bytes()).unwrap();
        let alloc = table.stacks("Alloc").unwrap();
        assert_eq!(alloc.total_metric(TimeRange::ALL), 96.0);

        let sample = table.stacks("Sample").unwrap();
        assert_eq!(sample.total_metric(TimeRange::ALL), 1.0);
    }

    #[test]
    fn test_event_named_events_keeps_its_stacks() {
        let csv = "EventName,TimeMsec,Stack\nEvents,1.0,app!Main;app!Run\nEvents,2.0,app!Main\n";
        let table = CsvTable::parse(Path::new("t.etl.csv"), csv.as_bytes()).unwrap();
        assert_eq!(table.stack_stream_names(), vec!["Events (stacks)"]);

        let stacks = table.stacks("Events (stacks)").unwrap();
        assert_eq!(stacks.total_metric(TimeRange::ALL), 2.0);
        assert_eq!(table.events().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_required_column() {
        let err = CsvTable::parse(Path::new("t.etl.csv"), b"EventName,Stack\nA,x\n").unwrap_err();
        assert!(err.to_string().contains("TimeMsec"));
    }
}
