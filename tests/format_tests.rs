use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::tempdir;
use tracelens::events::HandleState;
use tracelens::formats::code_size::CODE_SIZE_STREAM;
use tracelens::formats::csv_trace::EVENTS_STREAM;
use tracelens::formats::{FormatRegistry, OpenedFile, StreamKind, ViewState};
use tracelens::model::TimeRange;
use tracelens::utils::error::FormatError;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_codesize_dispatch() {
    let dir = tempdir().unwrap();
    let path = write(
        dir.path(),
        "app.CODESIZE",
        "# method sizes\n120 app!Main\n0x20 app!Helper\n64 lib!Read\n",
    );

    let mut log = Vec::new();
    let mut data = FormatRegistry::standard()
        .open(&path, &mut log)
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(data.format_name(), "Code Size");
    assert_eq!(data.stream_names(), vec![CODE_SIZE_STREAM]);

    let source = data.open_stream(CODE_SIZE_STREAM, &mut log).unwrap().into_stack().unwrap();
    assert_eq!(source.total_metric(TimeRange::ALL), 216.0);
    assert_eq!(source.metric_unit(), "bytes");
    assert!(String::from_utf8(log).unwrap().contains("Read 3 methods"));
}

#[test]
fn test_unknown_extension() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "notes.txt", "hello");
    let err = FormatRegistry::standard().open(&path, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, FormatError::UnknownFormat(_)));
}

#[test]
fn test_undeclared_stream() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "app.codesize", "1 a!b\n");
    let mut data = FormatRegistry::standard()
        .open(&path, &mut Vec::new())
        .unwrap()
        .into_data()
        .unwrap();

    let err = data.open_stream("Nope", &mut Vec::new()).unwrap_err();
    assert!(matches!(err, FormatError::UnsupportedStream { .. }));
}

const CSV_TRACE: &str = "\
EventName,TimeMsec,ProcessID,Stack,Size
Alloc,1.0,10,app!Main;app!New,64
Sample,oops,10,app!Main;app!Work,
Alloc,3.0,10,app!Main,32
";

#[test]
fn test_csv_errors_stay_with_their_stream() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "trace.etl.csv", CSV_TRACE);
    let mut data = FormatRegistry::standard()
        .open(&path, &mut Vec::new())
        .unwrap()
        .into_data()
        .unwrap();

    let kinds: Vec<(String, StreamKind)> =
        data.streams().into_iter().map(|d| (d.name, d.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (EVENTS_STREAM.to_string(), StreamKind::Events),
            ("Alloc".to_string(), StreamKind::Stack),
            ("Sample".to_string(), StreamKind::Stack),
        ]
    );

    let alloc = data.open_stream("Alloc", &mut Vec::new()).unwrap().into_stack().unwrap();
    assert_eq!(alloc.sample_count(), 2);

    match data.open_stream("Sample", &mut Vec::new()).unwrap_err() {
        FormatError::CorruptData { stream, detail, .. } => {
            assert_eq!(stream, "Sample");
            assert!(detail.contains("oops"));
        }
        other => panic!("unexpected error: {}", other),
    }

    match data.open_stream(EVENTS_STREAM, &mut Vec::new()).unwrap_err() {
        FormatError::CorruptData { stream, .. } => assert_eq!(stream, EVENTS_STREAM),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_event_reader_clones_are_isolated() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "trace.etl.csv", &CSV_TRACE.replace("oops", "2.0"));
    let mut data = FormatRegistry::standard()
        .open(&path, &mut Vec::new())
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(data.stream_state(EVENTS_STREAM), Some(HandleState::Unopened));

    let events = data.open_stream(EVENTS_STREAM, &mut Vec::new()).unwrap().into_events().unwrap();
    assert_eq!(data.stream_state(EVENTS_STREAM), Some(HandleState::Live));

    let mut live = events.open();
    assert_eq!(events.state(), HandleState::Live);
    live.next_record();
    live.next_record();

    let again = data.open_stream(EVENTS_STREAM, &mut Vec::new()).unwrap().into_events().unwrap();
    assert_eq!(data.stream_state(EVENTS_STREAM), Some(HandleState::Cloned));

    let mut clone = again.open();
    assert_eq!(events.state(), HandleState::Cloned);
    assert_eq!(clone.position(), 0);
    assert_eq!(clone.next_record().map(|r| r.event_name.clone()), Some("Alloc".to_string()));
    assert_eq!(live.position(), 2);
    assert_eq!(live.next_record().map(|r| r.time_relative_msec), Some(3.0));
}

#[test]
fn test_process_dump_is_trigger_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crash.dmp");
    std::fs::write(&path, b"MDMP\0\0\0\0").unwrap();

    let opened = FormatRegistry::standard().open(&path, &mut Vec::new()).unwrap();
    assert!(matches!(opened, OpenedFile::Trigger(_)));

    let err = opened.into_data().unwrap_err();
    assert!(matches!(
        err,
        FormatError::CapabilityNotSupported {
            format: "Process Dump",
            ..
        }
    ));
}

#[test]
fn test_data_file_refuses_trigger() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "app.codesize", "1 a!b\n");
    let opened = FormatRegistry::standard().open(&path, &mut Vec::new()).unwrap();
    assert!(matches!(
        opened.into_trigger().unwrap_err(),
        FormatError::CapabilityNotSupported { .. }
    ));
}

#[test]
fn test_view_state_legacy_names_round_trip() {
    let legacy = ViewState::parse_xml(
        "<StackWindowGuiState>\
           <FoldPercent>3</FoldPercent>\
           <GroupRegEx>System.*->CLR</GroupRegEx>\
           <FoldRegEx><Pattern>memcpy</Pattern><Pattern>memset</Pattern></FoldRegEx>\
         </StackWindowGuiState>",
    )
    .unwrap();

    assert_eq!(legacy.fold_percent, 3.0);
    assert_eq!(legacy.group_patterns, vec!["System.*->CLR".to_string()]);
    assert_eq!(legacy.fold_patterns, vec!["memcpy".to_string(), "memset".to_string()]);

    let text = legacy.to_xml_element().to_xml_string();
    assert!(text.contains("<GroupPatterns>"));
    assert_eq!(ViewState::parse_xml(&text).unwrap(), legacy);
}
