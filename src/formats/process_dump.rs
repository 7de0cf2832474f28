//! Process dumps: not analyzable directly, only handed to an external
//! heap-capture tool.

use super::adapter::{FormatAdapter, OpenedFile};
use crate::utils::config::AnalysisConfig;
use crate::utils::error::FormatError;
use log::{info, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// External action that turns a dump into a heap file
pub trait HeapCaptureAction {
    /// Returns the produced heap file, if the action made one
    fn capture(&self, dump: &Path, log: &mut dyn Write) -> io::Result<Option<PathBuf>>;
}

/// Trigger-only result of opening a process dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTrigger {
    dump_path: PathBuf,
}

impl CaptureTrigger {
    pub fn new(dump_path: &Path) -> Self {
        Self {
            dump_path: dump_path.to_path_buf(),
        }
    }

    pub fn format_name(&self) -> &'static str {
        ProcessDumpAdapter.format_name()
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    /// Run `action` against the dump
    pub fn fire(
        &self,
        action: &dyn HeapCaptureAction,
        log: &mut dyn Write,
    ) -> io::Result<Option<PathBuf>> {
        let _ = writeln!(log, "Capturing heap from {}", self.dump_path.display());
        let produced = action.capture(&self.dump_path, log)?;
        match &produced {
            Some(heap) => info!("Heap capture produced {}", heap.display()),
            None => warn!("Heap capture for {} produced no file", self.dump_path.display()),
        }
        Ok(produced)
    }
}

/// Runs a configured command line; `{dump}` and `{output}` are substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCapture {
    pub command: String,
    pub output: PathBuf,
}

impl CommandCapture {
    /// Capture writing next to the dump as `<dump>.gcheap`
    pub fn from_config(config: &AnalysisConfig, dump: &Path) -> Option<Self> {
        let command = config.heap_capture_command.clone()?;
        let mut output = dump.as_os_str().to_owned();
        output.push(".gcheap");
        Some(Self {
            command,
            output: PathBuf::from(output),
        })
    }

    fn arguments(&self, dump: &Path) -> Vec<String> {
        let dump = dump.to_string_lossy();
        let output = self.output.to_string_lossy();
        self.command
            .split_whitespace()
            .map(|part| part.replace("{dump}", &dump).replace("{output}", &output))
            .collect()
    }
}

impl HeapCaptureAction for CommandCapture {
    fn capture(&self, dump: &Path, log: &mut dyn Write) -> io::Result<Option<PathBuf>> {
        let arguments = self.arguments(dump);
        let (program, rest) = arguments
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty capture command"))?;

        let _ = writeln!(log, "Running {}", arguments.join(" "));
        let output = Command::new(program).args(rest).output()?;
        log.write_all(&output.stdout)?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "capture command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(self.output.exists().then(|| self.output.clone()))
    }
}

pub struct ProcessDumpAdapter;

impl FormatAdapter for ProcessDumpAdapter {
    fn format_name(&self) -> &'static str {
        "Process Dump"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".dmp"]
    }

    fn open(&self, path: &Path, log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let metadata = std::fs::metadata(path).map_err(|e| FormatError::unreadable(path, e))?;
        let _ = writeln!(
            log,
            "{} is a process dump ({} bytes); capture a heap to analyze it",
            path.display(),
            metadata.len()
        );
        Ok(OpenedFile::Trigger(CaptureTrigger::new(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recording {
        seen: RefCell<Vec<PathBuf>>,
    }

    impl HeapCaptureAction for Recording {
        fn capture(&self, dump: &Path, _log: &mut dyn Write) -> io::Result<Option<PathBuf>> {
            self.seen.borrow_mut().push(dump.to_path_buf());
            Ok(Some(dump.with_extension("gcheap")))
        }
    }

    #[test]
    fn test_fire_invokes_action() {
        let trigger = CaptureTrigger::new(Path::new("app.dmp"));
        let action = Recording {
            seen: RefCell::new(Vec::new()),
        };
        let produced = trigger.fire(&action, &mut Vec::new()).unwrap();

        assert_eq!(produced, Some(PathBuf::from("app.gcheap")));
        assert_eq!(action.seen.borrow().as_slice(), &[PathBuf::from("app.dmp")]);
    }

    #[test]
    fn test_command_substitution() {
        let config = AnalysisConfig {
            heap_capture_command: Some("dumper --in {dump} --out {output}".to_string()),
            ..AnalysisConfig::default()
        };
        let capture = CommandCapture::from_config(&config, Path::new("/tmp/app.dmp")).unwrap();
        assert_eq!(
            capture.arguments(Path::new("/tmp/app.dmp")),
            vec!["dumper", "--in", "/tmp/app.dmp", "--out", "/tmp/app.dmp.gcheap"]
        );
    }

    #[test]
    fn test_no_command_configured() {
        assert!(CommandCapture::from_config(&AnalysisConfig::default(), Path::new("a.dmp")).is_none());
    }
}
