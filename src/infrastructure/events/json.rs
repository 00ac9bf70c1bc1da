//! JSON Trace Sink
//!
//! Outputs execution events as NDJSON for tooling and replay.

use crate::domain::ports::{ExecutionEvent, ExecutionObserver};
use serde_json::json;
use std::io::{self, Write};
use std::sync::Mutex;

/// Observer that writes one JSON object per execution event
pub struct JsonTraceSink {
    /// Mutex to ensure thread-safe writes
    writer: Mutex<Box<dyn Write + Send>>,
    detailed: bool,
}

impl JsonTraceSink {
    /// Create a trace sink writing to stderr
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    /// Create a trace sink writing to a custom writer
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            detailed: true,
        }
    }

    /// Builder: only frame, issue, proposal and error events
    pub fn summary_only(mut self) -> Self {
        self.detailed = false;
        self
    }

    fn write_event(&self, event: serde_json::Value) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", event);
            let _ = writer.flush();
        }
    }
}

impl ExecutionObserver for JsonTraceSink {
    fn on_event(&self, event: &ExecutionEvent) {
        let json = match event {
            ExecutionEvent::FrameEntered { depth, owner } => json!({
                "event": "frame_enter",
                "depth": depth,
                "owner": owner,
            }),

            ExecutionEvent::FrameExited { depth, owner } => json!({
                "event": "frame_exit",
                "depth": depth,
                "owner": owner,
            }),

            ExecutionEvent::FactComputed {
                fact,
                value,
                elapsed,
                cached,
            } => json!({
                "event": "fact",
                "fact": fact,
                "value": value,
                "elapsed_us": elapsed.as_micros() as u64,
                "cached": cached,
            }),

            ExecutionEvent::VariableRead { name, value } => json!({
                "event": "variable_read",
                "name": name,
                "value": value,
            }),

            ExecutionEvent::VariableWritten { name, value } => json!({
                "event": "variable_write",
                "name": name,
                "value": value,
            }),

            ExecutionEvent::PropertyAssigned {
                path,
                value,
                skipped,
            } => json!({
                "event": "assign",
                "path": path,
                "value": value,
                "skipped": skipped,
            }),

            ExecutionEvent::IssueRaised { issue } => json!({
                "event": "issue",
                "issue": issue,
            }),

            ExecutionEvent::ProposalPushed { proposal } => json!({
                "event": "proposal",
                "proposal": proposal,
            }),

            ExecutionEvent::ErrorCaught { asset, message } => json!({
                "event": "error",
                "asset": asset,
                "message": message,
            }),
        };

        self.write_event(json);
    }

    fn wants_detailed_events(&self) -> bool {
        self.detailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{DefinitionKind, DefinitionRef};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct TestWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl TestWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    buffer: buffer.clone(),
                },
                buffer,
            )
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn lines(buffer: &Arc<Mutex<Vec<u8>>>) -> Vec<Value> {
        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn trace_sink_writes_one_line_per_event() {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonTraceSink::with_writer(writer);

        sink.on_event(&ExecutionEvent::FrameEntered {
            depth: 1,
            owner: DefinitionRef::new(DefinitionKind::Rule, "r1"),
        });
        sink.on_event(&ExecutionEvent::FactComputed {
            fact: DefinitionRef::new(DefinitionKind::Fact, "isAlive"),
            value: Value::Bool(true),
            elapsed: Duration::from_micros(42),
            cached: false,
        });

        let events = lines(&buffer);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "frame_enter");
        assert_eq!(events[0]["owner"]["id"], "r1");
        assert_eq!(events[1]["event"], "fact");
        assert_eq!(events[1]["elapsed_us"], 42);
        assert_eq!(events[1]["value"], true);
    }

    #[test]
    fn summary_sink_declines_details() {
        let (writer, _) = TestWriter::new();
        assert!(JsonTraceSink::with_writer(writer).wants_detailed_events());
        let (writer, _) = TestWriter::new();
        assert!(!JsonTraceSink::with_writer(writer)
            .summary_only()
            .wants_detailed_events());
    }
}
