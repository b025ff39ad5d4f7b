use std::cell::RefCell;

use super::{FileOperation, GraphEvent, MeshPhase};
use crate::io::IoStatus;

/// Receiver of a node's diagnostics. Every method defaults to doing nothing.
pub trait DiagnosticsListener {
    fn on_compilation_begin(&self) {}

    fn on_compilation_error(&self, _line: u32, _message: &str, _token: &str) {}

    fn on_compilation_end(&self, _success: bool) {}

    fn on_file_operation(&self, _kind: FileOperation, _status: IoStatus, _path: &str, _message: &str) {}

    fn on_source_loaded(&self, _path: &str, _len: usize) {}

    fn on_mesh_operation(&self, _phase: MeshPhase) {}
}

/// Listener that keeps every event it receives, for editors that render a
/// log panel and for tests.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: RefCell<Vec<GraphEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<GraphEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn errors(&self) -> Vec<GraphEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.is_error())
            .cloned()
            .collect()
    }

    /// The recorded events as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.events.borrow())
    }

    fn push(&self, event: GraphEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl DiagnosticsListener for RecordingListener {
    fn on_compilation_begin(&self) {
        self.push(GraphEvent::CompilationBegin);
    }

    fn on_compilation_error(&self, line: u32, message: &str, token: &str) {
        self.push(GraphEvent::CompilationError {
            line,
            message: message.to_owned(),
            token: token.to_owned(),
        });
    }

    fn on_compilation_end(&self, success: bool) {
        self.push(GraphEvent::CompilationEnd { success });
    }

    fn on_file_operation(&self, kind: FileOperation, status: IoStatus, path: &str, message: &str) {
        self.push(GraphEvent::FileOperation {
            kind,
            status,
            path: path.to_owned(),
            message: message.to_owned(),
        });
    }

    fn on_source_loaded(&self, path: &str, len: usize) {
        self.push(GraphEvent::SourceLoaded {
            path: path.to_owned(),
            len,
        });
    }

    fn on_mesh_operation(&self, phase: MeshPhase) {
        self.push(GraphEvent::MeshOperation { phase });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_tagged_json() {
        let listener = RecordingListener::new();
        listener.on_compilation_begin();
        listener.on_compilation_error(12, "missing entry point `main`", "main");
        listener.on_compilation_end(false);

        let json = listener.to_json().unwrap();
        assert!(json.starts_with(r#"[{"event":"compilation_begin"}"#));
        assert!(json.contains(r#""event":"compilation_error","line":12"#));
        assert!(json.contains(r#"{"event":"compilation_end","success":false}"#));
    }

    #[test]
    fn errors_filters_failures() {
        let listener = RecordingListener::new();
        listener.on_mesh_operation(MeshPhase::Begin);
        listener.on_mesh_operation(MeshPhase::EndFailure);
        listener.on_file_operation(FileOperation::SaveSuccess, IoStatus::None, "a.vs", "");

        assert_eq!(listener.len(), 3);
        assert_eq!(
            listener.errors(),
            vec![GraphEvent::MeshOperation {
                phase: MeshPhase::EndFailure
            }]
        );
        assert_eq!(listener.take().len(), 3);
        assert!(listener.is_empty());
    }
}
