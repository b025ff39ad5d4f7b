use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, warn};

use super::{DiagnosticsListener, GraphEvent};
use crate::graph::NodeId;

/// Per-node slot holding the node's listener.
#[derive(Default)]
pub struct EventDispatcher {
    listener: RefCell<Option<Rc<dyn DiagnosticsListener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener, returning the one it replaces.
    pub fn set_listener(
        &self,
        listener: Rc<dyn DiagnosticsListener>,
    ) -> Option<Rc<dyn DiagnosticsListener>> {
        self.listener.replace(Some(listener))
    }

    pub fn clear_listener(&self) -> Option<Rc<dyn DiagnosticsListener>> {
        self.listener.take()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.borrow().is_some()
    }

    /// Log the event and hand it to the listener, if any.
    pub fn dispatch(&self, node: NodeId, event: GraphEvent) {
        match &event {
            GraphEvent::CompilationError { line, message, token } => {
                error!(%node, line, token = %token, "compilation error: {message}");
            }
            GraphEvent::FileOperation { kind, status, path, message } if event.is_error() => {
                warn!(%node, ?kind, %status, path = %path, "{message}");
            }
            other => debug!(%node, event = ?other, "dispatching event"),
        }

        // Clone out so the listener may swap itself while handling the event.
        let Some(listener) = self.listener.borrow().clone() else {
            return;
        };
        match event {
            GraphEvent::CompilationBegin => listener.on_compilation_begin(),
            GraphEvent::CompilationError { line, message, token } => {
                listener.on_compilation_error(line, &message, &token)
            }
            GraphEvent::CompilationEnd { success } => listener.on_compilation_end(success),
            GraphEvent::FileOperation {
                kind,
                status,
                path,
                message,
            } => listener.on_file_operation(kind, status, &path, &message),
            GraphEvent::SourceLoaded { path, len } => listener.on_source_loaded(&path, len),
            GraphEvent::MeshOperation { phase } => listener.on_mesh_operation(phase),
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_listener", &self.has_listener())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FileOperation, RecordingListener};
    use crate::io::IoStatus;

    #[test]
    fn dispatch_without_listener_is_silent() {
        let dispatcher = EventDispatcher::new();
        dispatcher.dispatch(NodeId::from(1), GraphEvent::CompilationBegin);
        assert!(!dispatcher.has_listener());
    }

    #[test]
    fn events_reach_listener_in_order() {
        let dispatcher = EventDispatcher::new();
        let listener = Rc::new(RecordingListener::new());
        dispatcher.set_listener(listener.clone());

        let node = NodeId::from(2);
        dispatcher.dispatch(node, GraphEvent::CompilationBegin);
        dispatcher.dispatch(
            node,
            GraphEvent::CompilationError {
                line: 3,
                message: "unexpected `}`".into(),
                token: "}".into(),
            },
        );
        dispatcher.dispatch(node, GraphEvent::CompilationEnd { success: false });

        let events = listener.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], GraphEvent::CompilationBegin);
        assert!(matches!(events[1], GraphEvent::CompilationError { line: 3, .. }));
        assert_eq!(events[2], GraphEvent::CompilationEnd { success: false });
    }

    #[test]
    fn replacing_listener_redirects_events() {
        let dispatcher = EventDispatcher::new();
        let first = Rc::new(RecordingListener::new());
        let second = Rc::new(RecordingListener::new());

        dispatcher.set_listener(first.clone());
        let previous = dispatcher.set_listener(second.clone());
        assert!(previous.is_some());

        dispatcher.dispatch(
            NodeId::from(3),
            GraphEvent::FileOperation {
                kind: FileOperation::LoadError,
                status: IoStatus::FileNotFound,
                path: "a.ps".into(),
                message: "Io error".into(),
            },
        );
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);

        dispatcher.clear_listener();
        dispatcher.dispatch(NodeId::from(4), GraphEvent::CompilationBegin);
        assert_eq!(second.len(), 1);
    }
}
