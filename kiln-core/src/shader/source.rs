use std::any::Any;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::context::GraphContext;
use crate::error::{GraphError, InvariantViolation, Result};
use crate::events::{FileOperation, GraphEvent};
use crate::graph::{expect_kind, Artifact, GenerateContext, Generator, Node, NodeRef};
use crate::io::IoStatus;

/// Editable text plus the file it came from.
#[derive(Debug, Clone)]
pub(crate) struct SourceText {
    text: Rc<str>,
    path: Option<PathBuf>,
}

impl SourceText {
    pub(crate) fn new() -> Self {
        Self {
            text: Rc::from(""),
            path: None,
        }
    }

    pub(crate) fn text(&self) -> &Rc<str> {
        &self.text
    }

    pub(crate) fn set_text(&mut self, text: &str) -> bool {
        if &*self.text == text {
            return false;
        }
        self.text = Rc::from(text);
        true
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }
}

/// Read `path` through the context's I/O manager, reporting the outcome on
/// `node`'s listener. On failure nothing about the node changes.
pub(crate) fn load_text(node: &Node, context: &GraphContext, path: &Path) -> Result<String> {
    let loaded = context
        .io()
        .open_file_to_buffer(path)
        .and_then(|buffer| String::from_utf8(buffer).map_err(|_| IoStatus::IoError));

    match loaded {
        Ok(text) => {
            debug!(node = %node.id(), path = %path.display(), bytes = text.len(), "loaded source");
            node.emit(GraphEvent::SourceLoaded {
                path: path.display().to_string(),
                len: text.len(),
            });
            Ok(text)
        }
        Err(status) => {
            node.emit(GraphEvent::FileOperation {
                kind: FileOperation::LoadError,
                status,
                path: path.display().to_string(),
                message: "Io error".to_owned(),
            });
            Err(GraphError::Io {
                path: path.to_path_buf(),
                status,
            })
        }
    }
}

/// Write `text` back to `path`, reporting success or failure on `node`'s
/// listener.
pub(crate) fn save_text(node: &Node, context: &GraphContext, path: &Path, text: &str) -> Result<()> {
    let saved = context.io().save_file_from_buffer(path, text.as_bytes());
    let (kind, status) = match saved {
        Ok(()) => (FileOperation::SaveSuccess, IoStatus::None),
        Err(status) => (FileOperation::SaveError, status),
    };
    node.emit(GraphEvent::FileOperation {
        kind,
        status,
        path: path.display().to_string(),
        message: match kind {
            FileOperation::SaveSuccess => "Saved".to_owned(),
            _ => "Io error".to_owned(),
        },
    });
    match saved {
        Ok(()) => Ok(()),
        Err(status) => Err(GraphError::Io {
            path: path.to_path_buf(),
            status,
        }),
    }
}

struct SourceGenerator {
    source: SourceText,
}

impl Generator for SourceGenerator {
    fn generate(&mut self, _cx: &mut GenerateContext<'_>) -> Result<Artifact> {
        Ok(Artifact::Source(Rc::clone(self.source.text())))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed handle to a shader text fragment shared by stages through includes.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    node: NodeRef,
    context: Rc<GraphContext>,
}

impl ShaderSource {
    pub const KIND: &'static str = "ShaderSource";

    pub fn create(context: &Rc<GraphContext>) -> Self {
        let generator = SourceGenerator {
            source: SourceText::new(),
        };
        Self {
            node: Node::new(Self::KIND, generator),
            context: Rc::clone(context),
        }
    }

    pub fn from_node(node: NodeRef, context: &Rc<GraphContext>) -> Result<Self> {
        expect_kind(&node, Self::KIND)?;
        Ok(Self {
            node,
            context: Rc::clone(context),
        })
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn into_node(self) -> NodeRef {
        self.node
    }

    pub fn source(&self) -> Result<Rc<str>> {
        self.node
            .with_generator(|g: &SourceGenerator| Rc::clone(g.source.text()))
    }

    pub fn path(&self) -> Result<Option<PathBuf>> {
        self.node
            .with_generator(|g: &SourceGenerator| g.source.path().map(Path::to_path_buf))
    }

    /// Replace the text. Every including stage and its programs are
    /// invalidated when the text changes.
    pub fn set_source(&self, text: &str) -> Result<()> {
        let changed = self
            .node
            .with_generator_mut(|g: &mut SourceGenerator| g.source.set_text(text))?;
        if changed {
            self.node.invalidate();
        }
        Ok(())
    }

    /// Load the text from a file and remember the path for [`save_file`](Self::save_file).
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = load_text(&self.node, &self.context, path)?;
        self.node.with_generator_mut(|g: &mut SourceGenerator| {
            g.source.set_path(path.to_path_buf());
        })?;
        self.set_source(&text)
    }

    pub fn save_file(&self) -> Result<()> {
        let (path, text) = self.node.with_generator(|g: &SourceGenerator| {
            (g.source.path().map(Path::to_path_buf), Rc::clone(g.source.text()))
        })?;
        let path = path.ok_or(InvariantViolation::NoSourcePath(self.node.id()))?;
        save_text(&self.node, &self.context, &path, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_data_tracks_edits() {
        let context = Rc::new(GraphContext::headless());
        let include = ShaderSource::create(&context);
        include.set_source("float PI = 3.14;").unwrap();

        let (data, updated) = include.node().get_updated_data().unwrap();
        assert!(updated);
        assert_eq!(data.source(), Some("float PI = 3.14;"));

        include.set_source("float PI = 3.14;").unwrap();
        assert!(!include.node().is_dirty());

        include.set_source("float TAU = 6.28;").unwrap();
        assert!(include.node().is_dirty());
        assert!(!data.is_valid());
    }

    #[test]
    fn save_without_path_is_rejected() {
        let context = Rc::new(GraphContext::headless());
        let include = ShaderSource::create(&context);
        let err = include.save_file().unwrap_err();
        assert!(matches!(
            err,
            GraphError::Invariant(InvariantViolation::NoSourcePath(_))
        ));
    }
}
