//! GPU Backend
//!
//! The graph never issues graphics-API calls itself. Compiling, linking,
//! uploading and destroying go through a [`GpuBackend`] held by the
//! [`GraphContext`](crate::GraphContext); whether a call succeeds decides
//! whether the node's data is valid.
//!
//! [`HeadlessBackend`] is a software stand-in used by tests, tools and hosts
//! running without a device. It hands out opaque handles, tracks which are
//! live, and runs a small syntax check over shader text so compile failures
//! can be exercised end to end.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::{trace, warn};

use crate::mesh::MeshData;
use crate::shader::StageKind;

/// Opaque handle to a GPU-side object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GpuHandle(u32);

impl GpuHandle {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for GpuHandle {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for GpuHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu#{}", self.0)
    }
}

/// One compiler or linker message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileDiagnostic {
    /// 1-based source line, 0 when the message has no location.
    pub line: u32,
    pub message: String,
    /// The offending token, if any.
    pub token: String,
}

impl CompileDiagnostic {
    pub fn new(line: u32, message: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            token: token.into(),
        }
    }
}

/// Graphics device operations used by nodes.
pub trait GpuBackend {
    fn compile_stage(
        &self,
        stage: StageKind,
        source: &str,
    ) -> Result<GpuHandle, Vec<CompileDiagnostic>>;

    fn link_program(
        &self,
        stages: &[(StageKind, GpuHandle)],
    ) -> Result<GpuHandle, Vec<CompileDiagnostic>>;

    fn upload_mesh(&self, mesh: &MeshData) -> Result<GpuHandle, String>;

    /// Free a handle. Unknown handles are ignored.
    fn destroy(&self, handle: GpuHandle);
}

/// Device-less [`GpuBackend`].
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next: Cell<u32>,
    live: RefCell<HashSet<GpuHandle>>,
    compiles: Cell<u32>,
    links: Cell<u32>,
    uploads: Cell<u32>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> GpuHandle {
        let raw = self.next.get() + 1;
        self.next.set(raw);
        let handle = GpuHandle(raw);
        self.live.borrow_mut().insert(handle);
        handle
    }

    pub fn is_live(&self, handle: GpuHandle) -> bool {
        self.live.borrow().contains(&handle)
    }

    /// Handles allocated and not yet destroyed.
    pub fn live_handles(&self) -> usize {
        self.live.borrow().len()
    }

    /// Number of successful stage compilations.
    pub fn compile_count(&self) -> u32 {
        self.compiles.get()
    }

    /// Number of successful program links.
    pub fn link_count(&self) -> u32 {
        self.links.get()
    }

    pub fn upload_count(&self) -> u32 {
        self.uploads.get()
    }
}

impl GpuBackend for HeadlessBackend {
    fn compile_stage(
        &self,
        stage: StageKind,
        source: &str,
    ) -> Result<GpuHandle, Vec<CompileDiagnostic>> {
        let diagnostics = check_syntax(source);
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        self.compiles.set(self.compiles.get() + 1);
        let handle = self.allocate();
        trace!(%stage, %handle, "compiled stage");
        Ok(handle)
    }

    fn link_program(
        &self,
        stages: &[(StageKind, GpuHandle)],
    ) -> Result<GpuHandle, Vec<CompileDiagnostic>> {
        let mut diagnostics: Vec<_> = stages
            .iter()
            .filter(|(_, handle)| !self.is_live(*handle))
            .map(|(stage, handle)| {
                CompileDiagnostic::new(0, format!("{stage} stage handle {handle} is not live"), "")
            })
            .collect();

        let has = |kind: StageKind| stages.iter().any(|(stage, _)| *stage == kind);
        if has(StageKind::Compute) {
            if stages.len() > 1 {
                diagnostics.push(CompileDiagnostic::new(
                    0,
                    "a compute stage cannot be linked with other stages",
                    "",
                ));
            }
        } else {
            for required in [StageKind::Vertex, StageKind::Fragment] {
                if !has(required) {
                    diagnostics.push(CompileDiagnostic::new(
                        0,
                        format!("program has no {required} stage"),
                        "",
                    ));
                }
            }
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        self.links.set(self.links.get() + 1);
        let handle = self.allocate();
        trace!(%handle, stages = stages.len(), "linked program");
        Ok(handle)
    }

    fn upload_mesh(&self, mesh: &MeshData) -> Result<GpuHandle, String> {
        if mesh.vertex_count() == 0 {
            return Err("mesh has no vertices".to_owned());
        }
        mesh.validate().map_err(|err| err.to_string())?;
        self.uploads.set(self.uploads.get() + 1);
        let handle = self.allocate();
        let configuration = mesh.configuration();
        trace!(
            %handle,
            vertices = mesh.vertex_count(),
            primitive = ?configuration.primitive,
            indexed = configuration.indexed,
            "uploaded mesh"
        );
        Ok(handle)
    }

    fn destroy(&self, handle: GpuHandle) {
        if !self.live.borrow_mut().remove(&handle) {
            warn!(%handle, "destroying unknown gpu handle");
        }
    }
}

/// Brace and parenthesis matching plus an entry-point check. Text after `//`
/// on a line is ignored.
fn check_syntax(source: &str) -> Vec<CompileDiagnostic> {
    let mut diagnostics = Vec::new();
    let mut open: Vec<(char, u32)> = Vec::new();
    let mut has_main = false;

    for (number, line) in source.lines().enumerate() {
        let line_no = number as u32 + 1;
        let code = line.split("//").next().unwrap_or_default();

        has_main |= code
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|word| word == "main");

        for c in code.chars() {
            match c {
                '{' | '(' => open.push((c, line_no)),
                '}' | ')' => {
                    let expected = if c == '}' { '{' } else { '(' };
                    match open.pop() {
                        Some((opener, _)) if opener == expected => {}
                        _ => diagnostics.push(CompileDiagnostic::new(
                            line_no,
                            format!("unexpected `{c}`"),
                            c.to_string(),
                        )),
                    }
                }
                _ => {}
            }
        }
    }

    for (opener, line) in open {
        diagnostics.push(CompileDiagnostic::new(
            line,
            format!("unterminated `{opener}`"),
            opener.to_string(),
        ));
    }
    if !has_main {
        diagnostics.push(CompileDiagnostic::new(1, "missing entry point `main`", "main"));
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshConfiguration, PrimitiveType, Vertex};

    const VALID: &str = "void main() {\n    gl_Position = vec4(0.0);\n}\n";

    #[test]
    fn valid_source_compiles() {
        let backend = HeadlessBackend::new();
        let handle = backend.compile_stage(StageKind::Vertex, VALID).unwrap();
        assert!(backend.is_live(handle));
        assert_eq!(backend.compile_count(), 1);
    }

    #[test]
    fn unbalanced_braces_report_lines() {
        let source = "void main() {\n    x = 1;\n}\n}\n";
        let diagnostics = check_syntax(source);
        assert_eq!(diagnostics, vec![CompileDiagnostic::new(4, "unexpected `}`", "}")]);

        let diagnostics = check_syntax("void main() {\n");
        assert_eq!(diagnostics[0].line, 1);
        assert_eq!(diagnostics[0].message, "unterminated `{`");
    }

    #[test]
    fn comments_are_ignored() {
        assert!(check_syntax("void main() { // }}}\n}\n").is_empty());
        let diagnostics = check_syntax("// void main() {}\n");
        assert_eq!(diagnostics[0].message, "missing entry point `main`");
    }

    #[test]
    fn link_requires_vertex_and_fragment() {
        let backend = HeadlessBackend::new();
        let vs = backend.compile_stage(StageKind::Vertex, VALID).unwrap();
        let errors = backend.link_program(&[(StageKind::Vertex, vs)]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("fragment"));

        let ps = backend.compile_stage(StageKind::Fragment, VALID).unwrap();
        let program = backend
            .link_program(&[(StageKind::Vertex, vs), (StageKind::Fragment, ps)])
            .unwrap();
        assert!(backend.is_live(program));
        assert_eq!(backend.link_count(), 1);
    }

    #[test]
    fn compute_links_alone() {
        let backend = HeadlessBackend::new();
        let cs = backend.compile_stage(StageKind::Compute, VALID).unwrap();
        assert!(backend.link_program(&[(StageKind::Compute, cs)]).is_ok());

        let vs = backend.compile_stage(StageKind::Vertex, VALID).unwrap();
        assert!(backend
            .link_program(&[(StageKind::Compute, cs), (StageKind::Vertex, vs)])
            .is_err());
    }

    #[test]
    fn destroyed_handles_cannot_link() {
        let backend = HeadlessBackend::new();
        let vs = backend.compile_stage(StageKind::Vertex, VALID).unwrap();
        let ps = backend.compile_stage(StageKind::Fragment, VALID).unwrap();
        backend.destroy(ps);
        assert_eq!(backend.live_handles(), 1);

        let errors = backend
            .link_program(&[(StageKind::Vertex, vs), (StageKind::Fragment, ps)])
            .unwrap_err();
        assert!(errors[0].message.contains("not live"));
    }

    #[test]
    fn empty_mesh_upload_fails() {
        let backend = HeadlessBackend::new();
        assert!(backend.upload_mesh(&MeshData::default()).is_err());
        assert_eq!(backend.upload_count(), 0);
    }

    #[test]
    fn incomplete_primitives_are_rejected() {
        let backend = HeadlessBackend::new();
        let mut mesh = MeshData::default();
        mesh.push_vertex(Vertex::default()).unwrap();
        mesh.push_vertex(Vertex::default()).unwrap();
        mesh.push_index(0);
        mesh.push_index(1);
        assert!(backend.upload_mesh(&mesh).is_err());

        let mut lines = MeshData::with_configuration(MeshConfiguration {
            primitive: PrimitiveType::Line,
            ..MeshConfiguration::default()
        });
        lines.push_vertex(Vertex::default()).unwrap();
        lines.push_vertex(Vertex::default()).unwrap();
        lines.push_index(0);
        lines.push_index(1);
        assert!(backend.upload_mesh(&lines).is_ok());
        assert_eq!(backend.upload_count(), 1);
    }
}
