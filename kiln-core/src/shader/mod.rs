//! Shader Graph
//!
//! Three node kinds cooperate to turn text into linked GPU programs:
//!
//! - [`ShaderSource`]: a text fragment that stages include,
//! - [`ShaderStage`]: one typed stage, compiled from its includes followed by
//!   its own text,
//! - [`ProgramLinkage`]: a program linked from at most one stage per kind.
//!
//! Editing a source invalidates every stage that includes it and every
//! program linking those stages. Nothing recompiles until a program (or an
//! explicit [`ShaderStage::compile`]) pulls.

mod program;
mod source;
mod stage;

pub use program::ProgramLinkage;
pub use source::ShaderSource;
pub use stage::{ShaderStage, INCLUDE_SLOT};

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::graph::Slot;

/// Pipeline stage a shader compiles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Vertex,
    Fragment,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Compute,
}

impl StageKind {
    pub const ALL: [StageKind; 6] = [
        StageKind::Vertex,
        StageKind::Fragment,
        StageKind::TessellationControl,
        StageKind::TessellationEvaluation,
        StageKind::Geometry,
        StageKind::Compute,
    ];

    /// File extension used for sources of this stage, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            StageKind::Vertex => "vs",
            StageKind::Fragment => "ps",
            StageKind::TessellationControl => "tcs",
            StageKind::TessellationEvaluation => "tes",
            StageKind::Geometry => "gs",
            StageKind::Compute => "cs",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(extension))
    }

    /// Infer the stage from a file name such as `shaders/sky.ps`.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::TessellationControl => "tessellation control",
            StageKind::TessellationEvaluation => "tessellation evaluation",
            StageKind::Geometry => "geometry",
            StageKind::Compute => "compute",
        }
    }

    /// Program slot holding the stage of this kind.
    pub fn slot(self) -> Slot {
        Slot::named(match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::TessellationControl => "tess_control",
            StageKind::TessellationEvaluation => "tess_evaluation",
            StageKind::Geometry => "geometry",
            StageKind::Compute => "compute",
        })
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_round_trip() {
        for kind in StageKind::ALL {
            assert_eq!(StageKind::from_extension(kind.extension()), Some(kind));
        }
        assert_eq!(StageKind::from_extension("txt"), None);
    }

    #[test]
    fn stage_from_path() {
        assert_eq!(StageKind::from_path("shaders/sky.ps"), Some(StageKind::Fragment));
        assert_eq!(StageKind::from_path("terrain.TES"), Some(StageKind::TessellationEvaluation));
        assert_eq!(StageKind::from_path("common.h"), None);
        assert_eq!(StageKind::from_path("no_extension"), None);
    }

    #[test]
    fn slots_are_distinct() {
        let slots: std::collections::HashSet<_> =
            StageKind::ALL.iter().map(|kind| kind.slot()).collect();
        assert_eq!(slots.len(), 6);
    }
}
