//! Error and diagnostic types for vertexbake.
//!
//! Fatal conditions are reported through [`BakeError`]. Per-triangle anomalies
//! that the pipeline recovers from are collected as [`Diagnostic`] values and
//! returned alongside the result.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::mesh::{ChartId, TriangleId, VertexId};

/// Result type alias using [`BakeError`].
pub type Result<T> = std::result::Result<T, BakeError>;

/// Errors that abort a conversion.
#[derive(Error, Debug)]
pub enum BakeError {
    /// The input mesh fails a structural precondition.
    #[error("invalid mesh: {0}")]
    InvalidMesh(InvalidMeshReason),

    /// The charts do not fit within the largest allowed atlas.
    #[error(
        "atlas overflow: charts need {required_area} texels but a {resolution}x{resolution} atlas cannot hold them"
    )]
    AtlasOverflow {
        /// The largest resolution that was attempted.
        resolution: u32,
        /// Total padded chart area in texels at that resolution.
        required_area: u64,
    },

    /// An internal packer invariant was violated.
    #[error("packing invariant violated: {0}")]
    PackingFailure(String),

    /// The linear solver failed to converge.
    #[error("solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Invalid option value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading a mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving an asset to file.
    #[error("failed to save {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Image encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl BakeError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        BakeError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

impl From<InvalidMeshReason> for BakeError {
    fn from(reason: InvalidMeshReason) -> Self {
        BakeError::InvalidMesh(reason)
    }
}

/// Why an input mesh was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidMeshReason {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face is not a triangle.
    #[error("face {face} has {count} vertices, expected 3")]
    NonTriangleFace {
        /// The face index.
        face: usize,
        /// Number of vertices in the face.
        count: usize,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} references invalid vertex index {vertex}")]
    IndexOutOfRange {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face uses the same vertex twice.
    #[error("face {face} repeats a vertex index")]
    RepeatedIndex {
        /// The face index.
        face: usize,
    },

    /// The number of colors does not match the number of positions.
    #[error("{colors} colors for {positions} vertices")]
    ColorCountMismatch {
        /// Number of positions.
        positions: usize,
        /// Number of colors.
        colors: usize,
    },

    /// Colors do not all carry the same number of channels, or the count is not 3 or 4.
    #[error("vertex {vertex} has {found} color channels, expected {expected}")]
    InconsistentChannels {
        /// Offending vertex.
        vertex: usize,
        /// Expected channel count.
        expected: usize,
        /// Channel count found.
        found: usize,
    },

    /// A position or color component is NaN or infinite.
    #[error("vertex {vertex} has a non-finite component")]
    NonFiniteValue {
        /// Offending vertex.
        vertex: usize,
    },

    /// The mesh, or the rewritten mesh with its seam duplicates, has more
    /// elements than a 32-bit index can address.
    #[error("{vertices} vertices and {triangles} triangles exceed 32-bit indexing")]
    TooLarge {
        /// Number of vertices.
        vertices: usize,
        /// Number of triangles.
        triangles: usize,
    },
}

/// Pipeline stage that produced a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticStage {
    /// Chart building.
    Charting,
    /// Texel rasterization.
    Baking,
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticStage::Charting => f.write_str("charting"),
            DiagnosticStage::Baking => f.write_str("baking"),
        }
    }
}

/// A recoverable anomaly recorded during conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A triangle has zero area in 3D or in its placed UV footprint.
    ///
    /// The triangle contributes no texels; its corners still receive a UV.
    DegenerateGeometry {
        /// The triangle.
        triangle: TriangleId,
        /// Where it was detected.
        stage: DiagnosticStage,
    },

    /// An edge is shared by more than two triangles and was treated as a seam.
    NonManifoldEdge {
        /// First vertex of the edge (smaller index).
        v0: VertexId,
        /// Second vertex of the edge.
        v1: VertexId,
        /// Number of incident triangles.
        faces: usize,
    },

    /// The conformal solve was rejected and the chart was projected onto its plane.
    FlatteningFallback {
        /// The chart.
        chart: ChartId,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DegenerateGeometry { triangle, stage } => {
                write!(f, "degenerate triangle {} skipped during {}", triangle.index(), stage)
            }
            Diagnostic::NonManifoldEdge { v0, v1, faces } => write!(
                f,
                "edge ({}, {}) has {} incident faces, treated as seam",
                v0.index(),
                v1.index(),
                faces
            ),
            Diagnostic::FlatteningFallback { chart } => {
                write!(f, "chart {} fell back to planar projection", chart.index())
            }
        }
    }
}
