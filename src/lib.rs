//! Robust **Constructive Solid Geometry** (union, difference, intersection)
//! and mesh repair over half-edge boundary representations.
//!
//! The crate is built in layers:
//! - [`mesh`]: the half-edge arena ([`MeshSet`]), point welding, twin
//!   pairing, and shell splitting.
//! - [`validate`] and [`repair`]: detect and fix degenerate edges, fins,
//!   zero-area faces, coplanar fragmentation, and open edges.
//! - [`bsp`] and [`kernel`]: the boolean kernel proper, behind the
//!   [`BooleanKernel`] trait.
//! - [`csg`]: the [`CsgEngine`] orchestrator with normalization, operand
//!   repair, retries, and a never-panic fallback policy.
//!
//! # Features
//! - **f64** (default): use f64 as Real
//! - **f32**: use f32 as Real, this conflicts with f64

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod bsp;
pub mod csg;
pub mod errors;
pub mod float_types;
pub mod geometry;
pub mod kernel;
pub mod mesh;
pub mod repair;
pub mod settings;
pub mod shapes;
pub mod telemetry;
pub mod triangulate;
pub mod validate;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use bsp::ClassifyStrategy;
pub use csg::normalize::MeshNormalizer;
pub use csg::{CsgEngine, CsgOutcome};
pub use errors::CsgError;
pub use kernel::{BoolOp, BooleanKernel, BspKernel};
pub use mesh::{Mesh, MeshSet, Plane};
pub use repair::{retriangulate, simplify};
pub use settings::{CsgOperationParams, GeomProcessingParams, GeometrySettings};
pub use telemetry::{DiagnosticSink, NullSink, Severity, TracingSink};
pub use validate::{MeshSetInfo, validate};
