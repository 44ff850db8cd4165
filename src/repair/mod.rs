//! Mesh repair and simplification pipeline.
//!
//! [`simplify`] runs a fixed sequence of repair steps, validating after
//! each one. A step whose output is worse than its input, judged by the
//! open/closed edge tie-break in [`crate::validate::is_better`], is
//! discarded wholesale. The pipeline never returns something worse than
//! what it was given.

pub mod collapse;
pub mod coplanar;
pub mod degenerate;
pub mod fins;
pub mod open_edges;

use crate::errors::CsgError;
use crate::mesh::MeshSet;
use crate::settings::{GeomProcessingParams, GeometrySettings};
use crate::telemetry::{DiagnosticSink, Severity};
use crate::triangulate::triangulate_face;
use crate::validate::{is_better, validate};

/// Re-triangulate every face of every shell and rebuild the set.
/// Faces that fail to triangulate (collinear loops) drop out; their
/// neighbors' open edges are then the open-edge step's problem.
pub fn retriangulate(set: &MeshSet, settings: &GeometrySettings) -> MeshSet {
    let mut loops = Vec::new();
    for mesh in &set.meshes {
        for face in mesh.alive_faces() {
            let pts = mesh.face_points(face, &set.points);
            if pts.len() == 3 {
                loops.push(pts);
                continue;
            }
            for tri in triangulate_face(&pts) {
                loops.push(vec![pts[tri[0]], pts[tri[1]], pts[tri[2]]]);
            }
        }
    }
    MeshSet::from_face_loops(&loops, settings)
}

/// Run the full repair sequence on a mesh set.
///
/// Steps, in order: fin removal, degenerate-face removal, coplanar
/// merging, aligned-edge collapsing, re-triangulation, open-edge
/// resolution. Each step is accepted only if it does not regress the
/// open/closed edge balance. On a set too large for bounded repair the
/// input is returned untouched.
pub fn simplify(
    set: &MeshSet,
    params: &GeomProcessingParams,
    settings: &GeometrySettings,
    sink: &dyn DiagnosticSink,
) -> MeshSet {
    if set.face_count() > settings.max_repair_faces {
        sink.report(
            Severity::Warning,
            "simplify",
            None,
            &CsgError::CapExceeded {
                what: "face",
                count: set.face_count(),
                cap: settings.max_repair_faces,
            }
            .to_string(),
        );
        return set.clone();
    }

    let mut current = set.clone();
    let (_, mut info) = validate(&mut current, params, settings, sink);

    let mut consider = |current: &mut MeshSet,
                        info: &mut crate::validate::MeshSetInfo,
                        name: &str,
                        mut candidate: MeshSet| {
        let (_, cand_info) = validate(&mut candidate, params, settings, sink);
        if is_better(&cand_info, info) {
            sink.report(
                Severity::Debug,
                "simplify",
                None,
                &format!(
                    "{name}: accepted ({} -> {} open edges)",
                    info.open_edges, cand_info.open_edges
                ),
            );
            *current = candidate;
            *info = cand_info;
        } else {
            sink.report(Severity::Debug, "simplify", None, &format!("{name}: rolled back"));
        }
    };

    // 1. fins
    let mut candidate = current.clone();
    if fins::remove_fins(&mut candidate, settings, sink) {
        consider(&mut current, &mut info, "fin removal", candidate);
    }

    // 2. degenerate faces (full rebuild)
    let candidate = degenerate::remove_degenerate_faces(&current, settings, sink);
    consider(&mut current, &mut info, "degenerate removal", candidate);

    // 3. coplanar merge (whole-pass rollback lives inside the step)
    let mut candidate = current.clone();
    if coplanar::merge_coplanar_faces(&mut candidate, settings, sink) {
        consider(&mut current, &mut info, "coplanar merge", candidate);
    }

    // 4. aligned edge collapse
    let mut candidate = current.clone();
    if collapse::collapse_aligned_edges(&mut candidate, settings) {
        consider(&mut current, &mut info, "edge collapse", candidate);
    }

    // 5. re-triangulation
    let candidate = retriangulate(&current, settings);
    consider(&mut current, &mut info, "retriangulation", candidate);

    // 6. open edges, only when something is still open and the count
    // is small enough to bound the search
    if info.open_edges > 0 {
        if info.open_edges > settings.max_open_edges {
            sink.report(
                Severity::Warning,
                "simplify",
                None,
                &CsgError::CapExceeded {
                    what: "open edge",
                    count: info.open_edges,
                    cap: settings.max_open_edges,
                }
                .to_string(),
            );
        } else {
            let candidate = open_edges::resolve_open_edges(&current, settings, sink);
            consider(&mut current, &mut info, "open edge resolution", candidate);
        }
    }

    current
}
