//! Mesh validation pass.
//!
//! [`validate`] walks every shell of a [`MeshSet`] and produces a fresh
//! [`MeshSetInfo`] describing structural and geometric defects. Pointer
//! corruption is fatal for the affected shell; geometric defects are
//! recorded and judged against the caller's tolerance flags.

use crate::float_types::Real;
use crate::mesh::MeshSet;
use crate::settings::{GeomProcessingParams, GeometrySettings};
use crate::telemetry::{DiagnosticSink, Severity};
use std::fmt;

/// Snapshot of one validation pass. Recomputed each call, never cached
/// on the mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSetInfo {
    /// False when any shell has corrupt half-edge pointers.
    pub pointer_ok: bool,
    pub open_edges: usize,
    pub closed_edges: usize,
    pub degenerate_edges: usize,
    pub zero_area_faces: usize,
    pub fin_edges: usize,
    pub fin_faces: usize,
    pub face_count: usize,
    pub vertex_count: usize,
    /// Shells whose volume stayed negative after the inversion retry.
    pub negative_meshes: usize,
    pub surface_area: Real,
    pub total_volume: Real,
    pub valid: bool,
}

impl fmt::Display for MeshSetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "mesh set: {} ({} faces, {} vertices)",
            if self.valid { "valid" } else { "invalid" },
            self.face_count,
            self.vertex_count
        )?;
        writeln!(
            f,
            "  edges: {} closed, {} open, {} degenerate",
            self.closed_edges, self.open_edges, self.degenerate_edges
        )?;
        writeln!(
            f,
            "  faces: {} zero-area, {} fin edges, {} fin faces",
            self.zero_area_faces, self.fin_edges, self.fin_faces
        )?;
        write!(
            f,
            "  volume {:.6}, area {:.6}, pointers {}, negative shells {}",
            self.total_volume,
            self.surface_area,
            if self.pointer_ok { "ok" } else { "corrupt" },
            self.negative_meshes
        )
    }
}

/// Lexicographic quality ordering used to decide whether a repaired or
/// retried candidate replaces the current one: fewer open edges wins
/// outright; at equal-or-fewer open edges, at least as many closed
/// edges wins.
pub fn is_better(candidate: &MeshSetInfo, current: &MeshSetInfo) -> bool {
    if !candidate.pointer_ok {
        return false;
    }
    if !current.pointer_ok {
        return true;
    }
    if candidate.open_edges < current.open_edges {
        return true;
    }
    candidate.open_edges <= current.open_edges && candidate.closed_edges >= current.closed_edges
}

/// Check half-edge pointer integrity of one shell. Any failure means no
/// geometry derived from this shell can be trusted.
fn check_pointers(set: &MeshSet, mesh_idx: usize) -> bool {
    let mesh = &set.meshes[mesh_idx];
    let nedges = mesh.edges.len();
    let nfaces = mesh.faces.len();
    for (i, e) in mesh.edges.iter().enumerate() {
        if !e.alive {
            continue;
        }
        if e.next >= nedges || e.prev >= nedges || e.face >= nfaces {
            return false;
        }
        if !mesh.edges[e.next].alive || !mesh.edges[e.prev].alive || !mesh.faces[e.face].alive {
            return false;
        }
        if e.vert >= set.points.len() {
            return false;
        }
        if mesh.edges[e.next].prev != i || mesh.edges[e.prev].next != i {
            return false;
        }
        if let Some(r) = e.rev {
            if r >= nedges || !mesh.edges[r].alive || mesh.edges[r].rev != Some(i) {
                return false;
            }
            // self-referencing twin pair
            if e.next == r && mesh.edges[e.next].next == i {
                return false;
            }
        }
        // neighbors sharing a destination mean the loop visits the same
        // vertex twice, doubling back on itself
        if mesh.edges[e.prev].vert == mesh.edges[e.next].vert {
            return false;
        }
    }
    for (i, f) in mesh.faces.iter().enumerate() {
        if !f.alive {
            continue;
        }
        if f.edge >= nedges || !mesh.edges[f.edge].alive || mesh.edges[f.edge].face != i {
            return false;
        }
        if mesh.face_edges(i).len() != f.edge_count {
            return false;
        }
    }
    true
}

/// Re-orient shells with negative volume. Each offending shell gets one
/// in-place inversion; a shell still negative afterwards is counted as
/// unrecoverable. A re-oriented shell nested inside another shell is a
/// cavity and gets flagged as such. Returns the number of unrecovered
/// shells.
pub fn check_non_negative_and_closed(set: &mut MeshSet) -> usize {
    let mut still_negative = 0;
    let points = std::mem::take(&mut set.points);
    let mut flipped: Vec<usize> = Vec::new();
    for (i, mesh) in set.meshes.iter_mut().enumerate() {
        if mesh.alive_face_count() == 0 {
            continue;
        }
        if mesh.signed_volume(&points) < 0.0 {
            mesh.invert();
            if mesh.signed_volume(&points) < 0.0 {
                still_negative += 1;
            } else {
                flipped.push(i);
            }
        }
    }
    for i in flipped {
        let Some(face) = set.meshes[i].alive_faces().next() else {
            continue;
        };
        let probe = set.meshes[i].face_centroid(face, &points);
        let nested = set
            .meshes
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && other.contains_point(&probe, &points));
        set.meshes[i].is_negative = nested;
    }
    set.points = points;
    still_negative
}

/// Validate a mesh set against the caller's tolerance flags.
///
/// Negative shells are given one inversion retry in place; all other
/// inspection is read-only. Returns the verdict together with the full
/// defect census.
pub fn validate(
    set: &mut MeshSet,
    params: &GeomProcessingParams,
    settings: &GeometrySettings,
    sink: &dyn DiagnosticSink,
) -> (bool, MeshSetInfo) {
    let mut info = MeshSetInfo {
        pointer_ok: true,
        ..MeshSetInfo::default()
    };

    for mesh_idx in 0..set.meshes.len() {
        if !check_pointers(set, mesh_idx) {
            sink.report(
                Severity::Error,
                "validate",
                Some(mesh_idx),
                "half-edge pointer corruption, shell is unusable",
            );
            info.pointer_ok = false;
            // nothing else about this shell can be trusted
            continue;
        }
        let mesh = &set.meshes[mesh_idx];
        info.open_edges += mesh.open_edge_count();
        info.closed_edges += mesh.closed_edge_count();
        info.face_count += mesh.alive_face_count();

        for (i, e) in mesh.edges.iter().enumerate() {
            if !e.alive {
                continue;
            }
            let origin = mesh.edge_origin(i);
            let len = (set.points[e.vert] - set.points[origin]).norm();
            if origin == e.vert || len < settings.eps_merge_points {
                info.degenerate_edges += 1;
            }
        }

        for face in mesh.alive_faces() {
            let area = mesh.face_area(face, &set.points);
            info.surface_area += area;
            if area < settings.min_face_area
                && mesh.face_longest_edge(face, &set.points) < settings.eps_merge_points
            {
                info.zero_area_faces += 1;
                sink.report(
                    Severity::Debug,
                    "validate",
                    Some(face),
                    "zero-area face",
                );
            }
        }

        // fins: normals recomputed from geometry so earlier winding
        // edits cannot hide a fold
        let fin_cos = -settings.coplanar_cos();
        for (i, e) in mesh.edges.iter().enumerate() {
            if !e.alive {
                continue;
            }
            let Some(r) = e.rev else { continue };
            if r < i {
                continue; // count each undirected edge once
            }
            let na = mesh.face_normal(e.face, &set.points);
            let nb = mesh.face_normal(mesh.edges[r].face, &set.points);
            if na.norm_squared() > 0.0 && nb.norm_squared() > 0.0 && na.dot(&nb) < fin_cos {
                info.fin_edges += 1;
                let area_a = mesh.face_area(e.face, &set.points);
                let area_b = mesh.face_area(mesh.edges[r].face, &set.points);
                if area_a > settings.min_face_area && area_b > settings.min_face_area {
                    info.fin_faces += 2;
                }
                sink.report(Severity::Debug, "validate", Some(i), "fin edge");
            }
        }
    }

    info.vertex_count = set.vertex_count();
    if info.pointer_ok {
        info.negative_meshes = check_non_negative_and_closed(set);
        info.total_volume = set.total_volume();
    }

    info.valid = info.pointer_ok
        && info.open_edges == 0
        && (info.degenerate_edges == 0 || params.allow_degenerate_edges)
        && (info.fin_edges == 0 || params.allow_fin_edges)
        && (info.fin_faces == 0 || params.allow_fin_faces_in_result)
        && info.zero_area_faces == 0
        && info.negative_meshes == 0;

    if !info.valid {
        sink.report(
            Severity::Info,
            "validate",
            None,
            &format!(
                "invalid mesh set: {} open, {} degenerate, {} fins, {} zero-area, {} negative",
                info.open_edges,
                info.degenerate_edges,
                info.fin_edges,
                info.zero_area_faces,
                info.negative_meshes
            ),
        );
    }
    (info.valid, info)
}
