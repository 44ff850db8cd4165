//! Coplanar-face merging.
//!
//! Adjacent faces whose normals agree within the coplanar angle
//! tolerance are spliced into one larger face by removing the shared
//! edge pair. Merged faces are re-projected onto a single best-fit
//! plane to stop drift from accumulating. The whole pass is rolled
//! back if it raises the open-edge count.

use crate::mesh::{MeshSet, Plane};
use crate::settings::GeometrySettings;
use crate::telemetry::{DiagnosticSink, Severity};

/// Number of undirected edges shared between the faces of `e` and its
/// twin. Splicing is only safe across a single shared edge.
fn shared_edge_count(mesh: &crate::mesh::Mesh, face_a: usize, face_b: usize) -> usize {
    mesh.face_edges(face_a)
        .iter()
        .filter(|&&e| {
            mesh.edges[e]
                .rev
                .is_some_and(|r| mesh.edges[r].face == face_b)
        })
        .count()
}

/// Splice the face of `twin` into the face of `edge`, deleting both
/// half-edges of the shared edge.
fn splice(mesh: &mut crate::mesh::Mesh, edge: usize, twin: usize) {
    let face_a = mesh.edges[edge].face;
    let face_b = mesh.edges[twin].face;
    let b_edges = mesh.face_edges(face_b);
    let a_prev = mesh.edges[edge].prev;
    let a_next = mesh.edges[edge].next;
    let b_prev = mesh.edges[twin].prev;
    let b_next = mesh.edges[twin].next;

    mesh.edges[a_prev].next = b_next;
    mesh.edges[b_next].prev = a_prev;
    mesh.edges[b_prev].next = a_next;
    mesh.edges[a_next].prev = b_prev;

    for e in b_edges {
        if e != twin {
            mesh.edges[e].face = face_a;
        }
    }
    let count_b = mesh.faces[face_b].edge_count;
    mesh.faces[face_a].edge = a_prev;
    mesh.faces[face_a].edge_count += count_b - 2;
    // face B's edges have been absorbed; only the record dies
    mesh.faces[face_b].alive = false;
    mesh.edges[edge].alive = false;
    mesh.edges[twin].alive = false;
}

/// Merge every coplanar neighbor pair across all shells. Returns true
/// when anything merged and the result did not regress.
pub fn merge_coplanar_faces(
    set: &mut MeshSet,
    settings: &GeometrySettings,
    sink: &dyn DiagnosticSink,
) -> bool {
    let snapshot = set.clone();
    let open_before = set.open_edge_count();
    let cos_tol = settings.coplanar_cos();
    let mut merged = 0usize;

    for mesh_idx in 0..set.meshes.len() {
        // bounded: every merge kills one edge pair
        for _ in 0..set.meshes[mesh_idx].edges.len().max(1) {
            let mesh = &set.meshes[mesh_idx];
            let mut found = None;
            for (i, e) in mesh.edges.iter().enumerate() {
                if !e.alive {
                    continue;
                }
                let Some(r) = e.rev else { continue };
                let fa = e.face;
                let fb = mesh.edges[r].face;
                if fa == fb {
                    continue;
                }
                let na = mesh.face_normal(fa, &set.points);
                let nb = mesh.face_normal(fb, &set.points);
                if na.dot(&nb) < cos_tol {
                    continue;
                }
                if mesh.faces[fa].edge_count + mesh.faces[fb].edge_count - 2
                    > settings.max_edges_per_face
                {
                    continue;
                }
                if shared_edge_count(mesh, fa, fb) != 1 {
                    continue;
                }
                found = Some((i, r));
                break;
            }
            let Some((edge, twin)) = found else { break };
            splice(&mut set.meshes[mesh_idx], edge, twin);
            merged += 1;
        }
    }

    if merged == 0 {
        return false;
    }

    // flatten each surviving face onto its best-fit plane
    for mesh_idx in 0..set.meshes.len() {
        let faces: Vec<usize> = set.meshes[mesh_idx].alive_faces().collect();
        for face in faces {
            let pts = set.meshes[mesh_idx].face_points(face, &set.points);
            let plane = Plane::from_loop(&pts);
            for v in set.meshes[mesh_idx].face_vertices(face) {
                set.points[v] = plane.project(&set.points[v]);
            }
        }
    }
    set.refresh_planes();

    if set.open_edge_count() > open_before {
        sink.report(
            Severity::Info,
            "merge_coplanar_faces",
            None,
            "merge pass raised open-edge count, restoring snapshot",
        );
        *set = snapshot;
        return false;
    }
    sink.report(
        Severity::Debug,
        "merge_coplanar_faces",
        None,
        &format!("merged {merged} coplanar face pairs"),
    );
    true
}
