//! Fin removal.
//!
//! A fin is zero-thickness geometry: a spike where an edge's `next` is
//! its own twin, an edge shorter than the merge epsilon, an edge whose
//! far vertex nothing else references, or a pair of coincident faces
//! folded back onto each other. Fins are collapsed iteratively until a
//! fixed point.

use crate::mesh::{Mesh, MeshSet};
use crate::settings::GeometrySettings;
use crate::telemetry::{DiagnosticSink, Severity};

/// Detach `edge` from its face loop, shrinking the loop by one.
fn unlink_from_loop(mesh: &mut Mesh, edge: usize) {
    let prev = mesh.edges[edge].prev;
    let next = mesh.edges[edge].next;
    mesh.edges[prev].next = next;
    mesh.edges[next].prev = prev;
    let face = mesh.edges[edge].face;
    if mesh.faces[face].edge == edge {
        mesh.faces[face].edge = prev;
    }
    mesh.faces[face].edge_count -= 1;
    mesh.edges[edge].alive = false;
}

/// Remove a spike: `edge` and its twin are consecutive in the same
/// loop, enclosing nothing.
fn unlink_spike(mesh: &mut Mesh, edge: usize, twin: usize) {
    let prev = mesh.edges[edge].prev;
    let after = mesh.edges[twin].next;
    mesh.edges[prev].next = after;
    mesh.edges[after].prev = prev;
    let face = mesh.edges[edge].face;
    if mesh.faces[face].edge == edge || mesh.faces[face].edge == twin {
        mesh.faces[face].edge = prev;
    }
    mesh.faces[face].edge_count -= 2;
    mesh.edges[edge].alive = false;
    mesh.edges[twin].alive = false;
}

/// Collapse `edge` by welding its origin onto its destination. The
/// edge (and its twin, if any) leave their loops; every edge that
/// ended at the origin is redirected to the destination.
fn collapse_edge(mesh: &mut Mesh, edge: usize) {
    let origin = mesh.edge_origin(edge);
    let dest = mesh.edges[edge].vert;
    let twin = mesh.edges[edge].rev;
    unlink_from_loop(mesh, edge);
    if let Some(r) = twin {
        unlink_from_loop(mesh, r);
    }
    for e in mesh.edges.iter_mut().filter(|e| e.alive) {
        if e.vert == origin {
            e.vert = dest;
        }
    }
}

/// References to `vert` as an endpoint (either direction) among alive
/// edges. A consistent loop references each of its vertices at least
/// twice; a count of one marks a dangling edge.
fn vertex_degree(mesh: &Mesh, vert: usize) -> usize {
    let mut count = 0;
    for (i, e) in mesh.edges.iter().enumerate() {
        if !e.alive {
            continue;
        }
        if e.vert == vert || mesh.edge_origin(i) == vert {
            count += 1;
        }
    }
    count
}

fn remove_fins_in_mesh(
    set: &mut MeshSet,
    mesh_idx: usize,
    settings: &GeometrySettings,
    sink: &dyn DiagnosticSink,
) -> bool {
    let mut changed = false;
    // bounded fixed point: each pass kills at least one edge or stops
    for _ in 0..set.meshes[mesh_idx].edges.len().max(1) {
        let mesh = &set.meshes[mesh_idx];
        let mut target: Option<(usize, bool)> = None; // (edge, is_spike)
        for (i, e) in mesh.edges.iter().enumerate() {
            if !e.alive {
                continue;
            }
            if e.rev == Some(e.next) {
                target = Some((i, true));
                break;
            }
            let len = (set.points[e.vert] - set.points[mesh.edge_origin(i)]).norm();
            if len < settings.eps_merge_points {
                target = Some((i, false));
                break;
            }
            if vertex_degree(mesh, e.vert) <= 1 {
                target = Some((i, false));
                break;
            }
        }
        let Some((edge, is_spike)) = target else { break };
        let mesh = &mut set.meshes[mesh_idx];
        if is_spike {
            let twin = mesh.edges[edge].next;
            unlink_spike(mesh, edge, twin);
        } else {
            collapse_edge(mesh, edge);
        }
        sink.report(Severity::Debug, "remove_fins", Some(edge), "fin edge collapsed");
        changed = true;
        // drop faces squeezed below a triangle
        for f in 0..set.meshes[mesh_idx].faces.len() {
            if set.meshes[mesh_idx].faces[f].alive && set.meshes[mesh_idx].faces[f].edge_count < 3
            {
                set.meshes[mesh_idx].kill_face(f);
            }
        }
    }

    // coincident back-to-back face pairs
    loop {
        let mesh = &set.meshes[mesh_idx];
        let fin_cos = -settings.coplanar_cos();
        let mut pair: Option<(usize, usize)> = None;
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
            if na.dot(&nb) >= fin_cos {
                continue;
            }
            let mut va = mesh.face_vertices(fa);
            let mut vb = mesh.face_vertices(fb);
            va.sort_unstable();
            vb.sort_unstable();
            if va == vb {
                pair = Some((fa, fb));
                break;
            }
        }
        let Some((fa, fb)) = pair else { break };
        let mesh = &mut set.meshes[mesh_idx];
        mesh.kill_face(fa);
        mesh.kill_face(fb);
        sink.report(
            Severity::Debug,
            "remove_fins",
            Some(fa),
            "coincident fin face pair removed",
        );
        changed = true;
    }
    changed
}

/// Remove fin edges and coincident fin faces across all shells.
/// Returns true when anything changed. Running the pass again on its
/// own output is a no-op.
pub fn remove_fins(
    set: &mut MeshSet,
    settings: &GeometrySettings,
    sink: &dyn DiagnosticSink,
) -> bool {
    let mut changed = false;
    for mesh_idx in 0..set.meshes.len() {
        changed |= remove_fins_in_mesh(set, mesh_idx, settings, sink);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::NullSink;
    use nalgebra::Point3;

    /// A unit square in the XY plane with a spike excursion to `x`
    /// spliced into its boundary.
    fn spiked_square() -> MeshSet {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(1.0, 1.0, 0.0);
        let d = Point3::new(0.0, 1.0, 0.0);
        let x = Point3::new(0.5, -1.0, 0.0);
        let loops = vec![vec![a, b, x, b, c, d]];
        MeshSet::from_face_loops(&loops, &GeometrySettings::default())
    }

    #[test]
    fn spike_is_removed() {
        let settings = GeometrySettings::default();
        let mut set = spiked_square();
        // the spike's two half-edges pair up as twins
        assert_eq!(set.closed_edge_count(), 2);
        assert!(remove_fins(&mut set, &settings, &NullSink));
        assert_eq!(set.closed_edge_count(), 0);
        assert_eq!(set.face_count(), 1);
        let mesh = &set.meshes[0];
        let face = mesh.alive_faces().next().unwrap();
        assert_eq!(mesh.faces[face].edge_count, 4);
        assert!((mesh.face_area(face, &set.points) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fin_removal_is_idempotent() {
        let settings = GeometrySettings::default();
        let mut set = spiked_square();
        assert!(remove_fins(&mut set, &settings, &NullSink));
        let snapshot = set.clone();
        assert!(!remove_fins(&mut set, &settings, &NullSink));
        assert_eq!(set, snapshot);
    }

    #[test]
    fn clean_square_untouched() {
        let settings = GeometrySettings::default();
        let loops = vec![vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]];
        let mut set = MeshSet::from_face_loops(&loops, &settings);
        assert!(!remove_fins(&mut set, &settings, &NullSink));
    }

    #[test]
    fn coincident_face_pair_removed() {
        let settings = GeometrySettings::default();
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        // same triangle wound both ways: a zero-thickness shell
        let loops = vec![vec![a, b, c], vec![a, c, b]];
        let mut set = MeshSet::from_face_loops(&loops, &settings);
        assert_eq!(set.open_edge_count(), 0);
        assert!(remove_fins(&mut set, &settings, &NullSink));
        assert_eq!(set.face_count(), 0);
    }
}
