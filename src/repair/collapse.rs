//! Aligned-edge collapsing.
//!
//! A vertex of degree two sitting on a straight line between its two
//! neighbors carries no geometric information. The two collinear edges
//! on each side merge into one and the vertex drops out of the loop.

use crate::float_types::{EPSILON, Real};
use crate::mesh::{Mesh, MeshSet};
use crate::settings::GeometrySettings;

fn destination_degree(mesh: &Mesh, vert: usize) -> usize {
    mesh.edges
        .iter()
        .filter(|e| e.alive && e.vert == vert)
        .count()
}

/// Find one collapsible vertex: degree two, collinear incident edges,
/// twins present and structurally adjacent, and both touching faces
/// big enough to lose an edge.
fn find_candidate(mesh: &Mesh, points: &[nalgebra::Point3<Real>]) -> Option<usize> {
    for (e1, e) in mesh.edges.iter().enumerate() {
        if !e.alive {
            continue;
        }
        let v = e.vert;
        if destination_degree(mesh, v) != 2 {
            continue;
        }
        let e2 = e.next;
        let (Some(r1), Some(r2)) = (e.rev, mesh.edges[e2].rev) else {
            continue;
        };
        if mesh.edges[r2].next != r1 {
            continue;
        }
        if mesh.faces[e.face].edge_count < 4 || mesh.faces[mesh.edges[r2].face].edge_count < 4 {
            continue;
        }
        let u = mesh.edge_origin(e1);
        let w = mesh.edges[e2].vert;
        let d1 = points[v] - points[u];
        let d2 = points[w] - points[v];
        let cross = d1.cross(&d2).norm();
        if d1.dot(&d2) > 0.0 && cross < EPSILON * (d1.norm() + d2.norm()).max(1.0) {
            return Some(e1);
        }
    }
    None
}

/// Merge `e1` with its successor, and the mirrored twin pair on the
/// opposite faces, removing the shared middle vertex from both loops.
fn collapse_at(mesh: &mut Mesh, e1: usize) {
    let e2 = mesh.edges[e1].next;
    let (Some(r1), Some(r2)) = (mesh.edges[e1].rev, mesh.edges[e2].rev) else {
        return;
    };

    // forward side: e1 absorbs e2
    let after = mesh.edges[e2].next;
    mesh.edges[e1].vert = mesh.edges[e2].vert;
    mesh.edges[e1].next = after;
    mesh.edges[after].prev = e1;
    let fa = mesh.edges[e1].face;
    if mesh.faces[fa].edge == e2 {
        mesh.faces[fa].edge = e1;
    }
    mesh.faces[fa].edge_count -= 1;
    mesh.edges[e2].alive = false;

    // mirrored side: r2 absorbs r1
    let after_r = mesh.edges[r1].next;
    mesh.edges[r2].vert = mesh.edges[r1].vert;
    mesh.edges[r2].next = after_r;
    mesh.edges[after_r].prev = r2;
    let fb = mesh.edges[r2].face;
    if mesh.faces[fb].edge == r1 {
        mesh.faces[fb].edge = r2;
    }
    mesh.faces[fb].edge_count -= 1;
    mesh.edges[r1].alive = false;

    mesh.edges[e1].rev = Some(r2);
    mesh.edges[r2].rev = Some(e1);
}

/// Collapse every straight degree-two vertex across all shells.
/// Returns true when anything changed.
pub fn collapse_aligned_edges(set: &mut MeshSet, _settings: &GeometrySettings) -> bool {
    let mut changed = false;
    for mesh in &mut set.meshes {
        // every collapse removes an edge pair, so this terminates
        for _ in 0..mesh.edges.len().max(1) {
            let Some(e1) = find_candidate(mesh, &set.points) else {
                break;
            };
            collapse_at(mesh, e1);
            changed = true;
        }
    }
    if changed {
        set.refresh_planes();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair::coplanar::merge_coplanar_faces;
    use crate::telemetry::NullSink;
    use nalgebra::Point3;

    /// A 2x1x1 box whose top is split into two unit quads; the split
    /// line's midpoints become straight degree-two vertices after a
    /// coplanar merge.
    fn split_top_box() -> MeshSet {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        let loops = vec![
            vec![p(0., 0., 0.), p(0., 1., 0.), p(2., 1., 0.), p(2., 0., 0.)],
            vec![p(0., 0., 1.), p(1., 0., 1.), p(1., 1., 1.), p(0., 1., 1.)],
            vec![p(1., 0., 1.), p(2., 0., 1.), p(2., 1., 1.), p(1., 1., 1.)],
            vec![p(0., 0., 0.), p(2., 0., 0.), p(2., 0., 1.), p(1., 0., 1.), p(0., 0., 1.)],
            vec![p(2., 1., 0.), p(0., 1., 0.), p(0., 1., 1.), p(1., 1., 1.), p(2., 1., 1.)],
            vec![p(0., 0., 0.), p(0., 0., 1.), p(0., 1., 1.), p(0., 1., 0.)],
            vec![p(2., 0., 0.), p(2., 1., 0.), p(2., 1., 1.), p(2., 0., 1.)],
        ];
        MeshSet::from_face_loops(&loops, &GeometrySettings::default())
    }

    #[test]
    fn straight_vertices_collapse_to_plain_box() {
        let settings = GeometrySettings::default();
        let mut set = split_top_box();
        assert!(merge_coplanar_faces(&mut set, &settings, &NullSink));
        assert!(collapse_aligned_edges(&mut set, &settings));
        assert_eq!(set.face_count(), 6);
        assert_eq!(set.open_edge_count(), 0);
        assert_eq!(set.vertex_count(), 8);
        for mesh in &set.meshes {
            for f in mesh.alive_faces() {
                assert_eq!(mesh.faces[f].edge_count, 4);
            }
        }
        assert!((set.total_volume() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cube_has_nothing_to_collapse() {
        let settings = GeometrySettings::default();
        let mut cube = crate::shapes::cube(1.0, &settings);
        assert!(!collapse_aligned_edges(&mut cube, &settings));
    }
}
