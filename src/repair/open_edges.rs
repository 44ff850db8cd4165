//! Open-edge resolution.
//!
//! Three escalating attempts to close a leaking surface: split open
//! edges at vertices sitting on them (T-junctions), split mutually
//! crossing open edges at their intersection, and finally trace the
//! remaining open edges into closed chains and cap each near-planar
//! chain with a new face. Any attempt that fully closes the set ends
//! the sequence early.

use crate::float_types::Real;
use crate::geometry::{newell_normal, point_segment_distance, segment_segment_distance};
use crate::mesh::{HalfEdge, Mesh, MeshSet, Plane};
use crate::settings::GeometrySettings;
use crate::telemetry::{DiagnosticSink, Severity};
use nalgebra::Point3;

/// Insert `vert` into the loop of `edge`, splitting it in two. The new
/// successor edge inherits the face and stays open.
fn split_edge(mesh: &mut Mesh, edge: usize, vert: usize) {
    let new_id = mesh.edges.len();
    let old_next = mesh.edges[edge].next;
    let old_dest = mesh.edges[edge].vert;
    let face = mesh.edges[edge].face;
    mesh.edges.push(HalfEdge {
        next: old_next,
        prev: edge,
        rev: None,
        vert: old_dest,
        face,
        alive: true,
    });
    mesh.edges[old_next].prev = new_id;
    mesh.edges[edge].vert = vert;
    mesh.edges[edge].next = new_id;
    mesh.faces[face].edge_count += 1;
}

/// Split open edges at pool vertices lying on their interior.
pub(crate) fn split_at_vertices(set: &mut MeshSet, settings: &GeometrySettings) -> bool {
    let eps = settings.eps_merge_points;
    let mut changed = false;
    let used: Vec<usize> = {
        let mut all = hashbrown::HashSet::new();
        for mesh in &set.meshes {
            all.extend(mesh.used_vertices());
        }
        all.into_iter().collect()
    };
    for mesh in &mut set.meshes {
        // new edges appended during the scan are never open-splittable
        // against the same vertex twice, so a simple sweep suffices
        let mut e = 0;
        while e < mesh.edges.len() {
            if mesh.edges[e].alive && mesh.edges[e].rev.is_none() {
                let a = set.points[mesh.edge_origin(e)];
                let b = set.points[mesh.edges[e].vert];
                let len = (b - a).norm();
                if len > eps {
                    for &v in &used {
                        if v == mesh.edge_origin(e) || v == mesh.edges[e].vert {
                            continue;
                        }
                        let (dist, t) = point_segment_distance(&set.points[v], &a, &b);
                        let margin = eps / len;
                        if dist < eps && t > margin && t < 1.0 - margin {
                            split_edge(mesh, e, v);
                            changed = true;
                            break;
                        }
                    }
                }
            }
            e += 1;
        }
    }
    changed
}

/// Split pairs of crossing open edges at their mutual closest point.
pub(crate) fn split_at_edge_crossings(set: &mut MeshSet, settings: &GeometrySettings) -> bool {
    let eps = settings.eps_merge_points;
    let mut changed = false;
    // gather (mesh, edge) pairs up front; splits only append edges
    let mut open: Vec<(usize, usize)> = Vec::new();
    for (mi, mesh) in set.meshes.iter().enumerate() {
        for (ei, e) in mesh.edges.iter().enumerate() {
            if e.alive && e.rev.is_none() {
                open.push((mi, ei));
            }
        }
    }
    for i in 0..open.len() {
        for j in (i + 1)..open.len() {
            let (mi, ei) = open[i];
            let (mj, ej) = open[j];
            let a0 = set.points[set.meshes[mi].edge_origin(ei)];
            let a1 = set.points[set.meshes[mi].edges[ei].vert];
            let b0 = set.points[set.meshes[mj].edge_origin(ej)];
            let b1 = set.points[set.meshes[mj].edges[ej].vert];
            let la = (a1 - a0).norm();
            let lb = (b1 - b0).norm();
            if la <= eps || lb <= eps {
                continue;
            }
            let (dist, s, t) = segment_segment_distance(&a0, &a1, &b0, &b1);
            let ma = eps / la;
            let mb = eps / lb;
            if dist < eps && s > ma && s < 1.0 - ma && t > mb && t < 1.0 - mb {
                let pa = a0 + (a1 - a0) * s;
                let pb = b0 + (b1 - b0) * t;
                let mid = Point3::from((pa.coords + pb.coords) / 2.0);
                let vert = set.points.len();
                set.points.push(mid);
                split_edge(&mut set.meshes[mi], ei, vert);
                split_edge(&mut set.meshes[mj], ej, vert);
                changed = true;
            }
        }
    }
    changed
}

/// Trace open edges into closed chains and return a cap loop for each
/// near-planar chain, wound to oppose the open boundary.
pub(crate) fn trace_cap_loops(
    set: &MeshSet,
    settings: &GeometrySettings,
) -> Vec<Vec<Point3<Real>>> {
    let mut caps = Vec::new();
    for mesh in &set.meshes {
        let mut by_origin: hashbrown::HashMap<usize, usize> = hashbrown::HashMap::new();
        for (ei, e) in mesh.edges.iter().enumerate() {
            if e.alive && e.rev.is_none() {
                by_origin.insert(mesh.edge_origin(ei), ei);
            }
        }
        let mut visited: hashbrown::HashSet<usize> = hashbrown::HashSet::new();
        let starts: Vec<usize> = by_origin.values().copied().collect();
        for start in starts {
            if visited.contains(&start) {
                continue;
            }
            let mut chain = Vec::new();
            let mut e = start;
            let mut closed = false;
            for _ in 0..mesh.edges.len() {
                visited.insert(e);
                chain.push(mesh.edge_origin(e));
                match by_origin.get(&mesh.edges[e].vert) {
                    Some(&next) if next == start => {
                        closed = true;
                        break;
                    }
                    Some(&next) if !visited.contains(&next) => e = next,
                    _ => break,
                }
            }
            if !closed || chain.len() < 3 {
                continue;
            }
            let pts: Vec<Point3<Real>> = chain.iter().map(|&v| set.points[v]).collect();
            let normal = newell_normal(&pts);
            if normal.norm_squared() < Real::EPSILON {
                continue;
            }
            let plane = Plane::from_loop(&pts);
            let longest = pts
                .iter()
                .zip(pts.iter().cycle().skip(1))
                .map(|(a, b)| (b - a).norm())
                .fold(0.0 as Real, Real::max);
            let tol = settings.eps_merge_points + longest * settings.eps_coplanar_angle;
            if pts
                .iter()
                .any(|p| plane.signed_distance(p).abs() > tol)
            {
                continue;
            }
            // the cap must run against the boundary so its half-edges
            // pair with the open ones
            let mut cap = pts;
            cap.reverse();
            caps.push(cap);
        }
    }
    caps
}

/// Attempt to close every open boundary of `set`. Returns the best
/// attempt; the caller judges it against the input.
pub fn resolve_open_edges(
    set: &MeshSet,
    settings: &GeometrySettings,
    sink: &dyn DiagnosticSink,
) -> MeshSet {
    let faces = set.face_count();
    let open = set.open_edge_count();
    if faces > settings.max_repair_faces || open > settings.max_open_edges {
        sink.report(
            Severity::Warning,
            "resolve_open_edges",
            None,
            &format!(
                "set too large to bound the search ({faces} faces, {open} open edges), skipping"
            ),
        );
        return set.clone();
    }
    let mut work = set.clone();

    if split_at_vertices(&mut work, settings) {
        work = work.rebuilt(settings);
        sink.report(
            Severity::Debug,
            "resolve_open_edges",
            None,
            "split open edges at coincident vertices",
        );
        if work.open_edge_count() == 0 {
            return work;
        }
    }

    if split_at_edge_crossings(&mut work, settings) {
        work = work.rebuilt(settings);
        sink.report(
            Severity::Debug,
            "resolve_open_edges",
            None,
            "split mutually crossing open edges",
        );
        if work.open_edge_count() == 0 {
            return work;
        }
    }

    let caps = trace_cap_loops(&work, settings);
    if !caps.is_empty() {
        let mut loops = work.to_face_loops();
        for cap in &caps {
            // triangulated caps keep downstream splitting convex-safe
            for tri in crate::triangulate::triangulate_face(cap) {
                loops.push(vec![cap[tri[0]], cap[tri[1]], cap[tri[2]]]);
            }
        }
        sink.report(
            Severity::Debug,
            "resolve_open_edges",
            None,
            &format!("capped {} open chains", caps.len()),
        );
        work = MeshSet::from_face_loops(&loops, settings);
    }
    work
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use crate::telemetry::NullSink;

    #[test]
    fn missing_cube_face_is_capped() {
        let settings = GeometrySettings::default();
        let cube = shapes::cube(1.0, &settings);
        let mut loops = cube.to_face_loops();
        loops.pop();
        let open = MeshSet::from_face_loops(&loops, &settings);
        assert_eq!(open.open_edge_count(), 4);
        let closed = resolve_open_edges(&open, &settings, &NullSink);
        assert_eq!(closed.open_edge_count(), 0);
        assert!((closed.total_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn over_cap_set_is_returned_unmodified() {
        let settings = GeometrySettings::default().with_max_open_edges(2);
        let cube = shapes::cube(1.0, &settings);
        let mut loops = cube.to_face_loops();
        loops.pop();
        let open = MeshSet::from_face_loops(&loops, &settings);
        assert_eq!(open.open_edge_count(), 4);
        let out = resolve_open_edges(&open, &settings, &NullSink);
        assert_eq!(out, open);
    }

    #[test]
    fn t_junction_closed_by_vertex_split() {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        let settings = GeometrySettings::default();
        // 2x1x1 box: top is two quads, but the long side faces have no
        // midpoint vertex, leaving T-junctions along the split line
        let loops = vec![
            vec![p(0., 0., 0.), p(0., 1., 0.), p(2., 1., 0.), p(2., 0., 0.)],
            vec![p(0., 0., 1.), p(1., 0., 1.), p(1., 1., 1.), p(0., 1., 1.)],
            vec![p(1., 0., 1.), p(2., 0., 1.), p(2., 1., 1.), p(1., 1., 1.)],
            vec![p(0., 0., 0.), p(2., 0., 0.), p(2., 0., 1.), p(0., 0., 1.)],
            vec![p(2., 1., 0.), p(0., 1., 0.), p(0., 1., 1.), p(2., 1., 1.)],
            vec![p(0., 0., 0.), p(0., 0., 1.), p(0., 1., 1.), p(0., 1., 0.)],
            vec![p(2., 0., 0.), p(2., 1., 0.), p(2., 1., 1.), p(2., 0., 1.)],
        ];
        let open = MeshSet::from_face_loops(&loops, &settings);
        assert!(open.open_edge_count() > 0);
        let closed = resolve_open_edges(&open, &settings, &NullSink);
        assert_eq!(closed.open_edge_count(), 0);
        assert!((closed.total_volume() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn crossing_open_edges_get_split() {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        let settings = GeometrySettings::default();
        // two lone quads whose boundaries cross at (1, 0, 0)
        let loops = vec![
            vec![p(0., 0., 0.), p(2., 0., 0.), p(2., 0., -1.), p(0., 0., -1.)],
            vec![p(1., -1., 0.), p(1., 1., 0.), p(1., 1., 1.), p(1., -1., 1.)],
        ];
        let mut set = MeshSet::from_face_loops(&loops, &settings);
        let points_before = set.points.len();
        assert!(split_at_edge_crossings(&mut set, &settings));
        assert_eq!(set.points.len(), points_before + 1);
        let crossing = Point3::new(1.0, 0.0, 0.0);
        assert!(
            set.points
                .iter()
                .any(|q| (q - crossing).norm() < settings.eps_merge_points)
        );
    }
}
