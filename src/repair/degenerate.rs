//! Degenerate-face removal.
//!
//! Drops faces that cannot carry area (fewer than three edges, or
//! area and longest edge both below threshold) and whole shells whose
//! volume is noise. The survivors are rebuilt from scratch rather than
//! patched in place, so the output is referentially consistent by
//! construction.

use crate::float_types::Real;
use crate::mesh::MeshSet;
use crate::settings::GeometrySettings;
use crate::telemetry::{DiagnosticSink, Severity};
use nalgebra::Point3;

/// Rebuild `set` without its degenerate faces and noise shells.
pub fn remove_degenerate_faces(
    set: &MeshSet,
    settings: &GeometrySettings,
    sink: &dyn DiagnosticSink,
) -> MeshSet {
    let mut loops: Vec<Vec<Point3<Real>>> = Vec::new();
    let mut dropped_faces = 0usize;
    let mut dropped_shells = 0usize;

    for mesh in &set.meshes {
        if mesh.alive_face_count() > 0
            && mesh.signed_volume(&set.points).abs() < settings.eps_merge_points
        {
            dropped_shells += 1;
            continue;
        }
        for face in mesh.alive_faces() {
            if mesh.faces[face].edge_count < 3 {
                dropped_faces += 1;
                continue;
            }
            let area = mesh.face_area(face, &set.points);
            let longest = mesh.face_longest_edge(face, &set.points);
            if area < settings.min_face_area && longest < settings.eps_merge_points {
                dropped_faces += 1;
                continue;
            }
            loops.push(mesh.face_points(face, &set.points));
        }
    }

    if dropped_faces > 0 || dropped_shells > 0 {
        sink.report(
            Severity::Debug,
            "remove_degenerate_faces",
            None,
            &format!("dropped {dropped_faces} faces, {dropped_shells} noise shells"),
        );
    }
    MeshSet::from_face_loops(&loops, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use crate::telemetry::NullSink;

    #[test]
    fn cube_survives_intact() {
        let settings = GeometrySettings::default();
        let cube = shapes::cube(1.0, &settings);
        let out = remove_degenerate_faces(&cube, &settings, &NullSink);
        assert_eq!(out.face_count(), 6);
        assert!((out.total_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn micro_face_dropped() {
        let settings = GeometrySettings::default();
        let mut cube = shapes::cube(1.0, &settings);
        // splice a speck below both thresholds straight into the shell,
        // bypassing the welding a loop rebuild would apply
        let s = 1e-8;
        let base = cube.points.len();
        cube.points.push(Point3::new(10.0, 10.0, 10.0));
        cube.points.push(Point3::new(10.0 + s, 10.0, 10.0));
        cube.points.push(Point3::new(10.0, 10.0 + s, 10.0));
        let points = cube.points.clone();
        cube.meshes[0].add_face(&[base, base + 1, base + 2], &points);
        assert_eq!(cube.face_count(), 7);
        let out = remove_degenerate_faces(&cube, &settings, &NullSink);
        assert_eq!(out.face_count(), 6);
        assert_eq!(out.open_edge_count(), 0);
    }

    #[test]
    fn flat_noise_shell_dropped() {
        let settings = GeometrySettings::default();
        let cube = shapes::cube(2.0, &settings);
        let mut loops = cube.to_face_loops();
        // a lone open quad has zero enclosed volume
        loops.push(vec![
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(6.0, 1.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
        ]);
        let dirty = MeshSet::from_face_loops(&loops, &settings);
        assert_eq!(dirty.meshes.len(), 2);
        let out = remove_degenerate_faces(&dirty, &settings, &NullSink);
        assert_eq!(out.meshes.len(), 1);
        assert!((out.total_volume() - 8.0).abs() < 1e-9);
    }
}
