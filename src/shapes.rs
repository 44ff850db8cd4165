//! Primitive solid constructors, mainly used as fixtures in tests and
//! demos. All shapes come out closed and outward-oriented.

use crate::float_types::Real;
use crate::mesh::MeshSet;
use crate::settings::GeometrySettings;
use nalgebra::{Point3, Vector3};

/// Axis-aligned cuboid centered at `center` with the given extents.
pub fn cuboid_at(
    center: Point3<Real>,
    dx: Real,
    dy: Real,
    dz: Real,
    settings: &GeometrySettings,
) -> MeshSet {
    let h = Vector3::new(dx / 2.0, dy / 2.0, dz / 2.0);
    let corner = |sx: Real, sy: Real, sz: Real| {
        Point3::new(center.x + sx * h.x, center.y + sy * h.y, center.z + sz * h.z)
    };
    let p = [
        corner(-1.0, -1.0, -1.0),
        corner(1.0, -1.0, -1.0),
        corner(1.0, 1.0, -1.0),
        corner(-1.0, 1.0, -1.0),
        corner(-1.0, -1.0, 1.0),
        corner(1.0, -1.0, 1.0),
        corner(1.0, 1.0, 1.0),
        corner(-1.0, 1.0, 1.0),
    ];
    // outward CCW quads
    let quads: [[usize; 4]; 6] = [
        [0, 3, 2, 1], // bottom
        [4, 5, 6, 7], // top
        [0, 1, 5, 4], // front
        [2, 3, 7, 6], // back
        [0, 4, 7, 3], // left
        [1, 2, 6, 5], // right
    ];
    let loops: Vec<Vec<Point3<Real>>> = quads
        .iter()
        .map(|q| q.iter().map(|&i| p[i]).collect())
        .collect();
    MeshSet::from_face_loops(&loops, settings)
}

/// Cube of side `size` centered at the origin.
pub fn cube(size: Real, settings: &GeometrySettings) -> MeshSet {
    cuboid_at(Point3::origin(), size, size, size, settings)
}

/// Regular-ish tetrahedron spanned by the origin and the three unit
/// axis points, scaled by `size`.
pub fn tetrahedron(size: Real, settings: &GeometrySettings) -> MeshSet {
    let o = Point3::new(0.0, 0.0, 0.0);
    let x = Point3::new(size, 0.0, 0.0);
    let y = Point3::new(0.0, size, 0.0);
    let z = Point3::new(0.0, 0.0, size);
    let loops = vec![
        vec![o, y, x], // bottom, normal -z
        vec![o, x, z], // normal -y
        vec![o, z, y], // normal -x
        vec![x, y, z], // slanted cap
    ];
    MeshSet::from_face_loops(&loops, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_volume_matches_extents() {
        let b = cuboid_at(
            Point3::new(1.0, 2.0, 3.0),
            2.0,
            3.0,
            4.0,
            &GeometrySettings::default(),
        );
        assert_eq!(b.open_edge_count(), 0);
        assert!((b.total_volume() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn tetrahedron_is_closed() {
        let t = tetrahedron(1.0, &GeometrySettings::default());
        assert_eq!(t.open_edge_count(), 0);
        assert!((t.total_volume() - 1.0 / 6.0).abs() < 1e-9);
    }
}
