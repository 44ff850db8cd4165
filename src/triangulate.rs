//! Polygon triangulation via ear clipping.
//!
//! Thin wrapper over `geo`'s earcut backend. Input is one outer loop
//! plus optional hole loops in 2D; output triangles index into the
//! concatenated input vertex sequence (outer first, then holes in
//! order).

use crate::float_types::{EPSILON, Real};
use crate::geometry::{dominant_axis, point_in_polygon_2d, project_point, signed_area_2d};
use geo::TriangulateEarcut;
use geo::{Coord, LineString, Polygon as GeoPolygon};
use nalgebra::{Point2, Point3};

/// Triangulate a possibly non-convex, possibly holed polygon.
///
/// A collinear or otherwise area-less outer loop yields no triangles
/// rather than an error. Degenerate output triangles (repeated index,
/// near-zero area) are dropped.
pub fn triangulate_polygon(
    outer: &[Point2<Real>],
    holes: &[Vec<Point2<Real>>],
) -> Vec<[usize; 3]> {
    if outer.len() < 3 || signed_area_2d(outer).abs() < EPSILON * EPSILON {
        return Vec::new();
    }
    let ring = |pts: &[Point2<Real>]| -> LineString<f64> {
        pts.iter()
            .map(|p| Coord {
                x: p.x as f64,
                y: p.y as f64,
            })
            .collect()
    };
    // geo closes each ring before earcutting, so the raw indices run over
    // rings carrying a duplicate closing coordinate; fold those duplicates
    // back onto the open input loops. Holes lying outside the outer loop
    // would derail earcut and are skipped, keeping the remaining indices
    // anchored to the original input positions.
    let mut remap: Vec<usize> = (0..outer.len()).collect();
    remap.push(0);
    let mut base = outer.len();
    let mut hole_rings = Vec::with_capacity(holes.len());
    for h in holes {
        if h.len() >= 3 && point_in_polygon_2d(&h[0], outer) {
            remap.extend(base..base + h.len());
            remap.push(base);
            hole_rings.push(ring(h));
        }
        base += h.len();
    }
    let polygon = GeoPolygon::new(ring(outer), hole_rings);
    let raw = polygon.earcut_triangles_raw();

    let all: Vec<Point2<Real>> = outer.iter().chain(holes.iter().flatten()).copied().collect();

    let mut out = Vec::with_capacity(raw.triangle_indices.len() / 3);
    for tri in raw.triangle_indices.chunks_exact(3) {
        let (Some(&a), Some(&b), Some(&c)) =
            (remap.get(tri[0]), remap.get(tri[1]), remap.get(tri[2]))
        else {
            continue;
        };
        if a == b || b == c || a == c {
            continue;
        }
        let area = signed_area_2d(&[all[a], all[b], all[c]]);
        if area.abs() < EPSILON * EPSILON {
            continue;
        }
        out.push([a, b, c]);
    }
    out
}

/// Triangulate a 3D face loop by projecting onto the dominant axis of
/// its normal. Returned triples index into `loop3d` and keep the
/// original loop's winding sense.
pub fn triangulate_face(loop3d: &[Point3<Real>]) -> Vec<[usize; 3]> {
    if loop3d.len() < 3 {
        return Vec::new();
    }
    let normal = crate::geometry::newell_normal(loop3d);
    if normal.norm_squared() < Real::EPSILON {
        return Vec::new();
    }
    let axis = dominant_axis(&normal);
    let projected: Vec<Point2<Real>> = loop3d.iter().map(|p| project_point(p, axis)).collect();
    let mut tris = triangulate_polygon(&projected, &[]);
    // with the cyclic projection, a triangle's 2D signed area carries the
    // sign of its 3D normal component along the projection axis; orient
    // every triangle to agree with the face normal
    let want_ccw = normal[axis] > 0.0;
    for tri in &mut tris {
        let area = signed_area_2d(&[projected[tri[0]], projected[tri[1]], projected[tri[2]]]);
        if (area > 0.0) != want_ccw {
            tri.swap(1, 2);
        }
    }
    tris
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convex_quad_two_triangles() {
        let quad = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let tris = triangulate_polygon(&quad, &[]);
        assert_eq!(tris.len(), 2);
        let total: Real = tris
            .iter()
            .map(|t| signed_area_2d(&[quad[t[0]], quad[t[1]], quad[t[2]]]).abs())
            .sum();
        assert!((total - 2.0).abs() < 1e-9);
    }

    #[test]
    fn indices_stay_within_the_open_loops() {
        let quad = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let tris = triangulate_polygon(&quad, &[]);
        assert_eq!(tris.len(), 2);
        for t in &tris {
            assert!(t.iter().all(|&i| i < quad.len()), "index past loop end");
        }

        let hole = vec![
            Point2::new(0.25, 0.25),
            Point2::new(0.25, 0.75),
            Point2::new(0.75, 0.75),
            Point2::new(0.75, 0.25),
        ];
        let tris = triangulate_polygon(&quad, std::slice::from_ref(&hole));
        assert!(!tris.is_empty());
        for t in &tris {
            assert!(t.iter().all(|&i| i < quad.len() + hole.len()));
        }
    }

    #[test]
    fn collinear_loop_yields_nothing() {
        let line = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(3.0, 0.0),
        ];
        assert!(triangulate_polygon(&line, &[]).is_empty());
    }

    #[test]
    fn holed_square_keeps_hole_empty() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let hole = vec![
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 1.0),
        ];
        let tris = triangulate_polygon(&outer, std::slice::from_ref(&hole));
        assert!(!tris.is_empty());
        let all: Vec<Point2<Real>> = outer.iter().chain(hole.iter()).copied().collect();
        let total: Real = tris
            .iter()
            .map(|t| signed_area_2d(&[all[t[0]], all[t[1]], all[t[2]]]).abs())
            .sum();
        assert!((total - 12.0).abs() < 1e-6);
    }

    #[test]
    fn hole_outside_the_outer_loop_is_ignored() {
        let outer = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let stray = vec![
            Point2::new(5.0, 5.0),
            Point2::new(6.0, 5.0),
            Point2::new(6.0, 6.0),
            Point2::new(5.0, 6.0),
        ];
        let tris = triangulate_polygon(&outer, std::slice::from_ref(&stray));
        let total: Real = tris
            .iter()
            .map(|t| signed_area_2d(&[outer[t[0]], outer[t[1]], outer[t[2]]]).abs())
            .sum();
        assert!((total - 4.0).abs() < 1e-9, "stray hole punched the square");
    }

    #[test]
    fn face_triangulation_preserves_winding() {
        // CCW square in the plane z = 1
        let square = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let tris = triangulate_face(&square);
        assert_eq!(tris.len(), 2);
        for t in &tris {
            let n = crate::geometry::newell_normal(&[square[t[0]], square[t[1]], square[t[2]]]);
            assert!(n.z > 0.0, "triangle flipped against face normal");
        }
    }
}
