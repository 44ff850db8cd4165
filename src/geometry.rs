//! Stateless geometric primitives shared by the validator, the repair
//! passes and the boolean kernel.

use crate::float_types::Real;
use nalgebra::{Point2, Point3, Vector3};

/// Newell's method over a full vertex loop. Returns the (unnormalized)
/// area vector: its direction is the loop normal, its length twice the
/// enclosed area. Works for non-convex and slightly non-planar loops.
pub fn newell_normal(points: &[Point3<Real>]) -> Vector3<Real> {
    let mut n = Vector3::zeros();
    for (curr, next) in points.iter().zip(points.iter().cycle().skip(1)).take(points.len()) {
        n.x += (curr.y - next.y) * (curr.z + next.z);
        n.y += (curr.z - next.z) * (curr.x + next.x);
        n.z += (curr.x - next.x) * (curr.y + next.y);
    }
    n
}

/// Area of a (possibly non-convex) planar loop.
pub fn loop_area(points: &[Point3<Real>]) -> Real {
    newell_normal(points).norm() * 0.5
}

/// Centroid of a vertex loop.
pub fn loop_centroid(points: &[Point3<Real>]) -> Point3<Real> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as Real)
}

/// Index of the dominant (largest magnitude) component of a normal,
/// i.e. the axis to drop when projecting the loop to 2D.
pub fn dominant_axis(normal: &Vector3<Real>) -> usize {
    let ax = normal.x.abs();
    let ay = normal.y.abs();
    let az = normal.z.abs();
    if ax >= ay && ax >= az {
        0
    } else if ay >= az {
        1
    } else {
        2
    }
}

/// Project a 3D point to 2D by dropping `axis`, keeping the remaining
/// two coordinates in cyclic order so winding is preserved when the
/// normal points along +axis.
pub fn project_point(p: &Point3<Real>, axis: usize) -> Point2<Real> {
    match axis {
        0 => Point2::new(p.y, p.z),
        1 => Point2::new(p.z, p.x),
        _ => Point2::new(p.x, p.y),
    }
}

/// Signed area of a 2D loop (positive for counter-clockwise).
pub fn signed_area_2d(points: &[Point2<Real>]) -> Real {
    let mut area = 0.0;
    for (curr, next) in points.iter().zip(points.iter().cycle().skip(1)).take(points.len()) {
        area += curr.x * next.y - next.x * curr.y;
    }
    area * 0.5
}

/// Even-odd point-in-polygon test in 2D.
pub fn point_in_polygon_2d(p: &Point2<Real>, ring: &[Point2<Real>]) -> bool {
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from `p` to the segment `a..b`, together with the clamped
/// parameter `t` of the closest point.
pub fn point_segment_distance(
    p: &Point3<Real>,
    a: &Point3<Real>,
    b: &Point3<Real>,
) -> (Real, Real) {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= Real::EPSILON {
        return ((p - a).norm(), 0.0);
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    let closest = a + ab * t;
    ((p - closest).norm(), t)
}

/// Closest approach of two segments `a0..a1` and `b0..b1`.
/// Returns (distance, t_a, t_b) with both parameters clamped to [0, 1].
pub fn segment_segment_distance(
    a0: &Point3<Real>,
    a1: &Point3<Real>,
    b0: &Point3<Real>,
    b1: &Point3<Real>,
) -> (Real, Real, Real) {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let r = a0 - b0;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    if a <= Real::EPSILON && e <= Real::EPSILON {
        return ((a0 - b0).norm(), 0.0, 0.0);
    }

    let (mut s, mut t);
    if a <= Real::EPSILON {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(&r);
        if e <= Real::EPSILON {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            s = if denom.abs() > Real::EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
        }
    }

    let pa = a0 + d1 * s;
    let pb = b0 + d2 * t;
    ((pa - pb).norm(), s, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point3<Real>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ]
    }

    #[test]
    fn newell_of_ccw_square_points_up() {
        let n = newell_normal(&square());
        assert!(n.z > 0.0);
        assert!((loop_area(&square()) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn centroid_of_square() {
        let c = loop_centroid(&square());
        assert!((c - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn dominant_axis_picks_largest() {
        assert_eq!(dominant_axis(&Vector3::new(0.1, 0.9, 0.2)), 1);
        assert_eq!(dominant_axis(&Vector3::new(0.0, 0.0, -1.0)), 2);
    }

    #[test]
    fn point_in_polygon_square() {
        let ring: Vec<_> = square().iter().map(|p| project_point(p, 2)).collect();
        assert!(point_in_polygon_2d(&Point2::new(1.0, 1.0), &ring));
        assert!(!point_in_polygon_2d(&Point2::new(3.0, 1.0), &ring));
    }

    #[test]
    fn segment_distance_parallel() {
        let (d, _, _) = segment_segment_distance(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(1.0, 1.0, 0.0),
        );
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn segment_distance_crossing() {
        let (d, s, t) = segment_segment_distance(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, -1.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        assert!(d < 1e-9);
        assert!((s - 0.5).abs() < 1e-9);
        assert!((t - 0.5).abs() < 1e-9);
    }

    #[test]
    fn point_segment_endpoints() {
        let (d, t) = point_segment_distance(
            &Point3::new(2.0, 0.0, 0.0),
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
        );
        assert!((d - 1.0).abs() < 1e-9);
        assert!((t - 1.0).abs() < 1e-9);
    }
}
