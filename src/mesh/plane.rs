//! Plane representation and robust point classification.

use crate::float_types::{EPSILON, Real};
use crate::geometry::newell_normal;
use nalgebra::{Point3, Vector3};

// Classification constants, usable as a bitmask.
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane in Hessian normal form: `normal · p = w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal vector of the plane
    pub normal: Vector3<Real>,
    /// Distance from origin along normal
    pub w: Real,
}

impl Plane {
    /// Create a plane from a (possibly non-unit) normal and a point on it.
    pub fn from_normal_and_point(normal: Vector3<Real>, point: &Point3<Real>) -> Self {
        let n = normal.normalize();
        Plane {
            normal: n,
            w: n.dot(&point.coords),
        }
    }

    /// Create a plane from three points, right-hand rule winding.
    /// A degenerate triangle yields the +Z plane through the origin.
    pub fn from_points(p1: &Point3<Real>, p2: &Point3<Real>, p3: &Point3<Real>) -> Self {
        let normal = (p2 - p1).cross(&(p3 - p1));
        if normal.norm_squared() < Real::EPSILON {
            return Plane {
                normal: Vector3::z(),
                w: 0.0,
            };
        }
        let normal = normal.normalize();
        Plane {
            normal,
            w: normal.dot(&p1.coords),
        }
    }

    /// Best-fit plane of a full vertex loop via Newell's method, oriented
    /// with the loop winding. Falls back to the first-triangle plane for
    /// loops whose Newell sum vanishes.
    pub fn from_loop(points: &[Point3<Real>]) -> Self {
        if points.len() < 3 {
            return Plane {
                normal: Vector3::z(),
                w: 0.0,
            };
        }
        let n = newell_normal(points);
        if n.norm_squared() < Real::EPSILON {
            return Self::from_points(&points[0], &points[1], &points[2]);
        }
        let normal = n.normalize();
        let centroid = crate::geometry::loop_centroid(points);
        Plane {
            normal,
            w: normal.dot(&centroid.coords),
        }
    }

    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub const fn offset(&self) -> Real {
        self.w
    }

    /// Reverse the plane orientation in place.
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Return a flipped copy of this plane.
    pub fn flipped(&self) -> Self {
        Plane {
            normal: -self.normal,
            w: -self.w,
        }
    }

    /// Signed distance from the plane to `point`.
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Project `point` onto the plane.
    pub fn project(&self, point: &Point3<Real>) -> Point3<Real> {
        point - self.normal * self.signed_distance(point)
    }

    /// Classify a point against the plane using the `robust` orient3d
    /// predicate, with EPSILON as the coplanarity band.
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        // Three non-collinear points spanning the plane.
        let p0 = Point3::from(self.normal * self.w);
        let mut u = if self.normal.z.abs() > self.normal.x.abs()
            || self.normal.z.abs() > self.normal.y.abs()
        {
            Vector3::x().cross(&self.normal)
        } else {
            Vector3::z().cross(&self.normal)
        };
        u.normalize_mut();
        let v = self.normal.cross(&u).normalize();

        let a = p0;
        let b = p0 + u;
        let c = p0 + v;

        let sign = robust::orient3d(
            robust::Coord3D {
                x: a.x as f64,
                y: a.y as f64,
                z: a.z as f64,
            },
            robust::Coord3D {
                x: b.x as f64,
                y: b.y as f64,
                z: b.z as f64,
            },
            robust::Coord3D {
                x: c.x as f64,
                y: c.y as f64,
                z: c.z as f64,
            },
            robust::Coord3D {
                x: point.x as f64,
                y: point.y as f64,
                z: point.z as f64,
            },
        );

        if sign > EPSILON as f64 {
            BACK
        } else if sign < -(EPSILON as f64) {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Orientation of another plane relative to this one, used to sort
    /// coplanar fragments during BSP clipping.
    pub fn orient_plane(&self, other: &Plane) -> i8 {
        let dot = self.normal.dot(&other.normal);
        if dot > 1.0 - EPSILON {
            FRONT
        } else if dot < -(1.0 - EPSILON) {
            BACK
        } else if dot > EPSILON {
            FRONT
        } else if dot < -EPSILON {
            BACK
        } else {
            COPLANAR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_z_plane() {
        let plane = Plane::from_points(
            &Point3::new(0.0, 0.0, 1.0),
            &Point3::new(1.0, 0.0, 1.0),
            &Point3::new(0.0, 1.0, 1.0),
        );
        assert!((plane.normal - Vector3::z()).norm() < 1e-9);
        assert!((plane.w - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_points_default_to_z() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let plane = Plane::from_points(&p, &p, &p);
        assert_eq!(plane.normal, Vector3::z());
    }

    #[test]
    fn orient_point_sides() {
        let plane = Plane::from_points(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(plane.orient_point(&Point3::new(0.3, 0.3, 1.0)), FRONT);
        assert_eq!(plane.orient_point(&Point3::new(0.3, 0.3, -1.0)), BACK);
        assert_eq!(plane.orient_point(&Point3::new(0.3, 0.3, 0.0)), COPLANAR);
    }

    #[test]
    fn project_lands_on_plane() {
        let plane = Plane::from_normal_and_point(Vector3::z(), &Point3::new(0.0, 0.0, 2.0));
        let projected = plane.project(&Point3::new(1.0, 1.0, 5.0));
        assert!((projected.z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn flip_reverses_distance_sign() {
        let plane = Plane::from_normal_and_point(Vector3::z(), &Point3::new(0.0, 0.0, 1.0));
        let p = Point3::new(0.0, 0.0, 3.0);
        assert!(plane.signed_distance(&p) > 0.0);
        assert!(plane.flipped().signed_distance(&p) < 0.0);
    }
}
