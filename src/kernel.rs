//! Boolean-compute primitive.
//!
//! The orchestrator talks to the boolean engine through
//! [`BooleanKernel`], so the BSP implementation here can be swapped for
//! another engine without touching retry or fallback logic.

use crate::bsp::{BspPolygon, ClassifyStrategy, Node};
use crate::errors::CsgError;
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::{Aabb, BoundingVolume};
use crate::mesh::MeshSet;
use crate::settings::GeometrySettings;
use nalgebra::Point3;

/// The four supported boolean operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    Union,
    AMinusB,
    BMinusA,
    Intersection,
}

/// Face-splitting boolean engine over two closed operands.
pub trait BooleanKernel {
    fn compute(
        &self,
        a: &MeshSet,
        b: &MeshSet,
        op: BoolOp,
        strategy: ClassifyStrategy,
        settings: &GeometrySettings,
    ) -> Result<MeshSet, CsgError>;
}

/// BSP-tree implementation of [`BooleanKernel`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BspKernel;

fn polygon_aabb(poly: &BspPolygon) -> Aabb {
    let mut mins = poly.verts[0];
    let mut maxs = poly.verts[0];
    for p in &poly.verts[1..] {
        mins = mins.inf(p);
        maxs = maxs.sup(p);
    }
    Aabb::new(mins, maxs)
}

/// Separate polygons that can possibly touch the other operand from
/// those that cannot, so obviously non-intersecting faces skip the
/// splitting entirely.
fn partition_polys(polys: Vec<BspPolygon>, other: &Aabb, eps: Real) -> (Vec<BspPolygon>, Vec<BspPolygon>) {
    let grown = other.loosened(eps);
    polys
        .into_iter()
        .partition(|p| grown.intersects(&polygon_aabb(p)))
}

fn to_polygons(set: &MeshSet) -> Vec<BspPolygon> {
    set.to_face_loops()
        .into_iter()
        .filter_map(BspPolygon::new)
        .collect()
}

fn rebuild(polys: Vec<BspPolygon>, settings: &GeometrySettings) -> MeshSet {
    let loops: Vec<Vec<Point3<Real>>> = polys.into_iter().map(|p| p.verts).collect();
    MeshSet::from_face_loops(&loops, settings)
}

impl BspKernel {
    fn union(
        a_polys: Vec<BspPolygon>,
        b_polys: Vec<BspPolygon>,
        a_box: &Aabb,
        b_box: &Aabb,
        strategy: ClassifyStrategy,
        eps: Real,
    ) -> Vec<BspPolygon> {
        let (a_clip, a_passthru) = partition_polys(a_polys, b_box, eps);
        let (b_clip, b_passthru) = partition_polys(b_polys, a_box, eps);

        let mut a = Node::from_polygons(&a_clip, strategy);
        let mut b = Node::from_polygons(&b_clip, strategy);

        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());

        let mut final_polys = a.all_polygons();
        final_polys.extend(a_passthru);
        final_polys.extend(b_passthru);
        final_polys
    }

    fn difference(
        a_polys: Vec<BspPolygon>,
        b_polys: Vec<BspPolygon>,
        b_box: &Aabb,
        strategy: ClassifyStrategy,
        eps: Real,
    ) -> Vec<BspPolygon> {
        let (a_clip, a_passthru) = partition_polys(a_polys, b_box, eps);
        // the subtrahend tree must stay complete: a minuend swallowed
        // whole intersects none of B's faces, yet every one of its
        // polygons has to land behind B's planes to be clipped away
        let mut a = Node::from_polygons(&a_clip, strategy);
        let mut b = Node::from_polygons(&b_polys, strategy);

        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());
        a.invert();

        let mut final_polys = a.all_polygons();
        final_polys.extend(a_passthru);
        final_polys
    }

    fn intersection(
        a_polys: Vec<BspPolygon>,
        b_polys: Vec<BspPolygon>,
        strategy: ClassifyStrategy,
    ) -> Vec<BspPolygon> {
        let mut a = Node::from_polygons(&a_polys, strategy);
        let mut b = Node::from_polygons(&b_polys, strategy);

        a.invert();
        b.clip_to(&a);
        b.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        a.build(&b.all_polygons());
        a.invert();

        a.all_polygons()
    }
}

impl BooleanKernel for BspKernel {
    fn compute(
        &self,
        a: &MeshSet,
        b: &MeshSet,
        op: BoolOp,
        strategy: ClassifyStrategy,
        settings: &GeometrySettings,
    ) -> Result<MeshSet, CsgError> {
        if let BoolOp::BMinusA = op {
            return self.compute(b, a, BoolOp::AMinusB, strategy, settings);
        }
        let a_polys = to_polygons(a);
        let b_polys = to_polygons(b);
        if a_polys.is_empty() || b_polys.is_empty() {
            return Err(CsgError::EmptyOperand);
        }
        let a_box = a.bounding_box();
        let b_box = b.bounding_box();
        let eps = settings.eps_merge_points;

        let final_polys = match op {
            BoolOp::Union => Self::union(a_polys, b_polys, &a_box, &b_box, strategy, eps),
            BoolOp::AMinusB => Self::difference(a_polys, b_polys, &b_box, strategy, eps),
            BoolOp::Intersection => Self::intersection(a_polys, b_polys, strategy),
            BoolOp::BMinusA => unreachable!("handled by operand swap above"),
        };
        Ok(rebuild(final_polys, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use nalgebra::Point3;

    fn settings() -> GeometrySettings {
        GeometrySettings::default()
    }

    #[test]
    fn union_of_disjoint_cubes_keeps_both() {
        let s = settings();
        let a = shapes::cube(1.0, &s);
        let b = shapes::cuboid_at(Point3::new(5.0, 0.0, 0.0), 1.0, 1.0, 1.0, &s);
        let out = BspKernel
            .compute(&a, &b, BoolOp::Union, ClassifyStrategy::Edge, &s)
            .unwrap();
        assert!((out.total_volume() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn overlapping_union_volume() {
        let s = settings();
        // unit cubes overlapping by half
        let a = shapes::cube(1.0, &s);
        let b = shapes::cuboid_at(Point3::new(0.5, 0.0, 0.0), 1.0, 1.0, 1.0, &s);
        let out = BspKernel
            .compute(&a, &b, BoolOp::Union, ClassifyStrategy::Edge, &s)
            .unwrap();
        assert!((out.total_volume() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn difference_carves_overlap() {
        let s = settings();
        let a = shapes::cube(1.0, &s);
        let b = shapes::cuboid_at(Point3::new(0.5, 0.0, 0.0), 1.0, 1.0, 1.0, &s);
        let out = BspKernel
            .compute(&a, &b, BoolOp::AMinusB, ClassifyStrategy::Edge, &s)
            .unwrap();
        assert!((out.total_volume() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn difference_with_enclosing_subtrahend_is_empty() {
        let s = settings();
        let a = shapes::cube(1.0, &s);
        let b = shapes::cube(3.0, &s);
        // none of b's faces touch a's box, but a must still vanish
        let out = BspKernel
            .compute(&a, &b, BoolOp::AMinusB, ClassifyStrategy::Edge, &s)
            .unwrap();
        assert!(out.total_volume().abs() < 1e-9, "minuend survived");
        assert_eq!(out.face_count(), 0);
    }

    #[test]
    fn b_minus_a_is_swapped_difference() {
        let s = settings();
        let a = shapes::cube(1.0, &s);
        let b = shapes::cuboid_at(Point3::new(0.25, 0.0, 0.0), 0.5, 0.5, 0.5, &s);
        let out = BspKernel
            .compute(&a, &b, BoolOp::BMinusA, ClassifyStrategy::Edge, &s)
            .unwrap();
        // b is entirely inside a, so b minus a is empty
        assert!(out.total_volume().abs() < 1e-6);
    }

    #[test]
    fn intersection_of_half_overlap() {
        let s = settings();
        let a = shapes::cube(1.0, &s);
        let b = shapes::cuboid_at(Point3::new(0.5, 0.0, 0.0), 1.0, 1.0, 1.0, &s);
        let out = BspKernel
            .compute(&a, &b, BoolOp::Intersection, ClassifyStrategy::Edge, &s)
            .unwrap();
        assert!((out.total_volume() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_operand_is_an_error() {
        let s = settings();
        let a = shapes::cube(1.0, &s);
        let empty = MeshSet::new();
        assert!(matches!(
            BspKernel.compute(&a, &empty, BoolOp::Union, ClassifyStrategy::Edge, &s),
            Err(CsgError::EmptyOperand)
        ));
    }
}
