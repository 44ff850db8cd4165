//! Coordinate normalization around the boolean step.
//!
//! Epsilon comparisons behave best when operands sit near the origin
//! at roughly unit scale. The normalizer centers both operands on the
//! midpoint of their bounding-box centers and, when worthwhile,
//! rescales the larger one toward a target extent; the transform is
//! exactly reversed on the result.

use crate::float_types::Real;
use crate::mesh::MeshSet;
use nalgebra::Vector3;

/// Extent the larger operand is scaled toward.
const TARGET_EXTENT: Real = 0.8;
/// Scale factors within this window are skipped; so close to unity the
/// numerical risk of rescaling outweighs the benefit.
const SCALE_SKIP_MIN: Real = 0.5;
const SCALE_SKIP_MAX: Real = 2.0;

/// A reversible translate-then-scale transform shared by two operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshNormalizer {
    pub translation: Vector3<Real>,
    pub scale: Real,
}

impl MeshNormalizer {
    /// Identity transform.
    pub fn identity() -> Self {
        MeshNormalizer {
            translation: Vector3::zeros(),
            scale: 1.0,
        }
    }

    /// Derive the shared frame for two operands. With `rescale` false
    /// only the centering translation is applied.
    pub fn between(a: &MeshSet, b: &MeshSet, rescale: bool) -> Self {
        let box_a = a.bounding_box();
        let box_b = b.bounding_box();
        let translation = (box_a.center().coords + box_b.center().coords) / 2.0;

        let mut scale = 1.0;
        if rescale {
            let extent_a = box_a.extents().amax();
            let extent_b = box_b.extents().amax();
            let largest = extent_a.max(extent_b);
            if largest > Real::EPSILON {
                let factor = TARGET_EXTENT / largest;
                if !(SCALE_SKIP_MIN..=SCALE_SKIP_MAX).contains(&factor) {
                    scale = factor;
                }
            }
        }
        MeshNormalizer { translation, scale }
    }

    /// Move a set into the shared frame.
    pub fn normalize(&self, set: &mut MeshSet) {
        set.translate(-self.translation);
        if self.scale != 1.0 {
            set.scale(self.scale);
        }
    }

    /// Undo [`Self::normalize`].
    pub fn denormalize(&self, set: &mut MeshSet) {
        if self.scale != 1.0 {
            set.scale(1.0 / self.scale);
        }
        set.translate(self.translation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GeometrySettings;
    use crate::shapes;
    use nalgebra::Point3;
    use proptest::prelude::*;

    #[test]
    fn centers_on_midpoint_of_operands() {
        let s = GeometrySettings::default();
        let a = shapes::cuboid_at(Point3::new(10.0, 0.0, 0.0), 1.0, 1.0, 1.0, &s);
        let b = shapes::cuboid_at(Point3::new(14.0, 0.0, 0.0), 1.0, 1.0, 1.0, &s);
        let norm = MeshNormalizer::between(&a, &b, false);
        let mut a2 = a.clone();
        norm.normalize(&mut a2);
        let c = a2.bounding_box().center();
        assert!((c.x + 2.0).abs() < 1e-9);
        assert!(c.y.abs() < 1e-9);
    }

    #[test]
    fn near_unit_scale_is_skipped() {
        let s = GeometrySettings::default();
        // extent 1.0 gives factor 0.8, inside the skip window
        let a = shapes::cube(1.0, &s);
        let b = shapes::cube(1.0, &s);
        let norm = MeshNormalizer::between(&a, &b, true);
        assert_eq!(norm.scale, 1.0);
    }

    #[test]
    fn large_operand_is_scaled_down() {
        let s = GeometrySettings::default();
        let a = shapes::cube(100.0, &s);
        let b = shapes::cube(1.0, &s);
        let norm = MeshNormalizer::between(&a, &b, true);
        assert!((norm.scale - 0.008).abs() < 1e-12);
        let mut a2 = a.clone();
        norm.normalize(&mut a2);
        assert!((a2.bounding_box().extents().amax() - 0.8).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn round_trip_restores_coordinates(
            cx in -1000.0..1000.0f64,
            cy in -1000.0..1000.0f64,
            cz in -1000.0..1000.0f64,
            size in 0.01..500.0f64,
            rescale in proptest::bool::ANY,
        ) {
            let s = GeometrySettings::default();
            let original = shapes::cuboid_at(Point3::new(cx, cy, cz), size, size, size, &s);
            let other = shapes::cube(1.0, &s);
            let norm = MeshNormalizer::between(&original, &other, rescale);
            let mut moved = original.clone();
            norm.normalize(&mut moved);
            norm.denormalize(&mut moved);
            for (p, q) in original.points.iter().zip(moved.points.iter()) {
                prop_assert!((p - q).norm() < s.eps_merge_points.max(1e-9 * size.max(cx.abs().max(cy.abs()).max(cz.abs()))));
            }
        }
    }
}
