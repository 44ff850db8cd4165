//! Tunables for validation, repair and CSG.
//!
//! All thresholds are in mesh coordinate units. The size caps that bound
//! worst-case repair cost are named fields here rather than inline
//! constants so the cap-exceeded paths can be exercised with small
//! fixtures.

use crate::float_types::{EPSILON, Real};

/// Crate-wide geometric tolerances and size caps.
///
/// Not synchronized: clone per thread if operations run in parallel at the
/// caller level.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySettings {
    /// Distance below which two points are considered the same.
    pub eps_merge_points: Real,
    /// Angular tolerance (radians) for treating two face normals as
    /// parallel during coplanar merging and fin detection.
    pub eps_coplanar_angle: Real,
    /// Faces below this area (with all edges below `eps_merge_points`)
    /// count as zero-area.
    pub min_face_area: Real,
    /// Merges never grow a face loop beyond this many edges.
    pub max_edges_per_face: usize,
    /// Operands with more vertices than this are rejected before the
    /// boolean kernel runs.
    pub max_operand_vertices: usize,
    /// Repair passes skip mesh-sets with more faces than this.
    pub max_repair_faces: usize,
    /// Open-edge resolution skips mesh-sets with more open edges than
    /// this.
    pub max_open_edges: usize,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            eps_merge_points: EPSILON,
            eps_coplanar_angle: 1e-3,
            min_face_area: 1e-9,
            max_edges_per_face: 64,
            max_operand_vertices: 4000,
            max_repair_faces: 10_000,
            max_open_edges: 1000,
        }
    }
}

impl GeometrySettings {
    /// Set the point-merge distance.
    #[must_use]
    pub fn with_eps_merge_points(mut self, eps: Real) -> Self {
        self.eps_merge_points = eps;
        self
    }

    /// Set the coplanar-angle tolerance in radians.
    #[must_use]
    pub fn with_eps_coplanar_angle(mut self, eps: Real) -> Self {
        self.eps_coplanar_angle = eps;
        self
    }

    /// Set the zero-area face threshold.
    #[must_use]
    pub fn with_min_face_area(mut self, area: Real) -> Self {
        self.min_face_area = area;
        self
    }

    /// Set the repair face cap.
    #[must_use]
    pub fn with_max_repair_faces(mut self, cap: usize) -> Self {
        self.max_repair_faces = cap;
        self
    }

    /// Set the open-edge resolution cap.
    #[must_use]
    pub fn with_max_open_edges(mut self, cap: usize) -> Self {
        self.max_open_edges = cap;
        self
    }

    /// Set the operand vertex cap.
    #[must_use]
    pub fn with_max_operand_vertices(mut self, cap: usize) -> Self {
        self.max_operand_vertices = cap;
        self
    }

    /// Cosine threshold used for "normals are parallel" tests.
    pub fn coplanar_cos(&self) -> Real {
        self.eps_coplanar_angle.cos()
    }
}

/// Per-operation policy flags threaded through validation and repair.
///
/// Created fresh for each top-level operation and passed by reference;
/// never shared across concurrent operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeomProcessingParams {
    /// Tolerate degenerate edges in a mesh that is otherwise valid.
    pub allow_degenerate_edges: bool,
    /// Tolerate fin edges (back-to-back faces) in a valid mesh.
    pub allow_fin_edges: bool,
    /// Tolerate whole fin face pairs in the final result.
    pub allow_fin_faces_in_result: bool,
}

impl Default for GeomProcessingParams {
    fn default() -> Self {
        Self {
            allow_degenerate_edges: false,
            allow_fin_edges: false,
            allow_fin_faces_in_result: false,
        }
    }
}

impl GeomProcessingParams {
    #[must_use]
    pub fn with_allow_degenerate_edges(mut self, allow: bool) -> Self {
        self.allow_degenerate_edges = allow;
        self
    }

    #[must_use]
    pub fn with_allow_fin_edges(mut self, allow: bool) -> Self {
        self.allow_fin_edges = allow;
        self
    }

    #[must_use]
    pub fn with_allow_fin_faces_in_result(mut self, allow: bool) -> Self {
        self.allow_fin_faces_in_result = allow;
        self
    }
}

/// One attempt in the CSG retry escalation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsgOperationParams {
    /// Multiplier applied to `eps_merge_points` for this attempt.
    pub epsilon_scale: Real,
    /// Snap near-coplanar face pairs between the operands onto a shared
    /// plane before the boolean runs.
    pub flatten_coplanar_pairs: bool,
    /// Policy flags for validating this attempt's result.
    pub processing: GeomProcessingParams,
    /// Normalize operand coordinates into a local frame first.
    pub normalize_coordinates: bool,
}

impl Default for CsgOperationParams {
    fn default() -> Self {
        Self {
            epsilon_scale: 1.0,
            flatten_coplanar_pairs: false,
            processing: GeomProcessingParams::default(),
            normalize_coordinates: true,
        }
    }
}

impl CsgOperationParams {
    /// The fixed escalation table tried in order until one attempt
    /// produces an acceptable result. Later rows progressively relax
    /// what the validator tolerates and perturb the working epsilon both
    /// up and down, since either direction can resolve a borderline
    /// classification.
    pub fn retry_schedule() -> Vec<CsgOperationParams> {
        let relaxed = GeomProcessingParams::default()
            .with_allow_degenerate_edges(true)
            .with_allow_fin_edges(true);
        let fully_relaxed = relaxed.with_allow_fin_faces_in_result(true);

        vec![
            CsgOperationParams::default(),
            CsgOperationParams {
                flatten_coplanar_pairs: true,
                ..CsgOperationParams::default()
            },
            CsgOperationParams {
                epsilon_scale: 15.3,
                ..CsgOperationParams::default()
            },
            CsgOperationParams {
                epsilon_scale: 0.11,
                ..CsgOperationParams::default()
            },
            CsgOperationParams {
                epsilon_scale: 15.3,
                flatten_coplanar_pairs: true,
                processing: relaxed,
                ..CsgOperationParams::default()
            },
            CsgOperationParams {
                normalize_coordinates: false,
                processing: relaxed,
                ..CsgOperationParams::default()
            },
            CsgOperationParams {
                epsilon_scale: 15.3,
                processing: fully_relaxed,
                normalize_coordinates: false,
                flatten_coplanar_pairs: true,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_documented_caps() {
        let settings = GeometrySettings::default();
        assert_eq!(settings.max_operand_vertices, 4000);
        assert_eq!(settings.max_repair_faces, 10_000);
        assert_eq!(settings.max_open_edges, 1000);
    }

    #[test]
    fn retry_schedule_starts_strict() {
        let schedule = CsgOperationParams::retry_schedule();
        assert!(schedule.len() >= 3);
        assert_eq!(schedule[0], CsgOperationParams::default());
        // every later attempt differs from the first
        for attempt in &schedule[1..] {
            assert_ne!(*attempt, schedule[0]);
        }
    }

    #[test]
    fn builder_overrides() {
        let settings = GeometrySettings::default()
            .with_max_repair_faces(8)
            .with_max_open_edges(2);
        assert_eq!(settings.max_repair_faces, 8);
        assert_eq!(settings.max_open_edges, 2);
    }
}
