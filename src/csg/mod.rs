//! CSG orchestration.
//!
//! [`CsgEngine`] wraps the boolean kernel with everything that makes it
//! survivable on real-world input: coordinate normalization, operand
//! validation and repair, nested-shell separation, result sanity
//! checks, a parameter-escalation retry table, and a documented
//! fallback policy when every attempt fails. Failure is expressed
//! through [`CsgOutcome::success`], never through panics or errors
//! escaping this layer.

pub mod normalize;

use crate::bsp::ClassifyStrategy;
use crate::errors::CsgError;
use crate::float_types::parry3d::bounding_volume::BoundingVolume;
use crate::kernel::{BoolOp, BooleanKernel, BspKernel};
use crate::mesh::{MeshSet, merge_sets};
use crate::repair::simplify;
use crate::settings::{CsgOperationParams, GeometrySettings};
use crate::telemetry::{DiagnosticSink, Severity};
use crate::validate::{MeshSetInfo, is_better, validate};
use normalize::MeshNormalizer;

/// Result of a CSG computation. `result` always holds a usable shape
/// (possibly a fallback operand, possibly empty) even when `success`
/// is false.
#[derive(Debug, Clone)]
pub struct CsgOutcome {
    pub success: bool,
    pub result: MeshSet,
}

/// Boolean-operation orchestrator over a pluggable kernel.
pub struct CsgEngine<K: BooleanKernel = BspKernel> {
    kernel: K,
    settings: GeometrySettings,
}

impl CsgEngine<BspKernel> {
    pub fn new(settings: GeometrySettings) -> Self {
        CsgEngine {
            kernel: BspKernel,
            settings,
        }
    }
}

impl<K: BooleanKernel> CsgEngine<K> {
    pub fn with_kernel(kernel: K, settings: GeometrySettings) -> Self {
        CsgEngine { kernel, settings }
    }

    /// The documented fallback: A−B keeps A, B−A keeps B, union keeps
    /// A; intersection has no single-operand stand-in and comes back
    /// empty.
    fn fallback(
        &self,
        a: &MeshSet,
        b: Option<&MeshSet>,
        op: BoolOp,
        reason: &CsgError,
        sink: &dyn DiagnosticSink,
    ) -> CsgOutcome {
        sink.report(
            Severity::Warning,
            "compute_csg",
            None,
            &format!("boolean failed, using fallback operand: {reason}"),
        );
        let result = match op {
            BoolOp::AMinusB | BoolOp::Union => a.clone(),
            BoolOp::BMinusA => b.cloned().unwrap_or_default(),
            BoolOp::Intersection => MeshSet::new(),
        };
        CsgOutcome {
            success: false,
            result,
        }
    }

    /// Compute `a <op> b` with retries and fallback. `b` may be absent,
    /// which always takes the fallback path.
    pub fn compute(
        &self,
        a: &MeshSet,
        b: Option<&MeshSet>,
        op: BoolOp,
        sink: &dyn DiagnosticSink,
    ) -> CsgOutcome {
        let Some(b) = b else {
            return self.fallback(a, None, op, &CsgError::EmptyOperand, sink);
        };
        if a.is_empty() || b.is_empty() {
            return self.fallback(a, Some(b), op, &CsgError::EmptyOperand, sink);
        }
        if std::ptr::eq(a, b) {
            return self.fallback(
                a,
                Some(b),
                op,
                &CsgError::InvalidOperand("operands are the same object".into()),
                sink,
            );
        }
        for (set, name) in [(a, "A"), (b, "B")] {
            let count = set.vertex_count();
            if count > self.settings.max_operand_vertices {
                sink.report(
                    Severity::Warning,
                    "compute_csg",
                    None,
                    &format!("operand {name} has {count} vertices"),
                );
                return self.fallback(
                    a,
                    Some(b),
                    op,
                    &CsgError::OperandTooLarge {
                        count,
                        cap: self.settings.max_operand_vertices,
                    },
                    sink,
                );
            }
        }
        if op != BoolOp::Union {
            let eps = self.settings.eps_merge_points;
            if !a
                .bounding_box()
                .loosened(eps)
                .intersects(&b.bounding_box())
            {
                return self.fallback(a, Some(b), op, &CsgError::DisjointOperands, sink);
            }
        }
        // operands carrying the same nonzero defect census are almost
        // certainly copies of one broken solid
        let zero_a = count_zero_area(a, &self.settings, sink);
        let zero_b = count_zero_area(b, &self.settings, sink);
        if zero_a > 0 && zero_a == zero_b {
            return self.fallback(
                a,
                Some(b),
                op,
                &CsgError::InvalidOperand("operands share identical degenerate-face counts".into()),
                sink,
            );
        }

        for (attempt, params) in CsgOperationParams::retry_schedule().iter().enumerate() {
            sink.report(
                Severity::Debug,
                "compute_csg",
                None,
                &format!("attempt {attempt}: {params:?}"),
            );
            if let Some(result) = self.attempt(a, b, op, params, sink) {
                return CsgOutcome {
                    success: true,
                    result,
                };
            }
        }
        self.fallback(
            a,
            Some(b),
            op,
            &CsgError::KernelFailed("all retry parameter sets exhausted".into()),
            sink,
        )
    }

    /// Fold a running accumulator against a list of operands, largest
    /// volume first; big cuts early keep later operands simpler. One
    /// failed step falls back and the chain keeps going.
    pub fn compute_chain(
        &self,
        initial: &MeshSet,
        operands: &[MeshSet],
        op: BoolOp,
        sink: &dyn DiagnosticSink,
    ) -> CsgOutcome {
        let mut order: Vec<usize> = (0..operands.len()).collect();
        order.sort_by(|&i, &j| {
            operands[j]
                .total_volume()
                .partial_cmp(&operands[i].total_volume())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut acc = initial.clone();
        let mut success = true;
        for idx in order {
            let step = self.compute(&acc, Some(&operands[idx]), op, sink);
            success &= step.success;
            acc = step.result;
        }
        CsgOutcome {
            success,
            result: acc,
        }
    }

    /// One full attempt under a fixed parameter row. Returns the
    /// denormalized result on success.
    fn attempt(
        &self,
        a: &MeshSet,
        b: &MeshSet,
        op: BoolOp,
        params: &CsgOperationParams,
        sink: &dyn DiagnosticSink,
    ) -> Option<MeshSet> {
        let mut settings = self.settings.clone();
        settings.eps_merge_points *= params.epsilon_scale;

        let norm = if params.normalize_coordinates {
            MeshNormalizer::between(a, b, true)
        } else {
            MeshNormalizer::identity()
        };
        let mut na = a.clone();
        let mut nb = b.clone();
        norm.normalize(&mut na);
        norm.normalize(&mut nb);

        let mut na = self.prepare_operand(na, a, &norm, params, &settings, sink)?;
        let mut nb = self.prepare_operand(nb, b, &norm, params, &settings, sink)?;

        if params.flatten_coplanar_pairs {
            flatten_coplanar_pairs(&na, &mut nb, &settings);
        }

        na = self.resolve_nested_shells(na, params, &settings, sink);
        nb = self.resolve_nested_shells(nb, params, &settings, sink);

        let edge = self.run_strategy(&na, &nb, op, ClassifyStrategy::Edge, params, &settings, sink);
        if let Some((candidate, true, info)) = &edge {
            if self.result_plausible(op, &na, &nb, candidate, info, &settings) {
                let mut result = candidate.clone();
                norm.denormalize(&mut result);
                return Some(result);
            }
        }

        // an A−B whose minuend is swallowed whole is legitimately empty
        if op == BoolOp::AMinusB
            && nb
                .bounding_box()
                .loosened(settings.eps_merge_points)
                .contains(&na.bounding_box())
            && nb.contains_point(&na.bounding_box().center())
        {
            sink.report(
                Severity::Info,
                "compute_csg",
                None,
                "subtrahend bounding box swallows minuend, returning empty result",
            );
            return Some(MeshSet::new());
        }

        let normal =
            self.run_strategy(&na, &nb, op, ClassifyStrategy::Normal, params, &settings, sink);
        // keep whichever strategy produced the better candidate
        let best = match (edge, normal) {
            (Some((_, _, ref ei)), Some((cm, ok, mi))) if is_better(&mi, ei) => Some((cm, ok, mi)),
            (Some(e), _) => Some(e),
            (None, n) => n,
        };
        if let Some((candidate, true, info)) = best {
            if self.result_plausible(op, &na, &nb, &candidate, &info, &settings) {
                let mut result = candidate;
                norm.denormalize(&mut result);
                return Some(result);
            }
            let err = CsgError::ResultRejected(format!(
                "volume {:.6} or extents outside the plausibility band",
                info.total_volume
            ));
            sink.report(Severity::Warning, "compute_csg", None, &err.to_string());
        }
        None
    }

    /// Validate an operand, repairing and re-normalizing once before
    /// giving up on it.
    fn prepare_operand(
        &self,
        normalized: MeshSet,
        original: &MeshSet,
        norm: &MeshNormalizer,
        params: &CsgOperationParams,
        settings: &GeometrySettings,
        sink: &dyn DiagnosticSink,
    ) -> Option<MeshSet> {
        let mut work = normalized;
        let (ok, _) = validate(&mut work, &params.processing, settings, sink);
        if ok {
            return Some(work);
        }
        let mut repaired = simplify(&work, &params.processing, settings, sink);
        let (ok, _) = validate(&mut repaired, &params.processing, settings, sink);
        if ok {
            return Some(repaired);
        }
        // rule out the normalization itself: one fresh clone, one retry
        let mut fresh = original.clone();
        norm.normalize(&mut fresh);
        let (ok, _) = validate(&mut fresh, &params.processing, settings, sink);
        if ok {
            sink.report(
                Severity::Info,
                "compute_csg",
                None,
                "operand valid after re-normalization from a fresh clone",
            );
            return Some(fresh);
        }
        sink.report(
            Severity::Warning,
            "compute_csg",
            None,
            "operand invalid after repair and re-normalization",
        );
        None
    }

    /// Run the kernel with one classification strategy and clean up the
    /// raw result. Returns the candidate, its verdict, and its census.
    #[allow(clippy::too_many_arguments)]
    fn run_strategy(
        &self,
        a: &MeshSet,
        b: &MeshSet,
        op: BoolOp,
        strategy: ClassifyStrategy,
        params: &CsgOperationParams,
        settings: &GeometrySettings,
        sink: &dyn DiagnosticSink,
    ) -> Option<(MeshSet, bool, MeshSetInfo)> {
        let raw = match self.kernel.compute(a, b, op, strategy, settings) {
            Ok(raw) => raw,
            Err(err) => {
                sink.report(
                    Severity::Warning,
                    "compute_csg",
                    None,
                    &format!("kernel failed with {strategy:?} strategy: {err}"),
                );
                return None;
            },
        };
        let mut candidate = raw;
        let (mut ok, mut info) = validate(&mut candidate, &params.processing, settings, sink);
        if !ok || info.degenerate_edges > 0 {
            let mut repaired = simplify(&candidate, &params.processing, settings, sink);
            let (rok, rinfo) = validate(&mut repaired, &params.processing, settings, sink);
            if rok || is_better(&rinfo, &info) {
                candidate = repaired;
                ok = rok;
                info = rinfo;
            }
        }
        Some((candidate, ok, info))
    }

    /// Sanity checks for difference results. The volume of A−B must lie
    /// within `[(volA − volB) × 0.99, volA]`, and on every axis side
    /// where the subtrahend's box stays short of the minuend's, the
    /// result must keep the minuend's extent: material out there was
    /// unreachable by the cut.
    #[allow(clippy::too_many_arguments)]
    fn result_plausible(
        &self,
        op: BoolOp,
        a: &MeshSet,
        b: &MeshSet,
        candidate: &MeshSet,
        info: &MeshSetInfo,
        settings: &GeometrySettings,
    ) -> bool {
        let (minuend, subtrahend) = match op {
            BoolOp::AMinusB => (a, b),
            BoolOp::BMinusA => (b, a),
            _ => return true,
        };
        let vol_m = minuend.total_volume();
        let vol_s = subtrahend.total_volume();
        let slack = settings.eps_merge_points;
        let lower = ((vol_m - vol_s) * 0.99).max(0.0) - slack;
        let upper = vol_m + slack;
        if info.total_volume < lower || info.total_volume > upper {
            return false;
        }
        if candidate.is_empty() {
            return true;
        }
        let m = minuend.bounding_box();
        let s = subtrahend.bounding_box();
        let r = candidate.bounding_box();
        for axis in 0..3 {
            if s.mins[axis] > m.mins[axis] + slack
                && (r.mins[axis] - m.mins[axis]).abs() > slack
            {
                return false;
            }
            if s.maxs[axis] < m.maxs[axis] - slack
                && (r.maxs[axis] - m.maxs[axis]).abs() > slack
            {
                return false;
            }
        }
        true
    }

    /// Split a multi-shell operand with nested shells into outer and
    /// inner groups and realize the cavities through a dedicated A−B,
    /// which the generic boolean path cannot express.
    fn resolve_nested_shells(
        &self,
        set: MeshSet,
        params: &CsgOperationParams,
        settings: &GeometrySettings,
        sink: &dyn DiagnosticSink,
    ) -> MeshSet {
        if set.meshes.len() < 2 {
            return set;
        }
        let mut inner = Vec::new();
        let mut outer = Vec::new();
        for (i, mesh) in set.meshes.iter().enumerate() {
            let nested = mesh.is_negative || {
                mesh.alive_faces().next().is_some_and(|face| {
                    let probe = mesh.face_centroid(face, &set.points);
                    set.meshes
                        .iter()
                        .enumerate()
                        .any(|(j, other)| j != i && other.contains_point(&probe, &set.points))
                })
            };
            if nested {
                inner.push(i);
            } else {
                outer.push(i);
            }
        }
        if inner.is_empty() || outer.is_empty() {
            return set;
        }
        sink.report(
            Severity::Info,
            "compute_csg",
            None,
            &format!(
                "separating {} outer and {} inner shells before the boolean",
                outer.len(),
                inner.len()
            ),
        );
        let outer_sets: Vec<MeshSet> = outer
            .iter()
            .map(|&i| set.extract_shell(i, settings))
            .collect();
        let inner_sets: Vec<MeshSet> = inner
            .iter()
            .map(|&i| set.extract_shell(i, settings))
            .collect();
        let outer_refs: Vec<&MeshSet> = outer_sets.iter().collect();
        let inner_refs: Vec<&MeshSet> = inner_sets.iter().collect();
        let mut outer_merged = merge_sets(&outer_refs, settings);
        let mut inner_merged = merge_sets(&inner_refs, settings);
        // cavities were stored positively oriented; the subtrahend
        // needs plain outward solids
        for m in &mut inner_merged.meshes {
            m.is_negative = false;
        }
        for m in &mut outer_merged.meshes {
            m.is_negative = false;
        }
        match self.kernel.compute(
            &outer_merged,
            &inner_merged,
            BoolOp::AMinusB,
            ClassifyStrategy::Edge,
            settings,
        ) {
            Ok(mut carved) => {
                let (ok, _) = validate(&mut carved, &params.processing, settings, sink);
                if ok { carved } else { set }
            },
            Err(err) => {
                sink.report(
                    Severity::Warning,
                    "compute_csg",
                    None,
                    &format!("nested-shell separation failed: {err}"),
                );
                set
            },
        }
    }
}

/// Zero-area face count of an operand, measured on a scratch clone.
fn count_zero_area(set: &MeshSet, settings: &GeometrySettings, sink: &dyn DiagnosticSink) -> usize {
    let mut scratch = set.clone();
    let params = crate::settings::GeomProcessingParams::default()
        .with_allow_degenerate_edges(true)
        .with_allow_fin_edges(true)
        .with_allow_fin_faces_in_result(true);
    let (_, info) = validate(&mut scratch, &params, settings, sink);
    info.zero_area_faces
}

/// Snap near-coplanar face pairs between the two operands onto shared
/// planes, so the kernel sees them as exactly coplanar instead of
/// producing sliver intersections.
fn flatten_coplanar_pairs(a: &MeshSet, b: &mut MeshSet, settings: &GeometrySettings) {
    let cos_tol = settings.coplanar_cos();
    let eps = settings.eps_merge_points;
    let planes_a: Vec<crate::mesh::Plane> = a
        .meshes
        .iter()
        .flat_map(|m| m.alive_faces().map(|f| m.faces[f].plane).collect::<Vec<_>>())
        .collect();
    for mesh in &b.meshes {
        let faces: Vec<usize> = mesh.alive_faces().collect();
        for face in faces {
            let plane_b = mesh.faces[face].plane;
            // same geometric plane: parallel normals with matching signed
            // offsets, or anti-parallel normals with negated offsets
            let Some(target) = planes_a.iter().find(|pa| {
                let dot = pa.normal.dot(&plane_b.normal);
                (dot > cos_tol && (pa.w - plane_b.w).abs() < eps)
                    || (dot < -cos_tol && (pa.w + plane_b.w).abs() < eps)
            }) else {
                continue;
            };
            for v in mesh.face_vertices(face) {
                b.points[v] = target.project(&b.points[v]);
            }
        }
    }
    b.refresh_planes();
}
