//! Half-edge boundary representation.
//!
//! A [`MeshSet`] owns a shared vertex pool and one [`Mesh`] per connected
//! shell. Construction goes through [`MeshSet::from_face_loops`], which
//! welds nearby vertices, pairs opposite half-edges, and splits the
//! result into shells.

pub mod halfedge;
pub mod plane;

pub use halfedge::{Face, HalfEdge, Mesh};
pub use plane::Plane;

use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::settings::GeometrySettings;
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

/// A set of mesh shells over one shared vertex pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSet {
    pub points: Vec<Point3<Real>>,
    pub meshes: Vec<Mesh>,
}

/// Welds points that fall within a merge radius of each other, handing
/// out stable indices into a growing point pool.
pub(crate) struct PointWelder {
    eps: Real,
    cells: HashMap<(i64, i64, i64), Vec<usize>>,
    pub points: Vec<Point3<Real>>,
}

impl PointWelder {
    pub fn new(eps: Real) -> Self {
        PointWelder {
            eps: eps.max(Real::EPSILON),
            cells: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn cell_of(&self, p: &Point3<Real>) -> (i64, i64, i64) {
        (
            (p.x / self.eps).floor() as i64,
            (p.y / self.eps).floor() as i64,
            (p.z / self.eps).floor() as i64,
        )
    }

    /// Return the index of an existing point within `eps`, or insert.
    pub fn weld(&mut self, p: Point3<Real>) -> usize {
        let (cx, cy, cz) = self.cell_of(&p);
        let eps2 = self.eps * self.eps;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        for &idx in bucket {
                            if (self.points[idx] - p).norm_squared() <= eps2 {
                                return idx;
                            }
                        }
                    }
                }
            }
        }
        let idx = self.points.len();
        self.points.push(p);
        self.cells.entry((cx, cy, cz)).or_default().push(idx);
        idx
    }
}

impl MeshSet {
    pub fn new() -> Self {
        MeshSet::default()
    }

    /// Build a mesh set from polygon loops given as world-space points.
    ///
    /// Vertices within `settings.eps_merge_points` of each other weld to
    /// one pool entry. Loops that collapse below three distinct vertices
    /// are dropped. Opposite half-edges pair up; shared edges seen more
    /// than twice stay open past the first pair. Faces then split into
    /// connected shells, one [`Mesh`] each.
    pub fn from_face_loops(loops: &[Vec<Point3<Real>>], settings: &GeometrySettings) -> Self {
        let mut welder = PointWelder::new(settings.eps_merge_points);
        let mut staged: Mesh = Mesh::new();
        let mut index_loops: Vec<Vec<usize>> = Vec::with_capacity(loops.len());
        for poly in loops {
            let mut verts: Vec<usize> = Vec::with_capacity(poly.len());
            for p in poly {
                let idx = welder.weld(*p);
                if verts.last() != Some(&idx) {
                    verts.push(idx);
                }
            }
            while verts.len() > 1 && verts.first() == verts.last() {
                verts.pop();
            }
            if verts.len() >= 3 {
                index_loops.push(verts);
            }
        }
        let points = std::mem::take(&mut welder.points);
        for verts in &index_loops {
            staged.add_face(verts, &points);
        }
        pair_twins(&mut staged);
        let meshes = split_shells(&staged);
        MeshSet { points, meshes }
    }

    /// True when no shell has an alive face.
    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(|m| m.alive_face_count() == 0)
    }

    /// Distinct vertices referenced by alive edges across all shells.
    pub fn vertex_count(&self) -> usize {
        let mut used = hashbrown::HashSet::new();
        for mesh in &self.meshes {
            used.extend(mesh.used_vertices());
        }
        used.len()
    }

    pub fn face_count(&self) -> usize {
        self.meshes.iter().map(|m| m.alive_face_count()).sum()
    }

    pub fn open_edge_count(&self) -> usize {
        self.meshes.iter().map(|m| m.open_edge_count()).sum()
    }

    pub fn closed_edge_count(&self) -> usize {
        self.meshes.iter().map(|m| m.closed_edge_count()).sum()
    }

    /// Net enclosed volume. Shells flagged as cavities subtract;
    /// inward-oriented unflagged shells subtract through their own
    /// negative signed volume.
    pub fn total_volume(&self) -> Real {
        self.meshes
            .iter()
            .map(|m| {
                let v = m.signed_volume(&self.points);
                if m.is_negative { -v.abs() } else { v }
            })
            .sum()
    }

    pub fn surface_area(&self) -> Real {
        self.meshes
            .iter()
            .map(|m| m.surface_area(&self.points))
            .sum()
    }

    /// Axis-aligned bounds over vertices referenced by alive edges.
    /// Empty sets get a degenerate box at the origin.
    pub fn bounding_box(&self) -> Aabb {
        let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
        let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
        let mut any = false;
        for mesh in &self.meshes {
            for v in mesh.used_vertices() {
                let p = self.points[v];
                mins = mins.inf(&p);
                maxs = maxs.sup(&p);
                any = true;
            }
        }
        if !any {
            return Aabb::new(Point3::origin(), Point3::origin());
        }
        Aabb::new(mins, maxs)
    }

    /// Translate every vertex and refresh cached planes.
    pub fn translate(&mut self, offset: Vector3<Real>) {
        for p in &mut self.points {
            *p += offset;
        }
        self.refresh_planes();
    }

    /// Uniformly scale every vertex about the origin.
    pub fn scale(&mut self, factor: Real) {
        for p in &mut self.points {
            p.coords *= factor;
        }
        self.refresh_planes();
    }

    pub fn refresh_planes(&mut self) {
        let points = std::mem::take(&mut self.points);
        for mesh in &mut self.meshes {
            for f in 0..mesh.faces.len() {
                if mesh.faces[f].alive {
                    mesh.refresh_face_plane(f, &points);
                }
            }
        }
        self.points = points;
    }

    /// Flatten all shells back into world-space polygon loops.
    pub fn to_face_loops(&self) -> Vec<Vec<Point3<Real>>> {
        let mut loops = Vec::new();
        for (i, _) in self.meshes.iter().enumerate() {
            loops.extend(self.shell_face_loops(i));
        }
        loops
    }

    /// Polygon loops of one shell.
    pub fn shell_face_loops(&self, mesh_idx: usize) -> Vec<Vec<Point3<Real>>> {
        let mesh = &self.meshes[mesh_idx];
        mesh.alive_faces()
            .map(|f| mesh.face_points(f, &self.points))
            .collect()
    }

    /// Rebuild one shell as a standalone set.
    pub fn extract_shell(&self, mesh_idx: usize, settings: &GeometrySettings) -> MeshSet {
        let mut set = MeshSet::from_face_loops(&self.shell_face_loops(mesh_idx), settings);
        for m in &mut set.meshes {
            m.is_negative = self.meshes[mesh_idx].is_negative;
        }
        set
    }

    /// Rebuild the whole set, compacting dead arena entries and
    /// re-welding vertices.
    pub fn rebuilt(&self, settings: &GeometrySettings) -> MeshSet {
        MeshSet::from_face_loops(&self.to_face_loops(), settings)
    }

    /// Parity test of a point against every shell of the set combined.
    pub fn contains_point(&self, point: &Point3<Real>) -> bool {
        self.meshes
            .iter()
            .fold(false, |inside, m| inside ^ m.contains_point(point, &self.points))
    }
}

/// Combine several sets into one, re-welding across their vertex pools.
pub fn merge_sets(sets: &[&MeshSet], settings: &GeometrySettings) -> MeshSet {
    let mut loops = Vec::new();
    for set in sets {
        loops.extend(set.to_face_loops());
    }
    MeshSet::from_face_loops(&loops, settings)
}

/// Pair each open edge with an opposite-direction edge over the same
/// vertex pair, if one exists.
fn pair_twins(mesh: &mut Mesh) {
    let mut directed: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for e in 0..mesh.edges.len() {
        if !mesh.edges[e].alive {
            continue;
        }
        let key = (mesh.edge_origin(e), mesh.edges[e].vert);
        directed.entry(key).or_default().push(e);
    }
    for e in 0..mesh.edges.len() {
        if !mesh.edges[e].alive || mesh.edges[e].rev.is_some() {
            continue;
        }
        let key = (mesh.edges[e].vert, mesh.edge_origin(e));
        if let Some(bucket) = directed.get_mut(&key) {
            while let Some(cand) = bucket.pop() {
                if mesh.edges[cand].rev.is_none() && cand != e {
                    mesh.edges[e].rev = Some(cand);
                    mesh.edges[cand].rev = Some(e);
                    break;
                }
            }
        }
    }
}

/// Split a staged mesh into connected components over twin adjacency.
fn split_shells(staged: &Mesh) -> Vec<Mesh> {
    let nfaces = staged.faces.len();
    let mut component = vec![usize::MAX; nfaces];
    let mut ncomp = 0usize;
    for seed in 0..nfaces {
        if !staged.faces[seed].alive || component[seed] != usize::MAX {
            continue;
        }
        let mut stack = vec![seed];
        component[seed] = ncomp;
        while let Some(face) = stack.pop() {
            for e in staged.face_edges(face) {
                if let Some(r) = staged.edges[e].rev {
                    let nb = staged.edges[r].face;
                    if component[nb] == usize::MAX {
                        component[nb] = ncomp;
                        stack.push(nb);
                    }
                }
            }
        }
        ncomp += 1;
    }

    let mut meshes: Vec<Mesh> = (0..ncomp).map(|_| Mesh::new()).collect();
    // arena remap for edges, per component
    let mut edge_map = vec![usize::MAX; staged.edges.len()];
    for (face, &comp) in component.iter().enumerate() {
        if comp == usize::MAX {
            continue;
        }
        let target = &mut meshes[comp];
        let loop_edges = staged.face_edges(face);
        let base = target.edges.len();
        for (i, &e) in loop_edges.iter().enumerate() {
            edge_map[e] = base + i;
        }
        let face_id = target.faces.len();
        let n = loop_edges.len();
        for (i, &e) in loop_edges.iter().enumerate() {
            target.edges.push(HalfEdge {
                next: base + (i + 1) % n,
                prev: base + (i + n - 1) % n,
                rev: staged.edges[e].rev,
                vert: staged.edges[e].vert,
                face: face_id,
                alive: true,
            });
        }
        target.faces.push(Face {
            edge: base,
            edge_count: n,
            plane: staged.faces[face].plane,
            alive: true,
        });
    }
    // rewrite rev pointers into the per-component arenas
    for mesh in &mut meshes {
        for e in &mut mesh.edges {
            if let Some(r) = e.rev {
                e.rev = Some(edge_map[r]);
            }
        }
    }
    meshes
}
