//! Half-edge arena storage for a single mesh shell.
//!
//! Edges and faces live in flat `Vec` arenas addressed by index. Removal
//! marks entries dead instead of shifting the arena, so indices held by
//! in-flight passes stay stable; rebuilds compact the arenas.

use crate::float_types::Real;
use crate::geometry::{loop_area, loop_centroid, newell_normal};
use crate::mesh::plane::Plane;
use nalgebra::{Point3, Vector3};

/// One directed half of an edge. `vert` is the destination vertex; the
/// origin is the destination of `prev`. `rev` is `None` on open edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfEdge {
    pub next: usize,
    pub prev: usize,
    pub rev: Option<usize>,
    pub vert: usize,
    pub face: usize,
    pub alive: bool,
}

/// A face loop, addressed by any one of its edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub edge: usize,
    pub edge_count: usize,
    pub plane: Plane,
    pub alive: bool,
}

/// A single connected shell of faces. Vertex positions live in the
/// owning [`MeshSet`](crate::mesh::MeshSet); geometric queries borrow
/// that point slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub edges: Vec<HalfEdge>,
    pub faces: Vec<Face>,
    /// True for inner shells (cavities) whose volume subtracts.
    pub is_negative: bool,
}

impl Mesh {
    pub fn new() -> Self {
        Mesh::default()
    }

    /// Append a face from a loop of vertex indices. Edge pairing is the
    /// caller's job; all new edges start open.
    pub(crate) fn add_face(&mut self, verts: &[usize], points: &[Point3<Real>]) -> usize {
        let n = verts.len();
        debug_assert!(n >= 3);
        let base = self.edges.len();
        let face_id = self.faces.len();
        for (i, _) in verts.iter().enumerate() {
            self.edges.push(HalfEdge {
                next: base + (i + 1) % n,
                prev: base + (i + n - 1) % n,
                rev: None,
                // destination of edge i is the loop vertex after i
                vert: verts[(i + 1) % n],
                face: face_id,
                alive: true,
            });
        }
        let pts: Vec<Point3<Real>> = verts.iter().map(|&v| points[v]).collect();
        self.faces.push(Face {
            edge: base,
            edge_count: n,
            plane: Plane::from_loop(&pts),
            alive: true,
        });
        face_id
    }

    pub fn alive_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.alive)
            .map(|(i, _)| i)
    }

    pub fn alive_face_count(&self) -> usize {
        self.faces.iter().filter(|f| f.alive).count()
    }

    pub fn alive_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.alive).count()
    }

    pub fn open_edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|e| e.alive && e.rev.is_none())
            .count()
    }

    pub fn closed_edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|e| e.alive && e.rev.is_some())
            .count()
    }

    /// Origin vertex of an edge.
    pub fn edge_origin(&self, edge: usize) -> usize {
        self.edges[self.edges[edge].prev].vert
    }

    /// Walk a face loop and collect its edge ids. The walk is bounded by
    /// the arena size so a corrupt `next` cycle cannot hang it; a loop
    /// that fails to close returns what was walked.
    pub fn face_edges(&self, face: usize) -> Vec<usize> {
        let start = self.faces[face].edge;
        let mut out = Vec::with_capacity(self.faces[face].edge_count);
        let mut e = start;
        for _ in 0..self.edges.len() {
            out.push(e);
            e = self.edges[e].next;
            if e == start {
                break;
            }
        }
        out
    }

    /// Vertex indices around a face, in loop order.
    pub fn face_vertices(&self, face: usize) -> Vec<usize> {
        self.face_edges(face)
            .iter()
            .map(|&e| self.edges[e].vert)
            .collect()
    }

    /// Vertex positions around a face, in loop order.
    pub fn face_points(&self, face: usize, points: &[Point3<Real>]) -> Vec<Point3<Real>> {
        self.face_vertices(face)
            .iter()
            .map(|&v| points[v])
            .collect()
    }

    /// Face normal recomputed from current vertex positions (Newell),
    /// independent of the cached plane.
    pub fn face_normal(&self, face: usize, points: &[Point3<Real>]) -> Vector3<Real> {
        let n = newell_normal(&self.face_points(face, points));
        let len = n.norm();
        if len < Real::EPSILON {
            Vector3::zeros()
        } else {
            n / len
        }
    }

    pub fn face_area(&self, face: usize, points: &[Point3<Real>]) -> Real {
        loop_area(&self.face_points(face, points))
    }

    pub fn face_centroid(&self, face: usize, points: &[Point3<Real>]) -> Point3<Real> {
        loop_centroid(&self.face_points(face, points))
    }

    /// Length of the longest edge of a face.
    pub fn face_longest_edge(&self, face: usize, points: &[Point3<Real>]) -> Real {
        let pts = self.face_points(face, points);
        let n = pts.len();
        let mut longest: Real = 0.0;
        for i in 0..n {
            longest = longest.max((pts[(i + 1) % n] - pts[i]).norm());
        }
        longest
    }

    /// Refresh a face's cached plane from current vertex positions.
    pub fn refresh_face_plane(&mut self, face: usize, points: &[Point3<Real>]) {
        let pts = self.face_points(face, points);
        self.faces[face].plane = Plane::from_loop(&pts);
        self.faces[face].edge_count = pts.len();
    }

    /// Mark a face and its edges dead, opening the twins that pointed
    /// at the removed edges.
    pub fn kill_face(&mut self, face: usize) {
        for e in self.face_edges(face) {
            if let Some(r) = self.edges[e].rev {
                self.edges[r].rev = None;
            }
            self.edges[e].alive = false;
        }
        self.faces[face].alive = false;
    }

    /// Reverse every face loop in place, flipping the shell inside out.
    pub fn invert(&mut self) {
        let old = self.edges.clone();
        for (i, e) in self.edges.iter_mut().enumerate() {
            if !e.alive {
                continue;
            }
            e.next = old[i].prev;
            e.prev = old[i].next;
            // the reversed edge runs toward the old origin
            e.vert = old[old[i].prev].vert;
        }
        for f in self.faces.iter_mut().filter(|f| f.alive) {
            f.plane.flip();
        }
    }

    /// Signed volume by the divergence theorem, fanning each face from
    /// its first loop vertex through origin-based tetrahedra.
    pub fn signed_volume(&self, points: &[Point3<Real>]) -> Real {
        let mut vol: Real = 0.0;
        for face in self.alive_faces() {
            let pts = self.face_points(face, points);
            for i in 1..pts.len().saturating_sub(1) {
                let a = pts[0].coords;
                let b = pts[i].coords;
                let c = pts[i + 1].coords;
                vol += a.dot(&b.cross(&c)) / 6.0;
            }
        }
        vol
    }

    pub fn surface_area(&self, points: &[Point3<Real>]) -> Real {
        self.alive_faces()
            .map(|f| self.face_area(f, points))
            .sum()
    }

    /// Parity ray test of a point against this shell alone. A point on
    /// the surface counts as inside.
    pub fn contains_point(&self, point: &Point3<Real>, points: &[Point3<Real>]) -> bool {
        use crate::float_types::parry3d::query::{Ray, RayCast};
        use crate::float_types::parry3d::shape::Triangle;
        // skew direction so axis-aligned faces are not hit edge-on
        let dir = Vector3::new(0.383, 0.542, 0.748).normalize();
        let ray = Ray::new(*point, dir);
        let mut hits = 0usize;
        for face in self.alive_faces() {
            let pts = self.face_points(face, points);
            for i in 1..pts.len().saturating_sub(1) {
                let tri = Triangle::new(pts[0], pts[i], pts[i + 1]);
                if tri.cast_local_ray(&ray, Real::MAX, true).is_some() {
                    hits += 1;
                }
            }
        }
        hits % 2 == 1
    }

    /// Distinct vertices referenced by alive edges.
    pub fn used_vertices(&self) -> hashbrown::HashSet<usize> {
        let mut used = hashbrown::HashSet::new();
        for e in self.edges.iter().filter(|e| e.alive) {
            used.insert(e.vert);
        }
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> (Mesh, Vec<Point3<Real>>) {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = Mesh::new();
        mesh.add_face(&[0, 1, 2], &points);
        (mesh, points)
    }

    #[test]
    fn face_walk_closes() {
        let (mesh, _) = triangle_mesh();
        assert_eq!(mesh.face_edges(0), vec![0, 1, 2]);
        assert_eq!(mesh.face_vertices(0), vec![1, 2, 0]);
    }

    #[test]
    fn edge_origin_matches_loop() {
        let (mesh, _) = triangle_mesh();
        assert_eq!(mesh.edge_origin(0), 0);
        assert_eq!(mesh.edge_origin(1), 1);
        assert_eq!(mesh.edge_origin(2), 2);
    }

    #[test]
    fn new_face_is_open() {
        let (mesh, _) = triangle_mesh();
        assert_eq!(mesh.open_edge_count(), 3);
        assert_eq!(mesh.closed_edge_count(), 0);
    }

    #[test]
    fn invert_flips_normal_and_keeps_loop() {
        let (mut mesh, points) = triangle_mesh();
        let n_before = mesh.face_normal(0, &points);
        mesh.invert();
        let n_after = mesh.face_normal(0, &points);
        assert!((n_before + n_after).norm() < 1e-9);
        // still a closed 3-cycle
        assert_eq!(mesh.face_edges(0).len(), 3);
    }

    #[test]
    fn face_area_and_longest_edge() {
        let (mesh, points) = triangle_mesh();
        assert!((mesh.face_area(0, &points) - 0.5).abs() < 1e-12);
        let hyp = (2.0 as Real).sqrt();
        assert!((mesh.face_longest_edge(0, &points) - hyp).abs() < 1e-12);
    }

    #[test]
    fn kill_face_opens_twins() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = Mesh::new();
        mesh.add_face(&[0, 1, 2], &points);
        mesh.add_face(&[0, 2, 3], &points);
        // pair the shared diagonal 0-2 by hand (edge 2 runs 2->0, edge 3 runs 0->2)
        mesh.edges[2].rev = Some(3);
        mesh.edges[3].rev = Some(2);
        assert_eq!(mesh.closed_edge_count(), 2);
        mesh.kill_face(0);
        assert_eq!(mesh.alive_face_count(), 1);
        assert_eq!(mesh.edges[3].rev, None);
    }
}
