//! BSP-tree boolean machinery.
//!
//! Polygons here are flat position loops carrying their plane; the
//! half-edge structure is rebuilt from the surviving soup after
//! clipping. Classification against node planes is bitmask based
//! (`COPLANAR | FRONT | BACK = SPANNING`).

use crate::float_types::{EPSILON, Real};
use crate::mesh::plane::{BACK, COPLANAR, FRONT, Plane, SPANNING};
use nalgebra::Point3;

/// How coplanar fragments are routed during clipping. The two
/// strategies disagree exactly where operand faces coincide, which is
/// why the orchestrator retries with the alternate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyStrategy {
    /// Keep coplanar-front fragments on the front side and drop
    /// coplanar-back fragments into the clipped half-space.
    Edge,
    /// Route both coplanar buckets purely by normal agreement with the
    /// node plane.
    Normal,
}

/// A flat polygon loop with its supporting plane.
#[derive(Debug, Clone, PartialEq)]
pub struct BspPolygon {
    pub verts: Vec<Point3<Real>>,
    pub plane: Plane,
}

impl BspPolygon {
    /// Build from a vertex loop; loops without a usable normal are
    /// rejected.
    pub fn new(verts: Vec<Point3<Real>>) -> Option<Self> {
        if verts.len() < 3 {
            return None;
        }
        let n = crate::geometry::newell_normal(&verts);
        if n.norm_squared() < Real::EPSILON {
            return None;
        }
        let plane = Plane::from_loop(&verts);
        Some(BspPolygon { verts, plane })
    }

    pub fn flip(&mut self) {
        self.verts.reverse();
        self.plane.flip();
    }
}

/// Bitmask classification of a whole polygon against a plane.
fn classify_polygon(plane: &Plane, poly: &BspPolygon) -> i8 {
    poly.verts
        .iter()
        .fold(0, |acc, p| acc | plane.orient_point(p))
}

/// Split a polygon by a plane into four buckets:
/// `(coplanar_front, coplanar_back, front, back)`.
pub fn split_polygon(
    plane: &Plane,
    polygon: &BspPolygon,
) -> (
    Vec<BspPolygon>,
    Vec<BspPolygon>,
    Vec<BspPolygon>,
    Vec<BspPolygon>,
) {
    let mut coplanar_front = Vec::new();
    let mut coplanar_back = Vec::new();
    let mut front = Vec::new();
    let mut back = Vec::new();

    let normal = plane.normal();
    let types: Vec<i8> = polygon
        .verts
        .iter()
        .map(|p| plane.orient_point(p))
        .collect();
    let polygon_type = types.iter().fold(0, |acc, &t| acc | t);

    match polygon_type {
        COPLANAR => {
            if normal.dot(&polygon.plane.normal()) > 0.0 {
                coplanar_front.push(polygon.clone());
            } else {
                coplanar_back.push(polygon.clone());
            }
        },
        FRONT => front.push(polygon.clone()),
        BACK => back.push(polygon.clone()),
        _ => {
            let mut split_front = Vec::new();
            let mut split_back = Vec::new();
            for i in 0..polygon.verts.len() {
                let j = (i + 1) % polygon.verts.len();
                let type_i = types[i];
                let type_j = types[j];
                let vi = polygon.verts[i];
                let vj = polygon.verts[j];

                if type_i != BACK {
                    split_front.push(vi);
                }
                if type_i != FRONT {
                    split_back.push(vi);
                }
                if (type_i | type_j) == SPANNING {
                    let denom = normal.dot(&(vj - vi));
                    if denom.abs() > EPSILON {
                        let t = (plane.offset() - normal.dot(&vi.coords)) / denom;
                        let crossing = vi + (vj - vi) * t;
                        split_front.push(crossing);
                        split_back.push(crossing);
                    }
                }
            }
            // keep the original plane rather than refitting the split
            // loops; refitting drifts and opens gaps
            if split_front.len() >= 3 {
                front.push(BspPolygon {
                    verts: split_front,
                    plane: polygon.plane,
                });
            }
            if split_back.len() >= 3 {
                back.push(BspPolygon {
                    verts: split_back,
                    plane: polygon.plane,
                });
            }
        },
    }
    (coplanar_front, coplanar_back, front, back)
}

/// A BSP tree node: a splitting plane, the polygons lying on it, and
/// front/back subtrees.
#[derive(Debug, Clone)]
pub struct Node {
    pub plane: Option<Plane>,
    pub front: Option<Box<Node>>,
    pub back: Option<Box<Node>>,
    pub polygons: Vec<BspPolygon>,
    strategy: ClassifyStrategy,
}

impl Node {
    pub const fn new(strategy: ClassifyStrategy) -> Self {
        Node {
            plane: None,
            front: None,
            back: None,
            polygons: Vec::new(),
            strategy,
        }
    }

    pub fn from_polygons(polygons: &[BspPolygon], strategy: ClassifyStrategy) -> Self {
        let mut node = Self::new(strategy);
        if !polygons.is_empty() {
            node.build(polygons);
        }
        node
    }

    /// Flip the represented solid inside out.
    pub fn invert(&mut self) {
        self.polygons.iter_mut().for_each(|p| p.flip());
        self.plane = self.plane.map(|p| p.flipped());
        if let Some(ref mut front) = self.front {
            front.invert();
        }
        if let Some(ref mut back) = self.back {
            back.invert();
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Score candidate splitting planes by spanning count and balance.
    fn pick_best_splitting_plane(&self, polygons: &[BspPolygon]) -> Plane {
        const K_SPANS: Real = 8.0;
        const K_BALANCE: Real = 1.0;

        let mut best_plane = polygons[0].plane;
        let mut best_score = Real::MAX;

        let sample_size = polygons.len().min(20);
        for p in polygons.iter().take(sample_size) {
            let plane = &p.plane;
            let mut num_front = 0i32;
            let mut num_back = 0i32;
            let mut num_spanning = 0i32;
            for poly in polygons {
                match classify_polygon(plane, poly) {
                    COPLANAR => {},
                    FRONT => num_front += 1,
                    BACK => num_back += 1,
                    _ => num_spanning += 1,
                }
            }
            let score =
                K_SPANS * num_spanning as Real + K_BALANCE * ((num_front - num_back) as Real).abs();
            if score < best_score {
                best_score = score;
                best_plane = *plane;
            }
        }
        best_plane
    }

    /// Route a coplanar fragment to the front or back side according to
    /// the node's classification strategy.
    fn coplanar_goes_front(&self, plane: &Plane, poly: &BspPolygon, from_front_bucket: bool) -> bool {
        match self.strategy {
            ClassifyStrategy::Edge => from_front_bucket,
            ClassifyStrategy::Normal => plane.orient_plane(&poly.plane) == FRONT,
        }
    }

    /// Remove every part of `polygons` that lies inside this tree's
    /// solid.
    pub fn clip_polygons(&self, polygons: &[BspPolygon]) -> Vec<BspPolygon> {
        let mut result = Vec::new();
        let mut stack = vec![(self, polygons.to_vec())];

        while let Some((node, polys)) = stack.pop() {
            let Some(plane) = node.plane.as_ref() else {
                result.extend(polys);
                continue;
            };

            let mut front_polys = Vec::with_capacity(polys.len());
            let mut back_polys = Vec::with_capacity(polys.len());

            for polygon in &polys {
                let (coplanar_front, coplanar_back, mut front_parts, mut back_parts) =
                    split_polygon(plane, polygon);

                for (coplanar_poly, from_front) in coplanar_front
                    .into_iter()
                    .map(|p| (p, true))
                    .chain(coplanar_back.into_iter().map(|p| (p, false)))
                {
                    if node.coplanar_goes_front(plane, &coplanar_poly, from_front) {
                        front_parts.push(coplanar_poly);
                    } else {
                        back_parts.push(coplanar_poly);
                    }
                }

                front_polys.append(&mut front_parts);
                back_polys.append(&mut back_parts);
            }

            if let Some(front_node) = &node.front {
                if !front_polys.is_empty() {
                    stack.push((front_node, front_polys));
                }
            } else {
                result.extend(front_polys);
            }

            if let Some(back_node) = &node.back {
                if !back_polys.is_empty() {
                    stack.push((back_node, back_polys));
                }
            }
        }
        result
    }

    /// Clip this tree's polygons against another tree.
    pub fn clip_to(&mut self, bsp: &Node) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.polygons = bsp.clip_polygons(&node.polygons);
            if let Some(front) = node.front.as_mut() {
                stack.push(front);
            }
            if let Some(back) = node.back.as_mut() {
                stack.push(back);
            }
        }
    }

    /// Collect every polygon stored in the tree.
    pub fn all_polygons(&self) -> Vec<BspPolygon> {
        let mut result = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            result.extend_from_slice(&node.polygons);
            stack.extend(
                [&node.front, &node.back]
                    .iter()
                    .filter_map(|child| child.as_ref().map(|boxed| boxed.as_ref())),
            );
        }
        result
    }

    /// Build (or extend) the tree from polygons.
    pub fn build(&mut self, polygons: &[BspPolygon]) {
        if polygons.is_empty() {
            return;
        }
        let strategy = self.strategy;
        let mut stack = vec![(self, polygons.to_vec())];

        while let Some((node, polys)) = stack.pop() {
            if polys.is_empty() {
                continue;
            }
            if node.plane.is_none() {
                node.plane = Some(node.pick_best_splitting_plane(&polys));
            }
            // plane was just ensured above
            let Some(plane) = node.plane else { continue };

            let mut front = Vec::with_capacity(polys.len() / 2);
            let mut back = Vec::with_capacity(polys.len() / 2);

            for polygon in &polys {
                let (coplanar_front, coplanar_back, mut front_parts, mut back_parts) =
                    split_polygon(&plane, polygon);
                node.polygons.extend(coplanar_front);
                node.polygons.extend(coplanar_back);
                front.append(&mut front_parts);
                back.append(&mut back_parts);
            }

            if !front.is_empty() {
                let front_node = node.front.get_or_insert_with(|| Box::new(Node::new(strategy)));
                stack.push((front_node, front));
            }
            if !back.is_empty() {
                let back_node = node.back.get_or_insert_with(|| Box::new(Node::new(strategy)));
                stack.push((back_node, back));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn triangle() -> BspPolygon {
        BspPolygon::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn degenerate_loop_rejected() {
        assert!(
            BspPolygon::new(vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ])
            .is_none()
        );
    }

    #[test]
    fn tree_round_trips_polygons() {
        let node = Node::from_polygons(&[triangle()], ClassifyStrategy::Edge);
        assert_eq!(node.all_polygons().len(), 1);
    }

    #[test]
    fn spanning_split_produces_both_sides() {
        let plane = Plane::from_normal_and_point(Vector3::x(), &Point3::new(0.5, 0.0, 0.0));
        let (cf, cb, front, back) = split_polygon(&plane, &triangle());
        assert!(cf.is_empty() && cb.is_empty());
        assert_eq!(front.len(), 1);
        assert_eq!(back.len(), 1);
        let area: Real = front[0].verts.len() as Real + back[0].verts.len() as Real;
        assert!(area >= 6.0);
    }

    #[test]
    fn invert_flips_every_polygon() {
        let mut node = Node::from_polygons(&[triangle()], ClassifyStrategy::Edge);
        let before = node.all_polygons()[0].plane.normal;
        node.invert();
        let after = node.all_polygons()[0].plane.normal;
        assert!((before + after).norm() < 1e-12);
    }

    #[test]
    fn clip_removes_interior_polygons() {
        // a polygon buried behind the node plane of a single-plane tree
        // survives clipping only on the front side
        let node = Node::from_polygons(&[triangle()], ClassifyStrategy::Edge);
        let above = BspPolygon::new(vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.5, 1.0, 1.0),
        ])
        .unwrap();
        let kept = node.clip_polygons(std::slice::from_ref(&above));
        assert_eq!(kept.len(), 1);
        let below = BspPolygon::new(vec![
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(1.0, 0.0, -1.0),
            Point3::new(0.5, 1.0, -1.0),
        ])
        .unwrap();
        let removed = node.clip_polygons(std::slice::from_ref(&below));
        assert!(removed.is_empty());
    }
}
