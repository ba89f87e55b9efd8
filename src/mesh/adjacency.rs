//! Face adjacency graph.
//!
//! Two triangles are adjacent when they share an undirected edge. Edges with
//! more than two incident triangles are left unconnected and reported.

use std::collections::HashMap;

use super::colored::ColorMesh;
use super::index::{TriangleId, VertexId};
use crate::error::Diagnostic;

/// Face adjacency of a triangle mesh.
#[derive(Debug, Clone)]
pub struct FaceAdjacency {
    neighbors: Vec<Vec<TriangleId>>,
}

impl FaceAdjacency {
    /// Build the adjacency graph of `mesh`.
    ///
    /// Returns the graph together with one [`Diagnostic::NonManifoldEdge`] per
    /// edge shared by more than two triangles, sorted by edge.
    pub fn build(mesh: &ColorMesh) -> (Self, Vec<Diagnostic>) {
        let mut edge_faces: HashMap<(VertexId, VertexId), Vec<TriangleId>> = HashMap::new();

        for t in mesh.triangle_ids() {
            let verts = mesh.triangle(t);
            for i in 0..3 {
                let a = verts[i];
                let b = verts[(i + 1) % 3];
                let edge = if a < b { (a, b) } else { (b, a) };
                edge_faces.entry(edge).or_default().push(t);
            }
        }

        let mut neighbors = vec![Vec::new(); mesh.num_triangles()];
        let mut non_manifold = Vec::new();

        for (&(v0, v1), faces) in &edge_faces {
            match faces.as_slice() {
                [a, b] => {
                    neighbors[a.index()].push(*b);
                    neighbors[b.index()].push(*a);
                }
                [_] => {}
                _ => non_manifold.push(Diagnostic::NonManifoldEdge {
                    v0,
                    v1,
                    faces: faces.len(),
                }),
            }
        }

        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        non_manifold.sort_by_key(|d| match d {
            Diagnostic::NonManifoldEdge { v0, v1, .. } => (*v0, *v1),
            _ => (VertexId::new(0), VertexId::new(0)),
        });

        (Self { neighbors }, non_manifold)
    }

    /// Triangles sharing an edge with `t`, in ascending order.
    #[inline]
    pub fn neighbors(&self, t: TriangleId) -> &[TriangleId] {
        &self.neighbors[t.index()]
    }

    /// Number of triangles in the graph.
    #[inline]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Check if the graph has no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Connected components, each listed in ascending triangle order.
    ///
    /// Components are ordered by their smallest triangle.
    pub fn components(&self) -> Vec<Vec<TriangleId>> {
        let mut visited = vec![false; self.neighbors.len()];
        let mut components = Vec::new();

        for start in 0..self.neighbors.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut stack = vec![TriangleId::new(start)];
            let mut component = Vec::new();

            while let Some(t) = stack.pop() {
                component.push(t);
                for &n in self.neighbors(t) {
                    if !visited[n.index()] {
                        visited[n.index()] = true;
                        stack.push(n);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_color_mesh;
    use nalgebra::Point3;

    fn mesh_from(positions: Vec<Point3<f64>>, faces: &[[usize; 3]]) -> ColorMesh {
        let colors: Vec<[f32; 3]> = vec![[1.0, 1.0, 1.0]; positions.len()];
        build_color_mesh(&positions, &colors, faces).unwrap()
    }

    #[test]
    fn test_two_triangles_adjacent() {
        let mesh = mesh_from(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [1, 3, 2]],
        );
        let (adj, diags) = FaceAdjacency::build(&mesh);
        assert!(diags.is_empty());
        assert_eq!(adj.neighbors(TriangleId::new(0)), &[TriangleId::new(1)]);
        assert_eq!(adj.neighbors(TriangleId::new(1)), &[TriangleId::new(0)]);
        assert_eq!(adj.components().len(), 1);
    }

    #[test]
    fn test_disconnected_islands() {
        let mesh = mesh_from(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(5.0, 0.0, 0.0),
                Point3::new(6.0, 0.0, 0.0),
                Point3::new(5.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [3, 4, 5]],
        );
        let (adj, _) = FaceAdjacency::build(&mesh);
        let components = adj.components();
        assert_eq!(components, vec![vec![TriangleId::new(0)], vec![TriangleId::new(1)]]);
    }

    #[test]
    fn test_non_manifold_edge_is_cut() {
        // Three triangles fanning around the edge (0, 1).
        let mesh = mesh_from(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, -1.0, 0.0),
                Point3::new(0.5, 0.0, 1.0),
            ],
            &[[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        );
        let (adj, diags) = FaceAdjacency::build(&mesh);
        assert_eq!(
            diags,
            vec![Diagnostic::NonManifoldEdge {
                v0: VertexId::new(0),
                v1: VertexId::new(1),
                faces: 3,
            }]
        );
        for t in 0..3 {
            assert!(adj.neighbors(TriangleId::new(t)).is_empty());
        }
    }
}
