//! Shared test meshes.

use std::f64::consts::PI;

use nalgebra::Point3;

use crate::mesh::{build_color_mesh, ColorMesh};

/// Build a mesh with one uniform RGB color.
pub fn solid_mesh(positions: Vec<Point3<f64>>, faces: &[[usize; 3]], color: [f32; 3]) -> ColorMesh {
    let colors: Vec<[f32; 3]> = vec![color; positions.len()];
    build_color_mesh(&positions, &colors, faces).unwrap()
}

/// Unit cube with outward-facing triangles.
pub fn cube(color: [f32; 3]) -> ColorMesh {
    let positions = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(0.0, 1.0, 1.0),
    ];
    let faces = [
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    solid_mesh(positions, &faces, color)
}

/// Regular `n x n` grid of unit squares in the XY plane.
pub fn grid(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut positions = Vec::new();
    let mut faces = Vec::new();
    for j in 0..=n {
        for i in 0..=n {
            positions.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }
    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + n + 1;
            let v11 = v01 + 1;
            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }
    (positions, faces)
}

/// Latitude-longitude unit sphere with outward-facing triangles.
pub fn uv_sphere(rings: usize, segments: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut positions = vec![Point3::new(0.0, 0.0, 1.0)];
    for i in 1..rings {
        let theta = PI * i as f64 / rings as f64;
        for j in 0..segments {
            let phi = 2.0 * PI * j as f64 / segments as f64;
            positions.push(Point3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    let south = positions.len();
    positions.push(Point3::new(0.0, 0.0, -1.0));

    let ring = |i: usize, j: usize| 1 + (i - 1) * segments + j % segments;
    let mut faces = Vec::new();
    for j in 0..segments {
        faces.push([0, ring(1, j), ring(1, j + 1)]);
    }
    for i in 1..rings - 1 {
        for j in 0..segments {
            let a = ring(i, j);
            let b = ring(i, j + 1);
            let c = ring(i + 1, j);
            let d = ring(i + 1, j + 1);
            faces.push([a, c, d]);
            faces.push([a, d, b]);
        }
    }
    for j in 0..segments {
        faces.push([south, ring(rings - 1, j + 1), ring(rings - 1, j)]);
    }
    (positions, faces)
}
