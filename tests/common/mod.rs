#![allow(dead_code)]

use nalgebra::Point3;
use vertexbake::prelude::*;

pub fn solid(positions: &[Point3<f64>], faces: &[[usize; 3]], color: [f32; 3]) -> ColorMesh {
    let colors = vec![color; positions.len()];
    build_color_mesh(positions, &colors, faces).unwrap()
}

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
    solid(&positions, &faces, color)
}

/// A latitude-longitude sphere with one vertex per pole and a color
/// gradient from pole to pole.
pub fn sphere(rings: usize, segments: usize) -> ColorMesh {
    use std::f64::consts::PI;

    let mut positions = vec![Point3::new(0.0, 0.0, 1.0)];
    for r in 1..rings {
        let theta = PI * r as f64 / rings as f64;
        for s in 0..segments {
            let phi = 2.0 * PI * s as f64 / segments as f64;
            positions.push(Point3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    positions.push(Point3::new(0.0, 0.0, -1.0));
    let south = positions.len() - 1;
    let ring = |r: usize, s: usize| 1 + (r - 1) * segments + s % segments;

    let mut faces = Vec::new();
    for s in 0..segments {
        faces.push([0, ring(1, s), ring(1, s + 1)]);
    }
    for r in 1..rings - 1 {
        for s in 0..segments {
            faces.push([ring(r, s), ring(r + 1, s), ring(r + 1, s + 1)]);
            faces.push([ring(r, s), ring(r + 1, s + 1), ring(r, s + 1)]);
        }
    }
    for s in 0..segments {
        faces.push([south, ring(rings - 1, s + 1), ring(rings - 1, s)]);
    }

    let colors: Vec<[f32; 3]> = positions
        .iter()
        .map(|p| {
            let t = ((p.z + 1.0) * 0.5) as f32;
            [t, 0.2, 1.0 - t]
        })
        .collect();
    build_color_mesh(&positions, &colors, &faces).unwrap()
}

pub fn assert_uvs_in_unit_square(mesh: &TexturedMesh) {
    for (i, uv) in mesh.uvs().iter().enumerate() {
        assert!(
            (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y),
            "vertex {} has uv {:?}",
            i,
            uv
        );
    }
}
