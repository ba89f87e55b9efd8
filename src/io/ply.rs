//! PLY (Stanford polygon) format support.
//!
//! Loads vertex-colored meshes. Colors come from the `red`, `green`, `blue`
//! and optional `alpha` vertex properties, stored either as `uchar` (0..255)
//! or as floating point (0..1). Polygons are fan-triangulated.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::Point3;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{BakeError, Result};
use crate::mesh::{build_color_mesh_from_polygons, ColorMesh};

/// Load a vertex-colored mesh from a PLY file.
///
/// # Example
///
/// ```no_run
/// use vertexbake::io::ply;
///
/// let mesh = ply::load("scan.ply").unwrap();
/// println!("{} triangles", mesh.num_triangles());
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<ColorMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let load_error = |message: String| BakeError::LoadError {
        path: path.to_path_buf(),
        message,
    };

    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| load_error(e.to_string()))?;

    let vertex_element = ply
        .payload
        .get("vertex")
        .ok_or_else(|| load_error("PLY file has no vertex element".to_string()))?;

    let mut positions: Vec<Point3<f64>> = Vec::with_capacity(vertex_element.len());
    let mut colors: Vec<Vec<f32>> = Vec::with_capacity(vertex_element.len());
    for (i, vertex) in vertex_element.iter().enumerate() {
        let coord = |name: &str| {
            get_float_property(vertex, name)
                .ok_or_else(|| load_error(format!("vertex {} missing {} coordinate", i, name)))
        };
        positions.push(Point3::new(coord("x")?, coord("y")?, coord("z")?));

        let mut color = Vec::with_capacity(4);
        for name in ["red", "green", "blue"] {
            let channel = get_color_property(vertex, name)
                .ok_or_else(|| load_error(format!("vertex {} has no {} color channel", i, name)))?;
            color.push(channel);
        }
        if let Some(alpha) = get_color_property(vertex, "alpha") {
            color.push(alpha);
        }
        colors.push(color);
    }

    let face_element = ply
        .payload
        .get("face")
        .ok_or_else(|| load_error("PLY file has no face element".to_string()))?;

    let mut faces: Vec<Vec<usize>> = Vec::with_capacity(face_element.len());
    for face in face_element {
        let indices = get_list_property(face, "vertex_indices")
            .or_else(|| get_list_property(face, "vertex_index"))
            .ok_or_else(|| load_error("face missing vertex_indices property".to_string()))?;

        if indices.len() > 3 {
            // Fan triangulation
            for i in 1..indices.len() - 1 {
                faces.push(vec![indices[0], indices[i], indices[i + 1]]);
            }
        } else {
            faces.push(indices);
        }
    }

    build_color_mesh_from_polygons(&positions, &colors, &faces)
}

fn get_float_property(element: &DefaultElement, name: &str) -> Option<f64> {
    match element.get(name)? {
        Property::Float(v) => Some(*v as f64),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(*v as f64),
        Property::UInt(v) => Some(*v as f64),
        Property::Short(v) => Some(*v as f64),
        Property::UShort(v) => Some(*v as f64),
        Property::Char(v) => Some(*v as f64),
        Property::UChar(v) => Some(*v as f64),
        _ => None,
    }
}

/// A color channel normalized to `[0, 1]`. Integer channels are scaled by
/// their type's maximum.
fn get_color_property(element: &DefaultElement, name: &str) -> Option<f32> {
    match element.get(name)? {
        Property::UChar(v) => Some(*v as f32 / u8::MAX as f32),
        Property::UShort(v) => Some(*v as f32 / u16::MAX as f32),
        Property::Float(v) => Some(*v),
        Property::Double(v) => Some(*v as f32),
        _ => None,
    }
}

fn get_list_property(element: &DefaultElement, name: &str) -> Option<Vec<usize>> {
    match element.get(name)? {
        Property::ListInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        _ => None,
    }
}
