//! Binary glTF (`.glb`) output.
//!
//! The baked mesh is written as one triangle primitive with `POSITION` and
//! `TEXCOORD_0` attributes and a metallic-roughness material whose base color
//! is the baked texture. The PNG is embedded in the binary chunk, so the file
//! is self-contained.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use gltf::json as gj;
use log::debug;

use crate::algo::bake::TextureImage;
use crate::error::{BakeError, Result};
use crate::mesh::{ColorChannels, TexturedMesh, UvOrigin};

/// Name of the material written by [`save`].
pub const MATERIAL_NAME: &str = "baked";

const GLB_MAGIC: u32 = 0x46546C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

/// Write a UV-mapped mesh and its texture as a GLB file.
pub fn save<P: AsRef<Path>>(
    mesh: &TexturedMesh,
    texture: &TextureImage,
    channels: ColorChannels,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_glb(mesh, texture, channels).map_err(|e| match e {
        BakeError::SaveError { message, .. } => BakeError::SaveError {
            path: path.to_path_buf(),
            message,
        },
        e => e,
    })?;
    std::fs::write(path, &bytes)?;
    debug!("wrote {} bytes of GLB to {}", bytes.len(), path.display());
    Ok(())
}

/// Encode a UV-mapped mesh and its texture as GLB bytes.
///
/// UVs are written with the top-left origin glTF uses, whatever the mesh's
/// own convention. Encoding errors carry an empty path; [`save`] fills it in.
pub fn to_glb(mesh: &TexturedMesh, texture: &TextureImage, channels: ColorChannels) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    texture
        .to_dynamic_image(channels)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

    let mut builder = GlbBuilder::default();
    builder.root.asset.generator = Some(format!("vertexbake {}", env!("CARGO_PKG_VERSION")));

    let primitive = builder.push_primitive(mesh);
    let material = builder.push_material(&png, channels);
    let mesh_index = builder.root.meshes.len() as u32;
    builder.root.meshes.push(gj::Mesh {
        name: None,
        primitives: vec![gj::mesh::Primitive {
            material: Some(gj::Index::new(material)),
            ..primitive
        }],
        weights: None,
        extensions: None,
        extras: gj::Extras::default(),
    });

    builder.root.nodes.push(gj::Node {
        mesh: Some(gj::Index::new(mesh_index)),
        ..Default::default()
    });
    builder.root.scenes.push(gj::Scene {
        name: None,
        nodes: vec![gj::Index::new(0)],
        extensions: None,
        extras: gj::Extras::default(),
    });
    builder.root.scene = Some(gj::Index::new(0));

    builder.finish()
}

#[derive(Default)]
struct GlbBuilder {
    root: gj::Root,
    buffer: Vec<u8>,
}

impl GlbBuilder {
    fn push_primitive(&mut self, mesh: &TexturedMesh) -> gj::mesh::Primitive {
        let count = mesh.num_vertices() as u32;

        let mut position_bytes = Vec::with_capacity(mesh.num_vertices() * 12);
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in mesh.positions() {
            let p = [p.x as f32, p.y as f32, p.z as f32];
            for c in 0..3 {
                min[c] = min[c].min(p[c]);
                max[c] = max[c].max(p[c]);
                position_bytes.extend_from_slice(&p[c].to_le_bytes());
            }
        }
        let view = self.push_view(&position_bytes, Some(gj::buffer::Target::ArrayBuffer));
        let positions = self.push_accessor(
            view,
            count,
            gj::accessor::ComponentType::F32,
            gj::accessor::Type::Vec3,
            Some((json_f32_array(&min), json_f32_array(&max))),
        );

        let uv_bytes: Vec<u8> = mesh
            .uvs_in(UvOrigin::TopLeft)
            .iter()
            .flat_map(|uv| [uv.x as f32, uv.y as f32])
            .flat_map(f32::to_le_bytes)
            .collect();
        let view = self.push_view(&uv_bytes, Some(gj::buffer::Target::ArrayBuffer));
        let uvs = self.push_accessor(
            view,
            count,
            gj::accessor::ComponentType::F32,
            gj::accessor::Type::Vec2,
            None,
        );

        let index_bytes: Vec<u8> = mesh
            .triangles()
            .iter()
            .flatten()
            .flat_map(|v| v.raw().to_le_bytes())
            .collect();
        let view = self.push_view(&index_bytes, Some(gj::buffer::Target::ElementArrayBuffer));
        let indices = self.push_accessor(
            view,
            mesh.num_triangles() as u32 * 3,
            gj::accessor::ComponentType::U32,
            gj::accessor::Type::Scalar,
            None,
        );

        let mut attributes = BTreeMap::new();
        attributes.insert(
            gj::validation::Checked::Valid(gj::mesh::Semantic::Positions),
            gj::Index::new(positions),
        );
        attributes.insert(
            gj::validation::Checked::Valid(gj::mesh::Semantic::TexCoords(0)),
            gj::Index::new(uvs),
        );

        gj::mesh::Primitive {
            attributes,
            extensions: None,
            extras: gj::Extras::default(),
            indices: Some(gj::Index::new(indices)),
            material: None,
            mode: gj::validation::Checked::Valid(gj::mesh::Mode::Triangles),
            targets: None,
        }
    }

    /// Embed the texture and add a material that samples it. Returns the
    /// material index.
    fn push_material(&mut self, png: &[u8], channels: ColorChannels) -> u32 {
        let view = self.push_view(png, None);
        self.root.images.push(gj::Image {
            buffer_view: Some(gj::Index::new(view)),
            mime_type: Some(gj::image::MimeType("image/png".into())),
            name: None,
            uri: None,
            extensions: None,
            extras: gj::Extras::default(),
        });

        // Charts are padded, not tiled, so sampling clamps at the atlas edge.
        self.root.samplers.push(gj::texture::Sampler {
            mag_filter: Some(gj::validation::Checked::Valid(gj::texture::MagFilter::Linear)),
            min_filter: Some(gj::validation::Checked::Valid(gj::texture::MinFilter::Linear)),
            wrap_s: gj::validation::Checked::Valid(gj::texture::WrappingMode::ClampToEdge),
            wrap_t: gj::validation::Checked::Valid(gj::texture::WrappingMode::ClampToEdge),
            name: None,
            extensions: None,
            extras: gj::Extras::default(),
        });

        self.root.textures.push(gj::Texture {
            name: None,
            sampler: Some(gj::Index::new(0)),
            source: gj::Index::new(0),
            extensions: None,
            extras: gj::Extras::default(),
        });

        let alpha_mode = match channels {
            ColorChannels::Rgb => gj::material::AlphaMode::Opaque,
            ColorChannels::Rgba => gj::material::AlphaMode::Blend,
        };

        let pbr = gj::material::PbrMetallicRoughness {
            base_color_factor: gj::material::PbrBaseColorFactor([1.0, 1.0, 1.0, 1.0]),
            base_color_texture: Some(gj::texture::Info {
                index: gj::Index::new(0),
                tex_coord: 0,
                extensions: None,
                extras: gj::Extras::default(),
            }),
            metallic_factor: gj::material::StrengthFactor(0.0),
            roughness_factor: gj::material::StrengthFactor(1.0),
            metallic_roughness_texture: None,
            extensions: None,
            extras: gj::Extras::default(),
        };

        let index = self.root.materials.len() as u32;
        self.root.materials.push(gj::Material {
            name: Some(MATERIAL_NAME.to_string()),
            alpha_cutoff: None,
            alpha_mode: gj::validation::Checked::Valid(alpha_mode),
            double_sided: false,
            pbr_metallic_roughness: pbr,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: gj::material::EmissiveFactor([0.0, 0.0, 0.0]),
            extensions: None,
            extras: gj::Extras::default(),
        });
        index
    }

    fn push_view(&mut self, data: &[u8], target: Option<gj::buffer::Target>) -> u32 {
        // Views start on four-byte boundaries.
        let padding = (4 - self.buffer.len() % 4) % 4;
        self.buffer.extend(std::iter::repeat(0u8).take(padding));
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(data);

        let index = self.root.buffer_views.len() as u32;
        self.root.buffer_views.push(gj::buffer::View {
            buffer: gj::Index::new(0),
            byte_offset: Some(gj::validation::USize64(offset as u64)),
            byte_length: gj::validation::USize64(data.len() as u64),
            byte_stride: None,
            target: target.map(gj::validation::Checked::Valid),
            name: None,
            extensions: None,
            extras: gj::Extras::default(),
        });
        index
    }

    fn push_accessor(
        &mut self,
        view: u32,
        count: u32,
        component_type: gj::accessor::ComponentType,
        type_: gj::accessor::Type,
        bounds: Option<(gj::Value, gj::Value)>,
    ) -> u32 {
        let (min, max) = bounds.unzip();
        let index = self.root.accessors.len() as u32;
        self.root.accessors.push(gj::Accessor {
            buffer_view: Some(gj::Index::new(view)),
            byte_offset: Some(gj::validation::USize64(0)),
            count: gj::validation::USize64(count as u64),
            component_type: gj::validation::Checked::Valid(gj::accessor::GenericComponentType(
                component_type,
            )),
            type_: gj::validation::Checked::Valid(type_),
            min,
            max,
            normalized: false,
            name: None,
            sparse: None,
            extensions: None,
            extras: gj::Extras::default(),
        });
        index
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        self.root.buffers.push(gj::Buffer {
            byte_length: gj::validation::USize64(self.buffer.len() as u64),
            name: None,
            uri: None,
            extensions: None,
            extras: gj::Extras::default(),
        });

        let json = self.root.to_vec().map_err(|e| BakeError::SaveError {
            path: PathBuf::new(),
            message: format!("glTF JSON serialization failed: {}", e),
        })?;

        let json_padding = (4 - json.len() % 4) % 4;
        let json_len = json.len() + json_padding;
        let bin_padding = (4 - self.buffer.len() % 4) % 4;
        let bin_len = self.buffer.len() + bin_padding;
        let total = 12 + 8 + json_len + 8 + bin_len;
        let total_u32 = u32::try_from(total).map_err(|_| BakeError::SaveError {
            path: PathBuf::new(),
            message: format!("{} bytes exceed the GLB size limit", total),
        })?;

        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&total_u32.to_le_bytes());

        glb.extend_from_slice(&(json_len as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        glb.extend_from_slice(&json);
        glb.extend(std::iter::repeat(b' ').take(json_padding));

        glb.extend_from_slice(&(bin_len as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(&self.buffer);
        glb.extend(std::iter::repeat(0u8).take(bin_padding));

        Ok(glb)
    }
}

fn json_f32_array(values: &[f32]) -> gj::Value {
    gj::Value::Array(values.iter().map(|&v| gj::Value::from(v as f64)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{bake, BakeOptions};
    use crate::test_util::cube;

    fn read(bytes: &[u8]) -> gltf::Gltf {
        gltf::Gltf::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_glb_holds_mesh_and_material() {
        let output = bake(&cube([0.0, 0.0, 1.0]), &BakeOptions::default()).unwrap();
        let bytes = to_glb(&output.mesh, &output.texture, output.channels).unwrap();

        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, bytes.len());

        let gltf = read(&bytes);
        let blob = gltf.blob.as_deref().unwrap();
        let mesh = gltf.meshes().next().unwrap();
        let primitive = mesh.primitives().next().unwrap();
        let reader = primitive.reader(|_| Some(blob));

        let positions: Vec<[f32; 3]> = reader.read_positions().unwrap().collect();
        assert_eq!(positions.len(), output.mesh.num_vertices());
        let uvs: Vec<[f32; 2]> = reader.read_tex_coords(0).unwrap().into_f32().collect();
        for (uv, expected) in uvs.iter().zip(output.mesh.uvs_in(UvOrigin::TopLeft)) {
            assert!((uv[0] as f64 - expected.x).abs() < 1e-6);
            assert!((uv[1] as f64 - expected.y).abs() < 1e-6);
        }
        let indices: Vec<u32> = reader.read_indices().unwrap().into_u32().collect();
        assert_eq!(indices.len(), output.mesh.num_triangles() * 3);

        let material = primitive.material();
        assert_eq!(material.name(), Some(MATERIAL_NAME));
        assert_eq!(material.alpha_mode(), gltf::material::AlphaMode::Opaque);
        let pbr = material.pbr_metallic_roughness();
        assert_eq!(pbr.metallic_factor(), 0.0);
        let info = pbr.base_color_texture().unwrap();
        assert_eq!(info.tex_coord(), 0);

        // The embedded image decodes to the baked atlas.
        let gltf::image::Source::View { view, mime_type } = info.texture().source().source() else {
            panic!("texture is not embedded");
        };
        assert_eq!(mime_type, "image/png");
        let png = &blob[view.offset()..view.offset() + view.length()];
        let decoded = image::load_from_memory(png).unwrap();
        assert_eq!(decoded.width(), output.layout.resolution);
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_rgba_texture_blends() {
        let mut output = bake(&cube([1.0, 1.0, 0.0]), &BakeOptions::default()).unwrap();
        output.channels = ColorChannels::Rgba;
        let bytes = to_glb(&output.mesh, &output.texture, output.channels).unwrap();
        let gltf = read(&bytes);
        let material = gltf.materials().next().unwrap();
        assert_eq!(material.alpha_mode(), gltf::material::AlphaMode::Blend);
    }

    #[test]
    fn test_save_writes_file() {
        let output = bake(&cube([1.0, 0.0, 0.0]), &BakeOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.glb");
        save(&output.mesh, &output.texture, output.channels, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let gltf = read(&bytes);
        assert_eq!(gltf.meshes().count(), 1);
        assert_eq!(gltf.images().count(), 1);
    }
}
