//! glTF 2.0 import (GLB or self-contained .gltf)
//!
//! Everything is read from the fetched bytes: the GLB binary chunk or
//! `data:` URIs. Files that point at sibling files on disk are rejected.
//! Buffer views packed with EXT_meshopt_compression are decoded before any
//! accessor is read.

use std::borrow::Cow;
use std::collections::HashMap;

use base64::Engine;
use gltf::animation::util::ReadOutputs;
use gltf::mesh::Mode;
use macroquad::math::{Mat4, Quat, Vec2, Vec3};
use thiserror::Error;

use super::animation::{AnimClip, Interpolation, TrackQuat, TrackVec3};
use super::material::{AlphaMode, Material, StandardMaterial};
use super::meshopt::{self, Compression, MeshoptError};
use super::{Mesh, Model, ModelHierarchy, Node, Primitive, Skin, Trs};
use crate::rasterizer::{Face, Texture};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("glTF parse error: {0}")]
    Parse(#[from] gltf::Error),
    #[error("external URI '{0}' is not supported (embed it or use .glb)")]
    UnsupportedUri(String),
    #[error("malformed data URI: {0}")]
    DataUri(#[from] base64::DecodeError),
    #[error("buffer {0} is missing or shorter than declared")]
    MissingBuffer(usize),
    #[error("image {index}: {source}")]
    Image {
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("file contains no drawable geometry")]
    NoGeometry,
    #[error("compressed bufferView {view}: {source}")]
    Meshopt {
        view: usize,
        #[source]
        source: MeshoptError,
    },
}

/// Parse a glTF asset into a hidden model with its clips and player
pub fn import_model(name: &str, bytes: &[u8]) -> Result<Model, ImportError> {
    let (doc, blob, compression) = open_document(bytes)?;

    let mut buffers = load_buffers(&doc, blob, &compression)?;
    decompress_views(&compression, &mut buffers)?;
    let textures = load_textures(&doc, &buffers)?;
    let meshes = load_meshes(&doc, &buffers);
    if meshes.iter().all(|m| m.primitives.is_empty()) {
        return Err(ImportError::NoGeometry);
    }

    let skins = doc
        .skins()
        .map(|skin| {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let reader = skin.reader(|b| buffers.get(b.index()).map(Vec::as_slice));
            let inverse_bind = match reader.read_inverse_bind_matrices() {
                Some(iter) => iter.map(|m| Mat4::from_cols_array_2d(&m)).collect(),
                None => vec![Mat4::IDENTITY; joints.len()],
            };
            Skin { joints, inverse_bind }
        })
        .collect();

    let mut nodes: Vec<Node> = doc
        .nodes()
        .map(|n| Node {
            name: n.name().unwrap_or("").to_string(),
            parent: None,
            children: n.children().map(|c| c.index()).collect(),
            rest: decompose_node(&n),
            mesh: n.mesh().map(|m| m.index()),
            skin: n.skin().map(|s| s.index()),
        })
        .collect();
    for i in 0..nodes.len() {
        for c in nodes[i].children.clone() {
            if let Some(child) = nodes.get_mut(c) {
                child.parent = Some(i);
            }
        }
    }

    // The displayed scene: the default one, else the first, else every root node
    let roots: Vec<usize> = match doc.default_scene().or_else(|| doc.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => (0..nodes.len()).filter(|&i| nodes[i].parent.is_none()).collect(),
    };

    let clips = load_clips(&doc, &buffers);

    let wrapper = ModelHierarchy {
        nodes,
        roots,
        meshes,
        skins,
        textures,
        visible: false,
    };
    Ok(Model::new(name.to_string(), wrapper, clips))
}

/// Split GLB or JSON input and validate the document. The meshopt extension
/// is handled here, so it is dropped from the required list before
/// validation would reject it.
fn open_document(bytes: &[u8]) -> Result<(gltf::Document, Option<Vec<u8>>, Compression), ImportError> {
    let (json, blob) = if bytes.starts_with(b"glTF") {
        let glb = gltf::Glb::from_slice(bytes)?;
        (glb.json, glb.bin.map(Cow::into_owned))
    } else {
        (Cow::Borrowed(bytes), None)
    };
    let mut root: gltf::json::Root = serde_json::from_slice(&json).map_err(gltf::Error::Deserialize)?;
    let compression = Compression::from_json(&json).map_err(gltf::Error::Deserialize)?;
    root.extensions_required.retain(|name| name != meshopt::EXTENSION);
    let doc = gltf::Document::from_json(root)?;
    Ok((doc, blob, compression))
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ImportError> {
    let unsupported = || ImportError::UnsupportedUri(uri.chars().take(48).collect());
    let rest = uri.strip_prefix("data:").ok_or_else(unsupported)?;
    let (header, payload) = rest.split_once(',').ok_or_else(unsupported)?;
    if !header.ends_with(";base64") {
        return Err(unsupported());
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

fn load_buffers(
    doc: &gltf::Document,
    mut blob: Option<Vec<u8>>,
    compression: &Compression,
) -> Result<Vec<Vec<u8>>, ImportError> {
    let mut out = Vec::with_capacity(doc.buffers().len());
    for buffer in doc.buffers() {
        // Filled in by decompress_views
        if compression.is_fallback(buffer.index()) {
            out.push(vec![0; buffer.length()]);
            continue;
        }
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob.take().ok_or(ImportError::MissingBuffer(buffer.index()))?,
            gltf::buffer::Source::Uri(uri) => decode_data_uri(uri)?,
        };
        if data.len() < buffer.length() {
            return Err(ImportError::MissingBuffer(buffer.index()));
        }
        out.push(data);
    }
    Ok(out)
}

/// Decode every compressed view into the buffer its accessors read from
fn decompress_views(compression: &Compression, buffers: &mut [Vec<u8>]) -> Result<(), ImportError> {
    for target in &compression.views {
        let c = &target.compressed;
        let fail = |source: MeshoptError| ImportError::Meshopt { view: target.view, source };
        let source = buffers
            .get(c.buffer)
            .and_then(|b| b.get(c.byte_offset..c.byte_offset + c.byte_length))
            .ok_or_else(|| {
                fail(MeshoptError::SourceRange {
                    buffer: c.buffer,
                    offset: c.byte_offset,
                    length: c.byte_length,
                })
            })?;
        let decoded = c.decode(source).map_err(fail)?;

        let dest = buffers
            .get_mut(target.buffer)
            .ok_or(ImportError::MissingBuffer(target.buffer))?;
        let end = target.byte_offset + decoded.len();
        if dest.len() < end {
            dest.resize(end, 0);
        }
        dest[target.byte_offset..end].copy_from_slice(&decoded);
    }
    Ok(())
}

fn load_textures(doc: &gltf::Document, buffers: &[Vec<u8>]) -> Result<Vec<Texture>, ImportError> {
    doc.images()
        .map(|image| {
            let index = image.index();
            let encoded: Vec<u8> = match image.source() {
                gltf::image::Source::View { view, .. } => {
                    let buffer = buffers
                        .get(view.buffer().index())
                        .ok_or(ImportError::MissingBuffer(view.buffer().index()))?;
                    let start = view.offset();
                    let end = start + view.length();
                    buffer
                        .get(start..end)
                        .ok_or(ImportError::MissingBuffer(view.buffer().index()))?
                        .to_vec()
                }
                gltf::image::Source::Uri { uri, .. } => decode_data_uri(uri)?,
            };
            let name = image.name().unwrap_or("").to_string();
            Texture::from_bytes(&encoded, name).map_err(|source| ImportError::Image { index, source })
        })
        .collect()
}

fn load_material(material: gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    Material::Standard(StandardMaterial {
        name: material.name().unwrap_or("").to_string(),
        base_color_factor: pbr.base_color_factor(),
        base_color_texture: pbr.base_color_texture().map(|info| info.texture().source().index()),
        alpha_mode: match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        },
    })
}

/// Triangle list for any triangle topology. None for points and lines.
fn triangulate(mode: Mode, indices: &[u32]) -> Option<Vec<Face>> {
    let face = |a: u32, b: u32, c: u32| Face::new(a as usize, b as usize, c as usize);
    let faces = match mode {
        Mode::Triangles => indices.chunks_exact(3).map(|t| face(t[0], t[1], t[2])).collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| if i % 2 == 0 { face(w[0], w[1], w[2]) } else { face(w[1], w[0], w[2]) })
            .collect(),
        Mode::TriangleFan => indices
            .windows(2)
            .skip(1)
            .map(|w| face(indices[0], w[0], w[1]))
            .collect(),
        _ => return None,
    };
    Some(faces)
}

/// Area-weighted vertex normals for primitives that ship without any
fn compute_normals(positions: &[Vec3], faces: &[Face]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for f in faces {
        let n = (positions[f.v1] - positions[f.v0]).cross(positions[f.v2] - positions[f.v0]);
        normals[f.v0] += n;
        normals[f.v1] += n;
        normals[f.v2] += n;
    }
    normals
        .into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            if n == Vec3::ZERO { Vec3::Y } else { n }
        })
        .collect()
}

fn load_meshes(doc: &gltf::Document, buffers: &[Vec<u8>]) -> Vec<Mesh> {
    doc.meshes()
        .map(|mesh| {
            let mut primitives = Vec::new();
            for prim in mesh.primitives() {
                let reader = prim.reader(|b| buffers.get(b.index()).map(Vec::as_slice));
                let Some(pos_it) = reader.read_positions() else {
                    continue;
                };
                let positions: Vec<Vec3> = pos_it.map(Vec3::from).collect();
                let indices: Vec<u32> = match reader.read_indices() {
                    Some(it) => it.into_u32().collect(),
                    None => (0..positions.len() as u32).collect(),
                };
                let Some(mut faces) = triangulate(prim.mode(), &indices) else {
                    continue;
                };
                faces.retain(|f| f.v0 < positions.len() && f.v1 < positions.len() && f.v2 < positions.len());
                if faces.is_empty() {
                    continue;
                }

                let normals = match reader.read_normals() {
                    Some(it) => it.map(Vec3::from).collect(),
                    None => compute_normals(&positions, &faces),
                };
                let material = prim.material();
                let uv_set = material
                    .pbr_metallic_roughness()
                    .base_color_texture()
                    .map(|info| info.tex_coord())
                    .unwrap_or(0);
                let uvs: Vec<Vec2> = reader
                    .read_tex_coords(uv_set)
                    .map(|tc| tc.into_f32().map(Vec2::from).collect())
                    .unwrap_or_default();
                let joints: Vec<[u16; 4]> = reader
                    .read_joints(0)
                    .map(|j| j.into_u16().collect())
                    .unwrap_or_default();
                let weights: Vec<[f32; 4]> = reader
                    .read_weights(0)
                    .map(|w| w.into_f32().collect())
                    .unwrap_or_default();

                primitives.push(Primitive {
                    positions,
                    normals,
                    uvs,
                    joints,
                    weights,
                    faces,
                    material: load_material(material),
                });
            }
            Mesh {
                name: mesh.name().unwrap_or("").to_string(),
                primitives,
            }
        })
        .collect()
}

/// Cubic-spline outputs carry (in-tangent, value, out-tangent) per key;
/// keep the values and sample them linearly.
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        values
    }
}

fn load_clips(doc: &gltf::Document, buffers: &[Vec<u8>]) -> Vec<AnimClip> {
    let mut clips = Vec::new();
    for anim in doc.animations() {
        let mut t_tracks: HashMap<usize, TrackVec3> = HashMap::new();
        let mut r_tracks: HashMap<usize, TrackQuat> = HashMap::new();
        let mut s_tracks: HashMap<usize, TrackVec3> = HashMap::new();
        let mut duration = 0.0f32;

        for channel in anim.channels() {
            let node = channel.target().node().index();
            let reader = channel.reader(|b| buffers.get(b.index()).map(Vec::as_slice));
            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            let Some(outputs) = reader.read_outputs() else {
                continue;
            };
            let (interpolation, cubic) = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Step => (Interpolation::Step, false),
                gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
                gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
            };

            match outputs {
                ReadOutputs::Translations(it) => {
                    let values = spline_values(it.map(Vec3::from).collect(), cubic);
                    t_tracks.insert(node, TrackVec3 { times: times.clone(), values, interpolation });
                }
                ReadOutputs::Rotations(it) => {
                    let values = spline_values(
                        it.into_f32().map(|q| Quat::from_array(q).normalize()).collect(),
                        cubic,
                    );
                    r_tracks.insert(node, TrackQuat { times: times.clone(), values, interpolation });
                }
                ReadOutputs::Scales(it) => {
                    let values = spline_values(it.map(Vec3::from).collect(), cubic);
                    s_tracks.insert(node, TrackVec3 { times: times.clone(), values, interpolation });
                }
                // Morph targets are not rendered
                ReadOutputs::MorphTargetWeights(_) => continue,
            }
            if let Some(&last) = times.last() {
                duration = duration.max(last);
            }
        }

        clips.push(AnimClip {
            name: anim.name().unwrap_or("").to_string(),
            duration,
            t_tracks,
            r_tracks,
            s_tracks,
        });
    }
    clips
}

fn decompose_node(n: &gltf::Node) -> Trs {
    use gltf::scene::Transform;
    match n.transform() {
        Transform::Matrix { matrix } => {
            let m = Mat4::from_cols_array_2d(&matrix);
            let (scale, rotation, translation) = m.to_scale_rotation_translation();
            Trs { translation, rotation, scale }
        }
        Transform::Decomposed { translation, rotation, scale } => Trs {
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation).normalize(),
            scale: Vec3::from(scale),
        },
    }
}
