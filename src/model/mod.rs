//! Loaded character models
//!
//! A `Model` is one imported glTF asset: its node hierarchy (the wrapper that
//! gets shown and hidden), its animation clips and the player that drives
//! them. Posing and skinning happen on the CPU each frame, producing
//! world-space triangles for the rasterizer.

pub mod animation;
pub mod gltf_import;
pub mod material;
pub mod meshopt;

use std::collections::HashMap;

use macroquad::math::{Mat3, Mat4, Quat, Vec2, Vec3};

use crate::rasterizer::{Face, Texture, ToonShading, Vertex};
pub use animation::{AnimClip, AnimationPlayer};
pub use gltf_import::{import_model, ImportError};
pub use material::{Material, ToonMaterial};

/// Local transform of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Trs {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Trs {
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub rest: Trs,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

/// Triangle list with one material
#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Empty for rigid primitives
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub faces: Vec<Face>,
    pub material: Material,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, Default)]
pub struct Skin {
    /// Joint node indices in skin order
    pub joints: Vec<usize>,
    pub inverse_bind: Vec<Mat4>,
}

/// Everything one asset contributes to the scene
#[derive(Debug, Clone, Default)]
pub struct ModelHierarchy {
    pub nodes: Vec<Node>,
    /// Nodes of the displayed scene without a parent
    pub roots: Vec<usize>,
    pub meshes: Vec<Mesh>,
    pub skins: Vec<Skin>,
    pub textures: Vec<Texture>,
    pub visible: bool,
}

/// A primitive posed into world space, ready to rasterize
pub struct DrawBatch<'a> {
    pub vertices: Vec<Vertex>,
    pub faces: &'a [Face],
    pub material: ToonMaterial,
}

impl ModelHierarchy {
    pub fn rest_pose(&self) -> Vec<Trs> {
        self.nodes.iter().map(|n| n.rest).collect()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|m| &m.primitives)
            .map(|p| p.faces.len())
            .sum()
    }

    /// Rewrite every surface to its toon equivalent
    pub fn normalize_materials(&mut self) {
        for primitive in self.meshes.iter_mut().flat_map(|m| m.primitives.iter_mut()) {
            material::normalize(&mut primitive.material);
        }
    }

    /// World matrices for a local pose (parents before children)
    pub fn world_matrices(&self, pose: &[Trs]) -> Vec<Mat4> {
        let mut world = vec![Mat4::IDENTITY; self.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = self.roots.iter().rev().map(|&r| (r, Mat4::IDENTITY)).collect();
        while let Some((node, parent)) = stack.pop() {
            let local = pose.get(node).map(Trs::to_mat4).unwrap_or(Mat4::IDENTITY);
            let m = parent * local;
            world[node] = m;
            for &child in self.nodes[node].children.iter().rev() {
                stack.push((child, m));
            }
        }
        world
    }

    /// Pose every mesh in the displayed scene into world-space batches
    pub fn draw_batches(&self, pose: &[Trs]) -> Vec<DrawBatch<'_>> {
        let world = self.world_matrices(pose);
        let mut palettes: HashMap<usize, Vec<Mat4>> = HashMap::new();
        let mut batches = Vec::new();

        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            stack.extend(node.children.iter().rev());

            let Some(mesh) = node.mesh.and_then(|m| self.meshes.get(m)) else {
                continue;
            };
            let palette = match node.skin {
                Some(s) => {
                    if let Some(skin) = self.skins.get(s) {
                        palettes.entry(s).or_insert_with(|| joint_palette(skin, &world));
                    }
                    palettes.get(&s)
                }
                None => None,
            };

            for primitive in &mesh.primitives {
                let vertices = match palette {
                    Some(palette) if !primitive.joints.is_empty() => skin_vertices(primitive, palette),
                    _ => rigid_vertices(primitive, world[node_idx]),
                };
                batches.push(DrawBatch {
                    vertices,
                    faces: &primitive.faces,
                    material: primitive.material.to_toon(),
                });
            }
        }
        batches
    }

    /// Borrow the textures a toon material refers to
    pub fn shading<'a>(&'a self, material: &ToonMaterial) -> ToonShading<'a> {
        ToonShading {
            map: material.map.and_then(|i| self.textures.get(i)),
            tint: material.color,
            alpha_map: material.alpha_map.and_then(|i| self.textures.get(i)),
            alpha_test: material.alpha_test,
            transparent: material.transparent,
        }
    }
}

/// Joint world matrix times inverse bind matrix, in skin order
fn joint_palette(skin: &Skin, world: &[Mat4]) -> Vec<Mat4> {
    skin.joints
        .iter()
        .enumerate()
        .map(|(i, &joint)| {
            let g = world.get(joint).copied().unwrap_or(Mat4::IDENTITY);
            let ibm = skin.inverse_bind.get(i).copied().unwrap_or(Mat4::IDENTITY);
            g * ibm
        })
        .collect()
}

fn uv_at(primitive: &Primitive, i: usize) -> Vec2 {
    primitive.uvs.get(i).copied().unwrap_or(Vec2::ZERO)
}

fn rigid_vertices(primitive: &Primitive, world: Mat4) -> Vec<Vertex> {
    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
    primitive
        .positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let n = primitive.normals.get(i).copied().unwrap_or(Vec3::Y);
            Vertex::new(
                world.transform_point3(p),
                uv_at(primitive, i),
                (normal_matrix * n).normalize_or_zero(),
            )
        })
        .collect()
}

fn skin_vertices(primitive: &Primitive, palette: &[Mat4]) -> Vec<Vertex> {
    primitive
        .positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let joints = primitive.joints.get(i).copied().unwrap_or([0; 4]);
            let weights = primitive.weights.get(i).copied().unwrap_or([1.0, 0.0, 0.0, 0.0]);
            let n = primitive.normals.get(i).copied().unwrap_or(Vec3::Y);

            let mut skin = Mat4::ZERO;
            let mut total = 0.0;
            for (&j, &w) in joints.iter().zip(&weights) {
                if w == 0.0 {
                    continue;
                }
                if let Some(m) = palette.get(j as usize) {
                    skin += *m * w;
                    total += w;
                }
            }
            if total <= 0.0 {
                skin = Mat4::IDENTITY;
            } else if (total - 1.0).abs() > 1e-3 {
                skin *= 1.0 / total;
            }

            Vertex::new(
                skin.transform_point3(p),
                uv_at(primitive, i),
                skin.transform_vector3(n).normalize_or_zero(),
            )
        })
        .collect()
}

/// One loaded asset
#[derive(Debug, Clone)]
pub struct Model {
    /// Source path, used in log lines
    pub name: String,
    pub wrapper: ModelHierarchy,
    pub clips: Vec<AnimClip>,
    /// Present whenever the model has at least one clip
    pub player: Option<AnimationPlayer>,
}

impl Model {
    pub fn new(name: String, wrapper: ModelHierarchy, clips: Vec<AnimClip>) -> Self {
        let player = (!clips.is_empty()).then(|| AnimationPlayer::new(clips.len()));
        Self { name, wrapper, clips, player }
    }

    /// Stop all actions and play every clip once from time zero
    pub fn restart_animation(&mut self) {
        if let Some(player) = &mut self.player {
            player.restart();
        }
    }

    pub fn advance(&mut self, dt: f32) {
        if let Some(player) = &mut self.player {
            player.update(dt, &self.clips);
        }
    }

    pub fn current_pose(&self) -> Vec<Trs> {
        let rest = self.wrapper.rest_pose();
        match &self.player {
            Some(player) => player.pose(&self.clips, &rest),
            None => rest,
        }
    }

    pub fn draw_batches(&self) -> Vec<DrawBatch<'_>> {
        self.wrapper.draw_batches(&self.current_pose())
    }
}
