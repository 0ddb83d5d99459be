//! Procedural layouts for the two spatial configurations of the scene.
//!
//! Every entity gets a *chaos* position (uniform by volume inside a sphere) and a
//! *target* position on the tree cone. Both are fixed at creation; only the
//! blend between them animates.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::f32::consts::TAU;

use crate::config::{OrnamentClass, TreeShape};
use crate::error::ConfigError;

/// Seeded generator; a fresh random seed when `seed` is `None`.
pub fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(rand::random))
}

/// Foliage particles. Immutable after construction: the renderer blends them
/// from the scene's blend factor and elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticleField {
    pub chaos: Vec<Vec3>,
    pub target: Vec<Vec3>,
    pub size: Vec<f32>,
    /// Per-particle phase in [0, 1).
    pub random: Vec<f32>,
}

impl ParticleField {
    pub fn len(&self) -> usize {
        self.chaos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chaos.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrnamentKind {
    Gift,
    Bauble,
    Light,
    Card,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrnamentRecord {
    kind: OrnamentKind,
    target_position: Vec3,
    chaos_position: Vec3,
    rotation_axis: Vec3,
    rotation_speed: f32,
    /// The only per-frame mutable field.
    pub current_position: Vec3,
}

impl OrnamentRecord {
    pub fn kind(&self) -> OrnamentKind {
        self.kind
    }

    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    pub fn chaos_position(&self) -> Vec3 {
        self.chaos_position
    }

    pub fn rotation_axis(&self) -> Vec3 {
        self.rotation_axis
    }

    /// Radians per second.
    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    /// Point between chaos and target for blend factor `t`.
    pub fn blended(&self, t: f32) -> Vec3 {
        self.chaos_position.lerp(self.target_position, t)
    }
}

fn check_radius(field: &'static str, radius: f32) -> Result<(), ConfigError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be > 0, got {radius}")))
    }
}

fn check_tree(tree: &TreeShape) -> Result<(), ConfigError> {
    check_radius("tree.height", tree.height)?;
    check_radius("tree.base_radius", tree.base_radius)
}

fn unit<R: Rng>(rng: &mut R) -> f32 {
    rng.gen_range(0.0..1.0)
}

/// Uniform-by-volume point in a sphere: `r = radius * cbrt(U)`.
pub fn random_in_sphere<R: Rng>(rng: &mut R, radius: f32) -> Vec3 {
    let r = radius * unit(rng).cbrt();
    let theta = unit(rng) * TAU;
    let phi = (2.0 * unit(rng) - 1.0).acos();
    Vec3::new(
        r * phi.sin() * theta.cos(),
        r * phi.sin() * theta.sin(),
        r * phi.cos(),
    )
}

/// Point on the cone at normalized height `t`; the radius shrinks linearly to the tip.
pub fn cone_point(tree: &TreeShape, t: f32, angle: f32, radius_scale: f32) -> Vec3 {
    let y = tree.base_y + t * tree.height;
    let r = tree.base_radius * (1.0 - t) * radius_scale;
    Vec3::new(r * angle.cos(), y, r * angle.sin())
}

pub fn generate<R: Rng>(
    rng: &mut R,
    count: usize,
    chaos_radius: f32,
    size_range: [f32; 2],
    tree: &TreeShape,
) -> Result<ParticleField, ConfigError> {
    check_radius("scene.particle_chaos_radius", chaos_radius)?;
    check_tree(tree)?;

    let mut field = ParticleField {
        chaos: Vec::with_capacity(count),
        target: Vec::with_capacity(count),
        size: Vec::with_capacity(count),
        random: Vec::with_capacity(count),
    };
    let [lo, hi] = size_range;
    for i in 0..count {
        field.chaos.push(random_in_sphere(rng, chaos_radius));
        let t = unit(rng);
        field.target.push(cone_point(tree, t, i as f32 * tree.spiral_step, 1.0));
        field.size.push(lo + (hi - lo) * unit(rng));
        field.random.push(unit(rng));
    }
    Ok(field)
}

pub fn generate_ornament_set<R: Rng>(
    rng: &mut R,
    kind: OrnamentKind,
    class: &OrnamentClass,
    chaos_radius: f32,
    tree: &TreeShape,
) -> Result<Vec<OrnamentRecord>, ConfigError> {
    check_radius("scene.ornament_chaos_radius", chaos_radius)?;
    check_radius("ornaments.radius_scale", class.radius_scale)?;
    check_tree(tree)?;

    let records = (0..class.count)
        .map(|_| {
            let chaos = random_in_sphere(rng, chaos_radius);
            let t = unit(rng);
            let angle = unit(rng) * TAU;
            let target = cone_point(tree, t, angle, class.radius_scale);
            let theta = unit(rng) * TAU;
            let phi = (2.0 * unit(rng) - 1.0).acos();
            let axis = Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos());
            OrnamentRecord {
                kind,
                target_position: target,
                chaos_position: chaos,
                rotation_axis: axis.normalize_or(Vec3::Y),
                rotation_speed: 0.2 + 0.8 * unit(rng),
                current_position: chaos,
            }
        })
        .collect();
    Ok(records)
}
