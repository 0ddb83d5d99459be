use glam::{Quat, Vec2, Vec3};
use serde::Serialize;

use crate::animation::{AnimationState, CameraPose, CameraRig, advance_ornament, ornament_spin, scaled_rate};
use crate::carousel::{CardTick, CardTransform, Carousel, PhotoTexture, UploadReport};
use crate::config::SceneConfig;
use crate::error::{ConfigError, ImageError};
use crate::formation::{OrnamentKind, OrnamentRecord, ParticleField, generate, generate_ornament_set, seeded_rng};
use crate::gestures::Gesture;
use crate::hand_state::HandState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntityTransform {
    pub kind: OrnamentKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

/// Everything a renderer needs for one frame. Particles are not listed: they
/// are drawn from the immutable [`ParticleField`] with `elapsed` and `blend_factor`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutput {
    pub frame: u64,
    pub elapsed: f32,
    pub blend_factor: f32,
    pub gesture: Gesture,
    pub camera: CameraPose,
    pub ornaments: Vec<EntityTransform>,
    pub cards: Vec<CardTransform>,
}

/// Point-in-time summary for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneStatus {
    pub frame: u64,
    pub elapsed: f32,
    pub gesture: Gesture,
    pub hand_present: bool,
    pub hand_position: Vec2,
    pub blend_factor: f32,
    pub target_blend: f32,
    pub carousel_index: usize,
    pub card_count: usize,
    pub photo_count: usize,
}

#[derive(Debug, Clone)]
pub struct Scene {
    cfg: SceneConfig,
    particles: ParticleField,
    ornaments: Vec<OrnamentRecord>,
    carousel: Carousel,
    animation: AnimationState,
    camera: CameraRig,
    hand: HandState,
    elapsed: f32,
    frame: u64,
}

impl Scene {
    /// Builds every entity up front. Invalid configuration fails here, never mid-run.
    pub fn new(cfg: &SceneConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let mut rng = seeded_rng(cfg.scene.seed);
        let particles = generate(
            &mut rng,
            cfg.scene.particle_count,
            cfg.scene.particle_chaos_radius,
            cfg.scene.particle_size,
            &cfg.tree,
        )?;

        let radius = cfg.scene.ornament_chaos_radius;
        let o = &cfg.ornaments;
        let mut ornaments = Vec::with_capacity(o.gifts.count + o.baubles.count + o.lights.count);
        for (kind, class) in [
            (OrnamentKind::Gift, &o.gifts),
            (OrnamentKind::Bauble, &o.baubles),
            (OrnamentKind::Light, &o.lights),
        ] {
            ornaments.extend(generate_ornament_set(&mut rng, kind, class, radius, &cfg.tree)?);
        }
        let cards = generate_ornament_set(&mut rng, OrnamentKind::Card, &o.cards, radius, &cfg.tree)?;

        Ok(Self {
            cfg: cfg.clone(),
            particles,
            ornaments,
            carousel: Carousel::new(cards, cfg.carousel.clone()),
            animation: AnimationState::default(),
            camera: CameraRig::new(&cfg.animation),
            hand: HandState::default(),
            elapsed: 0.0,
            frame: 0,
        })
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn ornaments(&self) -> &[OrnamentRecord] {
        &self.ornaments
    }

    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Places every entity at blend `t` and holds the blend there until the next tick.
    pub fn snap_to(&mut self, t: f32) {
        let t = t.clamp(0.0, 1.0);
        self.animation.blend_factor = t;
        for o in &mut self.ornaments {
            o.current_position = o.blended(t);
        }
        for card in self.carousel.cards_mut() {
            card.ornament.current_position = card.ornament.blended(t);
        }
    }

    fn class_speed(&self, kind: OrnamentKind) -> f32 {
        let o = &self.cfg.ornaments;
        match kind {
            OrnamentKind::Gift => o.gifts.speed,
            OrnamentKind::Bauble => o.baubles.speed,
            OrnamentKind::Light => o.lights.speed,
            OrnamentKind::Card => o.cards.speed,
        }
    }

    /// Advances the scene by `dt` seconds using the latest hand snapshot.
    pub fn tick(&mut self, hand: &HandState, dt: f32) -> FrameOutput {
        let dt = dt.max(0.0);
        let hz = self.cfg.animation.reference_hz;
        self.hand = *hand;
        self.elapsed += dt;
        self.frame += 1;

        let blend_rate = scaled_rate(self.cfg.animation.blend_lerp, dt, hz);
        self.animation.step(hand.gesture, blend_rate, self.carousel.len());
        let blend = self.animation.blend_factor;
        let camera = self.camera.update(hand, dt, &self.cfg.animation);

        let rates = [OrnamentKind::Gift, OrnamentKind::Bauble, OrnamentKind::Light, OrnamentKind::Card]
            .map(|kind| scaled_rate(self.class_speed(kind), dt, hz));
        for o in &mut self.ornaments {
            advance_ornament(o, blend, rates[o.kind() as usize]);
        }

        let inspecting = self.inspecting();
        self.carousel.update(&CardTick {
            inspecting,
            blend_factor: blend,
            camera: &camera,
            elapsed: self.elapsed,
            ambient_rate: rates[OrnamentKind::Card as usize],
            inspect_rate: scaled_rate(self.cfg.carousel.inspect_rate, dt, hz),
        });

        FrameOutput {
            frame: self.frame,
            elapsed: self.elapsed,
            blend_factor: blend,
            gesture: hand.gesture,
            camera,
            ornaments: self.ornament_transforms(),
            cards: self.carousel.transforms(inspecting),
        }
    }

    /// The carousel card currently held in front of the camera, if any.
    pub fn inspecting(&self) -> Option<usize> {
        (self.hand.gesture == Gesture::Gun && !self.carousel.is_empty())
            .then_some(self.animation.active_carousel_index)
    }

    fn ornament_transforms(&self) -> Vec<EntityTransform> {
        self.ornaments
            .iter()
            .map(|o| EntityTransform {
                kind: o.kind(),
                position: o.current_position,
                rotation: ornament_spin(o, self.elapsed),
                scale: 1.0,
            })
            .collect()
    }

    pub fn upload(&mut self, images: Vec<Result<PhotoTexture, ImageError>>) -> UploadReport {
        self.carousel.upload(images, self.elapsed)
    }

    pub fn camera(&self) -> CameraPose {
        self.camera.pose()
    }

    pub fn status(&self) -> SceneStatus {
        SceneStatus {
            frame: self.frame,
            elapsed: self.elapsed,
            gesture: self.hand.gesture,
            hand_present: self.hand.is_present,
            hand_position: self.hand.hand_position,
            blend_factor: self.animation.blend_factor,
            target_blend: self.animation.target_blend,
            carousel_index: self.animation.active_carousel_index,
            card_count: self.carousel.len(),
            photo_count: self
                .carousel
                .cards()
                .iter()
                .filter(|c| !c.face().is_placeholder())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SceneConfig {
        let mut cfg = SceneConfig::default();
        cfg.scene.seed = Some(1);
        cfg.scene.particle_count = 100;
        cfg.ornaments.gifts.count = 5;
        cfg.ornaments.baubles.count = 6;
        cfg.ornaments.lights.count = 7;
        cfg.ornaments.cards.count = 4;
        cfg
    }

    fn hand(gesture: Gesture) -> HandState {
        HandState {
            gesture,
            hand_position: Vec2::ZERO,
            is_present: true,
            sequence: 0,
        }
    }

    #[test]
    fn builds_every_entity() {
        let scene = Scene::new(&small_config()).unwrap();
        assert_eq!(scene.particles().len(), 100);
        assert_eq!(scene.ornaments().len(), 18);
        assert_eq!(scene.carousel().len(), 4);
        let kinds: Vec<_> = scene.ornaments().iter().map(|o| o.kind()).collect();
        assert_eq!(kinds.iter().filter(|k| **k == OrnamentKind::Light).count(), 7);
    }

    #[test]
    fn same_seed_same_scene() {
        let a = Scene::new(&small_config()).unwrap();
        let b = Scene::new(&small_config()).unwrap();
        assert_eq!(a.particles(), b.particles());
        assert_eq!(a.ornaments(), b.ornaments());
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let mut cfg = small_config();
        cfg.scene.ornament_chaos_radius = 0.0;
        assert!(Scene::new(&cfg).is_err());
    }

    #[test]
    fn class_rate_table_matches_kind_order() {
        // `tick` indexes its rate table by discriminant.
        assert_eq!(OrnamentKind::Gift as usize, 0);
        assert_eq!(OrnamentKind::Bauble as usize, 1);
        assert_eq!(OrnamentKind::Light as usize, 2);
        assert_eq!(OrnamentKind::Card as usize, 3);
    }

    #[test]
    fn lights_converge_faster_than_gifts() {
        let mut scene = Scene::new(&small_config()).unwrap();
        for _ in 0..60 {
            scene.tick(&hand(Gesture::Fist), 1.0 / 60.0);
        }
        let progress = |kind: OrnamentKind| {
            let set: Vec<_> = scene.ornaments().iter().filter(|o| o.kind() == kind).collect();
            set.iter()
                .map(|o| {
                    let total = (o.target_position() - o.chaos_position()).length();
                    let left = (o.target_position() - o.current_position).length();
                    1.0 - left / total
                })
                .sum::<f32>()
                / set.len() as f32
        };
        assert!(progress(OrnamentKind::Light) > progress(OrnamentKind::Gift));
    }

    #[test]
    fn gun_inspects_active_card() {
        let mut scene = Scene::new(&small_config()).unwrap();
        let out = scene.tick(&hand(Gesture::Gun), 1.0 / 60.0);
        // Rising edge moved the index from 0 to 1.
        assert_eq!(scene.animation().active_carousel_index, 1);
        assert_eq!(scene.inspecting(), Some(1));
        assert!(out.cards[1].inspecting);

        scene.tick(&hand(Gesture::Fist), 1.0 / 60.0);
        assert_eq!(scene.inspecting(), None);
    }

    #[test]
    fn frame_output_carries_shader_scalars() {
        let mut scene = Scene::new(&small_config()).unwrap();
        let out = scene.tick(&HandState::default(), 0.5);
        assert_eq!(out.frame, 1);
        assert!((out.elapsed - 0.5).abs() < 1e-6);
        assert!(out.blend_factor > 0.0 && out.blend_factor < 1.0);
        assert_eq!(out.ornaments.len(), 18);
        assert_eq!(out.cards.len(), 4);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["gesture"], "none");
    }

    #[test]
    fn snap_to_places_entities() {
        let mut scene = Scene::new(&small_config()).unwrap();
        scene.snap_to(1.0);
        assert_eq!(scene.animation().blend_factor, 1.0);
        for o in scene.ornaments() {
            assert!((o.current_position - o.target_position()).length() < 1e-5);
        }
    }

    #[test]
    fn status_counts_photos() {
        let mut scene = Scene::new(&small_config()).unwrap();
        let png = b"\x89PNG\r\n\x1a\n....".to_vec();
        scene.upload(vec![PhotoTexture::from_bytes("a.png", png)]);
        let st = scene.status();
        assert_eq!(st.photo_count, 1);
        assert_eq!(st.card_count, 4);
    }
}
