//! Per-tick animation state: the smoothed chaos/tree blend, gesture edge
//! detection for the carousel, and the camera rig.
//!
//! Rates in the config are "per tick at `reference_hz`"; [`scaled_rate`] turns
//! them into the fraction to apply for an arbitrary tick length so animation
//! speed does not depend on frame rate.

use glam::{Mat3, Quat, Vec3};
use serde::Serialize;

use crate::config::AnimationConfig;
use crate::formation::OrnamentRecord;
use crate::gestures::Gesture;
use crate::hand_state::HandState;

/// Fraction of the remaining distance covered in `dt` seconds for a per-tick rate `k`.
pub fn scaled_rate(k: f32, dt: f32, reference_hz: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    (1.0 - (1.0 - k.clamp(0.0, 1.0)).powf(dt * reference_hz)).clamp(0.0, 1.0)
}

pub fn approach(current: f32, target: f32, rate: f32) -> f32 {
    current + (target - current) * rate
}

/// Only an open hand scatters the tree.
pub fn target_blend_for(gesture: Gesture) -> f32 {
    match gesture {
        Gesture::Open => 0.0,
        Gesture::None | Gesture::Fist | Gesture::Gun | Gesture::Victory | Gesture::Thumb => 1.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationState {
    /// Smoothed, always within [0, 1].
    pub blend_factor: f32,
    pub target_blend: f32,
    pub active_carousel_index: usize,
    pub previous_gesture: Gesture,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            blend_factor: 0.0,
            target_blend: 1.0,
            active_carousel_index: 0,
            previous_gesture: Gesture::None,
        }
    }
}

impl AnimationState {
    /// Advances one tick. Returns true when this tick is a rising edge into GUN,
    /// in which case the carousel index has moved on by one.
    pub fn step(&mut self, gesture: Gesture, blend_rate: f32, card_count: usize) -> bool {
        self.target_blend = target_blend_for(gesture);
        self.blend_factor = approach(self.blend_factor, self.target_blend, blend_rate).clamp(0.0, 1.0);

        let rising = gesture == Gesture::Gun && self.previous_gesture != Gesture::Gun;
        if rising && card_count > 0 {
            self.active_carousel_index = (self.active_carousel_index + 1) % card_count;
        }
        self.previous_gesture = gesture;
        rising
    }
}

/// Moves an ornament toward its blended destination.
pub fn advance_ornament(o: &mut OrnamentRecord, blend_factor: f32, rate: f32) {
    let dest = o.blended(blend_factor);
    o.current_position = o.current_position.lerp(dest, rate);
}

/// Decorative spin at `elapsed` seconds.
pub fn ornament_spin(o: &OrnamentRecord, elapsed: f32) -> Quat {
    Quat::from_axis_angle(o.rotation_axis(), o.rotation_speed() * elapsed)
}

/// Camera frame, always looking at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl CameraPose {
    pub fn looking_at_origin(position: Vec3) -> Self {
        let forward = (-position).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
        let up = right.cross(forward);
        let rotation = Quat::from_mat3(&Mat3::from_cols(right, up, -forward));
        Self {
            position,
            rotation,
            forward,
            right,
            up,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    position: Vec3,
    anchor: Vec3,
}

impl CameraRig {
    pub fn new(cfg: &AnimationConfig) -> Self {
        let anchor = Vec3::from_array(cfg.camera_anchor);
        Self {
            position: anchor,
            anchor,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Follows the hand while present (re-centering fast on FIST), otherwise orbits.
    pub fn update(&mut self, hand: &HandState, dt: f32, cfg: &AnimationConfig) -> CameraPose {
        if hand.is_present {
            let (target, k) = match hand.gesture {
                Gesture::Fist => (self.anchor, cfg.camera_recenter_rate),
                _ => {
                    let [sx, sy] = cfg.camera_sensitivity;
                    let offset = Vec3::new(hand.hand_position.x * sx, hand.hand_position.y * sy, 0.0);
                    (self.anchor + offset, cfg.camera_follow_rate)
                }
            };
            let rate = scaled_rate(k, dt, cfg.reference_hz);
            self.position = self.position.lerp(target, rate);
        } else {
            self.position = Quat::from_rotation_y(cfg.auto_rotate_speed * dt) * self.position;
        }
        CameraPose::looking_at_origin(self.position)
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::looking_at_origin(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    const DT: f32 = 1.0 / 60.0;

    fn present(gesture: Gesture, x: f32, y: f32) -> HandState {
        HandState {
            gesture,
            hand_position: Vec2::new(x, y),
            is_present: true,
            sequence: 1,
        }
    }

    #[test]
    fn scaled_rate_matches_reference_tick() {
        assert!((scaled_rate(0.05, DT, 60.0) - 0.05).abs() < 1e-6);
        assert_eq!(scaled_rate(0.05, 0.0, 60.0), 0.0);
        assert_eq!(scaled_rate(1.0, DT, 60.0), 1.0);
        // Two half ticks cover the same ground as one full tick.
        let half = scaled_rate(0.05, DT / 2.0, 60.0);
        let mut v = 0.0;
        v = approach(v, 1.0, half);
        v = approach(v, 1.0, half);
        assert!((v - 0.05).abs() < 1e-5);
    }

    #[test]
    fn only_open_scatters() {
        assert_eq!(target_blend_for(Gesture::Open), 0.0);
        for g in [Gesture::None, Gesture::Fist, Gesture::Gun, Gesture::Victory, Gesture::Thumb] {
            assert_eq!(target_blend_for(g), 1.0);
        }
    }

    #[test]
    fn blend_rises_monotonically_within_bounds() {
        for k in [0.01, 0.05, 0.3, 0.9, 1.0] {
            let mut st = AnimationState::default();
            let mut last = st.blend_factor;
            for _ in 0..400 {
                st.step(Gesture::Fist, k, 0);
                assert!(st.blend_factor >= last, "k={k}");
                assert!((0.0..=1.0).contains(&st.blend_factor), "k={k}");
                last = st.blend_factor;
            }
            assert!(st.blend_factor > 0.98, "k={k}");
        }
    }

    #[test]
    fn blend_falls_on_open() {
        let mut st = AnimationState {
            blend_factor: 1.0,
            ..AnimationState::default()
        };
        for _ in 0..500 {
            st.step(Gesture::Open, 0.05, 0);
            assert!(st.blend_factor >= 0.0);
        }
        assert!(st.blend_factor < 1e-6);
        assert_eq!(st.target_blend, 0.0);
    }

    #[test]
    fn carousel_advances_once_per_gun_edge() {
        let mut st = AnimationState::default();
        let seq = [
            Gesture::None,
            Gesture::Gun,
            Gesture::Gun,
            Gesture::Gun,
            Gesture::Open,
            Gesture::Gun,
        ];
        let edges = seq.iter().filter(|g| st.step(**g, 0.05, 30)).count();
        assert_eq!(edges, 2);
        assert_eq!(st.active_carousel_index, 2);
    }

    #[test]
    fn carousel_index_wraps() {
        let mut st = AnimationState::default();
        for _ in 0..3 {
            st.step(Gesture::Gun, 0.05, 3);
            st.step(Gesture::None, 0.05, 3);
        }
        assert_eq!(st.active_carousel_index, 0);
        // No cards: edges are still reported, the index stays put.
        assert!(st.step(Gesture::Gun, 0.05, 0));
        assert_eq!(st.active_carousel_index, 0);
    }

    #[test]
    fn camera_follows_hand() {
        let cfg = AnimationConfig::default();
        let mut rig = CameraRig::new(&cfg);
        let hand = present(Gesture::Open, 0.5, -0.5);
        for _ in 0..600 {
            rig.update(&hand, DT, &cfg);
        }
        let expected = Vec3::new(0.0 + 0.5 * 12.0, 4.0 - 0.5 * 6.0, 20.0);
        assert!((rig.position() - expected).length() < 1e-3);
    }

    #[test]
    fn fist_recenters_faster() {
        let cfg = AnimationConfig::default();
        let anchor = Vec3::from_array(cfg.camera_anchor);
        let start = present(Gesture::Open, 1.0, 1.0);

        let mut slow = CameraRig::new(&cfg);
        let mut fast = CameraRig::new(&cfg);
        for _ in 0..600 {
            slow.update(&start, DT, &cfg);
            fast.update(&start, DT, &cfg);
        }
        // The open hand held at the same spot keeps the slow rig where it is;
        // a fist pulls the other rig back to the anchor.
        let fist = present(Gesture::Fist, 1.0, 1.0);
        let open_elsewhere = present(Gesture::Open, 0.0, 0.0);
        for _ in 0..10 {
            slow.update(&open_elsewhere, DT, &cfg);
            fast.update(&fist, DT, &cfg);
        }
        assert!((fast.position() - anchor).length() < (slow.position() - anchor).length());
    }

    #[test]
    fn camera_orbits_without_hand() {
        let cfg = AnimationConfig::default();
        let mut rig = CameraRig::new(&cfg);
        let start = rig.position();
        let pose = rig.update(&HandState::default(), 1.0, &cfg);
        let moved = pose.position;
        assert!((moved.length() - start.length()).abs() < 1e-4);
        assert!((moved.y - start.y).abs() < 1e-5);
        assert!((moved - start).length() > 0.1);
    }

    #[test]
    fn camera_looks_at_origin() {
        let pose = CameraPose::looking_at_origin(Vec3::new(0.0, 0.0, 10.0));
        assert!((pose.forward - Vec3::NEG_Z).length() < 1e-6);
        assert!((pose.right - Vec3::X).length() < 1e-6);
        assert!((pose.up - Vec3::Y).length() < 1e-6);
        // Camera-local -Z maps onto forward.
        assert!((pose.rotation * Vec3::NEG_Z - pose.forward).length() < 1e-5);
    }
}
