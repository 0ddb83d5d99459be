//! Gesture-driven tree animation.
//!
//! Hand landmarks from an external vision process are classified into a small
//! gesture vocabulary ([`gestures`]) and published to [`hand_state`]. A fixed-step
//! [`render_loop`] reads that state every tick and drives the [`scene`]: particle
//! foliage and ornaments blending between a scattered cloud and a cone-shaped
//! tree ([`formation`], [`animation`]), plus a carousel of photo cards
//! ([`carousel`]). Frames go to a pluggable renderer sink.

pub mod animation;
pub mod carousel;
pub mod config;
pub mod daemon;
pub mod error;
pub mod formation;
pub mod gestures;
pub mod hand_state;
pub mod ipc;
pub mod landmarks;
pub mod photos;
pub mod render_loop;
pub mod scene;
pub mod sensor;
