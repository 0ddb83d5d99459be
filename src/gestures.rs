use glam::Vec2;
use serde::Serialize;

use crate::config::Thresholds;
use crate::landmarks::{
    HandFrame, INDEX_BASE, INDEX_TIP, Landmark, MIDDLE_BASE, MIDDLE_TIP, PINKY_BASE, PINKY_TIP,
    RING_BASE, RING_TIP, THUMB_TIP, WRIST,
};

/// Discrete hand pose driving the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gesture {
    #[default]
    None,
    Open,
    Fist,
    Gun,
    /// Reserved; never produced by [`GestureClassifier`].
    Victory,
    /// Reserved; never produced by [`GestureClassifier`].
    Thumb,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::None => "none",
            Gesture::Open => "open",
            Gesture::Fist => "fist",
            Gesture::Gun => "gun",
            Gesture::Victory => "victory",
            Gesture::Thumb => "thumb",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FingerStates {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerStates {
    /// First match wins: GUN, OPEN, FIST, otherwise NONE.
    pub fn gesture(&self) -> Gesture {
        let others_folded = !self.middle && !self.ring && !self.pinky;
        if self.thumb && self.index && others_folded {
            Gesture::Gun
        } else if self.index && self.middle && self.ring && self.pinky {
            Gesture::Open
        } else if !self.index && others_folded {
            Gesture::Fist
        } else {
            Gesture::None
        }
    }
}

/// Result of classifying one sensor tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Absent,
    Hand {
        gesture: Gesture,
        /// Mirrored, centered middle-finger base in [-1, 1].
        position: Vec2,
        fingers: FingerStates,
    },
}

impl Reading {
    pub fn gesture(&self) -> Gesture {
        match self {
            Reading::Absent => Gesture::None,
            Reading::Hand { gesture, .. } => *gesture,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    th: Thresholds,
}

impl GestureClassifier {
    pub fn new(th: Thresholds) -> Self {
        Self { th }
    }

    /// Classifies one frame. `None`, wrong-length or non-finite input reads as no hand.
    pub fn classify(&self, landmarks: Option<&[Landmark]>) -> Reading {
        match landmarks.and_then(HandFrame::from_slice) {
            Some(frame) => self.classify_frame(&frame),
            None => Reading::Absent,
        }
    }

    pub fn classify_frame(&self, frame: &HandFrame) -> Reading {
        let fingers = self.finger_states(frame);
        Reading::Hand {
            gesture: fingers.gesture(),
            position: hand_position(frame),
            fingers,
        }
    }

    pub fn finger_states(&self, frame: &HandFrame) -> FingerStates {
        let straight = |tip: usize, base: usize| {
            frame.distance(tip, WRIST) > frame.distance(base, WRIST) * self.th.finger_straight_ratio
        };
        let palm_size = frame.distance(WRIST, MIDDLE_BASE);
        FingerStates {
            thumb: frame.distance(THUMB_TIP, PINKY_BASE) > palm_size * self.th.thumb_palm_ratio,
            index: straight(INDEX_TIP, INDEX_BASE),
            middle: straight(MIDDLE_TIP, MIDDLE_BASE),
            ring: straight(RING_TIP, RING_BASE),
            pinky: straight(PINKY_TIP, PINKY_BASE),
        }
    }
}

fn hand_position(frame: &HandFrame) -> Vec2 {
    let p = frame.point(MIDDLE_BASE);
    Vec2::new(-(p.x - 0.5) * 2.0, -(p.y - 0.5) * 2.0)
}
