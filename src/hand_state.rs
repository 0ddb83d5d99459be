use glam::Vec2;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::gestures::{Gesture, Reading};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HandState {
    pub gesture: Gesture,
    pub hand_position: Vec2,
    pub is_present: bool,
    /// Number of sensor ticks applied so far.
    pub sequence: u64,
}

impl HandState {
    /// Overwrites the state from one reading. An absent hand keeps the last position.
    pub fn apply(&mut self, reading: &Reading) {
        match *reading {
            Reading::Absent => {
                self.is_present = false;
                self.gesture = Gesture::None;
            }
            Reading::Hand {
                gesture, position, ..
            } => {
                self.is_present = true;
                self.gesture = gesture;
                self.hand_position = position;
            }
        }
        self.sequence += 1;
    }
}

/// Health of the landmark producer, reported to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum SensorStatus {
    #[default]
    Starting,
    Online,
    Offline(String),
}

#[derive(Debug, Default)]
struct Shared {
    hand: Mutex<HandState>,
    sensor: Mutex<SensorStatus>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Creates the writer/reader pair over one shared record.
pub fn shared_hand_state() -> (HandStateWriter, HandStateReader) {
    let shared = Arc::new(Shared::default());
    (
        HandStateWriter {
            shared: shared.clone(),
        },
        HandStateReader { shared },
    )
}

/// Classifier side. Deliberately not `Clone`.
#[derive(Debug)]
pub struct HandStateWriter {
    shared: Arc<Shared>,
}

impl HandStateWriter {
    pub fn publish(&self, reading: &Reading) {
        lock(&self.shared.hand).apply(reading);
    }

    pub fn set_sensor_status(&self, status: SensorStatus) {
        *lock(&self.shared.sensor) = status;
    }
}

#[derive(Debug, Clone)]
pub struct HandStateReader {
    shared: Arc<Shared>,
}

impl HandStateReader {
    pub fn snapshot(&self) -> HandState {
        *lock(&self.shared.hand)
    }

    pub fn sensor_status(&self) -> SensorStatus {
        lock(&self.shared.sensor).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gestures::FingerStates;

    fn hand(gesture: Gesture, x: f32, y: f32) -> Reading {
        Reading::Hand {
            gesture,
            position: Vec2::new(x, y),
            fingers: FingerStates::default(),
        }
    }

    #[test]
    fn absent_keeps_position_and_clears_gesture() {
        let mut st = HandState::default();
        st.apply(&hand(Gesture::Gun, 0.3, -0.2));
        assert!(st.is_present);
        assert_eq!(st.gesture, Gesture::Gun);

        st.apply(&Reading::Absent);
        assert!(!st.is_present);
        assert_eq!(st.gesture, Gesture::None);
        assert_eq!(st.hand_position, Vec2::new(0.3, -0.2));
        assert_eq!(st.sequence, 2);
    }

    #[test]
    fn reader_sees_latest_publish() {
        let (writer, reader) = shared_hand_state();
        assert_eq!(reader.snapshot(), HandState::default());
        writer.publish(&hand(Gesture::Open, 0.1, 0.1));
        writer.publish(&hand(Gesture::Fist, 0.5, 0.5));
        let snap = reader.snapshot();
        assert_eq!(snap.gesture, Gesture::Fist);
        assert_eq!(snap.hand_position, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn writer_on_another_thread() {
        let (writer, reader) = shared_hand_state();
        let t = std::thread::spawn(move || {
            for _ in 0..100 {
                writer.publish(&hand(Gesture::Open, 0.0, 0.0));
            }
            writer.set_sensor_status(SensorStatus::Offline("eof".into()));
        });
        t.join().unwrap();
        assert_eq!(reader.snapshot().sequence, 100);
        assert_eq!(reader.sensor_status(), SensorStatus::Offline("eof".into()));
    }
}
