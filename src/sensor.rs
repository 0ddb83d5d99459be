//! Landmark producer adapter.
//!
//! The camera + hand model runs out of process and prints one JSON object per
//! sensor tick: `{"landmarks":[{"x":..,"y":..,"z":..}, ...]}` for a hand, and
//! `{"landmarks":null}` or `{}` when none is visible. Each line is classified on
//! the reader thread and published to the shared hand state.

use log::{debug, info, warn};
use serde::Deserialize;
use std::{
    io::{self, BufRead, BufReader},
    process::{Child, Command, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crate::gestures::GestureClassifier;
use crate::hand_state::{HandStateWriter, SensorStatus};
use crate::landmarks::Landmark;

#[derive(Debug, Deserialize)]
struct SensorLine {
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
}

/// Parses one producer line. `Ok(None)` is an explicit "no hand".
pub fn parse_line(line: &str) -> Result<Option<Vec<Landmark>>, serde_json::Error> {
    serde_json::from_str::<SensorLine>(line).map(|l| l.landmarks)
}

pub enum SensorSource {
    /// Program and arguments; its stdout carries the landmark lines.
    Command(Vec<String>),
    Stdin,
    Reader(Box<dyn BufRead + Send>),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub lines: u64,
    pub malformed: u64,
}

/// Reads lines until EOF or `stop`, publishing one reading per line.
pub fn pump<R: BufRead>(
    reader: R,
    classifier: &GestureClassifier,
    writer: &HandStateWriter,
    stop: &AtomicBool,
) -> PumpStats {
    let mut stats = PumpStats::default();
    for line in reader.lines() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("sensor: read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;
        let landmarks = match parse_line(&line) {
            Ok(l) => l,
            Err(e) => {
                stats.malformed += 1;
                if stats.malformed % 100 == 1 {
                    warn!("sensor: malformed line treated as no hand ({} so far): {e}", stats.malformed);
                }
                None
            }
        };
        let reading = classifier.classify(landmarks.as_deref());
        debug!("sensor: {:?}", reading.gesture());
        writer.publish(&reading);
    }
    stats
}

/// Running sensor thread plus the producer process, if any.
pub struct SensorPipeline {
    stop: Arc<AtomicBool>,
    child: Option<Child>,
    thread: Option<thread::JoinHandle<()>>,
    /// Stdin reads cannot be interrupted, so that thread is left detached.
    join_on_shutdown: bool,
}

impl SensorPipeline {
    /// Starts reading. Never fails: a producer that cannot start is reported as
    /// [`SensorStatus::Offline`] and the scene keeps its last-known hand state.
    pub fn start(source: SensorSource, classifier: GestureClassifier, writer: HandStateWriter) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut pipeline = Self {
            stop: stop.clone(),
            child: None,
            thread: None,
            join_on_shutdown: true,
        };

        let reader: Box<dyn BufRead + Send> = match source {
            SensorSource::Command(argv) => match spawn_producer(&argv) {
                Ok(mut child) => match child.stdout.take() {
                    Some(out) => {
                        info!("sensor: started producer '{}' (pid={})", argv.join(" "), child.id());
                        pipeline.child = Some(child);
                        Box::new(BufReader::new(out))
                    }
                    None => {
                        let _ = child.kill();
                        let _ = child.wait();
                        go_offline(&writer, "producer has no stdout".to_string());
                        return pipeline;
                    }
                },
                Err(e) => {
                    go_offline(&writer, e.to_string());
                    return pipeline;
                }
            },
            SensorSource::Stdin => {
                pipeline.join_on_shutdown = false;
                Box::new(BufReader::new(io::stdin()))
            }
            SensorSource::Reader(r) => r,
        };

        writer.set_sensor_status(SensorStatus::Online);
        let handle = thread::spawn(move || {
            let stats = pump(reader, &classifier, &writer, &stop);
            let reason = if stop.load(Ordering::Relaxed) {
                "stopped"
            } else {
                "sensor stream ended"
            };
            info!(
                "sensor: {reason} after {} line(s), {} malformed",
                stats.lines, stats.malformed
            );
            writer.set_sensor_status(SensorStatus::Offline(reason.to_string()));
        });
        pipeline.thread = Some(handle);
        pipeline
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops delivery and releases the producer. Safe to call repeatedly, and
    /// after a failed start.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            info!("sensor: producer stopped");
        }
        if let Some(handle) = self.thread.take() {
            if self.join_on_shutdown {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for SensorPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_producer(argv: &[String]) -> io::Result<Child> {
    let (prog, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty sensor command"))?;
    Command::new(prog)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

fn go_offline(writer: &HandStateWriter, reason: String) {
    warn!("sensor: vision offline: {reason}");
    writer.set_sensor_status(SensorStatus::Offline(reason));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::gestures::{Gesture, test_hands::hand};
    use crate::hand_state::shared_hand_state;
    use std::io::Cursor;

    fn line(pts: &[Landmark]) -> String {
        serde_json::json!({ "landmarks": pts }).to_string()
    }

    #[test]
    fn parses_hand_and_no_hand() {
        let pts = hand(true, true, true, true, true);
        assert_eq!(parse_line(&line(&pts)).unwrap().unwrap().len(), 21);
        assert_eq!(parse_line(r#"{"landmarks":null}"#).unwrap(), None);
        assert_eq!(parse_line("{}").unwrap(), None);
        assert!(parse_line("garbage").is_err());
    }

    #[test]
    fn pump_publishes_last_reading() {
        let (w, r) = shared_hand_state();
        let input = format!(
            "{}\n{}\n\n{}\n",
            line(&hand(true, true, true, true, true)),
            r#"{"landmarks":null}"#,
            line(&hand(true, true, false, false, false)),
        );
        let stats = pump(
            Cursor::new(input),
            &GestureClassifier::new(Thresholds::default()),
            &w,
            &AtomicBool::new(false),
        );
        assert_eq!(stats, PumpStats { lines: 3, malformed: 0 });
        let snap = r.snapshot();
        assert_eq!(snap.gesture, Gesture::Gun);
        assert!(snap.is_present);
        assert_eq!(snap.sequence, 3);
    }

    #[test]
    fn malformed_lines_read_as_no_hand() {
        let (w, r) = shared_hand_state();
        let short = &hand(false, false, false, false, false)[..5];
        let input = format!("{}\nnot json\n{}\n", line(&hand(false, false, false, false, false)), line(short));
        let stats = pump(
            Cursor::new(input),
            &GestureClassifier::new(Thresholds::default()),
            &w,
            &AtomicBool::new(false),
        );
        assert_eq!(stats.malformed, 1);
        let snap = r.snapshot();
        assert!(!snap.is_present);
        assert_eq!(snap.gesture, Gesture::None);
    }

    #[test]
    fn reader_source_goes_offline_at_eof() {
        let (w, r) = shared_hand_state();
        let input = format!("{}\n", line(&hand(false, false, false, false, false)));
        let mut p = SensorPipeline::start(
            SensorSource::Reader(Box::new(Cursor::new(input))),
            GestureClassifier::new(Thresholds::default()),
            w,
        );
        while p.is_running() {
            thread::sleep(std::time::Duration::from_millis(1));
        }
        p.shutdown();
        assert_eq!(r.snapshot().gesture, Gesture::Fist);
        assert!(matches!(r.sensor_status(), SensorStatus::Offline(_)));
        p.shutdown();
    }

    #[test]
    fn shutdown_kills_and_reaps_live_producer() {
        let (w, r) = shared_hand_state();
        let mut p = SensorPipeline::start(
            SensorSource::Command(vec!["sleep".into(), "60".into()]),
            GestureClassifier::new(Thresholds::default()),
            w,
        );
        assert!(p.is_running());
        assert_eq!(r.sensor_status(), SensorStatus::Online);
        let pid = p.child.as_ref().map(Child::id).unwrap();

        p.shutdown();
        p.shutdown();
        assert!(p.child.is_none());
        assert!(p.thread.is_none());
        assert!(!p.is_running());
        assert!(matches!(r.sensor_status(), SensorStatus::Offline(_)));
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }

    #[test]
    fn missing_producer_reports_offline() {
        let (w, r) = shared_hand_state();
        let mut p = SensorPipeline::start(
            SensorSource::Command(vec!["/nonexistent/treectl-hand-model".into()]),
            GestureClassifier::new(Thresholds::default()),
            w,
        );
        assert!(!p.is_running());
        assert!(matches!(r.sensor_status(), SensorStatus::Offline(_)));
        assert!(!r.snapshot().is_present);
        p.shutdown();
        p.shutdown();
    }

    #[test]
    fn empty_command_reports_offline() {
        let (w, r) = shared_hand_state();
        let _p = SensorPipeline::start(
            SensorSource::Command(vec![]),
            GestureClassifier::new(Thresholds::default()),
            w,
        );
        match r.sensor_status() {
            SensorStatus::Offline(reason) => assert!(reason.contains("empty")),
            other => panic!("unexpected status {other:?}"),
        }
    }
}
