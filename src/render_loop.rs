//! Fixed-step simulation driver.
//!
//! The loop owns the [`Scene`] and drives it in `1 / target_fps` steps from
//! wall-clock time, reading the hand state once per step. Renderers attach as
//! [`RenderSink`]s and may come and go without affecting scene state.

use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    io::Write,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, TryRecvError},
    },
    thread,
    time::{Duration, Instant},
};

use crate::carousel::PhotoTexture;
use crate::config::RenderConfig;
use crate::error::ImageError;
use crate::hand_state::{HandStateReader, SensorStatus};
use crate::scene::{FrameOutput, Scene, SceneStatus};

/// Consumer of per-frame transforms.
pub trait RenderSink: Send {
    fn present(&mut self, frame: &FrameOutput) -> Result<()>;

    /// Frees renderer resources. Called at most once per attached sink.
    fn release(&mut self) {}
}

/// Discards frames; used when running headless.
#[derive(Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn present(&mut self, _frame: &FrameOutput) -> Result<()> {
        Ok(())
    }
}

/// Writes every `every`-th frame as one JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
    every: u64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W, every: u64) -> Self {
        Self {
            out,
            every: every.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RenderSink for JsonLinesSink<W> {
    fn present(&mut self, frame: &FrameOutput) -> Result<()> {
        if frame.frame % self.every != 0 {
            return Ok(());
        }
        serde_json::to_writer(&mut self.out, frame)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn release(&mut self) {
        let _ = self.out.flush();
    }
}

/// Requests delivered to the loop between ticks.
#[derive(Debug)]
pub enum Command {
    Upload(Vec<Result<PhotoTexture, ImageError>>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopStatus {
    pub scene: SceneStatus,
    pub vision: SensorStatus,
    pub renderer_attached: bool,
    pub dropped_steps: u64,
}

/// Latest [`LoopStatus`], published by the loop and read by the control socket.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<Option<LoopStatus>>>,
}

impl StatusBoard {
    pub fn publish(&self, status: LoopStatus) {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = Some(status);
    }

    pub fn latest(&self) -> Option<LoopStatus> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

pub struct RenderLoop {
    scene: Scene,
    hand: HandStateReader,
    sink: Option<Box<dyn RenderSink>>,
    step: f32,
    max_catch_up: u32,
    accumulator: f32,
    dropped_steps: u64,
    stopped: bool,
    board: StatusBoard,
}

impl RenderLoop {
    pub fn new(scene: Scene, hand: HandStateReader, cfg: &RenderConfig) -> Self {
        Self {
            scene,
            hand,
            sink: None,
            step: 1.0 / cfg.target_fps,
            max_catch_up: cfg.max_catch_up.max(1),
            accumulator: 0.0,
            dropped_steps: 0,
            stopped: false,
            board: StatusBoard::default(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Attaches a renderer, releasing any previous one first.
    pub fn attach_sink(&mut self, sink: Box<dyn RenderSink>) {
        self.detach_sink();
        self.sink = Some(sink);
    }

    pub fn detach_sink(&mut self) {
        if let Some(mut old) = self.sink.take() {
            old.release();
        }
    }

    /// Feeds `dt` seconds of wall time. Runs whole steps only; returns how many.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if self.stopped {
            return 0;
        }
        self.accumulator += dt.max(0.0);
        let mut steps = 0;
        let mut last = None;
        while self.accumulator >= self.step && steps < self.max_catch_up {
            let hand = self.hand.snapshot();
            last = Some(self.scene.tick(&hand, self.step));
            self.accumulator -= self.step;
            steps += 1;
        }
        if self.accumulator >= self.step {
            let dropped = (self.accumulator / self.step) as u64;
            self.dropped_steps += dropped;
            debug!("render loop fell behind; dropping {dropped} step(s)");
            self.accumulator %= self.step;
        }

        if let (Some(frame), Some(sink)) = (last, self.sink.as_mut()) {
            if let Err(e) = sink.present(&frame) {
                warn!("renderer lost ({e}); detaching, scene keeps running");
                self.detach_sink();
            }
        }
        steps
    }

    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Upload(images) => {
                let report = self.scene.upload(images);
                info!(
                    "photos: applied {:?}, failed {}, ignored {}",
                    report.applied,
                    report.failed.len(),
                    report.ignored
                );
            }
            Command::Shutdown => {
                info!("render loop: shutdown requested");
                self.stopped = true;
            }
        }
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            scene: self.scene.status(),
            vision: self.hand.sensor_status(),
            renderer_attached: self.sink.is_some(),
            dropped_steps: self.dropped_steps,
        }
    }

    /// Runs on the calling thread until `stop` is set or a shutdown command arrives.
    /// The renderer stays attached; the owner finishes with [`RenderLoop::shutdown`].
    pub fn run(&mut self, commands: &Receiver<Command>, stop: &AtomicBool) {
        let frame_time = Duration::from_secs_f32(self.step);
        let mut last = Instant::now();
        info!("render loop: running at {:.0} fps", 1.0 / self.step);

        while !self.stopped && !stop.load(Ordering::Relaxed) {
            loop {
                match commands.try_recv() {
                    Ok(cmd) => self.handle(cmd),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            let now = Instant::now();
            self.advance(now.duration_since(last).as_secs_f32());
            last = now;
            self.board.publish(self.status());

            let spent = last.elapsed();
            if spent < frame_time {
                thread::sleep(frame_time - spent);
            }
        }
        debug!("render loop: run returned");
    }

    /// Stops ticking and releases the renderer. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.stopped && self.sink.is_none() {
            return;
        }
        self.stopped = true;
        self.detach_sink();
        info!("render loop: stopped after {} frames", self.scene.status().frame);
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
