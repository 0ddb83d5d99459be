use anyhow::{Result, anyhow};
use log::{info, warn};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::{Handle, Signals},
};
use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
};

use crate::config::SceneConfig;
use crate::gestures::GestureClassifier;
use crate::hand_state::{SensorStatus, shared_hand_state};
use crate::ipc::{IpcServer, dispatch::DispatchContext, runtime::socket_path};
use crate::photos::PhotoWatcher;
use crate::render_loop::{Command, JsonLinesSink, NullSink, RenderLoop, RenderSink};
use crate::scene::Scene;
use crate::sensor::{SensorPipeline, SensorSource};

#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Overrides `~/.config/treectl/config.toml`.
    pub config_path: Option<PathBuf>,
    /// Read landmark lines from stdin instead of the configured command.
    pub stdin_sensor: bool,
    /// Write every frame as a JSON line to this file.
    pub frames: Option<PathBuf>,
    /// Overrides `~/.local/run/treectl.sock`.
    pub socket: Option<PathBuf>,
}

pub fn load_config(path: Option<&PathBuf>) -> Result<SceneConfig> {
    let cfg = match path {
        Some(p) => {
            let cfg = SceneConfig::load(p)?;
            info!("daemon: config {}", p.display());
            cfg
        }
        None => {
            let (cfg, p) = SceneConfig::load_or_install_default()?;
            info!("daemon: config {}", p.display());
            cfg
        }
    };
    Ok(cfg)
}

/// Sets `stop` on SIGINT/SIGTERM until shut down.
struct SignalWatch {
    handle: Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl SignalWatch {
    fn start(stop: Arc<AtomicBool>) -> Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let thread = thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("daemon: caught signal {sig}, stopping");
                stop.store(true, Ordering::Relaxed);
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Unregisters the handlers and joins the thread. Idempotent.
    fn shutdown(&mut self) {
        self.handle.close();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for SignalWatch {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Whatever has been started so far. Torn down input first, renderer last, on
/// every exit path.
#[derive(Default)]
struct Services {
    signals: Option<SignalWatch>,
    sensor: Option<SensorPipeline>,
    render: Option<RenderLoop>,
    photos: Option<PhotoWatcher>,
    ipc: Option<IpcServer>,
}

impl Services {
    fn shutdown(&mut self) {
        if let Some(s) = self.signals.as_mut() {
            s.shutdown();
        }
        if let Some(s) = self.sensor.as_mut() {
            s.shutdown();
        }
        if let Some(r) = self.render.as_mut() {
            r.shutdown();
        }
        if let Some(p) = self.photos.as_mut() {
            p.shutdown();
        }
        if let Some(i) = self.ipc.as_mut() {
            i.shutdown();
        }
    }
}

impl Drop for Services {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs until SIGINT/SIGTERM or a `shutdown` request.
pub fn run_daemon(opts: DaemonOptions) -> Result<()> {
    let cfg = load_config(opts.config_path.as_ref())?;
    let scene = Scene::new(&cfg)?;
    info!(
        "daemon: scene with {} particles, {} ornaments, {} cards",
        scene.particles().len(),
        scene.ornaments().len(),
        scene.carousel().len()
    );

    let mut svc = Services::default();
    let stop = Arc::new(AtomicBool::new(false));
    svc.signals = Some(SignalWatch::start(stop.clone())?);

    // vision
    let (writer, reader) = shared_hand_state();
    let classifier = GestureClassifier::new(cfg.classifier);
    let source = if opts.stdin_sensor {
        Some(SensorSource::Stdin)
    } else if !cfg.sensor.command.is_empty() {
        Some(SensorSource::Command(cfg.sensor.command.clone()))
    } else {
        None
    };
    svc.sensor = match source {
        Some(src) => Some(SensorPipeline::start(src, classifier, writer)),
        None => {
            warn!("daemon: no sensor configured; running without hand input");
            writer.set_sensor_status(SensorStatus::Offline("no sensor configured".into()));
            None
        }
    };

    // render loop
    let sink: Box<dyn RenderSink> = match &opts.frames {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| anyhow!("cannot open frame output {}: {e}", path.display()))?;
            info!("daemon: writing frames to {}", path.display());
            Box::new(JsonLinesSink::new(BufWriter::new(file), 1))
        }
        None => Box::new(NullSink),
    };
    let mut render = RenderLoop::new(scene, reader, &cfg.render);
    render.attach_sink(sink);
    let board = render.status_board();
    svc.render = Some(render);

    // photos + control socket
    let (tx, rx) = mpsc::channel::<Command>();
    let max_uploads = cfg.carousel.max_uploads;
    svc.photos = match &cfg.photos.dir {
        Some(dir) => match PhotoWatcher::start(dir.clone(), max_uploads, tx.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("daemon: photo directory {} not watched: {e}", dir.display());
                None
            }
        },
        None => None,
    };
    let sock = match opts.socket {
        Some(p) => p,
        None => socket_path()?,
    };
    svc.ipc = Some(IpcServer::start(
        &sock,
        DispatchContext {
            board,
            tx,
            max_uploads,
        },
    )?);

    if let Some(render) = svc.render.as_mut() {
        render.run(&rx, &stop);
    }
    svc.shutdown();
    info!("daemon: bye");
    Ok(())
}
