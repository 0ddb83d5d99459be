use anyhow::Result;
use log::{debug, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

use crate::carousel::PhotoTexture;
use crate::error::ImageError;
use crate::render_loop::Command;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Events arriving within this window are coalesced into one rescan.
const SETTLE: Duration = Duration::from_millis(250);

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Image files in `dir`, sorted by name, at most `limit`.
pub fn scan_photos(dir: &Path, limit: usize) -> io::Result<Vec<PathBuf>> {
    let mut v: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    v.sort();
    v.truncate(limit);
    Ok(v)
}

pub fn load_photos(paths: &[PathBuf]) -> Vec<Result<PhotoTexture, ImageError>> {
    paths.iter().map(|p| PhotoTexture::from_path(p)).collect()
}

fn send_scan(dir: &Path, limit: usize, tx: &Sender<Command>) -> bool {
    match scan_photos(dir, limit) {
        Ok(paths) => {
            debug!("photos: {} image(s) in {}", paths.len(), dir.display());
            tx.send(Command::Upload(load_photos(&paths))).is_ok()
        }
        Err(e) => {
            warn!("photos: cannot scan {}: {e}", dir.display());
            true
        }
    }
}

fn relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

pub struct PhotoWatcher {
    watcher: Option<RecommendedWatcher>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PhotoWatcher {
    /// Sends the current photos immediately, then again after every change.
    pub fn start(dir: PathBuf, limit: usize, tx: Sender<Command>) -> Result<Self> {
        let (ev_tx, ev_rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(ev_tx)?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("photos: watching {}", dir.display());

        send_scan(&dir, limit, &tx);
        let handle = thread::spawn(move || {
            while let Ok(first) = ev_rx.recv() {
                let mut changed = matches!(&first, Ok(ev) if relevant(ev));
                while let Ok(next) = ev_rx.recv_timeout(SETTLE) {
                    changed |= matches!(&next, Ok(ev) if relevant(ev));
                }
                if let Err(e) = &first {
                    warn!("photos: watch error: {e}");
                }
                if changed && !send_scan(&dir, limit, &tx) {
                    break;
                }
            }
            debug!("photos: watcher thread exiting");
        });

        Ok(Self {
            watcher: Some(watcher),
            thread: Some(handle),
        })
    }

    /// Dropping the watcher closes its channel, which ends the thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.watcher.take();
        if let Some(h) = self.thread.take() {
            let _ = h.join();
        }
    }
}

impl Drop for PhotoWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
