use anyhow::{Result, anyhow};
use log::{error, info};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use super::dispatch::{DispatchContext, dispatch_request};

/// Accept loop on its own thread. Requests never block the render loop.
pub struct IpcServer {
    socket: PathBuf,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl IpcServer {
    pub fn start(socket: &Path, ctx: DispatchContext) -> Result<Self> {
        if socket.exists() {
            let _ = std::fs::remove_file(socket);
        }
        let listener = UnixListener::bind(socket)?;
        listener.set_nonblocking(true)?;
        info!("ipc: listening on {}", socket.display());

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let ctx = ctx.clone();
                        thread::spawn(move || {
                            if let Err(e) = handle_client(stream, &ctx) {
                                error!("ipc client error: {e}");
                            }
                        });
                    }
                    Err(_) => thread::sleep(Duration::from_millis(10)),
                }
            }
        });

        Ok(Self {
            socket: socket.to_path_buf(),
            stop,
            thread: Some(handle),
        })
    }

    /// Stops accepting and removes the socket file. Idempotent.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.thread.take() {
            let _ = h.join();
            let _ = std::fs::remove_file(&self.socket);
            info!("ipc: closed {}", self.socket.display());
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn handle_client(mut stream: UnixStream, ctx: &DispatchContext) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let resp = dispatch_request(&req, ctx);
    writeln!(stream, "{resp}")?;
    Ok(())
}

/// Sends one request to a running daemon and returns its response.
pub fn client_request(socket: &Path, req: serde_json::Value) -> Result<serde_json::Value> {
    if !socket.exists() {
        return Err(anyhow!(
            "treectl daemon is not running (socket missing at {})",
            socket.display()
        ));
    }
    let mut stream = UnixStream::connect(socket)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
