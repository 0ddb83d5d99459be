use serde_json::{Value, json};
use std::{path::PathBuf, sync::mpsc::Sender};

use crate::photos::load_photos;
use crate::render_loop::{Command, StatusBoard};

/// What request handlers may touch. The scene itself stays on the render thread.
#[derive(Clone)]
pub struct DispatchContext {
    pub board: StatusBoard,
    pub tx: Sender<Command>,
    pub max_uploads: usize,
}

fn ok(data: Value) -> Value {
    json!({"ok": true, "data": data})
}

fn err(msg: impl std::fmt::Display) -> Value {
    json!({"ok": false, "error": msg.to_string()})
}

pub fn dispatch_request(req: &Value, ctx: &DispatchContext) -> Value {
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");
    match op {
        "status" => match ctx.board.latest() {
            Some(status) => match serde_json::to_value(status) {
                Ok(v) => ok(v),
                Err(e) => err(e),
            },
            None => err("render loop has not published a frame yet"),
        },
        "upload" => {
            let paths: Vec<PathBuf> = req
                .get("paths")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|p| p.as_str()).map(PathBuf::from).collect())
                .unwrap_or_default();
            if paths.is_empty() {
                return err("usage: {\"op\":\"upload\",\"paths\":[...]}");
            }
            let ignored = paths.len().saturating_sub(ctx.max_uploads);
            let paths = &paths[..paths.len().min(ctx.max_uploads)];
            let images = load_photos(paths);
            let rejected: Vec<Value> = images
                .iter()
                .enumerate()
                .filter_map(|(i, r)| r.as_ref().err().map(|e| json!({"index": i, "error": e.to_string()})))
                .collect();
            let count = images.len();
            match ctx.tx.send(Command::Upload(images)) {
                Ok(()) => ok(json!({"queued": count, "rejected": rejected, "ignored": ignored})),
                Err(_) => err("render loop is not running"),
            }
        }
        "shutdown" => match ctx.tx.send(Command::Shutdown) {
            Ok(()) => ok(json!("shutting down")),
            Err(_) => err("render loop is not running"),
        },
        _ => err(format!("unknown op: {op}")),
    }
}
