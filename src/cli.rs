use anyhow::{Result, anyhow};
use pico_args::Arguments;
use serde_json::{Value, json};
use std::{
    env,
    io::{self, BufRead, Write},
    path::PathBuf,
    process::{Command, Stdio},
};

use treectl::{
    daemon::{self, DaemonOptions},
    gestures::{GestureClassifier, Reading},
    ipc::{self, runtime::socket_path},
    sensor::parse_line,
};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let opts = DaemonOptions {
                config_path: pargs.opt_value_from_str("--config")?,
                stdin_sensor: pargs.contains("--stdin"),
                frames: pargs.opt_value_from_str("--frames")?,
                socket: None,
            };
            daemon::run_daemon(opts)
        }

        Some("start") => {
            let config: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let exe = env::current_exe()?;
            let mut cmd = Command::new(exe);
            cmd.arg("run").stdin(Stdio::null());
            if let Some(c) = config {
                cmd.arg("--config").arg(c);
            }
            let child = cmd.spawn()?;
            println!("treectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(json!({"op": "shutdown"})),

        Some("status") => request(json!({"op": "status"})),

        Some("upload") => {
            let mut paths = Vec::new();
            while let Some(p) = pargs.opt_free_from_str::<PathBuf>()? {
                paths.push(std::path::absolute(&p).unwrap_or(p));
            }
            if paths.is_empty() {
                return Err(anyhow!("usage: treectl upload <image>..."));
            }
            request(json!({"op": "upload", "paths": paths}))
        }

        Some("classify") => {
            let config: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let cfg = daemon::load_config(config.as_ref())?;
            let classifier = GestureClassifier::new(cfg.classifier);
            let stdin = io::stdin();
            let mut out = io::stdout().lock();
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                writeln!(out, "{}", classify_line(&classifier, &line))?;
            }
            Ok(())
        }

        Some("config") => {
            let config: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let cfg = daemon::load_config(config.as_ref())?;
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// One JSON object per input line. Malformed input reads as no hand.
fn classify_line(classifier: &GestureClassifier, line: &str) -> Value {
    let landmarks = match parse_line(line) {
        Ok(l) => l,
        Err(e) => return json!({"gesture": "none", "present": false, "error": e.to_string()}),
    };
    match classifier.classify(landmarks.as_deref()) {
        Reading::Absent => json!({"gesture": "none", "present": false}),
        Reading::Hand {
            gesture,
            position,
            fingers,
        } => json!({
            "gesture": gesture,
            "present": true,
            "position": [position.x, position.y],
            "fingers": fingers,
        }),
    }
}

fn request(req: Value) -> Result<()> {
    let r = ipc::client_request(&socket_path()?, req)?;
    print_response(&r);
    Ok(())
}

fn print_help() {
    println!(
        r#"treectl - gesture-driven tree animation daemon

USAGE:
  treectl help [command]                  Show general or command-specific help
  treectl run [--config PATH] [--stdin] [--frames FILE]
                                          Run the daemon in the foreground
  treectl start [--config PATH]           Start the daemon in the background
  treectl stop                            Stop the daemon
  treectl status                          Show gesture, blend and carousel state
  treectl upload <image>...               Put up to 5 photos on the cards
  treectl classify [--config PATH]        Classify landmark JSON lines from stdin
  treectl config [--config PATH]          Print the effective configuration

TIPS:
  - Config: ~/.config/treectl/config.toml (installed on first run)
  - Socket: ~/.local/run/treectl.sock
  - Log level: RUST_LOG=debug
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: treectl run [--config PATH] [--stdin] [--frames FILE]\nRuns the render loop in the foreground until SIGINT/SIGTERM or 'treectl stop'.\n  --stdin   read landmark lines from stdin instead of [sensor] command\n  --frames  append one JSON line per frame to FILE"
        ),
        "start" => println!("usage: treectl start [--config PATH]\nStarts 'treectl run' in the background."),
        "stop" => println!("usage: treectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: treectl status\nShows gesture, hand position, blend factor, carousel index and vision status."
        ),
        "upload" => println!(
            "usage: treectl upload <image>...\nImage i replaces card i's face; extra images are ignored."
        ),
        "classify" => println!(
            "usage: treectl classify [--config PATH]\nReads {{\"landmarks\":[...]}} lines on stdin, prints one classification per line."
        ),
        "config" => println!("usage: treectl config [--config PATH]\nPrints the configuration in effect as TOML."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
