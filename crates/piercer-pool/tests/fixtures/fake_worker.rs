//! Minimal stand-in inference worker, used only by this crate's integration
//! tests.
//!
//! Implements just enough of the pool's stdio JSON-RPC protocol to drive a
//! load-run-shutdown cycle: announces itself ready, forwards one chunk and
//! a completion for each `run` it receives, and exits cleanly on
//! `shutdown`.

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

fn send(value: &Value) {
    let mut stdout = io::stdout();
    let _ = writeln!(stdout, "{value}");
    let _ = stdout.flush();
}

fn main() {
    send(&json!({
        "jsonrpc": "2.0",
        "method": "ready",
        "params": [],
        "id": "fake-worker-ready",
    }));

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(request) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        // Replies to our own outgoing calls (ready, receiveChunk, ...)
        // arrive back on this same stream; they carry no "method" field.
        let Some(method) = request.get("method").and_then(Value::as_str) else {
            continue;
        };
        let id = request["id"].clone();

        match method {
            "run" => {
                send(&json!({ "jsonrpc": "2.0", "id": id, "result": null }));
                let request_id = request["params"][0]["request_id"].clone();
                send(&json!({
                    "jsonrpc": "2.0",
                    "method": "receiveChunk",
                    "params": [{ "request_id": request_id, "data": { "text": "hi" } }],
                    "id": "fake-worker-chunk",
                }));
                send(&json!({
                    "jsonrpc": "2.0",
                    "method": "receiveComplete",
                    "params": [{ "request_id": request_id, "data": null }],
                    "id": "fake-worker-complete",
                }));
            }
            "shutdown" => {
                send(&json!({ "jsonrpc": "2.0", "id": id, "result": null }));
                return;
            }
            _ => {
                send(&json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": "unknown method" },
                }));
            }
        }
    }
}
