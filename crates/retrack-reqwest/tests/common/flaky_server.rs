//! Minimal scripted HTTP/1.1 server for retry integration tests.
//!
//! Each accepted connection consumes the next entry of the script: hang up
//! without answering, stall until the client gives up, or respond with a
//! fixed status. Connections beyond the end of the script get 200.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Close the connection without writing a response.
    Drop,
    /// Read the request, then stall long enough for a client deadline to fire.
    Hang,
    /// Respond with the given status and an empty body.
    Status(u16),
    /// Respond 200 with a short body.
    Ok,
}

pub struct FlakyServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl FlakyServer {
    /// Number of connections accepted so far (= attempts, since every
    /// response closes the connection).
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread running `script`. Returns a handle
/// with the base URL; the server runs until the process exits.
pub fn start(script: Vec<Behavior>) -> FlakyServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let behavior = script.get(n).copied().unwrap_or(Behavior::Ok);
            thread::spawn(move || handle(stream, behavior));
        }
    });
    FlakyServer {
        url: format!("http://127.0.0.1:{}/", port),
        hits,
    }
}

fn handle(mut stream: std::net::TcpStream, behavior: Behavior) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let _ = stream.read(&mut buf);
    match behavior {
        Behavior::Drop => {
            // Hang up before answering: the client sees a mid-request
            // connection loss, not a response.
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Behavior::Hang => {
            thread::sleep(Duration::from_secs(2));
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Behavior::Status(code) => {
            let response = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            );
            let _ = stream.write_all(response.as_bytes());
        }
        Behavior::Ok => {
            let body = b"ok";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.write_all(body);
        }
    }
}
