//! Minimal HTTP/1.1 server that serves a JSON chapter manifest and its images.
//!
//! `GET /chapter...` returns the manifest; `GET /chapter-N.json` names the
//! chapter `Chapter N`. `GET /img/NNN.png` returns image NNN (1-based) unless
//! it is configured to fail. Every request is counted by path, and the peak
//! number of image requests in flight at once is recorded. One request per
//! connection (`Connection: close`).

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ChapterServerOptions {
    pub image_count: usize,
    /// Zero-based image indices that always answer 500.
    pub failing: HashSet<usize>,
    /// Delay before each image response.
    pub image_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ChapterServer {
    pub base: String,
    counts: Arc<Mutex<HashMap<String, usize>>>,
    in_flight: Arc<InFlight>,
}

#[derive(Debug, Default)]
struct InFlight {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ChapterServer {
    pub fn manifest_url(&self) -> String {
        format!("{}chapter.json", self.base)
    }

    /// Manifest for `Chapter n`; its images are shared with every other chapter.
    pub fn chapter_url(&self, n: u32) -> String {
        format!("{}chapter-{}.json", self.base, n)
    }

    /// Most image requests the server was handling at the same time.
    pub fn peak_image_requests(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }

    pub fn image_url(&self, index: usize) -> String {
        format!("{}img/{:03}.png", self.base, index + 1)
    }

    pub fn requests(&self, path: &str) -> usize {
        self.counts.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn image_requests(&self) -> usize {
        self.counts
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.starts_with("/img/"))
            .map(|(_, n)| n)
            .sum()
    }
}

pub fn image_body(index: usize) -> Vec<u8> {
    format!("image-{:03}", index + 1).into_bytes()
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start(opts: ChapterServerOptions) -> ChapterServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let in_flight = Arc::new(InFlight::default());
    let server_counts = Arc::clone(&counts);
    let server_in_flight = Arc::clone(&in_flight);
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let counts = Arc::clone(&server_counts);
            let in_flight = Arc::clone(&server_in_flight);
            let opts = Arc::clone(&opts);
            thread::spawn(move || handle(stream, &opts, &counts, &in_flight));
        }
    });
    ChapterServer {
        base: format!("http://127.0.0.1:{}/", port),
        counts,
        in_flight,
    }
}

fn handle(
    mut stream: TcpStream,
    opts: &ChapterServerOptions,
    counts: &Mutex<HashMap<String, usize>>,
    in_flight: &InFlight,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&buf);
    let path = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    *counts.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    if path.starts_with("/chapter") {
        let images: Vec<String> = (0..opts.image_count)
            .map(|i| format!("\"img/{:03}.png\"", i + 1))
            .collect();
        let number = path
            .strip_prefix("/chapter-")
            .and_then(|rest| rest.strip_suffix(".json"))
            .unwrap_or("1");
        let body = format!(
            "{{\"title\":\"Test Series\",\"chapter\":\"Chapter {}\",\"images\":[{}]}}",
            number,
            images.join(",")
        );
        respond(&mut stream, "200 OK", "application/json", body.as_bytes());
        return;
    }
    if let Some(index) = parse_image_index(&path) {
        // Left before responding so a client's next request never overlaps this one.
        in_flight.enter();
        thread::sleep(opts.image_delay);
        in_flight.leave();
        if index >= opts.image_count {
            respond(&mut stream, "404 Not Found", "text/plain", b"missing");
        } else if opts.failing.contains(&index) {
            respond(&mut stream, "500 Internal Server Error", "text/plain", b"boom");
        } else {
            respond(&mut stream, "200 OK", "image/png", &image_body(index));
        }
        return;
    }
    respond(&mut stream, "404 Not Found", "text/plain", b"missing");
}

/// `/img/008.png` -> 7
fn parse_image_index(path: &str) -> Option<usize> {
    let name = path.strip_prefix("/img/")?.strip_suffix(".png")?;
    name.parse::<usize>().ok()?.checked_sub(1)
}

fn respond(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}
