//! Fixtures shared by unit tests: a recording fake fetcher and a minimal
//! HTTP/1.1 server that answers a fixed script of replies.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;

use crate::error::FetchError;
use crate::fetch::Fetch;

/// Fake fetcher that serves canned bodies by URL and records every request.
#[derive(Default)]
pub struct RecordingFetcher {
    bodies: HashMap<String, Vec<u8>>,
    fallback: Option<Vec<u8>>,
    fail_on: Option<String>,
    pub requests: RefCell<Vec<String>>,
}

impl RecordingFetcher {
    /// Answers every URL with the same body.
    pub fn uniform(body: Vec<u8>) -> Self {
        RecordingFetcher {
            fallback: Some(body),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    /// Fails with HTTP 503 for any URL ending in `suffix`.
    pub fn failing_on(mut self, suffix: &str) -> Self {
        self.fail_on = Some(suffix.to_string());
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Fetch for RecordingFetcher {
    fn fetch(&self, url: &str, _name: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        if let Some(suffix) = &self.fail_on {
            if url.ends_with(suffix.as_str()) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
        }
        self.bodies
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// One scripted HTTP response.
pub struct Reply {
    status: u16,
    location: Option<String>,
    content_length: Option<u64>,
    body: Vec<u8>,
}

impl Reply {
    pub fn ok(body: Vec<u8>) -> Self {
        Reply::status(200, body)
    }

    pub fn status(status: u16, body: Vec<u8>) -> Self {
        Reply {
            status,
            location: None,
            content_length: None,
            body,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Reply {
            status: 302,
            location: Some(location.to_string()),
            content_length: None,
            body: Vec::new(),
        }
    }

    /// Advertise `len` in `Content-Length` regardless of the actual body.
    pub fn with_content_length(mut self, len: u64) -> Self {
        self.content_length = Some(len);
        self
    }
}

pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<Vec<String>>,
}

impl TestServer {
    /// Waits for every scripted reply to be served and returns the request paths.
    pub fn finish(self) -> Vec<String> {
        self.handle.join().expect("test server panicked")
    }
}

/// Serves `replies` in order, one connection each, then stops listening.
pub fn serve(replies: Vec<Reply>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let handle = std::thread::spawn(move || {
        let mut paths = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).expect("read request");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let text = String::from_utf8_lossy(&request);
            let path = text
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("")
                .to_string();
            paths.push(path);

            let mut head = format!(
                "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n",
                reply.status,
                reply.content_length.unwrap_or(reply.body.len() as u64)
            );
            if let Some(location) = &reply.location {
                head.push_str(&format!("Location: {location}\r\n"));
            }
            head.push_str("\r\n");
            // The client may hang up early on a bad reply.
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&reply.body);
            let _ = stream.flush();
        }
        paths
    });

    TestServer {
        base_url: format!("http://127.0.0.1:{port}"),
        handle,
    }
}
