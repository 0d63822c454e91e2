//! Minimal HTTP/1.1 server imitating the search/show API for integration tests.
//!
//! Search responses are served in the order they were queued (an empty result
//! once the queue runs out). Lookups answer from a fixed id → JSON map, and
//! unknown ids get a 404 with error code 144. Every response carries
//! rate-limit headers.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// One canned response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: &'static str,
    pub body: String,
    pub remaining: u32,
    pub reset_epoch: i64,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: "200 OK",
            body: body.into(),
            remaining: 179,
            reset_epoch: chrono::Utc::now().timestamp() + 900,
        }
    }

    pub fn status(status: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            ..Self::ok(body)
        }
    }
}

#[derive(Default)]
struct Routes {
    searches: VecDeque<Reply>,
    lookups: HashMap<u64, Reply>,
    requests: Vec<String>,
}

#[derive(Clone)]
pub struct ApiServer {
    pub base_url: String,
    routes: Arc<Mutex<Routes>>,
}

impl ApiServer {
    /// Bind on an ephemeral port and serve until the process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes = Arc::new(Mutex::new(Routes::default()));
        let shared = Arc::clone(&routes);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &routes));
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            routes,
        }
    }

    pub fn push_search(&self, reply: Reply) {
        self.routes.lock().unwrap().searches.push_back(reply);
    }

    pub fn set_lookup(&self, id: u64, reply: Reply) {
        self.routes.lock().unwrap().lookups.insert(id, reply);
    }

    /// Request targets (path + query) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.routes.lock().unwrap().requests.clone()
    }
}

/// JSON for one status; `retweet_of` / `quote_of` nest another status.
pub fn status_json(id: u64, author: u64, retweets: u64, nested: Option<(&str, String)>) -> String {
    let nested = nested
        .map(|(field, json)| format!(r#","{}":{}"#, field, json))
        .unwrap_or_default();
    format!(
        r#"{{"id":{id},"full_text":"post {id}","user":{{"id":{author},"screen_name":"user{author}"}},"retweet_count":{retweets},"favorite_count":0{nested}}}"#
    )
}

pub fn search_json(statuses: &[String], next_results: Option<&str>) -> String {
    let next = next_results
        .map(|n| format!(r#","next_results":"{}""#, n))
        .unwrap_or_default();
    format!(
        r#"{{"statuses":[{}],"search_metadata":{{"count":100{}}}}}"#,
        statuses.join(","),
        next
    )
}

fn handle(mut stream: TcpStream, routes: &Mutex<Routes>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    let reply = {
        let mut routes = routes.lock().unwrap();
        routes.requests.push(target.clone());
        route(&mut routes, &target)
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
x-rate-limit-remaining: {}\r\nx-rate-limit-reset: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reply.body.len(),
        reply.remaining,
        reply.reset_epoch
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(reply.body.as_bytes());
}

fn route(routes: &mut Routes, target: &str) -> Reply {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path.ends_with("/search/tweets.json") {
        return routes
            .searches
            .pop_front()
            .unwrap_or_else(|| Reply::ok(search_json(&[], None)));
    }
    if path.ends_with("/statuses/show.json") {
        let id = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("id="))
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(reply) = id.and_then(|id| routes.lookups.get(&id)) {
            return reply.clone();
        }
        return Reply::status(
            "404 Not Found",
            r#"{"errors":[{"code":144,"message":"No status found with that ID."}]}"#,
        );
    }
    Reply::status(
        "404 Not Found",
        r#"{"errors":[{"code":34,"message":"Sorry, that page does not exist."}]}"#,
    )
}
