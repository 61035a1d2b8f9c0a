#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

use dropoutfx::api::{ApiError, ExpertSystem, LoginResponse, RiskLevel, RiskResult};
use dropoutfx::facts::{FactCatalog, RiskRequest};

pub fn sample_catalog() -> FactCatalog {
    serde_json::from_str(
        r#"{"gradeAverage":["High","Medium","Low"],"attendance":["Good","Poor"],"familyIncome":["Low","Medium","High"],"partTimeJob":["Yes","No"]}"#,
    )
    .expect("valid catalog")
}

pub fn high_risk() -> RiskResult {
    RiskResult {
        will_dropout: true,
        risk_level: RiskLevel::High,
        explanation: "Low grades combined with poor attendance".to_string(),
        remedies: vec!["Schedule advisor meeting".to_string()],
    }
}

pub fn http_error(status: u16, message: &str) -> ApiError {
    ApiError::Http {
        status,
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// In-memory backend recording every call
// ---------------------------------------------------------------------------

pub struct FakeBackend {
    pub latency: Duration,
    pub login_reply: Mutex<Result<LoginResponse, ApiError>>,
    pub facts_reply: Mutex<Result<FactCatalog, ApiError>>,
    pub evaluate_reply: Mutex<Result<RiskResult, ApiError>>,
    pub login_calls: Mutex<Vec<(String, String)>>,
    pub facts_calls: AtomicUsize,
    pub evaluate_calls: Mutex<Vec<(RiskRequest, Option<String>)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            login_reply: Mutex::new(Ok(LoginResponse {
                token: "tok-123".to_string(),
                user_name: Some("Ada".to_string()),
            })),
            facts_reply: Mutex::new(Ok(sample_catalog())),
            evaluate_reply: Mutex::new(Ok(high_risk())),
            login_calls: Mutex::new(Vec::new()),
            facts_calls: AtomicUsize::new(0),
            evaluate_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_login(self, err: ApiError) -> Self {
        *self.login_reply.lock().unwrap() = Err(err);
        self
    }

    pub fn failing_facts(self, err: ApiError) -> Self {
        *self.facts_reply.lock().unwrap() = Err(err);
        self
    }

    pub fn failing_evaluation(self, err: ApiError) -> Self {
        *self.evaluate_reply.lock().unwrap() = Err(err);
        self
    }

    pub fn set_evaluation(&self, reply: Result<RiskResult, ApiError>) {
        *self.evaluate_reply.lock().unwrap() = reply;
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.lock().unwrap().len()
    }

    pub fn evaluate_count(&self) -> usize {
        self.evaluate_calls.lock().unwrap().len()
    }

    pub fn last_evaluation(&self) -> Option<(RiskRequest, Option<String>)> {
        self.evaluate_calls.lock().unwrap().last().cloned()
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ExpertSystem for FakeBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.login_calls
            .lock()
            .unwrap()
            .push((email.to_string(), password.to_string()));
        self.wait().await;
        self.login_reply.lock().unwrap().clone()
    }

    async fn facts(&self) -> Result<FactCatalog, ApiError> {
        self.facts_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.facts_reply.lock().unwrap().clone()
    }

    async fn evaluate_dropout_risk(&self, request: &RiskRequest, token: Option<&str>) -> Result<RiskResult, ApiError> {
        self.evaluate_calls
            .lock()
            .unwrap()
            .push((request.clone(), token.map(str::to_string)));
        self.wait().await;
        self.evaluate_reply.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Minimal JSON HTTP server on a background thread
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub struct MockServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    /// `routes` maps "METHOD /path" to (status, body).
    pub fn start(routes: &[(&str, u16, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let routes: HashMap<String, (u16, String)> = routes
            .iter()
            .map(|(key, status, body)| (key.to_string(), (*status, body.to_string())))
            .collect();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                let Some(req) = read_request(&mut stream) else {
                    continue;
                };
                let key = format!("{} {}", req.method, req.path);
                let (status, body) = routes
                    .get(&key)
                    .cloned()
                    .unwrap_or((404, r#"{"error":"Not Found"}"#.to_string()));
                log.lock().unwrap().push(req);

                let response = format!(
                    "HTTP/1.1 {} X\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\
                     \r\n\
                     {}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> Option<Recorded> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
    }

    let len: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).ok()?;

    Some(Recorded {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}
