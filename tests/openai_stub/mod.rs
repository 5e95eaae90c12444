use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const STUB_API_KEY: &str = "test-key";

#[derive(Debug, Clone)]
pub enum AnalysisBehavior {
    /// Answers with a fixed analysis that names the keywords found in the prompt.
    Summarize,
    /// Answers every request with this HTTP status.
    FailWith(u16),
    /// Answers 200 with no output text.
    Empty,
    /// Answers 200 with a body that is not JSON.
    Malformed,
}

pub struct OpenAiStub {
    pub base_url: String,
    prompts: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenAiStub {
    pub fn spawn(behavior: AnalysisBehavior) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&prompts);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post || path != "/v1/responses" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let authorized = request.headers().iter().any(|h| {
                    h.field.equiv("Authorization")
                        && h.value.as_str() == format!("Bearer {STUB_API_KEY}")
                });
                if !authorized {
                    let _ = request.respond(
                        tiny_http::Response::from_string(
                            r#"{"error":{"message":"invalid api key"}}"#,
                        )
                        .with_status_code(401),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let Some(prompt) = parsed.get("input").and_then(|v| v.as_str()) else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing input").with_status_code(400),
                    );
                    continue;
                };
                seen.lock().expect("lock prompts").push(prompt.to_owned());

                let output_text = match &behavior {
                    AnalysisBehavior::FailWith(status) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string(
                                r#"{"error":{"message":"stub failure"}}"#,
                            )
                            .with_status_code(*status),
                        );
                        continue;
                    }
                    AnalysisBehavior::Malformed => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("<html>gateway page</html>")
                                .with_status_code(200),
                        );
                        continue;
                    }
                    AnalysisBehavior::Empty => String::new(),
                    AnalysisBehavior::Summarize => summarize(prompt),
                };

                let response_body = serde_json::json!({
                    "id": "resp_stub",
                    "object": "response",
                    "model": parsed.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
                    "output": [
                        {
                            "type": "message",
                            "role": "assistant",
                            "content": [
                                { "type": "output_text", "text": output_text }
                            ]
                        }
                    ]
                });

                let mut response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(200);
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                response = response.with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            prompts,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[allow(dead_code)]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock prompts").clone()
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn extract_between<'a>(text: &'a str, begin: &str, end: &str) -> Option<&'a str> {
    let start = text.find(begin)? + begin.len();
    let rest = &text[start..];
    let end_rel = rest.find(end)?;
    Some(&rest[..end_rel])
}

fn summarize(prompt: &str) -> String {
    let keywords = extract_between(prompt, "keywords: [", "]").unwrap_or("");
    format!("Stub analysis for [{keywords}]")
}
