use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

static LOGO_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

// `<title>Zipped</title>` page with "The zipped target arrived intact.", gzip-compressed.
static ZIPPED_HTML: &[u8] = &[
    31, 139, 8, 0, 0, 0, 0, 0, 2, 3, 37, 141, 65, 10, 128, 48, 12, 4, 239, 190, 34, 126, 192,
    124, 32, 228, 21, 158, 188, 213, 54, 216, 66, 181, 161, 4, 161, 190, 222, 210, 158, 150, 97,
    103, 89, 90, 67, 241, 214, 84, 32, 218, 157, 121, 161, 17, 20, 197, 5, 38, 75, 150, 133,
    143, 164, 42, 129, 112, 18, 225, 236, 206, 18, 26, 147, 242, 30, 5, 190, 97, 128, 185, 122,
    137, 129, 171, 53, 189, 29, 211, 99, 206, 219, 70, 168, 125, 52, 117, 156, 39, 63, 99, 20,
    203, 45, 117, 0, 0, 0,
];

/// One received request: its path and headers (names lowercased).
struct Hit {
    path: String,
    headers: Vec<(String, String)>,
}

/// Small site served from 127.0.0.1:
///
/// - `/` links to every other page (plus a mailto and a fragment link)
/// - `/b` mentions nothing of interest
/// - `/c` mentions "target" and carries a meta description
/// - `/logo.png` is an image
/// - `/broken` always answers 500
/// - `/old` redirects to `/c`
/// - `/zipped` (not linked) is an HTML page sent with `Content-Encoding: gzip`
pub struct SiteFixture {
    pub base_url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SiteFixture {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let hits = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&hits);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let headers = request
                    .headers()
                    .iter()
                    .map(|h| {
                        (
                            h.field.as_str().as_str().to_ascii_lowercase(),
                            h.value.as_str().to_owned(),
                        )
                    })
                    .collect();
                log.lock().expect("lock hits").push(Hit {
                    path: path.clone(),
                    headers,
                });

                let (status, content_type, body): (u16, &str, Vec<u8>) = match path.as_str() {
                    "/" => (
                        200,
                        "text/html; charset=utf-8",
                        br##"<!doctype html>
<html>
  <head><title>Home</title></head>
  <body>
    <p>Welcome home.</p>
    <a href="/b">B</a>
    <a href="c">C (relative)</a>
    <a href="/logo.png">Logo</a>
    <a href="/broken">Broken</a>
    <a href="/old">Old</a>
    <a href="mailto:owner@example.com">Mail</a>
    <a href="#top">Top</a>
  </body>
</html>
"##
                        .to_vec(),
                    ),
                    "/b" => (
                        200,
                        "text/html",
                        br#"<!doctype html>
<html>
  <head><title>B</title></head>
  <body><p>Nothing to see here.</p><a href="/">Home</a></body>
</html>
"#
                        .to_vec(),
                    ),
                    "/c" => (
                        200,
                        "text/html; charset=utf-8",
                        br#"<!doctype html>
<html>
  <head>
    <title>C</title>
    <meta name="description" content="Where the target lives">
  </head>
  <body>
    <script>var target = "not counted";</script>
    <p>The target keyword lives here.</p>
    <a href="/b#section">B again</a>
  </body>
</html>
"#
                        .to_vec(),
                    ),
                    "/logo.png" => (200, "image/png", LOGO_PNG.to_vec()),
                    "/broken" => (500, "text/plain", b"internal error".to_vec()),
                    "/old" => {
                        let location = tiny_http::Header::from_bytes(&b"Location"[..], &b"/c"[..])
                            .expect("build header");
                        let _ = request.respond(
                            tiny_http::Response::from_string("moved")
                                .with_status_code(302)
                                .with_header(location),
                        );
                        continue;
                    }
                    "/zipped" => {
                        let content_type =
                            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..])
                                .expect("build header");
                        let encoding =
                            tiny_http::Header::from_bytes(&b"Content-Encoding"[..], &b"gzip"[..])
                                .expect("build header");
                        let _ = request.respond(
                            tiny_http::Response::from_data(ZIPPED_HTML.to_vec())
                                .with_header(content_type)
                                .with_header(encoding),
                        );
                        continue;
                    }
                    _ => (404, "text/plain", b"not found".to_vec()),
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                        .expect("build header");
                let _ = request.respond(
                    tiny_http::Response::from_data(body)
                        .with_status_code(status)
                        .with_header(header),
                );
            }
        });

        Self {
            base_url,
            hits,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .expect("lock hits")
            .iter()
            .filter(|hit| hit.path == path)
            .count()
    }

    #[allow(dead_code)]
    pub fn total_hits(&self) -> usize {
        self.hits.lock().expect("lock hits").len()
    }

    /// Value of header `name` on the first request received for `path`.
    #[allow(dead_code)]
    pub fn request_header(&self, path: &str, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.hits
            .lock()
            .expect("lock hits")
            .iter()
            .find(|hit| hit.path == path)?
            .headers
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.clone())
    }
}

impl Drop for SiteFixture {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
