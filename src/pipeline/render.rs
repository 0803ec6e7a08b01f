//! HTML rendering: print a document to PDF with headless Chromium.
//!
//! ## One browser per render
//!
//! Every call launches its own Chromium process with a private profile and
//! scratch directory, held by a [`BrowserSession`]. Nothing is shared between
//! concurrent renders, so one document's content, cookies or cache can never
//! leak into another's output.
//!
//! ## Document origin
//!
//! The document never touches the disk. Each session serves it from a
//! [`DocumentServer`] bound to `127.0.0.1` on an ephemeral port, under a
//! random path, and the browser navigates there. An `http://` origin cannot
//! load `file://` resources, so a page cannot pull the function's own files
//! (or another render's workspace) into its PDF.
//!
//! ## Release on every exit path
//!
//! The session owns the child process, the document server and its
//! [`TempDir`]. Dropping the session kills the process if it is still alive,
//! stops the server and deletes the directory, whether the render succeeded,
//! failed, timed out, or the whole pipeline future was dropped because the
//! invocation deadline fired. Callers never clean up after the renderer.
//!
//! ## Background graphics
//!
//! Chromium's command-line print path has no `printBackground` switch, so the
//! document gets a `print-color-adjust: exact` rule injected into its head,
//! which has the same effect.

use crate::config::WorkerConfig;
use crate::error::{MessageError, WorkerError};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Turns HTML text into PDF bytes.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>, MessageError>;
}

/// [`RenderEngine`] backed by a headless Chromium executable.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    executable: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    print_background: bool,
}

impl ChromiumRenderer {
    /// Renderer using `executable` with the given launch flags.
    ///
    /// Per-render flags (profile, output path, document URL) are appended
    /// after `args`.
    pub fn new(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
            timeout: Duration::from_secs(20),
            print_background: true,
        }
    }

    /// Resolve the browser and flags for `config`.
    ///
    /// May unpack or download Chromium on a cold start, so this blocks; call
    /// it from `block_in_place` or `spawn_blocking` inside a runtime.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let executable = match &config.chromium_path {
            Some(p) => p.clone(),
            None => chromium_auto::ensure_chromium()
                .map_err(|e| WorkerError::ChromiumUnavailable(e.to_string()))?,
        };
        let mut args = chromium_auto::default_args();
        args.extend(config.extra_chromium_args.iter().cloned());
        info!("Using Chromium at {}", executable.display());

        Ok(Self::new(executable, args)
            .timeout(config.render_timeout())
            .print_background(config.print_background))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn print_background(mut self, v: bool) -> Self {
        self.print_background = v;
        self
    }
}

#[async_trait]
impl RenderEngine for ChromiumRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, MessageError> {
        let start = Instant::now();
        let document = prepare_document(html, self.print_background);
        let session = BrowserSession::launch(&self.executable, &self.args, document).await?;
        let pdf = session.finish(self.timeout).await?;
        debug!(
            "Rendered {} bytes of HTML → {} bytes of PDF in {}ms",
            html.len(),
            pdf.len(),
            start.elapsed().as_millis()
        );
        Ok(pdf)
    }
}

// ── Document server ──────────────────────────────────────────────────────

/// Serves one document over HTTP on the loopback interface.
///
/// The path is a random v4 UUID, so nothing else on the host can guess it.
/// The response is labelled `text/html; charset=utf-8`. The server task is
/// aborted when this value is dropped.
pub struct DocumentServer {
    url: Url,
    task: JoinHandle<()>,
}

impl DocumentServer {
    pub async fn start(document: String) -> Result<Self, MessageError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| render_err(format!("cannot bind document server: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| render_err(format!("cannot bind document server: {e}")))?;

        let token = Uuid::new_v4().simple().to_string();
        let url = Url::parse(&format!("http://{addr}/{token}"))
            .map_err(|e| render_err(format!("bad document URL: {e}")))?;

        let body = Bytes::from(document);
        let router = Router::new().route(&format!("/{token}"), get(move || async move { Html(body) }));

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                debug!("Document server stopped: {e}");
            }
        });
        Ok(Self { url, task })
    }

    /// Where the browser should navigate.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Drop for DocumentServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── Browser session ──────────────────────────────────────────────────────

/// A running browser, the server feeding it, and the scratch directory it
/// prints into.
///
/// Field order matters: the child is dropped (and killed) before the server
/// stops and the workspace is removed.
pub struct BrowserSession {
    child: Child,
    server: DocumentServer,
    output: PathBuf,
    stderr_log: PathBuf,
    workspace: TempDir,
}

impl BrowserSession {
    /// Serve `document` and start a browser printing it into a fresh
    /// workspace.
    pub async fn launch(
        executable: &Path,
        args: &[String],
        document: String,
    ) -> Result<Self, MessageError> {
        let workspace = tempfile::Builder::new()
            .prefix("html2pdf-")
            .tempdir()
            .map_err(|e| render_err(format!("cannot create browser workspace: {e}")))?;
        let output = workspace.path().join("output.pdf");
        let profile = workspace.path().join("profile");
        let stderr_log = workspace.path().join("stderr.log");

        // A file rather than a pipe: helpers the browser forks may keep its
        // stderr open long after the browser itself has exited.
        let stderr = tokio::fs::File::create(&stderr_log)
            .await
            .map_err(|e| render_err(format!("cannot create browser log: {e}")))?
            .into_std()
            .await;

        let server = DocumentServer::start(document).await?;

        let child = Command::new(executable)
            .args(args)
            .arg(format!("--user-data-dir={}", profile.display()))
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg("--no-pdf-header-footer")
            .arg(server.url().as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                render_err(format!(
                    "failed to launch '{}': {e}",
                    executable.display()
                ))
            })?;

        debug!(
            pid = ?child.id(),
            workspace = %workspace.path().display(),
            url = %server.url(),
            "Browser launched"
        );
        Ok(Self {
            child,
            server,
            output,
            stderr_log,
            workspace,
        })
    }

    /// Wait for the browser to exit and collect the PDF it printed.
    ///
    /// Consumes the session, so the process, server and workspace are
    /// released when this returns, successfully or not.
    pub async fn finish(mut self, timeout: Duration) -> Result<Vec<u8>, MessageError> {
        let status = match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => status.map_err(|e| render_err(format!("cannot wait for browser: {e}")))?,
            Err(_) => {
                warn!("Browser did not finish within {}ms; killing it", timeout.as_millis());
                return Err(render_err(format!(
                    "browser did not finish within {}ms",
                    timeout.as_millis()
                )));
            }
        };

        if !status.success() {
            let stderr = tokio::fs::read(&self.stderr_log).await.unwrap_or_default();
            return Err(render_err(format!(
                "browser exited with {status}: {}",
                stderr_tail(&stderr)
            )));
        }

        let pdf = tokio::fs::read(&self.output)
            .await
            .map_err(|e| render_err(format!("browser wrote no PDF: {e}")))?;
        check_pdf(&pdf)?;
        debug!(
            url = %self.server.url(),
            workspace = %self.workspace.path().display(),
            "Browser finished"
        );
        Ok(pdf)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            debug!(pid = ?self.child.id(), "Killing browser on release");
            let _ = self.child.start_kill();
        }
    }
}

// ── Document preparation ─────────────────────────────────────────────────

const META_CHARSET: &str = r#"<meta charset="utf-8">"#;

const PRINT_BACKGROUND_CSS: &str = "<style>*,*::before,*::after{\
-webkit-print-color-adjust:exact !important;print-color-adjust:exact !important}</style>";

static RE_HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").unwrap());

static RE_HTML_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<html(?:\s[^>]*)?>").unwrap());

static RE_DOCTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*<!doctype[^>]*>").unwrap());

/// Apply render options to the raw document.
///
/// The body was decoded as UTF-8 upstream, so a `<meta charset="utf-8">`
/// always goes first in the head; with `print_background` the colour-adjust
/// rule follows it. Both land right after `<head>`, or in a new head after
/// `<html>`, or in front of a bare fragment (after its doctype, if any).
pub fn prepare_document(html: &str, print_background: bool) -> String {
    let mut head = String::from(META_CHARSET);
    if print_background {
        head.push_str(PRINT_BACKGROUND_CSS);
    }

    let mut out = String::with_capacity(html.len() + head.len() + 16);
    if let Some(m) = RE_HEAD_OPEN.find(html) {
        out.push_str(&html[..m.end()]);
        out.push_str(&head);
        out.push_str(&html[m.end()..]);
    } else if let Some(m) = RE_HTML_OPEN.find(html) {
        out.push_str(&html[..m.end()]);
        out.push_str("<head>");
        out.push_str(&head);
        out.push_str("</head>");
        out.push_str(&html[m.end()..]);
    } else {
        let at = RE_DOCTYPE.find(html).map_or(0, |m| m.end());
        out.push_str(&html[..at]);
        out.push_str(&head);
        out.push_str(&html[at..]);
    }
    out
}

// ── Output checks ────────────────────────────────────────────────────────

/// Reject empty output and anything without the `%PDF` magic.
fn check_pdf(bytes: &[u8]) -> Result<(), MessageError> {
    if bytes.is_empty() {
        return Err(render_err("browser wrote an empty PDF"));
    }
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let head = &bytes[..bytes.len().min(4)];
        return Err(render_err(format!("browser output is not a PDF (starts with {head:?})")));
    }
    Ok(())
}

/// Last few lines of browser stderr, for error messages.
fn stderr_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = &lines[lines.len().saturating_sub(5)..];
    if tail.is_empty() {
        "(no stderr)".to_string()
    } else {
        tail.join(" | ")
    }
}

fn render_err(detail: impl Into<String>) -> MessageError {
    MessageError::RenderEngine {
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn css_goes_after_head() {
        let out = prepare_document("<html><head><title>x</title></head><body/></html>", true);
        assert!(
            out.starts_with(r#"<html><head><meta charset="utf-8"><style>"#),
            "got: {out}"
        );
        assert!(out.contains("print-color-adjust:exact"));
        assert!(out.ends_with("<title>x</title></head><body/></html>"));
    }

    #[test]
    fn head_with_attributes_and_case() {
        let out = prepare_document("<HTML><HEAD lang=\"en\"></HEAD></HTML>", true);
        assert!(
            out.starts_with(r#"<HTML><HEAD lang="en"><meta charset="utf-8"><style>"#),
            "got: {out}"
        );
    }

    #[test]
    fn header_element_is_not_head() {
        let out = prepare_document("<html><body><header>t</header></body></html>", true);
        assert!(
            out.starts_with(r#"<html><head><meta charset="utf-8"><style>"#),
            "got: {out}"
        );
        assert!(out.contains("<header>t</header>"));
    }

    #[test]
    fn fragment_gets_prefix() {
        let out = prepare_document("<p>hello</p>", true);
        assert!(out.starts_with(r#"<meta charset="utf-8"><style>"#), "got: {out}");
        assert!(out.ends_with("<p>hello</p>"));
    }

    #[test]
    fn fragment_keeps_doctype_first() {
        let out = prepare_document("<!DOCTYPE html>\n<p>Café €12.00</p>", false);
        assert_eq!(out, "<!DOCTYPE html><meta charset=\"utf-8\">\n<p>Café €12.00</p>");
    }

    #[test]
    fn charset_is_declared_without_print_background() {
        let out = prepare_document("<html><head><title>価格</title></head></html>", false);
        assert_eq!(
            out,
            r#"<html><head><meta charset="utf-8"><title>価格</title></head></html>"#
        );
        assert!(!out.contains("print-color-adjust"));

        let fragment = prepare_document("<p>Café</p>", false);
        assert_eq!(fragment, r#"<meta charset="utf-8"><p>Café</p>"#);
    }

    #[test]
    fn pdf_magic_is_checked() {
        assert!(check_pdf(b"%PDF-1.7\n...").is_ok());
        assert!(check_pdf(b"").is_err());
        assert!(check_pdf(b"<html>").is_err());
        assert!(check_pdf(b"%P").is_err());
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let err = b"a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(stderr_tail(err), "c | d | e | f | g");
        assert_eq!(stderr_tail(b""), "(no stderr)");
    }

    /// Plain HTTP/1.1 GET against the document server; returns the raw response.
    async fn http_get(url: &Url, path: &str) -> String {
        let host = url.host_str().unwrap();
        let port = url.port().unwrap();
        let mut stream = tokio::net::TcpStream::connect((host, port)).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    #[tokio::test]
    async fn document_server_serves_utf8_html_on_loopback() {
        let server = DocumentServer::start("<p>Café €12.00</p>".to_string())
            .await
            .unwrap();
        let url = server.url().clone();

        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        let token = url.path().trim_start_matches('/');
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()), "token: {token}");

        let response = http_get(&url, url.path()).await;
        assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
        assert!(
            response.to_ascii_lowercase().contains("content-type: text/html; charset=utf-8"),
            "got: {response}"
        );
        assert!(response.ends_with("<p>Café €12.00</p>"), "got: {response}");
    }

    #[tokio::test]
    async fn document_server_only_answers_its_own_path() {
        let server = DocumentServer::start("<p>secret</p>".to_string()).await.unwrap();
        let url = server.url().clone();

        let response = http_get(&url, "/").await;
        assert!(response.starts_with("HTTP/1.1 404"), "got: {response}");
        assert!(!response.contains("secret"));
    }

    #[tokio::test]
    async fn document_server_stops_on_drop() {
        let server = DocumentServer::start("<p>x</p>".to_string()).await.unwrap();
        let port = server.url().port().unwrap();
        drop(server);

        let mut refused = false;
        for _ in 0..40 {
            if tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.is_err() {
                refused = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(refused, "document server still accepting on port {port}");
    }

    #[cfg(unix)]
    mod fake_browser {
        use super::*;

        /// A stand-in browser: records its argument list (one per line) in
        /// `--marker` and prints a `%PDF` header into `--print-to-pdf`.
        const PRINTS_PDF: &str = r#"
out=""; marker=""
for arg in "$@"; do
  case "$arg" in
    --print-to-pdf=*) out="${arg#--print-to-pdf=}" ;;
    --marker=*) marker="${arg#--marker=}" ;;
  esac
done
[ -n "$marker" ] && printf '%s\n' "$@" > "$marker"
[ -n "$out" ] || exit 3
printf '%%PDF-1.7\n%%%%EOF\n' > "$out"
"#;

        /// Records its pid in `--marker`, then hangs.
        const HANGS: &str = r#"
for arg in "$@"; do
  case "$arg" in --marker=*) marker="${arg#--marker=}" ;; esac
done
printf '%s' "$$" > "$marker"
exec sleep 30
"#;

        fn renderer(dir: &Path, script: &str) -> (ChromiumRenderer, PathBuf) {
            let script_path = dir.join("browser.sh");
            std::fs::write(&script_path, script).unwrap();
            let marker = dir.join("marker");
            let r = ChromiumRenderer::new(
                "/bin/sh",
                vec![
                    script_path.display().to_string(),
                    format!("--marker={}", marker.display()),
                ],
            )
            .timeout(Duration::from_secs(10));
            (r, marker)
        }

        fn recorded_args(marker: &Path) -> Vec<String> {
            std::fs::read_to_string(marker)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        /// Whether `pid` has exited (gone or a zombie), polling for up to 2 s.
        #[cfg(target_os = "linux")]
        async fn released(pid: &str) -> bool {
            let stat = PathBuf::from(format!("/proc/{pid}/stat"));
            for _ in 0..40 {
                match std::fs::read_to_string(&stat) {
                    Err(_) => return true,
                    Ok(s) => {
                        let state = s.rsplit(')').next().unwrap_or("").trim_start();
                        if state.starts_with('Z') || state.starts_with('X') {
                            return true;
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            false
        }

        #[tokio::test]
        async fn prints_document_and_cleans_workspace() {
            let dir = tempfile::tempdir().unwrap();
            let (r, marker) = renderer(dir.path(), PRINTS_PDF);

            let pdf = r.render("<html><head></head><body>Q3</body></html>").await.unwrap();
            assert!(pdf.starts_with(b"%PDF-1.7"));

            let args = recorded_args(&marker);
            let printed_to = args
                .iter()
                .find_map(|a| a.strip_prefix("--print-to-pdf="))
                .map(PathBuf::from)
                .unwrap();
            let workspace = printed_to.parent().unwrap();
            assert!(!workspace.exists(), "workspace must be removed after render");
        }

        #[tokio::test]
        async fn browser_navigates_to_loopback_url_not_a_file() {
            let dir = tempfile::tempdir().unwrap();
            let (r, marker) = renderer(dir.path(), PRINTS_PDF);
            r.render("<p>x</p>").await.unwrap();

            let args = recorded_args(&marker);
            let last = Url::parse(args.last().unwrap()).unwrap();
            assert_eq!(last.scheme(), "http");
            assert_eq!(last.host_str(), Some("127.0.0.1"));
            assert!(last.port().is_some());
            assert_eq!(last.path().len(), 33, "path: {}", last.path());

            assert!(
                args.iter().all(|a| !a.contains("file:") && !a.ends_with(".html")),
                "args: {args:?}"
            );
            let workspace = args
                .iter()
                .find_map(|a| a.strip_prefix("--user-data-dir="))
                .map(|p| PathBuf::from(p).parent().unwrap().to_path_buf())
                .unwrap();
            assert!(args.contains(&format!(
                "--print-to-pdf={}",
                workspace.join("output.pdf").display()
            )));
            assert!(args.contains(&"--no-pdf-header-footer".to_string()));
        }

        #[tokio::test]
        async fn each_render_gets_its_own_url() {
            let dir_a = tempfile::tempdir().unwrap();
            let dir_b = tempfile::tempdir().unwrap();
            let (a, marker_a) = renderer(dir_a.path(), PRINTS_PDF);
            let (b, marker_b) = renderer(dir_b.path(), PRINTS_PDF);

            let (ra, rb) = tokio::join!(a.render("<p>a</p>"), b.render("<p>b</p>"));
            ra.unwrap();
            rb.unwrap();

            let url_a = recorded_args(&marker_a).pop().unwrap();
            let url_b = recorded_args(&marker_b).pop().unwrap();
            assert_ne!(url_a, url_b);
        }

        #[tokio::test]
        async fn non_zero_exit_is_render_error() {
            let dir = tempfile::tempdir().unwrap();
            let (r, _) = renderer(dir.path(), "echo 'navigation failed' >&2\nexit 1\n");

            match r.render("<p>x</p>").await {
                Err(MessageError::RenderEngine { detail }) => {
                    assert!(detail.contains("navigation failed"), "got: {detail}")
                }
                other => panic!("expected RenderEngine error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn lingering_helper_does_not_stall_a_finished_render() {
            let dir = tempfile::tempdir().unwrap();
            let script = r#"
for arg in "$@"; do
  case "$arg" in --print-to-pdf=*) printf '%%PDF-1.7\n' > "${arg#--print-to-pdf=}" ;; esac
done
echo 'helper started' >&2
sleep 5 &
exit 0
"#;
            let (r, _) = renderer(dir.path(), script);
            let r = r.timeout(Duration::from_secs(2));

            let started = Instant::now();
            let pdf = r.render("<p>x</p>").await.unwrap();
            assert!(pdf.starts_with(b"%PDF-1.7"));
            assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        }

        #[tokio::test]
        async fn non_pdf_output_is_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let script = r#"
for arg in "$@"; do
  case "$arg" in --print-to-pdf=*) printf 'oops' > "${arg#--print-to-pdf=}" ;; esac
done
"#;
            let (r, _) = renderer(dir.path(), script);
            let err = r.render("<p>x</p>").await.unwrap_err();
            assert!(err.to_string().contains("not a PDF"), "got: {err}");
        }

        #[tokio::test]
        async fn missing_output_is_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let (r, _) = renderer(dir.path(), "exit 0\n");
            let err = r.render("<p>x</p>").await.unwrap_err();
            assert!(err.to_string().contains("no PDF"), "got: {err}");
        }

        #[tokio::test]
        async fn hung_browser_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let (r, _) = renderer(dir.path(), HANGS);
            let r = r.timeout(Duration::from_millis(300));

            let started = Instant::now();
            let err = r.render("<p>x</p>").await.unwrap_err();
            assert!(err.to_string().contains("did not finish"), "got: {err}");
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn timed_out_browser_process_is_killed() {
            let dir = tempfile::tempdir().unwrap();
            let (r, marker) = renderer(dir.path(), HANGS);
            let r = r.timeout(Duration::from_millis(500));

            assert!(r.render("<p>x</p>").await.is_err());

            let pid = std::fs::read_to_string(&marker).unwrap();
            assert!(released(&pid).await, "browser pid {pid} still running");
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn dropped_render_kills_browser_process() {
            let dir = tempfile::tempdir().unwrap();
            let (r, marker) = renderer(dir.path(), HANGS);

            // Outer deadline fires long before the render timeout does.
            let outcome = tokio::time::timeout(Duration::from_millis(500), r.render("<p>x</p>")).await;
            assert!(outcome.is_err(), "render should still be pending");

            let pid = std::fs::read_to_string(&marker).unwrap();
            assert!(released(&pid).await, "browser pid {pid} still running");
        }

        #[tokio::test]
        async fn missing_executable_fails_to_launch() {
            let r = ChromiumRenderer::new("/nonexistent/chromium", vec![]);
            let err = r.render("<p>x</p>").await.unwrap_err();
            assert!(err.to_string().contains("failed to launch"), "got: {err}");
        }
    }
}
