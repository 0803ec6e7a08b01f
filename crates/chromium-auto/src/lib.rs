//! # chromium-auto
//!
//! Find a headless Chromium executable at runtime, unpacking and caching it
//! on first use when it ships as an archive (a Lambda layer or a download),
//! so the rendering worker never needs a hand-configured browser install.
//!
//! ## How it works
//!
//! On first call to [`ensure_chromium`]:
//!
//! 1. Honours `CHROMIUM_PATH` when it points to an existing file.
//! 2. Checks [`chromium_cache_dir`] for a previously unpacked executable.
//! 3. Unpacks a `.tar.gz` from `CHROMIUM_ARCHIVE` (e.g. a layer file such as
//!    `/opt/chromium.tar.gz`) or downloads one from `CHROMIUM_ARCHIVE_URL`
//!    into the cache directory.
//! 4. Falls back to well-known executable names on `PATH`.
//!
//! The result is memoised for the lifetime of the process; warm Lambda
//! invocations skip all of the above.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chromium_auto::{default_args, ensure_chromium};
//!
//! let exe = ensure_chromium().expect("Chromium unavailable");
//! let args = default_args();
//! println!("{} {}", exe.display(), args.join(" "));
//! ```
//!
//! ## Environment variable overrides
//!
//! - `CHROMIUM_PATH` — path to an existing Chromium / headless_shell binary.
//! - `CHROMIUM_ARCHIVE` — local `.tar.gz` containing the browser.
//! - `CHROMIUM_ARCHIVE_URL` — remote `.tar.gz` containing the browser.
//! - `CHROMIUM_CACHE_DIR` — override the unpack/cache directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Executable names searched for, in order, both inside unpacked archives
/// and on `PATH`.
pub const EXECUTABLE_NAMES: &[&str] = &[
    "headless_shell",
    "chromium",
    "chromium-browser",
    "chrome",
    "google-chrome",
    "google-chrome-stable",
];

/// Flags every launch gets.
const BASE_ARGS: &[&str] = &[
    "--headless",
    "--disable-gpu",
    "--hide-scrollbars",
    "--mute-audio",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--font-render-hinting=none",
];

/// Extra flags needed inside the Lambda sandbox: no setuid sandbox, no
/// zygote, and no `/dev/shm` (which is only 64 MB there).
const LAMBDA_ARGS: &[&str] = &[
    "--no-sandbox",
    "--no-zygote",
    "--single-process",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chromium-auto operations.
#[derive(Error, Debug)]
pub enum ChromiumAutoError {
    /// No executable was found by any resolution step.
    #[error("No Chromium executable found (searched: {searched})")]
    NotFound { searched: String },

    /// Could not create or navigate the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Reading a local archive failed.
    #[error("Failed to read archive '{path}': {source}")]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// gzip/tar extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// The archive unpacked fine but held no known executable.
    #[error("Archive unpacked to '{dir}' but contains no Chromium executable")]
    ExecutableMissing { dir: PathBuf },
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// `true` when running inside AWS Lambda (or a faithful emulator).
pub fn is_running_on_lambda() -> bool {
    std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some()
}

/// Returns the directory the browser archive is unpacked into.
///
/// Default locations:
/// - **Lambda**: `/tmp/chromium/` (the only writable path)
/// - **Linux**: `~/.cache/html2pdf/chromium/`
/// - **macOS**: `~/Library/Caches/html2pdf/chromium/`
///
/// Override by setting `CHROMIUM_CACHE_DIR`.
pub fn chromium_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("CHROMIUM_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }

    if is_running_on_lambda() {
        return std::env::temp_dir().join("chromium");
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("html2pdf").join("chromium")
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Launch flags matching the current environment.
///
/// Always includes the headless base set; adds the sandbox-free flags when
/// [`is_running_on_lambda`] is true.
pub fn default_args() -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.iter().map(|s| s.to_string()).collect();
    if is_running_on_lambda() {
        args.extend(LAMBDA_ARGS.iter().map(|s| s.to_string()));
    }
    args
}

/// Ensures a Chromium executable is available and returns its path.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; a successful
/// resolution is memoised for the process lifetime.
pub fn ensure_chromium() -> Result<PathBuf, ChromiumAutoError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve_or_unpack()?;

    // Losing the race is fine; both threads resolved the same file.
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

/// Searches `dir` (up to three levels deep) for a known Chromium executable.
pub fn locate_executable(dir: &Path) -> Option<PathBuf> {
    for name in EXECUTABLE_NAMES {
        if let Some(found) = find_named(dir, name, 3) {
            return Some(found);
        }
    }
    None
}

/// Looks up the first known executable name on the given `PATH` value.
pub fn find_on_path(path_var: &OsString) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::split_paths(path_var).collect();
    for name in EXECUTABLE_NAMES {
        for dir in &dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Unpacks a gzipped tar archive into `dest_dir` and returns the browser
/// executable found inside it.
pub fn unpack_archive(archive_bytes: &[u8], dest_dir: &Path) -> Result<PathBuf, ChromiumAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    std::fs::create_dir_all(dest_dir).map_err(ChromiumAutoError::CacheDir)?;

    let gz = GzDecoder::new(archive_bytes);
    let mut archive = Archive::new(gz);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest_dir)
        .map_err(|e| ChromiumAutoError::Extract(e.to_string()))?;

    let exe = locate_executable(dest_dir).ok_or_else(|| ChromiumAutoError::ExecutableMissing {
        dir: dest_dir.to_path_buf(),
    })?;
    mark_executable(&exe)?;
    Ok(exe)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve_or_unpack() -> Result<PathBuf, ChromiumAutoError> {
    let mut searched = Vec::new();

    // 1. Environment variable override.
    if let Ok(env_path) = std::env::var("CHROMIUM_PATH") {
        let p = PathBuf::from(&env_path);
        if p.is_file() {
            return Ok(p);
        }
        searched.push(format!("CHROMIUM_PATH={env_path}"));
    }

    // 2. Already unpacked by an earlier (cold) start in this sandbox.
    let cache_dir = chromium_cache_dir();
    if let Some(exe) = locate_executable(&cache_dir) {
        return Ok(exe);
    }
    searched.push(cache_dir.display().to_string());

    // 3. Unpack from a local archive or a download.
    if let Ok(archive) = std::env::var("CHROMIUM_ARCHIVE") {
        let path = PathBuf::from(archive);
        if path.is_file() {
            let bytes = std::fs::read(&path).map_err(|source| ChromiumAutoError::ArchiveRead {
                path: path.clone(),
                source,
            })?;
            return unpack_archive(&bytes, &cache_dir);
        }
        searched.push(format!("CHROMIUM_ARCHIVE={}", path.display()));
    }

    if let Ok(url) = std::env::var("CHROMIUM_ARCHIVE_URL") {
        if !url.is_empty() {
            let bytes = download_bytes(&url)?;
            return unpack_archive(&bytes, &cache_dir);
        }
    }

    // 4. System install.
    if let Some(path_var) = std::env::var_os("PATH") {
        if let Some(exe) = find_on_path(&path_var) {
            return Ok(exe);
        }
    }
    searched.push("PATH".to_string());

    Err(ChromiumAutoError::NotFound {
        searched: searched.join(", "),
    })
}

fn find_named(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    if depth == 0 {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_named(&path, name, depth - 1) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), ChromiumAutoError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(ChromiumAutoError::CacheDir)?
        .permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms).map_err(ChromiumAutoError::CacheDir)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), ChromiumAutoError> {
    Ok(())
}

/// Fetches a URL into memory.
fn download_bytes(url: &str) -> Result<Vec<u8>, ChromiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("chromium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ChromiumAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| ChromiumAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(ChromiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .map_err(|e| ChromiumAutoError::Download(format!("Read error: {e}")))?;
    Ok(bytes.to_vec())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
