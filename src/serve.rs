//! The watch command: rebuilds the site on file-system change notifications
//! and serves the output directory over plain HTTP on a fixed local port.
//! Rebuilds are serialized behind a debounce delay, so a burst of change
//! notifications (editors commonly write a file several times per save)
//! collapses into a single rebuild after a quiet period. There is no
//! cancellation beyond process termination.

use std::fmt;
use std::fs::File;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use spdlog::{error, info};
use tiny_http::{Header, Request, Response, Server, StatusCode};

use crate::build::{self, build_site};
use crate::config::Config;

/// Quiet period after the last change notification before a rebuild runs.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Runs an initial build, then watches the posts source directory and
/// rebuilds on change while serving the output directory over HTTP. The
/// initial build must succeed; later rebuild failures are logged and the
/// watcher keeps running (a half-saved post must not kill the dev server).
pub fn watch_and_serve(config: Config) -> Result<()> {
    build_site(&config)?;

    let output_directory = config.output_directory.clone();
    let port = config.serve_port;
    thread::spawn(move || {
        if let Err(e) = serve(&output_directory, port) {
            error!("HTTP server failed: {}", e);
        }
    });

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |result| {
        let _ = tx.send(result);
    })?;
    watcher.watch(&config.posts_source_directory, RecursiveMode::Recursive)?;
    info!(
        "Watching {} for changes",
        config.posts_source_directory.display()
    );

    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                if !is_post_change(&event) {
                    continue;
                }
                drain_until_quiet(&rx, DEBOUNCE)?;
                info!("Change detected; rebuilding");
                if let Err(e) = build_site(&config) {
                    error!("Rebuild failed: {}", e);
                }
            }
            Ok(Err(e)) => error!("Watch error: {}", e),
            Err(mpsc::RecvError) => return Err(Error::WatcherStopped),
        }
    }
}

/// Absorbs further notifications until `quiet` elapses without one. Each
/// event restarts the timer, so the rebuild runs once per editing burst.
fn drain_until_quiet<T>(rx: &mpsc::Receiver<T>, quiet: Duration) -> Result<()> {
    loop {
        match rx.recv_timeout(quiet) {
            Ok(_) => continue,
            Err(mpsc::RecvTimeoutError::Timeout) => return Ok(()),
            Err(mpsc::RecvTimeoutError::Disconnected) => return Err(Error::WatcherStopped),
        }
    }
}

/// Only Markdown files trigger rebuilds; editor swap files and dotfiles in
/// the posts directory are noise.
fn is_post_change(event: &notify::Event) -> bool {
    event.paths.iter().any(|path| {
        path.extension().map_or(false, |ext| ext == "md")
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| !name.starts_with('.'))
    })
}

/// Serves `root` over HTTP, one request at a time.
fn serve(root: &Path, port: u16) -> Result<()> {
    let server =
        Server::http(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).map_err(Error::Bind)?;
    info!("Serving {} at http://127.0.0.1:{}", root.display(), port);

    for request in server.incoming_requests() {
        if let Err(e) = respond(request, root) {
            error!("Request failed: {}", e);
        }
    }
    Ok(())
}

fn respond(request: Request, root: &Path) -> std::io::Result<()> {
    match resolve_path(request.url(), root) {
        Some(path) => {
            let content_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            let mut response = Response::from_file(File::open(&path)?);
            if let Ok(header) = Header::from_bytes("Content-Type", content_type) {
                response.add_header(header);
            }
            request.respond(response)
        }
        None => request.respond(Response::empty(StatusCode(404))),
    }
}

/// Maps a request URL onto a file below `root`. Directory URLs resolve to
/// their `index.html`; anything trying to climb out of `root` resolves to
/// nothing.
fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let path = url.split_once('?').map_or(url, |(p, _)| p);
    let path = path.split_once('#').map_or(path, |(p, _)| p);
    let relative = Path::new(path.trim_start_matches('/'));

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let mut full = root.join(relative);
    if full.is_dir() {
        full.push("index.html");
    }
    full.is_file().then_some(full)
}

/// The result of a fallible watch/serve operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error running the watch command.
#[derive(Debug)]
pub enum Error {
    /// Returned when the initial build fails.
    Build(build::Error),

    /// Returned when the file watcher can't be created or attached.
    Notify(notify::Error),

    /// Returned when the HTTP server can't bind its port.
    Bind(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Returned when the watcher channel disconnects unexpectedly.
    WatcherStopped,
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Build(err) => err.fmt(f),
            Error::Notify(err) => err.fmt(f),
            Error::Bind(err) => write!(f, "Binding HTTP server: {}", err),
            Error::WatcherStopped => write!(f, "File watcher stopped unexpectedly"),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Build(err) => Some(err),
            Error::Notify(err) => Some(err),
            Error::Bind(err) => Some(err.as_ref()),
            Error::WatcherStopped => None,
        }
    }
}

impl From<build::Error> for Error {
    /// Converts [`build::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: build::Error) -> Error {
        Error::Build(err)
    }
}

impl From<notify::Error> for Error {
    /// Converts [`notify::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: notify::Error) -> Error {
        Error::Notify(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use notify::event::{CreateKind, EventKind};

    #[test]
    fn test_debounce_coalesces_burst() -> Result<()> {
        let (tx, rx) = mpsc::channel();
        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        drain_until_quiet(&rx, Duration::from_millis(1))?;
        // the whole burst was absorbed by a single quiet-period wait
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(1)),
            Err(mpsc::RecvTimeoutError::Timeout),
        ));
        Ok(())
    }

    #[test]
    fn test_debounce_disconnect_is_an_error() {
        let (tx, rx) = mpsc::channel::<()>();
        drop(tx);
        assert!(matches!(
            drain_until_quiet(&rx, Duration::from_millis(1)),
            Err(Error::WatcherStopped),
        ));
    }

    #[test]
    fn test_markdown_changes_are_relevant() {
        let event = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/posts/2024-01-01-a.md"));
        assert!(is_post_change(&event));
    }

    #[test]
    fn test_non_markdown_and_dotfiles_are_noise() {
        let swap = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/posts/.a.md.swp"));
        assert!(!is_post_change(&swap));

        let hidden = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/posts/.draft.md"));
        assert!(!is_post_change(&hidden));

        let text = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/posts/notes.txt"));
        assert!(!is_post_change(&text));
    }

    #[test]
    fn test_resolve_path_serves_files_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("posts.html"), "listing").unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();

        assert_eq!(
            resolve_path("/posts.html", dir.path()),
            Some(dir.path().join("posts.html")),
        );
        assert_eq!(
            resolve_path("/", dir.path()),
            Some(dir.path().join("index.html")),
        );
        assert_eq!(
            resolve_path("/posts.html?cache=1", dir.path()),
            Some(dir.path().join("posts.html")),
        );
        assert_eq!(resolve_path("/missing.html", dir.path()), None);
    }

    #[test]
    fn test_resolve_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_path("/../etc/passwd", dir.path()), None);
        assert_eq!(resolve_path("/posts/../../etc/passwd", dir.path()), None);
    }
}
