use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use crate::error::SourceError;

/// Events delivered by the background loader and the file watcher
#[derive(Debug)]
pub enum SourceEvent {
    Loaded {
        path: PathBuf,
        rows: Result<Vec<String>, SourceError>,
    },
    Changed(PathBuf),
}

/// Read `path` and split it into rows, one per line.
pub fn load_rows(path: &Path) -> Result<Vec<String>, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let text = String::from_utf8(bytes).map_err(|err| SourceError::Encoding {
        path: path.to_path_buf(),
        offset: err.utf8_error().valid_up_to(),
    })?;

    Ok(rows_from_text(&text))
}

/// Split CSV/plain text into rows. Quoted fields are unquoted and multi-column
/// rows are re-joined with `,`.
pub fn rows_from_text(text: &str) -> Vec<String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines().map(unquote_row).collect()
}

fn unquote_row(line: &str) -> String {
    let line = line.trim_end_matches('\r');
    if !line.contains('"') {
        return line.to_string();
    }

    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields.join(",")
}

/// Load `path` on a worker thread; the result arrives as a single `Loaded` event.
pub fn spawn_load(path: PathBuf, tx: Sender<SourceEvent>) {
    thread::spawn(move || {
        let rows = load_rows(&path);
        if let Ok(rows) = &rows {
            log::debug!("Read {} rows from {}", rows.len(), path.display());
        }
        let _ = tx.send(SourceEvent::Loaded { path, rows });
    });
}

/// Convenience wrapper returning a fresh channel for a one-off load
pub fn load_in_background(path: PathBuf) -> Receiver<SourceEvent> {
    let (tx, rx) = mpsc::channel();
    spawn_load(path, tx);
    rx
}

/// Watch `path` and post `Changed` whenever it is written or recreated.
/// The parent directory is watched so that editors replacing the file by
/// rename keep notifying. The returned watcher must be kept alive for events
/// to flow.
pub fn watch(path: &Path, tx: Sender<SourceEvent>) -> Result<RecommendedWatcher, SourceError> {
    let watch_err = |source| SourceError::Watch {
        path: path.to_path_buf(),
        source,
    };

    let target = path
        .file_name()
        .map(|name| name.to_os_string())
        .ok_or_else(|| watch_err(notify::Error::generic("path has no file name")))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let watched = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let touches_target = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(target.as_os_str()));
                if !touches_target {
                    return;
                }
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => {
                        let _ = tx.send(SourceEvent::Changed(watched.clone()));
                    }
                    EventKind::Remove(_) => {
                        log::debug!("{} removed, waiting for it to reappear", watched.display());
                    }
                    _ => {}
                }
            }
            Err(err) => log::warn!("File watcher error: {}", err),
        }
    })
    .map_err(watch_err)?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(watch_err)?;
    log::info!("Watching {} for changes", path.display());

    Ok(watcher)
}

/// Background load plus optional file watching, polled from a front end's
/// event loop. A change notification restarts the load.
#[derive(Default)]
pub struct RowLoader {
    pending: Option<(PathBuf, Receiver<SourceEvent>)>,
    changes: Option<Receiver<SourceEvent>>,
    watcher: Option<RecommendedWatcher>,
}

impl RowLoader {
    /// Start reading `path`, superseding any load still in flight
    pub fn load(&mut self, path: PathBuf) {
        log::info!("Loading {}", path.display());
        let rx = load_in_background(path.clone());
        self.pending = Some((path, rx));
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Reload whenever `path` changes on disk. Replaces any earlier watch.
    pub fn watch(&mut self, path: &Path) -> Result<(), SourceError> {
        let (tx, rx) = mpsc::channel();
        self.watcher = Some(watch(path, tx)?);
        self.changes = Some(rx);
        Ok(())
    }

    /// Take the finished load, if there is one
    pub fn poll(&mut self) -> Option<(PathBuf, Result<Vec<String>, SourceError>)> {
        let mut changed = None;
        if let Some(rx) = &self.changes {
            while let Ok(event) = rx.try_recv() {
                if let SourceEvent::Changed(path) = event {
                    changed = Some(path);
                }
            }
        }
        if let Some(path) = changed {
            log::debug!("{} changed on disk", path.display());
            self.load(path);
        }

        let (path, rx) = self.pending.as_ref()?;
        let finished = match rx.try_recv() {
            Ok(SourceEvent::Loaded { path, rows }) => (path, rows),
            Ok(SourceEvent::Changed(_)) | Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => (path.clone(), Err(SourceError::Disconnected)),
        };
        self.pending = None;
        Some(finished)
    }
}
