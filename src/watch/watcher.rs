// src/watch/watcher.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::RecipeQueue;
use crate::recipe::load_file;
use crate::watch::patterns::RecipePatterns;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `dir` (non-recursively) for newly created recipe files and append
/// the schedule ones to `queue`.
///
/// Errors creating the watcher or registering the directory are returned;
/// everything that goes wrong afterwards is logged and the loop keeps going
/// until `cancel` fires.
pub fn spawn_watcher(
    dir: impl Into<PathBuf>,
    patterns: RecipePatterns,
    queue: Arc<RecipeQueue>,
    cancel: CancellationToken,
) -> notify::Result<WatcherHandle> {
    let dir = dir.into();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if event_tx.send(res).is_err() {
                debug!("watch loop gone; dropping notify event");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    info!(dir = ?dir, patterns = ?patterns.patterns(), "recipe watcher started");

    tokio::spawn(run_intake(event_rx, patterns, queue, cancel));

    Ok(WatcherHandle { _inner: watcher })
}

/// Consume watcher results until `cancel` fires or the sender is gone.
///
/// A watcher error is logged and does not end the loop.
pub async fn run_intake(
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    patterns: RecipePatterns,
    queue: Arc<RecipeQueue>,
    cancel: CancellationToken,
) {
    let mut intake = RecipeIntake::new(patterns, queue);

    loop {
        let res = tokio::select! {
            _ = cancel.cancelled() => break,
            res = events.recv() => res,
        };

        match res {
            Some(Ok(event)) => intake.handle(&event),
            Some(Err(err)) => error!(error = %err, "recipe watcher error"),
            None => break,
        }
    }

    debug!("recipe watch loop ended");
}

/// Turns notify events into queue appends.
///
/// Only files that appear while watching are considered: created, or moved
/// in from elsewhere. A creation is often reported before the writer has put
/// any bytes in the file; such empty files are parked and parsed on their
/// first write instead.
struct RecipeIntake {
    patterns: RecipePatterns,
    queue: Arc<RecipeQueue>,
    pending: HashSet<PathBuf>,
}

impl RecipeIntake {
    fn new(patterns: RecipePatterns, queue: Arc<RecipeQueue>) -> Self {
        Self {
            patterns,
            queue,
            pending: HashSet::new(),
        }
    }

    fn handle(&mut self, event: &Event) {
        debug!(?event, "received notify event");

        match event.kind {
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in &event.paths {
                    self.arrived(path);
                }
            }
            // inotify reports the destination as `To` right before this
            // pair, so only the source side is handled here.
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let Some(from) = event.paths.first() {
                    self.pending.remove(from);
                }
            }
            // Backends that cannot tell the two sides apart.
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
                for path in &event.paths {
                    if path.is_file() {
                        self.arrived(path);
                    } else {
                        self.pending.remove(path);
                    }
                }
            }
            EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                for path in &event.paths {
                    if self.pending.contains(path) && !is_empty_file(path) {
                        self.pending.remove(path);
                        self.enqueue(path);
                    }
                }
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &event.paths {
                    self.pending.remove(path);
                }
            }
            _ => {}
        }
    }

    /// A recipe file showed up in the directory.
    fn arrived(&mut self, path: &Path) {
        if !self.patterns.matches(path) {
            return;
        }
        if is_empty_file(path) {
            debug!(path = ?path, "new recipe is still empty; waiting for content");
            self.pending.insert(path.to_path_buf());
        } else {
            self.enqueue(path);
        }
    }

    fn enqueue(&self, path: &Path) {
        match load_file(path, Utc::now()) {
            Ok(recipe) => {
                let name = recipe.name.clone();
                let kind = recipe.definition;
                match self.queue.push(recipe) {
                    Some(id) => info!(recipe = %name, id = id.index(), "new recipe queued"),
                    None => debug!(recipe = %name, %kind, "new recipe is not scheduled; ignored"),
                }
            }
            Err(err) => error!(error = %err, "failed to load new recipe"),
        }
    }
}

fn is_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false)
}
