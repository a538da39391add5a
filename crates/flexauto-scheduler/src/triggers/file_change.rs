//! Filesystem change trigger.
//!
//! Parameters: `Path` (file or directory), `Event` (`All`, `Created`,
//! `Changed`, `Deleted`, `Renamed`) and `Recursive` (directories only).
//!
//! Two OS watchers feed one channel: the target watcher reports changes at
//! the watched location, the parent watcher reports renames and deletion of
//! the watched directory (the directory holding the file, for a file target).
//! Events are drained while the trigger is evaluated. A rename of that
//! directory re-roots both watchers at the new location; deletion stops them.
//!
//! Watchers live in a [`WatchHandle`] shared with the scheduler so they can
//! be stopped synchronously at reload. Re-rooting happens under the same
//! lock and never starts new watchers after a stop.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use flexauto_core::error::{FlexError, Result};

use crate::block::BlockHeader;

/// Same-path events closer than this collapse into one.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Change category reported by the watchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

/// Which side of a rename a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameStep {
    From,
    To,
    Both,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchSource {
    Target,
    Parent,
}

/// One OS notification, timestamped when it was received.
#[derive(Debug, Clone)]
pub(crate) struct WatchEvent {
    source: WatchSource,
    kind: FileEventKind,
    rename: Option<RenameStep>,
    paths: Vec<PathBuf>,
    at: Instant,
}

impl WatchEvent {
    fn from_notify(source: WatchSource, event: notify::Event) -> Option<Self> {
        let (kind, rename) = match event.kind {
            EventKind::Create(_) => (FileEventKind::Created, None),
            EventKind::Remove(_) => (FileEventKind::Deleted, None),
            EventKind::Modify(ModifyKind::Name(mode)) => {
                let step = match mode {
                    RenameMode::From => RenameStep::From,
                    RenameMode::To => RenameStep::To,
                    RenameMode::Both => RenameStep::Both,
                    _ => RenameStep::Other,
                };
                (FileEventKind::Renamed, Some(step))
            }
            EventKind::Modify(_) => (FileEventKind::Changed, None),
            _ => return None,
        };
        Some(Self {
            source,
            kind,
            rename,
            paths: event.paths,
            at: Instant::now(),
        })
    }
}

#[derive(Default)]
struct WatchSlot {
    target: Option<RecommendedWatcher>,
    parent: Option<RecommendedWatcher>,
    stopped: bool,
}

/// Shared ownership of a trigger's OS watchers.
#[derive(Clone, Default)]
pub struct WatchHandle {
    slot: Arc<Mutex<WatchSlot>>,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

impl WatchHandle {
    fn lock(&self) -> MutexGuard<'_, WatchSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop both watchers and refuse any later re-root.
    pub fn stop(&self) {
        let mut slot = self.lock();
        slot.stopped = true;
        slot.target = None;
        slot.parent = None;
    }

    pub fn is_active(&self) -> bool {
        let slot = self.lock();
        !slot.stopped && slot.target.is_some()
    }
}

/// Which events the trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Only(FileEventKind),
}

impl EventFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("created") => EventFilter::Only(FileEventKind::Created),
            Some("changed") => EventFilter::Only(FileEventKind::Changed),
            Some("deleted") => EventFilter::Only(FileEventKind::Deleted),
            Some("renamed") => EventFilter::Only(FileEventKind::Renamed),
            _ => EventFilter::All,
        }
    }

    fn accepts(self, kind: FileEventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(k) => k == kind,
        }
    }
}

pub struct FileChangeTrigger {
    pub header: BlockHeader,
    handle: WatchHandle,
    tx: mpsc::Sender<WatchEvent>,
    rx: Mutex<mpsc::Receiver<WatchEvent>>,
    /// Directory the target watcher observes.
    watch_dir: PathBuf,
    /// File name filter when the configured path is a file.
    file_name: Option<std::ffi::OsString>,
    filter: EventFilter,
    recursive: bool,
    last_event: Option<(Instant, PathBuf)>,
    detected: Option<PathBuf>,
    pending: bool,
    rename_pending: bool,
}

impl std::fmt::Debug for FileChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChangeTrigger")
            .field("header", &self.header)
            .field("watch_dir", &self.watch_dir)
            .field("filter", &self.filter)
            .field("pending", &self.pending)
            .finish()
    }
}

impl FileChangeTrigger {
    pub fn new(header: BlockHeader) -> Self {
        let (tx, rx) = mpsc::channel();
        let filter = EventFilter::parse(header.param("Event"));
        Self {
            header,
            handle: WatchHandle::default(),
            tx,
            rx: Mutex::new(rx),
            watch_dir: PathBuf::new(),
            file_name: None,
            filter,
            recursive: false,
            last_event: None,
            detected: None,
            pending: false,
            rename_pending: false,
        }
    }

    pub fn handle(&self) -> WatchHandle {
        self.handle.clone()
    }

    /// Location the trigger currently watches.
    pub fn watched_path(&self) -> PathBuf {
        match &self.file_name {
            Some(name) => self.watch_dir.join(name),
            None => self.watch_dir.clone(),
        }
    }

    /// Resolve the `Path` parameter and start both watchers.
    pub fn start_watching(&mut self) -> Result<()> {
        let raw = self.header.require("Path")?.trim();
        let path = PathBuf::from(shellexpand::tilde(raw).into_owned());
        if path.is_dir() {
            self.watch_dir = path;
            self.file_name = None;
            self.recursive = self.header.flag("Recursive");
        } else if path.is_file() {
            let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
                return Err(FlexError::Watch(format!("cannot watch '{}'", path.display())));
            };
            self.watch_dir = dir.to_path_buf();
            self.file_name = Some(name.to_os_string());
            self.recursive = false;
        } else {
            return Err(FlexError::Watch(format!("path not found: {}", path.display())));
        }

        let handle = self.handle.clone();
        let mut slot = handle.lock();
        slot.stopped = false;
        self.arm(&mut slot)?;
        tracing::info!("👀 Watching {}", self.watched_path().display());
        Ok(())
    }

    /// Replace both watchers with fresh ones rooted at `watch_dir`.
    fn arm(&self, slot: &mut WatchSlot) -> Result<()> {
        slot.target = None;
        slot.parent = None;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        let mut target = make_watcher(self.tx.clone(), WatchSource::Target)?;
        target
            .watch(&self.watch_dir, mode)
            .map_err(|e| FlexError::Watch(format!("{}: {e}", self.watch_dir.display())))?;
        slot.target = Some(target);

        if let Some(parent) = self.watch_dir.parent().filter(|p| p.is_dir()) {
            let mut watcher = make_watcher(self.tx.clone(), WatchSource::Parent)?;
            match watcher.watch(parent, RecursiveMode::NonRecursive) {
                Ok(()) => slot.parent = Some(watcher),
                Err(e) => tracing::warn!("⚠️ Parent watch on {} failed: {e}", parent.display()),
            }
        }
        Ok(())
    }

    pub(crate) fn should_fire(&mut self) -> bool {
        let drained: Vec<WatchEvent> = {
            let rx = self.rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rx.try_iter().collect()
        };
        for event in drained {
            self.handle_event(event);
        }
        std::mem::take(&mut self.pending)
    }

    pub fn take_detected_path(&mut self) -> Option<PathBuf> {
        self.detected.take()
    }

    pub(crate) fn handle_event(&mut self, event: WatchEvent) {
        match event.source {
            WatchSource::Target => self.handle_target_event(event),
            WatchSource::Parent => self.handle_parent_event(event),
        }
    }

    fn handle_target_event(&mut self, event: WatchEvent) {
        if event.rename == Some(RenameStep::From) || !self.filter.accepts(event.kind) {
            return;
        }
        let Some(path) = event.paths.last().cloned() else {
            return;
        };
        if let Some(name) = &self.file_name {
            let target = self.watch_dir.join(name);
            if !event.paths.iter().any(|p| *p == target) {
                return;
            }
        }
        self.record(path, event.at);
    }

    fn handle_parent_event(&mut self, event: WatchEvent) {
        let concerns_root = event.paths.iter().any(|p| *p == self.watch_dir);
        match (event.kind, event.rename) {
            (FileEventKind::Renamed, Some(RenameStep::Both)) if event.paths.len() == 2 => {
                if event.paths[0] == self.watch_dir {
                    self.reroot(event.paths[1].clone(), event.at);
                }
            }
            (FileEventKind::Renamed, Some(RenameStep::From)) if concerns_root => {
                self.rename_pending = true;
            }
            (FileEventKind::Renamed, Some(RenameStep::To)) if self.rename_pending => {
                self.rename_pending = false;
                if let Some(new_root) = event.paths.first().cloned() {
                    self.reroot(new_root, event.at);
                }
            }
            (FileEventKind::Deleted, _) if concerns_root => {
                tracing::warn!("🗑️ Watched directory {} was deleted", self.watch_dir.display());
                let handle = self.handle.clone();
                let mut slot = handle.lock();
                slot.target = None;
                slot.parent = None;
                drop(slot);
                if self.filter.accepts(FileEventKind::Deleted) {
                    self.record(self.watched_path(), event.at);
                }
            }
            _ => {}
        }
    }

    /// Move both watchers to `new_root` unless the handle was stopped.
    fn reroot(&mut self, new_root: PathBuf, at: Instant) {
        tracing::info!(
            "📁 Watched directory renamed: {} → {}",
            self.watch_dir.display(),
            new_root.display()
        );
        self.watch_dir = new_root;

        let handle = self.handle.clone();
        let mut slot = handle.lock();
        if slot.stopped {
            return;
        }
        if let Err(e) = self.arm(&mut slot) {
            tracing::error!("❌ Re-rooting watcher failed: {e}");
            slot.target = None;
            slot.parent = None;
        }
        drop(slot);

        if self.filter.accepts(FileEventKind::Renamed) {
            self.record(self.watched_path(), at);
        }
    }

    /// Record a detected path. Returns false when debounced.
    pub(crate) fn record(&mut self, path: PathBuf, at: Instant) -> bool {
        if let Some((last_at, last_path)) = &self.last_event {
            if *last_path == path && at.saturating_duration_since(*last_at) < DEBOUNCE {
                return false;
            }
        }
        tracing::debug!("File event at {}", path.display());
        self.last_event = Some((at, path.clone()));
        self.detected = Some(path);
        self.pending = true;
        true
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, source: WatchSource, kind: FileEventKind, paths: Vec<PathBuf>) {
        let rename = (kind == FileEventKind::Renamed).then_some(RenameStep::Both);
        self.send_test_event(source, kind, rename, paths);
    }

    #[cfg(test)]
    fn inject_rename(&self, step: RenameStep, path: PathBuf) {
        self.send_test_event(WatchSource::Parent, FileEventKind::Renamed, Some(step), vec![path]);
    }

    #[cfg(test)]
    fn send_test_event(
        &self,
        source: WatchSource,
        kind: FileEventKind,
        rename: Option<RenameStep>,
        paths: Vec<PathBuf>,
    ) {
        let _ = self.tx.send(WatchEvent {
            source,
            kind,
            rename,
            paths,
            at: Instant::now(),
        });
    }
}

fn make_watcher(tx: mpsc::Sender<WatchEvent>, source: WatchSource) -> Result<RecommendedWatcher> {
    notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(event) => {
            if let Some(event) = WatchEvent::from_notify(source, event) {
                let _ = tx.send(event);
            }
        }
        Err(e) => tracing::warn!("⚠️ Watcher error: {e}"),
    })
    .map_err(|e| FlexError::Watch(e.to_string()))
}
