//! TapeStore - one directory of tapes on disk plus their in-memory copies.

use crate::error::TapeError;
use crate::matching::TapeMatcher;
use crate::options::Options;
use crate::tape::{Request, Tape};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use walkdir::WalkDir;

const TAPE_EXTENSION: &str = "json";

/// Owns the tapes under one base directory.
///
/// Lookups take a read lock on the tape list. Saving and deleting are
/// serialized through `save_lock`, which also guards the counter used for
/// `unnamed-<n>.json` file names.
pub struct TapeStore {
    path: PathBuf,
    options: Arc<Options>,
    /// Tapes in discovery order; `find` returns the first match.
    tapes: RwLock<Vec<Arc<Tape>>>,
    save_lock: Mutex<usize>,
}

impl TapeStore {
    /// Create a store rooted at `path` and load every tape under it.
    pub fn open(path: impl Into<PathBuf>, options: Arc<Options>) -> Result<Self, TapeError> {
        let store = Self {
            path: path.into(),
            options,
            tapes: RwLock::new(Vec::new()),
            save_lock: Mutex::new(0),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (Re)load tapes from disk, replacing the in-memory list.
    ///
    /// The directory is created if missing. A file that cannot be parsed is
    /// logged and skipped; it never aborts the load.
    pub fn load(&self) -> Result<usize, TapeError> {
        fs::create_dir_all(&self.path).map_err(|e| TapeError::io(&self.path, e))?;

        let mut loaded = Vec::new();
        for entry in WalkDir::new(&self.path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("Failed to read tape directory entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            match self.read_tape(entry.path()) {
                Ok(tape) => loaded.push(Arc::new(tape)),
                Err(e) => error!("Skipping tape file {:?}: {}", entry.path(), e),
            }
        }

        let count = loaded.len();
        *self.tapes.write() = loaded;
        info!("Loaded {} tapes from {:?}", count, self.path);
        Ok(count)
    }

    fn read_tape(&self, file: &Path) -> Result<Tape, TapeError> {
        let contents = fs::read_to_string(file).map_err(|e| TapeError::io(file, e))?;
        let tape = Tape::from_json_str(&contents, &self.options)?;
        let relative = file.strip_prefix(&self.path).unwrap_or(file);
        tape.assign_path(relative.to_path_buf());
        tape.mark_loaded();
        Ok(tape)
    }

    /// First tape, in load order, that matches `request`. The tape is marked
    /// as used.
    pub fn find(&self, request: &Request) -> Option<Arc<Tape>> {
        let matcher = TapeMatcher::new(&self.options);
        let tapes = self.tapes.read();
        let found = tapes
            .iter()
            .find(|tape| matcher.matches(tape, request))
            .cloned();
        if let Some(tape) = &found {
            tape.mark_used();
            debug!("Matched tape '{}' for {} {}", tape.name(), request.method(), request.url());
        }
        found
    }

    /// Persist a tape and make it visible to later lookups.
    ///
    /// A tape that already has a storage path is written there; otherwise a
    /// new file name is picked. Returns the path relative to the store.
    pub fn save(&self, tape: Arc<Tape>) -> Result<PathBuf, TapeError> {
        let mut counter = self.save_lock.lock();
        self.write_locked(tape, &mut counter)
    }

    /// Swap `old` for `tape` in one step: the new tape takes over the old
    /// storage path and no other save can claim that path in between.
    ///
    /// If `old` is no longer in the store (another replace got there first)
    /// the new tape is saved under a fresh name instead.
    pub fn replace(&self, old: &Arc<Tape>, tape: Arc<Tape>) -> Result<PathBuf, TapeError> {
        let mut counter = self.save_lock.lock();
        let removed = {
            let mut tapes = self.tapes.write();
            let before = tapes.len();
            tapes.retain(|t| !Arc::ptr_eq(t, old));
            tapes.len() != before
        };
        old.mark_deleted();
        if removed {
            if let Some(path) = old.path() {
                tape.assign_path(path);
            }
            tape.mark_overwritten();
        }
        self.write_locked(tape, &mut counter)
    }

    /// Caller holds `save_lock`.
    fn write_locked(&self, tape: Arc<Tape>, counter: &mut usize) -> Result<PathBuf, TapeError> {
        tape.mark_new();
        tape.mark_used();

        let relative = match tape.path() {
            Some(existing) => existing,
            None => {
                let assigned = self.next_path(&tape, counter);
                tape.assign_path(assigned.clone());
                assigned
            }
        };

        let file = self.path.join(&relative);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| TapeError::io(parent, e))?;
        }
        fs::write(&file, tape.to_json_string()).map_err(|e| TapeError::io(&file, e))?;

        let mut tapes = self.tapes.write();
        if !tapes.iter().any(|t| Arc::ptr_eq(t, &tape)) {
            tapes.push(tape);
        }
        info!("Saved tape to {:?}", file);
        Ok(relative)
    }

    fn next_path(&self, tape: &Tape, counter: &mut usize) -> PathBuf {
        if self.options.hooks.tape_name.is_some() {
            let base = with_extension(PathBuf::from(tape.name()));
            if !self.is_taken(&base) {
                return base;
            }
            let stem = base.with_extension("");
            let mut n = 1;
            loop {
                let candidate = with_extension(PathBuf::from(format!("{}-{n}", stem.display())));
                if !self.is_taken(&candidate) {
                    return candidate;
                }
                n += 1;
            }
        }

        loop {
            *counter += 1;
            let candidate = PathBuf::from(format!("unnamed-{}.{TAPE_EXTENSION}", *counter));
            if !self.is_taken(&candidate) {
                return candidate;
            }
        }
    }

    fn is_taken(&self, relative: &Path) -> bool {
        self.path.join(relative).exists()
            || self
                .tapes
                .read()
                .iter()
                .any(|t| t.path().as_deref() == Some(relative))
    }

    /// Remove a tape from memory and delete its file.
    ///
    /// Returns whether the tape was present. A file that is already gone is
    /// not an error.
    pub fn delete(&self, tape: &Arc<Tape>) -> Result<bool, TapeError> {
        let _guard = self.save_lock.lock();
        let removed = {
            let mut tapes = self.tapes.write();
            let before = tapes.len();
            tapes.retain(|t| !Arc::ptr_eq(t, tape));
            tapes.len() != before
        };
        tape.mark_deleted();

        if let Some(relative) = tape.path() {
            let file = self.path.join(relative);
            match fs::remove_file(&file) {
                Ok(()) => debug!("Deleted tape file {:?}", file),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(TapeError::io(&file, e)),
            }
        }
        Ok(removed)
    }

    /// Whether a tape whose storage path or name equals `name` has been used.
    pub fn has_tape_been_used(&self, name: &str) -> bool {
        self.tapes.read().iter().any(|tape| {
            tape.is_used()
                && (tape.name() == name
                    || tape
                        .path()
                        .is_some_and(|p| p == Path::new(name)))
        })
    }

    pub fn reset_tape_usage(&self) {
        for tape in self.tapes.read().iter() {
            tape.reset_usage();
        }
    }

    /// Snapshot of the tapes in lookup order.
    pub fn tapes(&self) -> Vec<Arc<Tape>> {
        self.tapes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.tapes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tapes.read().is_empty()
    }
}

fn with_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == TAPE_EXTENSION) {
        path
    } else {
        let mut raw = path.into_os_string();
        raw.push(".");
        raw.push(TAPE_EXTENSION);
        PathBuf::from(raw)
    }
}
