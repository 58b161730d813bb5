//! Application state

use crate::api::{NewNote, Note};
use crate::config::ServerConfig;
use srf_core::{Dispatcher, WorkerPool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// In-memory note storage backing the demo endpoints
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: RwLock<Vec<Note>>,
    next_id: AtomicU64,
}

impl NoteStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a note and return it with its identifier
    pub async fn insert(&self, new: NewNote) -> Note {
        let note = Note {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            title: new.title,
            body: new.body,
            tags: new.tags,
        };
        self.notes.write().await.push(note.clone());
        note
    }

    /// One page of notes, optionally filtered by tag, plus the match count
    pub async fn page(&self, page: usize, per_page: usize, tag: Option<&str>) -> (Vec<Note>, usize) {
        let notes = self.notes.read().await;
        let matching: Vec<&Note> = notes
            .iter()
            .filter(|n| tag.map_or(true, |t| n.tags.iter().any(|nt| nt == t)))
            .collect();

        // a page past the end of the address space is simply empty
        let items = match page.saturating_sub(1).checked_mul(per_page) {
            Some(offset) => matching
                .iter()
                .skip(offset)
                .take(per_page)
                .map(|n| (*n).clone())
                .collect(),
            None => Vec::new(),
        };
        (items, matching.len())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline driver shared by every endpoint
    pub dispatcher: Dispatcher,

    /// Notes backing the demo endpoints
    pub notes: Arc<NoteStore>,

    /// Active configuration
    pub config: Arc<ServerConfig>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(WorkerPool::new(config.worker_pool.clone())),
            notes: Arc::new(NoteStore::new()),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Debug mode flag
    pub fn debug(&self) -> bool {
        self.config.debug
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
