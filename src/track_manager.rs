use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use crate::error::TrackError;
use crate::gpx;
use crate::track::Track;

/// Reads one track file. Implementations are shared across worker threads.
pub trait TrackLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Track, TrackError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GpxLoader;

impl TrackLoader for GpxLoader {
    fn load(&self, path: &Path) -> Result<Track, TrackError> {
        gpx::load_gpx_file(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackManagerEvent {
    AllTrackFilesReady { loaded: usize, failed: usize },
}

type LoadResults = Vec<(PathBuf, Result<Track, TrackError>)>;

struct PendingLoad {
    paths: Vec<PathBuf>,
    rx: Receiver<LoadResults>,
}

/// Owns every loaded track. Loading runs in the background; results are
/// merged on the thread calling `poll` or `wait_all_ready`.
pub struct TrackManager {
    loader: Arc<dyn TrackLoader>,
    tracks: Arc<Vec<Track>>,
    load_errors: Vec<(PathBuf, String)>,
    pending: Option<PendingLoad>,
}

impl Default for TrackManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackManager {
    pub fn new() -> Self {
        Self::with_loader(Arc::new(GpxLoader))
    }

    pub fn with_loader(loader: Arc<dyn TrackLoader>) -> Self {
        Self {
            loader,
            tracks: Arc::new(Vec::new()),
            load_errors: Vec::new(),
            pending: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts loading `paths`. Returns false if a previous load is still running.
    pub fn load_track_files(&mut self, paths: Vec<PathBuf>) -> bool {
        if self.pending.is_some() {
            warn!("Track loading already in progress, ignoring {} files", paths.len());
            return false;
        }

        let (tx, rx) = unbounded();
        let loader = self.loader.clone();
        let worker_paths = paths.clone();

        thread::spawn(move || {
            let results: LoadResults = worker_paths
                .par_iter()
                .map(|path| (path.clone(), loader.load(path)))
                .collect();
            let _ = tx.send(results);
        });

        debug!("Loading {} track files", paths.len());
        self.pending = Some(PendingLoad { paths, rx });
        true
    }

    /// Non-blocking. Returns the ready event once the running load has finished.
    pub fn poll(&mut self) -> Option<TrackManagerEvent> {
        let pending = self.pending.as_ref()?;
        match pending.rx.try_recv() {
            Ok(results) => Some(self.finish_load(results)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.abandon_load()),
        }
    }

    /// Blocks until the running load has finished.
    pub fn wait_all_ready(&mut self) -> Option<TrackManagerEvent> {
        let pending = self.pending.as_ref()?;
        match pending.rx.recv() {
            Ok(results) => Some(self.finish_load(results)),
            Err(_) => Some(self.abandon_load()),
        }
    }

    fn finish_load(&mut self, results: LoadResults) -> TrackManagerEvent {
        self.pending = None;

        let mut loaded = 0;
        let mut failed = 0;
        let tracks = Arc::make_mut(&mut self.tracks);
        for (path, result) in results {
            match result {
                Ok(track) => {
                    debug!("{}: {} points", path.display(), track.len());
                    tracks.push(track);
                    loaded += 1;
                }
                Err(e) => {
                    warn!("Could not load {}: {}", path.display(), e);
                    self.load_errors.push((path, e.to_string()));
                    failed += 1;
                }
            }
        }

        info!("Track files ready: {} loaded, {} failed", loaded, failed);
        TrackManagerEvent::AllTrackFilesReady { loaded, failed }
    }

    // Worker died without reporting.
    fn abandon_load(&mut self) -> TrackManagerEvent {
        let paths = self.pending.take().map(|p| p.paths).unwrap_or_default();
        warn!("Track loader exited without results for {} files", paths.len());
        let failed = paths.len();
        for path in paths {
            self.load_errors.push((path, "loader terminated".to_string()));
        }
        TrackManagerEvent::AllTrackFilesReady { loaded: 0, failed }
    }

    /// Drains the errors collected since the last call.
    pub fn read_load_errors(&mut self) -> Vec<(PathBuf, String)> {
        std::mem::take(&mut self.load_errors)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Shared snapshot for correlation workers.
    pub fn tracks(&self) -> Arc<Vec<Track>> {
        self.tracks.clone()
    }

    pub fn clear(&mut self) {
        self.tracks = Arc::new(Vec::new());
        self.load_errors.clear();
    }
}
