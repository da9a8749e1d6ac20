use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::correlator::{Correlation, CorrelationOptions, CorrelationRun, CorrelatorEvent, TrackCorrelator};
use crate::error::SessionError;
use crate::gps_data::GpsData;
use crate::track_manager::{TrackLoader, TrackManager, TrackManagerEvent};
use crate::undo::{GpsItemStore, GpsUndoCommand, UndoInfo, UndoSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No tracks loaded.
    Idle,
    LoadingTracks,
    TracksReady,
    Correlating,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackLoadReport {
    pub loaded: usize,
    pub failed: usize,
    /// One `"path: message"` line per failed file.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    NoneCorrelated,
    AllCorrelated { count: usize },
    PartiallyCorrelated { correlated: usize, total: usize },
    Canceled,
}

impl fmt::Display for CorrelationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoneCorrelated => write!(
                f,
                "Could not correlate any image - please make sure the offset and gap settings are correct."
            ),
            Self::AllCorrelated { .. } => write!(
                f,
                "All images have been correlated. You can now check their position on the map."
            ),
            Self::PartiallyCorrelated { correlated: 1, total } => write!(
                f,
                "One image out of {} images have been correlated. Please check the offset and gap settings \
                 if you think that more images should have been correlated.",
                total
            ),
            Self::PartiallyCorrelated { correlated, total } => write!(
                f,
                "{} out of {} images have been correlated. Please check the offset and gap settings \
                 if you think that more images should have been correlated.",
                correlated, total
            ),
            Self::Canceled => write!(f, "Correlation canceled, all changes have been reverted."),
        }
    }
}

fn undo_text(count: usize) -> String {
    if count == 1 {
        "1 image correlated".to_string()
    } else {
        format!("{} images correlated", count)
    }
}

/// Progress hooks for a correlation run. Both default to doing nothing.
pub trait CorrelationObserver {
    fn progress(&mut self, _done: usize, _total: usize) {}
    fn finished(&mut self, _outcome: &CorrelationOutcome) {}
}

impl CorrelationObserver for () {}

struct ActiveRun<K> {
    run: CorrelationRun<K>,
    undo: GpsUndoCommand<K>,
    total: usize,
    tried: usize,
    correlated: usize,
}

/// Drives track loading and correlation for one set of photos. Keys identify
/// photos in the caller's `GpsItemStore`.
pub struct CorrelationSession<K> {
    tracks: TrackManager,
    state: SessionState,
    active: Option<ActiveRun<K>>,
}

impl<K> Default for CorrelationSession<K>
where
    K: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> CorrelationSession<K>
where
    K: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_track_manager(TrackManager::new())
    }

    pub fn with_loader(loader: Arc<dyn TrackLoader>) -> Self {
        Self::with_track_manager(TrackManager::with_loader(loader))
    }

    fn with_track_manager(tracks: TrackManager) -> Self {
        Self { tracks, state: SessionState::Idle, active: None }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn track_manager(&self) -> &TrackManager {
        &self.tracks
    }

    pub fn load_track_files(&mut self, paths: Vec<PathBuf>) -> Result<(), SessionError> {
        match self.state {
            SessionState::LoadingTracks => return Err(SessionError::Busy("loading tracks")),
            SessionState::Correlating => return Err(SessionError::Busy("correlating")),
            SessionState::Idle | SessionState::TracksReady => {}
        }
        if !self.tracks.load_track_files(paths) {
            return Err(SessionError::Busy("loading tracks"));
        }
        self.state = SessionState::LoadingTracks;
        Ok(())
    }

    pub fn poll_tracks(&mut self) -> Option<TrackLoadReport> {
        let event = self.tracks.poll()?;
        Some(self.finish_track_load(event))
    }

    pub fn wait_for_tracks(&mut self) -> Option<TrackLoadReport> {
        let event = self.tracks.wait_all_ready()?;
        Some(self.finish_track_load(event))
    }

    fn finish_track_load(&mut self, event: TrackManagerEvent) -> TrackLoadReport {
        let TrackManagerEvent::AllTrackFilesReady { loaded, failed } = event;
        let errors = self
            .tracks
            .read_load_errors()
            .into_iter()
            .map(|(path, message)| format!("{}: {}", path.display(), message))
            .collect();

        self.state = if self.tracks.track_count() > 0 {
            SessionState::TracksReady
        } else {
            SessionState::Idle
        };
        TrackLoadReport { loaded, failed, errors }
    }

    pub fn clear_tracks(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Correlating || self.state == SessionState::LoadingTracks {
            return Err(SessionError::Busy("clearing tracks"));
        }
        self.tracks.clear();
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Starts a background run over `photos`. Only one run per session.
    pub fn start_correlation(
        &mut self,
        photos: Vec<(K, Option<NaiveDateTime>)>,
        options: CorrelationOptions,
    ) -> Result<(), SessionError> {
        match self.state {
            SessionState::Correlating => return Err(SessionError::Busy("correlating")),
            SessionState::LoadingTracks => return Err(SessionError::Busy("loading tracks")),
            SessionState::Idle => return Err(SessionError::NoTracks),
            SessionState::TracksReady => {}
        }

        let total = photos.len();
        let run = TrackCorrelator::new(self.tracks.tracks()).correlate(photos, options);
        self.active = Some(ActiveRun {
            run,
            undo: GpsUndoCommand::new(),
            total,
            tried: 0,
            correlated: 0,
        });
        self.state = SessionState::Correlating;
        Ok(())
    }

    pub fn is_correlating(&self) -> bool {
        self.state == SessionState::Correlating
    }

    /// `(tried, total)` of the current run.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.active.as_ref().map(|a| (a.tried, a.total))
    }

    /// Requests cancellation. Changes made so far are reverted once the
    /// worker acknowledges, in the next `process_events`.
    pub fn cancel(&mut self) {
        if let Some(active) = &self.active {
            info!("Canceling correlation");
            active.run.cancel();
        }
    }

    /// Applies pending worker events to `store`. With `blocking` set this
    /// waits until the run ends. Returns the outcome once the run has ended.
    pub fn process_events<S, U, O>(
        &mut self,
        store: &mut S,
        undo_sink: &mut U,
        observer: &mut O,
        blocking: bool,
    ) -> Option<CorrelationOutcome>
    where
        S: GpsItemStore<K> + ?Sized,
        U: UndoSink<K> + ?Sized,
        O: CorrelationObserver + ?Sized,
    {
        loop {
            let active = self.active.as_mut()?;
            let event = if blocking {
                active.run.next_blocking()
            } else {
                match active.run.try_next() {
                    Ok(event) => Some(event),
                    Err(crossbeam_channel::TryRecvError::Empty) => return None,
                    Err(crossbeam_channel::TryRecvError::Disconnected) => None,
                }
            };

            match event {
                Some(CorrelatorEvent::ItemsCorrelated(batch)) => {
                    Self::apply_batch(active, batch, store);
                    observer.progress(active.tried, active.total);
                }
                Some(CorrelatorEvent::AllItemsCorrelated) if !active.run.is_canceled() => {
                    let outcome = self.finish(undo_sink);
                    observer.finished(&outcome);
                    return Some(outcome);
                }
                Some(CorrelatorEvent::AllItemsCorrelated) | Some(CorrelatorEvent::CorrelationCanceled) | None => {
                    let outcome = self.revert(store);
                    observer.finished(&outcome);
                    return Some(outcome);
                }
            }
        }
    }

    pub fn run_to_completion<S, U, O>(
        &mut self,
        store: &mut S,
        undo_sink: &mut U,
        observer: &mut O,
    ) -> Option<CorrelationOutcome>
    where
        S: GpsItemStore<K> + ?Sized,
        U: UndoSink<K> + ?Sized,
        O: CorrelationObserver + ?Sized,
    {
        self.process_events(store, undo_sink, observer, true)
    }

    fn apply_batch<S>(active: &mut ActiveRun<K>, batch: Vec<Correlation<K>>, store: &mut S)
    where
        S: GpsItemStore<K> + ?Sized,
    {
        active.tried += batch.len();
        for correlation in batch {
            if !correlation.is_correlated() {
                continue;
            }
            active.correlated += 1;

            let new_data = GpsData {
                coordinates: correlation.coordinates,
                n_satellites: correlation.n_satellites,
                dop: correlation.dop(),
                fix_type: correlation.fix_type,
                speed: correlation.speed,
            };
            let key = correlation.user_data;
            let old = store.gps_data(&key);
            store.set_gps_data(&key, new_data);
            let new = store.gps_data(&key);
            active.undo.add_undo_info(UndoInfo { key, old, new });
        }
        debug!("Correlated {} of {} items", active.tried, active.total);
    }

    fn finish<U>(&mut self, undo_sink: &mut U) -> CorrelationOutcome
    where
        U: UndoSink<K> + ?Sized,
    {
        self.state = SessionState::TracksReady;
        let Some(mut active) = self.active.take() else {
            return CorrelationOutcome::NoneCorrelated;
        };

        let outcome = match active.correlated {
            0 => CorrelationOutcome::NoneCorrelated,
            n if n == active.total => CorrelationOutcome::AllCorrelated { count: n },
            n => CorrelationOutcome::PartiallyCorrelated { correlated: n, total: active.total },
        };

        if active.correlated > 0 {
            active.undo.set_text(undo_text(active.correlated));
            undo_sink.push_command(active.undo);
        }
        info!("{}", outcome);
        outcome
    }

    fn revert<S>(&mut self, store: &mut S) -> CorrelationOutcome
    where
        S: GpsItemStore<K> + ?Sized,
    {
        self.state = SessionState::TracksReady;
        if let Some(active) = self.active.take() {
            if !active.run.is_canceled() {
                warn!("Correlation worker stopped unexpectedly");
            }
            active.undo.undo(store);
            debug!("Reverted {} changes", active.undo.len());
        }
        CorrelationOutcome::Canceled
    }
}
