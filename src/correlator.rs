use bitflags::bitflags;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

use crate::gps_data::Coordinates;
use crate::track::{Track, TrackPoint};

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// All values in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationOptions {
    /// Largest gap to a single track point in direct mode.
    pub max_gap_time: i64,
    /// Camera clock error, positive when the camera runs ahead.
    pub seconds_offset: i64,
    /// Offset of the camera's time zone from UTC.
    pub time_zone_offset: i64,
    pub interpolate: bool,
    /// Largest gap to either bracketing point in interpolate mode.
    pub interpolation_dst_time: i64,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        Self {
            max_gap_time: 30,
            seconds_offset: 0,
            time_zone_offset: 0,
            interpolate: true,
            interpolation_dst_time: 15 * 60,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CorrelationFlags: u8 {
        const COORDINATES  = 1 << 0;
        const INTERPOLATED = 1 << 1;
        const ALTITUDE     = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation<T = ()> {
    pub user_data: T,
    pub date_time: Option<NaiveDateTime>,
    pub flags: CorrelationFlags,
    pub coordinates: Option<Coordinates>,
    pub n_satellites: Option<u32>,
    pub hdop: Option<f64>,
    pub pdop: Option<f64>,
    pub fix_type: Option<u8>,
    pub speed: Option<f64>,
}

impl<T> Correlation<T> {
    pub fn new(user_data: T, date_time: Option<NaiveDateTime>) -> Self {
        Self {
            user_data,
            date_time,
            flags: CorrelationFlags::empty(),
            coordinates: None,
            n_satellites: None,
            hdop: None,
            pdop: None,
            fix_type: None,
            speed: None,
        }
    }

    pub fn is_correlated(&self) -> bool {
        self.flags.contains(CorrelationFlags::COORDINATES)
    }

    /// pDop when the track has it, otherwise hDop.
    pub fn dop(&self) -> Option<f64> {
        self.pdop.or(self.hdop)
    }

    pub fn with_user_data<U>(self, user_data: U) -> Correlation<U> {
        Correlation {
            user_data,
            date_time: self.date_time,
            flags: self.flags,
            coordinates: self.coordinates,
            n_satellites: self.n_satellites,
            hdop: self.hdop,
            pdop: self.pdop,
            fix_type: self.fix_type,
            speed: self.speed,
        }
    }

    fn copy_quality(&mut self, point: &TrackPoint) {
        self.n_satellites = point.n_satellites;
        self.hdop = point.hdop;
        self.pdop = point.pdop;
        self.fix_type = point.fix_type;
        self.speed = point.speed;
    }
}

/// Converts a camera timestamp to UTC. None only on calendar overflow.
pub fn normalize_time(local: NaiveDateTime, options: &CorrelationOptions) -> Option<DateTime<Utc>> {
    let shift = options.time_zone_offset.checked_add(options.seconds_offset)?;
    if shift == 0 {
        return Some(local.and_utc());
    }
    let delta = TimeDelta::try_seconds(shift)?;
    local.checked_sub_signed(delta).map(|t| t.and_utc())
}

fn gap_millis(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (a - b).num_milliseconds().abs()
}

fn limit_millis(secs: i64) -> i64 {
    secs.saturating_mul(1000)
}

// Nearest point in any track; ties keep the earlier track and point.
fn nearest_point(tracks: &[Track], time: DateTime<Utc>) -> Option<(&TrackPoint, i64)> {
    let mut best: Option<(&TrackPoint, i64)> = None;
    for track in tracks {
        let points = track.points();
        let idx = track.first_index_at_or_after(time);
        let candidates = [idx.checked_sub(1), Some(idx)];
        for point in candidates.into_iter().flatten().filter_map(|i| points.get(i)) {
            let gap = gap_millis(point.time, time);
            if best.is_none_or(|(_, b)| gap < b) {
                best = Some((point, gap));
            }
        }
    }
    best
}

// Bracketing pair with the smallest span across tracks.
fn bracketing_pair(
    tracks: &[Track],
    time: DateTime<Utc>,
    limit: i64,
) -> Option<(&TrackPoint, &TrackPoint)> {
    let mut best: Option<(&TrackPoint, &TrackPoint, i64)> = None;
    for track in tracks {
        let points = track.points();
        let idx = track.first_index_at_or_after(time);
        if idx == 0 || idx >= points.len() {
            continue;
        }
        let (before, after) = (&points[idx - 1], &points[idx]);
        if gap_millis(time, before.time) > limit || gap_millis(after.time, time) > limit {
            continue;
        }
        let span = gap_millis(after.time, before.time);
        if best.is_none_or(|(_, _, s)| span < s) {
            best = Some((before, after, span));
        }
    }
    best.map(|(before, after, _)| (before, after))
}

fn interpolate(before: &TrackPoint, after: &TrackPoint, time: DateTime<Utc>) -> (Coordinates, bool) {
    let span = gap_millis(after.time, before.time) as f64;
    let fraction = if span > 0.0 { gap_millis(time, before.time) as f64 / span } else { 0.0 };

    let (b, a) = (before.coordinates, after.coordinates);
    let mut coordinates = Coordinates::new(
        b.lat + (a.lat - b.lat) * fraction,
        b.lon + (a.lon - b.lon) * fraction,
    );
    if let (Some(b_alt), Some(a_alt)) = (b.alt, a.alt) {
        coordinates.alt = Some(b_alt + (a_alt - b_alt) * fraction);
    }
    (coordinates, fraction > 0.5)
}

/// Matches one camera timestamp against the loaded tracks.
pub fn correlate_one(tracks: &[Track], local: NaiveDateTime, options: &CorrelationOptions) -> Correlation {
    let mut result = Correlation::new((), Some(local));
    let Some(time) = normalize_time(local, options) else {
        return result;
    };

    let nearest = nearest_point(tracks, time);

    if options.interpolate {
        if let Some((point, 0)) = nearest {
            result.coordinates = Some(point.coordinates);
            result.copy_quality(point);
        } else if let Some((before, after)) =
            bracketing_pair(tracks, time, limit_millis(options.interpolation_dst_time))
        {
            let (coordinates, after_is_nearer) = interpolate(before, after, time);
            result.coordinates = Some(coordinates);
            result.copy_quality(if after_is_nearer { after } else { before });
            result.flags |= CorrelationFlags::INTERPOLATED;
        }
    } else if let Some((point, gap)) = nearest
        && gap <= limit_millis(options.max_gap_time)
    {
        result.coordinates = Some(point.coordinates);
        result.copy_quality(point);
    }

    if let Some(coordinates) = result.coordinates {
        result.flags |= CorrelationFlags::COORDINATES;
        if coordinates.has_altitude() {
            result.flags |= CorrelationFlags::ALTITUDE;
        }
    }
    result
}

/// Synchronous form of `TrackCorrelator::correlate`.
pub fn correlate_all<T>(
    tracks: &[Track],
    items: Vec<(T, Option<NaiveDateTime>)>,
    options: &CorrelationOptions,
) -> Vec<Correlation<T>> {
    items
        .into_iter()
        .map(|(user_data, date_time)| correlate_item(tracks, user_data, date_time, options))
        .collect()
}

fn correlate_item<T>(
    tracks: &[Track],
    user_data: T,
    date_time: Option<NaiveDateTime>,
    options: &CorrelationOptions,
) -> Correlation<T> {
    match date_time {
        Some(local) => correlate_one(tracks, local, options).with_user_data(user_data),
        None => Correlation::new(user_data, None),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorrelatorEvent<T> {
    ItemsCorrelated(Vec<Correlation<T>>),
    AllItemsCorrelated,
    CorrelationCanceled,
}

/// A correlation running on a worker thread. Dropping it cancels the worker.
pub struct CorrelationRun<T> {
    events: Receiver<CorrelatorEvent<T>>,
    cancel: Arc<AtomicBool>,
    total: usize,
}

impl<T> CorrelationRun<T> {
    /// Cooperative; the worker stops before its next batch.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// `Empty` when nothing is queued yet, `Disconnected` once the worker is gone.
    pub fn try_next(&self) -> Result<CorrelatorEvent<T>, TryRecvError> {
        self.events.try_recv()
    }

    /// None once the worker is gone.
    pub fn next_blocking(&self) -> Option<CorrelatorEvent<T>> {
        self.events.recv().ok()
    }
}

impl<T> Drop for CorrelationRun<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct TrackCorrelator {
    tracks: Arc<Vec<Track>>,
    batch_size: usize,
}

impl TrackCorrelator {
    pub fn new(tracks: Arc<Vec<Track>>) -> Self {
        Self { tracks, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn correlate<T>(
        &self,
        items: Vec<(T, Option<NaiveDateTime>)>,
        options: CorrelationOptions,
    ) -> CorrelationRun<T>
    where
        T: Send + 'static,
    {
        // At most one batch queued ahead of the consumer.
        let (tx, rx) = bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let total = items.len();
        let tracks = self.tracks.clone();
        let batch_size = self.batch_size;
        let worker_cancel = cancel.clone();

        info!("Correlating {} items against {} tracks", total, tracks.len());

        thread::spawn(move || {
            let mut remaining = items.into_iter();
            let mut done = 0usize;
            loop {
                if worker_cancel.load(Ordering::Relaxed) {
                    debug!("Correlation canceled after {} of {} items", done, total);
                    let _ = tx.send(CorrelatorEvent::CorrelationCanceled);
                    return;
                }

                let batch: Vec<_> = remaining.by_ref().take(batch_size).collect();
                if batch.is_empty() {
                    break;
                }
                done += batch.len();

                let results: Vec<Correlation<T>> = batch
                    .into_par_iter()
                    .map(|(user_data, date_time)| correlate_item(&tracks, user_data, date_time, &options))
                    .collect();
                if tx.send(CorrelatorEvent::ItemsCorrelated(results)).is_err() {
                    return;
                }
            }
            let _ = tx.send(CorrelatorEvent::AllItemsCorrelated);
        });

        CorrelationRun { events: rx, cancel, total }
    }
}
