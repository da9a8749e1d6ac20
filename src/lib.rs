pub mod config;
pub mod correlator;
pub mod error;
pub mod gps_data;
pub mod gpx;
pub mod grouping;
pub mod item;
pub mod natural;
pub mod session;
pub mod sort_settings;
pub mod sort_value;
pub mod timezone;
pub mod track;
pub mod track_manager;
pub mod undo;

pub use config::AppConfig;
pub use correlator::{Correlation, CorrelationFlags, CorrelationOptions, TrackCorrelator};
pub use error::{ConfigError, SessionError, TrackError};
pub use gps_data::{Coordinates, GpsData};
pub use grouping::{Group, GroupingConfig, GroupingEngine, GroupingMode, LeaderPolicy};
pub use item::ItemRecord;
pub use session::{CorrelationOutcome, CorrelationSession, SessionState};
pub use sort_settings::{CategorizationMode, SortOrder, SortRole, SortSettings};
pub use track::{Track, TrackPoint};
