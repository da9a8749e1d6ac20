use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::correlator::CorrelationOptions;
use crate::error::ConfigError;
use crate::grouping::GroupingConfig;
use crate::natural::CaseSensitivity;
use crate::sort_settings::{CategorizationMode, SortOrder, SortRole, SortSettings};
use crate::timezone;

const CONFIG_FILE_NAME: &str = "phstack.conf";

/// Sort settings as stored on disk; enum values are their integer indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    pub categorization_mode: i32,
    pub categorization_sort_order: i32,
    pub sort_role: i32,
    pub sort_order: i32,
    pub natural: bool,
    pub case_sensitive: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        let defaults = SortSettings::default();
        Self {
            categorization_mode: defaults.categorization_mode().index(),
            categorization_sort_order: defaults.categorization_sort_order().index(),
            sort_role: defaults.sort_role().index(),
            sort_order: defaults.sort_order().index(),
            natural: defaults.is_natural(),
            case_sensitive: defaults.sort_case_sensitivity() == CaseSensitivity::Sensitive,
        }
    }
}

impl SortConfig {
    pub fn to_settings(&self) -> Result<SortSettings, ConfigError> {
        let invalid = |key: &'static str, value: i32| ConfigError::InvalidValue { key, value: value.to_string() };

        let mode = CategorizationMode::from_index(self.categorization_mode)
            .ok_or_else(|| invalid("categorization_mode", self.categorization_mode))?;
        let categorization_order = SortOrder::from_index(self.categorization_sort_order)
            .ok_or_else(|| invalid("categorization_sort_order", self.categorization_sort_order))?;
        let role = SortRole::from_index(self.sort_role).ok_or_else(|| invalid("sort_role", self.sort_role))?;
        let order = SortOrder::from_index(self.sort_order).ok_or_else(|| invalid("sort_order", self.sort_order))?;
        let case = if self.case_sensitive { CaseSensitivity::Sensitive } else { CaseSensitivity::Insensitive };

        Ok(SortSettings::new()
            .with_categorization(mode)
            .with_categorization_order(categorization_order)
            .with_role(role)
            .with_order(order)
            .with_natural(self.natural)
            .with_case(case))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// `HH:MM:SS`
    pub max_gap_time: String,
    /// `HH:MM:SS`
    pub interpolation_dst_time: String,
    /// Camera clock offset, `HH:MM:SS`.
    pub offset_time: String,
    /// 0 = `+`, 1 = `-`.
    pub offset_sign: u8,
    /// Index into `timezone::TIME_ZONES`.
    pub time_zone: usize,
    pub interpolate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpx_last_directory: Option<PathBuf>,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_gap_time: "00:00:30".to_string(),
            interpolation_dst_time: "00:15:00".to_string(),
            offset_time: "00:00:00".to_string(),
            offset_sign: 0,
            time_zone: timezone::UTC_INDEX,
            interpolate: true,
            gpx_last_directory: None,
        }
    }
}

impl CorrelatorConfig {
    pub fn to_options(&self) -> Result<CorrelationOptions, ConfigError> {
        let offset = parse_hms("offset_time", &self.offset_time)?;
        let seconds_offset = match self.offset_sign {
            0 => offset,
            1 => -offset,
            other => {
                return Err(ConfigError::InvalidValue { key: "offset_sign", value: other.to_string() });
            }
        };
        let time_zone_offset = timezone::offset_for_index(self.time_zone).ok_or_else(|| {
            ConfigError::InvalidValue { key: "time_zone", value: self.time_zone.to_string() }
        })?;

        Ok(CorrelationOptions {
            max_gap_time: parse_hms("max_gap_time", &self.max_gap_time)?,
            seconds_offset,
            time_zone_offset,
            interpolate: self.interpolate,
            interpolation_dst_time: parse_hms("interpolation_dst_time", &self.interpolation_dst_time)?,
        })
    }
}

/// Parses `HH:MM:SS` into seconds.
pub fn parse_hms(key: &'static str, text: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidValue { key, value: text.to_string() };
    let parts: Vec<&str> = text.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(invalid());
    };
    let h: i64 = h.parse().map_err(|_| invalid())?;
    let m: i64 = m.parse().map_err(|_| invalid())?;
    let s: i64 = s.parse().map_err(|_| invalid())?;
    if !(0..24).contains(&h) || !(0..60).contains(&m) || !(0..60).contains(&s) {
        return Err(invalid());
    }
    Ok(h * 3600 + m * 60 + s)
}

pub fn format_hms(seconds: i64) -> String {
    let s = seconds.rem_euclid(24 * 3600);
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sort: SortConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub correlator: CorrelatorConfig,
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Reads `path`, creating it with defaults if missing. Sections absent
    /// from an existing file are filled with defaults and written back.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config file does not exist, creating new one at {}", path.display());
            let cfg = Self::default();
            cfg.save_to(path)?;
            return Ok(cfg);
        }

        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&content)?;

        let raw: toml::Table = toml::from_str(&content)?;
        let missing: Vec<&str> = ["sort", "grouping", "correlator"]
            .into_iter()
            .filter(|section| !raw.contains_key(*section))
            .collect();
        if !missing.is_empty() {
            debug!("Writing back defaults for missing sections {:?}", missing);
            cfg.save_to(path)?;
        }
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
