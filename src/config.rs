//! Board configuration.
//!
//! Every section is optional in TOML; missing keys take the defaults below.
//!
//! ```toml
//! [capacity]
//! inbox = 5
//!
//! [drag]
//! hold_ms = 300
//! distance_threshold_px = 5
//!
//! [persistence]
//! debounce_ms = 600
//! retry_delay_ms = 1000
//! max_retries = 1
//! event_buffer = 64
//!
//! [schedule]
//! slot_minutes = 30
//! sub_slot_offset_ms = 6000
//!
//! [later]
//! ttl_hours = 168
//! ```

use crate::board::domain::{CapacityLimits, DragSettings, SlotGrid};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 1_440;
const MAX_RETRIES: u32 = 5;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config from '{}': {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has wrongly typed values.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value for {key}: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Container caps. The Next slot always holds exactly one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Maximum number of Inbox tasks.
    pub inbox: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self { inbox: 5 }
    }
}

/// Click-versus-drag thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Press duration that starts a drag.
    pub hold_ms: u32,
    /// Pointer travel that starts a drag.
    pub distance_threshold_px: u32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            hold_ms: 300,
            distance_threshold_px: 5,
        }
    }
}

/// Debounce, retry and event settings of the persistence scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Quiet period before a batch is dispatched.
    pub debounce_ms: u64,
    /// Pause before retrying failed calls.
    pub retry_delay_ms: u64,
    /// Retries per failed call.
    pub max_retries: u32,
    /// Capacity of the persistence event channel.
    pub event_buffer: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 600,
            retry_delay_ms: 1_000,
            max_retries: 1,
            event_buffer: 64,
        }
    }
}

/// Calendar slot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Slot length; must divide a day.
    pub slot_minutes: u32,
    /// Spacing between tasks sharing a slot.
    pub sub_slot_offset_ms: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let grid = SlotGrid::default();
        Self {
            slot_minutes: grid.slot_minutes(),
            sub_slot_offset_ms: grid.sub_slot_offset_ms(),
        }
    }
}

/// Later bucket expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaterConfig {
    /// Time a task may stay in Later before it expires.
    pub ttl_hours: u32,
}

impl Default for LaterConfig {
    fn default() -> Self {
        Self { ttl_hours: 168 }
    }
}

/// Complete board configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Container caps.
    pub capacity: CapacityConfig,
    /// Drag thresholds.
    pub drag: DragConfig,
    /// Scheduler settings.
    pub persistence: PersistenceConfig,
    /// Calendar grid.
    pub schedule: ScheduleConfig,
    /// Later expiry.
    pub later: LaterConfig,
}

impl BoardConfig {
    /// Parses and validates TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, falling back to the defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] for I/O failures other than a missing
    /// file, plus the errors of [`Self::from_toml_str`].
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, reason| Err(ConfigError::Invalid { key, reason });
        if self.capacity.inbox == 0 {
            return invalid("capacity.inbox", "must be at least 1");
        }
        let slot = self.schedule.slot_minutes;
        if slot == 0 || MINUTES_PER_DAY.checked_rem(slot) != Some(0) {
            return invalid("schedule.slot_minutes", "must evenly divide a day");
        }
        let slot_ms = u64::from(slot).saturating_mul(60_000);
        let offset = u64::from(self.schedule.sub_slot_offset_ms);
        if offset == 0 || offset >= slot_ms || offset.checked_rem(1_000) != Some(0) {
            return invalid(
                "schedule.sub_slot_offset_ms",
                "must be whole seconds and shorter than a slot",
            );
        }
        if self.persistence.max_retries > MAX_RETRIES {
            return invalid("persistence.max_retries", "must be at most 5");
        }
        if self.persistence.event_buffer == 0 {
            return invalid("persistence.event_buffer", "must be at least 1");
        }
        if self.later.ttl_hours == 0 {
            return invalid("later.ttl_hours", "must be at least 1");
        }
        Ok(())
    }

    /// Returns the caps enforced by the reorder engine.
    #[must_use]
    pub const fn capacity_limits(&self) -> CapacityLimits {
        CapacityLimits::new(self.capacity.inbox, 1)
    }

    /// Returns the drag thresholds.
    #[must_use]
    pub fn drag_settings(&self) -> DragSettings {
        DragSettings {
            hold: TimeDelta::milliseconds(i64::from(self.drag.hold_ms)),
            distance_threshold_px: self.drag.distance_threshold_px,
        }
    }

    /// Returns the calendar slot grid.
    #[must_use]
    pub const fn slot_grid(&self) -> SlotGrid {
        SlotGrid::new(self.schedule.slot_minutes, self.schedule.sub_slot_offset_ms)
    }

    /// Returns the debounce window.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }

    /// Returns the retry delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.persistence.retry_delay_ms)
    }

    /// Returns how long a task may stay in Later.
    #[must_use]
    pub fn later_ttl(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.later.ttl_hours))
    }
}
