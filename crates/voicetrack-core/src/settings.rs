//! Injected configuration.
//!
//! The core has no command-line, environment, or config-file surface of
//! its own. Embedding applications build a [`Settings`] value and hand it
//! to [`Tracker::open`](crate::Tracker::open) or
//! [`StateStore::new`](crate::StateStore::new).

use chrono::{FixedOffset, Offset, Utc};
use std::path::PathBuf;

/// Data file name inside the data directory.
pub const DATA_FILE: &str = "voice_tracker_data.json";

/// Key file name inside the data directory.
pub const KEY_FILE: &str = "tracker_key.key";

/// Built-in training plan shown until the user writes their own.
pub const DEFAULT_TRAINING_PLAN: &str = "\
Daily Plan (30-45 minutes)

1. Warm-up (5-10 minutes)
   - Diaphragmatic breathing: 3 slow breaths, in through the nose,
     out through the mouth.
   - Light lip trills or straw phonation, 3 minutes, relaxed and unstrained.

2. Pitch training (15-20 minutes)
   - Match a reference pitch with a pitch tracker app.
   - Scales on lip trills, smooth transitions between notes.

3. Resonance training (10-15 minutes)
   - Alternate dark and bright placements; settle on the brighter,
     forward-placed sound.

4. Cool-down (2-3 minutes)
   - Gentle humming at a comfortable pitch.

Consistency is key: a short daily session beats a long weekly one.
Stop immediately if anything hurts.
";

/// Injected configuration for the tracker core.
///
/// Recognized options: data file path, key file path, UTC offset for the
/// calendar day boundary, and the default plan text used for fresh records.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the persisted record file.
    pub data_file: PathBuf,
    /// Path of the raw key-material file.
    pub key_file: PathBuf,
    /// Offset from UTC that decides what "today" means.
    pub utc_offset: FixedOffset,
    /// Plan text a fresh record starts with.
    pub default_plan_text: String,
}

impl Default for Settings {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            data_file: dir.join(DATA_FILE),
            key_file: dir.join(KEY_FILE),
            utc_offset: Utc.fix(),
            default_plan_text: DEFAULT_TRAINING_PLAN.to_string(),
        }
    }
}

impl Settings {
    /// Set the data file path.
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = path.into();
        self
    }

    /// Set the key file path.
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = path.into();
        self
    }

    /// Set the UTC offset used for daily rollovers.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Set the default training plan text.
    pub fn with_default_plan_text(mut self, text: impl Into<String>) -> Self {
        self.default_plan_text = text.into();
        self
    }

    /// Point both files into `dir`, keeping the default file names.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.data_file = dir.join(DATA_FILE);
        self.key_file = dir.join(KEY_FILE);
        self
    }
}

/// Returns `~/.config/voicetrack/`, falling back to the working directory
/// when no home directory can be determined.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("voicetrack")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_share_the_data_dir() {
        let settings = Settings::default();
        assert_eq!(settings.data_file.parent(), settings.key_file.parent());
        assert!(settings.data_file.ends_with(DATA_FILE));
        assert!(settings.key_file.ends_with(KEY_FILE));
    }

    #[test]
    fn in_dir_moves_both_files() {
        let settings = Settings::default().in_dir("/tmp/vt");
        assert_eq!(settings.data_file, PathBuf::from("/tmp/vt").join(DATA_FILE));
        assert_eq!(settings.key_file, PathBuf::from("/tmp/vt").join(KEY_FILE));
    }

    #[test]
    fn default_offset_is_utc() {
        let settings = Settings::default();
        assert_eq!(settings.utc_offset.local_minus_utc(), 0);
    }
}
