//! Load/save pipeline for the persisted tracker record.
//!
//! Loading never fails outward: every unrecoverable problem yields the
//! default record plus a [`LoadIssue`] describing what went wrong, so the
//! application always starts with usable state. The pipeline is:
//!
//! 1. missing file -> defaults
//! 2. plain UTF-8 JSON decode
//! 3. on failure, decrypt with the key file and decode the plaintext
//! 4. field-by-field overlay merge onto the default record
//! 5. legacy schema migration (`sick_today` -> `sick_until_date`)
//! 6. encryption-flag consistency repair
//! 7. numeric and date sanitization
//!
//! Saving is the mirror image, except that a requested encryption is never
//! silently downgraded: a missing key aborts the save with the previous
//! file left intact.

use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use super::crypto;
use super::keys::{KeyMaterial, KeyStore};
use crate::error::{KeyError, LoadIssue, SaveError};
use crate::record::TrackerRecord;
use crate::settings::Settings;

/// Result of a load: always a usable record, plus everything that went
/// wrong on the way there.
#[derive(Debug)]
pub struct LoadOutcome {
    pub record: TrackerRecord,
    pub issues: Vec<LoadIssue>,
}

/// Owns load/save of the tracker record, including the plain-vs-encrypted
/// format decision and the in-memory key cache.
pub struct StateStore {
    settings: Settings,
    keys: KeyStore,
    /// Cached for the process lifetime once loaded.
    key: Option<KeyMaterial>,
}

impl StateStore {
    pub fn new(settings: Settings) -> Self {
        let keys = KeyStore::new(settings.key_file.clone());
        Self {
            settings,
            keys,
            key: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    fn defaults(&self) -> TrackerRecord {
        TrackerRecord::with_defaults(self.settings.default_plan_text.clone())
    }

    // ── Load ─────────────────────────────────────────────────────────

    /// Load the record from disk, falling back to defaults on any
    /// unrecoverable problem.
    pub fn load(&mut self) -> LoadOutcome {
        let mut issues = Vec::new();
        let path = self.settings.data_file.clone();

        if !path.exists() {
            debug!(path = %path.display(), "no data file, starting from defaults");
            return LoadOutcome {
                record: self.defaults(),
                issues,
            };
        }

        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(source) => {
                warn!(path = %path.display(), error = %source, "data file unreadable");
                issues.push(LoadIssue::Unreadable { path, source });
                return LoadOutcome {
                    record: self.defaults(),
                    issues,
                };
            }
        };

        // Plain UTF-8 JSON first; the encrypted form never parses as JSON.
        let (value, source_was_encrypted) = match parse_plain(&raw) {
            Some(value) => (value, false),
            None => {
                let key = match self.require_key() {
                    Ok(key) => key,
                    Err(e) => {
                        warn!(error = %e, "data file is not JSON and no key is available");
                        issues.push(LoadIssue::NoKeyForDecryption(e));
                        return LoadOutcome {
                            record: self.defaults(),
                            issues,
                        };
                    }
                };
                let plaintext = match crypto::open(&key, &raw) {
                    Some(plaintext) => plaintext,
                    None => {
                        warn!(path = %path.display(), "decryption failed");
                        issues.push(LoadIssue::InvalidKeyOrCorruptData);
                        return LoadOutcome {
                            record: self.defaults(),
                            issues,
                        };
                    }
                };
                match parse_plain(&plaintext) {
                    Some(mut value) => {
                        // The file was demonstrably encrypted; the flag
                        // stored inside it may be stale.
                        if let Value::Object(map) = &mut value {
                            map.insert("encrypt_save_file".into(), Value::Bool(true));
                        }
                        (value, true)
                    }
                    None => {
                        warn!(path = %path.display(), "decrypted content is not a valid record");
                        issues.push(LoadIssue::DecryptedContentMalformed);
                        return LoadOutcome {
                            record: self.defaults(),
                            issues,
                        };
                    }
                }
            }
        };

        let mut record = merge_into(self.defaults(), value);

        if !source_was_encrypted && record.encrypt_save_file {
            warn!("record flagged encrypted but file was plaintext; disabling flag");
            record.encrypt_save_file = false;
            issues.push(LoadIssue::EncryptionFlagMismatch);
        }

        LoadOutcome { record, issues }
    }

    // ── Save ─────────────────────────────────────────────────────────

    /// Serialize and persist the record, encrypting when the record asks
    /// for it. A requested encryption is never downgraded to plaintext.
    pub fn save(&mut self, record: &TrackerRecord) -> Result<(), SaveError> {
        let json = serde_json::to_string_pretty(record)?;
        let payload = if record.encrypt_save_file {
            let key = self
                .require_key()
                .map_err(SaveError::EncryptionKeyMissing)?;
            crypto::seal(&key, json.as_bytes()).ok_or(SaveError::EncryptFailed)?
        } else {
            json.into_bytes()
        };
        write_atomic(&self.settings.data_file, &payload)?;
        debug!(
            path = %self.settings.data_file.display(),
            encrypted = record.encrypt_save_file,
            "record saved"
        );
        Ok(())
    }

    // ── Encryption toggle ────────────────────────────────────────────

    /// Obtain key material ahead of encrypted saves: load the existing
    /// key, or generate a fresh one when none is usable. Read failures on
    /// an existing file are propagated rather than overwritten.
    pub fn enable_encryption(&mut self) -> Result<(), KeyError> {
        if self.key.is_some() {
            return Ok(());
        }
        let key = match self.keys.load() {
            Ok(key) => key,
            Err(KeyError::Missing(_)) | Err(KeyError::Malformed { .. }) => {
                self.keys.generate_and_persist()?
            }
            Err(e) => return Err(e),
        };
        self.key = Some(key);
        Ok(())
    }

    /// Drop cached key material after encryption is switched off.
    pub fn disable_encryption(&mut self) {
        self.key = None;
    }

    fn require_key(&mut self) -> Result<KeyMaterial, KeyError> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }
        let key = self.keys.load()?;
        self.key = Some(key.clone());
        Ok(key)
    }
}

fn parse_plain(raw: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(raw).ok()?;
    serde_json::from_str(text).ok()
}

/// Field-by-field overlay of decoded content onto the default record.
///
/// Unknown fields are ignored and malformed fields keep their default, so
/// a partially damaged file degrades per field instead of as a whole.
fn merge_into(defaults: TrackerRecord, value: Value) -> TrackerRecord {
    let Value::Object(mut map) = value else {
        warn!("record content is not a JSON object, using defaults");
        return defaults;
    };
    let mut record = defaults;

    overlay(&mut record.current_streak, map.remove("current_streak"));
    overlay(&mut record.total_trainings, map.remove("total_trainings"));
    overlay(&mut record.last_trained_date, map.remove("last_trained_date"));
    overlay(&mut record.last_active_date, map.remove("last_active_date"));
    overlay(&mut record.sick_until_date, map.remove("sick_until_date"));
    overlay(&mut record.planned_days, map.remove("planned_days"));
    overlay(
        &mut record.training_plan_text,
        map.remove("training_plan_text"),
    );
    overlay(
        &mut record.show_edit_guide_button,
        map.remove("show_edit_guide_button"),
    );
    overlay(&mut record.encrypt_save_file, map.remove("encrypt_save_file"));
    overlay(
        &mut record.total_training_duration_seconds,
        map.remove("total_training_duration_seconds"),
    );

    // The daily session merges key by key so one bad sub-field does not
    // discard the other.
    if let Some(session) = map.remove("daily_session_info") {
        if let Value::Object(mut session) = session {
            overlay(&mut record.daily_session_info.date, session.remove("date"));
            overlay(
                &mut record.daily_session_info.duration_seconds,
                session.remove("duration_seconds"),
            );
        } else {
            debug!("daily_session_info is not an object, keeping defaults");
        }
    }

    migrate_legacy_sick_flag(&mut record, map.remove("sick_today"));
    sanitize(&mut record);
    record
}

fn overlay<T: serde::de::DeserializeOwned>(slot: &mut T, value: Option<Value>) {
    if let Some(value) = value {
        match serde_json::from_value(value) {
            Ok(parsed) => *slot = parsed,
            Err(e) => debug!(error = %e, "ignoring malformed field"),
        }
    }
}

/// One-time import of the legacy boolean `sick_today` flag: when set, the
/// sick period is pinned to the recorded last active day.
fn migrate_legacy_sick_flag(record: &mut TrackerRecord, legacy: Option<Value>) {
    if let Some(Value::Bool(true)) = legacy {
        record.sick_until_date = record.last_active_date;
        info!(
            sick_until = ?record.sick_until_date,
            "migrated legacy sick_today flag"
        );
    }
}

/// Coerce out-of-range values left over from hand-edited or damaged files.
fn sanitize(record: &mut TrackerRecord) {
    if !record.total_training_duration_seconds.is_finite()
        || record.total_training_duration_seconds < 0.0
    {
        record.total_training_duration_seconds = 0.0;
    }
    if !record.daily_session_info.duration_seconds.is_finite()
        || record.daily_session_info.duration_seconds < 0.0
    {
        record.daily_session_info.duration_seconds = 0.0;
    }
    record.planned_days.retain(|day| *day <= 6);
    // A streak cannot exist before the first logged training.
    if record.last_trained_date.is_none() {
        record.current_streak = 0;
    }
}

/// Write via temp file + rename so an interrupted write leaves the
/// previous version intact.
fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), SaveError> {
    let io_err = |source: std::io::Error| SaveError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, payload).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DailySession;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store_in(dir: &Path) -> StateStore {
        StateStore::new(Settings::default().in_dir(dir))
    }

    #[test]
    fn missing_file_yields_defaults_without_issues() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let outcome = store.load();
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.record, store.defaults());
    }

    #[test]
    fn plaintext_roundtrip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut record = store.defaults();
        record.current_streak = 7;
        record.total_trainings = 42;
        record.last_trained_date = Some(date(2024, 3, 1));
        record.last_active_date = Some(date(2024, 3, 2));
        record.sick_until_date = Some(date(2024, 3, 5));
        record.planned_days = [0u8, 2, 4].into_iter().collect();
        record.training_plan_text = "hum scales".into();
        record.show_edit_guide_button = false;
        record.total_training_duration_seconds = 1234.5;
        record.daily_session_info = DailySession {
            date: Some(date(2024, 3, 2)),
            duration_seconds: 300.25,
        };

        store.save(&record).unwrap();
        let outcome = store.load();
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.record, record);
    }

    #[test]
    fn merge_ignores_unknown_and_malformed_fields() {
        let defaults = TrackerRecord::default();
        let merged = merge_into(
            defaults.clone(),
            json!({
                "current_streak": "not a number",
                "total_trainings": 3,
                "last_trained_date": "2024-01-02",
                "some_future_field": [1, 2, 3],
            }),
        );

        assert_eq!(merged.current_streak, defaults.current_streak);
        assert_eq!(merged.total_trainings, 3);
        assert_eq!(merged.last_trained_date, Some(date(2024, 1, 2)));
    }

    #[test]
    fn merge_degrades_daily_session_per_key() {
        let merged = merge_into(
            TrackerRecord::default(),
            json!({
                "daily_session_info": {
                    "date": "definitely not a date",
                    "duration_seconds": 90.0,
                }
            }),
        );
        assert_eq!(merged.daily_session_info.date, None);
        assert_eq!(merged.daily_session_info.duration_seconds, 90.0);
    }

    #[test]
    fn merge_migrates_legacy_sick_flag() {
        let merged = merge_into(
            TrackerRecord::default(),
            json!({
                "sick_today": true,
                "last_active_date": "2024-02-10",
            }),
        );
        assert_eq!(merged.sick_until_date, Some(date(2024, 2, 10)));
    }

    #[test]
    fn merge_drops_false_legacy_sick_flag() {
        let merged = merge_into(
            TrackerRecord::default(),
            json!({ "sick_today": false, "last_active_date": "2024-02-10" }),
        );
        assert_eq!(merged.sick_until_date, None);
    }

    #[test]
    fn sanitize_coerces_negative_durations_and_bad_weekdays() {
        let merged = merge_into(
            TrackerRecord::default(),
            json!({
                "total_training_duration_seconds": -5.0,
                "planned_days": [0, 3, 6, 9],
                "daily_session_info": { "duration_seconds": -1.0 },
            }),
        );
        assert_eq!(merged.total_training_duration_seconds, 0.0);
        assert_eq!(merged.daily_session_info.duration_seconds, 0.0);
        assert_eq!(merged.planned_days, [0u8, 3, 6].into_iter().collect());
    }

    #[test]
    fn sanitize_zeroes_streak_without_training_history() {
        let merged = merge_into(TrackerRecord::default(), json!({ "current_streak": 9 }));
        assert_eq!(merged.current_streak, 0);
    }

    #[test]
    fn stale_encryption_flag_in_plaintext_file_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut record = store.defaults();
        record.encrypt_save_file = true;
        let json = serde_json::to_string_pretty(&record).unwrap();
        std::fs::write(&store.settings.data_file, json).unwrap();

        let outcome = store.load();
        assert!(!outcome.record.encrypt_save_file);
        assert!(matches!(
            outcome.issues.as_slice(),
            [LoadIssue::EncryptionFlagMismatch]
        ));
    }

    #[test]
    fn encrypted_file_forces_flag_on_even_if_stored_off() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.enable_encryption().unwrap();

        // Record claims plaintext, but the bytes on disk are encrypted.
        let mut record = store.defaults();
        record.encrypt_save_file = false;
        record.total_trainings = 5;
        let json = serde_json::to_string_pretty(&record).unwrap();
        let key = store.require_key().unwrap();
        let blob = crypto::seal(&key, json.as_bytes()).unwrap();
        std::fs::write(&store.settings.data_file, blob).unwrap();

        let outcome = store.load();
        assert!(outcome.issues.is_empty());
        assert!(outcome.record.encrypt_save_file);
        assert_eq!(outcome.record.total_trainings, 5);
    }

    #[test]
    fn encrypted_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.enable_encryption().unwrap();

        let mut record = store.defaults();
        record.encrypt_save_file = true;
        record.current_streak = 0;
        record.total_trainings = 11;
        record.last_trained_date = Some(date(2024, 6, 1));

        store.save(&record).unwrap();

        // The bytes on disk must not be readable as JSON.
        let raw = std::fs::read(&store.settings.data_file).unwrap();
        assert!(parse_plain(&raw).is_none());

        let mut fresh = store_in(dir.path());
        let outcome = fresh.load();
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.record, record);
    }

    #[test]
    fn wrong_key_yields_defaults_and_issue() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.enable_encryption().unwrap();

        let mut record = store.defaults();
        record.encrypt_save_file = true;
        store.save(&record).unwrap();

        // Replace the key: old data becomes undecryptable.
        store.key_store().generate_and_persist().unwrap();

        let mut fresh = store_in(dir.path());
        let outcome = fresh.load();
        assert!(matches!(
            outcome.issues.as_slice(),
            [LoadIssue::InvalidKeyOrCorruptData]
        ));
        assert_eq!(outcome.record, fresh.defaults());
    }

    #[test]
    fn missing_key_blocks_encrypted_save_and_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let plain = store.defaults();
        store.save(&plain).unwrap();
        let before = std::fs::read(&store.settings.data_file).unwrap();

        let mut record = store.defaults();
        record.encrypt_save_file = true;
        let err = store.save(&record).unwrap_err();
        assert!(matches!(err, SaveError::EncryptionKeyMissing(_)));

        let after = std::fs::read(&store.settings.data_file).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn undecryptable_file_without_key_reports_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        std::fs::write(&store.settings.data_file, [0u8, 159, 146, 150]).unwrap();

        let outcome = store.load();
        assert!(matches!(
            outcome.issues.as_slice(),
            [LoadIssue::NoKeyForDecryption(_)]
        ));
        assert_eq!(outcome.record, store.defaults());
    }
}
