//! Preference keys shared across components.

/// Whether the scheduled auto backup is enabled.
pub const AUTO_BACKUP_ENABLED: &str = "auto_backup_enabled";
/// Directory auto backups are written to.
pub const AUTO_BACKUP_PATH: &str = "auto_backup_path";
/// Preferred time of day (`HH:MM`) for daily auto backups.
pub const AUTO_BACKUP_TIME: &str = "auto_backup_time";
/// Interval between auto backups, in hours.
pub const AUTO_BACKUP_INTERVAL: &str = "auto_backup_interval";
/// Maximum number of auto backup files to keep.
pub const AUTO_BACKUP_MAX_KEEP: &str = "auto_backup_max_keep";

/// Fragment shown on start, stored as an int.
pub const START_FRAGMENT: &str = "start_fragment";
/// Home tab sections, stored as a string set.
pub const HOME_TAB_CONTENT: &str = "home_tab_content";
/// Feed filters, stored as a string set.
pub const SELECTED_FEED_FILTERS: &str = "selected_feed_filters";

/// Default video quality ceiling for downloads (e.g. `720`).
pub const DEFAULT_DOWNLOAD_VIDEO_QUALITY: &str = "default_download_video_quality";
/// Default audio quality ceiling for downloads, in kbps.
pub const DEFAULT_DOWNLOAD_AUDIO_QUALITY: &str = "default_download_audio_quality";

/// Keys whose values are stored as a comma-joined string set.
pub const STRING_SET_KEYS: &[&str] = &[HOME_TAB_CONTENT, SELECTED_FEED_FILTERS];

/// Whether an integer preference keeps its 32-bit representation on restore.
///
/// Only SponsorBlock colors and the start fragment are ints; every other
/// integral value is stored as a long.
#[must_use]
pub fn is_int_key(key: &str) -> bool {
    key == START_FRAGMENT || key.contains("_color")
}

/// Whether a string preference is restored as a string set.
#[must_use]
pub fn is_string_set_key(key: &str) -> bool {
    STRING_SET_KEYS.contains(&key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_int_keys() {
        assert!(is_int_key(START_FRAGMENT));
        assert!(is_int_key("sponsor_color"));
        assert!(!is_int_key("watch_position"));
    }

    #[test]
    fn test_string_set_keys() {
        assert!(is_string_set_key(HOME_TAB_CONTENT));
        assert!(is_string_set_key(SELECTED_FEED_FILTERS));
        assert!(!is_string_set_key(AUTO_BACKUP_PATH));
    }
}
