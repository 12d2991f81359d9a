//! The structured backup document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{
    CustomInstance, LocalPlaylistWithVideos, LocalSubscription, PlaylistBookmark,
    SearchHistoryItem, SubscriptionGroup, WatchHistoryItem, WatchPosition,
};
use crate::keys;

/// Snapshot of the selected data categories.
///
/// A `None` collection means the category was not part of the backup; restore
/// treats it as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupFile {
    /// Watch history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_history: Option<Vec<WatchHistoryItem>>,
    /// Watch positions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_positions: Option<Vec<WatchPosition>>,
    /// Search history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_history: Option<Vec<SearchHistoryItem>>,
    /// Local subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<Vec<LocalSubscription>>,
    /// Custom instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instances: Option<Vec<CustomInstance>>,
    /// Playlist bookmarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_bookmarks: Option<Vec<PlaylistBookmark>>,
    /// Local playlists with their videos.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_playlists: Option<Vec<LocalPlaylistWithVideos>>,
    /// Piped-importable projection of the local playlists. Ignored on restore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlists: Option<Vec<PipedImportPlaylist>>,
    /// Subscription groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<SubscriptionGroup>>,
    /// Preferences as key / JSON primitive pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Vec<PreferenceItem>>,
}

/// A single exported preference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceItem {
    /// Preference key. Items without one are skipped on restore.
    pub key: Option<String>,
    /// Native JSON boolean, number or string.
    pub value: Value,
}

impl PreferenceItem {
    /// Create an item from a key and value.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
        }
    }

    /// Build an item from a stored string value, recovering its native type.
    ///
    /// `true`/`false` become booleans, canonical integers and plain decimals
    /// become numbers, and everything else stays a string.
    pub fn from_stored(key: &str, raw: &str) -> Self {
        Self::new(key, to_json_primitive(key, raw))
    }
}

/// A local playlist in the format Piped imports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipedImportPlaylist {
    /// Playlist name.
    pub name: String,
    /// Always `"playlist"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Always `"private"`.
    pub visibility: String,
    /// Watch URLs of the videos.
    pub videos: Vec<String>,
}

/// Frontend used to build watch URLs in exported playlists.
pub const YOUTUBE_FRONTEND_URL: &str = "https://www.youtube.com";

impl PipedImportPlaylist {
    /// Project a local playlist into the Piped import format.
    pub fn from_local(playlist: &LocalPlaylistWithVideos) -> Self {
        Self {
            name: playlist.playlist.name.clone(),
            kind: "playlist".to_string(),
            visibility: "private".to_string(),
            videos: playlist
                .videos
                .iter()
                .map(|item| format!("{YOUTUBE_FRONTEND_URL}/watch?v={}", item.video_id))
                .collect(),
        }
    }
}

/// A preference value decoded from a backup, ready to be written back.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceValue {
    /// Boolean.
    Boolean(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Float.
    Float(f32),
    /// Plain string.
    String(String),
    /// Comma-separated set.
    StringSet(Vec<String>),
}

impl PreferenceValue {
    /// Decode a backup value for `key`.
    ///
    /// Strings are taken as-is (or split into a set for set-valued keys).
    /// Other primitives are tried as boolean, int, long and float, in that
    /// order. Ints stay ints only for int-valued keys and widen to longs
    /// otherwise. Nulls, arrays and objects yield `None`.
    pub fn decode(key: &str, value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                if keys::is_string_set_key(key) {
                    Some(Self::StringSet(s.split(',').map(str::to_string).collect()))
                } else {
                    Some(Self::String(s.clone()))
                }
            }
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::Number(n) => {
                if let Some(int) = n.as_i64().and_then(|v| i32::try_from(v).ok()) {
                    if keys::is_int_key(key) {
                        Some(Self::Int(int))
                    } else {
                        Some(Self::Long(i64::from(int)))
                    }
                } else if let Some(long) = n.as_i64() {
                    Some(Self::Long(long))
                } else {
                    n.as_f64().map(|f| Self::Float(f as f32))
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

fn to_json_primitive(key: &str, raw: &str) -> Value {
    if keys::is_string_set_key(key) {
        return Value::String(raw.to_string());
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        if int.to_string() == raw {
            return Value::from(int);
        }
    }
    if is_plain_decimal(raw) {
        if let Some(number) = raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}

fn is_plain_decimal(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let Some(fraction) = parts.next() else {
        return false;
    };
    !whole.is_empty()
        && !fraction.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_stored_recovers_types() {
        assert_eq!(PreferenceItem::from_stored("a", "true").value, json!(true));
        assert_eq!(PreferenceItem::from_stored("a", "42").value, json!(42));
        assert_eq!(PreferenceItem::from_stored("a", "1.5").value, json!(1.5));
        assert_eq!(PreferenceItem::from_stored("a", "dark").value, json!("dark"));
    }

    #[test]
    fn test_from_stored_keeps_ambiguous_strings() {
        assert_eq!(PreferenceItem::from_stored("a", "007").value, json!("007"));
        assert_eq!(PreferenceItem::from_stored("a", "1e5").value, json!("1e5"));
        assert_eq!(PreferenceItem::from_stored("a", "NaN").value, json!("NaN"));
        assert_eq!(PreferenceItem::from_stored("a", "").value, json!(""));
        assert_eq!(
            PreferenceItem::from_stored(keys::HOME_TAB_CONTENT, "1,2").value,
            json!("1,2")
        );
    }

    #[test]
    fn test_decode_order() {
        assert_eq!(
            PreferenceValue::decode("k", &json!("true")),
            Some(PreferenceValue::String("true".to_string()))
        );
        assert_eq!(
            PreferenceValue::decode("k", &json!(false)),
            Some(PreferenceValue::Boolean(false))
        );
        assert_eq!(
            PreferenceValue::decode("k", &json!(5)),
            Some(PreferenceValue::Long(5))
        );
        assert_eq!(
            PreferenceValue::decode(keys::START_FRAGMENT, &json!(5)),
            Some(PreferenceValue::Int(5))
        );
        assert_eq!(
            PreferenceValue::decode("sb_sponsor_color", &json!(-65536)),
            Some(PreferenceValue::Int(-65536))
        );
        assert_eq!(
            PreferenceValue::decode(keys::START_FRAGMENT, &json!(9_000_000_000_i64)),
            Some(PreferenceValue::Long(9_000_000_000))
        );
        assert_eq!(
            PreferenceValue::decode("k", &json!(0.25)),
            Some(PreferenceValue::Float(0.25))
        );
        assert_eq!(PreferenceValue::decode("k", &Value::Null), None);
    }

    #[test]
    fn test_decode_string_set_keys() {
        assert_eq!(
            PreferenceValue::decode(keys::SELECTED_FEED_FILTERS, &json!("videos,shorts")),
            Some(PreferenceValue::StringSet(vec![
                "videos".to_string(),
                "shorts".to_string()
            ]))
        );
    }

    #[test]
    fn test_backup_file_tolerates_missing_fields() {
        let file: BackupFile = serde_json::from_str(r#"{"searchHistory":[{"query":"rust"}]}"#)
            .unwrap();
        assert_eq!(file.search_history.unwrap().len(), 1);
        assert!(file.watch_history.is_none());
        assert!(file.preferences.is_none());
    }

    #[test]
    fn test_unselected_categories_are_omitted() {
        let file = BackupFile {
            groups: Some(Vec::new()),
            ..Default::default()
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json, json!({"groups": []}));
    }

    #[test]
    fn test_piped_projection() {
        let playlist = LocalPlaylistWithVideos {
            playlist: crate::db::LocalPlaylist::new("Mix"),
            videos: vec![crate::db::LocalPlaylistItem {
                video_id: "abc".to_string(),
                ..Default::default()
            }],
        };
        let piped = PipedImportPlaylist::from_local(&playlist);
        assert_eq!(piped.videos, vec!["https://www.youtube.com/watch?v=abc"]);
        let json = serde_json::to_value(&piped).unwrap();
        assert_eq!(json["type"], "playlist");
        assert_eq!(json["visibility"], "private");
    }
}
