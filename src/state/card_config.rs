//! Card configuration consumed by the countdown engine

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Default text shown once a calendar countdown has passed its target
pub const DEFAULT_EXPIRED_TEXT: &str = "Expired!";

/// Tri-state `compact_format` setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompactFormat {
    /// `true`: always abbreviate multi-unit subtitles
    Always,
    /// `false`: always use the natural "X and Y" join
    Never,
    /// `"auto"`: abbreviate once three or more units are shown
    #[default]
    Auto,
}

impl Serialize for CompactFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CompactFormat::Always => serializer.serialize_bool(true),
            CompactFormat::Never => serializer.serialize_bool(false),
            CompactFormat::Auto => serializer.serialize_str("auto"),
        }
    }
}

impl<'de> Deserialize<'de> for CompactFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => CompactFormat::Always,
            Raw::Flag(false) => CompactFormat::Never,
            Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => CompactFormat::Always,
                "false" => CompactFormat::Never,
                _ => CompactFormat::Auto,
            },
        })
    }
}

/// The subset of a countdown card's configuration that drives the engine.
///
/// `target_date`, `creation_date` and `timer_entity` may hold templates or
/// entity references until they pass through the value resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_entity: Option<String>,
    pub auto_discover_alexa: bool,
    pub auto_discover_google: bool,
    pub show_months: bool,
    pub show_days: bool,
    pub show_hours: bool,
    pub show_minutes: bool,
    pub show_seconds: bool,
    pub compact_format: CompactFormat,
    pub expired_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_suffix: Option<String>,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            target_date: None,
            creation_date: None,
            timer_entity: None,
            auto_discover_alexa: false,
            auto_discover_google: false,
            show_months: false,
            show_days: true,
            show_hours: true,
            show_minutes: true,
            show_seconds: true,
            compact_format: CompactFormat::Auto,
            expired_text: DEFAULT_EXPIRED_TEXT.to_string(),
            subtitle_prefix: None,
            subtitle_suffix: None,
        }
    }
}

impl CardConfig {
    /// Calendar countdown towards `target`
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target_date: Some(target.into()),
            ..Self::default()
        }
    }

    /// Countdown driven by one timer entity
    pub fn for_timer(entity_id: impl Into<String>) -> Self {
        Self {
            timer_entity: Some(entity_id.into()),
            ..Self::default()
        }
    }

    /// Configured timer entity, ignoring blank values
    pub fn timer_entity(&self) -> Option<&str> {
        non_blank(self.timer_entity.as_deref())
    }

    pub fn target_date(&self) -> Option<&str> {
        non_blank(self.target_date.as_deref())
    }

    pub fn creation_date(&self) -> Option<&str> {
        non_blank(self.creation_date.as_deref())
    }

    /// Check if any vendor auto-discovery is enabled
    pub fn auto_discovery_enabled(&self) -> bool {
        self.auto_discover_alexa || self.auto_discover_google
    }

    /// Reject configurations with no countdown source at all
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target_date().is_none()
            && self.timer_entity().is_none()
            && !self.auto_discovery_enabled()
        {
            return Err(ValidationError::MissingSource);
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_apply_to_sparse_config() {
        let config: CardConfig =
            serde_json::from_value(json!({ "target_date": "2030-01-01T00:00:00Z" })).unwrap();
        assert_eq!(config.target_date(), Some("2030-01-01T00:00:00Z"));
        assert!(!config.show_months);
        assert!(config.show_seconds);
        assert_eq!(config.compact_format, CompactFormat::Auto);
        assert_eq!(config.expired_text, DEFAULT_EXPIRED_TEXT);
    }

    #[test]
    fn test_compact_format_accepts_bool_and_auto() {
        let parse = |v: serde_json::Value| -> CompactFormat {
            serde_json::from_value::<CardConfig>(json!({ "compact_format": v }))
                .unwrap()
                .compact_format
        };
        assert_eq!(parse(json!(true)), CompactFormat::Always);
        assert_eq!(parse(json!(false)), CompactFormat::Never);
        assert_eq!(parse(json!("auto")), CompactFormat::Auto);
        assert_eq!(serde_json::to_value(CompactFormat::Auto).unwrap(), json!("auto"));
    }

    #[test]
    fn test_validate_requires_a_source() {
        assert_eq!(
            CardConfig::default().validate(),
            Err(ValidationError::MissingSource)
        );

        let blank = CardConfig {
            target_date: Some("   ".into()),
            ..CardConfig::default()
        };
        assert!(blank.validate().is_err());

        let discovery = CardConfig {
            auto_discover_google: true,
            ..CardConfig::default()
        };
        assert!(discovery.validate().is_ok());
        assert!(CardConfig::for_timer("timer.tea").validate().is_ok());
    }
}
