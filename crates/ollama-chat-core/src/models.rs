use std::fmt;

/// A model reported by the `/tags` endpoint.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    /// Model name used in generate requests (for example `llama3.2:latest`).
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            modified_at: None,
            digest: None,
        }
    }

    /// Display label such as `llama3.2 (1.9 GB)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, format_size(self.size))
    }
}

/// Body of the `/tags` response. A missing `models` field means no models.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count with 1024-based units and at most one decimal.
///
/// Sizes beyond the gigabyte range stay in `GB`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {}", SIZE_UNITS[unit])
    } else {
        format!("{rounded:.1} {}", SIZE_UNITS[unit])
    }
}

/// Reachability of the API as shown next to the model picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Single-glyph status marker.
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Connected => "🟢",
            Self::Disconnected => "🔴",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Connected => "Connected to Ollama API",
            Self::Disconnected => "Disconnected from Ollama API",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.indicator(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_uses_binary_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_size(2_019_393_189), "1.9 GB");
    }

    #[test]
    fn format_size_clamps_to_gigabytes() {
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 * 1024), "3072 GB");
    }

    #[test]
    fn format_size_rounding_up_drops_decimal() {
        // 1023.96 KB rounds to 1024.0
        assert_eq!(format_size(1_048_535), "1024 KB");
    }

    #[test]
    fn label_combines_name_and_size() {
        assert_eq!(ModelInfo::new("llama3.2", 1536).label(), "llama3.2 (1.5 KB)");
    }

    #[test]
    fn tags_response_tolerates_missing_fields() {
        let tags: TagsResponse = serde_json::from_str("{}").expect("empty tags");
        assert!(tags.models.is_empty());
        let tags: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"m","details":{"family":"llama"}}]}"#)
                .expect("tags");
        assert_eq!(tags.models, vec![ModelInfo::new("m", 0)]);
    }

    #[test]
    fn connection_status_display() {
        assert_eq!(
            ConnectionStatus::Connected.to_string(),
            "🟢 Connected to Ollama API"
        );
        assert!(!ConnectionStatus::Disconnected.is_connected());
    }
}
