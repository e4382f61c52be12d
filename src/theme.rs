use serde::{Deserialize, Serialize};

/// Chrome colors for the static preview. Signal colors are fixed by
/// [`crate::signal`] and are not themeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_fill: String,
    pub node_border: String,
    pub title_color: String,
    pub text_color: String,
    pub muted_text_color: String,
    pub flagged_color: String,
    pub legend_background: String,
    pub legend_border: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            node_fill: "#FFFFFF".to_string(),
            node_border: "#9CA3AF".to_string(),
            title_color: "#111827".to_string(),
            text_color: "#374151".to_string(),
            muted_text_color: "#6B7280".to_string(),
            flagged_color: "#DC2626".to_string(),
            legend_background: "#FFFFFF".to_string(),
            legend_border: "#D1D5DB".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#FFFFFF".to_string(),
            node_border: "#D1D5DB".to_string(),
            title_color: "#111827".to_string(),
            text_color: "#4B5563".to_string(),
            muted_text_color: "#6B7280".to_string(),
            flagged_color: "#DC2626".to_string(),
            legend_background: "#FFFFFF".to_string(),
            legend_border: "#E5E7EB".to_string(),
            background: "#F9FAFB".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
