//! Signal-type classification.
//!
//! Signal tags are an open vocabulary coming from the design service
//! (`audio_signal`, `cv_signal`, `power_neg12v`, ...). Every tag maps to one
//! of a fixed set of categories, each with a fixed color, so edge styling is
//! stable across renders.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

static POWER_RAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:power|vcc|vdd|vee|vss|rail)_?(neg|minus|n|pos|plus|p)?_?(\d+(?:[._]\d+)?)v$")
        .expect("power rail pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalCategory {
    Audio,
    ControlVoltage,
    Gate,
    Sync,
    Power,
    Ground,
    Other,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 7] = [
        SignalCategory::Audio,
        SignalCategory::ControlVoltage,
        SignalCategory::Gate,
        SignalCategory::Sync,
        SignalCategory::Power,
        SignalCategory::Ground,
        SignalCategory::Other,
    ];

    pub fn color(self) -> &'static str {
        match self {
            SignalCategory::Audio => "#3B82F6",
            SignalCategory::ControlVoltage => "#22C55E",
            SignalCategory::Gate => "#EF4444",
            SignalCategory::Sync => "#A855F7",
            SignalCategory::Power => "#EAB308",
            SignalCategory::Ground => "#6B7280",
            SignalCategory::Other => "#9CA3AF",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalCategory::Audio => "Audio Signal",
            SignalCategory::ControlVoltage => "CV Signal",
            SignalCategory::Gate => "Gate Signal",
            SignalCategory::Sync => "Sync Signal",
            SignalCategory::Power => "Power",
            SignalCategory::Ground => "Ground",
            SignalCategory::Other => "Other",
        }
    }

    /// Stable lowercase identifier, matching the serialized form.
    pub fn slug(self) -> &'static str {
        match self {
            SignalCategory::Audio => "audio",
            SignalCategory::ControlVoltage => "control-voltage",
            SignalCategory::Gate => "gate",
            SignalCategory::Sync => "sync",
            SignalCategory::Power => "power",
            SignalCategory::Ground => "ground",
            SignalCategory::Other => "other",
        }
    }

    /// Gate and sync edges carry events, so the diagram animates them.
    pub fn is_event(self) -> bool {
        matches!(self, SignalCategory::Gate | SignalCategory::Sync)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalClass {
    pub category: SignalCategory,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub category: SignalCategory,
    pub label: &'static str,
    pub color: &'static str,
}

/// Lowercase, trim, and fold `-`/spaces into `_`.
pub fn normalize_signal_type(tag: &str) -> Cow<'_, str> {
    let trimmed = tag.trim();
    let clean = trimmed
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '+');
    if clean {
        return Cow::Borrowed(trimmed);
    }
    Cow::Owned(
        trimmed
            .chars()
            .map(|ch| match ch {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect(),
    )
}

pub fn classify(signal_type: &str) -> SignalClass {
    let category = category_of(&normalize_signal_type(signal_type));
    SignalClass {
        category,
        color: category.color(),
    }
}

fn category_of(tag: &str) -> SignalCategory {
    let has = |prefixes: &[&str]| prefixes.iter().any(|prefix| tag.starts_with(prefix));
    // Ground first: `vss`/`0v` would otherwise read as a rail.
    if tag == "0v" || has(&["ground", "gnd", "vss", "agnd", "dgnd"]) {
        SignalCategory::Ground
    } else if has(&["audio"]) {
        SignalCategory::Audio
    } else if has(&["cv", "control"]) {
        SignalCategory::ControlVoltage
    } else if has(&["gate", "trigger", "trig"]) {
        SignalCategory::Gate
    } else if has(&["sync", "clock", "clk"]) {
        SignalCategory::Sync
    } else if tag == "v+" || tag == "v_" || has(&["power", "vcc", "vdd", "vee", "supply", "rail"]) {
        SignalCategory::Power
    } else {
        SignalCategory::Other
    }
}

/// Compare two tags after normalization. Empty tags match nothing.
pub fn signal_types_match(a: &str, b: &str) -> bool {
    let a = normalize_signal_type(a);
    let b = normalize_signal_type(b);
    !a.is_empty() && a == b
}

/// Display voltage for a power tag: `power_neg12v` → `-12V`.
pub fn power_rail_label(signal_type: &str) -> Option<String> {
    let tag = normalize_signal_type(signal_type);
    let caps = POWER_RAIL_RE.captures(&tag)?;
    let sign = match caps.get(1).map(|m| m.as_str()) {
        Some("neg" | "minus" | "n") => '-',
        _ => '+',
    };
    let volts = caps.get(2)?.as_str().replace('_', ".");
    Some(format!("{sign}{volts}V"))
}

/// Fixed legend in category order, independent of any particular design.
pub fn legend() -> Vec<LegendEntry> {
    SignalCategory::ALL
        .iter()
        .map(|category| LegendEntry {
            category: *category,
            label: category.label(),
            color: category.color(),
        })
        .collect()
}
