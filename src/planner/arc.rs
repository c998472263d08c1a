//! Arc descriptors: the ordered phases a class moves through.

use super::SlotRole;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref PHASE_SEPARATOR: Regex = Regex::new(r"\s*(?:->|→|=>|>|,|\||;)\s*").unwrap();
    static ref PHASE_AMOUNT: Regex =
        Regex::new(r"^(.*?)\s*[:(]\s*(\d+(?:\.\d+)?)\s*(%|m|min|mins|minutes)?\s*\)?$").unwrap();
}

/// One phase of a requested arc.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    #[serde(alias = "name", alias = "role")]
    pub phase: String,
    /// Fixed length of the phase.
    #[serde(default)]
    pub minutes: Option<f64>,
    /// Relative weight against the other non-fixed phases.
    #[serde(default)]
    pub share: Option<f64>,
}

impl PhaseSpec {
    pub fn named(phase: &str) -> Self {
        Self {
            phase: phase.to_string(),
            minutes: None,
            share: None,
        }
    }

    pub fn role(&self) -> SlotRole {
        SlotRole::from_label(&self.phase)
    }

    /// Explicit minutes, if usable.
    pub fn fixed_minutes(&self) -> Option<f64> {
        self.minutes.filter(|m| m.is_finite() && *m > 0.0)
    }

    /// Explicit share, if usable.
    pub fn explicit_share(&self) -> Option<f64> {
        self.share.filter(|s| s.is_finite() && *s > 0.0)
    }
}

/// An arc as requested: free text such as `"Warmup -> Climb:10 -> Sprint:20% -> Cooldown"`
/// or a structured phase list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntensityArc {
    Text(String),
    Phases(Vec<PhaseSpec>),
}

impl IntensityArc {
    /// The requested phases. Empty when the descriptor names nothing usable,
    /// in which case the default arc applies.
    pub fn phases(&self) -> Vec<PhaseSpec> {
        match self {
            IntensityArc::Text(text) => parse_arc_text(text),
            IntensityArc::Phases(phases) => phases
                .iter()
                .filter(|p| !p.phase.trim().is_empty())
                .cloned()
                .collect(),
        }
    }
}

fn parse_arc_text(text: &str) -> Vec<PhaseSpec> {
    PHASE_SEPARATOR
        .split(text.trim())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match PHASE_AMOUNT.captures(token) {
            Some(caps) => {
                let name = caps.get(1).map_or("", |m| m.as_str()).trim();
                let amount = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
                let is_share = caps.get(3).is_some_and(|m| m.as_str() == "%");
                PhaseSpec {
                    phase: if name.is_empty() { token } else { name }.to_string(),
                    minutes: if is_share { None } else { amount },
                    share: if is_share { amount } else { None },
                }
            }
            None => PhaseSpec::named(token),
        })
        .collect()
}

/// The arc used when a request names none. Longer classes get a recovery
/// valley and a second climb before the peak.
pub fn default_arc(duration_minutes: f64) -> Vec<PhaseSpec> {
    let names: &[&str] = if duration_minutes <= 30.0 {
        &["Warmup", "Build", "Climb", "Peak", "Cooldown"]
    } else if duration_minutes <= 45.0 {
        &["Warmup", "Build", "Climb", "Recovery", "Peak", "Cooldown"]
    } else {
        &[
            "Warmup", "Build", "Climb", "Recovery", "Climb", "Peak", "Cooldown",
        ]
    };
    names.iter().map(|n| PhaseSpec::named(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_free_text_with_amounts() {
        let arc = IntensityArc::Text("Warmup -> Climb:10 -> Sprint (20%) , cool down".to_string());
        let phases = arc.phases();
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0], PhaseSpec::named("Warmup"));
        assert_eq!(phases[1].phase, "Climb");
        assert_eq!(phases[1].minutes, Some(10.0));
        assert_eq!(phases[2].phase, "Sprint");
        assert_eq!(phases[2].share, Some(20.0));
        assert_eq!(phases[3].role(), SlotRole::Cooldown);
    }

    #[test]
    fn minute_suffixes_are_accepted() {
        let phases = IntensityArc::Text("hills: 12 min | recover(3m)".to_string()).phases();
        assert_eq!(phases[0].minutes, Some(12.0));
        assert_eq!(phases[0].role(), SlotRole::Climb);
        assert_eq!(phases[1].minutes, Some(3.0));
        assert_eq!(phases[1].role(), SlotRole::Recovery);
    }

    #[test]
    fn blank_text_names_nothing() {
        assert!(IntensityArc::Text(" -> , ".to_string()).phases().is_empty());
    }

    #[test]
    fn default_arc_grows_with_duration() {
        assert_eq!(default_arc(30.0).len(), 5);
        assert_eq!(default_arc(45.0).len(), 6);
        assert_eq!(default_arc(60.0).len(), 7);
        assert_eq!(default_arc(60.0)[0].role(), SlotRole::Warmup);
        assert_eq!(default_arc(60.0)[6].role(), SlotRole::Cooldown);
    }

    #[test]
    fn unusable_amounts_are_ignored() {
        let spec = PhaseSpec {
            phase: "climb".to_string(),
            minutes: Some(0.0),
            share: Some(-1.0),
        };
        assert_eq!(spec.fixed_minutes(), None);
        assert_eq!(spec.explicit_share(), None);
    }
}
