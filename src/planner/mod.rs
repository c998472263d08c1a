//! Slot planning: splitting a class duration into an ordered arc of slots.
//!
//! Each phase of the arc gets a share of the total; each phase is then cut
//! into song-sized slots. Slot durations always add up to the requested
//! total, and a phase that was asked for never ends up with zero minutes.

mod arc;

pub use arc::{default_arc, IntensityArc, PhaseSpec};

use crate::catalog_store::Intensity;
use crate::config::PlannerSettings;
use crate::request::Difficulty;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Semantic role of a slot in the class arc.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    Warmup,
    Build,
    Climb,
    Intervals,
    Peak,
    Recovery,
    Cooldown,
}

/// Target BPM range for a slot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BpmBand {
    pub min: f64,
    pub max: f64,
    pub target: f64,
}

impl SlotRole {
    /// Map a free-form phase name to a role by keyword; unknown names build.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| label.contains(n));
        if has(&["warm"]) {
            SlotRole::Warmup
        } else if has(&["sprint", "peak", "summit"]) {
            // "sprint finish" and "wind sprints" are peaks.
            SlotRole::Peak
        } else if has(&["cool", "finish", "wind"]) {
            SlotRole::Cooldown
        } else if has(&["recover", "rest", "valley"]) {
            SlotRole::Recovery
        } else if has(&["climb", "hill"]) {
            SlotRole::Climb
        } else if has(&["interval", "tabata"]) {
            SlotRole::Intervals
        } else {
            SlotRole::Build
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotRole::Warmup => "warmup",
            SlotRole::Build => "build",
            SlotRole::Climb => "climb",
            SlotRole::Intervals => "intervals",
            SlotRole::Peak => "peak",
            SlotRole::Recovery => "recovery",
            SlotRole::Cooldown => "cooldown",
        }
    }

    /// Catalog `track_type` labels that suit this role, best first.
    pub fn track_types(&self) -> &'static [&'static str] {
        match self {
            SlotRole::Warmup => &["warmup"],
            SlotRole::Build => &["endurance", "intervals", "build"],
            SlotRole::Climb => &["climb"],
            SlotRole::Intervals => &["intervals"],
            SlotRole::Peak => &["sprint", "climb", "peak"],
            SlotRole::Recovery => &["recovery"],
            SlotRole::Cooldown => &["cooldown", "recovery"],
        }
    }

    /// Feedback context labels that count as "this context".
    pub fn context_labels(&self) -> &'static [&'static str] {
        match self {
            SlotRole::Warmup => &["warmup"],
            SlotRole::Build => &["build", "endurance"],
            SlotRole::Climb => &["climb"],
            SlotRole::Intervals => &["intervals", "interval"],
            SlotRole::Peak => &["peak", "sprint"],
            SlotRole::Recovery => &["recovery"],
            SlotRole::Cooldown => &["cooldown"],
        }
    }

    pub fn bpm_band(&self) -> BpmBand {
        let (min, max, target) = match self {
            SlotRole::Warmup => (95.0, 120.0, 108.0),
            SlotRole::Build => (110.0, 132.0, 122.0),
            SlotRole::Climb => (118.0, 140.0, 128.0),
            SlotRole::Intervals => (120.0, 145.0, 132.0),
            SlotRole::Peak => (125.0, 150.0, 138.0),
            SlotRole::Recovery => (95.0, 120.0, 105.0),
            SlotRole::Cooldown => (80.0, 110.0, 95.0),
        };
        BpmBand { min, max, target }
    }

    pub fn intensity_band(&self, difficulty: Difficulty) -> Vec<Intensity> {
        use Intensity::*;
        let working = match difficulty {
            Difficulty::Beginner => vec![Low, Medium],
            Difficulty::Intermediate => vec![Medium, High],
            Difficulty::Advanced | Difficulty::Expert => vec![High, Extreme],
        };
        match self {
            SlotRole::Warmup | SlotRole::Recovery => vec![Low, Medium],
            SlotRole::Cooldown => vec![Low],
            SlotRole::Build | SlotRole::Climb | SlotRole::Intervals => working,
            SlotRole::Peak => match difficulty {
                Difficulty::Beginner => vec![Medium, High],
                _ => vec![High, Extreme],
            },
        }
    }

    /// Relative weight of a middle phase when no share is given.
    fn default_weight(&self) -> f64 {
        match self {
            SlotRole::Climb => 1.25,
            SlotRole::Recovery => 0.5,
            _ => 1.0,
        }
    }

    fn bookend_minutes(&self, settings: &PlannerSettings) -> Option<f64> {
        match self {
            SlotRole::Warmup => Some(settings.warmup_minutes),
            SlotRole::Cooldown => Some(settings.cooldown_minutes),
            _ => None,
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One song-sized piece of the arc.
#[derive(Clone, Debug, Serialize)]
pub struct Slot {
    /// 1-based position in the whole plan.
    pub ordinal: usize,
    /// Index into [`SlotPlan::phases`].
    pub phase_index: usize,
    pub phase_label: String,
    pub role: SlotRole,
    pub target_minutes: f64,
    pub bpm: BpmBand,
    pub intensities: Vec<Intensity>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PhasePlan {
    pub label: String,
    pub role: SlotRole,
    pub minutes: f64,
    pub slot_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SlotPlan {
    pub total_minutes: f64,
    /// True when the phases came from the request rather than the default arc.
    pub requested_arc: bool,
    pub phases: Vec<PhasePlan>,
    pub slots: Vec<Slot>,
}

impl SlotPlan {
    /// Phase labels joined into arc text, e.g. `"Warmup -> Build -> Cooldown"`.
    pub fn arc_text(&self) -> String {
        self.phases
            .iter()
            .map(|p| p.label.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn planned_minutes(&self) -> f64 {
        self.slots.iter().map(|s| s.target_minutes).sum()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("class duration must be a positive number of minutes, got {0}")]
    InvalidDuration(f64),
}

enum Demand {
    Fixed(f64),
    Weighted(f64),
}

/// Plan the slots for a class of `total_minutes`.
pub fn plan_slots(
    total_minutes: f64,
    arc: Option<&IntensityArc>,
    difficulty: Difficulty,
    settings: &PlannerSettings,
) -> Result<SlotPlan, PlanError> {
    if !total_minutes.is_finite() || total_minutes <= 0.0 {
        return Err(PlanError::InvalidDuration(total_minutes));
    }

    let requested = arc.map(IntensityArc::phases).unwrap_or_default();
    let requested_arc = !requested.is_empty();
    let specs = if requested_arc {
        requested
    } else {
        default_arc(total_minutes)
    };

    let demands: Vec<Demand> = specs
        .iter()
        .map(|spec| {
            let role = spec.role();
            if let Some(minutes) = spec.fixed_minutes() {
                Demand::Fixed(minutes)
            } else if let Some(share) = spec.explicit_share() {
                Demand::Weighted(share)
            } else if let Some(minutes) = role.bookend_minutes(settings) {
                Demand::Fixed(minutes)
            } else {
                Demand::Weighted(role.default_weight())
            }
        })
        .collect();

    let phase_minutes = distribute(total_minutes, &demands, settings.min_phase_minutes);

    let mut phases = Vec::with_capacity(specs.len());
    let mut slots = Vec::new();
    for (phase_index, (spec, minutes)) in specs.iter().zip(phase_minutes).enumerate() {
        let role = spec.role();
        let slot_count = ((minutes / settings.target_track_minutes).round() as usize).max(1);
        let per_slot = minutes / slot_count as f64;
        let label = spec.phase.trim().to_string();

        for _ in 0..slot_count {
            slots.push(Slot {
                ordinal: slots.len() + 1,
                phase_index,
                phase_label: label.clone(),
                role,
                target_minutes: per_slot,
                bpm: role.bpm_band(),
                intensities: role.intensity_band(difficulty),
            });
        }
        phases.push(PhasePlan {
            label,
            role,
            minutes,
            slot_count,
        });
    }

    let plan = SlotPlan {
        total_minutes,
        requested_arc,
        phases,
        slots,
    };
    debug!(
        total_minutes,
        phases = plan.phases.len(),
        slots = plan.slots.len(),
        arc = %plan.arc_text(),
        "Planned class arc"
    );
    Ok(plan)
}

/// Split the total across phases. Weighted phases share what fixed phases
/// leave over; when that is too little (or nothing is weighted) every phase
/// is scaled proportionally so the sum still matches and none is zero.
fn distribute(total: f64, demands: &[Demand], min_phase_minutes: f64) -> Vec<f64> {
    let fixed_total: f64 = demands
        .iter()
        .map(|d| match d {
            Demand::Fixed(m) => *m,
            Demand::Weighted(_) => 0.0,
        })
        .sum();
    let weights: Vec<f64> = demands
        .iter()
        .filter_map(|d| match d {
            Demand::Weighted(w) => Some(*w),
            Demand::Fixed(_) => None,
        })
        .collect();
    let weight_total: f64 = weights.iter().sum();
    let remaining = total - fixed_total;

    if !weights.is_empty() && remaining >= min_phase_minutes * weights.len() as f64 {
        return demands
            .iter()
            .map(|d| match d {
                Demand::Fixed(m) => *m,
                Demand::Weighted(w) => remaining * w / weight_total,
            })
            .collect();
    }

    let nominal: Vec<f64> = demands
        .iter()
        .map(|d| match d {
            Demand::Fixed(m) => *m,
            Demand::Weighted(_) => min_phase_minutes,
        })
        .collect();
    let scale = total / nominal.iter().sum::<f64>();
    nominal.into_iter().map(|m| m * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(total: f64, arc: Option<&str>) -> SlotPlan {
        let arc = arc.map(|a| IntensityArc::Text(a.to_string()));
        plan_slots(
            total,
            arc.as_ref(),
            Difficulty::Intermediate,
            &PlannerSettings::default(),
        )
        .unwrap()
    }

    fn assert_sums_to(plan: &SlotPlan, total: f64) {
        assert!(
            (plan.planned_minutes() - total).abs() <= 1.0,
            "planned {} for {}",
            plan.planned_minutes(),
            total
        );
    }

    #[test]
    fn slot_durations_sum_to_total() {
        for total in [5.0, 20.0, 30.0, 37.5, 45.0, 60.0, 75.0, 90.0, 180.0] {
            let p = plan(total, None);
            assert_sums_to(&p, total);
            assert!(p.slots.iter().all(|s| s.target_minutes > 0.0));
        }
    }

    #[test]
    fn default_arc_keeps_bookend_minimums() {
        let p = plan(45.0, None);
        assert_eq!(p.phases.first().unwrap().role, SlotRole::Warmup);
        assert_eq!(p.phases.first().unwrap().minutes, 5.0);
        assert_eq!(p.phases.last().unwrap().role, SlotRole::Cooldown);
        assert_eq!(p.phases.last().unwrap().minutes, 5.0);
        assert!(!p.requested_arc);
        // Middle phases split the remaining 35 minutes by weight.
        let climb = p.phases.iter().find(|ph| ph.role == SlotRole::Climb).unwrap();
        let build = p.phases.iter().find(|ph| ph.role == SlotRole::Build).unwrap();
        assert!(climb.minutes > build.minutes);
    }

    #[test]
    fn short_class_compresses_instead_of_dropping() {
        let p = plan(4.0, Some("warmup:5, climb, sprint, cooldown:5"));
        assert_eq!(p.phases.len(), 4);
        assert!(p.phases.iter().all(|ph| ph.minutes > 0.0));
        assert_sums_to(&p, 4.0);
    }

    #[test]
    fn fixed_only_arc_is_stretched() {
        let p = plan(60.0, Some("warmup, cooldown"));
        assert_eq!(p.phases[0].minutes, 30.0);
        assert_eq!(p.phases[1].minutes, 30.0);
    }

    #[test]
    fn explicit_minutes_and_shares() {
        let p = plan(40.0, Some("Warmup:5 -> Climb:20% -> Sprint:60% -> Cooldown:5"));
        assert!(p.requested_arc);
        let minutes: Vec<f64> = p.phases.iter().map(|ph| ph.minutes).collect();
        assert!((minutes[1] - 7.5).abs() < 1e-9);
        assert!((minutes[2] - 22.5).abs() < 1e-9);
        assert_eq!(p.arc_text(), "Warmup -> Climb -> Sprint -> Cooldown");
    }

    #[test]
    fn phases_are_split_into_song_sized_slots() {
        let p = plan(45.0, Some("climb:12"));
        // A single fixed phase is stretched to the full 45 minutes.
        assert_eq!(p.slots.len(), 11);
        assert!(p.slots.iter().all(|s| s.role == SlotRole::Climb));
        assert_eq!(p.slots.last().unwrap().ordinal, 11);
    }

    #[test]
    fn role_keywords() {
        assert_eq!(SlotRole::from_label("Active Recovery"), SlotRole::Recovery);
        assert_eq!(SlotRole::from_label("Hill repeats"), SlotRole::Climb);
        assert_eq!(SlotRole::from_label("SPRINT finish"), SlotRole::Peak);
        assert_eq!(SlotRole::from_label("wind sprints"), SlotRole::Peak);
        assert_eq!(SlotRole::from_label("Finish"), SlotRole::Cooldown);
        assert_eq!(SlotRole::from_label("Cool down"), SlotRole::Cooldown);
        assert_eq!(SlotRole::from_label("Tabata"), SlotRole::Intervals);
        assert_eq!(SlotRole::from_label("endurance"), SlotRole::Build);
        assert_eq!(SlotRole::from_label("mystery"), SlotRole::Build);
    }

    #[test]
    fn peak_is_harder_than_warmup() {
        let warm = SlotRole::Warmup.intensity_band(Difficulty::Advanced);
        let peak = SlotRole::Peak.intensity_band(Difficulty::Advanced);
        assert!(warm.iter().max() < peak.iter().max());
        assert!(SlotRole::Peak.bpm_band().target > SlotRole::Warmup.bpm_band().target);
    }

    #[test]
    fn rejects_invalid_duration() {
        assert_eq!(
            plan_slots(
                0.0,
                None,
                Difficulty::Beginner,
                &PlannerSettings::default()
            )
            .unwrap_err(),
            PlanError::InvalidDuration(0.0)
        );
    }
}
