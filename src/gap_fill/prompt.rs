use super::{ClassBrief, GapFillContext};
use crate::llm::Message;
use crate::planner::Slot;
use serde_json::{json, Value};

const SLOT_SYSTEM_PROMPT: &str = "You are an expert indoor cycling music programmer.

You suggest tracks for one slot of a cycling class whose catalog had nothing suitable.

You must:
- Suggest real, widely available recordings.
- Match the slot's role, BPM band and intensity.
- Respect preferred and excluded genres and artists; exclusions always win.
- Never suggest a track that is already in the class or listed as disliked.
- Prefer liked tracks and artists when they fit.
- Keep each track close to the target duration.

Return valid JSON only, in exactly this shape:
{\"tracks\": [{\"title\": string, \"artist\": string, \"duration_minutes\": number,
\"bpm\": number, \"intensity\": \"low\" | \"medium\" | \"high\" | \"extreme\",
\"focus_area\": string, \"notes\": string}]}";

const CLASS_SYSTEM_PROMPT: &str = "You are an expert indoor cycling music programmer.

You recommend the tracks for a whole cycling class, in play order.

You must:
- Suggest real, widely available recordings.
- Follow the intensity arc, with smooth BPM changes between neighbouring tracks.
- Respect preferred and excluded genres and artists; exclusions always win.
- Never suggest a track listed as disliked.
- Prefer liked tracks and artists when they fit.
- Label each track's focus_area with one of: warmup, build, climb, sprint, recovery, cooldown.

Return valid JSON only, in exactly this shape:
{\"tracks\": [{\"title\": string, \"artist\": string, \"duration_minutes\": number,
\"bpm\": number, \"intensity\": \"low\" | \"medium\" | \"high\" | \"extreme\",
\"focus_area\": string, \"notes\": string}]}";

/// The class and taste sections both prompts share.
fn class_payload(context: &GapFillContext) -> Value {
    let prefs = &context.preferences;
    json!({
        "class": {
            "duration_minutes": context.duration_minutes,
            "difficulty": context.difficulty,
            "audience": prefs.audience,
            "theme": prefs.theme,
            "vibe": prefs.vibe,
            "goal": context.user_goal,
        },
        "preferences": {
            "preferred_genres": prefs.preferred_genres,
            "excluded_genres": prefs.excluded_genres,
            "preferred_artists": prefs.preferred_artists,
            "excluded_artists": prefs.excluded_artists,
        },
        "already_chosen": context.already_chosen,
        "feedback": context.feedback,
    })
}

fn pretty(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

/// System and user messages for one slot.
pub fn build_messages(
    slot: &Slot,
    context: &GapFillContext,
    max_suggestions: usize,
) -> Vec<Message> {
    let mut payload = class_payload(context);
    payload["slot"] = json!({
        "position": slot.ordinal,
        "phase": slot.phase_label,
        "role": slot.role.as_str(),
        "target_duration_minutes": (slot.target_minutes * 10.0).round() / 10.0,
        "bpm_min": slot.bpm.min,
        "bpm_max": slot.bpm.max,
        "target_bpm": slot.bpm.target,
        "intensities": slot.intensities,
    });

    let user = format!(
        "Suggest up to {} tracks for the {} slot ({} phase) of this class.\n\n{}",
        max_suggestions,
        slot.role,
        slot.phase_label,
        pretty(&payload)
    );
    vec![Message::system(SLOT_SYSTEM_PROMPT), Message::user(user)]
}

/// System and user messages asking for a whole class at once.
pub fn build_class_messages(brief: &ClassBrief, context: &GapFillContext) -> Vec<Message> {
    let mut payload = class_payload(context);
    payload["arc"] = json!({
        "intensity_arc": brief.intensity_arc,
        "phases": brief.phases,
    });

    let user = format!(
        "Recommend {} tracks for this {}-minute class, following the arc {}.\n\n{}",
        brief.track_count,
        context.duration_minutes,
        brief.intensity_arc,
        pretty(&payload)
    );
    vec![Message::system(CLASS_SYSTEM_PROMPT), Message::user(user)]
}
