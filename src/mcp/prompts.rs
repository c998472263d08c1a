//! MCP Prompts
//!
//! Templates a client can offer its user to drive the tools in order.

use std::collections::HashMap;

use super::protocol::{GetPromptResult, PromptArgument};
use super::registry::{McpRegistry, RegisteredPrompt};

pub fn register_all_prompts(registry: &mut McpRegistry) {
    registry.register_prompt(RegisteredPrompt::new(
        "build_class",
        "Step-by-step plan for building, reviewing and rating a cycling class",
        vec![
            PromptArgument {
                name: "duration",
                description: "Target duration in minutes (default 45)",
                required: false,
            },
            PromptArgument {
                name: "difficulty",
                description: "beginner, intermediate, advanced or expert (default intermediate)",
                required: false,
            },
            PromptArgument {
                name: "audience",
                description: "Audience label such as '50+', 'mixed' or 'young' (default 50+)",
                required: false,
            },
        ],
        build_class,
    ));
}

fn argument<'a>(args: &'a HashMap<String, String>, name: &str, default: &'a str) -> &'a str {
    args.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn build_class(args: &HashMap<String, String>) -> GetPromptResult {
    let duration = argument(args, "duration", "45");
    let difficulty = argument(args, "difficulty", "intermediate");
    let audience = argument(args, "audience", "50+");

    let text = format!(
        "Help me build a {duration}-minute cycling class at {difficulty} difficulty \
for a {audience} audience.

Work through these steps:
1. Read the stats://tracks resource to see what the catalog holds.
2. Call build_class_playlist with duration_minutes={duration}, difficulty='{difficulty}' \
and audience='{audience}' for a first routine.
3. For any slot that looks weak, call suggest_tracks_for_slot with audience='{audience}' \
to find alternatives.
4. Call get_top_rated_tracks with audience='{audience}' and check that no favourite was missed.
5. Present the final routine in order, giving for each track:
   - the phase or slot name
   - title and artist
   - BPM and intensity
   - duration
   - any choreography notes
6. Then offer to record thumbs up or down with rate_track, passing audience='{audience}'.

Keep in mind:
- BPM should move smoothly between consecutive tracks.
- The intensity should build to a peak, recover, peak again and cool down.
- Vary positions and resistance.
- Prefer tracks with positive feedback.
- Leave out tracks this audience rated thumbs down.
- Pick songs that resonate with a {audience} crowd.
"
    );

    GetPromptResult::user_text(
        format!("{duration}-minute {difficulty} class for {audience}"),
        text,
    )
}
