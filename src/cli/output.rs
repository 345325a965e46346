//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;
use owo_colors::OwoColorize;

/// Map domain errors to a single line for stderr, prefixed by their kind.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Exhausted { hops, partial } => format!(
            "{}: {} ({} of {} topics enriched)",
            "exhausted".red(),
            format_args!("enrichment gave up after {hops} hops"),
            partial.enriched_topic_count(),
            partial.topics().count()
        ),
        ApiError::RepairFailure { message, excerpt } => format!(
            "{}: {}\n  near: {}",
            e.kind().red(),
            message,
            excerpt.dimmed()
        ),
        other => format!("{}: {}", other.kind().red(), other),
    }
}

/// Exit code for a failed command: 2 for caller mistakes, 1 for everything else.
pub fn exit_code(e: &ApiError) -> i32 {
    match e {
        ApiError::Validation(_) | ApiError::NotFound(_) | ApiError::ConfigError(_) => 2,
        _ => 1,
    }
}
