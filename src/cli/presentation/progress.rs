use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

use super::to_pretty_json;
use crate::cli::parse::OutputFormat;
use crate::error::ApiError;
use crate::progress::UserRoadmap;
use crate::tree::RoadmapSummary;

pub fn format_overlay(overlay: &UserRoadmap, format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_pretty_json(overlay);
    }
    let mut out = format!(
        "{} on {}: {} | lesson {} | phase {} | {} answers",
        overlay.user_id.bold(),
        overlay.roadmap_id,
        overlay.status.as_str().cyan(),
        overlay.current_lesson,
        overlay.current_phase,
        overlay.quiz_answers.len()
    );
    for (id, answer) in &overlay.quiz_answers {
        out.push_str(&format!("\n  {} = {}", id.dimmed(), answer));
    }
    Ok(out)
}

pub fn format_user_listing(
    user_id: &str,
    summaries: &[RoadmapSummary],
    format: OutputFormat,
) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_pretty_json(&summaries);
    }
    if summaries.is_empty() {
        return Ok(format!("{} has no roadmaps in progress.", user_id));
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Roadmap ID", "Title", "Status", "Lesson", "Phase"]);
    for s in summaries {
        table.add_row(vec![
            s.id.clone(),
            s.title.clone(),
            s.status.map(|st| st.as_str().to_string()).unwrap_or_default(),
            format!(
                "{}/{}",
                s.current_lesson.unwrap_or_default(),
                s.total_lessons.unwrap_or_default()
            ),
            format!(
                "{}/{}",
                s.current_phase.unwrap_or_default(),
                s.phase_count.unwrap_or_default()
            ),
        ]);
    }
    Ok(table.to_string())
}
