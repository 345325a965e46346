use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

use super::to_pretty_json;
use crate::cli::parse::OutputFormat;
use crate::error::ApiError;
use crate::tree::invariants::InvariantViolation;
use crate::tree::{Roadmap, RoadmapListing, UserRoadmapView};

pub fn format_roadmap(roadmap: &Roadmap, format: OutputFormat) -> Result<String, ApiError> {
    match format {
        OutputFormat::Json => to_pretty_json(roadmap),
        OutputFormat::Text => Ok(roadmap_text(roadmap, None)),
    }
}

pub fn format_user_view(view: &UserRoadmapView, format: OutputFormat) -> Result<String, ApiError> {
    match format {
        OutputFormat::Json => to_pretty_json(view),
        OutputFormat::Text => {
            let header = format!(
                "{} {} | lesson {} | phase {}",
                view.user_id.bold(),
                view.status.as_str().cyan(),
                view.current_lesson,
                view.current_phase
            );
            Ok(format!("{}\n{}", header, roadmap_text(&view.roadmap, Some(view.current_lesson))))
        }
    }
}

fn roadmap_text(roadmap: &Roadmap, current_lesson: Option<u32>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", roadmap.title.bold().underline()));
    if let Some(id) = &roadmap.id {
        out.push_str(&format!("id: {}\n", id.dimmed()));
    }
    if !roadmap.description.is_empty() {
        out.push_str(&format!("{}\n", roadmap.description));
    }
    out.push_str(&format!(
        "{} phases, {} lessons, {} of {} topics enriched\n",
        roadmap.phase_count,
        roadmap.total_lessons,
        roadmap.enriched_topic_count(),
        roadmap.topics().count()
    ));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Phase", "Lesson", "Topic", "Infobits", "Resources", "Answered"]);
    for phase in &roadmap.phases {
        for topic in &phase.topics {
            let resources = match &topic.search_result {
                Some(found) => format!("{}w/{}v", found.web_results.len(), found.video_results.len()),
                None => "-".to_string(),
            };
            let answered = topic
                .info_bits
                .iter()
                .filter(|b| b.user_answer.as_deref().is_some_and(|a| !a.is_empty()))
                .count();
            let marker = if current_lesson == Some(topic.topic_number) {
                format!("> {}", topic.topic_number)
            } else {
                topic.topic_number.to_string()
            };
            table.add_row(vec![
                format!("{} {}", phase.phase_number, phase.phase_description),
                marker,
                topic.topic_name.clone(),
                topic.infobit_count.to_string(),
                resources,
                format!("{}/{}", answered, topic.info_bits.len()),
            ]);
        }
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_listing(listing: &RoadmapListing, format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_pretty_json(listing);
    }
    if listing.items.is_empty() {
        return Ok("No roadmaps stored.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Roadmap ID", "Title", "Skill", "Phases", "Lessons"]);
    for item in &listing.items {
        table.add_row(vec![
            item.id.clone(),
            item.title.clone(),
            item.skill_name.clone(),
            item.phase_count.map(|n| n.to_string()).unwrap_or_default(),
            item.total_lessons.map(|n| n.to_string()).unwrap_or_default(),
        ]);
    }
    let mut out = table.to_string();
    if listing.truncated {
        out.push_str(&format!("\n{}", "(more roadmaps exist; raise --limit)".yellow()));
    }
    Ok(out)
}

pub fn format_violations(roadmap_id: &str, violations: &[InvariantViolation]) -> String {
    if violations.is_empty() {
        return format!("{} {}", "ok".green(), roadmap_id);
    }
    let mut out = format!("{} {} ({} problems)", "drift".red(), roadmap_id, violations.len());
    for v in violations {
        out.push_str(&format!("\n  - {}", v));
    }
    out
}
