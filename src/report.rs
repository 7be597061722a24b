use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{
    Category, CategoryCorrelations, CohortEntry, Cohorts, DashboardCounts, MonthlyTrend,
    Volunteer, VolunteerEvaluation, VolunteerHistory, VolunteerStats,
};

fn score_or_na(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(value) => format!("{value:.precision$}"),
        None => "n/a".to_string(),
    }
}

fn write_cohort(output: &mut String, title: &str, entries: &[CohortEntry], empty: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");

    if entries.is_empty() {
        let _ = writeln!(output, "{empty}");
        return;
    }

    for entry in entries {
        let _ = writeln!(
            output,
            "- {} ({}) overall {:.1} across {} evaluations",
            entry.volunteer_name,
            entry.volunteer_email.as_deref().unwrap_or("no email"),
            entry.average_overall,
            entry.evaluation_count
        );
    }
}

pub fn build_dashboard(
    generated_at: DateTime<Utc>,
    counts: &DashboardCounts,
    cohorts: &Cohorts,
    recent: &[VolunteerEvaluation],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Volunteer Evaluation Dashboard");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "- Active volunteers: {}", counts.active_volunteers);
    let _ = writeln!(output, "- Total evaluations: {}", counts.total_evaluations);

    write_cohort(
        &mut output,
        "Top Performers",
        &cohorts.top_performers,
        "No volunteers meet the top performer bar yet.",
    );
    write_cohort(
        &mut output,
        "Needs Attention",
        &cohorts.needs_attention,
        "No volunteers currently need attention.",
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Evaluations");

    if recent.is_empty() {
        let _ = writeln!(output, "No evaluations submitted yet.");
    } else {
        for row in recent {
            let evaluation = &row.evaluation;
            let _ = writeln!(
                output,
                "- {} {} {}{} by {} at {}: composite {}",
                evaluation.evaluation_code,
                row.volunteer_first_name,
                row.volunteer_last_name,
                evaluation
                    .event_name
                    .as_deref()
                    .map(|event| format!(" ({event})"))
                    .unwrap_or_default(),
                evaluation.evaluator_name,
                evaluation.submitted_at.format("%Y-%m-%d"),
                score_or_na(evaluation.ratings.composite(), 1)
            );
        }
    }

    output
}

fn write_identity(output: &mut String, volunteer: &Volunteer) {
    let _ = writeln!(output, "# {}", volunteer.full_name());
    let _ = writeln!(
        output,
        "{}, {}, status {}",
        volunteer.email.as_deref().unwrap_or("no email"),
        volunteer.phone.as_deref().unwrap_or("no phone"),
        volunteer.status
    );
    if let Some(since) = volunteer.first_volunteered_on {
        let _ = writeln!(output, "Volunteering since {since}");
    }
}

pub fn build_profile(
    history: &VolunteerHistory,
    stats: &VolunteerStats,
    monthly: &[MonthlyTrend],
    correlations: Option<&CategoryCorrelations>,
) -> String {
    let mut output = String::new();
    write_identity(&mut output, &history.volunteer);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if stats.evaluation_count == 0 {
        let _ = writeln!(output, "No evaluations recorded.");
        return output;
    }

    let _ = writeln!(output, "- Evaluations: {}", stats.evaluation_count);
    let _ = writeln!(output, "- Overall: {}", score_or_na(stats.average_overall, 1));
    let _ = writeln!(
        output,
        "- Trend: {}",
        stats
            .trend
            .map(|trend| trend.to_string())
            .unwrap_or_else(|| "not enough evaluations".to_string())
    );
    let _ = writeln!(
        output,
        "- Last 30 days: {} across {} evaluations",
        score_or_na(stats.recent_performance, 2),
        stats.recent_evaluation_count
    );

    if let Some(averages) = &stats.average_by_category {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Categories");
        for category in Category::ALL {
            let _ = writeln!(
                output,
                "- {}: {}",
                category.label(),
                score_or_na(averages.get(category), 2)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");
    if monthly.is_empty() {
        let _ = writeln!(output, "No evaluations in this window.");
    } else {
        let _ = writeln!(output, "| Month | Average | Evaluations |");
        let _ = writeln!(output, "|---|---|---|");
        for bucket in monthly {
            let _ = writeln!(
                output,
                "| {} | {:.2} | {} |",
                bucket.month, bucket.average_rating, bucket.evaluation_count
            );
        }
    }

    if let Some(correlations) = correlations {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Category Correlations");
        let _ = write!(output, "|");
        for category in correlations.categories {
            let _ = write!(output, " | {}", category.label());
        }
        let _ = writeln!(output, " |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for (category, row) in correlations.categories.iter().zip(correlations.matrix) {
            let _ = write!(output, "| {}", category.label());
            for cell in row {
                let _ = write!(output, " | {}", score_or_na(cell, 2));
            }
            let _ = writeln!(output, " |");
        }
    }

    let mut recent = history.evaluations.iter().collect::<Vec<_>>();
    recent.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Evaluations");
    for evaluation in recent {
        let _ = writeln!(
            output,
            "- {} {} {} by {}: composite {}",
            evaluation.evaluation_code,
            evaluation
                .evaluation_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| evaluation.submitted_at.format("%Y-%m-%d").to_string()),
            evaluation.event_name.as_deref().unwrap_or("unnamed event"),
            evaluation.evaluator_name,
            score_or_na(evaluation.ratings.composite(), 1)
        );
        if let Some(strengths) = evaluation.strengths.as_deref() {
            let _ = writeln!(output, "  - Strengths: {strengths}");
        }
        if let Some(areas) = evaluation.areas_for_improvement.as_deref() {
            let _ = writeln!(output, "  - Areas for improvement: {areas}");
        }
    }

    output
}

fn optional_line(output: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(output, "- {label}: {value}");
    }
}

/// Full view of a single evaluation.
pub fn build_evaluation_detail(row: &VolunteerEvaluation) -> String {
    let evaluation = &row.evaluation;
    let mut output = String::new();

    let _ = writeln!(
        output,
        "# {} for {} {}",
        evaluation.evaluation_code, row.volunteer_first_name, row.volunteer_last_name
    );
    let _ = writeln!(output);
    optional_line(&mut output, "Event", evaluation.event_name.as_deref());
    optional_line(&mut output, "Role performed", evaluation.role_performed.as_deref());
    if let Some(date) = evaluation.evaluation_date {
        let _ = writeln!(output, "- Service date: {date}");
    }
    let _ = writeln!(
        output,
        "- Submitted: {}",
        evaluation.submitted_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(
        output,
        "- Evaluator: {}{}{}",
        evaluation.evaluator_name,
        evaluation
            .evaluator_role
            .as_deref()
            .map(|role| format!(", {role}"))
            .unwrap_or_default(),
        evaluation
            .evaluator_email
            .as_deref()
            .map(|email| format!(" <{email}>"))
            .unwrap_or_default()
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ratings");
    for category in Category::ALL {
        let rating = evaluation
            .ratings
            .get(category)
            .map(|value| value.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(output, "- {}: {rating}", category.label());
    }
    let _ = writeln!(
        output,
        "- Composite: {}",
        score_or_na(evaluation.ratings.composite(), 2)
    );

    let feedback = [
        ("Strengths", evaluation.strengths.as_deref()),
        ("Areas for improvement", evaluation.areas_for_improvement.as_deref()),
        ("Additional comments", evaluation.additional_comments.as_deref()),
    ];
    if feedback.iter().any(|(_, text)| text.is_some()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Feedback");
        for (label, text) in feedback {
            optional_line(&mut output, label, text);
        }
    }

    output
}
