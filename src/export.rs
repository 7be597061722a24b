use std::io::Write;

use crate::models::VolunteerEvaluation;

pub const EXPORT_HEADER: [&str; 16] = [
    "Volunteer First Name",
    "Volunteer Last Name",
    "Evaluator Name",
    "Event Name",
    "Role Performed",
    "Evaluation Date",
    "Submitted At",
    "Reliability",
    "Communication",
    "Teamwork",
    "Initiative",
    "Quality of Work",
    "Overall Average",
    "Strengths",
    "Areas for Improvement",
    "Additional Comments",
];

fn rating_cell(value: Option<i16>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes one row per evaluation. Overall Average is the per-evaluation
/// composite, not the volunteer-level overall.
pub fn write_evaluations_csv<W: Write>(
    writer: W,
    rows: &[VolunteerEvaluation],
) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(EXPORT_HEADER)?;

    for row in rows {
        let evaluation = &row.evaluation;
        let ratings = &evaluation.ratings;
        csv_writer.write_record([
            row.volunteer_first_name.clone(),
            row.volunteer_last_name.clone(),
            evaluation.evaluator_name.clone(),
            evaluation.event_name.clone().unwrap_or_default(),
            evaluation.role_performed.clone().unwrap_or_default(),
            evaluation
                .evaluation_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            evaluation.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            rating_cell(ratings.reliability),
            rating_cell(ratings.communication),
            rating_cell(ratings.teamwork),
            rating_cell(ratings.initiative),
            rating_cell(ratings.quality_of_work),
            ratings
                .composite()
                .map(|overall| format!("{overall:.2}"))
                .unwrap_or_default(),
            evaluation.strengths.clone().unwrap_or_default(),
            evaluation.areas_for_improvement.clone().unwrap_or_default(),
            evaluation.additional_comments.clone().unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(rows.len())
}
