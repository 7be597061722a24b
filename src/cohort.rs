use std::cmp::Ordering;

use tracing::debug;

use crate::error::StatsError;
use crate::models::{CohortEntry, Cohorts, VolunteerHistory};
use crate::stats;

/// Thresholds and limits for population-level classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortCriteria {
    /// Inclusive lower bound for top performers.
    pub top_threshold: f64,
    /// Exclusive upper bound for volunteers needing attention.
    pub attention_threshold: f64,
    pub top_min_evaluations: usize,
    pub attention_min_evaluations: usize,
    pub top_limit: Option<usize>,
    pub attention_limit: Option<usize>,
}

impl Default for CohortCriteria {
    fn default() -> Self {
        Self {
            top_threshold: 8.0,
            attention_threshold: 6.0,
            top_min_evaluations: 3,
            attention_min_evaluations: 2,
            top_limit: Some(10),
            attention_limit: None,
        }
    }
}

/// Splits a population into top performers (best first) and volunteers
/// needing attention (worst first). Scores are compared unrounded.
pub fn classify_population(
    histories: &[VolunteerHistory],
    criteria: &CohortCriteria,
) -> Result<Cohorts, StatsError> {
    let mut top: Vec<(f64, CohortEntry)> = Vec::new();
    let mut attention: Vec<(f64, CohortEntry)> = Vec::new();

    for history in histories {
        stats::validate_all(&history.evaluations)?;

        let count = history.evaluations.len();
        let Some(overall) = stats::overall_average(&history.evaluations) else {
            continue;
        };

        let entry = || CohortEntry {
            volunteer_id: history.volunteer.id,
            volunteer_name: history.volunteer.full_name(),
            volunteer_email: history.volunteer.email.clone(),
            average_overall: stats::round2(overall),
            evaluation_count: count,
        };

        if overall >= criteria.top_threshold && count >= criteria.top_min_evaluations {
            top.push((overall, entry()));
        }
        if overall < criteria.attention_threshold && count >= criteria.attention_min_evaluations {
            attention.push((overall, entry()));
        }
    }

    sort_scored(&mut top, true);
    sort_scored(&mut attention, false);

    debug!(
        population = histories.len(),
        top_performers = top.len(),
        needs_attention = attention.len(),
        "classified volunteers"
    );

    Ok(Cohorts {
        top_performers: finish(top, criteria.top_limit),
        needs_attention: finish(attention, criteria.attention_limit),
    })
}

fn sort_scored(scored: &mut [(f64, CohortEntry)], best_first: bool) {
    scored.sort_by(|a, b| {
        let by_score = if best_first {
            b.0.partial_cmp(&a.0)
        } else {
            a.0.partial_cmp(&b.0)
        };
        by_score
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.volunteer_name.cmp(&b.1.volunteer_name))
    });
}

fn finish(scored: Vec<(f64, CohortEntry)>, limit: Option<usize>) -> Vec<CohortEntry> {
    let entries = scored.into_iter().map(|(_, entry)| entry);
    match limit {
        Some(limit) => entries.take(limit).collect(),
        None => entries.collect(),
    }
}
