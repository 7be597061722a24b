use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::StatsError;
use crate::models::{
    Category, CategoryAverages, CategoryCorrelations, Evaluation, MonthlyTrend, Trend,
    VolunteerStats,
};

pub const TREND_MIN_EVALUATIONS: usize = 4;
pub const RECENT_WINDOW_DAYS: i64 = 30;
/// Monthly windows are approximated as 30 days, not calendar months.
pub const DAYS_PER_MONTH: i64 = 30;
pub const CORRELATION_MIN_EVALUATIONS: usize = 3;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn validate_all(evaluations: &[Evaluation]) -> Result<(), StatsError> {
    evaluations
        .iter()
        .try_for_each(|evaluation| evaluation.ratings.validate(&evaluation.evaluation_code))
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (total, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(total, count), value| (total + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

fn mean_composite<'a>(evaluations: impl IntoIterator<Item = &'a Evaluation>) -> Option<f64> {
    mean(
        evaluations
            .into_iter()
            .filter_map(|evaluation| evaluation.ratings.composite()),
    )
}

/// Unrounded per-category means over the evaluations that carry each category.
pub fn category_averages(evaluations: &[Evaluation]) -> CategoryAverages {
    let mut averages = CategoryAverages::default();
    for category in Category::ALL {
        let value = mean(
            evaluations
                .iter()
                .filter_map(|evaluation| evaluation.ratings.get(category))
                .map(f64::from),
        );
        averages.set(category, value);
    }
    averages
}

/// Volunteer-level overall: the mean of the category means, not of composites.
pub fn overall_from(averages: &CategoryAverages) -> Option<f64> {
    mean(Category::ALL.into_iter().filter_map(|category| averages.get(category)))
}

pub fn overall_average(evaluations: &[Evaluation]) -> Option<f64> {
    overall_from(&category_averages(evaluations))
}

/// Compares the recent half of the time-ordered history against the older half.
pub fn trend(evaluations: &[Evaluation]) -> Option<Trend> {
    if evaluations.len() < TREND_MIN_EVALUATIONS {
        return None;
    }

    let mut ordered: Vec<&Evaluation> = evaluations.iter().collect();
    ordered.sort_by_key(|evaluation| evaluation.service_moment());

    let half = ordered.len() / 2;
    let older = mean_composite(ordered[..half].iter().copied())?;
    let recent = mean_composite(ordered[half..].iter().copied())?;

    Some(if recent > older {
        Trend::Improving
    } else if recent < older {
        Trend::Declining
    } else {
        Trend::Stable
    })
}

pub fn compute_volunteer_stats(evaluations: &[Evaluation]) -> Result<VolunteerStats, StatsError> {
    compute_volunteer_stats_at(evaluations, Utc::now())
}

pub fn compute_volunteer_stats_at(
    evaluations: &[Evaluation],
    now: DateTime<Utc>,
) -> Result<VolunteerStats, StatsError> {
    validate_all(evaluations)?;

    if evaluations.is_empty() {
        return Ok(VolunteerStats::default());
    }

    let averages = category_averages(evaluations);
    let overall = overall_from(&averages);

    let mut rounded = CategoryAverages::default();
    for category in Category::ALL {
        rounded.set(category, averages.get(category).map(round2));
    }

    let recent_cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
    let recent: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|evaluation| evaluation.submitted_at >= recent_cutoff)
        .collect();

    Ok(VolunteerStats {
        evaluation_count: evaluations.len(),
        average_overall: overall.map(round2),
        average_by_category: Some(rounded),
        trend: trend(evaluations),
        recent_performance: mean_composite(recent.iter().copied()).map(round2),
        recent_evaluation_count: recent.len(),
    })
}

pub fn monthly_trend(
    evaluations: &[Evaluation],
    window_months: u32,
) -> Result<Vec<MonthlyTrend>, StatsError> {
    monthly_trend_at(evaluations, window_months, Utc::now())
}

/// Buckets evaluations submitted in the trailing `window_months * 30` days by
/// the year-month of their service date.
pub fn monthly_trend_at(
    evaluations: &[Evaluation],
    window_months: u32,
    now: DateTime<Utc>,
) -> Result<Vec<MonthlyTrend>, StatsError> {
    validate_all(evaluations)?;

    // A window reaching past the representable range has no lower bound.
    let cutoff = Duration::try_days(i64::from(window_months) * DAYS_PER_MONTH)
        .and_then(|window| now.checked_sub_signed(window));
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for evaluation in evaluations {
        if cutoff.is_some_and(|cutoff| evaluation.submitted_at < cutoff) {
            continue;
        }
        let Some(composite) = evaluation.ratings.composite() else {
            continue;
        };
        let month = evaluation.service_moment().format("%Y-%m").to_string();
        let entry = buckets.entry(month).or_insert((0.0, 0));
        entry.0 += composite;
        entry.1 += 1;
    }

    Ok(buckets
        .into_iter()
        .map(|(month, (total, count))| MonthlyTrend {
            month,
            average_rating: round2(total / count as f64),
            evaluation_count: count,
        })
        .collect())
}

/// Pearson correlation between every pair of categories over fully rated
/// evaluations. Cells involving a zero-variance category are `None`.
pub fn category_correlations(
    evaluations: &[Evaluation],
) -> Result<Option<CategoryCorrelations>, StatsError> {
    validate_all(evaluations)?;

    let complete: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|evaluation| evaluation.ratings.is_complete())
        .collect();
    if complete.len() < CORRELATION_MIN_EVALUATIONS {
        return Ok(None);
    }

    let columns: Vec<Vec<f64>> = Category::ALL
        .iter()
        .map(|category| {
            complete
                .iter()
                .filter_map(|evaluation| evaluation.ratings.get(*category))
                .map(f64::from)
                .collect()
        })
        .collect();

    let mut matrix = [[None; 5]; 5];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = pearson(&columns[i], &columns[j]).map(|r| if i == j { 1.0 } else { r });
        }
    }

    Ok(Some(CategoryCorrelations {
        categories: Category::ALL,
        matrix,
    }))
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let mean_x = mean(xs.iter().copied())?;
    let mean_y = mean(ys.iter().copied())?;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x * var_y).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ratings;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    fn evaluation(date: Option<(i32, u32, u32)>, submitted_days_ago: i64, ratings: Ratings) -> Evaluation {
        Evaluation {
            id: Uuid::new_v4(),
            evaluation_code: "EVAL-00001".to_string(),
            volunteer_id: Uuid::nil(),
            event_name: Some("WLR".to_string()),
            role_performed: Some("Group Leader".to_string()),
            evaluation_date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            ratings,
            strengths: None,
            areas_for_improvement: None,
            additional_comments: None,
            evaluator_name: "Dana Ortiz".to_string(),
            evaluator_email: None,
            evaluator_role: None,
            submitted_at: now() - Duration::days(submitted_days_ago),
        }
    }

    fn dated(y: i32, m: u32, d: u32, score: i16) -> Evaluation {
        evaluation(Some((y, m, d)), 60, Ratings::uniform(score))
    }

    #[test]
    fn empty_history_reports_no_data() {
        let stats = compute_volunteer_stats_at(&[], now()).unwrap();
        assert_eq!(stats.evaluation_count, 0);
        assert_eq!(stats.average_overall, None);
        assert_eq!(stats.average_by_category, None);
        assert_eq!(stats.trend, None);
        assert_eq!(stats.recent_performance, None);
    }

    #[test]
    fn two_evaluations_average_per_category() {
        let evaluations = vec![dated(2025, 1, 5, 10), dated(2025, 1, 20, 6)];
        let stats = compute_volunteer_stats_at(&evaluations, now()).unwrap();

        assert_eq!(stats.evaluation_count, 2);
        assert_eq!(stats.average_overall, Some(8.0));
        let averages = stats.average_by_category.unwrap();
        for category in Category::ALL {
            assert_eq!(averages.get(category), Some(8.0));
        }
        assert_eq!(stats.trend, None);
    }

    #[test]
    fn overall_is_mean_of_category_means() {
        // A flattened mean of composites would give (9 + 5) / 2 = 7.0 here.
        let sparse = Ratings {
            reliability: Some(9),
            ..Ratings::default()
        };
        let full = Ratings::uniform(5);
        let evaluations = vec![
            evaluation(Some((2025, 1, 1)), 60, sparse),
            evaluation(Some((2025, 1, 2)), 60, full),
        ];

        // reliability = 7.0, the other four = 5.0 -> (7 + 20) / 5 = 5.4
        let overall = overall_average(&evaluations).unwrap();
        assert!((overall - 5.4).abs() < 1e-9);

        let mut reversed = evaluations.clone();
        reversed.reverse();
        assert!((overall_average(&reversed).unwrap() - overall).abs() < 1e-9);
    }

    #[test]
    fn missing_category_has_no_average() {
        let ratings = Ratings {
            reliability: Some(8),
            quality_of_work: Some(6),
            initiative: None,
            teamwork: Some(7),
            communication: Some(9),
        };
        let stats = compute_volunteer_stats_at(&[evaluation(None, 3, ratings)], now()).unwrap();
        let averages = stats.average_by_category.unwrap();
        assert_eq!(averages.initiative, None);
        assert_eq!(stats.average_overall, Some(7.5));
    }

    #[test]
    fn trend_splits_at_floor_half() {
        // n = 5: older = [4, 4], recent = [6, 6, 3] -> 5.0 > 4.0
        let evaluations = vec![
            dated(2025, 1, 1, 4),
            dated(2025, 1, 2, 4),
            dated(2025, 1, 3, 6),
            dated(2025, 1, 4, 6),
            dated(2025, 1, 5, 3),
        ];
        assert_eq!(trend(&evaluations), Some(Trend::Improving));

        // Putting the 3 in the older half flips the comparison.
        let evaluations = vec![
            dated(2025, 1, 1, 3),
            dated(2025, 1, 2, 6),
            dated(2025, 1, 3, 4),
            dated(2025, 1, 4, 4),
            dated(2025, 1, 5, 4),
        ];
        assert_eq!(trend(&evaluations), Some(Trend::Declining));
    }

    #[test]
    fn trend_orders_by_service_date_not_input_order() {
        let evaluations = vec![
            dated(2025, 2, 1, 9),
            dated(2024, 11, 1, 5),
            dated(2025, 3, 1, 9),
            dated(2024, 12, 1, 5),
        ];
        assert_eq!(trend(&evaluations), Some(Trend::Improving));
    }

    #[test]
    fn trend_is_strict_and_needs_four_evaluations() {
        let equal = vec![
            dated(2025, 1, 1, 7),
            dated(2025, 1, 2, 7),
            dated(2025, 1, 3, 7),
            dated(2025, 1, 4, 7),
        ];
        assert_eq!(trend(&equal), Some(Trend::Stable));
        assert_eq!(trend(&equal[..3]), None);
    }

    #[test]
    fn trend_falls_back_to_submission_time() {
        // Undated evaluations sort by submitted_at: 40 days ago < 10 days ago.
        let evaluations = vec![
            evaluation(None, 10, Ratings::uniform(3)),
            evaluation(None, 40, Ratings::uniform(8)),
            evaluation(None, 9, Ratings::uniform(3)),
            evaluation(None, 41, Ratings::uniform(8)),
        ];
        assert_eq!(trend(&evaluations), Some(Trend::Declining));
    }

    #[test]
    fn recent_performance_uses_last_thirty_days() {
        let evaluations = vec![
            evaluation(None, 2, Ratings::uniform(9)),
            evaluation(None, 29, Ratings::uniform(7)),
            evaluation(None, 45, Ratings::uniform(2)),
        ];
        let stats = compute_volunteer_stats_at(&evaluations, now()).unwrap();
        assert_eq!(stats.recent_evaluation_count, 2);
        assert_eq!(stats.recent_performance, Some(8.0));

        let old = vec![evaluation(None, 90, Ratings::uniform(9))];
        let stats = compute_volunteer_stats_at(&old, now()).unwrap();
        assert_eq!(stats.recent_performance, None);
        assert_eq!(stats.recent_evaluation_count, 0);
    }

    #[test]
    fn averages_round_to_two_decimals() {
        let evaluations = vec![
            dated(2025, 1, 1, 7),
            dated(2025, 1, 2, 8),
            dated(2025, 1, 3, 8),
        ];
        let stats = compute_volunteer_stats_at(&evaluations, now()).unwrap();
        assert_eq!(stats.average_overall, Some(7.67));
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let mut bad = dated(2025, 1, 1, 7);
        bad.ratings.communication = Some(0);
        let err = compute_volunteer_stats_at(&[bad], now()).unwrap_err();
        assert!(matches!(
            err,
            StatsError::RatingOutOfRange {
                category: Category::Communication,
                value: 0,
                ..
            }
        ));
    }

    #[test]
    fn monthly_trend_buckets_by_year_month() {
        let evaluations = vec![
            evaluation(Some((2025, 1, 5)), 20, Ratings::uniform(6)),
            evaluation(Some((2025, 1, 28)), 20, Ratings::uniform(9)),
            evaluation(Some((2025, 2, 1)), 20, Ratings::uniform(8)),
        ];
        let buckets = monthly_trend_at(&evaluations, 6, now()).unwrap();
        assert_eq!(
            buckets,
            vec![
                MonthlyTrend {
                    month: "2025-01".to_string(),
                    average_rating: 7.5,
                    evaluation_count: 2,
                },
                MonthlyTrend {
                    month: "2025-02".to_string(),
                    average_rating: 8.0,
                    evaluation_count: 1,
                },
            ]
        );
    }

    #[test]
    fn monthly_trend_window_is_thirty_days_per_month() {
        let evaluations = vec![
            evaluation(Some((2025, 1, 10)), 59, Ratings::uniform(6)),
            evaluation(Some((2024, 12, 10)), 61, Ratings::uniform(9)),
        ];
        let buckets = monthly_trend_at(&evaluations, 2, now()).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].month, "2025-01");
    }

    #[test]
    fn monthly_trend_with_unbounded_window_keeps_everything() {
        assert_eq!(monthly_trend_at(&[], u32::MAX, now()).unwrap(), Vec::new());
        assert_eq!(monthly_trend_at(&[], 5_000_000, now()).unwrap(), Vec::new());

        let evaluations = vec![evaluation(Some((2019, 6, 1)), 2100, Ratings::uniform(7))];
        let buckets = monthly_trend_at(&evaluations, u32::MAX, now()).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].month, "2019-06");
    }

    #[test]
    fn monthly_trend_buckets_undated_by_submission() {
        // 20 days before 2025-03-15 12:00 is 2025-02-23.
        let evaluations = vec![
            evaluation(None, 20, Ratings::uniform(6)),
            evaluation(Some((2025, 3, 2)), 5, Ratings::uniform(8)),
        ];
        let buckets = monthly_trend_at(&evaluations, 3, now()).unwrap();
        assert_eq!(
            buckets,
            vec![
                MonthlyTrend {
                    month: "2025-02".to_string(),
                    average_rating: 6.0,
                    evaluation_count: 1,
                },
                MonthlyTrend {
                    month: "2025-03".to_string(),
                    average_rating: 8.0,
                    evaluation_count: 1,
                },
            ]
        );
    }

    #[test]
    fn monthly_trend_skips_unrated_evaluations() {
        let evaluations = vec![
            evaluation(Some((2025, 3, 1)), 10, Ratings::default()),
            evaluation(Some((2025, 3, 3)), 10, Ratings::uniform(9)),
            evaluation(Some((2025, 2, 3)), 10, Ratings::default()),
        ];
        let buckets = monthly_trend_at(&evaluations, 3, now()).unwrap();
        assert_eq!(
            buckets,
            vec![MonthlyTrend {
                month: "2025-03".to_string(),
                average_rating: 9.0,
                evaluation_count: 1,
            }]
        );
    }

    #[test]
    fn correlations_need_three_complete_evaluations() {
        let evaluations = vec![dated(2025, 1, 1, 5), dated(2025, 1, 2, 6)];
        assert_eq!(category_correlations(&evaluations).unwrap(), None);
    }

    #[test]
    fn correlations_follow_pearson() {
        let make = |r: i16, q: i16| Ratings {
            reliability: Some(r),
            quality_of_work: Some(q),
            initiative: Some(5),
            teamwork: Some(r),
            communication: Some(11 - r),
        };
        let evaluations = vec![
            evaluation(None, 5, make(2, 3)),
            evaluation(None, 5, make(5, 5)),
            evaluation(None, 5, make(8, 9)),
        ];
        let correlations = category_correlations(&evaluations).unwrap().unwrap();
        let m = correlations.matrix;

        assert_eq!(m[0][0], Some(1.0));
        assert!((m[0][3].unwrap() - 1.0).abs() < 1e-9);
        assert!((m[0][4].unwrap() + 1.0).abs() < 1e-9);
        assert!(m[0][1].unwrap() > 0.9);
        // initiative never varies
        assert_eq!(m[2][2], None);
        assert_eq!(m[0][2], None);
    }
}
