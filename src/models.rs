use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StatsError;

pub const RATING_MIN: i16 = 1;
pub const RATING_MAX: i16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Reliability,
    QualityOfWork,
    Initiative,
    Teamwork,
    Communication,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Reliability,
        Category::QualityOfWork,
        Category::Initiative,
        Category::Teamwork,
        Category::Communication,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::Reliability => "reliability",
            Category::QualityOfWork => "quality_of_work",
            Category::Initiative => "initiative",
            Category::Teamwork => "teamwork",
            Category::Communication => "communication",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Reliability => "Reliability",
            Category::QualityOfWork => "Quality of Work",
            Category::Initiative => "Initiative",
            Category::Teamwork => "Teamwork",
            Category::Communication => "Communication",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The five category ratings of one evaluation. Any of them may be missing in
/// storage; aggregation only ever averages the values that are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub reliability: Option<i16>,
    pub quality_of_work: Option<i16>,
    pub initiative: Option<i16>,
    pub teamwork: Option<i16>,
    pub communication: Option<i16>,
}

impl Ratings {
    #[cfg(test)]
    pub fn uniform(value: i16) -> Self {
        Self {
            reliability: Some(value),
            quality_of_work: Some(value),
            initiative: Some(value),
            teamwork: Some(value),
            communication: Some(value),
        }
    }

    pub fn get(&self, category: Category) -> Option<i16> {
        match category {
            Category::Reliability => self.reliability,
            Category::QualityOfWork => self.quality_of_work,
            Category::Initiative => self.initiative,
            Category::Teamwork => self.teamwork,
            Category::Communication => self.communication,
        }
    }

    pub fn present(&self) -> impl Iterator<Item = (Category, i16)> + '_ {
        Category::ALL
            .into_iter()
            .filter_map(move |category| self.get(category).map(|value| (category, value)))
    }

    pub fn is_complete(&self) -> bool {
        Category::ALL.iter().all(|category| self.get(*category).is_some())
    }

    /// Per-evaluation composite: unweighted mean of the ratings present.
    pub fn composite(&self) -> Option<f64> {
        let (total, count) = self
            .present()
            .fold((0i32, 0u32), |(total, count), (_, value)| {
                (total + i32::from(value), count + 1)
            });
        if count == 0 {
            None
        } else {
            Some(f64::from(total) / f64::from(count))
        }
    }

    pub fn validate(&self, evaluation_code: &str) -> Result<(), StatsError> {
        for (category, value) in self.present() {
            if !(RATING_MIN..=RATING_MAX).contains(&value) {
                return Err(StatsError::RatingOutOfRange {
                    evaluation_code: evaluation_code.to_string(),
                    category,
                    value,
                    min: RATING_MIN,
                    max: RATING_MAX,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VolunteerStatus {
    Active,
    Inactive,
}

impl VolunteerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VolunteerStatus::Active => "active",
            VolunteerStatus::Inactive => "inactive",
        }
    }

    /// Only active volunteers can be evaluated.
    pub fn accepts_evaluations(self) -> bool {
        self == VolunteerStatus::Active
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(VolunteerStatus::Active),
            "inactive" => Some(VolunteerStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for VolunteerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Volunteer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: VolunteerStatus,
    pub first_volunteered_on: Option<NaiveDate>,
}

impl Volunteer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub evaluation_code: String,
    pub volunteer_id: Uuid,
    pub event_name: Option<String>,
    pub role_performed: Option<String>,
    pub evaluation_date: Option<NaiveDate>,
    pub ratings: Ratings,
    pub strengths: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub additional_comments: Option<String>,
    pub evaluator_name: String,
    pub evaluator_email: Option<String>,
    pub evaluator_role: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Evaluation {
    /// When the service took place: the evaluation date if recorded, otherwise
    /// the submission timestamp.
    pub fn service_moment(&self) -> NaiveDateTime {
        match self.evaluation_date {
            Some(date) => date.and_time(chrono::NaiveTime::MIN),
            None => self.submitted_at.naive_utc(),
        }
    }
}

/// An evaluation joined with the name of the volunteer it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct VolunteerEvaluation {
    pub volunteer_first_name: String,
    pub volunteer_last_name: String,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone)]
pub struct NewVolunteer {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: VolunteerStatus,
    pub first_volunteered_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct VolunteerUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: Option<VolunteerStatus>,
}

#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub volunteer_id: Uuid,
    pub event_name: Option<String>,
    pub role_performed: Option<String>,
    pub evaluation_date: NaiveDate,
    pub ratings: Ratings,
    pub strengths: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub additional_comments: Option<String>,
    pub evaluator_name: String,
    pub evaluator_email: Option<String>,
    pub evaluator_role: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub source_key: Option<String>,
}

/// A volunteer together with a snapshot of all of their evaluations.
#[derive(Debug, Clone)]
pub struct VolunteerHistory {
    pub volunteer: Volunteer,
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryAverages {
    pub reliability: Option<f64>,
    pub quality_of_work: Option<f64>,
    pub initiative: Option<f64>,
    pub teamwork: Option<f64>,
    pub communication: Option<f64>,
}

impl CategoryAverages {
    pub fn get(&self, category: Category) -> Option<f64> {
        match category {
            Category::Reliability => self.reliability,
            Category::QualityOfWork => self.quality_of_work,
            Category::Initiative => self.initiative,
            Category::Teamwork => self.teamwork,
            Category::Communication => self.communication,
        }
    }

    pub fn set(&mut self, category: Category, value: Option<f64>) {
        let slot = match category {
            Category::Reliability => &mut self.reliability,
            Category::QualityOfWork => &mut self.quality_of_work,
            Category::Initiative => &mut self.initiative,
            Category::Teamwork => &mut self.teamwork,
            Category::Communication => &mut self.communication,
        };
        *slot = value;
    }
}

/// Derived per-volunteer summary. Figures are rounded to two decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolunteerStats {
    pub evaluation_count: usize,
    pub average_overall: Option<f64>,
    pub average_by_category: Option<CategoryAverages>,
    pub trend: Option<Trend>,
    pub recent_performance: Option<f64>,
    pub recent_evaluation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    pub month: String,
    pub average_rating: f64,
    pub evaluation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCorrelations {
    pub categories: [Category; 5],
    pub matrix: [[Option<f64>; 5]; 5],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortEntry {
    pub volunteer_id: Uuid,
    pub volunteer_name: String,
    pub volunteer_email: Option<String>,
    pub average_overall: f64,
    pub evaluation_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cohorts {
    pub top_performers: Vec<CohortEntry>,
    pub needs_attention: Vec<CohortEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardCounts {
    pub active_volunteers: i64,
    pub total_evaluations: i64,
}
