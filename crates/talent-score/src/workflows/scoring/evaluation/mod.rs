pub(crate) mod experience;
mod rules;

pub use experience::{experience_years, MonthYear, SkillExperience};
pub use rules::{evaluate_rule, score_criteria};

use super::domain::{ApplicationRecord, CriteriaId, CriteriaSet, Experience};
use serde::Serialize;

/// Stateless evaluator that applies criteria rules to a candidate's work history.
///
/// The engine does not decide which criteria apply; callers pass the global and
/// local sets for the application's job posting.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    as_of: Option<MonthYear>,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the month used as the end of ongoing roles.
    pub fn as_of(month: MonthYear) -> Self {
        Self { as_of: Some(month) }
    }

    pub fn reference_month(&self) -> MonthYear {
        self.as_of.unwrap_or_else(MonthYear::current)
    }

    pub fn extract(&self, experiences: &[Experience]) -> SkillExperience {
        SkillExperience::extract(experiences, self.reference_month())
    }

    pub fn evaluate_application(&self, application: &ApplicationRecord, criteria: &[CriteriaSet]) -> f64 {
        self.evaluate(&application.experience.experiences, criteria)
    }

    pub fn evaluate(&self, experiences: &[Experience], criteria: &[CriteriaSet]) -> f64 {
        let skills = self.extract(experiences);
        criteria
            .iter()
            .map(|set| score_criteria(set, &skills))
            .sum()
    }

    pub fn breakdown(&self, experiences: &[Experience], criteria: &[CriteriaSet]) -> ScoreBreakdown {
        let skills = self.extract(experiences);
        let criteria: Vec<CriteriaScore> = criteria
            .iter()
            .map(|set| rules::explain_criteria(set, &skills))
            .collect();

        ScoreBreakdown {
            total: criteria.iter().map(|entry| entry.score).sum(),
            max_total: criteria.iter().map(|entry| entry.max_score).sum(),
            criteria,
        }
    }
}

/// Per-criteria audit trail of a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub max_total: f64,
    pub criteria: Vec<CriteriaScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaScore {
    pub criteria_id: CriteriaId,
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    pub rules: Vec<RuleScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleScore {
    pub skill: String,
    pub years: f64,
    pub points: f64,
    pub max_points: f64,
}
