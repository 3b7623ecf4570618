use super::super::domain::{CriteriaSet, Rule};
use super::experience::SkillExperience;
use super::{CriteriaScore, RuleScore};

/// Points earned by one rule: years in the skill times the per-year rate, capped at `max_points`.
pub fn evaluate_rule(rule: &Rule, experience: &SkillExperience) -> f64 {
    let raw = experience.years(&rule.skill) * rule.points_per_year_of_experience;
    raw.min(rule.max_points).max(0.0)
}

/// Sum of every rule in the set. Bounded by `criteria_max_score` since each rule is capped.
pub fn score_criteria(criteria: &CriteriaSet, experience: &SkillExperience) -> f64 {
    criteria
        .rules()
        .iter()
        .map(|rule| evaluate_rule(rule, experience))
        .sum()
}

pub(crate) fn explain_criteria(criteria: &CriteriaSet, experience: &SkillExperience) -> CriteriaScore {
    let rules: Vec<RuleScore> = criteria
        .rules()
        .iter()
        .map(|rule| RuleScore {
            skill: rule.skill.clone(),
            years: experience.years(&rule.skill),
            points: evaluate_rule(rule, experience),
            max_points: rule.max_points,
        })
        .collect();

    CriteriaScore {
        criteria_id: criteria.id(),
        name: criteria.name().to_string(),
        score: rules.iter().map(|rule| rule.points).sum(),
        max_score: criteria.criteria_max_score(),
        rules,
    }
}
