use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier wrapper for submitted applications.
    ApplicationId
);
numeric_id!(
    /// Identifier wrapper for criteria sets.
    CriteriaId
);
numeric_id!(
    /// Identifier of the job posting an application or local criteria set belongs to.
    JobPostingId
);
numeric_id!(ApplicantId);
numeric_id!(SkillId);

/// Value stored for an ongoing role.
pub const PRESENT: &str = "Present";

/// Single skill-to-points mapping within a criteria set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub skill: String,
    pub points_per_year_of_experience: f64,
    pub max_points: f64,
}

impl Rule {
    pub fn new(skill: impl Into<String>, points_per_year_of_experience: f64, max_points: f64) -> Self {
        Self {
            skill: skill.into(),
            points_per_year_of_experience,
            max_points,
        }
    }

    fn validate(&self, index: usize) -> Result<(), CriteriaError> {
        if self.skill.trim().is_empty() {
            return Err(CriteriaError::BlankSkill { index });
        }
        if !self.points_per_year_of_experience.is_finite() || self.points_per_year_of_experience < 0.0
        {
            return Err(CriteriaError::InvalidPoints {
                index,
                value: self.points_per_year_of_experience,
            });
        }
        if !self.max_points.is_finite() || self.max_points < 0.0 {
            return Err(CriteriaError::InvalidMaxPoints {
                index,
                value: self.max_points,
            });
        }
        Ok(())
    }
}

/// Wire-level criteria type flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaType {
    Global,
    Local,
}

/// Where a criteria set applies. Local criteria always carry their job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriteriaScope {
    Global,
    Local(JobPostingId),
}

impl CriteriaScope {
    pub fn criteria_type(self) -> CriteriaType {
        match self {
            CriteriaScope::Global => CriteriaType::Global,
            CriteriaScope::Local(_) => CriteriaType::Local,
        }
    }

    pub fn job_posting_id(self) -> Option<JobPostingId> {
        match self {
            CriteriaScope::Global => None,
            CriteriaScope::Local(id) => Some(id),
        }
    }

    pub fn applies_to(self, job_posting_id: JobPostingId) -> bool {
        match self {
            CriteriaScope::Global => true,
            CriteriaScope::Local(id) => id == job_posting_id,
        }
    }
}

/// Validation errors for criteria drafts and rule lists.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaError {
    #[error("local criteria require a job posting id")]
    MissingJobPosting,
    #[error("global criteria must not reference a job posting (found {0})")]
    UnexpectedJobPosting(JobPostingId),
    #[error("criteria name is required")]
    BlankName,
    #[error("criteria must contain at least one rule")]
    NoRules,
    #[error("rule {index}: skill is required")]
    BlankSkill { index: usize },
    #[error("rule {index}: points per year must be a non-negative number (found {value})")]
    InvalidPoints { index: usize, value: f64 },
    #[error("rule {index}: max points must be a non-negative number (found {value})")]
    InvalidMaxPoints { index: usize, value: f64 },
}

/// Incoming payload for creating a criteria set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaDraft {
    pub name: String,
    pub criteria_type: CriteriaType,
    #[serde(default)]
    pub job_posting_id: Option<JobPostingId>,
    pub rules: Vec<Rule>,
}

impl CriteriaDraft {
    pub fn scope(&self) -> Result<CriteriaScope, CriteriaError> {
        match (self.criteria_type, self.job_posting_id) {
            (CriteriaType::Global, None) => Ok(CriteriaScope::Global),
            (CriteriaType::Global, Some(id)) => Err(CriteriaError::UnexpectedJobPosting(id)),
            (CriteriaType::Local, Some(id)) => Ok(CriteriaScope::Local(id)),
            (CriteriaType::Local, None) => Err(CriteriaError::MissingJobPosting),
        }
    }

    pub fn validate(self) -> Result<NewCriteria, CriteriaError> {
        let scope = self.scope()?;
        let name = normalized_name(&self.name)?;
        validate_rules(&self.rules)?;
        Ok(NewCriteria {
            name,
            scope,
            rules: self.rules,
        })
    }
}

/// Partial update for an existing criteria set. The scope of a set never changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
}

/// Validated criteria awaiting an id from the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCriteria {
    name: String,
    scope: CriteriaScope,
    rules: Vec<Rule>,
}

impl NewCriteria {
    pub fn scope(&self) -> CriteriaScope {
        self.scope
    }

    pub fn assign(self, id: CriteriaId) -> CriteriaSet {
        let criteria_max_score = max_score(&self.rules);
        CriteriaSet {
            id,
            name: self.name,
            scope: self.scope,
            rules: self.rules,
            criteria_max_score,
        }
    }
}

/// Named collection of rules. `criteria_max_score` is recomputed on every rule write.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaSet {
    id: CriteriaId,
    name: String,
    scope: CriteriaScope,
    rules: Vec<Rule>,
    criteria_max_score: f64,
}

/// Outcome of pruning a skill's rules out of a criteria set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePruning {
    Unchanged,
    Pruned,
    /// Every rule referenced the skill; the set is left intact for the caller to delete.
    Emptied,
}

impl CriteriaSet {
    pub fn new(
        id: CriteriaId,
        name: impl Into<String>,
        scope: CriteriaScope,
        rules: Vec<Rule>,
    ) -> Result<Self, CriteriaError> {
        let name = normalized_name(&name.into())?;
        validate_rules(&rules)?;
        Ok(NewCriteria { name, scope, rules }.assign(id))
    }

    pub fn id(&self) -> CriteriaId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> CriteriaScope {
        self.scope
    }

    pub fn job_posting_id(&self) -> Option<JobPostingId> {
        self.scope.job_posting_id()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn criteria_max_score(&self) -> f64 {
        self.criteria_max_score
    }

    pub fn rename(&mut self, name: &str) -> Result<(), CriteriaError> {
        self.name = normalized_name(name)?;
        Ok(())
    }

    pub fn set_rules(&mut self, rules: Vec<Rule>) -> Result<(), CriteriaError> {
        validate_rules(&rules)?;
        self.replace_rules(rules);
        Ok(())
    }

    pub fn apply(&mut self, update: CriteriaUpdate) -> Result<(), CriteriaError> {
        let name = update.name.as_deref().map(normalized_name).transpose()?;
        if let Some(rules) = &update.rules {
            validate_rules(rules)?;
        }
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(rules) = update.rules {
            self.replace_rules(rules);
        }
        Ok(())
    }

    pub fn references_skill(&self, skill: &str) -> bool {
        self.rules.iter().any(|rule| rule.skill == skill)
    }

    /// Rewrites every rule naming `from` (exact, case-sensitive) to `to`.
    pub fn rename_skill(&mut self, from: &str, to: &str) -> bool {
        if from == to || !self.references_skill(from) {
            return false;
        }
        let rules = self
            .rules
            .iter()
            .cloned()
            .map(|mut rule| {
                if rule.skill == from {
                    rule.skill = to.to_string();
                }
                rule
            })
            .collect();
        self.replace_rules(rules);
        true
    }

    pub fn remove_skill(&mut self, skill: &str) -> RulePruning {
        let remaining: Vec<Rule> = self
            .rules
            .iter()
            .filter(|rule| rule.skill != skill)
            .cloned()
            .collect();

        if remaining.len() == self.rules.len() {
            RulePruning::Unchanged
        } else if remaining.is_empty() {
            RulePruning::Emptied
        } else {
            self.replace_rules(remaining);
            RulePruning::Pruned
        }
    }

    pub fn view(&self) -> CriteriaView {
        CriteriaView {
            id: self.id,
            name: self.name.clone(),
            criteria_type: self.scope.criteria_type(),
            job_posting_id: self.scope.job_posting_id(),
            rules: self.rules.clone(),
            criteria_max_score: self.criteria_max_score,
        }
    }

    fn replace_rules(&mut self, rules: Vec<Rule>) {
        self.criteria_max_score = max_score(&rules);
        self.rules = rules;
    }
}

/// Serialized representation of a criteria set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaView {
    pub id: CriteriaId,
    pub name: String,
    pub criteria_type: CriteriaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_posting_id: Option<JobPostingId>,
    pub rules: Vec<Rule>,
    pub criteria_max_score: f64,
}

fn max_score(rules: &[Rule]) -> f64 {
    rules.iter().map(|rule| rule.max_points).sum()
}

fn normalized_name(name: &str) -> Result<String, CriteriaError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CriteriaError::BlankName);
    }
    Ok(trimmed.to_string())
}

fn validate_rules(rules: &[Rule]) -> Result<(), CriteriaError> {
    if rules.is_empty() {
        return Err(CriteriaError::NoRules);
    }
    rules
        .iter()
        .enumerate()
        .try_for_each(|(index, rule)| rule.validate(index))
}

/// One entry in a candidate's work history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    /// `MM/YYYY`.
    pub start_date: String,
    /// `MM/YYYY`, `"Present"`, or absent for an ongoing role.
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl Experience {
    pub fn rename_skill(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        for skill in self.skills.iter_mut().filter(|skill| skill.as_str() == from) {
            *skill = to.to_string();
            changed = true;
        }
        changed
    }
}

/// Structured work history stored on an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceHistory {
    #[serde(default)]
    pub experiences: Vec<Experience>,
}

impl ExperienceHistory {
    pub fn references_skill(&self, skill: &str) -> bool {
        self.experiences
            .iter()
            .any(|experience| experience.skills.iter().any(|entry| entry == skill))
    }

    pub fn rename_skill(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        self.experiences
            .iter_mut()
            .fold(false, |changed, experience| {
                experience.rename_skill(from, to) || changed
            })
    }
}

/// Applicant-provided payload before intake normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub job_posting_id: JobPostingId,
    pub applicant_id: ApplicantId,
    #[serde(default)]
    pub work_experience: Vec<Experience>,
}

/// Normalised application awaiting an id from the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub job_posting_id: JobPostingId,
    pub applicant_id: ApplicantId,
    pub experience: ExperienceHistory,
}

/// Repository record for a submitted application. `score` is written only by scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub job_posting_id: JobPostingId,
    pub applicant_id: ApplicantId,
    pub experience: ExperienceHistory,
    pub score: Option<f64>,
}

impl ApplicationRecord {
    pub fn score_status(&self) -> &'static str {
        if self.score.is_some() {
            "scored"
        } else {
            "pending"
        }
    }
}

/// Catalog entry for a skill. Rules and experiences refer to skills by name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
}
