//! Rule-based applicant scoring.
//!
//! Applications are scored against the global criteria plus the local criteria of their job
//! posting. Criteria and skill catalog changes flow through [`ScoreConsistencyMaintainer`] so
//! stored scores never drift from the criteria that currently apply.

pub mod consistency;
pub mod domain;
pub mod evaluation;
pub mod intake;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use consistency::{
    ApplicationFailure, ConsistencyError, ConsistencyEvent, ConsistencyReport, JobPostingFailure,
    RescoreReport, ScoreConsistencyMaintainer, DEFAULT_RESCORE_CONCURRENCY,
};
pub use domain::{
    ApplicantId, ApplicationId, ApplicationRecord, ApplicationSubmission, CriteriaDraft,
    CriteriaError, CriteriaId, CriteriaScope, CriteriaSet, CriteriaType, CriteriaUpdate,
    CriteriaView, Experience, ExperienceHistory, JobPostingId, NewApplication, NewCriteria, Rule,
    RulePruning, Skill, SkillId, PRESENT,
};
pub use evaluation::{
    evaluate_rule, experience_years, score_criteria, CriteriaScore, MonthYear, RuleScore,
    ScoreBreakdown, ScoringEngine, SkillExperience,
};
pub use intake::{IntakeError, IntakeGuard};
pub use memory::{
    MemoryApplicationRepository, MemoryCriteriaRepository, MemoryJobPostingRepository,
    MemorySkillRepository,
};
pub use repository::{
    ApplicationRepository, CriteriaRepository, JobPostingRepository, Repositories,
    RepositoryError, SkillRepository,
};
pub use router::{scoring_router, ApplicationView};
pub use service::{CriteriaChange, ScoringService, ScoringServiceError, SkillChange};
