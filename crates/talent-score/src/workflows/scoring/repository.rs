use std::sync::Arc;

use async_trait::async_trait;

use super::domain::{
    ApplicationId, ApplicationRecord, CriteriaId, CriteriaSet, ExperienceHistory, JobPostingId,
    NewApplication, NewCriteria, Skill, SkillId,
};

/// Criteria storage. Skill references are matched on the exact stored text.
#[async_trait]
pub trait CriteriaRepository: Send + Sync {
    async fn insert(&self, criteria: NewCriteria) -> Result<CriteriaSet, RepositoryError>;

    async fn fetch(&self, id: CriteriaId) -> Result<Option<CriteriaSet>, RepositoryError>;

    /// Overwrites an existing set; `NotFound` when it has been deleted.
    async fn save(&self, criteria: &CriteriaSet) -> Result<(), RepositoryError>;

    async fn delete(&self, id: CriteriaId) -> Result<bool, RepositoryError>;

    /// Global criteria plus the local criteria of `job_posting_id`.
    async fn applicable_to(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<CriteriaSet>, RepositoryError>;

    async fn global(&self) -> Result<Vec<CriteriaSet>, RepositoryError>;

    async fn local_to(&self, job_posting_id: JobPostingId)
        -> Result<Vec<CriteriaSet>, RepositoryError>;

    async fn referencing_skill(&self, skill: &str) -> Result<Vec<CriteriaId>, RepositoryError>;
}

/// Application storage. Score and experience writes are targeted so they never clobber each other.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// `Conflict` when the applicant already applied to the job posting.
    async fn insert(&self, application: NewApplication)
        -> Result<ApplicationRecord, RepositoryError>;

    async fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;

    async fn for_job_posting(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;

    /// Every job posting with at least one application.
    async fn job_postings(&self) -> Result<Vec<JobPostingId>, RepositoryError>;

    async fn referencing_skill(&self, skill: &str) -> Result<Vec<ApplicationId>, RepositoryError>;

    async fn save_score(&self, id: ApplicationId, score: Option<f64>)
        -> Result<(), RepositoryError>;

    async fn save_experience(
        &self,
        id: ApplicationId,
        experience: &ExperienceHistory,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait JobPostingRepository: Send + Sync {
    async fn record_machine_evaluated(
        &self,
        job_posting_id: JobPostingId,
        count: usize,
    ) -> Result<(), RepositoryError>;

    async fn machine_evaluated(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Option<usize>, RepositoryError>;
}

/// Skill catalog with unique names.
#[async_trait]
pub trait SkillRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Skill>, RepositoryError>;

    async fn fetch(&self, id: SkillId) -> Result<Option<Skill>, RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Skill>, RepositoryError>;

    async fn insert(&self, name: &str) -> Result<Skill, RepositoryError>;

    async fn rename(&self, id: SkillId, name: &str) -> Result<Skill, RepositoryError>;

    async fn delete(&self, id: SkillId) -> Result<Option<Skill>, RepositoryError>;
}

/// Handles to every store the scoring workflow reads or writes.
#[derive(Clone)]
pub struct Repositories {
    pub criteria: Arc<dyn CriteriaRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub job_postings: Arc<dyn JobPostingRepository>,
    pub skills: Arc<dyn SkillRepository>,
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repositories_are_object_safe() {
        fn _criteria(_: Arc<dyn CriteriaRepository>) {}
        fn _applications(_: Arc<dyn ApplicationRepository>) {}
        fn _job_postings(_: Arc<dyn JobPostingRepository>) {}
        fn _skills(_: Arc<dyn SkillRepository>) {}
    }
}
