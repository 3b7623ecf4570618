use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::config::ScoringConfig;
use crate::workflows::scoring::domain::{
    ApplicantId, ApplicationId, ApplicationRecord, ApplicationSubmission, CriteriaDraft,
    CriteriaId, CriteriaSet, CriteriaType, Experience, ExperienceHistory, JobPostingId,
    NewApplication, NewCriteria, Rule,
};
use crate::workflows::scoring::evaluation::{MonthYear, ScoringEngine};
use crate::workflows::scoring::intake::IntakeGuard;
use crate::workflows::scoring::memory::{
    MemoryApplicationRepository, MemoryCriteriaRepository, MemoryJobPostingRepository,
    MemorySkillRepository,
};
use crate::workflows::scoring::repository::{
    ApplicationRepository, CriteriaRepository, Repositories, RepositoryError,
};
use crate::workflows::scoring::service::ScoringService;

pub(super) fn reference_month() -> MonthYear {
    MonthYear::new(2025, 1).expect("valid month")
}

pub(super) fn engine() -> ScoringEngine {
    ScoringEngine::as_of(reference_month())
}

pub(super) fn build_service() -> (ScoringService, Repositories) {
    let repositories = Repositories::in_memory();
    (build_service_with(repositories.clone()), repositories)
}

pub(super) fn build_service_with(repositories: Repositories) -> ScoringService {
    ScoringService::with_parts(
        repositories,
        IntakeGuard::as_of(reference_month()),
        engine(),
        &ScoringConfig::default(),
    )
}

pub(super) fn repositories_with(
    criteria: Arc<dyn CriteriaRepository>,
    applications: Arc<dyn ApplicationRepository>,
) -> Repositories {
    Repositories {
        criteria,
        applications,
        job_postings: Arc::new(MemoryJobPostingRepository::default()),
        skills: Arc::new(MemorySkillRepository::default()),
    }
}

pub(super) fn experience(skills: &[&str], start: &str, end: Option<&str>) -> Experience {
    Experience {
        title: "Software Engineer".to_string(),
        company: "Initech".to_string(),
        start_date: start.to_string(),
        end_date: end.map(str::to_string),
        skills: skills.iter().map(|skill| skill.to_string()).collect(),
        description: "Built and ran production services".to_string(),
    }
}

pub(super) fn submission(
    job_posting_id: u64,
    applicant_id: u64,
    work_experience: Vec<Experience>,
) -> ApplicationSubmission {
    ApplicationSubmission {
        job_posting_id: JobPostingId(job_posting_id),
        applicant_id: ApplicantId(applicant_id),
        work_experience,
    }
}

/// React from 01/2022 to 01/2024 (two years) and Git from 01/2022 to 01/2025 (three years).
pub(super) fn react_and_git_submission(job_posting_id: u64, applicant_id: u64) -> ApplicationSubmission {
    submission(
        job_posting_id,
        applicant_id,
        vec![
            experience(&["react"], "01/2022", Some("01/2024")),
            experience(&["Git"], "01/2022", None),
        ],
    )
}

pub(super) fn local_draft(job_posting_id: u64, name: &str, rules: Vec<Rule>) -> CriteriaDraft {
    CriteriaDraft {
        name: name.to_string(),
        criteria_type: CriteriaType::Local,
        job_posting_id: Some(JobPostingId(job_posting_id)),
        rules,
    }
}

pub(super) fn global_draft(name: &str, rules: Vec<Rule>) -> CriteriaDraft {
    CriteriaDraft {
        name: name.to_string(),
        criteria_type: CriteriaType::Global,
        job_posting_id: None,
        rules,
    }
}

pub(super) fn react_rule() -> Rule {
    Rule::new("React", 10.0, 100.0)
}

pub(super) fn git_rule() -> Rule {
    Rule::new("Git", 1.0, 5.0)
}

/// Asserts every stored score on the given job postings matches a fresh evaluation
/// against the criteria currently applicable to it.
pub(super) async fn assert_scores_current(
    repositories: &Repositories,
    job_postings: impl IntoIterator<Item = JobPostingId>,
) {
    let engine = engine();
    for job_posting_id in job_postings {
        let criteria = repositories
            .criteria
            .applicable_to(job_posting_id)
            .await
            .expect("criteria");
        for application in repositories
            .applications
            .for_job_posting(job_posting_id)
            .await
            .expect("applications")
        {
            let fresh = if criteria.is_empty() {
                None
            } else {
                Some(engine.evaluate_application(&application, &criteria))
            };
            assert_eq!(
                application.score, fresh,
                "application {} on job posting {job_posting_id}",
                application.id
            );
        }
    }
}

/// Counts down successful writes and reports `true` once the armed write should fail.
fn write_fails(countdown: &Mutex<Option<usize>>) -> bool {
    let mut countdown = countdown.lock().expect("countdown poisoned");
    match *countdown {
        Some(0) => {
            *countdown = None;
            true
        }
        Some(remaining) => {
            *countdown = Some(remaining - 1);
            false
        }
        None => false,
    }
}

pub(super) async fn stored_score(repositories: &Repositories, id: ApplicationId) -> Option<f64> {
    repositories
        .applications
        .fetch(id)
        .await
        .expect("fetch application")
        .expect("application exists")
        .score
}

/// Application store that refuses score writes for selected applications and can drop
/// one experience write.
#[derive(Default)]
pub(super) struct FlakyApplicationRepository {
    inner: MemoryApplicationRepository,
    failing: Mutex<BTreeSet<ApplicationId>>,
    experience_writes_before_failure: Mutex<Option<usize>>,
}

impl FlakyApplicationRepository {
    /// Lets `successes` experience writes through, then fails the next one.
    pub(super) fn fail_experience_write_after(&self, successes: usize) {
        *self
            .experience_writes_before_failure
            .lock()
            .expect("countdown poisoned") = Some(successes);
    }

    pub(super) fn fail_scores_for(&self, ids: impl IntoIterator<Item = ApplicationId>) {
        self.failing
            .lock()
            .expect("failing set poisoned")
            .extend(ids);
    }

    fn rejects(&self, id: ApplicationId) -> bool {
        self.failing
            .lock()
            .expect("failing set poisoned")
            .contains(&id)
    }
}

#[async_trait]
impl ApplicationRepository for FlakyApplicationRepository {
    async fn insert(
        &self,
        application: NewApplication,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(application).await
    }

    async fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id).await
    }

    async fn for_job_posting(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.for_job_posting(job_posting_id).await
    }

    async fn job_postings(&self) -> Result<Vec<JobPostingId>, RepositoryError> {
        self.inner.job_postings().await
    }

    async fn referencing_skill(&self, skill: &str) -> Result<Vec<ApplicationId>, RepositoryError> {
        self.inner.referencing_skill(skill).await
    }

    async fn save_score(
        &self,
        id: ApplicationId,
        score: Option<f64>,
    ) -> Result<(), RepositoryError> {
        if self.rejects(id) {
            return Err(RepositoryError::Unavailable("score column locked".to_string()));
        }
        self.inner.save_score(id, score).await
    }

    async fn save_experience(
        &self,
        id: ApplicationId,
        experience: &ExperienceHistory,
    ) -> Result<(), RepositoryError> {
        if write_fails(&self.experience_writes_before_failure) {
            return Err(RepositoryError::Unavailable("transient".to_string()));
        }
        self.inner.save_experience(id, experience).await
    }
}

/// Criteria store whose lookups can be taken offline, whose writes can fail once, and whose
/// next applicability lookup can return an older snapshot.
#[derive(Default)]
pub(super) struct SwitchableCriteriaRepository {
    inner: MemoryCriteriaRepository,
    offline: AtomicBool,
    writes_before_failure: Mutex<Option<usize>>,
    stale_applicable: Mutex<Option<Vec<CriteriaSet>>>,
}

impl SwitchableCriteriaRepository {
    /// Lets `successes` saves or deletes through, then fails the next one.
    pub(super) fn fail_write_after(&self, successes: usize) {
        *self.writes_before_failure.lock().expect("countdown poisoned") = Some(successes);
    }

    /// Answers the next `applicable_to` lookup with `snapshot` instead of the stored sets.
    pub(super) fn serve_stale_applicable_once(&self, snapshot: Vec<CriteriaSet>) {
        *self.stale_applicable.lock().expect("snapshot poisoned") = Some(snapshot);
    }

    pub(super) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("criteria store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CriteriaRepository for SwitchableCriteriaRepository {
    async fn insert(&self, criteria: NewCriteria) -> Result<CriteriaSet, RepositoryError> {
        self.inner.insert(criteria).await
    }

    async fn fetch(&self, id: CriteriaId) -> Result<Option<CriteriaSet>, RepositoryError> {
        self.inner.fetch(id).await
    }

    async fn save(&self, criteria: &CriteriaSet) -> Result<(), RepositoryError> {
        if write_fails(&self.writes_before_failure) {
            return Err(RepositoryError::Unavailable("transient".to_string()));
        }
        self.inner.save(criteria).await
    }

    async fn delete(&self, id: CriteriaId) -> Result<bool, RepositoryError> {
        if write_fails(&self.writes_before_failure) {
            return Err(RepositoryError::Unavailable("transient".to_string()));
        }
        self.inner.delete(id).await
    }

    async fn applicable_to(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<CriteriaSet>, RepositoryError> {
        self.check()?;
        if let Some(snapshot) = self.stale_applicable.lock().expect("snapshot poisoned").take() {
            return Ok(snapshot);
        }
        self.inner.applicable_to(job_posting_id).await
    }

    async fn global(&self) -> Result<Vec<CriteriaSet>, RepositoryError> {
        self.check()?;
        self.inner.global().await
    }

    async fn local_to(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<CriteriaSet>, RepositoryError> {
        self.check()?;
        self.inner.local_to(job_posting_id).await
    }

    async fn referencing_skill(&self, skill: &str) -> Result<Vec<CriteriaId>, RepositoryError> {
        self.check()?;
        self.inner.referencing_skill(skill).await
    }
}

pub(super) struct UnavailableApplicationRepository;

#[async_trait]
impl ApplicationRepository for UnavailableApplicationRepository {
    async fn insert(
        &self,
        _application: NewApplication,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn fetch(&self, _id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn for_job_posting(
        &self,
        _job_posting_id: JobPostingId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn job_postings(&self) -> Result<Vec<JobPostingId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn referencing_skill(&self, _skill: &str) -> Result<Vec<ApplicationId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn save_score(
        &self,
        _id: ApplicationId,
        _score: Option<f64>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn save_experience(
        &self,
        _id: ApplicationId,
        _experience: &ExperienceHistory,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
