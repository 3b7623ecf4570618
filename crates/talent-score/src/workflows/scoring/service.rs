use std::sync::Arc;

use tracing::{debug, info, warn};

use super::consistency::{
    ConsistencyError, ConsistencyEvent, ConsistencyReport, RescoreReport,
    ScoreConsistencyMaintainer,
};
use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationSubmission, CriteriaDraft, CriteriaError,
    CriteriaId, CriteriaSet, CriteriaUpdate, JobPostingId, Skill, SkillId,
};
use super::evaluation::{ScoreBreakdown, ScoringEngine};
use super::intake::{IntakeError, IntakeGuard};
use super::repository::{Repositories, RepositoryError};
use crate::config::ScoringConfig;

/// Scoring passes a new application gets while criteria keep changing underneath it.
const SCORE_ATTEMPTS: usize = 3;

/// Criteria write result together with the rescoring it triggered.
#[derive(Debug, Clone)]
pub struct CriteriaChange {
    pub criteria: CriteriaSet,
    pub consistency: ConsistencyReport,
}

/// Skill catalog write result together with the propagation it triggered.
#[derive(Debug, Clone)]
pub struct SkillChange {
    pub skill: Skill,
    pub consistency: ConsistencyReport,
}

/// Service composing intake, the scoring engine, repositories, and consistency maintenance.
pub struct ScoringService {
    repositories: Repositories,
    guard: IntakeGuard,
    engine: Arc<ScoringEngine>,
    maintainer: ScoreConsistencyMaintainer,
}

impl ScoringService {
    pub fn new(repositories: Repositories, config: &ScoringConfig) -> Self {
        Self::with_parts(
            repositories,
            IntakeGuard::new(),
            ScoringEngine::new(),
            config,
        )
    }

    pub fn with_parts(
        repositories: Repositories,
        guard: IntakeGuard,
        engine: ScoringEngine,
        config: &ScoringConfig,
    ) -> Self {
        let engine = Arc::new(engine);
        let maintainer =
            ScoreConsistencyMaintainer::new(&repositories, engine.clone(), config.rescore_concurrency);
        Self {
            repositories,
            guard,
            engine,
            maintainer,
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn maintainer(&self) -> &ScoreConsistencyMaintainer {
        &self.maintainer
    }

    /// Store a new application and score it against the criteria of its job posting.
    ///
    /// Scoring-stage failures never fail the submission; the application is returned unscored.
    pub async fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, ScoringServiceError> {
        let application = self.guard.admit(submission)?;
        let mut record = self.repositories.applications.insert(application).await?;

        match self.score_new_application(&record).await {
            Ok(score) => record.score = score,
            Err(error) => warn!(
                application_id = %record.id,
                job_posting_id = %record.job_posting_id,
                %error,
                "scoring failed; application stored without a score"
            ),
        }

        Ok(record)
    }

    /// Scores against the applicable criteria, then reads them back and recomputes if a
    /// concurrent criteria change landed in between.
    async fn score_new_application(
        &self,
        record: &ApplicationRecord,
    ) -> Result<Option<f64>, RepositoryError> {
        let mut criteria = self
            .repositories
            .criteria
            .applicable_to(record.job_posting_id)
            .await?;

        let mut attempt = 1;
        loop {
            let score = (!criteria.is_empty())
                .then(|| self.engine.evaluate_application(record, &criteria));
            self.repositories
                .applications
                .save_score(record.id, score)
                .await?;

            let current = self
                .repositories
                .criteria
                .applicable_to(record.job_posting_id)
                .await?;
            if current == criteria || attempt == SCORE_ATTEMPTS {
                return Ok(score);
            }
            debug!(
                application_id = %record.id,
                job_posting_id = %record.job_posting_id,
                attempt,
                "criteria changed while scoring; recomputing"
            );
            criteria = current;
            attempt += 1;
        }
    }

    pub async fn application(
        &self,
        id: ApplicationId,
    ) -> Result<ApplicationRecord, ScoringServiceError> {
        let record = self
            .repositories
            .applications
            .fetch(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Explains the stored application against the criteria that currently apply to it.
    pub async fn application_breakdown(
        &self,
        id: ApplicationId,
    ) -> Result<(ApplicationRecord, ScoreBreakdown), ScoringServiceError> {
        let record = self.application(id).await?;
        let criteria = self
            .repositories
            .criteria
            .applicable_to(record.job_posting_id)
            .await?;
        let breakdown = self
            .engine
            .breakdown(&record.experience.experiences, &criteria);
        Ok((record, breakdown))
    }

    pub async fn global_criteria(&self) -> Result<Vec<CriteriaSet>, ScoringServiceError> {
        Ok(self.repositories.criteria.global().await?)
    }

    pub async fn local_criteria(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<CriteriaSet>, ScoringServiceError> {
        Ok(self.repositories.criteria.local_to(job_posting_id).await?)
    }

    pub async fn create_criteria(
        &self,
        draft: CriteriaDraft,
    ) -> Result<CriteriaChange, ScoringServiceError> {
        let criteria = self
            .repositories
            .criteria
            .insert(draft.validate()?)
            .await?;
        info!(criteria_id = %criteria.id(), max_score = criteria.criteria_max_score(), "criteria created");

        let consistency = self
            .maintainer
            .handle(ConsistencyEvent::CriteriaCreated {
                criteria_id: criteria.id(),
                scope: criteria.scope(),
            })
            .await?;
        Ok(CriteriaChange {
            criteria,
            consistency,
        })
    }

    pub async fn update_criteria(
        &self,
        id: CriteriaId,
        update: CriteriaUpdate,
    ) -> Result<CriteriaChange, ScoringServiceError> {
        let mut criteria = self
            .repositories
            .criteria
            .fetch(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        criteria.apply(update)?;
        self.repositories.criteria.save(&criteria).await?;
        info!(criteria_id = %id, max_score = criteria.criteria_max_score(), "criteria updated");

        let consistency = self
            .maintainer
            .handle(ConsistencyEvent::CriteriaUpdated {
                criteria_id: id,
                scope: criteria.scope(),
            })
            .await?;
        Ok(CriteriaChange {
            criteria,
            consistency,
        })
    }

    pub async fn delete_criteria(
        &self,
        id: CriteriaId,
    ) -> Result<ConsistencyReport, ScoringServiceError> {
        let criteria = self
            .repositories
            .criteria
            .fetch(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        self.repositories.criteria.delete(id).await?;
        info!(criteria_id = %id, "criteria deleted");

        Ok(self
            .maintainer
            .handle(ConsistencyEvent::CriteriaDeleted {
                criteria_id: id,
                scope: criteria.scope(),
            })
            .await?)
    }

    pub async fn skills(&self) -> Result<Vec<Skill>, ScoringServiceError> {
        Ok(self.repositories.skills.list().await?)
    }

    pub async fn add_skill(&self, name: &str) -> Result<Skill, ScoringServiceError> {
        let name = skill_name(name)?;
        Ok(self.repositories.skills.insert(name).await?)
    }

    /// Renames a catalog skill after propagating the new name to rules and experiences.
    ///
    /// Propagation runs first so a failed attempt can be retried with the same call.
    pub async fn rename_skill(
        &self,
        id: SkillId,
        name: &str,
    ) -> Result<SkillChange, ScoringServiceError> {
        let name = skill_name(name)?;
        let skill = self
            .repositories
            .skills
            .fetch(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        if skill.name == name {
            return Ok(SkillChange {
                skill,
                consistency: ConsistencyReport::default(),
            });
        }
        if let Some(existing) = self.repositories.skills.find_by_name(name).await? {
            if existing.id != id {
                return Err(RepositoryError::Conflict.into());
            }
        }

        let consistency = self
            .maintainer
            .handle(ConsistencyEvent::SkillRenamed {
                from: skill.name.clone(),
                to: name.to_string(),
            })
            .await?;
        let skill = self.repositories.skills.rename(id, name).await?;
        Ok(SkillChange { skill, consistency })
    }

    /// Removes a catalog skill after pruning it from every criteria set.
    pub async fn delete_skill(&self, id: SkillId) -> Result<SkillChange, ScoringServiceError> {
        let skill = self
            .repositories
            .skills
            .fetch(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let consistency = self
            .maintainer
            .handle(ConsistencyEvent::SkillDeleted {
                name: skill.name.clone(),
            })
            .await?;
        self.repositories.skills.delete(id).await?;
        Ok(SkillChange { skill, consistency })
    }

    /// Manual recompute trigger for applications left unscored by a degraded submission.
    pub async fn rescore_job_posting(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<RescoreReport, ScoringServiceError> {
        Ok(self.maintainer.rescore_job_posting(job_posting_id).await?)
    }
}

fn skill_name(name: &str) -> Result<&str, ScoringServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ScoringServiceError::BlankSkillName);
    }
    Ok(trimmed)
}

/// Error raised by the scoring service.
#[derive(Debug, thiserror::Error)]
pub enum ScoringServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Criteria(#[from] CriteriaError),
    #[error("skill name is required")]
    BlankSkillName,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}
