//! Keeps stored scores and skill references consistent as criteria and the skill catalog change.
//!
//! Every mutation for an event is written before any rescoring reads criteria back, and each
//! record is re-fetched right before it is rewritten so concurrent edits to the same record are
//! not lost. Rescoring of a job posting fans out across its applications with a bounded
//! concurrency and isolates failures per application.
//!
//! When no criteria apply to a job posting, rescoring clears the stored score to `None`.
//!
//! A skill propagation that fails part way still rescores the job postings it already rewrote
//! before returning the error.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    ApplicationId, ApplicationRecord, CriteriaId, CriteriaScope, CriteriaSet, JobPostingId,
    RulePruning,
};
use super::evaluation::ScoringEngine;
use super::repository::{
    ApplicationRepository, CriteriaRepository, JobPostingRepository, Repositories,
    RepositoryError,
};

pub const DEFAULT_RESCORE_CONCURRENCY: usize = 8;

/// State transitions that require dependent data to be brought up to date.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsistencyEvent {
    CriteriaCreated {
        criteria_id: CriteriaId,
        scope: CriteriaScope,
    },
    CriteriaUpdated {
        criteria_id: CriteriaId,
        scope: CriteriaScope,
    },
    CriteriaDeleted {
        criteria_id: CriteriaId,
        scope: CriteriaScope,
    },
    SkillRenamed {
        from: String,
        to: String,
    },
    SkillDeleted {
        name: String,
    },
}

/// Error raised when a propagation step cannot read or write its records.
///
/// Propagation is idempotent, so the same event can be replayed after a failure.
#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("consistency maintenance failed: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationFailure {
    pub application_id: ApplicationId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPostingFailure {
    pub job_posting_id: JobPostingId,
    pub error: String,
}

/// Outcome of rescoring every application of one job posting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescoreReport {
    pub job_posting_id: JobPostingId,
    pub criteria_applied: usize,
    pub scored: usize,
    pub cleared: usize,
    pub failed: Vec<ApplicationFailure>,
}

/// Everything one event touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub criteria_rewritten: Vec<CriteriaId>,
    pub criteria_deleted: Vec<CriteriaId>,
    pub applications_rewritten: Vec<ApplicationId>,
    pub rescored: Vec<RescoreReport>,
    pub rescore_failures: Vec<JobPostingFailure>,
}

impl ConsistencyReport {
    pub fn failed_applications(&self) -> impl Iterator<Item = &ApplicationFailure> {
        self.rescored.iter().flat_map(|report| report.failed.iter())
    }

    pub fn is_clean(&self) -> bool {
        self.rescore_failures.is_empty() && self.failed_applications().next().is_none()
    }
}

#[derive(Debug, Default)]
struct RescoreTargets {
    every_job_posting: bool,
    job_postings: BTreeSet<JobPostingId>,
}

impl RescoreTargets {
    fn for_scope(scope: CriteriaScope) -> Self {
        let mut targets = Self::default();
        targets.include_scope(scope);
        targets
    }

    fn include_scope(&mut self, scope: CriteriaScope) {
        match scope {
            CriteriaScope::Global => self.every_job_posting = true,
            CriteriaScope::Local(id) => {
                self.job_postings.insert(id);
            }
        }
    }

    fn include_job_posting(&mut self, id: JobPostingId) {
        self.job_postings.insert(id);
    }

    fn is_empty(&self) -> bool {
        !self.every_job_posting && self.job_postings.is_empty()
    }
}

/// Reacts to criteria and skill events by rewriting rules and experiences and rescoring.
#[derive(Clone)]
pub struct ScoreConsistencyMaintainer {
    criteria: Arc<dyn CriteriaRepository>,
    applications: Arc<dyn ApplicationRepository>,
    job_postings: Arc<dyn JobPostingRepository>,
    engine: Arc<ScoringEngine>,
    concurrency: usize,
}

impl ScoreConsistencyMaintainer {
    pub fn new(repositories: &Repositories, engine: Arc<ScoringEngine>, concurrency: usize) -> Self {
        Self {
            criteria: repositories.criteria.clone(),
            applications: repositories.applications.clone(),
            job_postings: repositories.job_postings.clone(),
            engine,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn handle(
        &self,
        event: ConsistencyEvent,
    ) -> Result<ConsistencyReport, ConsistencyError> {
        match event {
            ConsistencyEvent::CriteriaCreated { criteria_id, scope }
            | ConsistencyEvent::CriteriaUpdated { criteria_id, scope }
            | ConsistencyEvent::CriteriaDeleted { criteria_id, scope } => {
                debug!(%criteria_id, ?scope, "criteria changed");
                self.on_criteria_changed(scope).await
            }
            ConsistencyEvent::SkillRenamed { from, to } => self.on_skill_renamed(&from, &to).await,
            ConsistencyEvent::SkillDeleted { name } => self.on_skill_deleted(&name).await,
        }
    }

    /// Rescores every application the criteria scope applies to.
    pub async fn on_criteria_changed(
        &self,
        scope: CriteriaScope,
    ) -> Result<ConsistencyReport, ConsistencyError> {
        let mut report = ConsistencyReport::default();
        self.rescore(RescoreTargets::for_scope(scope), &mut report)
            .await?;
        Ok(report)
    }

    /// Replaces `from` with `to` in every rule and experience that names it, then rescores.
    ///
    /// Job postings whose criteria already name `to` are rescored as well, which covers
    /// postings rewritten by an earlier interrupted pass.
    pub async fn on_skill_renamed(
        &self,
        from: &str,
        to: &str,
    ) -> Result<ConsistencyReport, ConsistencyError> {
        let mut report = ConsistencyReport::default();
        if from == to {
            return Ok(report);
        }
        let mut targets = RescoreTargets::default();
        let propagated = self
            .rewrite_skill_references(from, to, &mut targets, &mut report)
            .await;

        info!(
            from,
            to,
            criteria = report.criteria_rewritten.len(),
            applications = report.applications_rewritten.len(),
            complete = propagated.is_ok(),
            "skill rename propagated"
        );

        self.settle(propagated, targets, report).await
    }

    /// Drops rules naming `name`, deleting sets left without rules, then rescores.
    ///
    /// Application experiences keep the skill text as historical candidate input.
    pub async fn on_skill_deleted(&self, name: &str) -> Result<ConsistencyReport, ConsistencyError> {
        let mut report = ConsistencyReport::default();
        let mut targets = RescoreTargets::default();
        let propagated = self
            .prune_skill_rules(name, &mut targets, &mut report)
            .await;

        info!(
            skill = name,
            pruned = report.criteria_rewritten.len(),
            deleted = report.criteria_deleted.len(),
            complete = propagated.is_ok(),
            "skill deletion propagated"
        );

        self.settle(propagated, targets, report).await
    }

    async fn rewrite_skill_references(
        &self,
        from: &str,
        to: &str,
        targets: &mut RescoreTargets,
        report: &mut ConsistencyReport,
    ) -> Result<(), ConsistencyError> {
        for criteria_id in self.criteria.referencing_skill(to).await? {
            if let Some(criteria) = self.criteria.fetch(criteria_id).await? {
                targets.include_scope(criteria.scope());
            }
        }

        for criteria_id in self.criteria.referencing_skill(from).await? {
            let Some(mut criteria) = self.criteria.fetch(criteria_id).await? else {
                continue;
            };
            if criteria.rename_skill(from, to) {
                self.criteria.save(&criteria).await?;
                targets.include_scope(criteria.scope());
                report.criteria_rewritten.push(criteria_id);
            }
        }

        for application_id in self.applications.referencing_skill(from).await? {
            let Some(mut application) = self.applications.fetch(application_id).await? else {
                continue;
            };
            if application.experience.rename_skill(from, to) {
                self.applications
                    .save_experience(application_id, &application.experience)
                    .await?;
                targets.include_job_posting(application.job_posting_id);
                report.applications_rewritten.push(application_id);
            }
        }
        Ok(())
    }

    async fn prune_skill_rules(
        &self,
        name: &str,
        targets: &mut RescoreTargets,
        report: &mut ConsistencyReport,
    ) -> Result<(), ConsistencyError> {
        for criteria_id in self.criteria.referencing_skill(name).await? {
            let Some(mut criteria) = self.criteria.fetch(criteria_id).await? else {
                continue;
            };
            match criteria.remove_skill(name) {
                RulePruning::Unchanged => continue,
                RulePruning::Pruned => {
                    self.criteria.save(&criteria).await?;
                    report.criteria_rewritten.push(criteria_id);
                }
                RulePruning::Emptied => {
                    self.criteria.delete(criteria_id).await?;
                    report.criteria_deleted.push(criteria_id);
                }
            }
            targets.include_scope(criteria.scope());
        }
        Ok(())
    }

    /// Rescores whatever the propagation managed to rewrite, even when it stopped early,
    /// then surfaces the propagation error if there was one.
    async fn settle(
        &self,
        propagated: Result<(), ConsistencyError>,
        targets: RescoreTargets,
        mut report: ConsistencyReport,
    ) -> Result<ConsistencyReport, ConsistencyError> {
        match propagated {
            Ok(()) => {
                self.rescore(targets, &mut report).await?;
                Ok(report)
            }
            Err(error) => {
                warn!(%error, "propagation interrupted; rescoring records already rewritten");
                if let Err(rescore_error) = self.rescore(targets, &mut report).await {
                    warn!(error = %rescore_error, "rescore after interrupted propagation failed");
                }
                Err(error)
            }
        }
    }

    /// Recomputes and stores the score of every application for `job_posting_id`.
    pub async fn rescore_job_posting(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<RescoreReport, ConsistencyError> {
        let criteria = self.criteria.applicable_to(job_posting_id).await?;
        let applications = self.applications.for_job_posting(job_posting_id).await?;

        let outcomes: Vec<(ApplicationId, Result<Option<f64>, RepositoryError>)> =
            stream::iter(applications)
                .map(|application| self.rescore_application(application, &criteria))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut report = RescoreReport {
            job_posting_id,
            criteria_applied: criteria.len(),
            scored: 0,
            cleared: 0,
            failed: Vec::new(),
        };
        for (application_id, outcome) in outcomes {
            match outcome {
                Ok(Some(_)) => report.scored += 1,
                Ok(None) => report.cleared += 1,
                Err(error) => {
                    warn!(%application_id, %job_posting_id, %error, "failed to store rescored application");
                    report.failed.push(ApplicationFailure {
                        application_id,
                        error: error.to_string(),
                    });
                }
            }
        }
        report.failed.sort_by_key(|failure| failure.application_id);

        if let Err(error) = self
            .job_postings
            .record_machine_evaluated(job_posting_id, report.scored)
            .await
        {
            warn!(%job_posting_id, %error, "failed to record machine evaluated count");
        }

        info!(
            %job_posting_id,
            scored = report.scored,
            cleared = report.cleared,
            failed = report.failed.len(),
            "job posting rescored"
        );
        Ok(report)
    }

    async fn rescore_application(
        &self,
        application: ApplicationRecord,
        criteria: &[CriteriaSet],
    ) -> (ApplicationId, Result<Option<f64>, RepositoryError>) {
        let score = if criteria.is_empty() {
            None
        } else {
            Some(self.engine.evaluate_application(&application, criteria))
        };
        let outcome = self
            .applications
            .save_score(application.id, score)
            .await
            .map(|()| score);
        (application.id, outcome)
    }

    async fn rescore(
        &self,
        targets: RescoreTargets,
        report: &mut ConsistencyReport,
    ) -> Result<(), ConsistencyError> {
        if targets.is_empty() {
            return Ok(());
        }

        let mut job_postings = targets.job_postings;
        if targets.every_job_posting {
            job_postings.extend(self.applications.job_postings().await?);
        }

        for job_posting_id in job_postings {
            match self.rescore_job_posting(job_posting_id).await {
                Ok(rescored) => report.rescored.push(rescored),
                Err(error) => {
                    warn!(%job_posting_id, %error, "failed to rescore job posting");
                    report.rescore_failures.push(JobPostingFailure {
                        job_posting_id,
                        error: error.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
