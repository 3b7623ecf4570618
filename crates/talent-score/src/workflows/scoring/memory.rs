//! In-memory stores backing the demo server, the CLI, and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::domain::{
    ApplicationId, ApplicationRecord, CriteriaId, CriteriaScope, CriteriaSet, ExperienceHistory,
    JobPostingId, NewApplication, NewCriteria, Skill, SkillId,
};
use super::repository::{
    ApplicationRepository, CriteriaRepository, JobPostingRepository, Repositories,
    RepositoryError, SkillRepository,
};

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            criteria: Arc::new(MemoryCriteriaRepository::default()),
            applications: Arc::new(MemoryApplicationRepository::default()),
            job_postings: Arc::new(MemoryJobPostingRepository::default()),
            skills: Arc::new(MemorySkillRepository::default()),
        }
    }
}

fn next(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::Relaxed) + 1
}

#[derive(Default)]
pub struct MemoryCriteriaRepository {
    sequence: AtomicU64,
    records: RwLock<BTreeMap<CriteriaId, CriteriaSet>>,
}

#[async_trait]
impl CriteriaRepository for MemoryCriteriaRepository {
    async fn insert(&self, criteria: NewCriteria) -> Result<CriteriaSet, RepositoryError> {
        let id = CriteriaId(next(&self.sequence));
        let criteria = criteria.assign(id);
        self.records.write().await.insert(id, criteria.clone());
        Ok(criteria)
    }

    async fn fetch(&self, id: CriteriaId) -> Result<Option<CriteriaSet>, RepositoryError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save(&self, criteria: &CriteriaSet) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        match records.get_mut(&criteria.id()) {
            Some(slot) => {
                *slot = criteria.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete(&self, id: CriteriaId) -> Result<bool, RepositoryError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn applicable_to(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<CriteriaSet>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|criteria| criteria.scope().applies_to(job_posting_id))
            .cloned()
            .collect())
    }

    async fn global(&self) -> Result<Vec<CriteriaSet>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|criteria| criteria.scope() == CriteriaScope::Global)
            .cloned()
            .collect())
    }

    async fn local_to(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<CriteriaSet>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|criteria| criteria.scope() == CriteriaScope::Local(job_posting_id))
            .cloned()
            .collect())
    }

    async fn referencing_skill(&self, skill: &str) -> Result<Vec<CriteriaId>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|criteria| criteria.references_skill(skill))
            .map(CriteriaSet::id)
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryApplicationRepository {
    sequence: AtomicU64,
    records: RwLock<BTreeMap<ApplicationId, ApplicationRecord>>,
}

#[async_trait]
impl ApplicationRepository for MemoryApplicationRepository {
    async fn insert(
        &self,
        application: NewApplication,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut records = self.records.write().await;
        let duplicate = records.values().any(|record| {
            record.job_posting_id == application.job_posting_id
                && record.applicant_id == application.applicant_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let record = ApplicationRecord {
            id: ApplicationId(next(&self.sequence)),
            job_posting_id: application.job_posting_id,
            applicant_id: application.applicant_id,
            experience: application.experience,
            score: None,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn for_job_posting(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record.job_posting_id == job_posting_id)
            .cloned()
            .collect())
    }

    async fn job_postings(&self) -> Result<Vec<JobPostingId>, RepositoryError> {
        let records = self.records.read().await;
        let ids: BTreeSet<JobPostingId> = records.values().map(|record| record.job_posting_id).collect();
        Ok(ids.into_iter().collect())
    }

    async fn referencing_skill(&self, skill: &str) -> Result<Vec<ApplicationId>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record.experience.references_skill(skill))
            .map(|record| record.id)
            .collect())
    }

    async fn save_score(
        &self,
        id: ApplicationId,
        score: Option<f64>,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.score = score;
        Ok(())
    }

    async fn save_experience(
        &self,
        id: ApplicationId,
        experience: &ExperienceHistory,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.experience = experience.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJobPostingRepository {
    machine_evaluated: RwLock<BTreeMap<JobPostingId, usize>>,
}

#[async_trait]
impl JobPostingRepository for MemoryJobPostingRepository {
    async fn record_machine_evaluated(
        &self,
        job_posting_id: JobPostingId,
        count: usize,
    ) -> Result<(), RepositoryError> {
        self.machine_evaluated
            .write()
            .await
            .insert(job_posting_id, count);
        Ok(())
    }

    async fn machine_evaluated(
        &self,
        job_posting_id: JobPostingId,
    ) -> Result<Option<usize>, RepositoryError> {
        Ok(self
            .machine_evaluated
            .read()
            .await
            .get(&job_posting_id)
            .copied())
    }
}

#[derive(Default)]
pub struct MemorySkillRepository {
    sequence: AtomicU64,
    records: RwLock<BTreeMap<SkillId, Skill>>,
}

#[async_trait]
impl SkillRepository for MemorySkillRepository {
    async fn list(&self) -> Result<Vec<Skill>, RepositoryError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn fetch(&self, id: SkillId) -> Result<Option<Skill>, RepositoryError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Skill>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.values().find(|skill| skill.name == name).cloned())
    }

    async fn insert(&self, name: &str) -> Result<Skill, RepositoryError> {
        let mut records = self.records.write().await;
        if records.values().any(|skill| skill.name == name) {
            return Err(RepositoryError::Conflict);
        }
        let skill = Skill {
            id: SkillId(next(&self.sequence)),
            name: name.to_string(),
        };
        records.insert(skill.id, skill.clone());
        Ok(skill)
    }

    async fn rename(&self, id: SkillId, name: &str) -> Result<Skill, RepositoryError> {
        let mut records = self.records.write().await;
        if records
            .values()
            .any(|skill| skill.id != id && skill.name == name)
        {
            return Err(RepositoryError::Conflict);
        }
        let skill = records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        skill.name = name.to_string();
        Ok(skill.clone())
    }

    async fn delete(&self, id: SkillId) -> Result<Option<Skill>, RepositoryError> {
        Ok(self.records.write().await.remove(&id))
    }
}
