use std::sync::Arc;

use super::common::*;
use crate::workflows::scoring::consistency::{ConsistencyEvent, ScoreConsistencyMaintainer};
use crate::workflows::scoring::domain::{CriteriaScope, JobPostingId, Rule};
use crate::workflows::scoring::memory::{MemoryApplicationRepository, MemoryCriteriaRepository};
use crate::workflows::scoring::repository::{
    ApplicationRepository, CriteriaRepository, JobPostingRepository, Repositories,
};

fn maintainer(repositories: &Repositories, concurrency: usize) -> ScoreConsistencyMaintainer {
    ScoreConsistencyMaintainer::new(repositories, Arc::new(engine()), concurrency)
}

#[tokio::test]
async fn rescore_isolates_failures_per_application() {
    let applications = Arc::new(FlakyApplicationRepository::default());
    let repositories = repositories_with(
        Arc::new(MemoryCriteriaRepository::default()),
        applications.clone(),
    );
    let service = build_service_with(repositories.clone());
    service
        .create_criteria(local_draft(1, "Frontend", vec![react_rule()]))
        .await
        .expect("criteria");

    let mut ids = Vec::new();
    for applicant in 1..=6 {
        let record = service
            .submit(react_and_git_submission(1, applicant))
            .await
            .expect("submission");
        ids.push(record.id);
    }
    applications.fail_scores_for([ids[1], ids[4]]);

    let report = maintainer(&repositories, 2)
        .rescore_job_posting(JobPostingId(1))
        .await
        .expect("rescore completes");

    assert_eq!(report.scored, 4);
    let failed: Vec<_> = report.failed.iter().map(|failure| failure.application_id).collect();
    assert_eq!(failed, vec![ids[1], ids[4]]);
    assert!(report.failed[0].error.contains("score column locked"));
    assert_eq!(
        repositories
            .job_postings
            .machine_evaluated(JobPostingId(1))
            .await
            .expect("tally"),
        Some(4)
    );
}

#[tokio::test]
async fn replaying_a_skill_rename_is_idempotent() {
    let (service, repositories) = build_service();
    service
        .create_criteria(local_draft(1, "Frontend", vec![react_rule(), git_rule()]))
        .await
        .expect("criteria");
    let record = service
        .submit(submission(
            1,
            10,
            vec![experience(&["React", "Git"], "01/2022", Some("01/2024"))],
        ))
        .await
        .expect("submission");

    let maintainer = maintainer(&repositories, 4);
    let event = ConsistencyEvent::SkillRenamed {
        from: "React".to_string(),
        to: "ReactJS".to_string(),
    };
    let first = maintainer.handle(event.clone()).await.expect("first pass");
    let second = maintainer.handle(event).await.expect("replay");

    assert_eq!(first.criteria_rewritten.len(), 1);
    assert_eq!(first.applications_rewritten, vec![record.id]);
    assert!(second.criteria_rewritten.is_empty());
    assert!(second.applications_rewritten.is_empty());
    assert!(second.is_clean());

    let stored = repositories
        .applications
        .fetch(record.id)
        .await
        .expect("fetch")
        .expect("exists");
    assert_eq!(
        stored.experience.experiences[0].skills,
        vec!["ReactJS".to_string(), "Git".to_string()]
    );
    assert_eq!(stored.score, Some(22.0));
}

#[tokio::test]
async fn rename_only_touches_exact_skill_text() {
    let (service, repositories) = build_service();
    let criteria = service
        .create_criteria(local_draft(1, "Frontend", vec![react_rule()]))
        .await
        .expect("criteria");
    let record = service
        .submit(submission(
            1,
            10,
            vec![experience(&["react"], "01/2022", Some("01/2024"))],
        ))
        .await
        .expect("submission");
    assert_eq!(record.score, Some(20.0));

    let report = maintainer(&repositories, 4)
        .on_skill_renamed("React", "React.js")
        .await
        .expect("rename");

    assert_eq!(report.criteria_rewritten, vec![criteria.criteria.id()]);
    assert!(report.applications_rewritten.is_empty());
    assert_eq!(stored_score(&repositories, record.id).await, Some(0.0));
}

#[tokio::test]
async fn skill_deletion_keeps_candidate_history() {
    let (service, repositories) = build_service();
    service
        .create_criteria(global_draft("Tooling", vec![git_rule()]))
        .await
        .expect("criteria");
    let record = service
        .submit(react_and_git_submission(1, 10))
        .await
        .expect("submission");
    assert_eq!(record.score, Some(3.0));

    let report = maintainer(&repositories, 4)
        .on_skill_deleted("Git")
        .await
        .expect("delete");

    assert_eq!(report.criteria_deleted.len(), 1);
    assert!(report.applications_rewritten.is_empty());
    assert_eq!(report.rescored[0].cleared, 1);
    assert_eq!(stored_score(&repositories, record.id).await, None);
    let stored = repositories
        .applications
        .fetch(record.id)
        .await
        .expect("fetch")
        .expect("exists");
    assert_eq!(stored.experience.experiences[1].skills, vec!["Git"]);
}

#[tokio::test]
async fn single_worker_rescore_still_covers_every_application() {
    let (service, repositories) = build_service();
    for applicant in 1..=12 {
        service
            .submit(react_and_git_submission(3, applicant))
            .await
            .expect("submission");
    }
    repositories
        .criteria
        .insert(
            local_draft(3, "Frontend", vec![react_rule()])
                .validate()
                .expect("valid draft"),
        )
        .await
        .expect("criteria stored without events");

    let report = maintainer(&repositories, 1)
        .on_criteria_changed(CriteriaScope::Local(JobPostingId(3)))
        .await
        .expect("rescore");

    assert_eq!(report.rescored.len(), 1);
    assert_eq!(report.rescored[0].scored, 12);
    for application in repositories
        .applications
        .for_job_posting(JobPostingId(3))
        .await
        .expect("applications")
    {
        assert_eq!(application.score, Some(20.0));
    }
}

#[tokio::test]
async fn unrelated_postings_are_not_rescored_by_local_changes() {
    let (service, repositories) = build_service();
    service
        .submit(react_and_git_submission(1, 10))
        .await
        .expect("first posting");
    service
        .submit(react_and_git_submission(2, 10))
        .await
        .expect("second posting");

    let report = maintainer(&repositories, 4)
        .on_criteria_changed(CriteriaScope::Local(JobPostingId(2)))
        .await
        .expect("rescore");

    let postings: Vec<_> = report
        .rescored
        .iter()
        .map(|rescored| rescored.job_posting_id)
        .collect();
    assert_eq!(postings, vec![JobPostingId(2)]);
    assert!(report.is_clean());
}

#[tokio::test]
async fn rename_retry_after_failed_experience_write_leaves_scores_current() {
    let applications = Arc::new(FlakyApplicationRepository::default());
    let repositories = repositories_with(
        Arc::new(MemoryCriteriaRepository::default()),
        applications.clone(),
    );
    let service = build_service_with(repositories.clone());
    let js = service.add_skill("JS").await.expect("skill added");
    service
        .create_criteria(local_draft(1, "Frontend", vec![Rule::new("JS", 10.0, 100.0)]))
        .await
        .expect("criteria");
    let veteran = service
        .submit(submission(
            1,
            10,
            vec![experience(&["JavaScript"], "01/2022", Some("01/2024"))],
        ))
        .await
        .expect("first posting submission");
    assert_eq!(veteran.score, Some(0.0));
    service
        .submit(submission(
            2,
            11,
            vec![experience(&["JS"], "01/2022", Some("01/2024"))],
        ))
        .await
        .expect("second posting submission");

    applications.fail_experience_write_after(0);
    let err = service
        .rename_skill(js.id, "JavaScript")
        .await
        .expect_err("experience write fails");
    assert!(err.to_string().contains("transient"));
    assert_eq!(stored_score(&repositories, veteran.id).await, Some(20.0));

    let change = service
        .rename_skill(js.id, "JavaScript")
        .await
        .expect("retry succeeds");
    assert!(change.consistency.criteria_rewritten.is_empty());
    assert_eq!(change.consistency.applications_rewritten.len(), 1);
    let postings: Vec<_> = change
        .consistency
        .rescored
        .iter()
        .map(|rescored| rescored.job_posting_id)
        .collect();
    assert_eq!(postings, vec![JobPostingId(1), JobPostingId(2)]);

    assert_eq!(stored_score(&repositories, veteran.id).await, Some(20.0));
    assert_scores_current(&repositories, [JobPostingId(1), JobPostingId(2)]).await;
}

#[tokio::test]
async fn delete_retry_after_failed_criteria_write_leaves_scores_current() {
    let criteria = Arc::new(SwitchableCriteriaRepository::default());
    let repositories = repositories_with(
        criteria.clone(),
        Arc::new(MemoryApplicationRepository::default()),
    );
    let service = build_service_with(repositories.clone());
    let git = service.add_skill("Git").await.expect("skill added");
    service
        .create_criteria(local_draft(1, "Frontend", vec![react_rule(), git_rule()]))
        .await
        .expect("first posting criteria");
    service
        .create_criteria(local_draft(2, "Frontend", vec![git_rule(), react_rule()]))
        .await
        .expect("second posting criteria");
    let first = service
        .submit(react_and_git_submission(1, 10))
        .await
        .expect("first posting submission");
    let second = service
        .submit(react_and_git_submission(2, 10))
        .await
        .expect("second posting submission");
    assert_eq!(first.score, Some(23.0));
    assert_eq!(second.score, Some(23.0));

    criteria.fail_write_after(1);
    service
        .delete_skill(git.id)
        .await
        .expect_err("second criteria write fails");
    assert_eq!(stored_score(&repositories, first.id).await, Some(20.0));
    assert_eq!(stored_score(&repositories, second.id).await, Some(23.0));

    let change = service.delete_skill(git.id).await.expect("retry succeeds");
    assert_eq!(change.consistency.criteria_rewritten.len(), 1);
    assert!(service.skills().await.expect("skills").is_empty());

    assert_eq!(stored_score(&repositories, second.id).await, Some(20.0));
    assert_scores_current(&repositories, [JobPostingId(1), JobPostingId(2)]).await;
}
