use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::consistency::ConsistencyReport;
use super::domain::{
    ApplicantId, ApplicationId, ApplicationRecord, ApplicationSubmission, CriteriaDraft,
    CriteriaId, CriteriaSet, CriteriaType, CriteriaUpdate, CriteriaView, ExperienceHistory,
    JobPostingId, Rule, SkillId,
};
use super::evaluation::ScoreBreakdown;
use super::repository::RepositoryError;
use super::service::{CriteriaChange, ScoringService, ScoringServiceError};

/// Router builder exposing submission, criteria, skill, and rescore endpoints.
pub fn scoring_router(service: Arc<ScoringService>) -> Router {
    Router::new()
        .route("/api/v1/applications", post(submit_handler))
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler),
        )
        .route(
            "/api/v1/criteria",
            get(global_criteria_handler).post(create_criteria_handler),
        )
        .route(
            "/api/v1/criteria/:criteria_id",
            put(update_criteria_handler).delete(delete_criteria_handler),
        )
        .route(
            "/api/v1/job-postings/:job_posting_id/criteria",
            get(local_criteria_handler).post(create_local_criteria_handler),
        )
        .route(
            "/api/v1/job-postings/:job_posting_id/rescore",
            post(rescore_handler),
        )
        .route("/api/v1/skills", get(skills_handler).post(add_skill_handler))
        .route(
            "/api/v1/skills/:skill_id",
            put(rename_skill_handler).delete(delete_skill_handler),
        )
        .with_state(service)
}

/// Summary returned for a stored application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub job_posting_id: JobPostingId,
    pub applicant_id: ApplicantId,
    pub status: &'static str,
    pub score: Option<f64>,
    pub experience: ExperienceHistory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl ApplicationView {
    fn new(record: ApplicationRecord, breakdown: Option<ScoreBreakdown>) -> Self {
        Self {
            application_id: record.id,
            job_posting_id: record.job_posting_id,
            applicant_id: record.applicant_id,
            status: record.score_status(),
            score: record.score,
            experience: record.experience,
            breakdown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CriteriaChangeView {
    criteria: CriteriaView,
    consistency: ConsistencyReport,
}

impl From<CriteriaChange> for CriteriaChangeView {
    fn from(change: CriteriaChange) -> Self {
        Self {
            criteria: change.criteria.view(),
            consistency: change.consistency,
        }
    }
}

/// Body for criteria created under a job posting path.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalCriteriaRequest {
    pub name: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillRequest {
    pub name: String,
}

fn criteria_views(criteria: Vec<CriteriaSet>) -> Vec<CriteriaView> {
    criteria.iter().map(CriteriaSet::view).collect()
}

pub(crate) async fn submit_handler(
    State(service): State<Arc<ScoringService>>,
    Json(submission): Json<ApplicationSubmission>,
) -> Response {
    match service.submit(submission).await {
        Ok(record) => (
            StatusCode::ACCEPTED,
            Json(ApplicationView::new(record, None)),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn application_handler(
    State(service): State<Arc<ScoringService>>,
    Path(application_id): Path<u64>,
) -> Response {
    match service
        .application_breakdown(ApplicationId(application_id))
        .await
    {
        Ok((record, breakdown)) => {
            Json(ApplicationView::new(record, Some(breakdown))).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn global_criteria_handler(
    State(service): State<Arc<ScoringService>>,
) -> Response {
    match service.global_criteria().await {
        Ok(criteria) => Json(criteria_views(criteria)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn create_criteria_handler(
    State(service): State<Arc<ScoringService>>,
    Json(draft): Json<CriteriaDraft>,
) -> Response {
    match service.create_criteria(draft).await {
        Ok(change) => (StatusCode::CREATED, Json(CriteriaChangeView::from(change))).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn update_criteria_handler(
    State(service): State<Arc<ScoringService>>,
    Path(criteria_id): Path<u64>,
    Json(update): Json<CriteriaUpdate>,
) -> Response {
    match service
        .update_criteria(CriteriaId(criteria_id), update)
        .await
    {
        Ok(change) => Json(CriteriaChangeView::from(change)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn delete_criteria_handler(
    State(service): State<Arc<ScoringService>>,
    Path(criteria_id): Path<u64>,
) -> Response {
    match service.delete_criteria(CriteriaId(criteria_id)).await {
        Ok(consistency) => Json(json!({
            "criteria_id": criteria_id,
            "consistency": consistency,
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn local_criteria_handler(
    State(service): State<Arc<ScoringService>>,
    Path(job_posting_id): Path<u64>,
) -> Response {
    match service.local_criteria(JobPostingId(job_posting_id)).await {
        Ok(criteria) => Json(criteria_views(criteria)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn create_local_criteria_handler(
    State(service): State<Arc<ScoringService>>,
    Path(job_posting_id): Path<u64>,
    Json(request): Json<LocalCriteriaRequest>,
) -> Response {
    let draft = CriteriaDraft {
        name: request.name,
        criteria_type: CriteriaType::Local,
        job_posting_id: Some(JobPostingId(job_posting_id)),
        rules: request.rules,
    };
    create_criteria_handler(State(service), Json(draft)).await
}

pub(crate) async fn rescore_handler(
    State(service): State<Arc<ScoringService>>,
    Path(job_posting_id): Path<u64>,
) -> Response {
    match service
        .rescore_job_posting(JobPostingId(job_posting_id))
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn skills_handler(State(service): State<Arc<ScoringService>>) -> Response {
    match service.skills().await {
        Ok(skills) => Json(skills).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn add_skill_handler(
    State(service): State<Arc<ScoringService>>,
    Json(request): Json<SkillRequest>,
) -> Response {
    match service.add_skill(&request.name).await {
        Ok(skill) => (StatusCode::CREATED, Json(skill)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn rename_skill_handler(
    State(service): State<Arc<ScoringService>>,
    Path(skill_id): Path<u64>,
    Json(request): Json<SkillRequest>,
) -> Response {
    match service.rename_skill(SkillId(skill_id), &request.name).await {
        Ok(change) => Json(json!({
            "skill": change.skill,
            "consistency": change.consistency,
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn delete_skill_handler(
    State(service): State<Arc<ScoringService>>,
    Path(skill_id): Path<u64>,
) -> Response {
    match service.delete_skill(SkillId(skill_id)).await {
        Ok(change) => Json(json!({
            "skill": change.skill,
            "consistency": change.consistency,
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}

impl ScoringServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScoringServiceError::Intake(_)
            | ScoringServiceError::Criteria(_)
            | ScoringServiceError::BlankSkillName => StatusCode::UNPROCESSABLE_ENTITY,
            ScoringServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            ScoringServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            ScoringServiceError::Repository(RepositoryError::Unavailable(_))
            | ScoringServiceError::Consistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ScoringServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
