use super::domain::{
    ApplicationSubmission, Experience, ExperienceHistory, NewApplication, PRESENT,
};
use super::evaluation::experience::is_ongoing;
use super::evaluation::MonthYear;

/// Validation errors raised while admitting a submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("work experience {index}: {field} is required")]
    MissingField { index: usize, field: &'static str },
    #[error("work experience {index}: start date '{value}' must be a valid MM/YYYY month")]
    InvalidStartDate { index: usize, value: String },
    #[error("work experience {index}: start date must be in the past or current month")]
    StartInFuture { index: usize },
    #[error("work experience {index}: end date '{value}' must be a valid MM/YYYY month or \"Present\"")]
    InvalidEndDate { index: usize, value: String },
    #[error("work experience {index}: end date must be after start date")]
    EndNotAfterStart { index: usize },
    #[error("work experience {index}: at least one skill is required")]
    MissingSkills { index: usize },
}

/// Guard producing normalised `NewApplication` values from raw submissions.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard {
    as_of: Option<MonthYear>,
}

impl IntakeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_of(month: MonthYear) -> Self {
        Self { as_of: Some(month) }
    }

    pub fn admit(&self, submission: ApplicationSubmission) -> Result<NewApplication, IntakeError> {
        let current = self.as_of.unwrap_or_else(MonthYear::current);
        let experiences = submission
            .work_experience
            .into_iter()
            .enumerate()
            .map(|(index, experience)| normalize_experience(index, experience, current))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewApplication {
            job_posting_id: submission.job_posting_id,
            applicant_id: submission.applicant_id,
            experience: ExperienceHistory { experiences },
        })
    }
}

fn normalize_experience(
    index: usize,
    experience: Experience,
    current: MonthYear,
) -> Result<Experience, IntakeError> {
    let title = required(index, "job title", &experience.title)?;
    let company = required(index, "company", &experience.company)?;

    let start = MonthYear::parse(&experience.start_date).ok_or_else(|| {
        IntakeError::InvalidStartDate {
            index,
            value: experience.start_date.clone(),
        }
    })?;
    if start > current {
        return Err(IntakeError::StartInFuture { index });
    }

    let end_date = if is_ongoing(experience.end_date.as_deref()) {
        PRESENT.to_string()
    } else {
        let raw = experience.end_date.unwrap_or_default();
        let end = MonthYear::parse(&raw).ok_or_else(|| IntakeError::InvalidEndDate {
            index,
            value: raw.clone(),
        })?;
        if end <= start {
            return Err(IntakeError::EndNotAfterStart { index });
        }
        end.to_string()
    };

    let skills: Vec<String> = experience
        .skills
        .iter()
        .map(|skill| skill.trim())
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect();
    if skills.is_empty() {
        return Err(IntakeError::MissingSkills { index });
    }

    Ok(Experience {
        title,
        company,
        start_date: start.to_string(),
        end_date: Some(end_date),
        skills,
        description: experience.description.trim().to_string(),
    })
}

fn required(index: usize, field: &'static str, value: &str) -> Result<String, IntakeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IntakeError::MissingField { index, field });
    }
    Ok(trimmed.to_string())
}
