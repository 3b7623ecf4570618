use crate::infra::in_memory_service;
use clap::Args;
use talent_score::config::ScoringConfig;
use talent_score::error::AppError;
use talent_score::workflows::scoring::{
    ApplicantId, ApplicationSubmission, ConsistencyReport, CriteriaDraft, CriteriaType,
    CriteriaUpdate, Experience, JobPostingId, Rule, ScoringService,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of applications rescored in the bulk rule update walkthrough
    #[arg(long, default_value_t = 50)]
    pub(crate) bulk_applicants: u64,
    /// Upper bound on applications rescored at once
    #[arg(long)]
    pub(crate) rescore_concurrency: Option<usize>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = ScoringConfig::default();
    if let Some(concurrency) = args.rescore_concurrency {
        config.rescore_concurrency = concurrency;
    }
    let service = in_memory_service(&config);

    println!("Applicant scoring demo");

    println!("\nTenure below the cap");
    service
        .create_criteria(local("Frontend", 101, vec![Rule::new("React", 10.0, 100.0)]))
        .await?;
    let record = service
        .submit(react_history(101, 1, "01/2022", "01/2024"))
        .await?;
    print_score("2 years of react", record.score);

    println!("\nTenure above the cap");
    let record = service
        .submit(react_history(101, 2, "01/2009", "01/2024"))
        .await?;
    print_score("15 years of React", record.score);

    println!("\nNo matching skills");
    service
        .create_criteria(local("Data", 102, vec![Rule::new("Python", 5.0, 50.0)]))
        .await?;
    let record = service
        .submit(react_history(102, 3, "01/2022", "01/2024"))
        .await?;
    print_score("React-only history against a Python rule", record.score);

    println!("\nBulk rule update");
    let change = service
        .create_criteria(local("Frontend", 103, vec![Rule::new("React", 10.0, 100.0)]))
        .await?;
    for applicant in 0..args.bulk_applicants {
        let start = format!("01/{}", 2023 - (applicant % 10));
        service
            .submit(react_history(103, 1_000 + applicant, &start, "01/2024"))
            .await?;
    }
    let updated = service
        .update_criteria(
            change.criteria.id(),
            CriteriaUpdate {
                name: None,
                rules: Some(vec![Rule::new("React", 20.0, 50.0)]),
            },
        )
        .await?;
    println!(
        "  criteria max score: {:.2} -> {:.2}",
        change.criteria.criteria_max_score(),
        updated.criteria.criteria_max_score()
    );
    print_consistency(&updated.consistency);

    println!("\nDeleting the only local criteria");
    let frontend = service
        .create_criteria(local("Frontend", 104, vec![Rule::new("React", 10.0, 100.0)]))
        .await?;
    let mut ids = Vec::new();
    for applicant in 0..3 {
        let record = service
            .submit(react_history(104, 2_000 + applicant, "01/2021", "01/2024"))
            .await?;
        ids.push(record.id);
    }
    let global = service
        .create_criteria(CriteriaDraft {
            name: "Baseline".to_string(),
            criteria_type: CriteriaType::Global,
            job_posting_id: None,
            rules: vec![Rule::new("React", 1.0, 2.0)],
        })
        .await?;
    println!(
        "  global criteria '{}' rescored {} job postings",
        global.criteria.name(),
        global.consistency.rescored.len()
    );
    let report = service.delete_criteria(frontend.criteria.id()).await?;
    print_consistency(&report);
    for id in ids {
        let record = service.application(id).await?;
        print_score(&format!("application {id}"), record.score);
    }

    print_skill_walkthrough(&service).await
}

async fn print_skill_walkthrough(service: &ScoringService) -> Result<(), AppError> {
    println!("\nSkill catalog rename");
    let react = service.add_skill("React").await?;
    let change = service.rename_skill(react.id, "React.js").await?;
    println!(
        "  '{}' renamed: {} criteria sets and {} applications rewritten",
        change.skill.name,
        change.consistency.criteria_rewritten.len(),
        change.consistency.applications_rewritten.len()
    );
    Ok(())
}

fn local(name: &str, job_posting_id: u64, rules: Vec<Rule>) -> CriteriaDraft {
    CriteriaDraft {
        name: name.to_string(),
        criteria_type: CriteriaType::Local,
        job_posting_id: Some(JobPostingId(job_posting_id)),
        rules,
    }
}

fn react_history(job_posting_id: u64, applicant_id: u64, start: &str, end: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        job_posting_id: JobPostingId(job_posting_id),
        applicant_id: ApplicantId(applicant_id),
        work_experience: vec![Experience {
            title: "Frontend Engineer".to_string(),
            company: "Globex".to_string(),
            start_date: start.to_string(),
            end_date: Some(end.to_string()),
            skills: vec!["React".to_string()],
            description: String::new(),
        }],
    }
}

fn print_score(label: &str, score: Option<f64>) {
    match score {
        Some(score) => println!("  {label}: {score:.2}"),
        None => println!("  {label}: unscored"),
    }
}

fn print_consistency(report: &ConsistencyReport) {
    for rescored in &report.rescored {
        println!(
            "  job posting {}: {} scored, {} cleared, {} failed ({} criteria applied)",
            rescored.job_posting_id,
            rescored.scored,
            rescored.cleared,
            rescored.failed.len(),
            rescored.criteria_applied
        );
    }
    for failure in &report.rescore_failures {
        println!(
            "  job posting {} not rescored: {}",
            failure.job_posting_id, failure.error
        );
    }
}
