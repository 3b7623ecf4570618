use crate::infra::parse_month;
use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;
use talent_score::error::AppError;
use talent_score::workflows::scoring::{
    CriteriaId, CriteriaScope, CriteriaSet, Experience, MonthYear, Rule, ScoreBreakdown,
    ScoringEngine, ScoringServiceError,
};

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON file holding `criteria` and `experiences`
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Month (MM/YYYY) that ongoing roles run to. Defaults to the current month.
    #[arg(long, value_parser = parse_month)]
    pub(crate) as_of: Option<MonthYear>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreInput {
    pub(crate) criteria: Vec<CriteriaInput>,
    #[serde(default)]
    pub(crate) experiences: Vec<Experience>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CriteriaInput {
    pub(crate) name: String,
    pub(crate) rules: Vec<Rule>,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.input)?;
    let input: ScoreInput = serde_json::from_str(&raw)?;
    let engine = match args.as_of {
        Some(month) => ScoringEngine::as_of(month),
        None => ScoringEngine::new(),
    };

    let breakdown = score_input(input, &engine)?;
    println!(
        "Score as of {}: {:.2} / {:.2}",
        engine.reference_month(),
        breakdown.total,
        breakdown.max_total
    );
    for criteria in &breakdown.criteria {
        println!(
            "- {}: {:.2} / {:.2}",
            criteria.name, criteria.score, criteria.max_score
        );
        for rule in &criteria.rules {
            println!(
                "    {}: {:.2} years -> {:.2} / {:.2} points",
                rule.skill, rule.years, rule.points, rule.max_points
            );
        }
    }
    println!("{}", serde_json::to_string_pretty(&breakdown)?);
    Ok(())
}

pub(crate) fn score_input(input: ScoreInput, engine: &ScoringEngine) -> Result<ScoreBreakdown, AppError> {
    let criteria = input
        .criteria
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            CriteriaSet::new(
                CriteriaId(index as u64 + 1),
                entry.name,
                CriteriaScope::Global,
                entry.rules,
            )
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(ScoringServiceError::from)?;

    Ok(engine.breakdown(&input.experiences, &criteria))
}
