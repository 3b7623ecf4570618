use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Local, NaiveDate};

use super::super::domain::{Experience, PRESENT};

/// Calendar month parsed from `MM/YYYY` (a single-digit month is accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthYear {
    year: i32,
    month: u32,
}

impl MonthYear {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_date)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (month, year) = raw.trim().split_once('/')?;
        let month_valid = (1..=2).contains(&month.len()) && month.bytes().all(|b| b.is_ascii_digit());
        let year_valid = year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit());
        if !month_valid || !year_valid {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    /// Whole months from `self` to `end`; negative when `end` precedes `self`.
    pub fn months_until(self, end: MonthYear) -> i64 {
        end.ordinal() - self.ordinal()
    }

    fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

pub(crate) fn is_ongoing(end_date: Option<&str>) -> bool {
    match end_date.map(str::trim) {
        None | Some("") => true,
        Some(raw) => raw.eq_ignore_ascii_case(PRESENT),
    }
}

/// Duration of one experience in fractional years, measured to `as_of` for ongoing roles.
///
/// Unparseable or inverted ranges contribute zero rather than failing the computation.
pub fn experience_years(experience: &Experience, as_of: MonthYear) -> f64 {
    let Some(start) = MonthYear::parse(&experience.start_date) else {
        return 0.0;
    };
    let end = if is_ongoing(experience.end_date.as_deref()) {
        as_of
    } else {
        match experience.end_date.as_deref().and_then(MonthYear::parse) {
            Some(end) => end,
            None => return 0.0,
        }
    };

    let months = start.months_until(end);
    if months <= 0 {
        0.0
    } else {
        months as f64 / 12.0
    }
}

/// Key used for case-insensitive skill comparison across the engine.
pub(crate) fn skill_key(skill: &str) -> String {
    skill.trim().to_lowercase()
}

/// Total years per lowercased skill across a work history.
///
/// Overlapping roles that list the same skill are summed, not merged on the calendar,
/// and a skill listed twice on one role accrues that role twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillExperience {
    years: BTreeMap<String, f64>,
}

impl SkillExperience {
    pub fn extract(experiences: &[Experience], as_of: MonthYear) -> Self {
        let mut years: BTreeMap<String, f64> = BTreeMap::new();

        for experience in experiences {
            let duration = experience_years(experience, as_of);
            for key in experience.skills.iter().map(|skill| skill_key(skill)) {
                if key.is_empty() {
                    continue;
                }
                *years.entry(key).or_insert(0.0) += duration;
            }
        }

        Self { years }
    }

    /// Years for `skill` (case-insensitive); zero when the candidate never listed it.
    pub fn years(&self, skill: &str) -> f64 {
        self.years.get(&skill_key(skill)).copied().unwrap_or(0.0)
    }

    pub fn skills(&self) -> impl Iterator<Item = (&str, f64)> {
        self.years.iter().map(|(skill, years)| (skill.as_str(), *years))
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}
