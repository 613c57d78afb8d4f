//! Scoring of a single day of work.
//!
//! A normal day is worth [`per_day_percent`] of the month (twice that on an
//! overtime day). Missed tickets and missed or partially handled groups take
//! a share of that weight away, so penalty percentages are relative to the
//! day and never absolute percentage points.

use std::{fmt, str::FromStr};

use chrono::{Datelike as _, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{consts::MONEY_DP, payroll::{calendar::per_day_percent, settings::{PayrollSettings, PenaltyOverrides}}, utils};

/// Outcome of one customer group on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Completed,
    Partial,
    Missed,
}

impl FromStr for GroupStatus {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "ok" => Ok(GroupStatus::Completed),
            "partial" => Ok(GroupStatus::Partial),
            "missed" | "miss" => Ok(GroupStatus::Missed),
            _ => Err(ProgressError::UnknownGroupStatus(s.to_owned())),
        }
    }
}

impl<'de> Deserialize<'de> for GroupStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupStatus::Completed => "completed",
            GroupStatus::Partial => "partial",
            GroupStatus::Missed => "missed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group_id: String,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub status: GroupStatus,
}

/// Raw inputs of one day, as typed in by an admin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub tickets_missed: u32,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub is_missed: bool,
    #[serde(default)]
    pub is_overtime: bool,
    /// Customer whose overrides drive the ticket penalty
    #[serde(default)]
    pub customer_id: Option<Uuid>,
}

impl DailyInput {
    /// Every customer whose overrides the calculation may look up
    pub fn customer_ids(&self) -> Vec<Uuid> {
        let mut ids = self.customer_id.into_iter()
            .chain(self.groups.iter().filter_map(|g| g.customer_id))
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyProgress {
    pub progress_percent: Decimal,
    pub base_percent: Decimal,
    pub penalty_percent: Decimal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("an entry cannot be both missed and overtime")]
    MissedAndOvertime,
    #[error("unknown group status `{0}`")]
    UnknownGroupStatus(String),
}

pub fn calculate_daily_progress(
    input: &DailyInput,
    settings: &PayrollSettings,
    overrides: &PenaltyOverrides,
) -> Result<DailyProgress, ProgressError> {
    if input.is_missed && input.is_overtime {
        return Err(ProgressError::MissedAndOvertime);
    }

    if input.is_missed {
        return Ok(DailyProgress {
            progress_percent: Decimal::new(0, MONEY_DP),
            base_percent: Decimal::ZERO,
            penalty_percent: Decimal::ZERO,
        });
    }

    let mut base = per_day_percent(input.date.month(), input.date.year());
    if input.is_overtime {
        base *= dec!(2);
    }

    let entry_customer = input.customer_id.and_then(|id| overrides.get(&id));
    let ticket_penalty = settings.ticket_penalty(entry_customer);

    let mut penalty = base * (ticket_penalty / dec!(100)) * Decimal::from(input.tickets_missed);

    for group in &input.groups {
        let customer = group.customer_id.and_then(|id| overrides.get(&id));
        let percent = match group.status {
            GroupStatus::Completed => continue,
            GroupStatus::Partial => settings.group_partial_penalty(customer),
            GroupStatus::Missed => settings.group_miss_penalty(customer),
        };

        penalty += base * (percent / dec!(100));
    }

    Ok(DailyProgress {
        progress_percent: utils::round((base - penalty).max(Decimal::ZERO), MONEY_DP),
        base_percent: base,
        penalty_percent: penalty,
    })
}
