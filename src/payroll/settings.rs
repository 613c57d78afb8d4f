use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{consts::*, entity::{customer, prelude::*, setting}};

/// Global knobs of the payroll computation, read once per run or entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayrollSettings {
    pub profit_fund_percent: Decimal,
    pub ticket_penalty_percent: Decimal,
    pub group_miss_percent: Decimal,
    pub group_partial_percent: Decimal,
}

impl Default for PayrollSettings {
    fn default() -> Self {
        Self {
            profit_fund_percent: DEFAULT_PROFIT_FUND_PERCENT,
            ticket_penalty_percent: DEFAULT_TICKET_PENALTY_PERCENT,
            group_miss_percent: DEFAULT_GROUP_MISS_PERCENT,
            group_partial_percent: DEFAULT_GROUP_PARTIAL_PERCENT,
        }
    }
}

impl PayrollSettings {
    /// Builds the settings from raw `setting` rows, missing or malformed keys keep their default
    pub fn from_values(values: &HashMap<String, String>) -> Self {
        let pick = |key: &str, default: Decimal| {
            let Some(raw) = values.get(key) else {
                return default;
            };

            match raw.trim().parse::<Decimal>() {
                Ok(value) if !value.is_sign_negative() => value,
                _ => {
                    warn!(key, %raw, %default, "Ignoring malformed setting");
                    default
                }
            }
        };

        Self {
            profit_fund_percent: pick(PROFIT_FUND_PERCENT, DEFAULT_PROFIT_FUND_PERCENT),
            ticket_penalty_percent: pick(TICKET_PENALTY_PERCENT, DEFAULT_TICKET_PENALTY_PERCENT),
            group_miss_percent: pick(GROUP_MISS_PERCENT, DEFAULT_GROUP_MISS_PERCENT),
            group_partial_percent: pick(GROUP_PARTIAL_PERCENT, DEFAULT_GROUP_PARTIAL_PERCENT),
        }
    }

    pub async fn load(db: &impl ConnectionTrait) -> Result<Self, DbErr> {
        let rows = Setting::find()
            .filter(setting::Column::Key.is_in([
                PROFIT_FUND_PERCENT,
                TICKET_PENALTY_PERCENT,
                GROUP_MISS_PERCENT,
                GROUP_PARTIAL_PERCENT,
            ]))
            .all(db).await?;

        let values = rows.into_iter()
            .filter_map(|row| Some((row.key, row.value?)))
            .collect::<HashMap<_, _>>();

        Ok(Self::from_values(&values))
    }

    pub fn ticket_penalty(&self, customer: Option<&CustomerPenalty>) -> Decimal {
        customer.and_then(|c| c.ticket).unwrap_or(self.ticket_penalty_percent)
    }

    pub fn group_miss_penalty(&self, customer: Option<&CustomerPenalty>) -> Decimal {
        customer.and_then(|c| c.group_miss).unwrap_or(self.group_miss_percent)
    }

    pub fn group_partial_penalty(&self, customer: Option<&CustomerPenalty>) -> Decimal {
        customer.and_then(|c| c.group_partial).unwrap_or(self.group_partial_percent)
    }
}

/// Per-customer overrides, `None` falls back to the global setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerPenalty {
    pub ticket: Option<Decimal>,
    pub group_miss: Option<Decimal>,
    pub group_partial: Option<Decimal>,
}

impl From<&customer::Model> for CustomerPenalty {
    fn from(customer: &customer::Model) -> Self {
        Self {
            ticket: customer.ticket_penalty_percent,
            group_miss: customer.group_miss_penalty_percent,
            group_partial: customer.group_partial_penalty_percent,
        }
    }
}

pub type PenaltyOverrides = HashMap<Uuid, CustomerPenalty>;

pub async fn load_overrides(db: &impl ConnectionTrait, customer_ids: Vec<Uuid>) -> Result<PenaltyOverrides, DbErr> {
    if customer_ids.is_empty() {
        return Ok(PenaltyOverrides::new());
    }

    let customers = Customer::find()
        .filter(customer::Column::Id.is_in(customer_ids))
        .all(db).await?;

    Ok(customers.iter()
        .map(|customer| (customer.id, CustomerPenalty::from(customer)))
        .collect())
}
