use super::*;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct SaveProgress {
    pub(super) user_id: Uuid,
    #[serde(default)]
    pub(super) notes: Option<String>,
    #[serde(flatten)]
    pub(super) input: DailyInput,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct TeamAverage {
    pub(super) team_id: Uuid,
    pub(super) month: u32,
    pub(super) year: i32,
    pub(super) average: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CalendarInfo {
    pub(super) month: u32,
    pub(super) year: i32,
    pub(super) days_in_month: u32,
    pub(super) per_day_percent: Decimal,
}
