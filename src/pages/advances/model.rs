use super::*;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CreateAdvance {
    pub(super) amount: Decimal,
    pub(super) reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum Verdict {
    Approve,
    Reject,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct Decision {
    pub(super) decision: Verdict,
    /// Installment withheld from each salary once approved
    #[serde(default)]
    pub(super) monthly_deduction: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct DecisionOutcome {
    pub(super) advance: advance_request::Model,
    pub(super) schedule: Option<advance_auto_deduction::Model>,
}
