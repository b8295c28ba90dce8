use serde::{Deserialize, Serialize};

use super::breakdown::Breakdown;
use super::error::SimulationError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceKind {
    Expense,
    Credit,
    #[serde(alias = "pay")]
    Payment,
    Investment,
}

impl BalanceKind {
    /// Expenses and payments drain net worth; credits and investments add to it.
    pub fn sign(self) -> f64 {
        match self {
            BalanceKind::Expense | BalanceKind::Payment => -1.0,
            BalanceKind::Credit | BalanceKind::Investment => 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleType {
    Monthly,
    Yearly,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrequencyUnit {
    #[serde(alias = "/month", alias = "perMonth")]
    PerMonth,
    #[serde(alias = "/year", alias = "perYear")]
    PerYear,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringItem {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub frequency: f64,
    pub frequency_unit: FrequencyUnit,
    pub cycle: CycleType,
    /// Cycle index (in the item's own clock) at which the item stops contributing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u32>,
    /// Cycle index at which a pending item becomes active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cycle: Option<u32>,
    pub kind: BalanceKind,
}

impl RecurringItem {
    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |reason: &str| SimulationError::InvalidItem {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(invalid("value must be a finite amount >= 0"));
        }
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(invalid("frequency must be > 0"));
        }
        if let (Some(expiry), Some(start)) = (self.expiry, self.start_cycle) {
            if expiry < start {
                return Err(invalid("expiry must not precede start cycle"));
            }
        }
        Ok(())
    }

    /// Frequency expressed per unit of the item's own cycle.
    pub fn normalized_rate(&self) -> f64 {
        match (self.cycle, self.frequency_unit) {
            (CycleType::Monthly, FrequencyUnit::PerMonth)
            | (CycleType::Yearly, FrequencyUnit::PerYear) => self.frequency,
            (CycleType::Monthly, FrequencyUnit::PerYear) => self.frequency / 12.0,
            (CycleType::Yearly, FrequencyUnit::PerMonth) => self.frequency * 12.0,
        }
    }

    pub fn signed_value(&self) -> f64 {
        self.value * self.normalized_rate() * self.kind.sign()
    }

    /// Sort key for the active queues; a missing expiry sorts as +infinity.
    pub(crate) fn expiry_rank(&self) -> u64 {
        self.expiry.map_or(u64::MAX, u64::from)
    }

    pub(crate) fn start_rank(&self) -> u64 {
        self.start_cycle.map_or(0, u64::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConfig {
    pub payment_interest_rate: f64,
    pub investment_interest_rate: f64,
}

pub const DEFAULT_MAX_CYCLES: u32 = 12_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInputs {
    pub payment_size: f64,
    pub investment_size: f64,
    pub initial_payment: f64,
    pub profit_tax: f64,
    pub yearly_skim: f64,
    /// Calendar month (1-12) covered by cycle 0. Values outside that range are
    /// clamped: 0 runs as January and anything above 12 as December.
    pub start_month: u32,
    pub max_cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub cycle: u32,
    pub calendar_month: Option<u32>,
    pub payment_size: f64,
    pub investment_size: f64,
    pub breakdown: Breakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: BalanceKind, cycle: CycleType, unit: FrequencyUnit) -> RecurringItem {
        RecurringItem {
            id: "rent".to_string(),
            name: "Rent".to_string(),
            value: 120.0,
            frequency: 2.0,
            frequency_unit: unit,
            cycle,
            expiry: None,
            start_cycle: None,
            kind,
        }
    }

    #[test]
    fn normalized_rate_converts_between_units() {
        let monthly = item(BalanceKind::Expense, CycleType::Monthly, FrequencyUnit::PerMonth);
        assert_eq!(monthly.normalized_rate(), 2.0);

        let monthly_from_yearly =
            item(BalanceKind::Expense, CycleType::Monthly, FrequencyUnit::PerYear);
        assert!((monthly_from_yearly.normalized_rate() - 2.0 / 12.0).abs() < 1e-12);

        let yearly_from_monthly =
            item(BalanceKind::Expense, CycleType::Yearly, FrequencyUnit::PerMonth);
        assert_eq!(yearly_from_monthly.normalized_rate(), 24.0);

        let yearly = item(BalanceKind::Expense, CycleType::Yearly, FrequencyUnit::PerYear);
        assert_eq!(yearly.normalized_rate(), 2.0);
    }

    #[test]
    fn signed_value_follows_kind() {
        let unit = FrequencyUnit::PerMonth;
        let cycle = CycleType::Monthly;
        assert_eq!(item(BalanceKind::Expense, cycle, unit).signed_value(), -240.0);
        assert_eq!(item(BalanceKind::Payment, cycle, unit).signed_value(), -240.0);
        assert_eq!(item(BalanceKind::Credit, cycle, unit).signed_value(), 240.0);
        assert_eq!(item(BalanceKind::Investment, cycle, unit).signed_value(), 240.0);
    }

    #[test]
    fn validate_rejects_non_positive_frequency() {
        let mut bad = item(BalanceKind::Credit, CycleType::Monthly, FrequencyUnit::PerMonth);
        bad.frequency = 0.0;
        let err = bad.validate().expect_err("zero frequency must be rejected");
        assert!(matches!(err, SimulationError::InvalidItem { ref id, .. } if id == "rent"));
    }

    #[test]
    fn validate_rejects_expiry_before_start() {
        let mut bad = item(BalanceKind::Credit, CycleType::Monthly, FrequencyUnit::PerMonth);
        bad.start_cycle = Some(5);
        bad.expiry = Some(4);
        assert!(bad.validate().is_err());

        bad.expiry = Some(5);
        assert!(bad.validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_value() {
        let mut bad = item(BalanceKind::Credit, CycleType::Monthly, FrequencyUnit::PerMonth);
        bad.value = -1.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn deserializes_legacy_enum_spellings() {
        let json = r#"{
          "id": "loan",
          "name": "Loan",
          "value": 250,
          "frequency": 1,
          "frequencyUnit": "/month",
          "cycle": "monthly",
          "startCycle": 3,
          "kind": "pay"
        }"#;
        let parsed: RecurringItem = serde_json::from_str(json).expect("item should parse");
        assert_eq!(parsed.kind, BalanceKind::Payment);
        assert_eq!(parsed.frequency_unit, FrequencyUnit::PerMonth);
        assert_eq!(parsed.start_cycle, Some(3));
        assert_eq!(parsed.expiry, None);
    }

    #[test]
    fn expiry_rank_treats_missing_as_infinite() {
        let mut it = item(BalanceKind::Credit, CycleType::Monthly, FrequencyUnit::PerMonth);
        assert_eq!(it.expiry_rank(), u64::MAX);
        it.expiry = Some(7);
        assert_eq!(it.expiry_rank(), 7);
    }
}
