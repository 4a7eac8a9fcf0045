use crate::{
    cycle::CycleCalendar,
    error::{BillingError, BillingResult},
    types::Money,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Tariffs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffPlanConfig {
    pub plan:          String,
    pub rate_per_unit: Money,
}

#[derive(Debug, Clone, Deserialize)]
struct TariffPlansFile {
    plans: Vec<TariffPlanConfig>,
}

/// Immutable plan → per-unit rate mapping. Keys are stored lowercase,
/// so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct TariffTable {
    rates: HashMap<String, Money>,
}

impl TariffTable {
    pub fn from_plans(plans: impl IntoIterator<Item = TariffPlanConfig>) -> Self {
        let rates = plans
            .into_iter()
            .map(|p| (p.plan.to_lowercase(), p.rate_per_unit))
            .collect();
        Self { rates }
    }

    pub fn rate_for(&self, plan: &str) -> BillingResult<Money> {
        self.rates
            .get(&plan.to_lowercase())
            .copied()
            .ok_or_else(|| BillingError::InvalidTariffPlan { plan: plan.to_string() })
    }

    /// Rate for display purposes; unknown plans show as 0.
    pub fn rate_or_zero(&self, plan: &str) -> Money {
        self.rate_for(plan).unwrap_or(0.0)
    }

    pub fn plan_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        Self::from_plans([
            TariffPlanConfig { plan: "domestic".into(),   rate_per_unit: 5.0 },
            TariffPlanConfig { plan: "commercial".into(), rate_per_unit: 10.0 },
            TariffPlanConfig { plan: "industrial".into(), rate_per_unit: 15.0 },
        ])
    }
}

// ── Billing policy ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CycleConfig {
    /// Day 1 of cycle 0. Every cycle is anchored to it.
    pub epoch: NaiveDate,
}

/// Flat late-payment fine with two tax components on the base.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FinePolicy {
    pub base_fine: Money,
    pub cgst_rate: f64,
    pub sgst_rate: f64,
}

impl Default for FinePolicy {
    fn default() -> Self {
        Self {
            base_fine: 100.0,
            cgst_rate: 0.09,
            sgst_rate: 0.09,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BillingPolicyFile {
    cycle: CycleConfig,
    fine:  FinePolicy,
}

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub tariffs:  TariffTable,
    pub calendar: CycleCalendar,
    pub fine:     FinePolicy,
}

impl BillingConfig {
    /// Load from the data/ directory.
    /// In tests, use BillingConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let tariff_path = format!("{data_dir}/tariffs/tariff_plans.json");
        let tariff_content = std::fs::read_to_string(&tariff_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {tariff_path}: {e}"))?;
        let tariff_file: TariffPlansFile = serde_json::from_str(&tariff_content)?;
        if tariff_file.plans.is_empty() {
            anyhow::bail!("{tariff_path} defines no tariff plans");
        }
        if let Some(bad) = tariff_file.plans.iter().find(|p| p.rate_per_unit < 0.0) {
            anyhow::bail!("{tariff_path}: negative rate for plan '{}'", bad.plan);
        }
        let tariffs = TariffTable::from_plans(tariff_file.plans);

        let policy_path = format!("{data_dir}/billing/billing_policy.json");
        let policy_content = std::fs::read_to_string(&policy_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {policy_path}: {e}"))?;
        let policy_file: BillingPolicyFile = serde_json::from_str(&policy_content)?;

        log::debug!(
            "config: loaded {} tariff plans, cycle epoch {}",
            tariffs.plan_names().len(),
            policy_file.cycle.epoch
        );

        Ok(Self {
            tariffs,
            calendar: CycleCalendar::new(policy_file.cycle.epoch),
            fine:     policy_file.fine,
        })
    }

    /// The production values, built in code for tests.
    pub fn default_test() -> Self {
        Self {
            tariffs:  TariffTable::default(),
            calendar: CycleCalendar::default(),
            fine:     FinePolicy::default(),
        }
    }
}
