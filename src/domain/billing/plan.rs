//! Billing plans and the price snapshot taken at contract time.
//!
//! Plans are read-only to this engine. A subscription never points at a live
//! plan row for pricing: it carries a `PlanSnapshot` copied when the contract
//! was made (trial start or plan change), so later catalog price changes only
//! affect new contracts.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlanId, Timestamp};

/// How often a plan renews. Period arithmetic uses calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingInterval {
    /// Number of calendar months covered by one period.
    pub fn months(&self) -> u32 {
        match self {
            BillingInterval::Monthly => 1,
            BillingInterval::Quarterly => 3,
            BillingInterval::Yearly => 12,
        }
    }

    /// Returns the end of a period starting at `start`.
    pub fn advance(&self, start: Timestamp) -> Timestamp {
        start.add_months(self.months())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Quarterly => "quarterly",
            BillingInterval::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(BillingInterval::Monthly),
            "quarterly" => Some(BillingInterval::Quarterly),
            "yearly" => Some(BillingInterval::Yearly),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One band of graduated pricing for licenses beyond the included allotment.
///
/// `up_to` is the cumulative number of extra licenses covered by this band;
/// `None` marks the open-ended last band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePricingTier {
    pub up_to: Option<u32>,
    pub unit_price_cents: i64,
}

/// Prices `extra` licenses across graduated tiers.
///
/// Licenses past the last bounded tier are billed at the last tier's price.
fn quote_graduated(tiers: &[LicensePricingTier], extra: u32) -> i64 {
    let mut remaining = extra;
    let mut covered = 0u32;
    let mut total = 0i64;

    for tier in tiers {
        if remaining == 0 {
            break;
        }
        let band = match tier.up_to {
            Some(limit) => limit.saturating_sub(covered).min(remaining),
            None => remaining,
        };
        total += i64::from(band) * tier.unit_price_cents;
        remaining -= band;
        covered = covered.saturating_add(band);
    }

    if remaining > 0 {
        if let Some(last) = tiers.last() {
            total += i64::from(remaining) * last.unit_price_cents;
        }
    }

    total
}

/// A billing plan as published in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub slug: String,

    /// Base price per billing interval, in minor currency units.
    pub price_cents: i64,
    pub currency: String,
    pub billing_interval: BillingInterval,

    /// Condominium licenses granted by the base price.
    pub included_licenses: u32,

    pub feature_flags: Vec<String>,
    pub license_pricing_tiers: Vec<LicensePricingTier>,

    /// Inactive plans stay readable for existing contracts but cannot be chosen.
    pub active: bool,
}

impl Plan {
    /// Price of `extra` licenses beyond the included allotment.
    pub fn quote_licenses(&self, extra: u32) -> i64 {
        quote_graduated(&self.license_pricing_tiers, extra)
    }

    /// Recurring charge for a subscription holding `license_count` licenses.
    pub fn recurring_amount_cents(&self, license_count: u32) -> i64 {
        self.price_cents + self.quote_licenses(license_count.saturating_sub(self.included_licenses))
    }

    pub fn has_feature(&self, flag: &str) -> bool {
        self.feature_flags.iter().any(|f| f == flag)
    }

    /// Copies the contract-relevant terms of this plan.
    pub fn snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            plan_id: self.id,
            slug: self.slug.clone(),
            price_cents: self.price_cents,
            currency: self.currency.clone(),
            billing_interval: self.billing_interval,
            included_licenses: self.included_licenses,
            license_pricing_tiers: self.license_pricing_tiers.clone(),
        }
    }
}

/// Plan terms frozen into a subscription at contract time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub plan_id: PlanId,
    pub slug: String,
    pub price_cents: i64,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub included_licenses: u32,
    pub license_pricing_tiers: Vec<LicensePricingTier>,
}

impl PlanSnapshot {
    /// Recurring charge under the agreed terms.
    pub fn recurring_amount_cents(&self, license_count: u32) -> i64 {
        self.price_cents
            + quote_graduated(
                &self.license_pricing_tiers,
                license_count.saturating_sub(self.included_licenses),
            )
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::plan;
    use super::*;

    #[test]
    fn interval_months_match_calendar() {
        assert_eq!(BillingInterval::Monthly.months(), 1);
        assert_eq!(BillingInterval::Quarterly.months(), 3);
        assert_eq!(BillingInterval::Yearly.months(), 12);
    }

    #[test]
    fn interval_parse_accepts_known_values_only() {
        assert_eq!(BillingInterval::parse("yearly"), Some(BillingInterval::Yearly));
        assert_eq!(BillingInterval::parse("weekly"), None);
    }

    #[test]
    fn quote_spans_graduated_tiers() {
        let p = plan(1, 2000, 3);
        assert_eq!(p.quote_licenses(0), 0);
        assert_eq!(p.quote_licenses(2), 2000);
        assert_eq!(p.quote_licenses(5), 2000 + 3 * 500);
    }

    #[test]
    fn quote_past_bounded_tiers_uses_last_price() {
        let mut p = plan(1, 0, 0);
        p.license_pricing_tiers = vec![LicensePricingTier {
            up_to: Some(1),
            unit_price_cents: 700,
        }];
        assert_eq!(p.quote_licenses(3), 2100);
    }

    #[test]
    fn recurring_amount_includes_base_and_extra_licenses() {
        let p = plan(1, 2000, 3);
        assert_eq!(p.recurring_amount_cents(3), 2000);
        assert_eq!(p.recurring_amount_cents(4), 3000);
    }

    #[test]
    fn snapshot_keeps_terms_after_catalog_change() {
        let mut p = plan(1, 2000, 3);
        let snapshot = p.snapshot();
        p.price_cents = 9999;
        assert_eq!(snapshot.price_cents, 2000);
        assert_eq!(snapshot.recurring_amount_cents(4), 3000);
    }

    #[test]
    fn has_feature_checks_flags() {
        let p = plan(1, 2000, 3);
        assert!(p.has_feature("reports"));
        assert!(!p.has_feature("api"));
    }
}
