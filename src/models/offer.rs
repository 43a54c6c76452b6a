// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redeemable rewards and their affordability view.

use crate::models::PointsBalance;
use serde::{Deserialize, Deserializer, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Subscription tier a reward can unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum UpgradeTier {
    #[default]
    None,
    Pro,
    Elite,
}

/// A reward offered by the ledger backend.
///
/// Defined server-side and immutable for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedemptionOffer {
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub points_cost: u64,
    pub reward_name: String,
    #[serde(default)]
    pub reward_description: String,
    #[serde(default, deserialize_with = "tier_or_none")]
    pub upgrade_tier: UpgradeTier,
    #[serde(default)]
    pub duration_hours: Option<u32>,
}

/// The backend sends `null` for rewards that unlock no tier.
fn tier_or_none<'de, D>(deserializer: D) -> Result<UpgradeTier, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<UpgradeTier>::deserialize(deserializer)?.unwrap_or_default())
}

impl RedemptionOffer {
    /// Offers with a zero cost or a zero-length access window are malformed.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && self.points_cost > 0 && self.duration_hours != Some(0)
    }

    /// Human-readable access window, e.g. "24 hours" or "7 days".
    pub fn duration_label(&self) -> Option<String> {
        self.duration_hours.map(|hours| match hours {
            1 => "1 hour".to_string(),
            24 => "1 day".to_string(),
            h if h % 24 == 0 => format!("{} days", h / 24),
            h => format!("{} hours", h),
        })
    }
}

/// An offer as presented to the user: gated by the cached balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OfferView {
    #[serde(flatten)]
    pub offer: RedemptionOffer,
    pub affordable: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub shortfall: u64,
    /// Button label: "Claim" or "Need N more"
    pub action_label: String,
    pub duration_label: Option<String>,
}

impl OfferView {
    /// Gate an offer against a balance. Without a balance nothing is claimable.
    pub fn new(offer: RedemptionOffer, balance: Option<&PointsBalance>) -> Self {
        let shortfall = match balance {
            Some(b) => b.shortfall(offer.points_cost),
            None => offer.points_cost,
        };
        let affordable = shortfall == 0;
        let action_label = if affordable {
            "Claim".to_string()
        } else {
            format!("Need {} more", shortfall)
        };
        let duration_label = offer.duration_label();

        Self {
            offer,
            affordable,
            shortfall,
            action_label,
            duration_label,
        }
    }
}
