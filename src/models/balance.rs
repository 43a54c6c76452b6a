// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Points balance snapshot as reported by the ledger backend.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A user's points balance.
///
/// Owned by the backend; the client only ever holds a read snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PointsBalance {
    /// Settled plus pending points
    pub total_points: u64,
    /// Points that can be spent right now
    pub available_points: u64,
    /// Earned but not yet settled
    pub pending_points: u64,
    /// Everything ever earned (never decreases)
    pub lifetime_earned: u64,
}

impl PointsBalance {
    /// Check the snapshot invariant `total = available + pending`.
    pub fn check_consistency(&self) -> Result<(), String> {
        let expected = self.available_points.checked_add(self.pending_points);
        if expected != Some(self.total_points) {
            return Err(format!(
                "total {} != available {} + pending {}",
                self.total_points, self.available_points, self.pending_points
            ));
        }
        Ok(())
    }

    /// Advisory affordability check. The server re-validates on redeem.
    pub fn can_afford(&self, points_cost: u64) -> bool {
        self.available_points >= points_cost
    }

    /// Points still missing to afford `points_cost` (0 when affordable).
    pub fn shortfall(&self, points_cost: u64) -> u64 {
        points_cost.saturating_sub(self.available_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(available: u64, pending: u64) -> PointsBalance {
        PointsBalance {
            total_points: available + pending,
            available_points: available,
            pending_points: pending,
            lifetime_earned: available + pending,
        }
    }

    #[test]
    fn test_consistency() {
        assert!(balance(150, 20).check_consistency().is_ok());

        let broken = PointsBalance {
            total_points: 100,
            available_points: 150,
            pending_points: 0,
            lifetime_earned: 150,
        };
        assert!(broken.check_consistency().is_err());

        let overflow = PointsBalance {
            total_points: u64::MAX,
            available_points: u64::MAX,
            pending_points: 1,
            lifetime_earned: u64::MAX,
        };
        assert!(overflow.check_consistency().is_err());
    }

    #[test]
    fn test_shortfall() {
        let b = balance(150, 0);
        assert!(b.can_afford(100));
        assert!(b.can_afford(150));
        assert!(!b.can_afford(200));
        assert_eq!(b.shortfall(200), 50);
        assert_eq!(b.shortfall(100), 0);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = r#"{"totalPoints":170,"availablePoints":150,"pendingPoints":20,"lifetimeEarned":900}"#;
        let b: PointsBalance = serde_json::from_str(json).unwrap();
        assert_eq!(b.available_points, 150);
        assert_eq!(b.lifetime_earned, 900);
    }
}
