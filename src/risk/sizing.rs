//! Pure sizing math: child splitting and capital clamps

use rust_decimal::Decimal;

use crate::execution::OrderRequest;

/// Split a parent intent into child orders of at most `max_child` notional.
/// The last child absorbs the remainder; a non-positive `max_child` disables
/// splitting.
pub fn split_children(order: &OrderRequest, max_child: Decimal) -> Vec<OrderRequest> {
    if max_child <= Decimal::ZERO || order.notional <= max_child {
        return vec![order.clone()];
    }
    let mut children = Vec::new();
    let mut remaining = order.notional;
    while remaining > Decimal::ZERO {
        let notional = remaining.min(max_child);
        children.push(order.with_notional(notional));
        remaining -= notional;
    }
    children
}

/// Cash spendable on notional after reserving the proportional fee:
/// `cash / (1 + fee_rate)`.
pub fn spendable_cash(cash: Decimal, fee_rate: Decimal) -> Decimal {
    if fee_rate >= Decimal::ZERO {
        cash / (Decimal::ONE + fee_rate)
    } else {
        cash
    }
}

/// Per-trade live cap, tiered on the rollover threshold: a fixed cap below
/// it, a fraction of cash above it.
pub fn live_per_trade_cap(
    cash: Decimal,
    threshold: Decimal,
    below_cap: Decimal,
    above_fraction: Decimal,
) -> Decimal {
    if cash <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if cash < threshold {
        below_cap.max(Decimal::ZERO)
    } else {
        cash * above_fraction
    }
}

/// Limits applied to one child before submission
#[derive(Debug, Clone, Copy)]
pub struct ClampContext {
    pub spendable: Decimal,
    /// Mode-specific per-trade cap (paper fraction rule or live tiered rule)
    pub per_trade_cap: Decimal,
    pub exposure_headroom: Decimal,
    pub min_notional: Decimal,
}

/// Clamp a child to the tightest limit and recompute its size. Returns
/// `None` when the clamped notional would be dust (below the minimum).
pub fn clamp_child(child: &OrderRequest, ctx: &ClampContext) -> Option<OrderRequest> {
    let notional = child
        .notional
        .min(ctx.spendable)
        .min(ctx.per_trade_cap)
        .min(ctx.exposure_headroom);
    if notional < ctx.min_notional {
        return None;
    }
    if notional == child.notional {
        Some(child.clone())
    } else {
        Some(child.with_notional(notional))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Outcome;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(notional: Decimal) -> OrderRequest {
        OrderRequest {
            market_slug: "btc-hourly".to_string(),
            asset_symbol: "BTC".to_string(),
            outcome: Outcome::Up,
            token_id: "111".to_string(),
            price: dec!(0.5),
            size: notional / dec!(0.5),
            notional,
            start_time: Utc::now(),
            end_time: Utc::now(),
            order_type: Default::default(),
        }
    }

    #[test]
    fn test_split_even_and_remainder() {
        let children = split_children(&order(dec!(350)), dec!(150));
        let notionals: Vec<Decimal> = children.iter().map(|c| c.notional).collect();
        assert_eq!(notionals, vec![dec!(150), dec!(150), dec!(50)]);
        // Sizes follow the notionals at the shared price
        assert_eq!(children[2].size, dec!(100));
        let total: Decimal = notionals.iter().sum();
        assert_eq!(total, dec!(350));
    }

    #[test]
    fn test_split_no_op_under_cap() {
        let children = split_children(&order(dec!(100)), dec!(150));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].notional, dec!(100));

        let unsplit = split_children(&order(dec!(400)), Decimal::ZERO);
        assert_eq!(unsplit.len(), 1);
    }

    #[test]
    fn test_spendable_cash_reserves_fee() {
        assert_eq!(spendable_cash(dec!(101), dec!(0.01)), dec!(100));
        assert_eq!(spendable_cash(dec!(100), Decimal::ZERO), dec!(100));
        // Negative fee rate falls back to raw cash
        assert_eq!(spendable_cash(dec!(100), dec!(-0.5)), dec!(100));
    }

    #[test]
    fn test_live_per_trade_cap_tiers() {
        // Below threshold: fixed cap
        assert_eq!(
            live_per_trade_cap(dec!(5), dec!(10), dec!(1), dec!(0.1)),
            dec!(1)
        );
        // At/above threshold: fraction of cash
        assert_eq!(
            live_per_trade_cap(dec!(50), dec!(10), dec!(1), dec!(0.1)),
            dec!(5)
        );
        // No cash, no cap
        assert_eq!(
            live_per_trade_cap(Decimal::ZERO, dec!(10), dec!(1), dec!(0.1)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_clamp_child_tightest_limit_wins() {
        let ctx = ClampContext {
            spendable: dec!(8),
            per_trade_cap: dec!(5),
            exposure_headroom: dec!(6),
            min_notional: dec!(1),
        };
        let clamped = clamp_child(&order(dec!(10)), &ctx).unwrap();
        assert_eq!(clamped.notional, dec!(5));
        assert_eq!(clamped.size, dec!(10));
    }

    #[test]
    fn test_clamp_child_dust_is_dropped() {
        let ctx = ClampContext {
            spendable: dec!(0.5),
            per_trade_cap: dec!(100),
            exposure_headroom: dec!(100),
            min_notional: dec!(1),
        };
        assert!(clamp_child(&order(dec!(10)), &ctx).is_none());
    }

    #[test]
    fn test_clamp_child_untouched_when_within_limits() {
        let ctx = ClampContext {
            spendable: dec!(100),
            per_trade_cap: dec!(100),
            exposure_headroom: dec!(100),
            min_notional: dec!(1),
        };
        let child = order(dec!(10));
        let clamped = clamp_child(&child, &ctx).unwrap();
        assert_eq!(clamped, child);
    }
}
