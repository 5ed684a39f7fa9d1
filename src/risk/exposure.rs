//! Portfolio exposure accounting over persisted orders and live positions

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::state::{OrderRecord, OrderStatus};

/// Sum of `total_notional` across records in any of `statuses`.
pub fn open_orders_notional(
    orders: &BTreeMap<String, OrderRecord>,
    statuses: &[OrderStatus],
) -> Decimal {
    orders
        .values()
        .filter(|record| statuses.contains(&record.status))
        .map(|record| record.total_notional)
        .sum()
}

/// Live open notional: `submitted` records count in full; `filled` records
/// count only while the position snapshot no longer shows the token (the
/// position value covers it otherwise).
pub fn live_open_orders_notional(
    orders: &BTreeMap<String, OrderRecord>,
    token_sizes: &HashMap<String, Decimal>,
) -> Decimal {
    orders
        .values()
        .filter_map(|record| match record.status {
            OrderStatus::Submitted => Some(record.total_notional),
            OrderStatus::Filled => {
                let held = token_sizes
                    .get(&record.token_id)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                if held > Decimal::ZERO {
                    None
                } else {
                    Some(record.total_notional)
                }
            }
            _ => None,
        })
        .sum()
}

/// Total-exposure cap tiered on equity: a fixed cap below the threshold,
/// `equity * fraction` above it. A non-positive fraction disables the cap
/// entirely (returns zero).
pub fn tiered_cap(
    equity: Decimal,
    threshold: Decimal,
    below_cap: Decimal,
    fraction: Decimal,
) -> Decimal {
    if fraction <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if threshold > Decimal::ZERO && equity < threshold {
        below_cap.max(Decimal::ZERO)
    } else {
        (equity * fraction).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Outcome;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(token_id: &str, status: OrderStatus, notional: Decimal) -> OrderRecord {
        OrderRecord {
            market_slug: format!("slug-{token_id}"),
            outcome: Outcome::Up,
            token_id: token_id.to_string(),
            asset_symbol: "BTC".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            status,
            order_ids: Vec::new(),
            total_notional: notional,
            total_size: Decimal::ZERO,
            fee_paid: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_error: None,
            result: None,
            settled_at: None,
            pnl: None,
        }
    }

    fn orders(records: Vec<OrderRecord>) -> BTreeMap<String, OrderRecord> {
        records.into_iter().map(|r| (r.key(), r)).collect()
    }

    #[test]
    fn test_open_orders_notional_filters_statuses() {
        let orders = orders(vec![
            record("1", OrderStatus::Submitted, dec!(3)),
            record("2", OrderStatus::Filled, dec!(4)),
            record("3", OrderStatus::Settled, dec!(100)),
            record("4", OrderStatus::Error, dec!(50)),
        ]);
        let total =
            open_orders_notional(&orders, &[OrderStatus::Submitted, OrderStatus::Filled]);
        assert_eq!(total, dec!(7));
    }

    #[test]
    fn test_live_notional_skips_filled_with_visible_position() {
        let orders = orders(vec![
            record("1", OrderStatus::Submitted, dec!(3)),
            record("2", OrderStatus::Filled, dec!(4)),
            record("3", OrderStatus::Filled, dec!(5)),
        ]);
        let mut token_sizes = HashMap::new();
        token_sizes.insert("2".to_string(), dec!(10));
        // Token 2 shows in positions, so only the submitted record and the
        // invisible filled record count
        assert_eq!(live_open_orders_notional(&orders, &token_sizes), dec!(8));
    }

    #[test]
    fn test_tiered_cap() {
        assert_eq!(tiered_cap(dec!(5), dec!(10), dec!(1), dec!(0.1)), dec!(1));
        assert_eq!(tiered_cap(dec!(100), dec!(10), dec!(1), dec!(0.1)), dec!(10));
        // Disabled fraction
        assert_eq!(
            tiered_cap(dec!(100), dec!(10), dec!(1), Decimal::ZERO),
            Decimal::ZERO
        );
        // No threshold means the fraction always applies
        assert_eq!(
            tiered_cap(dec!(5), Decimal::ZERO, dec!(1), dec!(0.1)),
            dec!(0.5)
        );
    }
}
