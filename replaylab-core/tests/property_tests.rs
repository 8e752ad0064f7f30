//! Property tests for ledger and simulator invariants.
//!
//! Uses proptest to verify:
//! 1. P&L identity: equity minus starting cash equals realized plus unrealized
//! 2. Flat positions carry no cost basis
//! 3. A split is applied once however many steps pass
//! 4. Every enqueued settlement matures exactly once
//! 5. Maintenance breaches are monotone in the margin rate
//! 6. Locate increments never exceed the order or fire on buys
//! 7. Cash minus settled cash always equals what is still in flight
//! 8. Without fees or slippage, cash moves by exactly the signed fill notional

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use replaylab_core::domain::{
    Bar, BorrowLocateProfile, CorporateAction, MarketSlice, OrderIntent, OrderSide,
};
use replaylab_core::engine::guards::{incremental_short, maintenance_breach};
use replaylab_core::engine::{
    CorporateActionsLedger, ExecutionLedger, ExecutionSimulator, NormalizationMode,
    SettlementLedger, SimulatorConfig,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..500).prop_map(Decimal::from)
}

fn arb_price() -> impl Strategy<Value = Decimal> {
    (500i64..50_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_side() -> impl Strategy<Value = OrderSide> {
    prop_oneof![Just(OrderSide::Buy), Just(OrderSide::Sell)]
}

fn arb_fills() -> impl Strategy<Value = Vec<(OrderSide, Decimal, Decimal)>> {
    prop::collection::vec((arb_side(), arb_quantity(), arb_price()), 1..25)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
}

const TOLERANCE: Decimal = dec!(0.000001);

// ── 1-2. Ledger accounting ───────────────────────────────────────────

proptest! {
    #[test]
    fn equity_change_matches_total_pnl(fills in arb_fills(), mark in arb_price()) {
        let initial = dec!(1000000);
        let mut ledger = ExecutionLedger::new(initial);
        for (side, qty, price) in &fills {
            ledger.apply_fill(*side, *qty, *price, Decimal::ZERO);
        }
        let lhs = ledger.equity(mark) - initial;
        let rhs = ledger.realized_pnl() + ledger.unrealized_pnl(mark);
        prop_assert!((lhs - rhs).abs() < TOLERANCE, "{} vs {}", lhs, rhs);
    }

    #[test]
    fn flat_ledger_has_zero_average(fills in arb_fills()) {
        let mut ledger = ExecutionLedger::new(dec!(1000000));
        for (side, qty, price) in &fills {
            ledger.apply_fill(*side, *qty, *price, Decimal::ZERO);
            if ledger.is_flat() {
                prop_assert_eq!(ledger.average_price(), Decimal::ZERO);
            } else {
                prop_assert!(ledger.average_price() > Decimal::ZERO);
            }
        }
    }

    #[test]
    fn round_trip_closes_flat(qty in arb_quantity(), entry in arb_price(), exit in arb_price()) {
        let mut ledger = ExecutionLedger::new(dec!(1000000));
        ledger.apply_fill(OrderSide::Sell, qty, entry, Decimal::ZERO);
        let realized = ledger.apply_fill(OrderSide::Buy, qty, exit, Decimal::ZERO);
        prop_assert!(ledger.is_flat());
        prop_assert_eq!(realized, (entry - exit) * qty);
    }
}

// ── 3. Splits ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn split_applies_exactly_once(
        qty in arb_quantity(),
        ratio in prop_oneof![Just(dec!(2)), Just(dec!(3)), Just(dec!(0.5)), Just(dec!(10))],
        later_steps in 1usize..6,
    ) {
        let mut ledger = ExecutionLedger::new(dec!(1000000));
        ledger.apply_fill(OrderSide::Buy, qty, dec!(40), Decimal::ZERO);
        let actions = vec![CorporateAction::split(t0(), "ABC", ratio)];
        let mut actions = CorporateActionsLedger::new(actions, NormalizationMode::Raw).unwrap();

        let mut applied = 0;
        for step in 0..=later_steps {
            applied += actions.apply(t0() + Duration::days(step as i64), "ABC", &mut ledger).len();
        }
        prop_assert_eq!(applied, 1);
        prop_assert_eq!(ledger.position(), qty * ratio);
    }
}

// ── 4. Settlement ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn settlements_mature_once_in_date_order(
        items in prop::collection::vec((0u32..5, arb_price()), 1..20),
    ) {
        let mut queue = SettlementLedger::new();
        let mut total = Decimal::ZERO;
        for (lag, amount) in &items {
            queue.enqueue(t0(), *lag, "ABC", *amount, "trade");
            total += *amount;
        }
        prop_assert_eq!(queue.unsettled(), total);

        let mut matured = Decimal::ZERO;
        let mut last = None;
        for day in 0..6 {
            for item in queue.mature(t0() + Duration::days(day)) {
                if let Some(prev) = last {
                    prop_assert!(item.settle_date >= prev);
                }
                last = Some(item.settle_date);
                matured += item.amount;
            }
        }
        prop_assert_eq!(matured, total);
        prop_assert!(queue.is_empty());
    }
}

// ── 5-6. Guards ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn breach_at_lower_rate_implies_breach_at_higher(
        fills in arb_fills(),
        mark in arb_price(),
        low in 1u32..50,
        extra in 0u32..50,
    ) {
        let mut ledger = ExecutionLedger::new(dec!(20000));
        for (side, qty, price) in &fills {
            ledger.apply_fill(*side, *qty, *price, Decimal::ZERO);
        }
        let low_rate = Decimal::new(i64::from(low), 2);
        let high_rate = Decimal::new(i64::from(low + extra), 2);
        if maintenance_breach(&ledger, mark, low_rate).is_some() {
            prop_assert!(maintenance_breach(&ledger, mark, high_rate).is_some());
        }
    }

    #[test]
    fn locate_increment_is_bounded(
        position in -500i64..500,
        side in arb_side(),
        qty in arb_quantity(),
    ) {
        let increment = incremental_short(Decimal::from(position), side, qty);
        prop_assert!(increment >= Decimal::ZERO);
        prop_assert!(increment <= qty);
        if side == OrderSide::Buy {
            prop_assert_eq!(increment, Decimal::ZERO);
        }
    }
}

// ── 7. Simulator cash invariant ──────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn unsettled_is_cash_minus_settled(
        script in prop::collection::vec((arb_side(), arb_quantity(), arb_price()), 1..15),
        lag in 0u32..4,
    ) {
        let config = SimulatorConfig::new(dec!(50000))
            .with_commission(dec!(0.01))
            .with_settlement(lag, false);
        let mut sim = ExecutionSimulator::new(config, Vec::new()).unwrap();
        let profile = BorrowLocateProfile::default_for("ABC");

        for (day, (side, qty, price)) in script.iter().enumerate() {
            let slice = MarketSlice::from_bar(Bar {
                timestamp: t0() + Duration::days(day as i64),
                symbol: "ABC".into(),
                open: *price,
                high: *price,
                low: *price,
                close: *price,
                volume: dec!(1000000),
            });
            let intent = OrderIntent::market("ABC", *side, *qty);
            let out = sim.process_slice(&slice, "ABC", &[intent], &[], &profile);
            let p = &out.portfolio;
            prop_assert_eq!(p.cash - p.settled_cash, p.unsettled_cash);
            prop_assert!(p.unsettled_cash >= Decimal::ZERO);
        }
    }
}

// ── 8. Ledger conservation ───────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cash_moves_by_signed_notional_exactly(
        script in prop::collection::vec((arb_side(), arb_quantity(), arb_price()), 1..20),
    ) {
        let initial = dec!(1000000);
        let mut sim = ExecutionSimulator::new(SimulatorConfig::new(initial), Vec::new()).unwrap();
        let profile = BorrowLocateProfile::default_for("ABC");

        let mut traded = Decimal::ZERO;
        for (day, (side, qty, price)) in script.iter().enumerate() {
            let slice = MarketSlice::from_bar(Bar {
                timestamp: t0() + Duration::days(day as i64),
                symbol: "ABC".into(),
                open: *price,
                high: *price,
                low: *price,
                close: *price,
                volume: dec!(1000000),
            });
            let intent = OrderIntent::market("ABC", *side, *qty);
            let out = sim.process_slice(&slice, "ABC", &[intent], &[], &profile);
            prop_assert_eq!(out.fills.len(), 1);
            for fill in &out.fills {
                traded += fill.side.sign() * fill.quantity * fill.price;
            }
            prop_assert_eq!(out.portfolio.cash, initial - traded);
        }
    }
}
