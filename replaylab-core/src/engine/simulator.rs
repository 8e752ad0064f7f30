//! Per-slice execution simulator.
//!
//! `process_slice` runs one timestep in a fixed order:
//!
//! 1. corporate actions due at the timestamp
//! 2. matured settlements
//! 3. borrow financing on short positions
//! 4. delists (terminal ones force the position flat)
//! 5. new intents join the book; expired orders leave it; the book is worked
//!    (stop triggers, price, locate, settled cash, initial margin, fill)
//! 6. maintenance margin guard
//! 7. IOC cleanup and the portfolio snapshot
//!
//! Business outcomes are rows in [`SliceResult`]; nothing here returns an error
//! once the simulator is constructed.

use crate::domain::{
    Bar, BorrowLocateProfile, CashRejection, CashSettlement, CorporateAction,
    CorporateActionApplied, DelistApplied, DelistEvent, FinancingApplied, FinancingKind, Fill,
    LocateRejection, MarginEvent, MarginEventKind, MarginRejection, MarketSlice, Order,
    OrderActivation, OrderCancellation, OrderIdGen, OrderIntent, OrderSide, OrderTrigger, OrderType,
    PortfolioSnapshot, RejectionReason, EPSILON,
};
use crate::engine::config::SimulatorConfig;
use crate::engine::corporate_actions::CorporateActionsLedger;
use crate::engine::fees::FeeSchedule;
use crate::engine::fill_price::{resolve_fill_price, stop_triggered};
use crate::engine::guards::{self, LocateVerdict};
use crate::engine::ledger::ExecutionLedger;
use crate::engine::order_book::OrderBook;
use crate::engine::settlement::SettlementLedger;
use crate::error::ReplayError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Everything one timestep produced. Every sequence is scoped to the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceResult {
    /// Normalized intents accepted onto the book plus synthetic forced orders.
    pub orders: Vec<Order>,
    pub fills: Vec<Fill>,
    pub corporate_actions: Vec<CorporateActionApplied>,
    pub delists: Vec<DelistApplied>,
    pub financing: Vec<FinancingApplied>,
    pub locate_rejections: Vec<LocateRejection>,
    pub margin_rejections: Vec<MarginRejection>,
    pub margin_events: Vec<MarginEvent>,
    pub cash_settlements: Vec<CashSettlement>,
    pub cash_rejections: Vec<CashRejection>,
    pub activations: Vec<OrderActivation>,
    pub triggers: Vec<OrderTrigger>,
    pub cancellations: Vec<OrderCancellation>,
    pub portfolio: PortfolioSnapshot,
}

impl SliceResult {
    fn empty(portfolio: PortfolioSnapshot) -> Self {
        Self {
            orders: Vec::new(),
            fills: Vec::new(),
            corporate_actions: Vec::new(),
            delists: Vec::new(),
            financing: Vec::new(),
            locate_rejections: Vec::new(),
            margin_rejections: Vec::new(),
            margin_events: Vec::new(),
            cash_settlements: Vec::new(),
            cash_rejections: Vec::new(),
            activations: Vec::new(),
            triggers: Vec::new(),
            cancellations: Vec::new(),
            portfolio,
        }
    }

    pub fn rejection_count(&self) -> usize {
        self.locate_rejections.len() + self.margin_rejections.len() + self.cash_rejections.len()
    }
}

/// Owns the ledger, the settlement queue, the order book and the
/// corporate-action cursor for one run.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    config: SimulatorConfig,
    fees: FeeSchedule,
    ledger: ExecutionLedger,
    settlements: SettlementLedger,
    corporate_actions: CorporateActionsLedger,
    book: OrderBook,
    ids: OrderIdGen,
    /// Timestamp of the previous slice. `None` before the first slice.
    last_timestamp: Option<DateTime<Utc>>,
}

impl ExecutionSimulator {
    pub fn new(
        config: SimulatorConfig,
        corporate_actions: Vec<CorporateAction>,
    ) -> Result<Self, ReplayError> {
        config.validate()?;
        let config = config.clamped();
        Ok(Self {
            fees: config.fees(),
            ledger: ExecutionLedger::new(config.initial_cash),
            settlements: SettlementLedger::new(),
            corporate_actions: CorporateActionsLedger::new(corporate_actions, config.normalization)?,
            book: OrderBook::new(),
            ids: OrderIdGen::default(),
            last_timestamp: None,
            config,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ExecutionLedger {
        &self.ledger
    }

    pub fn unsettled_cash(&self) -> Decimal {
        self.settlements.unsettled()
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Run one timestep. `symbol` is the canonical symbol for the step; when
    /// blank it falls back to the slice's bar or tick symbol.
    pub fn process_slice(
        &mut self,
        slice: &MarketSlice,
        symbol: &str,
        intents: &[OrderIntent],
        due_delists: &[DelistEvent],
        borrow: &BorrowLocateProfile,
    ) -> SliceResult {
        let ts = slice.timestamp;
        let symbol = resolve_symbol(slice, symbol);
        let bar = slice.bar.as_ref();
        let mark = slice.mark_price();
        let mut out = SliceResult::empty(self.snapshot(ts, &symbol, mark));

        out.corporate_actions = self.corporate_actions.apply(ts, &symbol, &mut self.ledger);
        out.cash_settlements = self.mature_settlements(ts);

        out.financing.extend(self.accrue_borrow(ts, &symbol, mark, borrow));

        for delist in due_delists {
            self.apply_delist(ts, &symbol, mark, delist, &mut out);
        }

        for intent in intents {
            if intent.quantity <= Decimal::ZERO {
                continue;
            }
            let order = Order::from_intent(intent, ts, &mut self.ids);
            warn_if_unpriceable(&order);
            out.orders.push(order.clone());
            self.book.submit(order);
        }
        out.cancellations.extend(self.book.expire(ts));
        self.work_book(ts, bar, mark, borrow, &mut out);

        if let Some(breach) = guards::maintenance_breach(
            &self.ledger,
            mark,
            self.config.maintenance_margin_rate,
        ) {
            let position_before = self.ledger.position();
            info!(
                symbol = %symbol,
                equity = %breach.equity,
                requirement = %breach.requirement,
                position = %position_before,
                "maintenance margin breached, liquidating"
            );
            self.liquidate(ts, &symbol, mark, "margin", &mut out);
            out.margin_events.push(MarginEvent {
                timestamp: ts,
                symbol: symbol.clone(),
                kind: MarginEventKind::MaintenanceMarginLiquidation,
                equity: breach.equity,
                maintenance_requirement: breach.requirement,
                position_quantity: position_before,
                market_price: mark,
                cash_after: self.ledger.cash(),
                source: "margin".to_string(),
            });
        }

        out.cancellations.extend(self.book.end_of_slice(ts));

        self.last_timestamp = Some(ts);
        out.portfolio = self.snapshot(ts, &symbol, mark);
        out
    }

    // ── Steps ──────────────────────────────────────────────────────────

    fn mature_settlements(&mut self, ts: DateTime<Utc>) -> Vec<CashSettlement> {
        let matured = self.settlements.mature(ts);
        let mut in_flight: Decimal = matured.iter().map(|p| p.amount).sum();
        let mut rows = Vec::with_capacity(matured.len());
        for item in matured {
            self.ledger.credit_settled(item.amount);
            in_flight -= item.amount;
            rows.push(CashSettlement {
                timestamp: ts,
                symbol: item.symbol,
                amount: item.amount,
                settled_cash: self.ledger.settled_cash(),
                unsettled_cash: self.settlements.unsettled() + in_flight,
                settle_date: item.settle_date,
                source: item.source,
            });
        }
        rows
    }

    /// Charge borrow for the time since the previous slice. Gaps shorter
    /// than a day charge nothing.
    fn accrue_borrow(
        &mut self,
        ts: DateTime<Utc>,
        symbol: &str,
        mark: Decimal,
        profile: &BorrowLocateProfile,
    ) -> Option<FinancingApplied> {
        let previous = self.last_timestamp?;
        let short = self.ledger.short_quantity();
        if short <= Decimal::ZERO || mark <= Decimal::ZERO || profile.borrow_rate_bps <= Decimal::ZERO {
            return None;
        }
        let elapsed_ms = (ts - previous).num_milliseconds();
        if elapsed_ms < MILLIS_PER_DAY {
            return None;
        }

        // One division at the end keeps whole-day charges exact.
        let charge = short * mark * profile.borrow_rate_bps * Decimal::from(elapsed_ms)
            / (dec!(3650000) * Decimal::from(MILLIS_PER_DAY));
        if charge <= Decimal::ZERO {
            return None;
        }
        self.ledger.adjust_cash(-charge);
        debug!(symbol, short = %short, charge = %charge, "borrow financing charged");
        let row = FinancingApplied {
            timestamp: ts,
            symbol: symbol.to_string(),
            kind: FinancingKind::Borrow,
            position_quantity: self.ledger.position(),
            market_price: mark,
            rate_bps: profile.borrow_rate_bps,
            quantity_applied: short,
            cash_delta: -charge,
            cash_after: self.ledger.cash(),
            source: profile.source.clone(),
        };
        Some(row)
    }

    fn apply_delist(
        &mut self,
        ts: DateTime<Utc>,
        symbol: &str,
        mark: Decimal,
        delist: &DelistEvent,
        out: &mut SliceResult,
    ) {
        let position_before = self.ledger.position();
        if delist.is_terminal {
            let source = if delist.source.trim().is_empty() {
                "delist"
            } else {
                delist.source.as_str()
            };
            info!(symbol, position = %position_before, "terminal delist, liquidating");
            self.liquidate(ts, symbol, mark, source, out);
        }
        out.delists.push(DelistApplied {
            timestamp: delist.effective_at,
            symbol: delist.symbol.clone(),
            is_terminal: delist.is_terminal,
            position_before,
            position_after: self.ledger.position(),
            fill_price: mark,
            cash_after: self.ledger.cash(),
            source: delist.source.clone(),
        });
    }

    /// Force the whole position flat at the mark with a synthetic market order.
    fn liquidate(
        &mut self,
        ts: DateTime<Utc>,
        symbol: &str,
        mark: Decimal,
        source: &str,
        out: &mut SliceResult,
    ) {
        let position = self.ledger.position();
        if position.is_zero() || mark <= Decimal::ZERO {
            return;
        }
        let side = if position > Decimal::ZERO {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let order = Order::forced(ts, symbol, side, position.abs(), source, &mut self.ids);
        let fill = self.execute(&order, ts, order.quantity, mark, order.quantity, Decimal::ZERO);
        out.orders.push(order);
        out.fills.push(fill);
    }

    fn work_book(
        &mut self,
        ts: DateTime<Utc>,
        bar: Option<&Bar>,
        mark: Decimal,
        borrow: &BorrowLocateProfile,
        out: &mut SliceResult,
    ) {
        // `None` means unlimited: no bar, no volume to participate in.
        let mut capacity =
            bar.map(|b| (b.volume * self.config.max_fill_participation_rate).max(Decimal::ZERO));

        for seq in self.book.processing_order(self.config.enforce_queue_priority) {
            if capacity.is_some_and(|c| c <= Decimal::ZERO) {
                break;
            }
            let Some(resting) = self.book.get_mut(seq) else {
                continue;
            };
            if !resting.active {
                continue;
            }

            if resting.order.order_type.is_stop() && !resting.triggered {
                let stop = resting.order.stop_price.unwrap_or(Decimal::ZERO);
                if stop_triggered(resting.order.side, stop, bar, mark) {
                    resting.triggered = true;
                    resting.triggered_at = Some(ts);
                    out.triggers.push(OrderTrigger {
                        timestamp: ts,
                        order_id: resting.order.order_id.clone(),
                        symbol: resting.order.symbol.clone(),
                        side: resting.order.side,
                        order_type: resting.order.order_type,
                        stop_price: stop,
                        limit_price: resting.order.limit_price,
                        submitted_at: resting.order.timestamp,
                        source: resting.order.source.clone(),
                    });
                }
            }
            if !resting.can_execute() {
                continue;
            }

            let Some(price) = resolve_fill_price(
                resting.executable_type(),
                resting.order.side,
                resting.order.limit_price,
                bar,
                mark,
                self.config.slippage_bps,
            ) else {
                continue;
            };
            let quantity = match capacity {
                Some(c) => resting.remaining.min(c),
                None => resting.remaining,
            };
            if quantity <= Decimal::ZERO {
                continue;
            }
            let remaining_before = resting.remaining;
            let order = resting.order.clone();

            if !self.validate_and_fill(&order, ts, quantity, price, remaining_before, borrow, out) {
                self.book.remove(seq);
                continue;
            }

            let remaining = remaining_before - quantity;
            if let Some(resting) = self.book.get_mut(seq) {
                resting.remaining = remaining;
            }
            if let Some(c) = capacity.as_mut() {
                *c -= quantity;
            }
            if remaining <= EPSILON {
                out.activations.extend(self.book.complete(seq, ts));
            }
            if let Some(group) = order.oco_group.as_deref() {
                out.cancellations
                    .extend(self.book.cancel_oco_siblings(seq, group, ts));
            }
        }
    }

    /// Locate, settled-cash and initial-margin checks, then the fill.
    /// Returns false (after recording the rejection) if any check fails;
    /// a rejected order leaves the ledger untouched.
    #[allow(clippy::too_many_arguments)]
    fn validate_and_fill(
        &mut self,
        order: &Order,
        ts: DateTime<Utc>,
        quantity: Decimal,
        price: Decimal,
        remaining_before: Decimal,
        borrow: &BorrowLocateProfile,
        out: &mut SliceResult,
    ) -> bool {
        let locate = guards::check_locate(self.ledger.position(), order.side, quantity, borrow);
        if locate == LocateVerdict::Unavailable {
            debug!(order_id = %order.order_id, quantity = %quantity, "locate unavailable");
            out.locate_rejections.push(LocateRejection {
                timestamp: ts,
                order_id: order.order_id.clone(),
                symbol: order.symbol.clone(),
                side: order.side,
                quantity,
                reason: RejectionReason::LocateUnavailable,
                locate_available: borrow.locate_available,
                locate_fee_per_share: borrow.locate_fee_per_share,
                source: borrow.source.clone(),
            });
            return false;
        }

        if self.config.enforce_settled_cash {
            if let Some(required) = guards::check_settled_cash(
                self.ledger.settled_cash(),
                order.side,
                quantity,
                price,
                self.fees.commission_per_unit,
            ) {
                debug!(order_id = %order.order_id, required = %required, "insufficient settled cash");
                out.cash_rejections.push(CashRejection {
                    timestamp: ts,
                    order_id: order.order_id.clone(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    quantity,
                    required_settled_cash: required,
                    available_settled_cash: self.ledger.settled_cash(),
                    reason: RejectionReason::InsufficientSettledCash,
                    source: order.source.clone(),
                });
                return false;
            }
        }

        let fees = self.fees.total(order.side, quantity, price);
        let (incremental_short, locate_fee) = match locate {
            LocateVerdict::Granted {
                incremental_short,
                fee,
            } => (incremental_short, fee),
            _ => (Decimal::ZERO, Decimal::ZERO),
        };
        if let Err(projection) = guards::check_initial_margin(
            &self.ledger,
            order.side,
            quantity,
            price,
            fees + locate_fee,
            self.config.initial_margin_rate,
        ) {
            debug!(
                order_id = %order.order_id,
                equity = %projection.equity,
                initial_margin = %projection.initial_margin,
                "initial margin breach"
            );
            out.margin_rejections.push(MarginRejection {
                timestamp: ts,
                order_id: order.order_id.clone(),
                symbol: order.symbol.clone(),
                side: order.side,
                quantity,
                fill_price: price,
                projected_equity: projection.equity,
                projected_initial_margin: projection.initial_margin,
                reason: RejectionReason::InitialMarginBreach,
                source: order.source.clone(),
            });
            return false;
        }

        if locate_fee > Decimal::ZERO {
            self.ledger.adjust_cash(-locate_fee);
            out.financing.push(FinancingApplied {
                timestamp: ts,
                symbol: order.symbol.clone(),
                kind: FinancingKind::LocateFee,
                position_quantity: self.ledger.position(),
                market_price: price,
                rate_bps: Decimal::ZERO,
                quantity_applied: incremental_short,
                cash_delta: -locate_fee,
                cash_after: self.ledger.cash(),
                source: borrow.source.clone(),
            });
        }

        let fill = self.execute(
            order,
            ts,
            quantity,
            price,
            order.quantity,
            remaining_before - quantity,
        );
        out.fills.push(fill);
        true
    }

    /// Book a fill on the ledger and apply its settlement effects.
    fn execute(
        &mut self,
        order: &Order,
        ts: DateTime<Utc>,
        quantity: Decimal,
        price: Decimal,
        requested: Decimal,
        remaining: Decimal,
    ) -> Fill {
        let fees = self.fees.total(order.side, quantity, price);
        let realized = self.ledger.apply_fill(order.side, quantity, price, fees);

        let notional = quantity * price;
        match order.side {
            OrderSide::Buy => self.ledger.debit_settled(notional + fees),
            OrderSide::Sell => {
                self.ledger.debit_settled(fees);
                if self.config.settlement_lag_days == 0 {
                    self.ledger.credit_settled(notional);
                } else {
                    self.settlements.enqueue(
                        ts,
                        self.config.settlement_lag_days,
                        &order.symbol,
                        notional,
                        &order.source,
                    );
                }
            }
        }

        debug!(
            order_id = %order.order_id,
            side = %order.side,
            quantity = %quantity,
            price = %price,
            fees = %fees,
            position = %self.ledger.position(),
            "fill"
        );

        Fill {
            timestamp: ts,
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity,
            requested_quantity: requested,
            remaining_quantity: remaining,
            is_partial: remaining > EPSILON,
            submitted_at: order.timestamp,
            order_type: order.order_type,
            price,
            commission: fees,
            realized_pnl_delta: realized,
            source: order.source.clone(),
        }
    }

    fn snapshot(&self, ts: DateTime<Utc>, symbol: &str, mark: Decimal) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: ts,
            symbol: symbol.to_string(),
            position_quantity: self.ledger.position(),
            average_price: self.ledger.average_price(),
            market_price: mark,
            cash: self.ledger.cash(),
            settled_cash: self.ledger.settled_cash(),
            unsettled_cash: self.settlements.unsettled(),
            realized_pnl: self.ledger.realized_pnl(),
            unrealized_pnl: self.ledger.unrealized_pnl(mark),
            equity: self.ledger.equity(mark),
        }
    }
}

fn resolve_symbol(slice: &MarketSlice, symbol: &str) -> String {
    let symbol = symbol.trim();
    if !symbol.is_empty() {
        return symbol.to_ascii_uppercase();
    }
    slice
        .bar
        .as_ref()
        .map(|b| b.symbol.as_str())
        .or_else(|| slice.tick.as_ref().map(|t| t.symbol.as_str()))
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| "N/A".to_string())
}

fn warn_if_unpriceable(order: &Order) {
    let missing = |p: Option<Decimal>| p.map_or(true, |p| p <= Decimal::ZERO);
    if order.order_type.is_stop() && missing(order.stop_price) {
        warn!(order_id = %order.order_id, "stop order without a positive stop price will never trigger");
    }
    if order.order_type.after_trigger() == OrderType::Limit && missing(order.limit_price) {
        warn!(order_id = %order.order_id, "limit order without a positive limit price will never fill");
    }
}
