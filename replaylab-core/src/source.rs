//! Strategy plug-point: whatever proposes orders for each slice.

use crate::domain::{MarketSlice, OrderIntent, PortfolioSnapshot};

/// Supplies order intents per slice. The engine never looks behind this trait.
///
/// `portfolio` is the snapshot from the previous step (`None` on the first),
/// so sources can size orders without reaching into the ledger.
pub trait IntentSource {
    fn intents(
        &mut self,
        slice: &MarketSlice,
        portfolio: Option<&PortfolioSnapshot>,
    ) -> Vec<OrderIntent>;

    fn name(&self) -> &str {
        "custom"
    }
}

/// Proposes nothing. Useful for replaying reference data alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntents;

impl IntentSource for NoIntents {
    fn intents(&mut self, _: &MarketSlice, _: Option<&PortfolioSnapshot>) -> Vec<OrderIntent> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "none"
    }
}

impl<F> IntentSource for F
where
    F: FnMut(&MarketSlice, Option<&PortfolioSnapshot>) -> Vec<OrderIntent>,
{
    fn intents(
        &mut self,
        slice: &MarketSlice,
        portfolio: Option<&PortfolioSnapshot>,
    ) -> Vec<OrderIntent> {
        self(slice, portfolio)
    }
}
