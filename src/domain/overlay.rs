//! Price-line annotations for open trades, diffed against what was drawn.

use std::collections::HashMap;

use super::trade::{Action, Trade, TradeId};
use crate::ports::chart_surface::ChartSurface;

pub const BUY_LINE_COLOR: &str = "#1fb369";
pub const SELL_LINE_COLOR: &str = "#ad4b44";

#[derive(Debug, Clone, PartialEq)]
pub struct PriceLineAnnotation {
    pub trade_id: TradeId,
    pub price: f64,
    pub color: &'static str,
    pub title: String,
}

impl PriceLineAnnotation {
    pub fn for_trade(trade: &Trade) -> Self {
        let color = match trade.action {
            Action::Buy => BUY_LINE_COLOR,
            Action::Sell => SELL_LINE_COLOR,
        };
        PriceLineAnnotation {
            trade_id: trade.id,
            price: trade.entry_price,
            color,
            title: format!("{} {:.2}", trade.action.label(), trade.entry_price),
        }
    }

    pub fn price_label(&self) -> String {
        format!("{:.2}", self.price)
    }
}

/// Lines to add and ids to remove, both in ascending id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayDiff {
    pub added: Vec<PriceLineAnnotation>,
    pub removed: Vec<TradeId>,
}

impl OverlayDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Removals go first so a re-drawn id never shows twice.
    pub fn apply_to<C: ChartSurface + ?Sized>(&self, surface: &mut C) {
        for id in &self.removed {
            surface.remove_price_line(*id);
        }
        for line in &self.added {
            surface.add_price_line(line);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriceOverlayManager {
    drawn: HashMap<TradeId, PriceLineAnnotation>,
}

impl PriceOverlayManager {
    pub fn new() -> Self {
        PriceOverlayManager::default()
    }

    pub fn reconcile<'a, I>(&mut self, trades: I) -> OverlayDiff
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        let wanted: HashMap<TradeId, PriceLineAnnotation> = trades
            .into_iter()
            .map(|t| (t.id, PriceLineAnnotation::for_trade(t)))
            .collect();

        let mut removed: Vec<TradeId> = self
            .drawn
            .iter()
            .filter(|(id, line)| wanted.get(id) != Some(line))
            .map(|(id, _)| *id)
            .collect();
        removed.sort_unstable();

        let mut added: Vec<PriceLineAnnotation> = wanted
            .iter()
            .filter(|(id, line)| self.drawn.get(id) != Some(line))
            .map(|(_, line)| line.clone())
            .collect();
        added.sort_by_key(|line| line.trade_id);

        self.drawn = wanted;
        OverlayDiff { added, removed }
    }

    pub fn len(&self) -> usize {
        self.drawn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty()
    }

    pub fn drawn(&self) -> Vec<&PriceLineAnnotation> {
        let mut lines: Vec<&PriceLineAnnotation> = self.drawn.values().collect();
        lines.sort_by_key(|line| line.trade_id);
        lines
    }
}
