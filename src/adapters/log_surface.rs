//! Headless chart surface: reports what a renderer would draw through the
//! tracing subscriber.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::candle::{Candle, Timestamp};
use crate::domain::overlay::PriceLineAnnotation;
use crate::domain::trade::TradeId;
use crate::ports::chart_surface::ChartSurface;

#[derive(Debug, Default)]
pub struct LogSurface {
    last: Option<Candle>,
    len: usize,
    size: Option<(u32, u32)>,
    lines: BTreeMap<TradeId, PriceLineAnnotation>,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last(&self) -> Option<&Candle> {
        self.last.as_ref()
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn price_lines(&self) -> impl Iterator<Item = &PriceLineAnnotation> {
        self.lines.values()
    }
}

pub fn format_time(time: Timestamp) -> String {
    match DateTime::<Utc>::from_timestamp(time, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => time.to_string(),
    }
}

impl ChartSurface for LogSurface {
    fn set_data(&mut self, candles: &[Candle]) {
        let tail = candles.last().copied();
        let changed_tail = tail != self.last || candles.len() != self.len;
        self.len = candles.len();
        self.last = tail;
        if !changed_tail {
            return;
        }
        match tail {
            Some(c) => tracing::info!(
                "{} candles, last {} o {:.2} h {:.2} l {:.2} c {:.2}",
                candles.len(),
                format_time(c.time),
                c.open,
                c.high,
                c.low,
                c.close
            ),
            None => tracing::info!("chart cleared"),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = Some((width, height));
        tracing::debug!("surface resized to {width}x{height}");
    }

    fn add_price_line(&mut self, line: &PriceLineAnnotation) {
        tracing::info!(
            "price line #{} {} at {} ({})",
            line.trade_id,
            line.title,
            line.price_label(),
            line.color
        );
        self.lines.insert(line.trade_id, line.clone());
    }

    fn remove_price_line(&mut self, trade_id: TradeId) {
        if self.lines.remove(&trade_id).is_some() {
            tracing::info!("price line #{trade_id} removed");
        }
    }
}
