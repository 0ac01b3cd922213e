//! The event-loop owner: session state, live subscription, trade port and
//! chart surface behind one mutable handle.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::candle::{Interval, SubscriptionKey};
use crate::domain::error::ChartdeskError;
use crate::domain::ledger::PositionView;
use crate::domain::session::{Applied, ChartSession, Delivery};
use crate::domain::trade::{Action, Trade, TradeId};
use crate::feed::{
    DeliveryReceiver, DeliverySender, FeedMode, Subscription, UpdateSource, load_history,
};
use crate::ports::chart_surface::ChartSurface;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::tick_stream_port::TickStreamPort;
use crate::ports::trade_port::TradePort;

pub struct ChartController<M, S, T, C> {
    session: ChartSession,
    market: Arc<M>,
    source: UpdateSource<M, S>,
    trades: T,
    surface: C,
    tx: DeliverySender,
    rx: DeliveryReceiver,
    history: Option<Subscription>,
    live: Option<Subscription>,
}

impl<M, S, T, C> ChartController<M, S, T, C>
where
    M: MarketDataPort + Send + Sync + 'static,
    S: TickStreamPort + Send + Sync + 'static,
    T: TradePort,
    C: ChartSurface,
{
    pub fn new(market: Arc<M>, source: UpdateSource<M, S>, trades: T, surface: C) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        ChartController {
            session: ChartSession::new(),
            market,
            source,
            trades,
            surface,
            tx,
            rx,
            history: None,
            live: None,
        }
    }

    pub fn session(&self) -> &ChartSession {
        &self.session
    }

    pub fn surface(&self) -> &C {
        &self.surface
    }

    pub fn mode(&self) -> FeedMode {
        self.source.mode()
    }

    pub fn key(&self) -> Option<&SubscriptionKey> {
        self.session.key()
    }

    pub fn positions(&self) -> Vec<PositionView> {
        self.session.positions()
    }

    /// Switch to `key`. The previous subscription is torn down before the
    /// new one starts, so at most one live source exists at a time.
    pub async fn subscribe(&mut self, key: SubscriptionKey) {
        self.stop_tasks().await;
        let epoch = self.session.begin(key.clone());
        self.surface.set_data(&[]);
        self.sync_overlays();

        self.history = Some(load_history(
            Arc::clone(&self.market),
            key.clone(),
            epoch,
            self.tx.clone(),
        ));
        self.live = Some(self.source.subscribe(key, epoch, self.tx.clone()));
    }

    pub async fn switch_interval(&mut self, interval: Interval) -> Result<(), ChartdeskError> {
        let key = self
            .session
            .key()
            .ok_or(ChartdeskError::NotSubscribed)?
            .with_interval(interval);
        self.subscribe(key).await;
        Ok(())
    }

    pub async fn switch_ticker(&mut self, ticker: &str) -> Result<(), ChartdeskError> {
        let interval = self
            .session
            .key()
            .map(SubscriptionKey::interval)
            .ok_or(ChartdeskError::NotSubscribed)?;
        let key = SubscriptionKey::new(ticker, interval)?;
        self.subscribe(key).await;
        Ok(())
    }

    /// Stop delivery without starting anything new.
    pub async fn unsubscribe(&mut self) {
        self.stop_tasks().await;
        self.session.end();
    }

    /// Wait for the next delivery from any task.
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    pub fn handle(&mut self, delivery: Delivery) -> Applied {
        let applied = self.session.apply(delivery);
        if applied.series_changed() {
            self.surface.set_data(self.session.candles());
        }
        applied
    }

    /// Apply everything already queued; returns how many deliveries were read.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            self.handle(delivery);
            count += 1;
        }
        count
    }

    /// Open at the latest candle of the current series.
    pub async fn open_trade(&mut self, action: Action) -> Result<Trade, ChartdeskError> {
        let ticker = self
            .session
            .key()
            .map(|k| k.ticker().to_string())
            .ok_or(ChartdeskError::NotSubscribed)?;
        let candle = *self
            .session
            .latest_candle()
            .ok_or(ChartdeskError::NotSubscribed)?;
        let trade = self
            .session
            .ledger_mut()
            .open(&self.trades, &ticker, action, &candle)
            .await?;
        self.sync_overlays();
        Ok(trade)
    }

    pub async fn close_trade(&mut self, id: TradeId) -> Result<Trade, ChartdeskError> {
        let trade = self.session.ledger_mut().close(&self.trades, id).await?;
        self.sync_overlays();
        Ok(trade)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }

    pub async fn shutdown(mut self) -> C {
        self.unsubscribe().await;
        self.surface
    }

    fn sync_overlays(&mut self) {
        let diff = self.session.sync_overlays();
        if !diff.is_empty() {
            diff.apply_to(&mut self.surface);
        }
    }

    async fn stop_tasks(&mut self) {
        if let Some(history) = self.history.take() {
            history.unsubscribe().await;
        }
        if let Some(live) = self.live.take() {
            live.unsubscribe().await;
        }
    }
}
