#![allow(dead_code)]

use chartdesk::domain::candle::{Candle, Interval, SubscriptionKey};
use chartdesk::domain::error::ChartdeskError;
use chartdesk::domain::overlay::PriceLineAnnotation;
use chartdesk::domain::trade::{Trade, TradeId, TradeRequest};
use chartdesk::ports::chart_surface::ChartSurface;
use chartdesk::ports::market_data_port::MarketDataPort;
use chartdesk::ports::tick_stream_port::{TickStream, TickStreamPort};
use chartdesk::ports::trade_port::TradePort;
use futures_util::stream;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn key(ticker: &str, interval: Interval) -> SubscriptionKey {
    SubscriptionKey::new(ticker, interval).unwrap()
}

/// Flat candle whose buy quote equals its close.
pub fn make_candle(time: i64, close: f64) -> Candle {
    Candle {
        time,
        open: close,
        high: close,
        low: close,
        close,
        buy_price: Some(close),
    }
}

pub fn frame(candle: &Candle) -> String {
    serde_json::to_string(candle).unwrap()
}

/// Tracks the high-water mark of a counter while guards are alive.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    pub fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(Arc::clone(self))
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

pub struct GaugeGuard(Arc<Gauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockMarketData {
    history: HashMap<String, Vec<Candle>>,
    latest: Mutex<HashMap<String, VecDeque<Result<Candle, String>>>>,
    latency: Duration,
    pub latest_calls: AtomicUsize,
    pub in_flight: Arc<Gauge>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            history: HashMap::new(),
            latest: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            latest_calls: AtomicUsize::new(0),
            in_flight: Arc::new(Gauge::default()),
        }
    }

    pub fn with_history(mut self, key: &SubscriptionKey, candles: Vec<Candle>) -> Self {
        self.history.insert(key.to_string(), candles);
        self
    }

    /// Queue a latest-candle answer. The last queued answer repeats.
    pub fn with_latest(self, key: &SubscriptionKey, candle: Candle) -> Self {
        self.queue(key, Ok(candle));
        self
    }

    pub fn with_latest_error(self, key: &SubscriptionKey, reason: &str) -> Self {
        self.queue(key, Err(reason.to_string()));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    fn queue(&self, key: &SubscriptionKey, answer: Result<Candle, String>) {
        self.latest
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(answer);
    }

    fn next_latest(&self, key: &SubscriptionKey) -> Result<Candle, String> {
        let mut latest = self.latest.lock().unwrap();
        let Some(queue) = latest.get_mut(&key.to_string()) else {
            return Err(format!("no data for {key}"));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(format!("no data for {key}")))
        }
    }
}

impl MarketDataPort for MockMarketData {
    async fn fetch_series(&self, key: &SubscriptionKey) -> Result<Vec<Candle>, ChartdeskError> {
        self.history
            .get(&key.to_string())
            .cloned()
            .ok_or_else(|| ChartdeskError::transport(format!("404 for {key}")))
    }

    async fn fetch_latest(&self, key: &SubscriptionKey) -> Result<Candle, ChartdeskError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.in_flight.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.next_latest(key).map_err(ChartdeskError::transport)
    }
}

#[derive(Debug, Clone)]
pub enum StreamStep {
    Frame(String),
    Wait(Duration),
    Fail(String),
    Close,
}

/// Scripted push channel. A script that runs out leaves the connection open.
pub struct MockTickStream {
    scripts: HashMap<String, Vec<StreamStep>>,
    refuse: Option<String>,
    pub connects: AtomicUsize,
    pub open: Arc<Gauge>,
}

impl MockTickStream {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            refuse: None,
            connects: AtomicUsize::new(0),
            open: Arc::new(Gauge::default()),
        }
    }

    pub fn with_script(mut self, key: &SubscriptionKey, steps: Vec<StreamStep>) -> Self {
        self.scripts.insert(key.to_string(), steps);
        self
    }

    pub fn refusing(mut self, reason: &str) -> Self {
        self.refuse = Some(reason.to_string());
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl TickStreamPort for MockTickStream {
    async fn connect(&self, key: &SubscriptionKey) -> Result<TickStream, ChartdeskError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.refuse {
            return Err(ChartdeskError::transport(reason.clone()));
        }
        let steps: VecDeque<StreamStep> = self
            .scripts
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default()
            .into();
        let guard = self.open.enter();

        let stream = stream::unfold((steps, guard), |(mut steps, guard)| async move {
            loop {
                match steps.pop_front() {
                    Some(StreamStep::Frame(payload)) => return Some((Ok(payload), (steps, guard))),
                    Some(StreamStep::Fail(reason)) => {
                        return Some((Err(ChartdeskError::transport(reason)), (steps, guard)));
                    }
                    Some(StreamStep::Wait(delay)) => tokio::time::sleep(delay).await,
                    Some(StreamStep::Close) => return None,
                    None => std::future::pending::<()>().await,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Default)]
pub struct TradeLog {
    pub opened: Vec<TradeRequest>,
    pub closed: Vec<TradeId>,
    pub next_id: TradeId,
    pub fail_open: Option<String>,
    pub fail_close: Option<String>,
}

/// Trade port whose log stays readable after the port moves into a controller.
#[derive(Debug, Clone, Default)]
pub struct MockTradePort {
    pub log: Arc<Mutex<TradeLog>>,
}

impl MockTradePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(&self, reason: &str) {
        self.log.lock().unwrap().fail_open = Some(reason.to_string());
    }

    pub fn fail_close(&self, reason: &str) {
        self.log.lock().unwrap().fail_close = Some(reason.to_string());
    }

    pub fn opened(&self) -> Vec<TradeRequest> {
        self.log.lock().unwrap().opened.clone()
    }

    pub fn closed(&self) -> Vec<TradeId> {
        self.log.lock().unwrap().closed.clone()
    }
}

impl TradePort for MockTradePort {
    async fn open_trade(&self, request: &TradeRequest) -> Result<Trade, ChartdeskError> {
        let mut log = self.log.lock().unwrap();
        log.opened.push(request.clone());
        if let Some(reason) = &log.fail_open {
            return Err(ChartdeskError::trade_api(reason.clone()));
        }
        log.next_id += 1;
        let spread = (request.buy_price - request.sell_price).abs();
        Ok(Trade {
            id: log.next_id,
            ticker: request.ticker.clone(),
            action: request.action,
            entry_price: request.price,
            opened_at: request.time,
            pnl: Some(-spread),
            spread: Some(spread),
        })
    }

    async fn close_trade(&self, id: TradeId) -> Result<(), ChartdeskError> {
        let mut log = self.log.lock().unwrap();
        if let Some(reason) = &log.fail_close {
            return Err(ChartdeskError::trade_api(reason.clone()));
        }
        log.closed.push(id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub data: Vec<Candle>,
    pub set_data_calls: usize,
    pub lines: BTreeMap<TradeId, PriceLineAnnotation>,
    pub removed: Vec<TradeId>,
    pub size: Option<(u32, u32)>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closes(&self) -> Vec<(i64, f64)> {
        self.data.iter().map(|c| (c.time, c.close)).collect()
    }
}

impl ChartSurface for RecordingSurface {
    fn set_data(&mut self, candles: &[Candle]) {
        self.data = candles.to_vec();
        self.set_data_calls += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = Some((width, height));
    }

    fn add_price_line(&mut self, line: &PriceLineAnnotation) {
        self.lines.insert(line.trade_id, line.clone());
    }

    fn remove_price_line(&mut self, trade_id: TradeId) {
        self.lines.remove(&trade_id);
        self.removed.push(trade_id);
    }
}
