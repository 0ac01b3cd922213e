//! Rendering surface port.

use crate::domain::candle::Candle;
use crate::domain::overlay::PriceLineAnnotation;
use crate::domain::trade::TradeId;

/// Whatever turns the candle sequence into pixels.
pub trait ChartSurface {
    /// Replace everything drawn with `candles`.
    fn set_data(&mut self, candles: &[Candle]);

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn add_price_line(&mut self, line: &PriceLineAnnotation);

    fn remove_price_line(&mut self, trade_id: TradeId);
}
