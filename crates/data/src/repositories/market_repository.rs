//! Market snapshot repository over the `crypto_prices` table.

use lp_rebalancer_domain::entities::MarketSnapshot;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;

fn price(row: &PgRow, column: &str) -> Result<Option<f64>, sqlx::Error> {
    let value: Option<Decimal> = row.try_get(column)?;
    Ok(value.and_then(|d| d.to_f64()))
}

fn snapshot_from_row(row: &PgRow) -> Result<MarketSnapshot, sqlx::Error> {
    let volume: Option<i64> = row.try_get("volume")?;
    Ok(MarketSnapshot {
        ticker: row.try_get("ticker")?,
        observed_at: row.try_get("date")?,
        open_price: price(row, "open_price")?,
        high_price: price(row, "high_price")?,
        low_price: price(row, "low_price")?,
        close_price: price(row, "close_price")?,
        volume: volume.map(|v| v as f64),
        rsi: row.try_get("rsi")?,
        bb_upper: row.try_get("bb_upper")?,
        bb_middle: row.try_get("bb_middle")?,
        bb_lower: row.try_get("bb_lower")?,
        volatility: row.try_get("volatility")?,
        macd: row.try_get("macd")?,
        macd_signal: row.try_get("macd_signal")?,
        macd_histogram: row.try_get("macd_histogram")?,
        atr: row.try_get("atr")?,
        price_range: row.try_get("price_range")?,
        vwap: row.try_get("vwap")?,
    })
}

/// Repository for price candles and their indicators.
#[derive(Clone)]
pub struct MarketRepository {
    pool: Arc<PgPool>,
}

impl MarketRepository {
    /// Creates a new MarketRepository.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Finds the latest snapshot for a ticker.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_latest(&self, ticker: &str) -> Result<Option<MarketSnapshot>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM crypto_prices
            WHERE ticker = $1
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(ticker)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.as_ref().map(snapshot_from_row).transpose()
    }

    /// Saves a snapshot, replacing any candle with the same ticker and time.
    ///
    /// # Errors
    /// Returns an error if the snapshot has no time or the query fails.
    pub async fn save(&self, snapshot: &MarketSnapshot) -> Result<(), sqlx::Error> {
        let observed_at = snapshot
            .observed_at
            .ok_or_else(|| sqlx::Error::Encode("snapshot has no observation time".into()))?;
        let decimal = |v: Option<f64>| v.and_then(Decimal::from_f64);

        sqlx::query(
            r#"
            INSERT INTO crypto_prices (ticker, date, open_price, high_price, low_price,
                                       close_price, volume, rsi, bb_upper, bb_middle, bb_lower,
                                       volatility, macd, macd_signal, macd_histogram, atr,
                                       price_range, vwap)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18)
            ON CONFLICT (ticker, date) DO UPDATE SET
                open_price = EXCLUDED.open_price,
                high_price = EXCLUDED.high_price,
                low_price = EXCLUDED.low_price,
                close_price = EXCLUDED.close_price,
                volume = EXCLUDED.volume,
                rsi = EXCLUDED.rsi,
                bb_upper = EXCLUDED.bb_upper,
                bb_middle = EXCLUDED.bb_middle,
                bb_lower = EXCLUDED.bb_lower,
                volatility = EXCLUDED.volatility,
                macd = EXCLUDED.macd,
                macd_signal = EXCLUDED.macd_signal,
                macd_histogram = EXCLUDED.macd_histogram,
                atr = EXCLUDED.atr,
                price_range = EXCLUDED.price_range,
                vwap = EXCLUDED.vwap
            "#,
        )
        .bind(&snapshot.ticker)
        .bind(observed_at)
        .bind(decimal(snapshot.open_price))
        .bind(decimal(snapshot.high_price))
        .bind(decimal(snapshot.low_price))
        .bind(decimal(snapshot.close_price))
        .bind(snapshot.volume.map(|v| v as i64))
        .bind(snapshot.rsi)
        .bind(snapshot.bb_upper)
        .bind(snapshot.bb_middle)
        .bind(snapshot.bb_lower)
        .bind(snapshot.volatility)
        .bind(snapshot.macd)
        .bind(snapshot.macd_signal)
        .bind(snapshot.macd_histogram)
        .bind(snapshot.atr)
        .bind(snapshot.price_range)
        .bind(snapshot.vwap)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}
