//! In-memory venue for dry runs.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use lp_rebalancer_domain::entities::{LiquidityAmounts, PoolDetails, TickRange};
use lp_rebalancer_domain::ports::{LiquidityVenue, VenueReceipt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A write issued to the venue.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueCall {
    /// New position opened.
    Deploy {
        /// Pool id.
        pool: String,
        /// Requested range.
        range: TickRange,
        /// Capital.
        amount_eth: Decimal,
        /// Slippage tolerance.
        max_slippage: Decimal,
    },
    /// Existing position moved.
    Shift {
        /// Pool id.
        pool: String,
        /// Position being replaced.
        old_position_id: String,
        /// Requested range.
        range: TickRange,
        /// Capital.
        amount_eth: Decimal,
        /// Slippage tolerance.
        max_slippage: Decimal,
    },
    /// Position withdrawn.
    Exit {
        /// Pool id.
        pool: String,
        /// Position withdrawn.
        position_id: String,
    },
}

#[derive(Debug, Default)]
struct PaperBook {
    ticks: HashMap<String, i32>,
    positions: HashMap<String, TickRange>,
    exited: Vec<String>,
    calls: Vec<VenueCall>,
    failing_writes: u32,
}

/// Venue that keeps positions in memory and never touches a chain.
///
/// Ticks are set per pool with [`PaperVenue::set_tick`]; writes can be made to
/// fail with [`PaperVenue::fail_next_writes`].
pub struct PaperVenue {
    book: RwLock<PaperBook>,
    next_id: AtomicU64,
}

impl PaperVenue {
    /// Creates an empty paper venue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            book: RwLock::new(PaperBook::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sets the current tick of a pool.
    pub async fn set_tick(&self, pool: &PoolDetails, tick: i32) {
        self.book.write().await.ticks.insert(pool.pool_id(), tick);
    }

    /// Makes the next `count` writes fail.
    pub async fn fail_next_writes(&self, count: u32) {
        self.book.write().await.failing_writes = count;
    }

    /// Writes issued so far, in order.
    pub async fn calls(&self) -> Vec<VenueCall> {
        self.book.read().await.calls.clone()
    }

    /// Range of an open position.
    pub async fn position(&self, position_id: &str) -> Option<TickRange> {
        self.book.read().await.positions.get(position_id).copied()
    }

    /// Ids of withdrawn positions, in order.
    pub async fn exited_positions(&self) -> Vec<String> {
        self.book.read().await.exited.clone()
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn take_failure(book: &mut PaperBook) -> Result<()> {
        if book.failing_writes > 0 {
            book.failing_writes -= 1;
            bail!("paper venue: injected write failure");
        }
        Ok(())
    }
}

impl Default for PaperVenue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiquidityVenue for PaperVenue {
    async fn current_tick(&self, pool: &PoolDetails) -> Result<i32> {
        self.book
            .read()
            .await
            .ticks
            .get(&pool.pool_id())
            .copied()
            .ok_or_else(|| anyhow!("no tick set for pool {}", pool.pool_id()))
    }

    async fn deploy(
        &self,
        pool: &PoolDetails,
        range: TickRange,
        amount_eth: Decimal,
        max_slippage: Decimal,
    ) -> Result<VenueReceipt> {
        let mut book = self.book.write().await;
        book.calls.push(VenueCall::Deploy {
            pool: pool.pool_id(),
            range,
            amount_eth,
            max_slippage,
        });
        Self::take_failure(&mut book)?;

        let position_id = self.allocate_id();
        book.positions.insert(position_id.clone(), range);
        info!(pool = %pool.pool_id(), position_id = %position_id, %range, "Paper deploy");

        Ok(VenueReceipt {
            position_id,
            range,
            amounts: LiquidityAmounts {
                amount_token0: Decimal::ZERO,
                amount_token1: amount_eth,
            },
        })
    }

    async fn shift(
        &self,
        pool: &PoolDetails,
        old_position_id: &str,
        range: TickRange,
        amount_eth: Decimal,
        max_slippage: Decimal,
    ) -> Result<VenueReceipt> {
        let mut book = self.book.write().await;
        book.calls.push(VenueCall::Shift {
            pool: pool.pool_id(),
            old_position_id: old_position_id.to_string(),
            range,
            amount_eth,
            max_slippage,
        });
        Self::take_failure(&mut book)?;

        if book.positions.remove(old_position_id).is_none() {
            debug!(position_id = %old_position_id, "Shifting unknown paper position");
        }
        let position_id = self.allocate_id();
        book.positions.insert(position_id.clone(), range);
        info!(
            pool = %pool.pool_id(),
            old_position_id = %old_position_id,
            position_id = %position_id,
            %range,
            "Paper shift"
        );

        Ok(VenueReceipt {
            position_id,
            range,
            amounts: LiquidityAmounts {
                amount_token0: Decimal::ZERO,
                amount_token1: amount_eth,
            },
        })
    }

    async fn exit(&self, pool: &PoolDetails, position_id: &str) -> Result<()> {
        let mut book = self.book.write().await;
        book.calls.push(VenueCall::Exit {
            pool: pool.pool_id(),
            position_id: position_id.to_string(),
        });
        Self::take_failure(&mut book)?;

        book.positions.remove(position_id);
        book.exited.push(position_id.to_string());
        info!(pool = %pool.pool_id(), position_id = %position_id, "Paper exit");
        Ok(())
    }
}
