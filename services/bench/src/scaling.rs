//! Adaptive population growth
//!
//! Two triggers admit new investors each tick:
//!
//! - **Share**: every share event from an active investor admits
//!   `add_users_on_share` followers at the shared amount and price.
//! - **Natural**: each time the score crosses `2^level * 100` the level goes up
//!   and `add_users_on_natural` investors join at the latest trade price.
//!   More than `error_min` recorded errors freezes the level.
//!
//! Every admission batch alternates buyers (even index) and sellers (odd
//! index) so both sides of the book grow together.

use crate::investor::{RandomParams, SharedInvestor, SharedTrade};
use bench_config::BenchConfig;

const LEVEL_BASE_SCORE: i64 = 100;

/// Initial population seeding
const INITIAL_BUYER_CREDIT: i64 = 100_000;
const INITIAL_SELLER_ISU: i64 = 5;
const INITIAL_UNIT_AMOUNT: i64 = 1;

/// Admission seeding, relative to the requested price and unit amount
const CREDIT_PER_PRICE: i64 = 1_000;
const ISU_PER_UNIT: i64 = 100;
const BUYER_PRICE_OFFSET: i64 = -2;
const SELLER_PRICE_OFFSET: i64 = 5;

/// Why a batch is admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthCause {
    Share,
    Natural,
}

/// `count` new investors trading `unit_amount` around `price`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub count: usize,
    pub unit_amount: i64,
    pub price: i64,
    pub cause: GrowthCause,
}

impl AdmissionRequest {
    /// Seed parameters for each investor of the batch
    pub fn seeds(&self) -> impl Iterator<Item = RandomParams> + '_ {
        (0..self.count).map(move |i| {
            if i % 2 == 0 {
                RandomParams::buyer(
                    self.price * CREDIT_PER_PRICE,
                    self.unit_amount,
                    self.price + BUYER_PRICE_OFFSET,
                )
            } else {
                RandomParams::seller(
                    self.unit_amount * ISU_PER_UNIT,
                    self.unit_amount,
                    self.price + SELLER_PRICE_OFFSET,
                )
            }
        })
    }
}

/// Seed of the `index`-th investor of the initial population
pub fn initial_seed(index: usize, base_price: i64) -> RandomParams {
    let price = base_price + i64::try_from(index / 2).unwrap_or(0);
    if index % 2 == 0 {
        RandomParams::buyer(INITIAL_BUYER_CREDIT, INITIAL_UNIT_AMOUNT, price)
    } else {
        RandomParams::seller(INITIAL_SELLER_ISU, INITIAL_UNIT_AMOUNT, price)
    }
}

/// Score needed to leave `level`; `None` once it no longer fits in an i64
pub fn level_threshold(level: u32) -> Option<i64> {
    2i64.checked_pow(level)?.checked_mul(LEVEL_BASE_SCORE)
}

/// What one tick saw on its active investors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickObservation {
    pub shared_trades: Vec<SharedTrade>,
    /// Price of the last observed investor that reported one
    pub latest_trade_price: Option<i64>,
}

impl TickObservation {
    pub fn record_trades(&mut self, trades: Vec<SharedTrade>) {
        self.shared_trades.extend(trades);
    }

    /// Non-positive prices mean "no trade yet" and keep the previous value
    pub fn record_price(&mut self, price: i64) {
        if price > 0 {
            self.latest_trade_price = Some(price);
        }
    }
}

/// Outcome of one scaling decision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingPlan {
    pub requests: Vec<AdmissionRequest>,
    /// Level after this tick
    pub level: u32,
    pub shares: usize,
    pub level_ups: u32,
}

impl ScalingPlan {
    pub fn admitted(&self) -> usize {
        self.requests.iter().map(|r| r.count).sum()
    }
}

/// Decides how many investors to admit per tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingController {
    add_users_on_share: usize,
    add_users_on_natural: usize,
    error_min: usize,
    fallback_trade_price: i64,
    start_per_tick: usize,
}

impl ScalingController {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            add_users_on_share: config.population.add_users_on_share,
            add_users_on_natural: config.population.add_users_on_natural,
            error_min: config.limits.error_min,
            fallback_trade_price: config.pricing.fallback_trade_price,
            start_per_tick: config.population.start_per_tick,
        }
    }

    pub fn plan(
        &self,
        observation: &TickObservation,
        score: i64,
        error_count: usize,
        level: u32,
    ) -> ScalingPlan {
        let mut plan = ScalingPlan {
            level,
            ..ScalingPlan::default()
        };

        for trade in &observation.shared_trades {
            plan.requests.push(AdmissionRequest {
                count: self.add_users_on_share,
                unit_amount: trade.amount,
                price: trade.price,
                cause: GrowthCause::Share,
            });
            plan.shares += 1;
        }

        let price = observation
            .latest_trade_price
            .unwrap_or(self.fallback_trade_price);

        while let Some(threshold) = level_threshold(plan.level) {
            if score < threshold {
                break;
            }
            if error_count > self.error_min {
                break;
            }
            plan.level += 1;
            plan.level_ups += 1;
            plan.requests.push(AdmissionRequest {
                count: self.add_users_on_natural,
                unit_amount: i64::from(plan.level) + 1,
                price,
                cause: GrowthCause::Natural,
            });
        }

        plan
    }

    /// Not-yet-started investors that get a start unit this tick
    pub fn pending_starts(&self, investors: &[SharedInvestor]) -> Vec<SharedInvestor> {
        investors
            .iter()
            .filter(|i| !i.is_started())
            .take(self.start_per_tick)
            .cloned()
            .collect()
    }
}
