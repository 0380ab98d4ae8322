//! Investor contract
//!
//! Investors are the simulated clients of the benchmark. Their strategies
//! (random trading, brute-force sign-in) live outside this crate and plug in
//! through [`InvestorFactory`]; the orchestrator only relies on the
//! capabilities of the [`Investor`] trait.
//!
//! ```text
//! created ──start()──▶ started ──handshake ok──▶ start-completed ──▶ next() ... ──▶ retired
//!                                                                              │
//!                                                        purge: close() ◀──────┘
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use taskworker::{BoxedTask, CancellationToken};

/// In-app "share" event; consumed once by the scaling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedTrade {
    pub amount: i64,
    pub price: i64,
}

/// Capabilities the orchestrator needs from one investor.
///
/// Implementations are shared between the registry and in-flight tasks, so
/// every method takes `&self` and state lives behind interior mutability.
pub trait Investor: Send + Sync {
    /// Start unit; marks the investor as started
    fn start(&self) -> BoxedTask;

    /// Next unit of work, if the investor has anything to do now
    fn next(&self) -> Option<BoxedTask>;

    fn is_started(&self) -> bool;

    /// First handshake with the application succeeded
    fn is_start_completed(&self) -> bool;

    fn is_signed_in(&self) -> bool;

    /// Permanently out of the run; never scheduled again
    fn is_retired(&self) -> bool;

    fn bank_id(&self) -> &str;

    /// Currency to grant through the bank on admission
    fn credit(&self) -> i64;

    /// Drain share events emitted since the last call
    fn shared_trades(&self) -> Vec<SharedTrade>;

    /// Last trade price this investor observed, 0 if none
    fn latest_trade_price(&self) -> i64;

    /// Release the underlying client
    fn close(&self);
}

pub type SharedInvestor = Arc<dyn Investor>;

/// Connection parameters of an investor's application client
#[derive(Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub app_endpoint: String,
    pub bank_id: String,
    pub name: String,
    pub password: String,
    pub timeout: Duration,
    pub retire_timeout: Duration,
}

impl fmt::Debug for ClientProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProfile")
            .field("app_endpoint", &self.app_endpoint)
            .field("bank_id", &self.bank_id)
            .field("name", &self.name)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .field("retire_timeout", &self.retire_timeout)
            .finish()
    }
}

/// Seed parameters of a random-strategy investor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomParams {
    /// Starting currency
    pub credit: i64,
    /// Starting inventory
    pub isu: i64,
    pub unit_amount: i64,
    pub price: i64,
}

impl RandomParams {
    /// Price taker: currency, no inventory
    pub fn buyer(credit: i64, unit_amount: i64, price: i64) -> Self {
        Self {
            credit,
            isu: 0,
            unit_amount,
            price,
        }
    }

    /// Price maker: inventory, no currency
    pub fn seller(isu: i64, unit_amount: i64, price: i64) -> Self {
        Self {
            credit: 0,
            isu,
            unit_amount,
            price,
        }
    }
}

/// Closed set of investor strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestorKind {
    Random(RandomParams),
    /// Repeatedly tries to sign in to a known account
    BruteForce,
}

/// Builds investors; strategy implementations live behind this seam
pub trait InvestorFactory: Send + Sync {
    fn build(&self, profile: ClientProfile, kind: InvestorKind) -> anyhow::Result<SharedInvestor>;
}

/// Consistency checks run before and after the load phase
#[async_trait]
pub trait ConsistencyChecker: Send + Sync {
    async fn pre_test(&self, token: &CancellationToken) -> anyhow::Result<()>;

    /// `investors` holds only signed-in, non-retired investors
    async fn post_test(
        &self,
        token: &CancellationToken,
        investors: &[SharedInvestor],
    ) -> anyhow::Result<()>;
}
