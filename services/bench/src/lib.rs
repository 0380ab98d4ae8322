//! # Benchmark Orchestrator
//!
//! Drives a population of simulated investors against a trading application
//! and scores the run:
//!
//! - [`IdentityQueue`] prefetches registered bank ids ahead of demand
//! - [`InvestorRegistry`] holds the live population
//! - [`ErrorBudget`] and [`ScoreLedger`] turn failures and successes into a score
//! - [`ScalingController`] grows the population on share events and score levels
//! - [`Manager`] makes the per-tick scheduling decision
//! - [`BenchRunner`] runs the whole thing and produces a [`BenchReport`]

pub mod budget;
pub mod error;
pub mod identity;
pub mod investor;
pub mod logging;
pub mod manager;
pub mod registry;
pub mod runner;
pub mod scaling;
pub mod score;
pub mod testing;

pub use budget::ErrorBudget;
pub use error::{BenchError, Result};
pub use identity::{IdentityMinter, IdentityQueue, IdentityStats, RandomIdentity};
pub use investor::{
    ClientProfile, ConsistencyChecker, Investor, InvestorFactory, InvestorKind, RandomParams,
    SharedInvestor, SharedTrade,
};
pub use logging::{init_tracing, LogEmoji, RunLog};
pub use manager::{Collaborators, Manager, BRUTE_FORCE_ACCOUNTS};
pub use registry::InvestorRegistry;
pub use runner::{launch, BenchReport, BenchRunner, StopReason};
pub use scaling::{AdmissionRequest, GrowthCause, ScalingController, ScalingPlan, TickObservation};
pub use score::ScoreLedger;
