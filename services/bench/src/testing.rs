//! Test doubles for the orchestrator's collaborators

use crate::identity::IdentityMinter;
use crate::investor::{
    ClientProfile, ConsistencyChecker, Investor, InvestorFactory, InvestorKind, SharedInvestor,
    SharedTrade,
};
use async_trait::async_trait;
use bench_adapters::{
    AdapterError, ApplicationBootstrap, AuditLogService, BankService, BootstrapSettings,
};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskworker::{BoxedTask, CancellationToken, ExecTask};

fn rejected(service: &'static str, message: impl Into<String>) -> AdapterError {
    AdapterError::Status {
        service,
        status: 400,
        message: message.into(),
    }
}

#[derive(Default)]
struct MockState {
    started: AtomicBool,
    start_completed: AtomicBool,
    signed_in: AtomicBool,
    retired: AtomicBool,
    closed: AtomicBool,
    /// `None` succeeds, `Some(msg)` fails with `msg`
    work: Mutex<VecDeque<Option<String>>>,
    runs: AtomicUsize,
    shared: Mutex<Vec<SharedTrade>>,
    latest_price: AtomicI64,
    retire_on_start: AtomicBool,
}

/// Scriptable investor
pub struct MockInvestor {
    bank_id: String,
    credit: i64,
    kind: Option<InvestorKind>,
    profile: Option<ClientProfile>,
    state: Arc<MockState>,
}

impl MockInvestor {
    pub fn new(bank_id: &str) -> Self {
        Self::with_credit(bank_id, 0)
    }

    pub fn with_credit(bank_id: &str, credit: i64) -> Self {
        Self {
            bank_id: bank_id.to_string(),
            credit,
            kind: None,
            profile: None,
            state: Arc::new(MockState::default()),
        }
    }

    fn built(profile: ClientProfile, kind: InvestorKind) -> Self {
        let credit = match kind {
            InvestorKind::Random(params) => params.credit,
            InvestorKind::BruteForce => 0,
        };
        Self {
            bank_id: profile.bank_id.clone(),
            credit,
            kind: Some(kind),
            profile: Some(profile),
            state: Arc::new(MockState::default()),
        }
    }

    pub fn kind(&self) -> Option<InvestorKind> {
        self.kind
    }

    pub fn profile(&self) -> Option<&ClientProfile> {
        self.profile.as_ref()
    }

    /// Queue one successful unit of work
    pub fn queue_work(&self) {
        self.state.work.lock().push_back(None);
    }

    /// Queue one unit of work failing with `message`
    pub fn queue_failure(&self, message: &str) {
        self.state.work.lock().push_back(Some(message.to_string()));
    }

    /// Units of work that ran, start unit excluded
    pub fn runs(&self) -> usize {
        self.state.runs.load(Ordering::SeqCst)
    }

    pub fn push_shared_trade(&self, amount: i64, price: i64) {
        self.state.shared.lock().push(SharedTrade { amount, price });
    }

    pub fn set_latest_price(&self, price: i64) {
        self.state.latest_price.store(price, Ordering::SeqCst);
    }

    /// Retire as soon as the start unit has run
    pub fn retire_on_start(&self) {
        self.state.retire_on_start.store(true, Ordering::SeqCst);
    }

    /// Mark started and start-completed without running the start unit
    pub fn complete_start(&self) {
        self.state.started.store(true, Ordering::SeqCst);
        self.state.start_completed.store(true, Ordering::SeqCst);
    }

    pub fn sign_in(&self) {
        self.state.signed_in.store(true, Ordering::SeqCst);
    }

    pub fn retire(&self) {
        self.state.retired.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl Investor for MockInvestor {
    fn start(&self) -> BoxedTask {
        self.state.started.store(true, Ordering::SeqCst);
        let state = self.state.clone();
        ExecTask::new(
            move |_| async move {
                state.start_completed.store(true, Ordering::SeqCst);
                if state.retire_on_start.load(Ordering::SeqCst) {
                    state.retired.store(true, Ordering::SeqCst);
                }
                Ok(())
            },
            Duration::ZERO,
        )
        .boxed()
    }

    fn next(&self) -> Option<BoxedTask> {
        let outcome = self.state.work.lock().pop_front()?;
        let state = self.state.clone();
        Some(
            ExecTask::new(
                move |_| async move {
                    state.runs.fetch_add(1, Ordering::SeqCst);
                    match outcome {
                        None => Ok(()),
                        Some(message) => Err(anyhow::anyhow!(message)),
                    }
                },
                Duration::ZERO,
            )
            .boxed(),
        )
    }

    fn is_started(&self) -> bool {
        self.state.started.load(Ordering::SeqCst)
    }

    fn is_start_completed(&self) -> bool {
        self.state.start_completed.load(Ordering::SeqCst)
    }

    fn is_signed_in(&self) -> bool {
        self.state.signed_in.load(Ordering::SeqCst)
    }

    fn is_retired(&self) -> bool {
        self.state.retired.load(Ordering::SeqCst)
    }

    fn bank_id(&self) -> &str {
        &self.bank_id
    }

    fn credit(&self) -> i64 {
        self.credit
    }

    fn shared_trades(&self) -> Vec<SharedTrade> {
        std::mem::take(&mut *self.state.shared.lock())
    }

    fn latest_trade_price(&self) -> i64 {
        self.state.latest_price.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// Builds [`MockInvestor`]s and keeps a handle on each
#[derive(Default)]
pub struct MockInvestorFactory {
    built: Mutex<Vec<Arc<MockInvestor>>>,
    fail: AtomicBool,
    retire_on_start: AtomicBool,
    failures_per_investor: AtomicUsize,
}

impl MockInvestorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every investor built so far, in build order
    pub fn built(&self) -> Vec<Arc<MockInvestor>> {
        self.built.lock().clone()
    }

    pub fn kinds(&self) -> Vec<InvestorKind> {
        self.built.lock().iter().filter_map(|i| i.kind()).collect()
    }

    pub fn fail_builds(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Investors built from now on retire once started
    pub fn retire_on_start(&self) {
        self.retire_on_start.store(true, Ordering::SeqCst);
    }

    /// Investors built from now on carry `count` failing units of work
    pub fn queue_failures(&self, count: usize) {
        self.failures_per_investor.store(count, Ordering::SeqCst);
    }
}

impl InvestorFactory for MockInvestorFactory {
    fn build(&self, profile: ClientProfile, kind: InvestorKind) -> anyhow::Result<SharedInvestor> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("cannot build investor {}", profile.bank_id);
        }
        let investor = Arc::new(MockInvestor::built(profile, kind));
        if self.retire_on_start.load(Ordering::SeqCst) {
            investor.retire_on_start();
        }
        for _ in 0..self.failures_per_investor.load(Ordering::SeqCst) {
            investor.queue_failure("order rejected");
        }
        self.built.lock().push(investor.clone());
        Ok(investor)
    }
}

/// In-memory bank
#[derive(Default)]
pub struct MockBank {
    registered: Mutex<Vec<String>>,
    credits: Mutex<Vec<(String, i64)>>,
    rejected_ids: Mutex<HashSet<String>>,
    fail_credit: AtomicBool,
}

impl MockBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().clone()
    }

    /// Granted `(bank_id, amount)` pairs, in grant order
    pub fn credits(&self) -> Vec<(String, i64)> {
        self.credits.lock().clone()
    }

    pub fn fail_registration_of(&self, bank_id: &str) {
        self.rejected_ids.lock().insert(bank_id.to_string());
    }

    pub fn fail_credit_grants(&self) {
        self.fail_credit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BankService for MockBank {
    async fn register_identity(&self, bank_id: &str) -> bench_adapters::Result<()> {
        if self.rejected_ids.lock().contains(bank_id) {
            return Err(rejected("bank", format!("{bank_id} rejected")));
        }
        self.registered.lock().push(bank_id.to_string());
        Ok(())
    }

    async fn grant_credit(&self, bank_id: &str, amount: i64) -> bench_adapters::Result<()> {
        if self.fail_credit.load(Ordering::SeqCst) {
            return Err(rejected("bank", "credit refused"));
        }
        self.credits.lock().push((bank_id.to_string(), amount));
        Ok(())
    }

    fn application_identity(&self) -> &str {
        "bank-appid"
    }
}

/// Audit log counting resets
#[derive(Default)]
pub struct MockAuditLog {
    resets: AtomicUsize,
    fail: AtomicBool,
}

impl MockAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn fail_resets(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditLogService for MockAuditLog {
    async fn reset(&self) -> bench_adapters::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(rejected("audit log", "reset refused"));
        }
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn application_identity(&self) -> &str {
        "log-appid"
    }
}

/// Application bootstrap recording the settings it received
#[derive(Default)]
pub struct MockBootstrap {
    settings: Mutex<Vec<BootstrapSettings>>,
    fail: AtomicBool,
    hang: AtomicBool,
}

impl MockBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> Vec<BootstrapSettings> {
        self.settings.lock().clone()
    }

    pub fn fail_initialization(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Make `initialize` never return
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ApplicationBootstrap for MockBootstrap {
    async fn initialize(&self, settings: &BootstrapSettings) -> bench_adapters::Result<()> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(rejected("application", "initialize refused"));
        }
        self.settings.lock().push(settings.clone());
        Ok(())
    }
}

/// Consistency checker recording what it was asked to verify
#[derive(Default)]
pub struct MockChecker {
    pre_calls: AtomicUsize,
    post_checked: Mutex<Vec<Vec<String>>>,
    fail_pre: AtomicBool,
    fail_post: AtomicBool,
}

impl MockChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_calls(&self) -> usize {
        self.pre_calls.load(Ordering::SeqCst)
    }

    /// Bank ids handed to each post-test call
    pub fn post_checked(&self) -> Vec<Vec<String>> {
        self.post_checked.lock().clone()
    }

    pub fn fail_pre_test(&self) {
        self.fail_pre.store(true, Ordering::SeqCst);
    }

    pub fn fail_post_test(&self) {
        self.fail_post.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConsistencyChecker for MockChecker {
    async fn pre_test(&self, _token: &CancellationToken) -> anyhow::Result<()> {
        self.pre_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pre.load(Ordering::SeqCst) {
            anyhow::bail!("initial balance mismatch");
        }
        Ok(())
    }

    async fn post_test(
        &self,
        _token: &CancellationToken,
        investors: &[SharedInvestor],
    ) -> anyhow::Result<()> {
        let ids = investors.iter().map(|i| i.bank_id().to_string()).collect();
        self.post_checked.lock().push(ids);
        if self.fail_post.load(Ordering::SeqCst) {
            anyhow::bail!("trade history mismatch");
        }
        Ok(())
    }
}

/// Mints a fixed sequence, then repeats its last element
pub struct SequenceMinter {
    ids: Vec<String>,
    cursor: AtomicUsize,
}

impl SequenceMinter {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl IdentityMinter for SequenceMinter {
    fn mint_identity(&self) -> String {
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.ids
            .get(n)
            .or_else(|| self.ids.last())
            .cloned()
            .unwrap_or_default()
    }
}
