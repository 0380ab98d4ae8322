//! Identity prefetch
//!
//! Investor creation must never wait on the bank. A background loop mints
//! bank ids, registers them and parks them in a bounded queue ahead of
//! demand; a full queue blocks the loop, which throttles registration to the
//! rate investors are created.

use crate::error::{BenchError, Result};
use bench_adapters::BankService;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use taskworker::CancellationToken;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const BANK_ID_LEN: usize = 12;
const PASSWORD_LEN: usize = 16;

/// Source of candidate bank ids
pub trait IdentityMinter: Send + Sync {
    fn mint_identity(&self) -> String;
}

/// Random lowercase alphanumeric identities
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentity;

impl RandomIdentity {
    pub fn new() -> Self {
        Self
    }

    /// Display name for an investor account
    pub fn name(&self) -> String {
        format!("investor-{}", random_lowercase(8))
    }

    pub fn password(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PASSWORD_LEN)
            .map(char::from)
            .collect()
    }
}

impl IdentityMinter for RandomIdentity {
    fn mint_identity(&self) -> String {
        random_lowercase(BANK_ID_LEN)
    }
}

fn random_lowercase(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Counters of the prefetch loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityStats {
    pub registered: u64,
    pub failed: u64,
    pub duplicates: u64,
}

/// Bounded queue of registered, never-issued bank ids
pub struct IdentityQueue {
    tx: mpsc::Sender<String>,
    rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    /// Set once the prefetch loop has exited or the queue was closed
    closed: CancellationToken,
    /// Every id ever accepted from the minter. Grows with the number of
    /// mints for the lifetime of the queue (one run): ids are 12 bytes, so
    /// even a million investors stay in the tens of megabytes.
    seen: Mutex<HashSet<String>>,
    retry_delay: Duration,
    registered: AtomicU64,
    failed: AtomicU64,
    duplicates: AtomicU64,
}

impl IdentityQueue {
    pub fn new(capacity: usize, retry_delay: Duration) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            closed: CancellationToken::new(),
            seen: Mutex::new(HashSet::new()),
            retry_delay,
            registered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
        }
    }

    /// Next unused identity; waits while the queue is empty.
    ///
    /// Buffered ids are still handed out after the queue closes; once they
    /// are drained this fails with [`BenchError::IdentityQueueClosed`].
    pub async fn fetch_next(&self) -> Result<String> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            id = rx.recv() => id.ok_or(BenchError::IdentityQueueClosed),
            _ = self.closed.cancelled() => {
                rx.try_recv().map_err(|_| BenchError::IdentityQueueClosed)
            }
        }
    }

    /// Stop handing out identities once the buffer drains
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Identities ready to be handed out
    pub fn buffered(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn stats(&self) -> IdentityStats {
        IdentityStats {
            registered: self.registered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }

    /// Prefetch loop; returns once `token` is cancelled or the queue is
    /// closed, and leaves the queue closed.
    ///
    /// A failed registration is logged and the candidate dropped; the loop
    /// moves on to a fresh id after `retry_delay`.
    pub async fn run(
        &self,
        minter: &dyn IdentityMinter,
        bank: &dyn BankService,
        token: CancellationToken,
    ) {
        info!("identity fetcher started");

        while !token.is_cancelled() && !self.is_closed() {
            let id = minter.mint_identity();
            if !self.seen.lock().insert(id.clone()) {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                debug!(bank_id = %id, "minter repeated an identity, skipping");
                tokio::task::yield_now().await;
                continue;
            }

            let registered = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = self.closed.cancelled() => break,
                result = bank.register_identity(&id) => result,
            };

            if let Err(e) = registered {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    bank_id = %id,
                    status = ?e.status(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "new bank id failed"
                );
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = self.closed.cancelled() => break,
                    _ = tokio::time::sleep(self.retry_delay) => continue,
                }
            }
            self.registered.fetch_add(1, Ordering::Relaxed);

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = self.closed.cancelled() => break,
                sent = self.tx.send(id) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        self.close();
        info!(stats = ?self.stats(), "identity fetcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBank, SequenceMinter};
    use std::sync::Arc;

    #[test]
    fn test_random_identity_shape() {
        let random = RandomIdentity::new();
        let id = random.mint_identity();
        assert_eq!(id.len(), BANK_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(random.name().starts_with("investor-"));
        assert_eq!(random.password().len(), PASSWORD_LEN);
    }

    #[tokio::test]
    async fn test_fetch_returns_registered_ids_in_order() {
        let queue = Arc::new(IdentityQueue::new(10, Duration::from_millis(1)));
        let bank = Arc::new(MockBank::new());
        let minter = Arc::new(SequenceMinter::new(["a1", "b2", "c3"]));
        let token = CancellationToken::new();

        let fetcher = {
            let (queue, bank, minter, token) =
                (queue.clone(), bank.clone(), minter.clone(), token.clone());
            tokio::spawn(async move { queue.run(minter.as_ref(), bank.as_ref(), token).await })
        };

        assert_eq!(queue.fetch_next().await.unwrap(), "a1");
        assert_eq!(queue.fetch_next().await.unwrap(), "b2");
        assert_eq!(queue.fetch_next().await.unwrap(), "c3");

        token.cancel();
        fetcher.await.unwrap();
        assert_eq!(bank.registered(), vec!["a1", "b2", "c3"]);
    }

    #[tokio::test]
    async fn test_repeated_identity_is_never_issued_twice() {
        let queue = Arc::new(IdentityQueue::new(10, Duration::from_millis(1)));
        let bank = Arc::new(MockBank::new());
        let minter = Arc::new(SequenceMinter::new(["x", "y", "x", "y", "z"]));
        let token = CancellationToken::new();

        let fetcher = {
            let (queue, bank, minter, token) =
                (queue.clone(), bank.clone(), minter.clone(), token.clone());
            tokio::spawn(async move { queue.run(minter.as_ref(), bank.as_ref(), token).await })
        };

        let fetched = vec![
            queue.fetch_next().await.unwrap(),
            queue.fetch_next().await.unwrap(),
            queue.fetch_next().await.unwrap(),
        ];
        assert_eq!(fetched, vec!["x", "y", "z"]);

        token.cancel();
        fetcher.await.unwrap();
        assert!(queue.stats().duplicates >= 2);
    }

    #[tokio::test]
    async fn test_failed_registration_is_skipped() {
        let queue = Arc::new(IdentityQueue::new(10, Duration::from_millis(1)));
        let bank = Arc::new(MockBank::new());
        bank.fail_registration_of("bad");
        let minter = Arc::new(SequenceMinter::new(["good1", "bad", "good2"]));
        let token = CancellationToken::new();

        let fetcher = {
            let (queue, bank, minter, token) =
                (queue.clone(), bank.clone(), minter.clone(), token.clone());
            tokio::spawn(async move { queue.run(minter.as_ref(), bank.as_ref(), token).await })
        };

        assert_eq!(queue.fetch_next().await.unwrap(), "good1");
        assert_eq!(queue.fetch_next().await.unwrap(), "good2");

        token.cancel();
        fetcher.await.unwrap();
        assert_eq!(queue.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_queue() {
        let queue = Arc::new(IdentityQueue::new(2, Duration::from_millis(1)));
        let bank = Arc::new(MockBank::new());
        let minter = Arc::new(RandomIdentity::new());
        let token = CancellationToken::new();

        let fetcher = {
            let (queue, bank, minter, token) =
                (queue.clone(), bank.clone(), minter.clone(), token.clone());
            tokio::spawn(async move { queue.run(minter.as_ref(), bank.as_ref(), token).await })
        };

        while queue.buffered() < 2 {
            tokio::task::yield_now().await;
        }

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), fetcher)
            .await
            .expect("fetcher must stop promptly")
            .unwrap();

        // buffered ids stay available after cancellation
        assert_eq!(queue.buffered(), 2);
        assert!(queue.fetch_next().await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_fails_once_fetcher_stopped_and_drained() {
        let queue = Arc::new(IdentityQueue::new(10, Duration::from_millis(1)));
        let bank = Arc::new(MockBank::new());
        let minter = Arc::new(SequenceMinter::new(["a"]));
        let token = CancellationToken::new();

        let fetcher = {
            let (queue, bank, minter, token) =
                (queue.clone(), bank.clone(), minter.clone(), token.clone());
            tokio::spawn(async move { queue.run(minter.as_ref(), bank.as_ref(), token).await })
        };

        assert_eq!(queue.fetch_next().await.unwrap(), "a");
        token.cancel();
        fetcher.await.unwrap();
        assert!(queue.is_closed());

        let fetched = tokio::time::timeout(Duration::from_millis(500), queue.fetch_next())
            .await
            .expect("fetch must not hang on a closed queue");
        assert!(matches!(fetched, Err(BenchError::IdentityQueueClosed)));
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_fetch() {
        let queue = Arc::new(IdentityQueue::new(4, Duration::from_millis(1)));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.fetch_next().await })
        };
        tokio::task::yield_now().await;

        queue.close();
        let fetched = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiting fetch must wake on close")
            .unwrap();
        assert!(matches!(fetched, Err(BenchError::IdentityQueueClosed)));
    }

    #[tokio::test]
    async fn test_close_stops_fetcher() {
        let queue = Arc::new(IdentityQueue::new(1, Duration::from_millis(1)));
        let bank = Arc::new(MockBank::new());
        let minter = Arc::new(RandomIdentity::new());

        let fetcher = {
            let (queue, bank, minter) = (queue.clone(), bank.clone(), minter.clone());
            tokio::spawn(async move {
                queue
                    .run(minter.as_ref(), bank.as_ref(), CancellationToken::new())
                    .await
            })
        };
        while queue.buffered() < 1 {
            tokio::task::yield_now().await;
        }

        queue.close();
        tokio::time::timeout(Duration::from_secs(1), fetcher)
            .await
            .expect("fetcher must stop on close")
            .unwrap();
        assert!(queue.fetch_next().await.is_ok());
        assert!(matches!(
            queue.fetch_next().await,
            Err(BenchError::IdentityQueueClosed)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_never_share_an_id() {
        let queue = Arc::new(IdentityQueue::new(8, Duration::from_millis(1)));
        let bank = Arc::new(MockBank::new());
        // every id after the first 150 mints is a repeat
        let minter = Arc::new(SequenceMinter::new(
            (0..200).map(|i| format!("id{}", i % 150)),
        ));
        let token = CancellationToken::new();

        let fetcher = {
            let (queue, bank, minter, token) =
                (queue.clone(), bank.clone(), minter.clone(), token.clone());
            tokio::spawn(async move { queue.run(minter.as_ref(), bank.as_ref(), token).await })
        };

        let consumers: Vec<_> = (0..6)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    for _ in 0..25 {
                        ids.push(queue.fetch_next().await.unwrap());
                    }
                    ids
                })
            })
            .collect();

        let mut issued = HashSet::new();
        for consumer in consumers {
            for id in consumer.await.unwrap() {
                assert!(issued.insert(id.clone()), "{id} issued twice");
            }
        }
        assert_eq!(issued.len(), 150);

        token.cancel();
        fetcher.await.unwrap();
        assert_eq!(bank.registered().len(), 150);
    }
}
