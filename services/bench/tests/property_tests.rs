//! Error budget and registry properties

use bench::testing::MockInvestor;
use bench::{ErrorBudget, InvestorRegistry, ScoreLedger, SharedInvestor};
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn ceiling_is_clamped_score_share(
        score in -1_000_000i64..1_000_000,
        error_min in 0usize..50,
        span in 0usize..200,
    ) {
        let error_max = error_min + span;
        let budget = ErrorBudget::new(error_min, error_max);
        let ceiling = budget.ceiling(score);

        prop_assert!(ceiling >= error_min);
        prop_assert!(ceiling <= error_max);
        if score >= 0 {
            let raw = (score / 20) as usize;
            if raw >= error_min && raw <= error_max {
                prop_assert_eq!(ceiling, raw);
            }
        }
    }

    #[test]
    fn errors_count_only_real_failures(
        outcomes in proptest::collection::vec(any::<bool>(), 0..40)
    ) {
        let budget = ErrorBudget::new(100, 200);
        for failed in &outcomes {
            let err = failed.then(|| anyhow::anyhow!("failed"));
            let _ = budget.record(err, 0);
        }
        let failures = outcomes.iter().filter(|f| **f).count();
        prop_assert_eq!(budget.count(), failures);
    }

    #[test]
    fn void_score_stays_zero(extra in proptest::collection::vec(0i64..10_000, 1..20)) {
        let budget = ErrorBudget::new(1, 10);
        let ledger = ScoreLedger::new(10);
        prop_assert!(budget.record(Some(anyhow::anyhow!("boom")), 0).is_err());

        for delta in extra {
            ledger.add(delta);
            prop_assert_eq!(ledger.effective_score(budget.count(), budget.is_voided()), 0);
        }
    }

    #[test]
    fn purge_keeps_survivor_order(retired in proptest::collection::vec(any::<bool>(), 0..30)) {
        let registry = InvestorRegistry::new();
        let investors: Vec<Arc<MockInvestor>> = (0..retired.len())
            .map(|n| Arc::new(MockInvestor::new(&format!("inv-{n}"))))
            .collect();
        for investor in &investors {
            registry.admit(investor.clone());
        }
        for (investor, retire) in investors.iter().zip(&retired) {
            if *retire {
                investor.retire();
            }
        }

        let expected: Vec<String> = retired
            .iter()
            .enumerate()
            .filter(|(_, r)| !**r)
            .map(|(n, _)| format!("inv-{n}"))
            .collect();
        let purged = registry.purge_retired();
        let ids = |list: Vec<SharedInvestor>| -> Vec<String> {
            list.iter().map(|i| i.bank_id().to_string()).collect()
        };

        prop_assert_eq!(purged, retired.iter().filter(|r| **r).count());
        prop_assert_eq!(ids(registry.snapshot()), expected.clone());
        prop_assert_eq!(registry.purge_retired(), 0);
        prop_assert_eq!(ids(registry.snapshot()), expected);
        prop_assert_eq!(registry.total_admitted(), retired.len());
    }
}

#[test]
fn ceiling_boundaries() {
    let budget = ErrorBudget::new(5, 100);
    assert_eq!(budget.ceiling(20 * 5), 5);
    assert_eq!(budget.ceiling(20 * 5 - 1), 5);
    assert_eq!(budget.ceiling(20 * 6), 6);
    assert_eq!(budget.ceiling(20 * 100), 100);
    assert_eq!(budget.ceiling(20 * 100 + 20), 100);
}
