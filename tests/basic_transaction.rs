use std::panic::{self, AssertUnwindSafe};

use seshat::prelude::*;

mod common;

// Configure tests to run single-threaded
#[cfg(test)]
#[cfg(not(loom))] // Exclude when using Loom for concurrency testing
mod single_threaded_tests {
    use super::*;

    #[test]
    fn test_transaction_without_effects() {
        assert_eq!(atomically(|_| Ok(10)).unwrap(), 10);
    }

    #[test]
    fn test_basic_read_write_commit() {
        let var = TVar::new(1);

        atomically(|tx| tx.write(&var, 2)).unwrap();
        assert_eq!(var.read_committed(), 2);

        let read = atomically(|tx| tx.read(&var)).unwrap();
        assert_eq!(read, 2);
    }

    #[test]
    fn test_read_your_own_writes() {
        let var = TVar::new(1);

        let (inside, committed_during) = atomically(|tx| {
            tx.write(&var, 5)?;
            Ok((tx.read(&var)?, var.read_committed()))
        })
        .unwrap();

        // The write is visible to the transaction itself but not to anyone else before commit.
        assert_eq!(inside, 5);
        assert_eq!(committed_during, 1);
        assert_eq!(var.read_committed(), 5);
    }

    #[test]
    fn test_reading_and_writing_multiple_variables() {
        let v1 = TVar::new(3);
        let v2 = TVar::new(4);
        let v3 = TVar::new(5);
        let sum = TVar::new(0);

        atomically(|tx| {
            let total = tx.read(&v1)? + tx.read(&v2)? + tx.read(&v3)?;
            tx.write(&sum, total)
        })
        .unwrap();

        assert_eq!(v1.read_committed(), 3);
        assert_eq!(v2.read_committed(), 4);
        assert_eq!(v3.read_committed(), 5);
        assert_eq!(sum.read_committed(), 12);
    }

    #[test]
    fn test_modify_and_swap() {
        let var = TVar::new(String::from("a"));

        let old = atomically(|tx| {
            tx.modify(&var, |s| s + "b")?;
            tx.swap(&var, String::from("c"))
        })
        .unwrap();

        assert_eq!(old, "ab");
        assert_eq!(var.read_committed(), "c");
    }

    #[test]
    fn test_new_tvar_inside_transaction() {
        let var = atomically(|tx| {
            let var = tx.new_tvar(5);
            tx.modify(&var, |x| x + 1)?;
            Ok(var)
        })
        .unwrap();

        assert_eq!(var.read_committed(), 6);
        assert_eq!(atomically(|tx| tx.read(&var)).unwrap(), 6);
    }

    #[test]
    fn test_abort_voids_all_writes() {
        let a = TVar::new(10);
        let b = TVar::new(20);

        let result: Result<()> = atomically(|tx| {
            tx.write(&a, 30)?;
            tx.write(&b, 40)?;
            tx.abort("insufficient funds")
        });

        match result {
            Err(StmError::Aborted(err)) => assert_eq!(err.to_string(), "insufficient funds"),
            other => panic!("expected an abort, got {:?}", other),
        }
        assert_eq!(a.read_committed(), 10);
        assert_eq!(b.read_committed(), 20);
    }

    #[test]
    fn test_panic_voids_all_writes() {
        let var = TVar::new(10);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            atomically(|tx| {
                tx.write(&var, 30)?;
                if tx.read(&var)? == 30 {
                    panic!("boom");
                }
                Ok(())
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(var.read_committed(), 10);
        // The thread is usable for transactions again after the unwind.
        atomically(|tx| tx.write(&var, 11)).unwrap();
        assert_eq!(var.read_committed(), 11);
    }

    #[test]
    fn test_catch_rolls_back_the_failed_body() {
        let var = TVar::new(10);

        let handled = atomically(|tx| {
            tx.catch(
                |tx| {
                    tx.write(&var, 30)?;
                    tx.abort("test")
                },
                |tx, err| {
                    assert_eq!(err.to_string(), "test");
                    // The handler sees the state from before the failed body.
                    tx.read(&var)
                },
            )
        })
        .unwrap();

        assert_eq!(handled, 10);
        assert_eq!(var.read_committed(), 10);
    }

    #[test]
    fn test_catch_lets_retry_through() {
        let var = TVar::new(1);

        let result = atomically(|tx| {
            tx.or_else(
                |tx| tx.catch(|tx| tx.retry(), |_, _| Ok(0)),
                |tx| tx.read(&var),
            )
        })
        .unwrap();

        assert_eq!(result, 1);
    }

    #[test]
    fn test_retry_without_reads_fails_fast() {
        let result: Result<i32> = atomically(|tx| tx.retry());
        assert!(matches!(result, Err(StmError::BlockedIndefinitely)));
    }

    #[test]
    fn test_or_else_falls_back_on_retry() {
        assert_eq!(atomically(|tx| tx.or_else(|tx| tx.retry(), |_| Ok(10))).unwrap(), 10);
    }

    #[test]
    fn test_or_else_keeps_successful_first_branch() {
        let mut fallback_ran = false;

        let result = atomically(|tx| {
            tx.or_else(
                |_| Ok(10),
                |_| {
                    fallback_ran = true;
                    Ok(20)
                },
            )
        })
        .unwrap();

        assert_eq!(result, 10);
        assert!(!fallback_ran);
    }

    #[test]
    fn test_or_else_discards_writes_of_retrying_branch() {
        let var = TVar::new(42);

        let result = atomically(|tx| {
            tx.or_else(
                |tx| {
                    tx.write(&var, 23)?;
                    tx.retry()
                },
                |tx| tx.read(&var),
            )
        })
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(var.read_committed(), 42);
    }

    #[test]
    fn test_or_else_keeps_writes_made_before_the_branch() {
        let var = TVar::new(0);

        let result = atomically(|tx| {
            tx.write(&var, 1)?;
            tx.or_else(
                |tx| {
                    tx.write(&var, 2)?;
                    tx.retry()
                },
                |tx| tx.read(&var),
            )
        })
        .unwrap();

        assert_eq!(result, 1);
        assert_eq!(var.read_committed(), 1);
    }

    #[test]
    fn test_or_else_is_associative() {
        for bits in 0u8..8 {
            let (b1, b2, b3) = (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);

            let left: Result<()> = atomically(|tx| {
                tx.or_else(
                    |tx| tx.or_else(|tx| tx.check(b1), |tx| tx.check(b2)),
                    |tx| tx.check(b3),
                )
            });
            let right: Result<()> = atomically(|tx| {
                tx.or_else(
                    |tx| tx.check(b1),
                    |tx| tx.or_else(|tx| tx.check(b2), |tx| tx.check(b3)),
                )
            });

            if b1 || b2 || b3 {
                assert!(left.is_ok() && right.is_ok(), "combination {:03b}", bits);
            } else {
                assert!(matches!(left, Err(StmError::BlockedIndefinitely)));
                assert!(matches!(right, Err(StmError::BlockedIndefinitely)));
            }
        }
    }

    #[test]
    fn test_nested_atomically_is_rejected() {
        let result: Result<i32> = atomically(|_| atomically(|_| Ok(1)));
        assert!(matches!(result, Err(StmError::NestedTransaction)));

        // The outer guard is released, so the thread can run transactions again.
        assert_eq!(atomically(|_| Ok(2)).unwrap(), 2);
    }

    #[test]
    fn test_stats_count_commits() {
        let stm = common::setup_stm();
        let var = TVar::new(0);

        for _ in 0..3 {
            stm.atomically(|tx| tx.modify(&var, |x| x + 1)).unwrap();
        }
        let _ = stm.atomically(|tx| -> Result<()> { tx.abort("no") });

        let stats = stm.stats();
        assert_eq!(stats.commits, 3);
        assert_eq!(stats.conflicts, 0);
        assert_eq!(stats.blocked_waits, 0);
        assert_eq!(var.read_committed(), 3);
    }

    #[test]
    fn test_custom_config_is_kept() {
        let config = StmConfig::default()
            .with_lock_spin_limit(8)
            .with_conflict_backoff(ConflictBackoff::Spin(16));
        let stm = Stm::new(config);
        assert_eq!(stm.config().lock_spin_limit, 8);
        assert_eq!(stm.config().conflict_backoff, ConflictBackoff::Spin(16));
        assert_eq!(stm.atomically(|_| Ok("ok")).unwrap(), "ok");
    }

    #[test]
    fn test_tvar_identity() {
        let a = TVar::new(1);
        let b = TVar::new(1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }
}
