//! Resource tracking and teardown.

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use txn_tests::prelude::*;

mod release_order {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normal_end_releases_each_once_in_reverse() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..25 {
            // GIVEN
            let count = rng.gen_range(0..40);
            let ledger = Ledger::new();
            let mut probe = Probe::new();

            // WHEN
            Transaction::run("seq", &mut probe, |tx| {
                for n in 0..count {
                    ledger.record(tx, n.to_string())?;
                }
                Ok(())
            })
            .unwrap();

            // THEN
            let expected: Vec<String> = (0..count).rev().map(|n| n.to_string()).collect();
            assert_eq!(ledger.released(), expected);
            assert_eq!(probe.stops(), 1);
        }
    }

    #[test]
    fn test_acquisition_order_config() {
        // GIVEN
        let ledger = Ledger::new();
        let config = TransactionConfig::new().with_release_order(ReleaseOrder::Acquisition);

        // WHEN
        Transaction::run_with_config(config, "fifo", (), |tx| {
            for tag in ["first", "second", "third"] {
                ledger.record(tx, tag)?;
            }
            Ok(())
        })
        .unwrap();

        // THEN
        assert_eq!(ledger.released(), vec!["first", "second", "third"]);
    }
}

mod loop_of_transactions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ten_thousand_sequential_transactions() {
        // GIVEN
        let ledger = Ledger::new();
        let mut probe = Probe::new();

        // WHEN
        for i in 0..10_000 {
            let outcome = Transaction::run(format!("event {}", i), &mut probe, |tx| {
                tx.acquire_bytes(1000, true)?;
                ledger.record(tx, "handle")?;
                Ok(tx.resource_count())
            })
            .unwrap();
            assert_eq!(outcome.value(), Some(2));
        }

        // THEN
        assert_eq!(probe.stops(), 10_000);
        assert_eq!(probe.aborts(), 0);
        assert_eq!(ledger.acquired(), 10_000);
        assert_eq!(ledger.outstanding(), 0);
    }
}

mod allocation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_soft_failure_keeps_transaction_alive() {
        // GIVEN
        let mut probe = Probe::new();

        // WHEN
        let outcome = Transaction::run("soft", &mut probe, |tx| {
            let missing = tx.acquire_bytes(usize::MAX, false)?;
            assert!(missing.is_none());
            let buf = tx.acquire_bytes(32, false)?;
            Ok(buf.and_then(|b| b.with(|bytes| bytes.len())))
        })
        .unwrap();

        // THEN
        assert_eq!(outcome.value(), Some(Some(32)));
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn test_hard_failure_raises_sender() {
        // GIVEN
        let mut probe = Probe::new();
        let ledger = Ledger::new();

        // WHEN
        let outcome = Transaction::run("hard", &mut probe, |tx| {
            ledger.record(tx, "before")?;
            tx.acquire_bytes(usize::MAX, true)?;
            ledger.record(tx, "after")?;
            Ok(())
        })
        .unwrap();

        // THEN
        let record = outcome.exception().unwrap();
        assert_eq!(record.kind(), ExceptionKind::Sender);
        assert_eq!(record.category(), ALLOCATION_FAILURE);
        assert_eq!(probe.aborts(), 1);
        assert_eq!(ledger.released(), vec!["before"]);
    }

    #[test]
    fn test_configured_failure_category() {
        let config = TransactionConfig::new().with_allocation_failure_category(2_000_100);
        let outcome = Transaction::run_with_config(config, "cat", (), |tx| {
            tx.acquire(ResourceKind::Socket, true, || None::<u16>, |_| {})?;
            Ok(())
        })
        .unwrap();

        assert_eq!(outcome.exception().map(|r| r.category()), Some(2_000_100));
    }

    #[test]
    fn test_configured_failure_is_recognized() {
        // GIVEN
        let config = TransactionConfig::new().with_allocation_failure_category(2_000_100);

        // WHEN
        let outcome = Transaction::run_with_config(config.clone(), "bytes", (), |tx| {
            tx.acquire_bytes(usize::MAX, true)?;
            Ok(())
        })
        .unwrap();

        // THEN
        let record = outcome.exception().unwrap();
        assert!(config.is_allocation_failure(record));
        assert!(!record.is_allocation_failure());
    }

    #[test]
    fn test_generic_release_action() {
        // GIVEN
        let closed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&closed);

        // WHEN
        let outcome = Transaction::run("sockets", (), |tx| {
            let sink = std::rc::Rc::clone(&sink);
            let socket = tx.acquire(
                ResourceKind::Socket,
                true,
                || Some(8080u16),
                move |port| sink.borrow_mut().push(port),
            )?;
            Ok(socket)
        })
        .unwrap();

        // THEN
        let handle = outcome.value().flatten().unwrap();
        assert!(handle.is_released());
        assert_eq!(handle.kind(), ResourceKind::Socket);
        assert_eq!(*closed.borrow(), vec![8080]);
    }
}

mod teardown {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_teardown_is_idempotent() {
        // GIVEN
        let ledger = Ledger::new();
        let mut probe = Probe::new();

        // WHEN
        let outcome = Transaction::run("twice", &mut probe, |tx| {
            ledger.record(tx, "a")?;
            ledger.record(tx, "b")?;
            let first = tx.teardown();
            let second = tx.teardown();
            Ok((first, second, tx.is_torn_down()))
        })
        .unwrap();

        // THEN
        assert_eq!(outcome.value(), Some((2, 0, true)));
        assert_eq!(ledger.released(), vec!["b", "a"]);
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn test_buffers_released_after_end() {
        // GIVEN / WHEN
        let outcome = Transaction::run("buffers", (), |tx| {
            let buf = tx.acquire_bytes(64, true)?;
            if let Some(buf) = &buf {
                buf.with_mut(|bytes| bytes[0] = 0xff);
                assert_eq!(buf.with(|bytes| bytes[0]), Some(0xff));
            }
            Ok(buf)
        })
        .unwrap();

        // THEN
        let buf = outcome.value().flatten().unwrap();
        assert!(buf.is_released());
        assert_eq!(buf.with(|bytes| bytes.len()), None);
    }

    #[test]
    fn test_abort_releases_everything() {
        // GIVEN
        let ledger = Ledger::new();

        // WHEN
        Transaction::run("abort", (), |tx| -> TxResult<()> {
            for n in 0..5 {
                ledger.record(tx, n.to_string())?;
            }
            Err(tx.raise_sender(9, "stop here", ""))
        })
        .unwrap();

        // THEN
        assert_eq!(ledger.released(), vec!["4", "3", "2", "1", "0"]);
    }
}
