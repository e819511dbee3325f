//! Misuse of the engine surfaces as contract violations.

use std::cell::RefCell;

use pretty_assertions::assert_eq;
use txn_tests::prelude::*;

#[test]
fn test_raise_while_pending() {
    // GIVEN
    let mut probe = Probe::new();
    let ledger = Ledger::new();

    // WHEN
    let result = Transaction::run("twice", &mut probe, |tx| -> TxResult<()> {
        ledger.record(tx, "held")?;
        let _ = tx.raise_sender(1, "first", "");
        Err(tx.raise_sender(1, "second", ""))
    });

    // THEN
    match result {
        Err(TransactionError::ExceptionPending { pending, .. }) => {
            assert!(pending.contains("first"));
        }
        other => panic!("expected ExceptionPending, got {:?}", other),
    }
    assert_eq!(probe.aborts(), 0);
    assert_eq!(probe.stops(), 0);
    assert_eq!(ledger.outstanding(), 0);
}

#[test]
fn test_finish_from_inside_child() {
    // GIVEN
    let ledger = Ledger::new();
    let mut parent_probe = Probe::new();
    let mut child_probe = Probe::new();

    // WHEN
    let result = Transaction::run("parent", &mut parent_probe, |parent| {
        ledger.record(parent, "parent")?;
        parent.nest("child", &mut child_probe, |child| -> TxResult<()> {
            ledger.record(child, "child")?;
            Err(parent.finish())
        })?;
        Ok(())
    });

    // THEN
    assert!(matches!(result, Err(TransactionError::LiveChild { .. })));
    assert_eq!(parent_probe.stops() + parent_probe.aborts(), 0);
    assert_eq!(child_probe.stops() + child_probe.aborts(), 0);
    assert_eq!(ledger.released(), vec!["child", "parent"]);
}

#[test]
fn test_raise_inside_abort_handler() {
    // GIVEN
    let handlers = Handlers::new().with_abort(|tx| {
        let _ = tx.raise_sender(1, "again", "");
    });

    // WHEN
    let result = Transaction::run("handler", handlers, |tx| -> TxResult<()> {
        Err(tx.raise_sender(1, "first", ""))
    });

    // THEN
    assert!(matches!(
        result,
        Err(TransactionError::AlreadyEnded { operation: "raise", .. })
    ));
}

#[test]
fn test_nest_after_teardown() {
    let result = Transaction::run("gone", (), |tx| {
        tx.teardown();
        tx.nest("late", (), |_| Ok(()))?;
        Ok(())
    });

    assert!(matches!(
        result,
        Err(TransactionError::TornDown { operation: "nest", .. })
    ));
}

#[test]
fn test_stray_transfer() {
    // GIVEN
    let smuggled = RefCell::new(None);
    let first = Transaction::run("first", (), |tx| {
        *smuggled.borrow_mut() = Some(tx.raise_sender(1, "escaped", ""));
        Ok(tx.id())
    })
    .unwrap();
    assert!(first.is_aborted());

    // WHEN
    let result = Transaction::run("second", (), |tx| -> TxResult<TransactionId> {
        match smuggled.borrow_mut().take() {
            Some(unwind) => Err(unwind),
            None => Ok(tx.id()),
        }
    });

    // THEN
    match result {
        Err(TransactionError::StrayTransfer { target, reached }) => assert_ne!(target, reached),
        other => panic!("expected StrayTransfer, got {:?}", other),
    }
}
