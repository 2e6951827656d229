use anyhow::{Result, ensure};
use indoc::indoc;

use axon::runtime::context::{ContextId, ContextStatus};
use axon::{ErrorKind, RunStatus, RuntimeConfig, TraceEvent};

fn error_kind(status: &RunStatus) -> Option<ErrorKind> {
    match status {
        RunStatus::RuntimeError { kind, .. } => Some(*kind),
        _ => None,
    }
}

fn dispatch_order(trace: &[TraceEvent]) -> Vec<ContextId> {
    trace
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Dispatch { context, .. } => Some(*context),
            _ => None,
        })
        .collect()
}

#[test]
fn identical_runs_produce_identical_traces() -> Result<()> {
    let source = indoc! {"
        function work(name, n):
            i = 0
            while i < n:
                print(name + str(i))
                i = i + 1

        thread start work(\"a\", 5)
        task schedule work(\"b\", 4) priority 1
        task schedule work(\"c\", 3) after 2
    "};
    let config = RuntimeConfig {
        quantum: 3,
        ..RuntimeConfig::default()
    };
    let first = axon::run_with_config(source, config.clone());
    let second = axon::run_with_config(source, config);

    ensure!(first.status.is_completed(), "run failed: {}", first.status);
    assert_eq!(first.trace, second.trace);
    assert_eq!(first.output, second.output);
    assert_eq!(first.output.len(), 12);
    Ok(())
}

#[test]
fn lower_priority_number_is_dispatched_first() {
    let outcome = axon::run(indoc! {"
        function worker(name):
            print(name)

        task schedule worker(\"second\") priority 2
        task schedule worker(\"first\") priority 1
    "});

    assert_eq!(outcome.output, vec!["first", "second"]);
    assert_eq!(
        dispatch_order(&outcome.trace),
        vec![ContextId::MAIN, ContextId(2), ContextId(1)]
    );
}

#[test]
fn quantum_bounds_each_slice() {
    let source = indoc! {"
        function count(name):
            print(name + \"1\")
            print(name + \"2\")
            print(name + \"3\")

        thread start count(\"a\")
        thread start count(\"b\")
    "};
    let coarse = axon::run(source);
    let fine = axon::run_with_config(
        source,
        RuntimeConfig {
            quantum: 1,
            ..RuntimeConfig::default()
        },
    );

    assert_eq!(coarse.output, vec!["a1", "a2", "a3", "b1", "b2", "b3"]);
    // Main needs three one-statement slices, so `a` starts before `b` exists.
    assert_eq!(fine.output, vec!["a1", "a2", "b1", "a3", "b2", "b3"]);
}

#[test]
fn failing_thread_does_not_stop_siblings() {
    let outcome = axon::run(indoc! {"
        function bad():
            x = 1 / 0

        function good():
            yield
            print(\"good finished\")

        thread start bad()
        thread start good()
    "});

    assert!(outcome.status.is_completed());
    assert_eq!(outcome.output, vec!["good finished"]);
    let bad = outcome.context("bad").expect("bad context");
    assert_eq!(bad.status, ContextStatus::Failed);
    let error = bad.error.as_deref().unwrap_or_default();
    assert!(error.starts_with("ArithmeticError: Division by zero"), "{error}");
    assert_eq!(
        outcome.context("good").map(|context| context.status),
        Some(ContextStatus::Completed)
    );
}

#[test]
fn joining_a_failed_thread_yields_null() {
    let outcome = axon::run(indoc! {"
        function broken():
            return missing

        thread start broken() as t
        join t as result
        print(result, status(t))
    "});

    assert!(outcome.status.is_completed());
    assert_eq!(outcome.output, vec!["null failed"]);
}

#[test]
fn joining_a_cancelled_process_raises_cancelled_error() {
    let outcome = axon::run(indoc! {"
        function spin():
            while true:
                yield

        function spawner():
            thread start spin()
            spin()

        process start spawner() as p
        yield
        yield
        cancel p
        join p as r
    "});

    assert_eq!(error_kind(&outcome.status), Some(ErrorKind::CancelledError));
    assert!(
        outcome
            .status
            .to_string()
            .contains("Joined <process 0> was cancelled")
    );
    let spinners: Vec<_> = outcome
        .contexts
        .iter()
        .filter(|context| context.id != ContextId::MAIN)
        .collect();
    assert_eq!(spinners.len(), 2);
    assert!(
        spinners
            .iter()
            .all(|context| context.status == ContextStatus::Failed)
    );
}

#[test]
fn context_can_cancel_itself() {
    let outcome = axon::run(indoc! {"
        function quitter():
            print(\"before\")
            cancel handle
            print(\"after\")

        thread start quitter() as handle
        yield
        print(status(handle), error(handle))
    "});

    assert!(outcome.status.is_completed());
    assert_eq!(outcome.output, vec!["before", "failed cancelled"]);
}

#[test]
fn joining_yourself_is_a_type_error() {
    let outcome = axon::run(indoc! {"
        function me():
            join mine

        thread start me() as mine
        yield
        print(status(mine), error(mine))
    "});

    assert_eq!(
        outcome.output,
        vec!["failed A context cannot join <thread 1> from inside it"]
    );
}

#[test]
fn memory_wait_times_out() {
    let outcome = axon::run(indoc! {"
        memory allocate cell 1
        memory wait cell 0 timeout 2
    "});

    assert_eq!(error_kind(&outcome.status), Some(ErrorKind::TimeoutError));
    assert!(
        outcome
            .status
            .to_string()
            .contains("Timed out after 2 turns waiting for write to cell[0]")
    );
}

#[test]
fn freeing_a_buffer_fails_its_waiters() {
    let outcome = axon::run(indoc! {"
        memory allocate cell 1
        function waiter():
            memory wait cell 0
            print(\"never\")

        thread start waiter() as w
        yield
        memory free cell
        join w as r
        print(r, status(w), error(w))
    "});

    assert!(outcome.status.is_completed(), "{}", outcome.status);
    assert_eq!(
        outcome.output,
        vec!["null failed use after free: buffer 'cell'"]
    );
}

#[test]
fn lock_cycle_is_broken_by_failing_the_oldest_waiter() {
    let outcome = axon::run(indoc! {"
        function first():
            lock a
            yield
            lock b

        function second():
            lock b
            yield
            lock a

        thread start first() as f
        thread start second() as s
        sleep 5
        print(status(f), status(s))
    "});

    assert!(outcome.status.is_completed());
    assert_eq!(outcome.output, vec!["blocked blocked"]);
    let first = outcome.context("first").expect("first context");
    assert_eq!(first.status, ContextStatus::Failed);
    assert!(
        first
            .error
            .as_deref()
            .is_some_and(|error| error.contains("deadlock: lock 'b'"))
    );
    assert_eq!(
        outcome.context("second").map(|context| context.status),
        Some(ContextStatus::Completed)
    );
}

#[test]
fn lock_misuse_is_reported() {
    let unlock = axon::run("unlock m\n");
    assert_eq!(error_kind(&unlock.status), Some(ErrorKind::TypeError));
    assert!(unlock.status.to_string().contains("Lock 'm' is not held"));

    let relock = axon::run("lock m\nlock m\n");
    assert_eq!(error_kind(&relock.status), Some(ErrorKind::TypeError));
    assert!(relock.status.to_string().contains("already held"));
}

#[test]
fn negative_sleep_is_rejected() {
    let outcome = axon::run("sleep -1\n");
    assert_eq!(error_kind(&outcome.status), Some(ErrorKind::TypeError));
}

#[test]
fn threads_started_by_a_process_member_join_the_process() {
    let outcome = axon::run(indoc! {"
        function leaf():
            yield

        function root():
            thread start leaf()
            thread start leaf()

        process start root() as p
        join p
        print(status(p))
    "});

    assert_eq!(outcome.output, vec!["completed"]);
    let members = outcome
        .contexts
        .iter()
        .filter(|context| context.process.is_some())
        .count();
    assert_eq!(members, 3);
}

#[test]
fn cancelling_finished_contexts_changes_nothing() {
    let outcome = axon::run(indoc! {"
        function work():
            return 7

        thread start work() as t
        process start work() as p
        join t as first
        join p as r
        cancel t
        cancel p
        join t as again
        join p as group
        print(first, again, group, status(t), status(p))
    "});

    assert!(outcome.status.is_completed(), "{}", outcome.status);
    assert_eq!(outcome.output, vec!["7 7 null completed completed"]);
    let process = outcome.process("work").expect("work process");
    assert_eq!(process.status, "completed");
    assert_eq!(process.members.len(), 1);
}

#[test]
fn cancelling_a_running_process_fails_only_unfinished_members() {
    let outcome = axon::run(indoc! {"
        function quick():
            pass

        function slow():
            sleep 10

        function root():
            thread start quick()
            thread start slow()
            sleep 10

        process start root() as p
        sleep 3
        cancel p
        print(status(p))
    "});

    assert!(outcome.status.is_completed(), "{}", outcome.status);
    assert_eq!(outcome.output, vec!["failed"]);
    assert_eq!(
        outcome.context("quick").map(|context| context.status),
        Some(ContextStatus::Completed)
    );
    assert_eq!(
        outcome.context("slow").map(|context| context.status),
        Some(ContextStatus::Failed)
    );
    assert_eq!(
        outcome.process("root").map(|process| process.status.as_str()),
        Some("failed")
    );
}
