use anyhow::{Result, bail};
use indoc::indoc;

use axon::parser;
use axon::runtime::debugger::PauseReason;
use axon::{Inspection, Interpreter, RunState, RuntimeConfig};

const CALLS: &str = indoc! {"
    function add(a, b):
        return a + b
    x = 1
    y = add(x, 2)
    print(y)
"};

fn debugging() -> RuntimeConfig {
    RuntimeConfig {
        debug: true,
        ..RuntimeConfig::default()
    }
}

fn interpreter(source: &str) -> Result<Interpreter> {
    let program = parser::parse(source)?;
    Ok(Interpreter::new(&program, debugging()))
}

fn paused(state: RunState) -> Result<Inspection> {
    match state {
        RunState::Paused(inspection) => Ok(inspection),
        RunState::Finished(status) => bail!("expected a pause, run finished: {status}"),
    }
}

#[test]
fn breakpoint_pauses_before_its_line() -> Result<()> {
    let mut interpreter = interpreter(indoc! {"
        x = 1
        y = 2
        z = x + y
        print(z)
    "})?;
    interpreter.set_breakpoint(3);

    let first = paused(interpreter.run())?;
    assert_eq!(first.line, 3);
    assert_eq!(first.reason, Some(PauseReason::Breakpoint(3)));
    assert_eq!(first.variable("y"), Some("2"));
    assert_eq!(first.variable("z"), None);
    assert_eq!(interpreter.inspect(), Some(first));

    let second = paused(interpreter.step_into())?;
    assert_eq!(second.line, 4);
    assert_eq!(second.reason, Some(PauseReason::Step));
    assert_eq!(second.variable("z"), Some("3"));

    assert_eq!(
        interpreter.resume(),
        RunState::Finished(axon::RunStatus::Completed)
    );
    assert_eq!(interpreter.outcome().output, vec!["3"]);
    Ok(())
}

#[test]
fn step_over_runs_calls_to_completion() -> Result<()> {
    let mut interpreter = interpreter(CALLS)?;
    interpreter.set_breakpoint(4);
    assert_eq!(paused(interpreter.run())?.line, 4);

    let after = paused(interpreter.step_over())?;
    assert_eq!(after.line, 5);
    assert_eq!(after.variable("y"), Some("3"));
    assert_eq!(after.call_stack.len(), 1);
    Ok(())
}

#[test]
fn step_into_enters_the_called_function() -> Result<()> {
    let mut interpreter = interpreter(CALLS)?;
    interpreter.set_breakpoint(4);
    paused(interpreter.run())?;

    let inside = paused(interpreter.step_into())?;
    assert_eq!(inside.line, 2);
    assert_eq!(inside.call_stack[0].function, "add");
    assert_eq!(inside.call_stack[1].function, "<main>");
    assert_eq!(inside.call_stack[1].line, 4);
    assert_eq!(
        inside.variables,
        vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string())
        ]
    );
    Ok(())
}

#[test]
fn breakpoints_are_ignored_while_disabled() -> Result<()> {
    let program = parser::parse(CALLS)?;
    let mut interpreter = Interpreter::new(&program, RuntimeConfig::default());
    assert!(!interpreter.is_debugging());
    interpreter.set_breakpoint(4);
    assert!(matches!(interpreter.run(), RunState::Finished(status) if status.is_completed()));
    assert_eq!(interpreter.breakpoints().len(), 1);
    assert!(interpreter.clear_breakpoint(4));
    interpreter.set_debug(true);
    assert!(interpreter.is_debugging());
    Ok(())
}

#[test]
fn breakpoint_statements_pause_the_run() {
    let outcome = axon::run_with_config(
        indoc! {"
            breakpoint set 3
            x = 1
            y = 2
            print(x + y)
        "},
        debugging(),
    );

    assert!(outcome.status.is_completed());
    assert_eq!(outcome.output, vec!["Breakpoint set at line 3", "3"]);
    let lines: Vec<_> = outcome.pauses.iter().map(|pause| pause.line).collect();
    assert_eq!(lines, vec![3]);
}

#[test]
fn debug_step_pauses_at_every_statement_until_continue() {
    let outcome = axon::run(indoc! {"
        debug step
        x = 1
        y = 2
        debug continue
        print(x + y)
    "});

    assert_eq!(
        outcome.output,
        vec![
            "Step-by-step execution enabled",
            "Continuing execution",
            "3"
        ]
    );
    let lines: Vec<_> = outcome.pauses.iter().map(|pause| pause.line).collect();
    assert_eq!(lines, vec![2, 3, 4]);
}

#[test]
fn breakpoint_listing() {
    let outcome = axon::run(indoc! {"
        breakpoint set 10
        breakpoint set 4
        breakpoint disable 10
        breakpoint list
        breakpoint clear 7
        breakpoint clear all
        breakpoint list
    "});

    assert_eq!(
        outcome.output,
        vec![
            "Breakpoint set at line 10",
            "Breakpoint set at line 4",
            "Breakpoint at line 10 disabled",
            "Breakpoints:",
            "  Line 4",
            "  Line 10 (disabled)",
            "No breakpoint at line 7",
            "All breakpoints cleared",
            "No breakpoints set",
        ]
    );
}

#[test]
fn debug_listings_show_scope_and_stack() {
    let outcome = axon::run(indoc! {"
        function inner(n):
            debug variables
            debug callstack

        inner(5)
    "});

    assert_eq!(
        outcome.output,
        vec![
            "Variables:",
            "  n = 5",
            "Call stack:",
            "  0: inner (line 3)",
            "  1: <main> (line 5)",
        ]
    );
}
