pub mod ast;
pub mod builtins;
pub mod config;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod token;

pub use config::RuntimeConfig;
pub use interpreter::Interpreter;
pub use interpreter::outcome::{Inspection, RunOutcome, RunState, RunStatus, TraceEvent};
pub use runtime::error::ErrorKind;

/// Parses and runs `source` with the default configuration.
pub fn run(source: &str) -> RunOutcome {
    run_with_config(source, RuntimeConfig::default())
}

/// Parses and runs `source` to completion. Debugger pauses are recorded in
/// the outcome and resumed automatically.
pub fn run_with_config(source: &str, config: RuntimeConfig) -> RunOutcome {
    let program = match parser::parse(source) {
        Ok(program) => program,
        Err(error) => return RunOutcome::parse_error(&error),
    };
    let mut interpreter = Interpreter::new(&program, config);
    interpreter.run_to_end();
    interpreter.outcome()
}
