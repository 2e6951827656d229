//! Runtime state shared by every execution context of one program run.
//!
//! This module holds the value model, scopes, the simulated memory table,
//! the class arena, execution contexts, the scheduler queues and the
//! debugger. The interpreter owns one instance of each and threads them
//! through statement execution.
pub mod class;
pub mod context;
pub mod debugger;
pub mod environment;
pub mod error;
pub mod library;
pub mod memory;
pub mod scheduler;
pub mod value;
