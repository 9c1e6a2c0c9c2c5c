//! Action virtual machine
//!
//! - `action`: decoding and parameter checks
//! - `executor`: sequencing, step and time budget
//! - `handlers`: one function per action type

pub mod action;
pub mod executor;
pub mod handlers;

pub use action::{Action, Insert, LogLevel};
pub use executor::{execute, run_actions, ActionFuture, Budget, ExecuteOptions};

#[cfg(test)]
mod tests;
