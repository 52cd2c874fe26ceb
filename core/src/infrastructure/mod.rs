//! Process-spawning seam.
//!
//! Code that shells out to local tools (the aws CLI) goes through
//! `CommandRunner`, so tests can replace the process with canned output.

pub mod runner;

pub use runner::{CommandRunner, MockRunner, ShellRunner};
