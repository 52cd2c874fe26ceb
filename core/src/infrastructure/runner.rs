//! Command runner abstraction for executing local programs.
//!
//! `CommandRunner` is the trait callers use to run a program and collect its
//! stdout. `ShellRunner` is the production implementation; it spawns the
//! program directly, without a shell, so arguments need no quoting.
//! `MockRunner` is the test double that records calls and returns preset
//! responses.

use std::cell::RefCell;
use std::process::Command;

/// Trait for running a program to completion.
pub trait CommandRunner {
    /// Run `program` with `args`. Returns stdout on a zero exit status and a
    /// description of the failure (including stderr) otherwise.
    fn run(&self, program: &str, args: &[String]) -> Result<String, String>;
}

/// Production runner backed by `std::process::Command`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String, String> {
        tracing::debug!(program, ?args, "running command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| format!("failed to execute {}: {}", program, e))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let status = match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "killed by signal".to_string(),
            };
            Err(format!(
                "{} failed ({}): {}",
                program,
                status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

/// Test-double runner that records command lines and returns pre-configured
/// responses in order. Once the responses run out it answers `Ok("")`.
pub struct MockRunner {
    responses: RefCell<Vec<Result<String, String>>>,
    commands: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// Every command line seen so far, program and arguments joined by spaces.
    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String, String> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.commands.borrow_mut().push(line);
        self.responses
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mock_runner_records_commands() {
        let runner = MockRunner::with_responses(vec![Ok("ok".into()), Ok("ok2".into())]);
        assert!(runner.run("echo", &args(&["hello"])).is_ok());
        assert!(runner.run("aws", &args(&["ec2", "describe-instances"])).is_ok());
        let cmds = runner.executed_commands();
        assert_eq!(cmds, vec!["echo hello", "aws ec2 describe-instances"]);
    }

    #[test]
    fn mock_runner_returns_responses_in_order() {
        let runner = MockRunner::with_responses(vec![
            Ok("first".into()),
            Err("fail".into()),
            Ok("third".into()),
        ]);
        assert_eq!(runner.run("a", &[]).unwrap(), "first");
        assert_eq!(runner.run("b", &[]).unwrap_err(), "fail");
        assert_eq!(runner.run("c", &[]).unwrap(), "third");
        assert_eq!(runner.run("d", &[]).unwrap(), "");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_captures_stdout() {
        let out = ShellRunner.run("echo", &args(&["hello world"])).unwrap();
        assert_eq!(out, "hello world\n");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_reports_nonzero_exit() {
        let err = ShellRunner.run("false", &[]).unwrap_err();
        assert!(err.contains("exit status 1"), "{}", err);
    }

    #[test]
    fn shell_runner_reports_missing_program() {
        let err = ShellRunner
            .run("/nonexistent/anna-deploy-test-binary", &[])
            .unwrap_err();
        assert!(err.contains("failed to execute"));
    }
}
