//! A small set of built-in user programs, enough to exercise `fork`,
//! `execve`, and `waitpid` end to end without a real shell or
//! tokenizer — a full userland is explicitly out of scope.
//!
//! Grounded in `process/process_code.py`'s `ProcessCode` base class:
//! each program only ever talks to the kernel through its `Syscalls`
//! handle, exactly like `ProcessCode.run()`'s access to `self.libc`.

use crate::channel::Syscalls;
use crate::env::Environment;
use crate::program::{Program, ProgramRegistry};

/// Does nothing and exits `0`. Useful as a fork target in tests that
/// only care about the parent/child/wait protocol.
pub struct Noop;

impl Program for Noop {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        syscalls.exit(0);
        0
    }
}

/// Exits with the integer in `argv[0]`, or `1` if missing/unparsable.
/// Used to test that `waitpid` observes the exact exit code a child
/// chose.
pub struct ExitWith;

impl Program for ExitWith {
    fn run(&self, _syscalls: Syscalls, _env: Environment, argv: Vec<String>) -> i32 {
        argv.first().and_then(|s| s.parse().ok()).unwrap_or(1)
    }
}

/// Forks one child running [`ExitWith`] with the given argv, waits for
/// it, and exits with the child's code plus one. Exercises the full
/// fork/wait round trip from a single program.
pub struct ForkAndWait;

impl Program for ForkAndWait {
    fn run(&self, syscalls: Syscalls, _env: Environment, argv: Vec<String>) -> i32 {
        let child_argv = if argv.is_empty() { vec!["0".to_string()] } else { argv };
        let child = match syscalls.fork("exit-with".to_string(), "exit-with", child_argv) {
            Ok(pid) => pid,
            Err(_) => return 127,
        };
        match syscalls.waitpid(Some(child)) {
            Ok((_pid, code)) => code + 1,
            Err(_) => 126,
        }
    }
}

/// Blocks in `waitpid` for any child with no children registered yet
/// at call time; used to test the kernel's handling of a process that
/// blocks and is later satisfied by a sibling syscall. Forks a single
/// [`Noop`] child after a read from `/dev/null` (a cheap yield point)
/// and then waits for it.
pub struct BlockingWait;

impl Program for BlockingWait {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let child = match syscalls.fork("noop".to_string(), "noop", vec![]) {
            Ok(pid) => pid,
            Err(_) => return 127,
        };
        match syscalls.waitpid(None) {
            Ok((pid, code)) if pid == child => code,
            Ok(_) => 125,
            Err(_) => 126,
        }
    }
}

/// Registers every built-in program under its stable id. Returns the
/// ids in the order they should be materialized under `/bin`.
pub fn register_builtins(registry: &mut ProgramRegistry) -> Vec<&'static str> {
    registry.register("noop", || Box::new(Noop));
    registry.register("exit-with", || Box::new(ExitWith));
    registry.register("fork-and-wait", || Box::new(ForkAndWait));
    registry.register("blocking-wait", || Box::new(BlockingWait));
    vec!["noop", "exit-with", "fork-and-wait", "blocking-wait"]
}
