//! An in-memory simulation of a classical UNIX kernel.
//!
//! `unix74` models syscalls, an inode-based virtual filesystem with
//! mountable volumes, and process management (`fork`/`execve`/
//! `waitpid`) over a single-threaded dispatch loop. Each simulated
//! process runs on its own OS thread and talks to the kernel
//! exclusively through a [`channel::Syscalls`] handle passed to its
//! [`program::Program::run`] — nothing reaches into kernel state
//! directly.
//!
//! ```no_run
//! use unix74::{boot, programs};
//! use unix74::program::ProgramRegistry;
//!
//! let mut registry = ProgramRegistry::new();
//! let program_ids = programs::register_builtins(&mut registry);
//! let mut kernel = boot::boot(registry, &program_ids);
//! kernel.run();
//! ```

#![warn(rust_2018_idioms)]

pub mod boot;
pub mod channel;
pub mod env;
pub mod errno;
pub mod fs;
pub mod ids;
pub mod kernel;
pub mod ofd;
pub mod perm;
pub mod process;
pub mod program;
pub mod programs;
pub mod user;

pub use errno::{Errno, KernelError, KernelResult};
pub use kernel::Kernel;
