//! The boundary interface between the kernel and a user binary, and the
//! registry that resolves a stable program identifier to one.
//!
//! The original implementation loads a `ProcessCode` subclass by Python
//! import path and runs it on its own OS thread. There is no dynamic
//! loading here: every program is a Rust type registered ahead of time,
//! and `fork` carries the identifier that picks it out of the registry.

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::channel::Syscalls;
use crate::env::Environment;
use crate::fs::inode::BinaryImage;

/// The stable name a binary inode's `BinaryImage::program_id` names.
/// Not a path: paths can change (rename, bind mount); this cannot.
pub type ProgramId = String;

/// A user-space program. `run` executes on its own OS thread and talks
/// to the kernel exclusively through `syscalls`, exactly the way
/// `ProcessCode.run()` in the original only ever touches the kernel
/// through its `SystemHandle`/`Libc`.
pub trait Program: Send + Sync {
    /// Runs to completion and returns the process exit code. A program
    /// that wants to exit early should call `syscalls.exit(code)` and
    /// return that same code; the kernel does not distinguish the two.
    fn run(&self, syscalls: Syscalls, env: Environment, argv: Vec<String>) -> i32;
}

/// A constructor capable of producing fresh `Program` instances. Stored
/// behind `Arc` in the registry because `fork` may instantiate the same
/// program many times concurrently.
pub type ProgramFactory = fn() -> Box<dyn Program>;

/// Maps a [`ProgramId`] to the factory that builds it, and computes the
/// content hash stored in a binary inode's [`BinaryImage`].
#[derive(Default)]
pub struct ProgramRegistry {
    factories: HashMap<ProgramId, ProgramFactory>,
}

/// The version stamped into every binary image's content hash. Bumped
/// whenever a built-in program's behavior changes in a way that should
/// invalidate anything comparing hashes.
pub const PROGRAM_VERSION: &str = "1";

impl ProgramRegistry {
    pub fn new() -> Self {
        ProgramRegistry::default()
    }

    pub fn register(&mut self, id: impl Into<ProgramId>, factory: ProgramFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn instantiate(&self, id: &str) -> Option<Box<dyn Program>> {
        self.factories.get(id).map(|factory| factory())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Builds the `BinaryImage` a boot loader embeds in a `/bin` entry:
    /// the program id plus the SHA-256 hash of `program_id` and
    /// [`PROGRAM_VERSION`] concatenated.
    pub fn binary_image(&self, id: &str) -> Option<BinaryImage> {
        if !self.contains(id) {
            return None;
        }
        Some(BinaryImage {
            program_id: id.to_string(),
            content_hash: content_hash(id, PROGRAM_VERSION),
        })
    }
}

pub fn content_hash(program_id: &str, version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(program_id.as_bytes());
    hasher.update(version.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

impl fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("programs", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl Program for Noop {
        fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
            syscalls.exit(0);
            0
        }
    }

    fn make_noop() -> Box<dyn Program> {
        Box::new(Noop)
    }

    #[test]
    fn unregistered_program_instantiates_to_none() {
        let registry = ProgramRegistry::new();
        assert!(registry.instantiate("nope").is_none());
    }

    #[test]
    fn registered_program_instantiates() {
        let mut registry = ProgramRegistry::new();
        registry.register("noop", make_noop);
        assert!(registry.instantiate("noop").is_some());
    }

    #[test]
    fn content_hash_is_stable_and_id_sensitive() {
        let a = content_hash("cat", PROGRAM_VERSION);
        let b = content_hash("cat", PROGRAM_VERSION);
        let c = content_hash("dog", PROGRAM_VERSION);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn binary_image_absent_for_unregistered_id() {
        let registry = ProgramRegistry::new();
        assert!(registry.binary_image("nope").is_none());
    }
}
