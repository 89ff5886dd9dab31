//! The kernel's process table entry: identity, the per-process fd
//! table, the process tree, and the running/waiting/zombie state
//! machine.

use std::collections::HashMap;

use crate::env::Environment;
use crate::ids::{Fd, Gid, Ofd, Pid, Uid};
use crate::perm::AccessIdentity;

/// Where a process sits in the lifecycle the original models with a
/// plain `alive` boolean plus a separate wait map. Made explicit here
/// because `waitpid` and `exit` both need to distinguish "running",
/// "blocked in waitpid", and "exited but not yet reaped".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Blocked in `waitpid` on the given child, or on any child if `None`.
    Waiting { child: Option<Pid> },
    /// Exited with this code; reaped when its parent calls `waitpid`.
    Zombie { exit_code: i32 },
}

/// A process's fd table: the lowest-free-integer allocation of `Fd` to
/// `Ofd`, exactly `Process.claimNextFdNum()` in the original.
#[derive(Debug, Clone, Default)]
pub struct FdTable {
    entries: HashMap<Fd, Ofd>,
}

impl FdTable {
    pub fn new() -> Self {
        FdTable::default()
    }

    /// Finds the lowest fd number not currently in use, binds it to
    /// `ofd`, and returns it.
    pub fn claim(&mut self, ofd: Ofd) -> Fd {
        let mut candidate = 0u32;
        loop {
            let fd = Fd(candidate);
            if !self.entries.contains_key(&fd) {
                self.entries.insert(fd, ofd);
                return fd;
            }
            candidate += 1;
        }
    }

    /// Binds a specific fd number, overwriting anything already there.
    /// Used by boot-time stdin/stdout/stderr setup where the fd number
    /// matters.
    pub fn bind(&mut self, fd: Fd, ofd: Ofd) {
        self.entries.insert(fd, ofd);
    }

    pub fn get(&self, fd: Fd) -> Option<Ofd> {
        self.entries.get(&fd).copied()
    }

    pub fn remove(&mut self, fd: Fd) -> Option<Ofd> {
        self.entries.remove(&fd)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Fd, Ofd)> + '_ {
        self.entries.iter().map(|(&fd, &ofd)| (fd, ofd))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One entry of the kernel's process table. Analogous to the original's
/// `Process` dataclass, with `realUid`/`uid` renamed to the
/// real/effective split the permission model expects.
#[derive(Debug)]
pub struct ProcessEntry {
    pub pid: Pid,
    pub parent: Option<Pid>,
    pub command: String,
    pub real_uid: Uid,
    pub real_gid: Gid,
    pub effective_uid: Uid,
    pub effective_gid: Gid,
    pub current_dir: String,
    pub env: Environment,
    pub fd_table: FdTable,
    pub children: Vec<Pid>,
    pub status: ProcessStatus,
    /// Controlling terminal device number, or `-1` if the process has
    /// none. Surfaces in `/dev/mem`'s process listing.
    pub tty: i32,
}

impl ProcessEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pid: Pid,
        parent: Option<Pid>,
        command: String,
        real_uid: Uid,
        real_gid: Gid,
        current_dir: String,
        env: Environment,
        tty: i32,
    ) -> Self {
        ProcessEntry {
            pid,
            parent,
            command,
            real_uid,
            real_gid,
            effective_uid: real_uid,
            effective_gid: real_gid,
            current_dir,
            env,
            fd_table: FdTable::new(),
            children: Vec::new(),
            status: ProcessStatus::Running,
            tty,
        }
    }

    pub fn identity(&self) -> AccessIdentity {
        AccessIdentity::new(self.effective_uid, self.effective_gid)
    }

    pub fn is_zombie(&self) -> bool {
        matches!(self.status, ProcessStatus::Zombie { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_table_claims_lowest_free_number() {
        let mut table = FdTable::new();
        let a = table.claim(Ofd(10));
        let b = table.claim(Ofd(11));
        assert_eq!(a, Fd(0));
        assert_eq!(b, Fd(1));
        table.remove(a);
        let c = table.claim(Ofd(12));
        assert_eq!(c, Fd(0));
    }

    #[test]
    fn bind_overwrites_existing_entry() {
        let mut table = FdTable::new();
        table.bind(Fd(0), Ofd(1));
        table.bind(Fd(0), Ofd(2));
        assert_eq!(table.get(Fd(0)), Some(Ofd(2)));
    }

    #[test]
    fn process_entry_starts_running_with_matching_effective_ids() {
        let entry = ProcessEntry::new(
            Pid(1),
            None,
            "init".to_string(),
            Uid(0),
            Gid(0),
            "/".to_string(),
            Environment::new(),
            -1,
        );
        assert_eq!(entry.status, ProcessStatus::Running);
        assert_eq!(entry.effective_uid, entry.real_uid);
        assert!(!entry.is_zombie());
    }
}
