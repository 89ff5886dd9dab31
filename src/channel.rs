//! The request/reply protocol between a user task and the kernel, and
//! the [`Syscalls`] client handle a [`Program`](crate::program::Program)
//! calls through.
//!
//! The original implementation sends `(name, pid, *args)` tuples over a
//! duplex OS pipe and matches on the string name at dispatch time. Here
//! the syscall is a closed sum type instead, so a malformed request is a
//! compile error rather than a runtime `ENOSYS` — the design explicitly
//! called for in the original's re-architecture notes.

use std::sync::mpsc;

use crate::errno::{errno, KernelError, KernelResult};
use crate::fs::inode::FileType;
use crate::ids::{Fd, Gid, INumber, Pid, Uid};
use crate::ofd::{OpenFlags, SeekFrom};
use crate::perm::FilePermissions;
use crate::program::ProgramId;

/// One directory entry as returned by `getdents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dentry {
    pub name: String,
    pub inumber: INumber,
    pub filesystem_id: uuid::Uuid,
}

/// The metadata snapshot returned by `stat`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    pub inumber: INumber,
    pub permissions: FilePermissions,
    pub file_type: FileType,
    pub owner: Uid,
    pub group: Gid,
    pub size: u64,
    pub time_created: std::time::SystemTime,
    pub time_modified: std::time::SystemTime,
    pub filesystem_id: uuid::Uuid,
    pub device_number: i32,
    pub references: u32,
}

/// Every syscall the kernel understands, carrying its own arguments.
#[derive(Debug)]
pub enum Syscall {
    Open { path: String, flags: OpenFlags },
    Creat { path: String, permissions: FilePermissions },
    Lseek { fd: Fd, offset: i64, whence: SeekFrom },
    Read { fd: Fd, size: usize },
    Write { fd: Fd, data: Vec<u8> },
    Close { fd: Fd },
    Stat { path: String },
    GetDents { fd: Fd },
    Chdir { path: String },
    Link { target: String, alias: String },
    Unlink { path: String },
    Mount { path: String, volume: crate::fs::Volume },
    Umount { path: String },
    Fork { program: ProgramId, command: String, argv: Vec<String> },
    Execve { path: String, argv: Vec<String> },
    Waitpid { child: Option<Pid> },
    Exit { code: i32 },
    Getuid,
    Geteuid,
    Getgid,
    Getegid,
    Getpid,
    Setuid { uid: Uid },
    Setgid { gid: Gid },
}

/// The value carried back by a successful reply. A sum type for the
/// same reason `Syscall` is: callers pattern-match instead of trusting
/// a downcast.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Unit,
    Fd(Fd),
    Offset(u64),
    Bytes(Vec<u8>),
    Count(usize),
    Stat(Stat),
    Dentries(Vec<Dentry>),
    Pid(Pid),
    ExitStatus(Pid, i32),
    Uid(Uid),
    Gid(Gid),
}

pub type Reply = KernelResult<ReturnValue>;

/// One request in flight: which process sent it, and what it asked for.
#[derive(Debug)]
pub struct Request {
    pub pid: Pid,
    pub call: Syscall,
    pub reply_tx: mpsc::Sender<Reply>,
}

/// The kernel-held end of a process's channel pair: where requests
/// arrive from, shared by every process via `mpsc`'s multi-producer
/// support (this plays the role of the `select()` over many pipes in
/// the original implementation).
pub fn request_channel() -> (mpsc::Sender<Request>, mpsc::Receiver<Request>) {
    mpsc::channel()
}

/// The user-task side of a process's channel: sends one request at a
/// time and blocks for its reply, exactly mirroring `SystemHandle`'s
/// `__syscall` in the original.
#[derive(Clone)]
pub struct Syscalls {
    pid: Pid,
    request_tx: mpsc::Sender<Request>,
}

impl Syscalls {
    pub fn new(pid: Pid, request_tx: mpsc::Sender<Request>) -> Self {
        Syscalls { pid, request_tx }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    fn call(&self, call: Syscall) -> Reply {
        let (reply_tx, reply_rx) = mpsc::channel();
        let request = Request {
            pid: self.pid,
            call,
            reply_tx,
        };
        if self.request_tx.send(request).is_err() {
            return Err(errno!(Ekilled, "kernel channel closed"));
        }
        reply_rx
            .recv()
            .unwrap_or_else(|_| Err(errno!(Ekilled, "kernel dropped the reply channel")))
    }

    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<Fd, KernelError> {
        match self.call(Syscall::Open {
            path: path.to_string(),
            flags,
        })? {
            ReturnValue::Fd(fd) => Ok(fd),
            _ => unreachable!("open always replies Fd"),
        }
    }

    pub fn creat(&self, path: &str, permissions: FilePermissions) -> Result<Fd, KernelError> {
        match self.call(Syscall::Creat {
            path: path.to_string(),
            permissions,
        })? {
            ReturnValue::Fd(fd) => Ok(fd),
            _ => unreachable!("creat always replies Fd"),
        }
    }

    pub fn lseek(&self, fd: Fd, offset: i64, whence: SeekFrom) -> Result<u64, KernelError> {
        match self.call(Syscall::Lseek { fd, offset, whence })? {
            ReturnValue::Offset(offset) => Ok(offset),
            _ => unreachable!("lseek always replies Offset"),
        }
    }

    pub fn read(&self, fd: Fd, size: usize) -> Result<Vec<u8>, KernelError> {
        match self.call(Syscall::Read { fd, size })? {
            ReturnValue::Bytes(bytes) => Ok(bytes),
            _ => unreachable!("read always replies Bytes"),
        }
    }

    pub fn write(&self, fd: Fd, data: &[u8]) -> Result<usize, KernelError> {
        match self.call(Syscall::Write {
            fd,
            data: data.to_vec(),
        })? {
            ReturnValue::Count(count) => Ok(count),
            _ => unreachable!("write always replies Count"),
        }
    }

    pub fn close(&self, fd: Fd) -> Result<(), KernelError> {
        self.call(Syscall::Close { fd })?;
        Ok(())
    }

    pub fn stat(&self, path: &str) -> Result<Stat, KernelError> {
        match self.call(Syscall::Stat {
            path: path.to_string(),
        })? {
            ReturnValue::Stat(stat) => Ok(stat),
            _ => unreachable!("stat always replies Stat"),
        }
    }

    pub fn getdents(&self, fd: Fd) -> Result<Vec<Dentry>, KernelError> {
        match self.call(Syscall::GetDents { fd })? {
            ReturnValue::Dentries(dentries) => Ok(dentries),
            _ => unreachable!("getdents always replies Dentries"),
        }
    }

    pub fn chdir(&self, path: &str) -> Result<(), KernelError> {
        self.call(Syscall::Chdir {
            path: path.to_string(),
        })?;
        Ok(())
    }

    pub fn link(&self, target: &str, alias: &str) -> Result<(), KernelError> {
        self.call(Syscall::Link {
            target: target.to_string(),
            alias: alias.to_string(),
        })?;
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> Result<(), KernelError> {
        self.call(Syscall::Unlink {
            path: path.to_string(),
        })?;
        Ok(())
    }

    pub fn mount(&self, path: &str, volume: crate::fs::Volume) -> Result<(), KernelError> {
        self.call(Syscall::Mount {
            path: path.to_string(),
            volume,
        })?;
        Ok(())
    }

    pub fn umount(&self, path: &str) -> Result<(), KernelError> {
        self.call(Syscall::Umount {
            path: path.to_string(),
        })?;
        Ok(())
    }

    pub fn fork(&self, program: ProgramId, command: &str, argv: Vec<String>) -> Result<Pid, KernelError> {
        match self.call(Syscall::Fork {
            program,
            command: command.to_string(),
            argv,
        })? {
            ReturnValue::Pid(pid) => Ok(pid),
            _ => unreachable!("fork always replies Pid"),
        }
    }

    pub fn execve(&self, path: &str, argv: Vec<String>) -> Result<Pid, KernelError> {
        match self.call(Syscall::Execve {
            path: path.to_string(),
            argv,
        })? {
            ReturnValue::Pid(pid) => Ok(pid),
            _ => unreachable!("execve always replies Pid"),
        }
    }

    pub fn waitpid(&self, child: Option<Pid>) -> Result<(Pid, i32), KernelError> {
        match self.call(Syscall::Waitpid { child })? {
            ReturnValue::ExitStatus(pid, code) => Ok((pid, code)),
            _ => unreachable!("waitpid always replies ExitStatus"),
        }
    }

    /// `exit` never replies: the process is gone once the kernel
    /// processes it. We still send the request so the kernel can clean
    /// up, but deliberately don't wait on `reply_rx`.
    pub fn exit(&self, code: i32) {
        let (reply_tx, _reply_rx) = mpsc::channel();
        let _ = self.request_tx.send(Request {
            pid: self.pid,
            call: Syscall::Exit { code },
            reply_tx,
        });
    }

    pub fn getuid(&self) -> Result<Uid, KernelError> {
        match self.call(Syscall::Getuid)? {
            ReturnValue::Uid(uid) => Ok(uid),
            _ => unreachable!("getuid always replies Uid"),
        }
    }

    pub fn geteuid(&self) -> Result<Uid, KernelError> {
        match self.call(Syscall::Geteuid)? {
            ReturnValue::Uid(uid) => Ok(uid),
            _ => unreachable!("geteuid always replies Uid"),
        }
    }

    pub fn getgid(&self) -> Result<Gid, KernelError> {
        match self.call(Syscall::Getgid)? {
            ReturnValue::Gid(gid) => Ok(gid),
            _ => unreachable!("getgid always replies Gid"),
        }
    }

    pub fn getegid(&self) -> Result<Gid, KernelError> {
        match self.call(Syscall::Getegid)? {
            ReturnValue::Gid(gid) => Ok(gid),
            _ => unreachable!("getegid always replies Gid"),
        }
    }

    pub fn getpid(&self) -> Result<Pid, KernelError> {
        match self.call(Syscall::Getpid)? {
            ReturnValue::Pid(pid) => Ok(pid),
            _ => unreachable!("getpid always replies Pid"),
        }
    }

    pub fn setuid(&self, uid: Uid) -> Result<(), KernelError> {
        self.call(Syscall::Setuid { uid })?;
        Ok(())
    }

    pub fn setgid(&self, gid: Gid) -> Result<(), KernelError> {
        self.call(Syscall::Setgid { gid })?;
        Ok(())
    }
}
