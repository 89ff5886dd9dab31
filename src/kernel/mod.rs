//! The kernel proper: a single-threaded dispatch loop owning every
//! volume, the mount table, the process table, and the open-file-
//! description table.
//!
//! Every user task runs on its own OS thread and only ever touches
//! kernel state through a [`Syscalls`](crate::channel::Syscalls)
//! handle. The original serializes the same access pattern with
//! `select()` over a pipe per process; `std::sync::mpsc` gives the
//! same multi-producer, single-consumer shape without the syscall
//! overhead of real pipes.

mod handlers;
mod resolve;

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::channel::{request_channel, Reply, Request, Syscall, Syscalls};
use crate::env::Environment;
use crate::errno::{errno, KernelResult};
use crate::fs::Volume;
use crate::ids::{FilesystemId, Gid, INumber, Ofd, Pid, Uid};
use crate::ofd::OpenFileDescription;
use crate::process::{FdTable, ProcessEntry, ProcessStatus};
use crate::program::{Program, ProgramRegistry};

/// A location inside the volume graph: which volume, which inode.
pub type Location = (FilesystemId, INumber);

pub struct Kernel {
    volumes: HashMap<FilesystemId, Volume>,
    /// Maps a mount-point inode to the filesystem mounted over it.
    mounts: HashMap<Location, FilesystemId>,
    root_fs: FilesystemId,
    processes: HashMap<Pid, ProcessEntry>,
    ofds: HashMap<Ofd, OpenFileDescription>,
    next_pid: u32,
    next_ofd: u32,
    programs: ProgramRegistry,
    request_tx: mpsc::Sender<Request>,
    request_rx: mpsc::Receiver<Request>,
    /// A process blocked in `waitpid` has its one-shot reply channel
    /// parked here until a matching child becomes a zombie.
    waiting_replies: HashMap<Pid, mpsc::Sender<Reply>>,
}

impl Kernel {
    pub fn new(root_volume: Volume, programs: ProgramRegistry) -> Self {
        let root_fs = root_volume.uuid;
        let mut volumes = HashMap::new();
        volumes.insert(root_fs, root_volume);
        let (request_tx, request_rx) = request_channel();
        Kernel {
            volumes,
            mounts: HashMap::new(),
            root_fs,
            processes: HashMap::new(),
            ofds: HashMap::new(),
            next_pid: 1,
            next_ofd: 1,
            programs,
            request_tx,
            request_rx,
            waiting_replies: HashMap::new(),
        }
    }

    pub fn root_location(&self) -> Location {
        let root_inumber = self
            .volumes
            .get(&self.root_fs)
            .and_then(Volume::root_inumber)
            .expect("root volume must have a root inode before boot completes");
        (self.root_fs, root_inumber)
    }

    pub fn mount_volume(&mut self, at: Location, mut volume: Volume) {
        let fsid = volume.uuid;
        volume.covered = Some(at);
        self.volumes.insert(fsid, volume);
        self.mounts.insert(at, fsid);
        if let Some(vol) = self.volumes.get_mut(&at.0) {
            if let Some(inode) = vol.get_mut(at.1) {
                inode.is_mount = true;
            }
        }
    }

    fn volume(&self, fsid: FilesystemId) -> KernelResult<&Volume> {
        self.volumes
            .get(&fsid)
            .ok_or_else(|| errno!(Panic, "unknown filesystem {fsid}"))
    }

    fn volume_mut(&mut self, fsid: FilesystemId) -> KernelResult<&mut Volume> {
        self.volumes
            .get_mut(&fsid)
            .ok_or_else(|| errno!(Panic, "unknown filesystem {fsid}"))
    }

    fn process(&self, pid: Pid) -> KernelResult<&ProcessEntry> {
        self.processes
            .get(&pid)
            .ok_or_else(|| errno!(Esrch, "no such process {pid}"))
    }

    fn process_mut(&mut self, pid: Pid) -> KernelResult<&mut ProcessEntry> {
        self.processes
            .get_mut(&pid)
            .ok_or_else(|| errno!(Esrch, "no such process {pid}"))
    }

    /// Instantiates `program_id` and spawns its own OS thread, wiring it
    /// a fresh `Syscalls` handle. Used by both `boot` (for `init`, which
    /// has no parent) and the `fork` syscall handler.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn_process(
        &mut self,
        parent: Option<Pid>,
        program_id: &str,
        command: String,
        argv: Vec<String>,
        uid: Uid,
        gid: Gid,
        current_dir: String,
        env: Environment,
        tty: i32,
    ) -> KernelResult<(Pid, JoinHandle<()>)> {
        let program = self
            .programs
            .instantiate(program_id)
            .ok_or_else(|| errno!(Enoexec, "unknown program id {program_id}"))?;

        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        let entry = ProcessEntry::new(pid, parent, command, uid, gid, current_dir, env.clone(), tty);
        self.processes.insert(pid, entry);

        let syscalls = Syscalls::new(pid, self.request_tx.clone());
        let handle = std::thread::Builder::new()
            .name(format!("unix74-pid-{}", pid.0))
            .spawn(move || run_program(program, syscalls, env, argv))
            .expect("failed to spawn user task thread");

        Ok((pid, handle))
    }

    pub fn allocate_ofd(&mut self, ofd: OpenFileDescription) -> Ofd {
        let id = ofd.id;
        self.ofds.insert(id, ofd);
        id
    }

    fn next_ofd_id(&mut self) -> Ofd {
        let id = Ofd(self.next_ofd);
        self.next_ofd += 1;
        id
    }

    /// Spawns the first process, with no parent, the superuser's
    /// identity, and `/` as its working directory. Analogous to the
    /// original booting `init` directly rather than through `fork`.
    pub fn spawn_init(&mut self, program_id: &str, command: &str, argv: Vec<String>) -> KernelResult<Pid> {
        let (pid, _handle) = self.spawn_process(
            None,
            program_id,
            command.to_string(),
            argv,
            crate::ids::ROOT_UID,
            crate::ids::ROOT_GID,
            "/".to_string(),
            Environment::new(),
            -1,
        )?;
        Ok(pid)
    }

    /// The exit code a finished process left behind, if it has run to
    /// completion and nothing has reaped it yet.
    pub fn exit_code(&self, pid: Pid) -> Option<i32> {
        match self.processes.get(&pid)?.status {
            ProcessStatus::Zombie { exit_code } => Some(exit_code),
            _ => None,
        }
    }

    fn all_processes_finished(&self) -> bool {
        !self.processes.is_empty() && self.processes.values().all(ProcessEntry::is_zombie)
    }

    /// Drains `request_rx`, dispatching one syscall at a time, until
    /// every spawned process has exited. This is the entire concurrency
    /// story: one thread, one request in flight, replies delivered by
    /// one-shot channels.
    ///
    /// Note this does not wait for `request_rx` to disconnect: the
    /// kernel holds its own `Sender` (to clone for new processes), so
    /// the channel never disconnects on its own.
    pub fn run(&mut self) {
        info!("kernel dispatch loop starting");
        while let Ok(request) = self.request_rx.recv() {
            let pid = request.pid;
            debug!("dispatch pid={} call={:?}", pid, request.call);
            self.dispatch(request);
            if self.all_processes_finished() {
                break;
            }
        }
        info!("kernel dispatch loop exiting: all processes finished");
    }

    fn dispatch(&mut self, request: Request) {
        let Request { pid, call, reply_tx } = request;
        if let Syscall::Waitpid { child } = call {
            match self.try_waitpid(pid, child) {
                Ok(Some(value)) => {
                    let _ = reply_tx.send(Ok(value));
                }
                Ok(None) => {
                    self.waiting_replies.insert(pid, reply_tx);
                    if let Ok(entry) = self.process_mut(pid) {
                        entry.status = ProcessStatus::Waiting { child };
                    }
                }
                Err(err) => {
                    warn!("pid={pid} waitpid failed: {err}");
                    let _ = reply_tx.send(Err(err));
                }
            }
            return;
        }

        let reply = self.handle(pid, call);
        if let Err(ref err) = reply {
            warn!("pid={pid} syscall failed: {err}");
        }
        let _ = reply_tx.send(reply);
    }
}

fn run_program(program: Box<dyn Program>, syscalls: Syscalls, env: Environment, argv: Vec<String>) {
    let pid = syscalls.pid();
    let code = program.run(syscalls.clone(), env, argv);
    debug!("pid={pid} program returned {code}, finalizing exit");
    syscalls.exit(code);
}

impl Kernel {
    pub(crate) fn fd_table_of(&self, pid: Pid) -> KernelResult<&FdTable> {
        Ok(&self.process(pid)?.fd_table)
    }

    pub(crate) fn fd_table_of_mut(&mut self, pid: Pid) -> KernelResult<&mut FdTable> {
        Ok(&mut self.process_mut(pid)?.fd_table)
    }
}
