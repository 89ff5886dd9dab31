//! Syscall handlers: one function (or one match arm) per entry in
//! [`Syscall`], grounded in the corresponding method of `unix.py`'s
//! `Unix` class.

use std::time::SystemTime;

use crate::channel::{Dentry, Reply, ReturnValue, Stat, Syscall};
use crate::errno::{errno, Errno, KernelResult};
use crate::fs::devices::DeviceContext;
use crate::fs::inode::{FileType, INode, INodeData};
use crate::ids::{Pid, ROOT_UID};
use crate::ofd::{OpenFileDescription, OpenFlags, SeekFrom};
use crate::perm::{access, FilePermissions, Mode};
use crate::process::ProcessStatus;

use super::{Kernel, Location};

impl Kernel {
    pub(crate) fn handle(&mut self, pid: Pid, call: Syscall) -> Reply {
        match call {
            Syscall::Open { path, flags } => self.do_open(pid, &path, flags),
            Syscall::Creat { path, permissions } => self.do_creat(pid, &path, permissions),
            Syscall::Lseek { fd, offset, whence } => self.do_lseek(pid, fd, offset, whence),
            Syscall::Read { fd, size } => self.do_read(pid, fd, size),
            Syscall::Write { fd, data } => self.do_write(pid, fd, &data),
            Syscall::Close { fd } => self.do_close(pid, fd),
            Syscall::Stat { path } => self.do_stat(pid, &path),
            Syscall::GetDents { fd } => self.do_getdents(pid, fd),
            Syscall::Chdir { path } => self.do_chdir(pid, &path),
            Syscall::Link { target, alias } => self.do_link(pid, &target, &alias),
            Syscall::Unlink { path } => self.do_unlink(pid, &path),
            Syscall::Mount { path, volume } => self.do_mount(pid, &path, volume),
            Syscall::Umount { path } => self.do_umount(pid, &path),
            Syscall::Fork { program, command, argv } => self.do_fork(pid, &program, command, argv),
            Syscall::Execve { path, argv } => self.do_execve(pid, &path, argv),
            Syscall::Waitpid { .. } => unreachable!("waitpid is special-cased in dispatch"),
            Syscall::Exit { code } => self.do_exit(pid, code),
            Syscall::Getuid => Ok(ReturnValue::Uid(self.process(pid)?.real_uid)),
            Syscall::Geteuid => Ok(ReturnValue::Uid(self.process(pid)?.effective_uid)),
            Syscall::Getgid => Ok(ReturnValue::Gid(self.process(pid)?.real_gid)),
            Syscall::Getegid => Ok(ReturnValue::Gid(self.process(pid)?.effective_gid)),
            Syscall::Getpid => Ok(ReturnValue::Pid(pid)),
            Syscall::Setuid { uid } => self.do_setuid(pid, uid),
            Syscall::Setgid { gid } => self.do_setgid(pid, gid),
        }
    }

    fn cwd_location(&self, pid: Pid, identity: crate::perm::AccessIdentity) -> KernelResult<Location> {
        let dir = self.process(pid)?.current_dir.clone();
        self.resolve(&dir, self.root_location(), identity)
    }

    fn inode_meta(&self, loc: Location) -> KernelResult<(crate::ids::Uid, crate::ids::Gid, FilePermissions, FileType)> {
        let vol = self.volume(loc.0)?;
        let inode = vol
            .get(loc.1)
            .ok_or_else(|| errno!(Panic, "dangling inode {} in {}", loc.1, loc.0))?;
        Ok((inode.owner, inode.group, inode.permissions, inode.file_type))
    }

    fn inode(&self, loc: Location) -> KernelResult<&INode> {
        let vol = self.volume(loc.0)?;
        vol.get(loc.1)
            .ok_or_else(|| errno!(Panic, "dangling inode {} in {}", loc.1, loc.0))
    }

    fn inode_mut(&mut self, loc: Location) -> KernelResult<&mut INode> {
        let vol = self.volume_mut(loc.0)?;
        vol.get_mut(loc.1)
            .ok_or_else(|| errno!(Panic, "dangling inode {} in {}", loc.1, loc.0))
    }

    fn device_context(&self) -> DeviceContext {
        DeviceContext {
            process_lines: self
                .processes
                .values()
                .map(|p| format!("{}.{}.{}.{}", p.pid, p.real_uid, p.tty, p.command))
                .collect(),
        }
    }

    fn ofd_location(&self, pid: Pid, fd: crate::ids::Fd) -> KernelResult<Location> {
        let ofd_id = self
            .fd_table_of(pid)?
            .get(fd)
            .ok_or_else(|| errno!(Ebadf, "fd {fd} not open"))?;
        let ofd = self
            .ofds
            .get(&ofd_id)
            .ok_or_else(|| errno!(Panic, "dangling ofd {ofd_id}"))?;
        Ok((ofd.filesystem_id, ofd.inumber))
    }

    fn open_mode_check(&self, identity: crate::perm::AccessIdentity, loc: Location, requested: Mode) -> KernelResult<()> {
        let (owner, group, perms, _) = self.inode_meta(loc)?;
        access(identity, owner, group, &perms, requested)
    }

    fn do_open(&mut self, pid: Pid, path: &str, flags: OpenFlags) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let loc = self.resolve(path, cwd, identity)?;
        let (_, _, _, file_type) = self.inode_meta(loc)?;
        if file_type == FileType::Directory
            && flags.intersects(OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::TRUNCATE)
        {
            return Err(errno!(Eisdir, "{path}: is a directory"));
        }
        let mut requested = Mode::empty();
        if flags.contains(OpenFlags::READ) {
            requested |= Mode::READ;
        }
        if flags.intersects(OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::TRUNCATE) {
            requested |= Mode::WRITE;
        }
        self.open_mode_check(identity, loc, requested)?;
        if flags.contains(OpenFlags::TRUNCATE) {
            self.inode_mut(loc)?.data.trunc()?;
        }
        let ofd_id = self.next_ofd_id();
        self.allocate_ofd(OpenFileDescription::new(ofd_id, flags, loc.0, loc.1));
        let fd = self.fd_table_of_mut(pid)?.claim(ofd_id);
        Ok(ReturnValue::Fd(fd))
    }

    fn do_creat(&mut self, pid: Pid, path: &str, permissions: FilePermissions) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        match self.resolve(path, cwd, identity) {
            Ok(loc) => {
                let (_, _, _, file_type) = self.inode_meta(loc)?;
                if file_type == FileType::Directory {
                    return Err(errno!(Eisdir, "{path}: is a directory"));
                }
                self.open_mode_check(identity, loc, Mode::WRITE)?;
                self.inode_mut(loc)?.data.trunc()?;
                let ofd_id = self.next_ofd_id();
                self.allocate_ofd(OpenFileDescription::new(ofd_id, OpenFlags::WRITE, loc.0, loc.1));
                let fd = self.fd_table_of_mut(pid)?.claim(ofd_id);
                Ok(ReturnValue::Fd(fd))
            }
            Err(err) if err.errno == Errno::Enoent => {
                let (parent_loc, name) = self.resolve_parent(path, cwd, identity)?;
                let (_, _, _, parent_type) = self.inode_meta(parent_loc)?;
                if parent_type != FileType::Directory {
                    return Err(errno!(Enotdir, "{path}: parent is not a directory"));
                }
                self.open_mode_check(identity, parent_loc, Mode::WRITE)?;
                let (uid, gid) = {
                    let proc = self.process(pid)?;
                    (proc.effective_uid, proc.effective_gid)
                };
                let fsid = parent_loc.0;
                let vol = self.volume_mut(fsid)?;
                let inum = vol.claim_next_inumber();
                let inode = INode::new(
                    inum,
                    permissions,
                    FileType::Regular,
                    uid,
                    gid,
                    SystemTime::now(),
                    INodeData::Regular(Vec::new()),
                    fsid,
                );
                vol.add(inode);
                vol.get_mut(parent_loc.1)
                    .ok_or_else(|| errno!(Panic, "dangling parent inode"))?
                    .data
                    .as_directory_mut()?
                    .add_child(&name, inum)?;
                let ofd_id = self.next_ofd_id();
                self.allocate_ofd(OpenFileDescription::new(ofd_id, OpenFlags::WRITE, fsid, inum));
                let fd = self.fd_table_of_mut(pid)?.claim(ofd_id);
                Ok(ReturnValue::Fd(fd))
            }
            Err(err) => Err(err),
        }
    }

    fn do_lseek(&mut self, pid: Pid, fd: crate::ids::Fd, offset: i64, whence: SeekFrom) -> Reply {
        let loc = self.ofd_location(pid, fd)?;
        let size = self.inode(loc)?.data.size() as i64;
        let ofd_id = self.fd_table_of(pid)?.get(fd).expect("checked above");
        let ofd = self
            .ofds
            .get_mut(&ofd_id)
            .ok_or_else(|| errno!(Panic, "dangling ofd"))?;
        let base = match whence {
            SeekFrom::Set => 0,
            SeekFrom::Current => ofd.offset as i64,
            SeekFrom::End => size,
        };
        let new_offset = base + offset;
        if new_offset < 0 {
            return Err(errno!(Einval, "seek to negative offset"));
        }
        ofd.offset = new_offset as u64;
        Ok(ReturnValue::Offset(ofd.offset))
    }

    fn do_read(&mut self, pid: Pid, fd: crate::ids::Fd, size: usize) -> Reply {
        let loc = self.ofd_location(pid, fd)?;
        let ofd_id = self.fd_table_of(pid)?.get(fd).expect("checked above");
        let mode = self
            .ofds
            .get(&ofd_id)
            .ok_or_else(|| errno!(Panic, "dangling ofd"))?
            .mode;
        if !mode.contains(OpenFlags::READ) {
            return Err(errno!(Ebadf, "fd {fd} not open for reading"));
        }
        let offset = self.ofds[&ofd_id].offset as usize;
        let ctx = self.device_context();
        let data = self.inode(loc)?.data.read(size, offset, &ctx);
        let ofd = self
            .ofds
            .get_mut(&ofd_id)
            .ok_or_else(|| errno!(Panic, "dangling ofd"))?;
        ofd.offset += data.len() as u64;
        Ok(ReturnValue::Bytes(data))
    }

    fn do_write(&mut self, pid: Pid, fd: crate::ids::Fd, data: &[u8]) -> Reply {
        let loc = self.ofd_location(pid, fd)?;
        let ofd_id = self.fd_table_of(pid)?.get(fd).expect("checked above");
        let (mode, offset) = {
            let ofd = self
                .ofds
                .get(&ofd_id)
                .ok_or_else(|| errno!(Panic, "dangling ofd"))?;
            (ofd.mode, ofd.offset as usize)
        };
        if !mode.intersects(OpenFlags::WRITE | OpenFlags::APPEND) {
            return Err(errno!(Ebadf, "fd {fd} not open for writing"));
        }
        let written = if mode.contains(OpenFlags::APPEND) {
            self.inode_mut(loc)?.data.append(data)?
        } else {
            self.inode_mut(loc)?.data.write(data, offset)?
        };
        let new_size = self.inode(loc)?.data.size() as u64;
        let ofd = self
            .ofds
            .get_mut(&ofd_id)
            .ok_or_else(|| errno!(Panic, "dangling ofd"))?;
        ofd.offset = if mode.contains(OpenFlags::APPEND) {
            new_size
        } else {
            ofd.offset + written as u64
        };
        Ok(ReturnValue::Count(written))
    }

    fn do_close(&mut self, pid: Pid, fd: crate::ids::Fd) -> Reply {
        let ofd_id = self
            .fd_table_of_mut(pid)?
            .remove(fd)
            .ok_or_else(|| errno!(Ebadf, "fd {fd} not open"))?;
        let orphaned_loc = {
            let ofd = self
                .ofds
                .get_mut(&ofd_id)
                .ok_or_else(|| errno!(Panic, "dangling ofd"))?;
            ofd.ref_count -= 1;
            if ofd.ref_count == 0 {
                Some((ofd.filesystem_id, ofd.inumber))
            } else {
                None
            }
        };
        if orphaned_loc.is_some() {
            self.ofds.remove(&ofd_id);
        }
        if let Some(loc) = orphaned_loc {
            self.reap_if_orphaned(loc);
        }
        Ok(ReturnValue::Unit)
    }

    /// Removes an inode from its volume once both its link count and
    /// its open-file-description count have reached zero. Mirrors the
    /// classical "unlinked but still open" behavior: a file deleted
    /// while a process holds it open keeps its data until the last
    /// `close`.
    fn reap_if_orphaned(&mut self, loc: Location) {
        let references = match self.inode(loc) {
            Ok(inode) => inode.references,
            Err(_) => return,
        };
        if references > 0 {
            return;
        }
        let still_open = self
            .ofds
            .values()
            .any(|ofd| (ofd.filesystem_id, ofd.inumber) == loc);
        if still_open {
            return;
        }
        if let Ok(vol) = self.volume_mut(loc.0) {
            vol.remove(loc.1);
        }
    }

    fn do_stat(&mut self, pid: Pid, path: &str) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let loc = self.resolve(path, cwd, identity)?;
        let inode = self.inode(loc)?;
        Ok(ReturnValue::Stat(Stat {
            inumber: inode.inumber,
            permissions: inode.permissions,
            file_type: inode.file_type,
            owner: inode.owner,
            group: inode.group,
            size: inode.data.size() as u64,
            time_created: inode.time_created,
            time_modified: inode.time_modified,
            filesystem_id: inode.filesystem_id,
            device_number: inode.device_number,
            references: inode.references,
        }))
    }

    fn do_getdents(&mut self, pid: Pid, fd: crate::ids::Fd) -> Reply {
        let loc = self.ofd_location(pid, fd)?;
        let inode = self.inode(loc)?;
        let entries = inode.data.as_directory()?;
        let dentries = entries
            .iter()
            .map(|(name, inumber)| Dentry {
                name: name.to_string(),
                inumber,
                filesystem_id: loc.0,
            })
            .collect();
        Ok(ReturnValue::Dentries(dentries))
    }

    fn do_chdir(&mut self, pid: Pid, path: &str) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let loc = self.resolve(path, cwd, identity)?;
        let (_, _, _, file_type) = self.inode_meta(loc)?;
        if file_type != FileType::Directory {
            return Err(errno!(Enotdir, "{path}: not a directory"));
        }
        self.open_mode_check(identity, loc, Mode::EXEC)?;
        let current = self.process(pid)?.current_dir.clone();
        let new_dir = if path.starts_with('/') {
            path.to_string()
        } else if current == "/" {
            format!("/{path}")
        } else {
            format!("{current}/{path}")
        };
        self.process_mut(pid)?.current_dir = new_dir;
        Ok(ReturnValue::Unit)
    }

    fn do_link(&mut self, pid: Pid, target: &str, alias: &str) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let target_loc = self.resolve(target, cwd, identity)?;
        let (_, _, _, target_type) = self.inode_meta(target_loc)?;
        if target_type == FileType::Directory {
            return Err(errno!(Eperm, "cannot hard-link a directory"));
        }
        let (parent_loc, name) = self.resolve_parent(alias, cwd, identity)?;
        if parent_loc.0 != target_loc.0 {
            return Err(errno!(Exdev, "link target and alias cross a mount boundary"));
        }
        self.open_mode_check(identity, parent_loc, Mode::WRITE)?;
        self.inode_mut(parent_loc)?
            .data
            .as_directory_mut()?
            .add_child(&name, target_loc.1)?;
        self.inode_mut(target_loc)?.references += 1;
        Ok(ReturnValue::Unit)
    }

    fn do_unlink(&mut self, pid: Pid, path: &str) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let (parent_loc, name) = self.resolve_parent(path, cwd, identity)?;
        if name == "." || name == ".." {
            return Err(errno!(Eperm, "cannot unlink {name}"));
        }
        self.open_mode_check(identity, parent_loc, Mode::WRITE)?;
        let target_inum = self
            .inode(parent_loc)?
            .data
            .as_directory()?
            .get(&name)
            .ok_or_else(|| errno!(Enoent, "{path}: no such file or directory"))?;
        self.inode_mut(parent_loc)?
            .data
            .as_directory_mut()?
            .remove_child(&name)?;
        let target_loc = (parent_loc.0, target_inum);
        self.inode_mut(target_loc)?.references -= 1;
        self.reap_if_orphaned(target_loc);
        Ok(ReturnValue::Unit)
    }

    fn do_mount(&mut self, pid: Pid, path: &str, volume: crate::fs::Volume) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let loc = self.resolve(path, cwd, identity)?;
        let (_, _, _, file_type) = self.inode_meta(loc)?;
        if file_type != FileType::Directory {
            return Err(errno!(Enotdir, "{path}: not a directory"));
        }
        if self.process(pid)?.effective_uid != ROOT_UID {
            return Err(errno!(Eperm, "only the superuser may mount"));
        }
        self.mount_volume(loc, volume);
        Ok(ReturnValue::Unit)
    }

    fn do_umount(&mut self, pid: Pid, path: &str) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let loc = self.resolve(path, cwd, identity)?;
        if self.process(pid)?.effective_uid != ROOT_UID {
            return Err(errno!(Eperm, "only the superuser may unmount"));
        }
        let inode = self.inode(loc)?;
        if !inode.is_mount {
            return Err(errno!(Einval, "{path}: not a mount point"));
        }
        let mounted_fsid = self
            .mounts
            .remove(&loc)
            .ok_or_else(|| errno!(Einval, "{path}: not a mount point"))?;
        self.volumes.remove(&mounted_fsid);
        self.inode_mut(loc)?.is_mount = false;
        Ok(ReturnValue::Unit)
    }

    fn do_fork(&mut self, pid: Pid, program: &str, command: String, argv: Vec<String>) -> Reply {
        let (uid, gid, cwd, env, tty, inherited_fds) = {
            let proc = self.process(pid)?;
            (
                proc.effective_uid,
                proc.effective_gid,
                proc.current_dir.clone(),
                proc.env.clone(),
                proc.tty,
                proc.fd_table.iter().collect::<Vec<_>>(),
            )
        };
        let (child_pid, _handle) = self.spawn_process(Some(pid), program, command, argv, uid, gid, cwd, env, tty)?;
        for (fd, ofd_id) in inherited_fds {
            self.fd_table_of_mut(child_pid)?.bind(fd, ofd_id);
            if let Some(ofd) = self.ofds.get_mut(&ofd_id) {
                ofd.ref_count += 1;
            }
        }
        self.process_mut(pid)?.children.push(child_pid);
        Ok(ReturnValue::Pid(child_pid))
    }

    /// Execve has no thread to replace: the calling `Program::run` is
    /// expected to return immediately after a successful `execve`, the
    /// same way a real process never returns from one. The kernel's
    /// contribution is validating the target and updating bookkeeping
    /// (`command`) so `/dev/mem` and `stat` reflect the new identity.
    fn do_execve(&mut self, pid: Pid, path: &str, _argv: Vec<String>) -> Reply {
        let identity = self.process(pid)?.identity();
        let cwd = self.cwd_location(pid, identity)?;
        let loc = self.resolve(path, cwd, identity)?;
        self.inode(loc)?.data.as_binary()?;
        self.open_mode_check(identity, loc, Mode::EXEC)?;
        self.process_mut(pid)?.command = path.to_string();
        Ok(ReturnValue::Pid(pid))
    }

    /// Resolves a blocking `waitpid`. `Ok(Some(_))` means a zombie was
    /// reaped and the caller should reply immediately; `Ok(None)` means
    /// the caller has matching live children and should block.
    pub(crate) fn try_waitpid(&mut self, pid: Pid, child: Option<Pid>) -> KernelResult<Option<ReturnValue>> {
        let children = self.process(pid)?.children.clone();
        let candidates: Vec<Pid> = match child {
            Some(target) => {
                if !children.contains(&target) {
                    return Err(errno!(Echild, "{target} is not a child of {pid}"));
                }
                vec![target]
            }
            None => {
                if children.is_empty() {
                    return Err(errno!(Echild, "{pid} has no children"));
                }
                children
            }
        };

        for candidate in candidates {
            if let Some(ProcessStatus::Zombie { exit_code }) = self.processes.get(&candidate).map(|p| p.status) {
                self.processes.remove(&candidate);
                self.process_mut(pid)?.children.retain(|&c| c != candidate);
                return Ok(Some(ReturnValue::ExitStatus(candidate, exit_code)));
            }
        }
        Ok(None)
    }

    fn do_exit(&mut self, pid: Pid, code: i32) -> Reply {
        let fds: Vec<crate::ids::Fd> = self.fd_table_of(pid)?.iter().map(|(fd, _)| fd).collect();
        for fd in fds {
            let _ = self.do_close(pid, fd);
        }

        let parent = self.process(pid)?.parent;
        self.process_mut(pid)?.status = ProcessStatus::Zombie { exit_code: code };

        if let Some(parent_pid) = parent {
            let matches_filter = match self.processes.get(&parent_pid).map(|p| p.status) {
                Some(ProcessStatus::Waiting { child: None }) => true,
                Some(ProcessStatus::Waiting { child: Some(target) }) => target == pid,
                _ => false,
            };
            if matches_filter {
                if let Some(reply_tx) = self.waiting_replies.remove(&parent_pid) {
                    self.processes.remove(&pid);
                    if let Ok(entry) = self.process_mut(parent_pid) {
                        entry.children.retain(|&c| c != pid);
                        entry.status = ProcessStatus::Running;
                    }
                    let _ = reply_tx.send(Ok(ReturnValue::ExitStatus(pid, code)));
                }
            }
        }

        Ok(ReturnValue::Unit)
    }

    fn do_setuid(&mut self, pid: Pid, uid: crate::ids::Uid) -> Reply {
        let proc = self.process(pid)?;
        if proc.effective_uid != ROOT_UID && uid != proc.real_uid {
            return Err(errno!(Eperm, "only the superuser may change to an arbitrary uid"));
        }
        let proc = self.process_mut(pid)?;
        proc.effective_uid = uid;
        proc.real_uid = uid;
        Ok(ReturnValue::Unit)
    }

    fn do_setgid(&mut self, pid: Pid, gid: crate::ids::Gid) -> Reply {
        let proc = self.process(pid)?;
        if proc.effective_uid != ROOT_UID && gid != proc.real_gid {
            return Err(errno!(Eperm, "only the superuser may change to an arbitrary gid"));
        }
        let proc = self.process_mut(pid)?;
        proc.effective_gid = gid;
        proc.real_gid = gid;
        Ok(ReturnValue::Unit)
    }
}

