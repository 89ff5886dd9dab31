//! End-to-end scenarios driven entirely through the public `Program` /
//! `Syscalls` surface — no crate-internal test hooks. Each scenario
//! program encodes pass/fail as its own exit code so the test can
//! assert on `Kernel::exit_code` alone.

use unix74::boot;
use unix74::channel::Syscalls;
use unix74::env::Environment;
use unix74::ofd::{OpenFlags, SeekFrom};
use unix74::perm::FilePermissions;
use unix74::program::{Program, ProgramRegistry};
use unix74::programs;

struct ListRoot;
impl Program for ListRoot {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let fd = match syscalls.open("/", OpenFlags::READ) {
            Ok(fd) => fd,
            Err(_) => return 1,
        };
        let entries = match syscalls.getdents(fd) {
            Ok(entries) => entries,
            Err(_) => return 2,
        };
        let names: Vec<&str> = entries.iter().map(|d| d.name.as_str()).collect();
        for expected in ["bin", "dev", "etc", "tmp", "usr", "var"] {
            if !names.contains(&expected) {
                return 3;
            }
        }
        0
    }
}

#[test]
fn boot_lists_expected_root_entries() {
    let mut registry = ProgramRegistry::new();
    registry.register("list-root", || Box::new(ListRoot));
    let ids = vec!["list-root"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("list-root", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct ReadPasswd;
impl Program for ReadPasswd {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let fd = match syscalls.open("/etc/passwd", OpenFlags::READ) {
            Ok(fd) => fd,
            Err(_) => return 1,
        };
        let contents = match syscalls.read(fd, 4096) {
            Ok(bytes) => bytes,
            Err(_) => return 2,
        };
        let text = String::from_utf8_lossy(&contents);
        if !text.contains("root:") || !text.contains("liz:") {
            return 3;
        }
        0
    }
}

#[test]
fn boot_and_read_root_owned_file() {
    let mut registry = ProgramRegistry::new();
    registry.register("read-passwd", || Box::new(ReadPasswd));
    let ids = vec!["read-passwd"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("read-passwd", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct DevNullRoundTrip;
impl Program for DevNullRoundTrip {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let fd = match syscalls.open("/dev/null", OpenFlags::READ_WRITE) {
            Ok(fd) => fd,
            Err(_) => return 1,
        };
        let written = match syscalls.write(fd, b"hello") {
            Ok(n) => n,
            Err(_) => return 2,
        };
        if written != 5 {
            return 3;
        }
        let read_back = match syscalls.read(fd, 10) {
            Ok(bytes) => bytes,
            Err(_) => return 4,
        };
        if !read_back.is_empty() {
            return 5;
        }
        // Crossing back out of the /dev mount: ".." from /dev should
        // reach the root, not loop back into /dev.
        if syscalls.chdir("/dev/..").is_err() {
            return 6;
        }
        let stat = match syscalls.stat(".") {
            Ok(stat) => stat,
            Err(_) => return 7,
        };
        let root_stat = match syscalls.stat("/") {
            Ok(stat) => stat,
            Err(_) => return 8,
        };
        if stat.inumber != root_stat.inumber || stat.filesystem_id != root_stat.filesystem_id {
            return 9;
        }
        0
    }
}

#[test]
fn dev_null_and_mount_crossing() {
    let mut registry = ProgramRegistry::new();
    registry.register("dev-null", || Box::new(DevNullRoundTrip));
    let ids = vec!["dev-null"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("dev-null", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

#[test]
fn fork_and_wait_round_trip() {
    let mut registry = ProgramRegistry::new();
    let ids = programs::register_builtins(&mut registry);
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel
        .spawn_init("fork-and-wait", "init", vec!["5".to_string()])
        .unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(6));
}

#[test]
fn blocking_waitpid_resumes_once_child_exits() {
    let mut registry = ProgramRegistry::new();
    let ids = programs::register_builtins(&mut registry);
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("blocking-wait", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct WriteAsNonOwner;
impl Program for WriteAsNonOwner {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        if syscalls.setuid(unix74::ids::Uid(128)).is_err() {
            return 1;
        }
        match syscalls.open("/etc/passwd", OpenFlags::WRITE) {
            Err(err) if err.errno == unix74::Errno::Eacces => 0,
            Err(_) => 2,
            Ok(_) => 3,
        }
    }
}

#[test]
fn non_owner_write_is_denied() {
    let mut registry = ProgramRegistry::new();
    registry.register("write-denied", || Box::new(WriteAsNonOwner));
    let ids = vec!["write-denied"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("write-denied", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct LinkUnlinkRefcount;
impl Program for LinkUnlinkRefcount {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let fd = match syscalls.creat("/tmp/a", FilePermissions::parse(0o644)) {
            Ok(fd) => fd,
            Err(_) => return 1,
        };
        if syscalls.write(fd, b"payload").is_err() {
            return 2;
        }
        if syscalls.close(fd).is_err() {
            return 3;
        }
        if syscalls.link("/tmp/a", "/tmp/b").is_err() {
            return 4;
        }
        let stat = match syscalls.stat("/tmp/a") {
            Ok(stat) => stat,
            Err(_) => return 5,
        };
        if stat.references != 2 {
            return 6;
        }
        if syscalls.unlink("/tmp/a").is_err() {
            return 7;
        }
        // The data must still be reachable through the surviving link.
        let fd = match syscalls.open("/tmp/b", OpenFlags::READ) {
            Ok(fd) => fd,
            Err(_) => return 8,
        };
        let contents = match syscalls.read(fd, 16) {
            Ok(bytes) => bytes,
            Err(_) => return 9,
        };
        if contents != b"payload" {
            return 10;
        }
        if syscalls.unlink("/tmp/b").is_err() {
            return 11;
        }
        if syscalls.stat("/tmp/b").is_ok() {
            return 12;
        }
        0
    }
}

#[test]
fn link_and_unlink_track_reference_counts() {
    let mut registry = ProgramRegistry::new();
    registry.register("link-unlink", || Box::new(LinkUnlinkRefcount));
    let ids = vec!["link-unlink"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("link-unlink", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct SeekSharesOffsetAcrossReads;
impl Program for SeekSharesOffsetAcrossReads {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let fd = match syscalls.creat("/tmp/seek", FilePermissions::parse(0o644)) {
            Ok(fd) => fd,
            Err(_) => return 1,
        };
        if syscalls.write(fd, b"0123456789").is_err() {
            return 2;
        }
        if syscalls.lseek(fd, 0, SeekFrom::Set).is_err() {
            return 3;
        }
        let first = match syscalls.read(fd, 3) {
            Ok(bytes) => bytes,
            Err(_) => return 4,
        };
        let second = match syscalls.read(fd, 3) {
            Ok(bytes) => bytes,
            Err(_) => return 5,
        };
        if first != b"012" || second != b"345" {
            return 6;
        }
        0
    }
}

#[test]
fn sequential_reads_advance_shared_offset() {
    let mut registry = ProgramRegistry::new();
    registry.register("seek-share", || Box::new(SeekSharesOffsetAcrossReads));
    let ids = vec!["seek-share"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("seek-share", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct ForkFdChild;
impl Program for ForkFdChild {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        // Reads through the fd inherited from the parent's table rather
        // than opening the file itself.
        let data = match syscalls.read(unix74::ids::Fd(0), 5) {
            Ok(bytes) => bytes,
            Err(_) => return 1,
        };
        if data != b"01234" {
            return 2;
        }
        0
    }
}

struct ForkFdParent;
impl Program for ForkFdParent {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let fd = match syscalls.creat("/tmp/forkfd", FilePermissions::parse(0o644)) {
            Ok(fd) => fd,
            Err(_) => return 1,
        };
        if syscalls.write(fd, b"0123456789").is_err() {
            return 2;
        }
        if syscalls.lseek(fd, 0, SeekFrom::Set).is_err() {
            return 3;
        }
        let child = match syscalls.fork("fork-fd-child".to_string(), "fork-fd-child", vec![]) {
            Ok(pid) => pid,
            Err(_) => return 4,
        };
        let (_, code) = match syscalls.waitpid(Some(child)) {
            Ok(r) => r,
            Err(_) => return 5,
        };
        if code != 0 {
            return 6;
        }
        // The child's read shares this fd's OFD, so the offset it left
        // behind is visible here too.
        let rest = match syscalls.read(fd, 10) {
            Ok(bytes) => bytes,
            Err(_) => return 7,
        };
        if rest != b"56789" {
            return 8;
        }
        0
    }
}

#[test]
fn fd_survives_fork_with_shared_offset() {
    let mut registry = ProgramRegistry::new();
    registry.register("fork-fd-parent", || Box::new(ForkFdParent));
    registry.register("fork-fd-child", || Box::new(ForkFdChild));
    let ids = vec!["fork-fd-parent", "fork-fd-child"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("fork-fd-parent", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct MountAsRoot;
impl Program for MountAsRoot {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let before = match syscalls.stat("/tmp") {
            Ok(stat) => stat,
            Err(_) => return 1,
        };
        if syscalls.mount("/tmp", unix74::boot::make_dev_volume()).is_err() {
            return 2;
        }
        let after = match syscalls.stat("/tmp") {
            Ok(stat) => stat,
            Err(_) => return 3,
        };
        if after.filesystem_id == before.filesystem_id {
            return 4;
        }
        0
    }
}

#[test]
fn mount_is_reachable_through_the_syscall_layer() {
    let mut registry = ProgramRegistry::new();
    registry.register("mount-as-root", || Box::new(MountAsRoot));
    let ids = vec!["mount-as-root"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("mount-as-root", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct MountAsNonRoot;
impl Program for MountAsNonRoot {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        if syscalls.setuid(unix74::ids::Uid(128)).is_err() {
            return 1;
        }
        match syscalls.mount("/tmp", unix74::boot::make_dev_volume()) {
            Err(err) if err.errno == unix74::Errno::Eperm => 0,
            Err(_) => 2,
            Ok(_) => 3,
        }
    }
}

#[test]
fn mount_as_non_superuser_is_denied() {
    let mut registry = ProgramRegistry::new();
    registry.register("mount-as-non-root", || Box::new(MountAsNonRoot));
    let ids = vec!["mount-as-non-root"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("mount-as-non-root", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}

struct ReadLizNote;
impl Program for ReadLizNote {
    fn run(&self, syscalls: Syscalls, _env: Environment, _argv: Vec<String>) -> i32 {
        let fd = match syscalls.open("/usr/liz/note.txt", OpenFlags::READ) {
            Ok(fd) => fd,
            Err(_) => return 1,
        };
        let contents = match syscalls.read(fd, 8192) {
            Ok(bytes) => bytes,
            Err(_) => return 2,
        };
        if contents.is_empty() {
            return 3;
        }
        let second = match syscalls.read(fd, 8192) {
            Ok(bytes) => bytes,
            Err(_) => return 4,
        };
        if !second.is_empty() {
            return 5;
        }
        0
    }
}

#[test]
fn boot_and_read_liz_note() {
    let mut registry = ProgramRegistry::new();
    registry.register("read-liz-note", || Box::new(ReadLizNote));
    let ids = vec!["read-liz-note"];
    let mut kernel = boot::boot(registry, &ids);
    let init = kernel.spawn_init("read-liz-note", "init", vec![]).unwrap();
    kernel.run();
    assert_eq!(kernel.exit_code(init), Some(0));
}
