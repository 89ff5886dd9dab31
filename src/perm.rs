//! The UNIX rwx permission model: `Mode`, `SetId`, `FilePermissions`, and
//! the owner/group/other `access` check.

use bitflags::bitflags;

use crate::errno::{errno, KernelError};
use crate::ids::{Gid, Uid};

bitflags! {
    /// A single read/write/exec triad, as requested by a syscall or held
    /// by one of owner/group/other.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct Mode: u8 {
        const EXEC = 1;
        const WRITE = 2;
        const READ = 4;
    }
}

bitflags! {
    /// The high-order setuid/setgid/sticky bits.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct SetId: u8 {
        const STICKY = 1;
        const SET_GID = 2;
        const SET_UID = 4;
    }
}

/// The four 3-bit fields of a classical permission word, as parsed from a
/// 4-digit octal integer: `high*512 + owner*64 + group*8 + other`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FilePermissions {
    pub high: SetId,
    pub owner: Mode,
    pub group: Mode,
    pub other: Mode,
}

/// Which field of a `FilePermissions` a mutation targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PermGroup {
    High,
    Owner,
    Group,
    Other,
}

impl FilePermissions {
    /// Parses a non-negative integer as a 4-digit octal permission word.
    /// Negative values clamp to zero; values `>= 8^4` are reduced modulo
    /// `8^4` rather than rejected, matching the original implementation.
    pub fn parse(permissions: i32) -> Self {
        let permissions = permissions.max(0) as u32 % 8u32.pow(4);
        let other = permissions % 8;
        let group = (permissions / 8) % 8;
        let owner = (permissions / 64) % 8;
        let high = (permissions / 512) % 8;
        FilePermissions {
            high: SetId::from_bits_truncate(high as u8),
            owner: Mode::from_bits_truncate(owner as u8),
            group: Mode::from_bits_truncate(group as u8),
            other: Mode::from_bits_truncate(other as u8),
        }
    }

    /// Re-encodes the four fields back into a 4-digit octal integer.
    pub fn as_octal(&self) -> i32 {
        (self.high.bits() as i32) * 512
            + (self.owner.bits() as i32) * 64
            + (self.group.bits() as i32) * 8
            + self.other.bits() as i32
    }

    pub fn modify(&mut self, group: PermGroup, add: bool, bits: u8) {
        let field = match group {
            PermGroup::High => {
                let mode = SetId::from_bits_truncate(bits);
                if add {
                    self.high.insert(mode);
                } else {
                    self.high.remove(mode);
                }
                return;
            }
            PermGroup::Owner => &mut self.owner,
            PermGroup::Group => &mut self.group,
            PermGroup::Other => &mut self.other,
        };
        let mode = Mode::from_bits_truncate(bits);
        if add {
            field.insert(mode);
        } else {
            field.remove(mode);
        }
    }
}

impl std::fmt::Display for FilePermissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04o}", self.as_octal())
    }
}

/// The subset of process identity the access check needs. The kernel's
/// `ProcessEntry` satisfies this trivially; tests can construct a bare
/// tuple via `AccessIdentity::new`.
#[derive(Copy, Clone, Debug)]
pub struct AccessIdentity {
    pub effective_uid: Uid,
    pub effective_gid: Gid,
}

impl AccessIdentity {
    pub fn new(effective_uid: Uid, effective_gid: Gid) -> Self {
        AccessIdentity {
            effective_uid,
            effective_gid,
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.effective_uid == crate::ids::ROOT_UID
    }
}

/// Checks whether `who` may perform `requested` on an inode owned by
/// `owner`/`group` with the given `permissions`. Only one class (owner,
/// group, or other) is consulted — classical owner-first semantics, not
/// "most permissive of the three".
pub fn access(
    who: AccessIdentity,
    owner: Uid,
    group: Gid,
    permissions: &FilePermissions,
    requested: Mode,
) -> Result<(), KernelError> {
    if who.is_superuser() {
        let any_exec = permissions.owner | permissions.group | permissions.other;
        if requested.contains(Mode::EXEC) && !any_exec.contains(Mode::EXEC) {
            return Err(errno!(Eacces, "no executable bit set for superuser"));
        }
        return Ok(());
    }

    let (class, held) = if who.effective_uid == owner {
        ("owner", permissions.owner)
    } else if who.effective_gid == group {
        ("group", permissions.group)
    } else {
        ("other", permissions.other)
    };

    if held.contains(requested) {
        Ok(())
    } else {
        Err(errno!(
            Eacces,
            "requested {:?}, {} class has {:?}",
            requested,
            class,
            held
        ))
    }
}
