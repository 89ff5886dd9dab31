//! Open-file descriptions: the kernel-global records `open`/`creat`
//! allocate, shared by every fd that `fork` or `dup`-equivalents point
//! at the same one.

use bitflags::bitflags;

use crate::ids::{FilesystemId, INumber, Ofd};

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct OpenFlags: u8 {
        const READ = 1;
        const WRITE = 2;
        const APPEND = 4;
        const CREATE = 8;
        const TRUNCATE = 16;
    }
}

impl OpenFlags {
    pub const READ_WRITE: OpenFlags = OpenFlags::READ.union(OpenFlags::WRITE);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SeekFrom {
    Set,
    Current,
    End,
}

/// An open file description: flags, the inode it names, a shared
/// `ref_count`, and the shared seek offset every fd pointing at it
/// advances together.
#[derive(Debug, Clone)]
pub struct OpenFileDescription {
    pub id: Ofd,
    pub mode: OpenFlags,
    pub filesystem_id: FilesystemId,
    pub inumber: INumber,
    pub ref_count: u32,
    pub offset: u64,
}

impl OpenFileDescription {
    pub fn new(id: Ofd, mode: OpenFlags, filesystem_id: FilesystemId, inumber: INumber) -> Self {
        OpenFileDescription {
            id,
            mode,
            filesystem_id,
            inumber,
            ref_count: 1,
            offset: 0,
        }
    }
}
