//! Inode records and their polymorphic data payload.

use std::time::SystemTime;

use crate::errno::{errno, KernelError};
use crate::fs::devices::{self, DeviceContext, DeviceId};
use crate::fs::directory::DirectoryEntries;
use crate::ids::{FilesystemId, Gid, INumber, Uid};
use crate::perm::FilePermissions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    None,
    Regular,
    Directory,
    Character,
    Link,
    Pipe,
}

/// A binary inode's payload: a stable program identifier resolved
/// through the program registry, plus a content hash (SHA-256 of the
/// identifier and version) used as a cheap identity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    pub program_id: String,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub enum INodeData {
    Regular(Vec<u8>),
    Directory(DirectoryEntries),
    Binary(BinaryImage),
    Device(DeviceId),
}

impl INodeData {
    pub fn new_directory() -> Self {
        INodeData::Directory(DirectoryEntries::new())
    }

    pub fn read(&self, size: usize, offset: usize, ctx: &DeviceContext) -> Vec<u8> {
        match self {
            INodeData::Regular(bytes) => slice_at(bytes, size, offset),
            INodeData::Directory(_) => Vec::new(),
            INodeData::Binary(_) => Vec::new(),
            INodeData::Device(device) => devices::device_read(*device, size, offset, ctx),
        }
    }

    pub fn write(&mut self, data: &[u8], offset: usize) -> Result<usize, KernelError> {
        match self {
            INodeData::Regular(bytes) => {
                let end = offset + data.len();
                if bytes.len() < end {
                    bytes.resize(end, 0);
                }
                bytes[offset..end].copy_from_slice(data);
                Ok(data.len())
            }
            INodeData::Directory(_) => Err(errno!(Eisdir, "cannot write a directory")),
            INodeData::Binary(_) => Err(errno!(Eacces, "binary images are immutable")),
            INodeData::Device(device) => devices::device_write(*device, data),
        }
    }

    pub fn append(&mut self, data: &[u8]) -> Result<usize, KernelError> {
        match self {
            INodeData::Regular(bytes) => {
                bytes.extend_from_slice(data);
                Ok(data.len())
            }
            INodeData::Directory(_) => Err(errno!(Eisdir, "cannot write a directory")),
            INodeData::Binary(_) => Err(errno!(Eacces, "binary images are immutable")),
            INodeData::Device(device) => devices::device_append(*device, data),
        }
    }

    pub fn trunc(&mut self) -> Result<(), KernelError> {
        match self {
            INodeData::Regular(bytes) => {
                bytes.clear();
                Ok(())
            }
            INodeData::Directory(_) => Err(errno!(Eisdir, "cannot truncate a directory")),
            INodeData::Binary(_) => Err(errno!(Eacces, "binary images are immutable")),
            INodeData::Device(device) => devices::device_trunc(*device),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            INodeData::Regular(bytes) => bytes.len(),
            INodeData::Directory(entries) => entries.len(),
            INodeData::Binary(_) => 0,
            INodeData::Device(_) => 0,
        }
    }

    pub fn as_directory(&self) -> Result<&DirectoryEntries, KernelError> {
        match self {
            INodeData::Directory(entries) => Ok(entries),
            _ => Err(errno!(Enotdir, "not a directory")),
        }
    }

    pub fn as_directory_mut(&mut self) -> Result<&mut DirectoryEntries, KernelError> {
        match self {
            INodeData::Directory(entries) => Ok(entries),
            _ => Err(errno!(Enotdir, "not a directory")),
        }
    }

    pub fn as_binary(&self) -> Result<&BinaryImage, KernelError> {
        match self {
            INodeData::Binary(image) => Ok(image),
            _ => Err(errno!(Enoexec, "not an executable image")),
        }
    }
}

fn slice_at(bytes: &[u8], size: usize, offset: usize) -> Vec<u8> {
    if offset >= bytes.len() {
        return Vec::new();
    }
    let end = (offset + size).min(bytes.len());
    bytes[offset..end].to_vec()
}

#[derive(Debug, Clone)]
pub struct INode {
    pub inumber: INumber,
    pub permissions: FilePermissions,
    pub file_type: FileType,
    pub owner: Uid,
    pub group: Gid,
    pub time_created: SystemTime,
    pub time_modified: SystemTime,
    pub data: INodeData,
    pub filesystem_id: FilesystemId,
    pub is_mount: bool,
    pub device_number: i32,
    pub references: u32,
}

impl INode {
    pub fn new(
        inumber: INumber,
        permissions: FilePermissions,
        file_type: FileType,
        owner: Uid,
        group: Gid,
        time_created: SystemTime,
        data: INodeData,
        filesystem_id: FilesystemId,
    ) -> Self {
        INode {
            inumber,
            permissions,
            file_type,
            owner,
            group,
            time_created,
            time_modified: time_created,
            data,
            filesystem_id,
            is_mount: false,
            device_number: -1,
            references: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(bytes: &[u8]) -> INodeData {
        INodeData::Regular(bytes.to_vec())
    }

    #[test]
    fn regular_write_extends_buffer_with_zero_fill() {
        let mut data = regular(b"ab");
        data.write(b"cd", 4).unwrap();
        assert_eq!(data.size(), 6);
        let ctx = DeviceContext::default();
        assert_eq!(data.read(10, 0, &ctx), b"ab\0\0cd");
    }

    #[test]
    fn append_then_read_roundtrips() {
        let mut data = regular(b"");
        data.append(b"hello").unwrap();
        let ctx = DeviceContext::default();
        assert_eq!(data.read(5, 0, &ctx), b"hello");
        assert_eq!(data.read(5, 5, &ctx), b"");
    }

    #[test]
    fn directory_trunc_is_eisdir() {
        let mut data = INodeData::new_directory();
        assert!(data.trunc().is_err());
    }

    #[test]
    fn directory_add_empty_name_is_enoent() {
        let mut data = INodeData::new_directory();
        let dir = data.as_directory_mut().unwrap();
        assert!(dir.add_child("", INumber(1)).is_err());
    }

    #[test]
    fn binary_write_rejected() {
        let mut data = INodeData::Binary(BinaryImage {
            program_id: "cat".to_string(),
            content_hash: "deadbeef".to_string(),
        });
        assert!(data.write(b"x", 0).is_err());
    }
}
