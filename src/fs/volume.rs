//! A self-contained filesystem volume: an inode table keyed by
//! [`INumber`], a root inumber, and a monotonic allocator.

use std::collections::HashMap;

use crate::fs::inode::INode;
use crate::ids::{FilesystemId, INumber};

pub const DEFAULT_BLOCK_SIZE: u64 = 512;

#[derive(Debug)]
pub struct Volume {
    pub uuid: FilesystemId,
    inodes: HashMap<INumber, INode>,
    root_inum: Option<INumber>,
    next_inumber: u64,
    block_size: u64,
    /// `(filesystem_id, inumber)` of the inode this volume is mounted
    /// over, or `None` for the root volume.
    pub covered: Option<(FilesystemId, INumber)>,
}

impl Volume {
    pub fn new(uuid: FilesystemId) -> Self {
        Volume {
            uuid,
            inodes: HashMap::new(),
            root_inum: None,
            next_inumber: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            covered: None,
        }
    }

    /// Allocates the next inumber. The first allocation becomes this
    /// volume's root.
    pub fn claim_next_inumber(&mut self) -> INumber {
        let inumber = INumber(self.next_inumber);
        if self.root_inum.is_none() {
            self.root_inum = Some(inumber);
        }
        self.next_inumber += 1;
        inumber
    }

    pub fn root_inumber(&self) -> Option<INumber> {
        self.root_inum
    }

    pub fn root(&self) -> Option<&INode> {
        self.root_inum.and_then(|i| self.inodes.get(&i))
    }

    pub fn add(&mut self, inode: INode) {
        self.inodes.insert(inode.inumber, inode);
    }

    pub fn get(&self, inumber: INumber) -> Option<&INode> {
        self.inodes.get(&inumber)
    }

    pub fn get_mut(&mut self, inumber: INumber) -> Option<&mut INode> {
        self.inodes.get_mut(&inumber)
    }

    pub fn remove(&mut self, inumber: INumber) -> Option<INode> {
        self.inodes.remove(&inumber)
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    /// Sum over all inodes of `ceil(data.size() / block_size) * block_size`.
    pub fn size(&self) -> u64 {
        self.inodes
            .values()
            .map(|inode| {
                let bytes = inode.data.size() as u64;
                bytes.div_ceil(self.block_size) * self.block_size
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::inode::{FileType, INodeData};
    use crate::perm::FilePermissions;
    use std::time::SystemTime;

    #[test]
    fn first_claim_becomes_root() {
        let mut vol = Volume::new(uuid::Uuid::new_v4());
        let first = vol.claim_next_inumber();
        let second = vol.claim_next_inumber();
        assert_eq!(vol.root_inumber(), Some(first));
        assert_ne!(first, second);
    }

    #[test]
    fn size_aggregates_rounded_to_block_size() {
        let mut vol = Volume::new(uuid::Uuid::new_v4());
        let inum = vol.claim_next_inumber();
        let inode = INode::new(
            inum,
            FilePermissions::parse(0o644),
            FileType::Regular,
            crate::ids::Uid(0),
            crate::ids::Gid(0),
            SystemTime::now(),
            INodeData::Regular(vec![0u8; 600]),
            vol.uuid,
        );
        vol.add(inode);
        // 600 bytes -> 2 blocks of 512 = 1024.
        assert_eq!(vol.size(), 1024);
    }
}
