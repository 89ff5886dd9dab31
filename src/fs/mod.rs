//! The virtual filesystem layer: inodes, directory entries, device
//! drivers, and the per-volume inode table.

pub mod devices;
pub mod directory;
pub mod inode;
pub mod volume;

pub use devices::{DeviceContext, DeviceId};
pub use inode::{BinaryImage, FileType, INode, INodeData};
pub use volume::Volume;
