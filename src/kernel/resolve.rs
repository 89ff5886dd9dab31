//! Path resolution: splitting a path into components and walking the
//! volume graph, crossing mount points in both directions.
//!
//! Grounded in `traversePath`/`iget` from the original kernel: a mount
//! point inode is tagged and redirected to the covering or covered
//! volume's root as each component is stepped through, rather than
//! being resolved against a single global inode table.

use crate::errno::{errno, KernelResult};
use crate::perm::{access, AccessIdentity, Mode};

use super::{Kernel, Location};

fn split(path: &str) -> (bool, Vec<&str>) {
    let absolute = path.starts_with('/');
    let components = path.split('/').filter(|s| !s.is_empty()).collect();
    (absolute, components)
}

impl Kernel {
    /// Steps from `from` to the directory entry named `component`,
    /// crossing a mount point either direction as needed. Requires
    /// EXEC on `from` first — traversing a directory without search
    /// permission is EACCES even if the final target would otherwise
    /// be readable.
    fn step(&self, identity: AccessIdentity, from: Location, component: &str) -> KernelResult<Location> {
        let (fsid, inum) = if component == ".." {
            self.cross_mount_up(from)?
        } else {
            from
        };

        let vol = self.volume(fsid)?;
        let inode = vol
            .get(inum)
            .ok_or_else(|| errno!(Panic, "dangling inode {inum} in {fsid}"))?;
        access(identity, inode.owner, inode.group, &inode.permissions, Mode::EXEC)?;
        let entries = inode.data.as_directory()?;
        let next_inum = entries
            .get(component)
            .ok_or_else(|| errno!(Enoent, "{component}: no such file or directory"))?;

        self.cross_mount_down((fsid, next_inum))
    }

    /// If `loc` is a volume's root and that volume covers another
    /// inode, returns the covered location instead — so `..` from a
    /// mount's root steps out into the directory the mount hides,
    /// rather than landing back on the mount point.
    fn cross_mount_up(&self, loc: Location) -> KernelResult<Location> {
        let (fsid, inum) = loc;
        let vol = self.volume(fsid)?;
        if vol.root_inumber() == Some(inum) {
            if let Some(covered) = vol.covered {
                return Ok(covered);
            }
        }
        Ok(loc)
    }

    /// If `loc` names a mount-point inode, follows it down into the
    /// mounted volume's root. Repeats in case volumes are mounted on
    /// top of each other.
    fn cross_mount_down(&self, mut loc: Location) -> KernelResult<Location> {
        loop {
            let (fsid, inum) = loc;
            let vol = self.volume(fsid)?;
            let inode = vol
                .get(inum)
                .ok_or_else(|| errno!(Panic, "dangling inode {inum} in {fsid}"))?;
            if !inode.is_mount {
                return Ok(loc);
            }
            match self.mounts.get(&loc) {
                Some(&mounted_fsid) => {
                    let mounted_vol = self.volume(mounted_fsid)?;
                    let root = mounted_vol
                        .root_inumber()
                        .ok_or_else(|| errno!(Panic, "mounted volume has no root"))?;
                    loc = (mounted_fsid, root);
                }
                None => return Ok(loc),
            }
        }
    }

    /// Resolves `path` to its location, starting from `cwd` for
    /// relative paths or the root for absolute ones. `identity` must
    /// hold EXEC on every directory traversed along the way.
    pub(crate) fn resolve(&self, path: &str, cwd: Location, identity: AccessIdentity) -> KernelResult<Location> {
        let (absolute, components) = split(path);
        let mut loc = if absolute { self.root_location() } else { cwd };
        for component in components {
            loc = self.step(identity, loc, component)?;
        }
        Ok(loc)
    }

    /// Resolves every component but the last, returning the parent
    /// directory's location and the leaf name. Used by operations that
    /// create or remove a directory entry rather than open the target
    /// itself.
    pub(crate) fn resolve_parent(
        &self,
        path: &str,
        cwd: Location,
        identity: AccessIdentity,
    ) -> KernelResult<(Location, String)> {
        let (absolute, mut components) = split(path);
        let leaf = components
            .pop()
            .ok_or_else(|| errno!(Einval, "{path}: no file name component"))?;
        let mut loc = if absolute { self.root_location() } else { cwd };
        for component in components {
            loc = self.step(identity, loc, component)?;
        }
        Ok((loc, leaf.to_string()))
    }
}
