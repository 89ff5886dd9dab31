//! Strong identifier newtypes.
//!
//! `Uid`, `Gid`, `Pid`, `Fd`, `Ofd` and `INumber` are all non-negative
//! integers but must never silently interconvert — a `Fd` handed to a
//! function expecting an `Ofd` is a bug we want the compiler to catch.

use std::fmt;

macro_rules! id_type {
    ($name:ident, $repr:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub $repr);

        impl $name {
            pub fn next(self) -> Self {
                $name(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(Uid, u32);
id_type!(Gid, u32);
id_type!(Pid, u32);
id_type!(Fd, u32);
id_type!(Ofd, u32);
id_type!(INumber, u64);

/// A UUID-keyed filesystem volume identifier.
pub type FilesystemId = uuid::Uuid;

/// The superuser's uid and gid, used pervasively by the permission model
/// and by the boot loader.
pub const ROOT_UID: Uid = Uid(0);
pub const ROOT_GID: Gid = Gid(0);
