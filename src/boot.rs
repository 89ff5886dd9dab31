//! Builds the boot-time filesystem tree: the root volume's `/bin`,
//! `/etc`, `/tmp`, `/usr`, `/var` layout and the separate `/dev` volume
//! mounted over it, plus the `root`/`liz`/`murtaugh` user and group
//! records.
//!
//! Grounded in `filesystem_loader.py`'s `makeRoot`/`makeDev`/`makeEtc`/
//! `makeLizHome`/`makeMurtaughHome` and the `users`/`groups` tables it
//! builds them from.

use std::time::SystemTime;

use crate::fs::devices::DeviceId;
use crate::fs::inode::{BinaryImage, FileType, INode, INodeData};
use crate::fs::Volume;
use crate::ids::{Gid, Uid, ROOT_GID, ROOT_UID};
use crate::kernel::{Kernel, Location};
use crate::perm::FilePermissions;
use crate::program::ProgramRegistry;
use crate::user::{Group, User};

pub const LIZ_UID: Uid = Uid(128);
pub const LIZ_GID: Gid = Gid(128);
pub const MURTAUGH_UID: Uid = Uid(129);
pub const MURTAUGH_GID: Gid = Gid(129);

fn users() -> Vec<User> {
    vec![
        User {
            name: "root".to_string(),
            password_hash: "*".to_string(),
            uid: ROOT_UID,
            gid: ROOT_GID,
            gecos: "root".to_string(),
            home: "/".to_string(),
            shell: "/bin/sh".to_string(),
        },
        User {
            name: "liz".to_string(),
            password_hash: "*".to_string(),
            uid: LIZ_UID,
            gid: LIZ_GID,
            gecos: "liz".to_string(),
            home: "/usr/liz".to_string(),
            shell: "/bin/sh".to_string(),
        },
        User {
            name: "murtaugh".to_string(),
            password_hash: "*".to_string(),
            uid: MURTAUGH_UID,
            gid: MURTAUGH_GID,
            gecos: "murtaugh".to_string(),
            home: "/usr/murtaugh".to_string(),
            shell: "/bin/sh".to_string(),
        },
    ]
}

fn groups() -> Vec<Group> {
    vec![
        Group {
            name: "root".to_string(),
            password_hash: "*".to_string(),
            gid: ROOT_GID,
            members: vec![],
        },
        Group {
            name: "liz".to_string(),
            password_hash: "*".to_string(),
            gid: LIZ_GID,
            members: vec!["liz".to_string()],
        },
        Group {
            name: "murtaugh".to_string(),
            password_hash: "*".to_string(),
            gid: MURTAUGH_GID,
            members: vec!["murtaugh".to_string()],
        },
    ]
}

/// One directory or file to add under a parent while building the tree.
struct Entry<'a> {
    name: &'a str,
    owner: Uid,
    group: Gid,
    permissions: i32,
    data: INodeData,
}

fn add_child(vol: &mut Volume, parent: crate::ids::INumber, entry: Entry) -> crate::ids::INumber {
    let file_type = match &entry.data {
        INodeData::Directory(_) => FileType::Directory,
        INodeData::Binary(_) => FileType::Regular,
        INodeData::Device(_) => FileType::Character,
        INodeData::Regular(_) => FileType::Regular,
    };
    let inum = vol.claim_next_inumber();
    let inode = INode::new(
        inum,
        FilePermissions::parse(entry.permissions),
        file_type,
        entry.owner,
        entry.group,
        SystemTime::now(),
        entry.data,
        vol.uuid,
    );
    vol.add(inode);
    vol.get_mut(parent)
        .expect("parent must already exist")
        .data
        .as_directory_mut()
        .expect("parent must be a directory")
        .add_child(entry.name, inum)
        .expect("name must be non-empty");
    inum
}

fn make_dir(vol: &mut Volume, parent: crate::ids::INumber, name: &str, owner: Uid, group: Gid, permissions: i32) -> crate::ids::INumber {
    let inum = add_child(
        vol,
        parent,
        Entry {
            name,
            owner,
            group,
            permissions,
            data: INodeData::new_directory(),
        },
    );
    vol.get_mut(inum)
        .unwrap()
        .data
        .as_directory_mut()
        .unwrap()
        .add_child(".", inum)
        .unwrap();
    vol.get_mut(inum)
        .unwrap()
        .data
        .as_directory_mut()
        .unwrap()
        .add_child("..", parent)
        .unwrap();
    inum
}

fn make_file(vol: &mut Volume, parent: crate::ids::INumber, name: &str, owner: Uid, group: Gid, permissions: i32, contents: &[u8]) -> crate::ids::INumber {
    add_child(
        vol,
        parent,
        Entry {
            name,
            owner,
            group,
            permissions,
            data: INodeData::Regular(contents.to_vec()),
        },
    )
}

/// Builds the root volume: `/`, `/bin` populated from every program the
/// registry knows about, `/etc/passwd` and `/etc/group`, `/tmp` (sticky,
/// world-writable), and home directories for `liz` and `murtaugh`.
pub fn make_root_volume(programs: &ProgramRegistry, program_ids: &[&str]) -> Volume {
    let mut vol = Volume::new(uuid::Uuid::new_v4());
    let root_inum = vol.claim_next_inumber();
    {
        let root_inode = INode::new(
            root_inum,
            FilePermissions::parse(0o755),
            FileType::Directory,
            ROOT_UID,
            ROOT_GID,
            SystemTime::now(),
            INodeData::new_directory(),
            vol.uuid,
        );
        vol.add(root_inode);
    }
    vol.get_mut(root_inum)
        .unwrap()
        .data
        .as_directory_mut()
        .unwrap()
        .add_child(".", root_inum)
        .unwrap();
    vol.get_mut(root_inum)
        .unwrap()
        .data
        .as_directory_mut()
        .unwrap()
        .add_child("..", root_inum)
        .unwrap();

    let bin_inum = make_dir(&mut vol, root_inum, "bin", ROOT_UID, ROOT_GID, 0o755);
    for id in program_ids.iter().copied() {
        if let Some(image) = programs.binary_image(id) {
            add_child(
                &mut vol,
                bin_inum,
                Entry {
                    name: id,
                    owner: ROOT_UID,
                    group: ROOT_GID,
                    permissions: 0o755,
                    data: INodeData::Binary(BinaryImage {
                        program_id: image.program_id,
                        content_hash: image.content_hash,
                    }),
                },
            );
        }
    }

    make_dir(&mut vol, root_inum, "dev", ROOT_UID, ROOT_GID, 0o755);

    let etc_inum = make_dir(&mut vol, root_inum, "etc", ROOT_UID, ROOT_GID, 0o755);
    let passwd = users().iter().map(|u| u.to_string()).collect::<Vec<_>>().join("\n") + "\n";
    let group_file = groups().iter().map(|g| g.to_string()).collect::<Vec<_>>().join("\n") + "\n";
    make_file(&mut vol, etc_inum, "passwd", ROOT_UID, ROOT_GID, 0o644, passwd.as_bytes());
    make_file(&mut vol, etc_inum, "group", ROOT_UID, ROOT_GID, 0o644, group_file.as_bytes());

    make_dir(&mut vol, root_inum, "tmp", ROOT_UID, ROOT_GID, 0o1777);

    let usr_inum = make_dir(&mut vol, root_inum, "usr", ROOT_UID, ROOT_GID, 0o755);
    let liz_inum = make_dir(&mut vol, usr_inum, "liz", LIZ_UID, LIZ_GID, 0o755);
    make_file(
        &mut vol,
        liz_inum,
        "note.txt",
        LIZ_UID,
        LIZ_GID,
        0o644,
        b"Gone to the terminal room. Back by five. -liz\n",
    );
    let murtaugh_inum = make_dir(&mut vol, usr_inum, "murtaugh", MURTAUGH_UID, MURTAUGH_GID, 0o755);
    make_file(
        &mut vol,
        murtaugh_inum,
        "myself.txt",
        MURTAUGH_UID,
        MURTAUGH_GID,
        0o644,
        b"Notes to self, mostly about liz and the portal.\n",
    );
    make_file(
        &mut vol,
        murtaugh_inum,
        "diary1.txt",
        MURTAUGH_UID,
        MURTAUGH_GID,
        0o600,
        b"Day one: the machine booted clean.\n",
    );

    make_dir(&mut vol, root_inum, "var", ROOT_UID, ROOT_GID, 0o755);

    vol
}

/// Builds the `/dev` volume: `null`, `console`, and `mem`.
pub fn make_dev_volume() -> Volume {
    let mut vol = Volume::new(uuid::Uuid::new_v4());
    let root_inum = vol.claim_next_inumber();
    let root_inode = INode::new(
        root_inum,
        FilePermissions::parse(0o755),
        FileType::Directory,
        ROOT_UID,
        ROOT_GID,
        SystemTime::now(),
        INodeData::new_directory(),
        vol.uuid,
    );
    vol.add(root_inode);
    vol.get_mut(root_inum)
        .unwrap()
        .data
        .as_directory_mut()
        .unwrap()
        .add_child(".", root_inum)
        .unwrap();
    vol.get_mut(root_inum)
        .unwrap()
        .data
        .as_directory_mut()
        .unwrap()
        .add_child("..", root_inum)
        .unwrap();

    add_child(
        &mut vol,
        root_inum,
        Entry {
            name: "null",
            owner: ROOT_UID,
            group: ROOT_GID,
            permissions: 0o666,
            data: INodeData::Device(DeviceId::Null),
        },
    );
    add_child(
        &mut vol,
        root_inum,
        Entry {
            name: "console",
            owner: ROOT_UID,
            group: ROOT_GID,
            permissions: 0o622,
            data: INodeData::Device(DeviceId::Console),
        },
    );
    add_child(
        &mut vol,
        root_inum,
        Entry {
            name: "mem",
            owner: ROOT_UID,
            group: ROOT_GID,
            permissions: 0o444,
            data: INodeData::Device(DeviceId::Mem),
        },
    );

    vol
}

/// Builds a kernel with the root volume mounted, `/dev` mounted over
/// `/dev`, and every registered program present under `/bin`.
pub fn boot(programs: ProgramRegistry, program_ids: &[&str]) -> Kernel {
    let root_volume = make_root_volume(&programs, program_ids);
    let mut kernel = Kernel::new(root_volume, programs);

    let root: Location = kernel.root_location();
    let root_identity = crate::perm::AccessIdentity::new(ROOT_UID, ROOT_GID);
    if let Ok(loc) = kernel.resolve("dev", root, root_identity) {
        kernel.mount_volume(loc, make_dev_volume());
    }

    kernel
}
