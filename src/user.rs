//! `/etc/passwd` and `/etc/group` record types and line parsers.
//!
//! The kernel itself never consults these — they exist as the boundary
//! format user-space `Libc`-style helpers (`getpwuid`, `getgrgid`) parse
//! out of the files the boot loader writes into the root volume.

use crate::ids::{Gid, Uid};

/// One `user:pwhash:uid:gid:gecos:home:shell` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub password_hash: String,
    pub uid: Uid,
    pub gid: Gid,
    pub gecos: String,
    pub home: String,
    pub shell: String,
}

impl User {
    pub fn parse(line: &str) -> Option<User> {
        let mut fields = line.splitn(7, ':');
        Some(User {
            name: fields.next()?.to_string(),
            password_hash: fields.next()?.to_string(),
            uid: Uid(fields.next()?.parse().ok()?),
            gid: Gid(fields.next()?.parse().ok()?),
            gecos: fields.next()?.to_string(),
            home: fields.next()?.to_string(),
            shell: fields.next()?.to_string(),
        })
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}",
            self.name, self.password_hash, self.uid, self.gid, self.gecos, self.home, self.shell
        )
    }
}

/// One `name:pwhash:gid:members` record, `members` comma-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub password_hash: String,
    pub gid: Gid,
    pub members: Vec<String>,
}

impl Group {
    pub fn parse(line: &str) -> Option<Group> {
        let mut fields = line.splitn(4, ':');
        let name = fields.next()?.to_string();
        let password_hash = fields.next()?.to_string();
        let gid = Gid(fields.next()?.parse().ok()?);
        let members = fields
            .next()
            .unwrap_or("")
            .split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Some(Group {
            name,
            password_hash,
            gid,
            members,
        })
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.name,
            self.password_hash,
            self.gid,
            self.members.join(",")
        )
    }
}

/// Finds the passwd record for `uid` among the lines of an already-read
/// `/etc/passwd` file.
pub fn find_user_by_uid(passwd_contents: &str, uid: Uid) -> Option<User> {
    passwd_contents
        .lines()
        .filter_map(User::parse)
        .find(|u| u.uid == uid)
}

/// Finds the group record for `gid` among the lines of an already-read
/// `/etc/group` file.
pub fn find_group_by_gid(group_contents: &str, gid: Gid) -> Option<Group> {
    group_contents
        .lines()
        .filter_map(Group::parse)
        .find(|g| g.gid == gid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_passwd_line() {
        let line = "liz:*:128:128:liz:/usr/liz:/bin/sh";
        let user = User::parse(line).unwrap();
        assert_eq!(user.name, "liz");
        assert_eq!(user.uid, Uid(128));
        assert_eq!(user.gid, Gid(128));
        assert_eq!(user.shell, "/bin/sh");
        assert_eq!(user.to_string(), line);
    }

    #[test]
    fn parses_group_line_with_members() {
        let group = Group::parse("staff:*:50:liz,murtaugh").unwrap();
        assert_eq!(group.gid, Gid(50));
        assert_eq!(group.members, vec!["liz", "murtaugh"]);
    }

    #[test]
    fn find_user_by_uid_scans_all_lines() {
        let passwd = "root:*:0:0:root:/:/bin/sh\nliz:*:128:128:liz:/usr/liz:/bin/sh\n";
        let found = find_user_by_uid(passwd, Uid(128)).unwrap();
        assert_eq!(found.name, "liz");
        assert!(find_user_by_uid(passwd, Uid(999)).is_none());
    }
}
