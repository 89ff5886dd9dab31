//! An order-preserving `name -> inumber` map, the backing store of
//! directory inodes. A plain `Vec` is enough at the scale this kernel
//! operates at and keeps `getdents` trivially faithful to insertion
//! order without pulling in an external ordered-map crate.

use crate::errno::{errno, KernelError};
use crate::ids::INumber;

#[derive(Debug, Clone, Default)]
pub struct DirectoryEntries {
    entries: Vec<(String, INumber)>,
}

impl DirectoryEntries {
    pub fn new() -> Self {
        DirectoryEntries::default()
    }

    pub fn get(&self, name: &str) -> Option<INumber> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, i)| *i)
    }

    /// Inserts or updates `name`. An update keeps the entry's original
    /// position, matching the insertion-order semantics of a Python dict.
    pub fn add_child(&mut self, name: &str, inumber: INumber) -> Result<(), KernelError> {
        if name.is_empty() {
            return Err(errno!(Enoent, "empty directory entry name"));
        }
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            slot.1 = inumber;
        } else {
            self.entries.push((name.to_string(), inumber));
        }
        Ok(())
    }

    pub fn remove_child(&mut self, name: &str) -> Result<INumber, KernelError> {
        let pos = self
            .entries
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| errno!(Enoent, "{}: no such directory entry", name))?;
        Ok(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, INumber)> {
        self.entries.iter().map(|(n, i)| (n.as_str(), *i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_lookup() {
        let mut dir = DirectoryEntries::new();
        dir.add_child(".", INumber(1)).unwrap();
        dir.add_child("etc", INumber(2)).unwrap();
        assert_eq!(dir.get("etc"), Some(INumber(2)));
        assert_eq!(dir.get("missing"), None);
    }

    #[test]
    fn empty_name_rejected() {
        let mut dir = DirectoryEntries::new();
        assert!(dir.add_child("", INumber(1)).is_err());
    }

    #[test]
    fn update_preserves_position() {
        let mut dir = DirectoryEntries::new();
        dir.add_child("a", INumber(1)).unwrap();
        dir.add_child("b", INumber(2)).unwrap();
        dir.add_child("a", INumber(3)).unwrap();
        let names: Vec<_> = dir.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(dir.get("a"), Some(INumber(3)));
    }

    #[test]
    fn remove_missing_is_enoent() {
        let mut dir = DirectoryEntries::new();
        assert!(dir.remove_child("nope").is_err());
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut dir = DirectoryEntries::new();
        for name in [".", "..", "bin", "dev", "etc"] {
            dir.add_child(name, INumber(1)).unwrap();
        }
        let names: Vec<_> = dir.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec![".", "..", "bin", "dev", "etc"]);
    }
}
