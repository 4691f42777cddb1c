// src/attributes.rs
//
// File attribute bitmask. Remote objects carry it as a decimal string in
// metadata; local files map the read-only bit onto OS permissions.

use serde::Serialize;
use std::fmt;
use std::fs::Metadata;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct FileAttributes: u32 {
        const READ_ONLY = 0x0001;
        const HIDDEN = 0x0002;
        const SYSTEM = 0x0004;
        const DIRECTORY = 0x0010;
        const ARCHIVE = 0x0020;
        const NORMAL = 0x0080;
        const TEMPORARY = 0x0100;
    }
}

impl Default for FileAttributes {
    fn default() -> Self {
        FileAttributes::empty()
    }
}

impl FileAttributes {
    /// Decode the metadata representation. Garbage decodes to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<u32>().ok().map(FileAttributes::from_bits_retain)
    }

    /// Metadata representation.
    pub fn encode(self) -> String {
        self.bits().to_string()
    }

    /// Attributes of a local file or directory. Only read-only, directory and
    /// hidden (dot-file) can be derived from the OS.
    pub fn from_local(meta: &Metadata, file_name: Option<&str>) -> Self {
        let mut attrs = FileAttributes::empty();
        if meta.permissions().readonly() {
            attrs |= FileAttributes::READ_ONLY;
        }
        if meta.is_dir() {
            attrs |= FileAttributes::DIRECTORY;
        }
        if file_name.is_some_and(|n| n.starts_with('.')) {
            attrs |= FileAttributes::HIDDEN;
        }
        attrs.or_normal()
    }

    /// `NORMAL` stands in for "no attributes set", as on the local filesystem.
    pub fn or_normal(self) -> Self {
        if self.is_empty() { FileAttributes::NORMAL } else { self }
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(FileAttributes, &str)] = &[
            (FileAttributes::READ_ONLY, "ReadOnly"),
            (FileAttributes::HIDDEN, "Hidden"),
            (FileAttributes::SYSTEM, "System"),
            (FileAttributes::DIRECTORY, "Directory"),
            (FileAttributes::ARCHIVE, "Archive"),
            (FileAttributes::NORMAL, "Normal"),
            (FileAttributes::TEMPORARY, "Temporary"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "0x{:x}", self.bits())
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_parse_and_flags() {
        let attrs = FileAttributes::READ_ONLY | FileAttributes::HIDDEN;
        assert_eq!(attrs.encode(), "3");
        assert_eq!(FileAttributes::parse(" 3 "), Some(attrs));
        assert!(attrs.contains(FileAttributes::READ_ONLY));
        assert!(!attrs.contains(FileAttributes::ARCHIVE));
        assert_eq!(FileAttributes::parse("not-a-number"), None);
    }

    #[test]
    fn empty_displays_as_normal() {
        assert_eq!(FileAttributes::empty().or_normal(), FileAttributes::NORMAL);
        assert_eq!(format!("{}", FileAttributes::READ_ONLY | FileAttributes::ARCHIVE), "ReadOnly, Archive");
    }

    #[test]
    fn local_file_attributes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(".hidden");
        std::fs::write(&path, b"x").unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(FileAttributes::from_local(&meta, Some(".hidden")), FileAttributes::HIDDEN);

        let dir = std::fs::metadata(tmp.path()).unwrap();
        assert!(FileAttributes::from_local(&dir, None).contains(FileAttributes::DIRECTORY));
    }

    #[test]
    fn insert_remove() {
        let mut attrs = FileAttributes::ARCHIVE;
        attrs.insert(FileAttributes::READ_ONLY);
        attrs.remove(FileAttributes::ARCHIVE);
        assert_eq!(attrs, FileAttributes::READ_ONLY);
    }

    #[test]
    fn unknown_bits_survive_round_trip() {
        let attrs = FileAttributes::parse("4097").unwrap();
        assert_eq!(attrs.encode(), "4097");
        assert!(attrs.contains(FileAttributes::READ_ONLY));
        assert_eq!(format!("{}", attrs), "ReadOnly");
    }
}
