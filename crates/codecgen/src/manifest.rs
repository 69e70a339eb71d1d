//! The known-types manifest persisted next to generated code.
//!
//! Plain text, one type key per line, sorted. It lets a later pass (or another
//! module) know which codecs already exist without re-reading declarations.

use crate::error::{Error, Result};
use crate::output::files::write_atomic;
use crate::types::TypeKey;
use std::collections::BTreeSet;
use std::path::Path;

/// Default manifest file name inside the output directory.
pub const DEFAULT_FILE: &str = "codecgen.types";

/// A sorted, duplicate-free set of type keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    keys: BTreeSet<TypeKey>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest text. Blank lines and `#` comments are ignored.
    pub fn parse(text: &str) -> Self {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(TypeKey::new)
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for key in &self.keys {
            out.push_str(key.as_str());
            out.push('\n');
        }
        out
    }

    /// Read a manifest; a missing file is not an error.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::parse(&text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.render())
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.keys.contains(key)
    }

    pub fn insert(&mut self, key: TypeKey) -> bool {
        self.keys.insert(key)
    }

    pub fn union(&mut self, other: &Manifest) {
        self.keys.extend(other.keys.iter().cloned());
    }

    pub fn retain(&mut self, f: impl FnMut(&TypeKey) -> bool) {
        self.keys.retain(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<TypeKey> for Manifest {
    fn from_iter<I: IntoIterator<Item = TypeKey>>(iter: I) -> Self {
        Manifest {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sorts_and_dedups() {
        let manifest = Manifest::parse("b.Video\n# comment\n\na.User\nb.Video\nData<a.User>\n");
        insta::assert_snapshot!(manifest.render(), @r"
        Data<a.User>
        a.User
        b.Video
        ");
    }

    #[test]
    fn test_parse_normalizes_key_spacing() {
        let manifest = Manifest::parse("Map<String,a.User>");
        assert!(manifest.contains(&TypeKey::new("Map<String, a.User>")));
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Manifest::read(&dir.path().join("absent.types")).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);
        let manifest: Manifest = ["a.B", "a.A"].into_iter().map(TypeKey::new).collect();
        manifest.write(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a.A\na.B\n");
        assert_eq!(Manifest::read(&path).unwrap(), Some(manifest));
    }
}
