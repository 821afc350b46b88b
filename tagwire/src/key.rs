//! Keys name the entries of keyed containers, a `CodingPath` is the chain of keys leading from the
//! root of a message to the value currently being encoded or decoded.

use std::fmt::{self, Display, Formatter};

/// The key of a keyed container entry.
///
/// The derived ordering puts integer keys before string keys, integers compare numerically and
/// strings lexically. This is the order used when an `Encoder` sorts keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(u64),
    Str(String),
}

impl Key {

    /// The key used for the element at `index` of an unkeyed container.
    pub fn index(index: usize) -> Self {
        Key::Int(index as u64)
    }

    pub fn as_int(&self) -> Option<u64> {
        match *self {
            Key::Int(i) => Some(i),
            Key::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Int(_) => None,
            Key::Str(s) => Some(s),
        }
    }

}

impl From<u64> for Key {
    fn from(i: u64) -> Key {
        Key::Int(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Key {
        Key::Str(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Key {
        Key::Str(s)
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Key {
        k.clone()
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Location of a value inside a nested structure. Only used to attribute errors, a path is
/// rebuilt for every call and never stored in the encoded data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodingPath(Vec<Key>);

impl CodingPath {

    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path one level deeper.
    pub fn child(&self, key: Key) -> Self {
        let mut keys = Vec::with_capacity(self.0.len() + 1);
        keys.extend_from_slice(&self.0);
        keys.push(key);
        Self(keys)
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Key> {
        self.0.last()
    }

}

impl From<Vec<Key>> for CodingPath {
    fn from(keys: Vec<Key>) -> Self {
        Self(keys)
    }
}

impl Display for CodingPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for key in self.0.iter() {
            match key {
                Key::Int(i) => write!(f, "[{}]", i)?,
                Key::Str(s) => write!(f, ".{}", s)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CodingPath, Key};

    #[test]
    fn ordering() {
        let mut keys = vec![Key::from("b"), Key::from(10), Key::from("a"), Key::from(2)];
        keys.sort();
        assert_eq!(keys, [Key::from(2), Key::from(10), Key::from("a"), Key::from("b")]);
    }

    #[test]
    fn display_path() {
        let path = CodingPath::root().child(Key::from("cats")).child(Key::index(3)).child(Key::from("name"));
        assert_eq!("$.cats[3].name", path.to_string());
        assert_eq!("$", CodingPath::root().to_string());
    }

    #[test]
    fn child_leaves_parent_untouched() {
        let parent = CodingPath::root().child(Key::from("outer"));
        let child = parent.child(Key::from("inner"));
        assert_eq!(parent.keys(), &[Key::from("outer")]);
        assert_eq!(child.keys(), &[Key::from("outer"), Key::from("inner")]);
    }

}
