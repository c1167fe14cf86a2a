use std::cmp::Ordering;

use arcstr::ArcStr;

use crate::util::intern_str;

/// An ordered string map of block state properties.
///
/// Keys and values are interned, so cloning a `PropList` never copies string data and two
/// lists compare equal exactly when they hold the same assignments.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct PropList {
    items: Vec<(ArcStr, ArcStr)>,
}

impl PropList {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_item_index(key)
            .ok()
            .map(|i| self.items[i].1.as_str())
    }

    pub fn insert(&mut self, key: &str, value: &str) -> &mut Self {
        match self.get_item_index(key) {
            Ok(i) => {
                if self.items[i].1.as_str() != value {
                    self.items[i].1 = intern_str(value);
                }
            }
            Err(i) => self.items.insert(i, (intern_str(key), intern_str(value))),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    fn get_item_index(&self, key: &str) -> Result<usize, usize> {
        self.items.binary_search_by(|(k, _)| k.as_str().cmp(key))
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for PropList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(into_iter: I) -> Self {
        let iter = into_iter.into_iter();
        let (lower, upper) = iter.size_hint();
        let mut new = Self::with_capacity(upper.unwrap_or(lower));
        for (key, value) in iter {
            new.insert(key.as_ref(), value.as_ref());
        }
        new
    }
}

impl Ord for PropList {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl PartialOrd for PropList {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Debug for PropList {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl std::fmt::Display for PropList {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.items.is_empty() {
            return f.write_str("<empty>");
        }
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}
