use arcstr::ArcStr;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Shared pool of block kind names and property keys/values, which repeat heavily.
#[derive(Default)]
struct Interner {
    data: RwLock<HashSet<ArcStr>>,
}

impl Interner {
    fn get(&self, key: &str) -> ArcStr {
        // Fast path: most strings are already interned, so only take the read lock
        if let Some(k) = self.data.read().get(key) {
            return k.clone();
        }
        // Another writer may have won the race between dropping the read lock and taking the
        // write lock, so check again
        let mut lock = self.data.write();
        if let Some(k) = lock.get(key) {
            k.clone()
        } else {
            let k = ArcStr::from(key);
            lock.insert(k.clone());
            k
        }
    }
}

static INTERNER: OnceLock<Interner> = OnceLock::new();

pub fn intern_str<S: AsRef<str>>(s: S) -> ArcStr {
    INTERNER.get_or_init(Default::default).get(s.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_str_shares_allocation() {
        let a = intern_str("minecraft:chest");
        let b = intern_str(String::from("minecraft:chest"));
        assert!(ArcStr::ptr_eq(&a, &b));
        assert!(!ArcStr::ptr_eq(&a, &intern_str("minecraft:barrel")));
    }
}
