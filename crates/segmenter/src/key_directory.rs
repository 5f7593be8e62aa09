use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

use bytes::Bytes;

use crate::key_info::KeyInfo;

/// The set of routing keys this engine currently knows about, each bound to
/// the single [`KeyInfo`] shared by every piece of state that refers to it.
#[derive(Debug, Default)]
pub struct KeyDirectory {
    entries: HashMap<Bytes, Rc<RefCell<KeyInfo>>>,
}

impl KeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Bytes) -> Option<Rc<RefCell<KeyInfo>>> {
        self.entries.get(key).cloned()
    }

    /// Returns the existing KeyInfo for `key` if one is already tracked.
    /// Otherwise constructs a fresh KeyInfo and calls `initiate` with it
    /// before the new entry is visible to anyone else; `initiate` is
    /// expected to kick off a manifest lookup and report whether it could
    /// be started. The KeyInfo is inserted into the directory only if
    /// `initiate` returns `true` — on `false` the fresh KeyInfo is simply
    /// dropped and this returns `None`, leaving the caller to treat the key
    /// as unresolved for now.
    pub fn find_or_create<I>(&mut self, key: &Bytes, initiate: I) -> Option<Rc<RefCell<KeyInfo>>>
    where
        I: FnOnce(&Rc<RefCell<KeyInfo>>) -> bool,
    {
        if let Some(existing) = self.entries.get(key) {
            return Some(existing.clone());
        }
        let key_info = Rc::new(RefCell::new(KeyInfo::new(key.clone())));
        if initiate(&key_info) {
            self.entries.insert(key.clone(), key_info.clone());
            Some(key_info)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<RefCell<KeyInfo>>> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_create_inserts_only_on_successful_initiation() {
        let mut directory = KeyDirectory::new();
        let key = Bytes::from_static(b"key");
        let result = directory.find_or_create(&key, |_| false);
        assert!(result.is_none());
        assert!(directory.is_empty());

        let result = directory.find_or_create(&key, |_| true);
        assert!(result.is_some());
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn find_or_create_returns_existing_entry_without_reinitiating() {
        let mut directory = KeyDirectory::new();
        let key = Bytes::from_static(b"key");
        directory.find_or_create(&key, |_| true);

        let mut initiate_calls = 0;
        let result = directory.find_or_create(&key, |_| {
            initiate_calls += 1;
            true
        });
        assert!(result.is_some());
        assert_eq!(initiate_calls, 0);
        assert_eq!(directory.len(), 1);
    }
}
