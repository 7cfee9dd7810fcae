//! In-memory record of directories that exist without any key beneath them.
//!
//! The store has no notion of a directory, so a freshly created one has
//! nothing to show for itself until a key is written under it. The registry
//! keeps such directories visible for the lifetime of the filesystem
//! instance. Entries that later gain real keys are redundant but harmless:
//! both sources agree the node is a directory.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;

use crate::path::FsPath;

/// Parent path to the set of registered child directory names.
///
/// One lock guards the whole map; every operation is a short critical
/// section with no store I/O inside it.
#[derive(Debug, Default)]
pub struct EmptyDirRegistry {
    dirs: Mutex<HashMap<FsPath, HashSet<String>>>,
}

impl EmptyDirRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` as a directory. Idempotent; the root is ignored.
    pub fn mark(&self, path: &FsPath) {
        let Some((parent, name)) = path.split() else {
            return;
        };
        self.dirs
            .lock()
            .entry(parent)
            .or_default()
            .insert(name.to_string());
    }

    /// Remove `path` from the registry.
    ///
    /// Returns `true` if an entry was actually removed. Unmarking an
    /// unregistered path is not an error.
    pub fn unmark(&self, path: &FsPath) -> bool {
        let Some((parent, name)) = path.split() else {
            return false;
        };
        let mut dirs = self.dirs.lock();
        let Some(children) = dirs.get_mut(&parent) else {
            return false;
        };
        let removed = children.remove(name);
        if children.is_empty() {
            dirs.remove(&parent);
        }
        removed
    }

    pub fn is_marked(&self, parent: &FsPath, name: &str) -> bool {
        self.dirs
            .lock()
            .get(parent)
            .is_some_and(|children| children.contains(name))
    }

    /// Whether `path` itself is registered.
    pub fn contains(&self, path: &FsPath) -> bool {
        match path.split() {
            Some((parent, name)) => self.is_marked(&parent, name),
            None => false,
        }
    }

    /// Directory names directly under `parent` that the registry keeps
    /// alive, sorted: registered children, plus the first segment toward any
    /// deeper registered directory. The latter covers an intermediate
    /// directory whose last key was removed after something was registered
    /// below it.
    pub fn children(&self, parent: &FsPath) -> Vec<String> {
        let depth = parent.depth();
        let mut names = BTreeSet::new();
        for (registered, children) in self.dirs.lock().iter() {
            if children.is_empty() || !registered.starts_with(parent) {
                continue;
            }
            if registered == parent {
                names.extend(children.iter().cloned());
            } else if let Some(first) = registered.components().nth(depth) {
                names.insert(first.to_string());
            }
        }
        names.into_iter().collect()
    }

    /// Whether `path` has any registered descendant directory.
    pub fn has_descendants(&self, path: &FsPath) -> bool {
        self.dirs
            .lock()
            .iter()
            .any(|(parent, children)| parent.starts_with(path) && !children.is_empty())
    }

    /// Drop `path` and every registered directory beneath it.
    ///
    /// Returns the number of entries removed.
    pub fn remove_subtree(&self, path: &FsPath) -> usize {
        let mut dirs = self.dirs.lock();
        let mut removed = 0;
        dirs.retain(|parent, children| {
            if parent.starts_with(path) {
                removed += children.len();
                false
            } else {
                true
            }
        });
        if let Some((parent, name)) = path.split()
            && let Some(children) = dirs.get_mut(&parent)
        {
            if children.remove(name) {
                removed += 1;
            }
            if children.is_empty() {
                dirs.remove(&parent);
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.dirs.lock().values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_idempotent() {
        let registry = EmptyDirRegistry::new();
        let path = FsPath::new("a/b");
        registry.mark(&path);
        registry.mark(&path);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_marked(&FsPath::new("a"), "b"));
        assert!(registry.contains(&path));
    }

    #[test]
    fn test_unmark_reports_removal() {
        let registry = EmptyDirRegistry::new();
        let path = FsPath::new("x");
        assert!(!registry.unmark(&path));
        registry.mark(&path);
        assert!(registry.unmark(&path));
        assert!(!registry.unmark(&path));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_root_is_never_registered() {
        let registry = EmptyDirRegistry::new();
        registry.mark(&FsPath::root());
        assert!(registry.is_empty());
        assert!(!registry.unmark(&FsPath::root()));
        assert!(!registry.contains(&FsPath::root()));
    }

    #[test]
    fn test_children_sorted() {
        let registry = EmptyDirRegistry::new();
        registry.mark(&FsPath::new("p/y"));
        registry.mark(&FsPath::new("p/x"));
        registry.mark(&FsPath::new("q"));
        assert_eq!(registry.children(&FsPath::new("p")), vec!["x", "y"]);
        assert_eq!(registry.children(&FsPath::root()), vec!["p", "q"]);
        assert!(registry.children(&FsPath::new("none")).is_empty());
    }

    #[test]
    fn test_children_include_path_to_deeper_entries() {
        let registry = EmptyDirRegistry::new();
        registry.mark(&FsPath::new("a/b/c"));
        assert_eq!(registry.children(&FsPath::root()), vec!["a"]);
        assert_eq!(registry.children(&FsPath::new("a")), vec!["b"]);
        assert_eq!(registry.children(&FsPath::new("a/b")), vec!["c"]);
        assert!(registry.children(&FsPath::new("a/b/c")).is_empty());
        assert!(registry.children(&FsPath::new("ab")).is_empty());
    }

    #[test]
    fn test_remove_subtree() {
        let registry = EmptyDirRegistry::new();
        registry.mark(&FsPath::new("a"));
        registry.mark(&FsPath::new("a/b"));
        registry.mark(&FsPath::new("a/b/c"));
        registry.mark(&FsPath::new("ab"));
        assert!(registry.has_descendants(&FsPath::new("a")));

        assert_eq!(registry.remove_subtree(&FsPath::new("a")), 3);
        assert!(registry.contains(&FsPath::new("ab")));
        assert!(!registry.contains(&FsPath::new("a")));
        assert!(!registry.has_descendants(&FsPath::new("a")));
    }
}
