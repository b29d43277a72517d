use std::path::{Path, PathBuf};

/// Logical layout of a collection directory.
///
/// Derived from the collection root only. It does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct CollectionLayout {
    /// Directory samples are materialized into.
    pub root: PathBuf,
    /// Default location of the classification database.
    pub db_path: PathBuf,
}

impl CollectionLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let db_path = root.join("triage.db");
        Self { root, db_path }
    }

    /// Path of one debugger script shard: `<root>/<stem>.<shard>`.
    pub fn script_path(&self, stem: &str, shard: usize) -> PathBuf {
        self.root.join(format!("{stem}.{shard}"))
    }

    /// Path of the unsharded script written in generate-only mode.
    pub fn single_script_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of a manifest (sample list) inside the collection.
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}
