//! A pooled, version-stamped file descriptor.

use std::fs::File;

/// A reusable file handle tracked by an [`crate::OpenFilePool`].
///
/// `version` is stamped by the cache at the moment the file is first
/// pooled for a given path and never changes; it exists purely so a
/// handle opened against a since-replaced inode can be told apart from
/// one opened against the pool's current inode (see
/// [`crate::OpenFilePool::put`]).
#[derive(Debug)]
pub struct OpenFile {
    file: File,
    version: u64,
}

impl OpenFile {
    pub fn new(file: File, version: u64) -> Self {
        OpenFile { file, version }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn into_file(self) -> File {
        self.file
    }
}
