// Copyright (c) 2024-present Ember Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! The storage façade: uniform byte-blob lookup by logical name over a list
//! of mounted providers. Providers are tried in mount order; the first hit
//! wins. A miss yields an empty blob and a log entry, never an error.

use crate::core::log::Log;
use fxhash::FxHashMap;
use std::path::{Path, PathBuf};

/// One mounted source of byte blobs: a directory, an embedded table, or a
/// host-supplied archive reader.
pub trait StorageProvider: Send {
    /// Loads the blob under a logical (forward-slash) path.
    fn load(&self, path: &str) -> Option<Vec<u8>>;

    /// Cheap existence probe; the default resorts to loading.
    fn contains(&self, path: &str) -> bool {
        self.load(path).is_some()
    }

    /// Name shown in logs.
    fn name(&self) -> &str;
}

/// Serves blobs straight from a filesystem directory.
pub struct DirProvider {
    root: PathBuf,
    label: String,
}

impl DirProvider {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            label: format!("dir:{}", root.display()),
            root,
        }
    }
}

impl StorageProvider for DirProvider {
    fn load(&self, path: &str) -> Option<Vec<u8>> {
        // Reject attempts to escape the mount root.
        if path.split('/').any(|part| part == "..") {
            return None;
        }
        std::fs::read(self.root.join(path)).ok()
    }

    fn contains(&self, path: &str) -> bool {
        !path.split('/').any(|part| part == "..") && self.root.join(path).is_file()
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Serves blobs from an in-memory table; the embedded-data provider.
#[derive(Default)]
pub struct MemoryProvider {
    entries: FxHashMap<String, Vec<u8>>,
    label: String,
}

impl MemoryProvider {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            entries: Default::default(),
            label: label.into(),
        }
    }

    pub fn insert<S: Into<String>>(&mut self, path: S, data: Vec<u8>) {
        self.entries.insert(path.into(), data);
    }

    pub fn with<S: Into<String>>(mut self, path: S, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }
}

impl StorageProvider for MemoryProvider {
    fn load(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.get(path).cloned()
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// See module docs.
#[derive(Default)]
pub struct Storage {
    providers: Vec<Box<dyn StorageProvider>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a provider behind the ones already mounted.
    pub fn mount<P: StorageProvider + 'static>(&mut self, provider: P) {
        self.providers.push(Box::new(provider));
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// First-hit lookup across the mounts. A miss logs and returns an empty
    /// blob.
    pub fn load(&self, path: &str) -> Vec<u8> {
        for provider in &self.providers {
            if let Some(data) = provider.load(path) {
                return data;
            }
        }
        Log::err(format!("no storage provider has '{path}'"));
        Vec::new()
    }

    /// Like [`Self::load`] but without the empty-blob fallback.
    pub fn try_load(&self, path: &str) -> Option<Vec<u8>> {
        self.providers.iter().find_map(|p| p.load(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.providers.iter().any(|p| p.contains(path))
    }
}
