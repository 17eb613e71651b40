// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::Result;

const DEFAULT_DIRECTORY: &str = "DropZone";

/// Hands out writable paths for resolved asset bytes.
pub trait CacheDirectory: Send + Sync {
    /// Returns a path no other resolution will ever write to. `extension` is
    /// given without the leading dot; an empty extension yields a bare name.
    /// May touch the filesystem, so async callers run it on the blocking pool.
    fn unique_path(&self, extension: &str) -> Result<PathBuf>;
}

/// Application private, non durable cache directory. Files are named with a
/// random v4 UUID so concurrent resolutions never collide.
#[derive(Debug, Clone)]
pub struct TransientCache {
    root: PathBuf,
}

impl TransientCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for TransientCache {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_DIRECTORY))
    }
}

impl CacheDirectory for TransientCache {
    fn unique_path(&self, extension: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let mut name = Uuid::new_v4().to_string();
        let extension = extension.trim_start_matches('.');
        if !extension.is_empty() {
            name.push('.');
            name.push_str(extension);
        }
        Ok(self.root.join(name))
    }
}
