// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Turns classified platform items into [`DropAsset`]s.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use base64::Engine;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::{
    asset::DropAsset,
    cache::CacheDirectory,
    classify::ItemKind,
    item::PlatformDragItem,
    mime::{self, OCTET_STREAM},
    Error, Result,
};

mod encode;
pub mod video;

/// Bytes read from the head of a copied file when its extension is unknown.
const SNIFF_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Also attach a base64 copy of the stored bytes to every non-text asset.
    pub include_inline: bool,
}

/// Resolves one item at a time; clone it freely to resolve concurrently.
#[derive(Clone)]
pub struct AssetResolver {
    cache: Arc<dyn CacheDirectory>,
    options: ResolveOptions,
}

impl AssetResolver {
    pub fn new(cache: Arc<dyn CacheDirectory>, options: ResolveOptions) -> Self {
        Self { cache, options }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Soft-failing resolution: any error is logged and reported as `None`.
    pub async fn resolve(&self, item: &dyn PlatformDragItem, kind: ItemKind) -> Option<DropAsset> {
        match self.try_resolve(item, kind).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "failed to resolve dropped item");
                None
            }
        }
    }

    pub async fn try_resolve(
        &self,
        item: &dyn PlatformDragItem,
        kind: ItemKind,
    ) -> Result<DropAsset> {
        match kind {
            ItemKind::Image => match self.resolve_image(item).await {
                // providers that only expose a file behind an image type
                Err(Error::RepresentationUnavailable(_)) => self.resolve_file(item, false).await,
                other => other,
            },
            ItemKind::Video => self.resolve_file(item, true).await,
            ItemKind::Text => resolve_text(item).await,
            ItemKind::File | ItemKind::Unknown => self.resolve_file(item, false).await,
        }
    }

    /// A fresh cache path. Creating the cache directory may block.
    async fn cache_path(&self, extension: &str) -> Result<PathBuf> {
        let cache = self.cache.clone();
        let extension = extension.to_string();
        tokio::task::spawn_blocking(move || cache.unique_path(&extension)).await?
    }

    async fn resolve_image(&self, item: &dyn PlatformDragItem) -> Result<DropAsset> {
        let image = item.load_image().await?;
        let encoded = tokio::task::spawn_blocking(move || encode::encode(image)).await??;

        let extension = mime::extension_for_mime(encoded.mime).unwrap_or_default();
        let path = self.cache_path(extension).await?;
        if let Err(e) = tokio::fs::write(&path, &encoded.bytes).await {
            discard(&path).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), mime = encoded.mime, "stored dropped image");

        let base64 = self
            .options
            .include_inline
            .then(|| base64::engine::general_purpose::STANDARD.encode(&encoded.bytes));

        Ok(DropAsset::stored(encoded.mime, file_uri(&path), path_string(&path))
            .with_file_name(file_name(&path))
            .with_dimensions(encoded.width, encoded.height)
            .with_base64(base64))
    }

    async fn resolve_file(&self, item: &dyn PlatformDragItem, is_video: bool) -> Result<DropAsset> {
        let source = item.load_file().await?;
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();

        // the provider's file may vanish once the callback returns
        let target = self.cache_path(&extension).await?;
        match self
            .store_file(item, &source, &target, &extension, is_video)
            .await
        {
            Ok(asset) => Ok(asset),
            Err(e) => {
                discard(&target).await;
                Err(e)
            }
        }
    }

    async fn store_file(
        &self,
        item: &dyn PlatformDragItem,
        source: &Path,
        target: &Path,
        extension: &str,
        is_video: bool,
    ) -> Result<DropAsset> {
        tokio::fs::copy(source, target).await?;

        let mime_type = match mime::mime_for_extension(extension) {
            Some(mime) => mime.to_string(),
            None => match sniff_file(target).await? {
                Some(mime) => mime.to_string(),
                None => item.mime_hint().unwrap_or_else(|| OCTET_STREAM.to_string()),
            },
        };
        debug!(path = %target.display(), mime = %mime_type, "stored dropped file");

        let file_name = item.suggested_name().or_else(|| file_name(source));
        let mut asset =
            DropAsset::stored(mime_type.clone(), file_uri(target), path_string(target))
                .with_file_name(file_name);

        if is_video {
            let header_path = target.to_path_buf();
            match tokio::task::spawn_blocking(move || video::inspect(&header_path)).await? {
                Ok(metadata) => {
                    asset = asset
                        .with_dimensions(metadata.width, metadata.height)
                        .with_duration(metadata.duration);
                }
                Err(e) => {
                    warn!(path = %target.display(), error = %e, "failed to read video metadata");
                    asset = asset.with_dimensions(0, 0);
                }
            }
        } else if mime_type.starts_with("image/") {
            let header_path = target.to_path_buf();
            if let Ok((width, height)) =
                tokio::task::spawn_blocking(move || image::image_dimensions(header_path)).await?
            {
                asset = asset.with_dimensions(width, height);
            }
        }

        if self.options.include_inline {
            let bytes = tokio::fs::read(target).await?;
            asset = asset.with_base64(Some(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ));
        }

        Ok(asset)
    }
}

/// Removes a cache file left behind by a failed resolution.
async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "discarded partial cache file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to discard cache file"),
    }
}

async fn resolve_text(item: &dyn PlatformDragItem) -> Result<DropAsset> {
    let text = item.load_text().await?;
    if text.trim().is_empty() {
        return Err(Error::EmptyText);
    }
    Ok(DropAsset::text(text))
}

async fn sniff_file(path: &Path) -> Result<Option<&'static str>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(mime::sniff(&head))
}

fn file_uri(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
