// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Register a screen region as a drop target and a drag source for images,
//! videos, text and generic files, with one asset model on every platform.
//!
//! A host embeds a [`DropRegion`] per region and forwards the native drag/drop
//! callbacks into it, either directly or through the [`DropDelegate`] trait.
//! Dropped items are exposed to the crate through the [`PlatformDragItem`]
//! capability trait; the region classifies them, filters them against the
//! configured MIME rules and resolves every accepted item concurrently into a
//! [`DropAsset`]. A single `onDrop` notification carries the assets once every
//! resolution has finished.
//!
//! - Add the `dropzone` dependency:
//!
//! `$ cargo add dropzone`
//!
//! - Create a region and feed it platform events:
//!
//!   ```rust,no_run
//!   use std::sync::Arc;
//!   use dropzone::{DropRegion, DropZoneConfig, DropZoneEvent, FileItem, PlatformDragItem};
//!
//!   # async fn run() -> dropzone::Result<()> {
//!   let config = DropZoneConfig::from_json(r#"{
//!     "includeBase64": true,
//!     "allowedMimeTypes": ["__REGEX__^image/__FLAGS__i", "application/pdf"]
//!   }"#)?;
//!
//!   let region = DropRegion::new(
//!     config,
//!     Arc::new(|name: &str, event: &DropZoneEvent| println!("{name}: {event:?}")),
//!   )?;
//!
//!   region.drag_entered();
//!   let items: Vec<Box<dyn PlatformDragItem>> =
//!     vec![Box::new(FileItem::new("/tmp/photo.png"))];
//!   let assets = region.drop_items(items).await;
//!   println!("dropped {} assets", assets.len());
//!   # Ok(())
//!   # }
//!   ```

use std::path::PathBuf;

pub mod asset;
pub mod cache;
pub mod classify;
pub mod config;
pub mod delegate;
pub mod event;
pub mod item;
pub mod mime;
pub mod resolver;
pub mod session;
pub mod source;

pub use asset::DropAsset;
pub use cache::{CacheDirectory, TransientCache};
pub use classify::{classify, Category, ItemKind};
pub use config::DropZoneConfig;
pub use delegate::DropDelegate;
pub use event::{DropZoneEvent, Emitter, EventSink};
pub use item::{FileItem, ImageItem, Orientation, PlatformDragItem, PlatformImage, TextItem};
pub use mime::{is_allowed, MimeFilter, MimeRule};
pub use resolver::{AssetResolver, ResolveOptions};
pub use session::{DragSession, DropRegion, DropState, RegionOptions};
pub use source::{
    DataProvider, DragPayload, DragPreview, DragRepresentation, DragSourceBuilder,
    DraggableSource, LocalDragSession, SourceType,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
    #[error("item has no {0} representation")]
    RepresentationUnavailable(&'static str),
    #[error("provider declined to load the item: {0}")]
    ProviderDeclined(String),
    #[error("text payload is empty")]
    EmptyText,
    #[error("drag image not found")]
    ImageNotFound,
    #[error("invalid draggable source: {0}")]
    InvalidSource(String),
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),
    #[error("drop region was torn down")]
    TornDown,
}

/// Outcome of an outgoing drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DragResult {
    Dropped,
    Cancel,
}

/// Logical position of the pointer, in the same coordinate space as the
/// region [`Bounds`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CursorPosition {
    pub x: i32,
    pub y: i32,
}

impl CursorPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Full bounds of a tracked region, children included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Edges are inclusive: a pointer sitting on the border is still inside.
    pub fn contains(&self, point: CursorPosition) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x <= self.x + self.width
            && point.y <= self.y + self.height
    }
}

/// An image definition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Image {
    /// A path to a image.
    File(PathBuf),
    /// Raw bytes of the image.
    Raw(Vec<u8>),
}

impl Image {
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match self {
            Image::Raw(bytes) => Ok(bytes.clone()),
            Image::File(path) => {
                if !path.exists() {
                    return Err(Error::ImageNotFound);
                }
                Ok(std::fs::read(path)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_contain_their_edges() {
        let bounds = Bounds::new(10, 10, 100, 50);
        assert!(bounds.contains(CursorPosition::new(10, 10)));
        assert!(bounds.contains(CursorPosition::new(110, 60)));
        assert!(bounds.contains(CursorPosition::new(50, 30)));
        assert!(!bounds.contains(CursorPosition::new(9, 30)));
        assert!(!bounds.contains(CursorPosition::new(50, 61)));
    }

    #[test]
    fn missing_image_file_is_reported() {
        let image = Image::File("/definitely/not/here.png".into());
        assert!(matches!(image.bytes(), Err(Error::ImageNotFound)));
    }
}
