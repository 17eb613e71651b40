// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::{classify::Category, mime, Error, Result};

/// One dropped item as exposed by the host platform.
///
/// Adapters implement this for their native item type (an `NSItemProvider`, a
/// `ClipData.Item`, a `DataTransferItem`, a dropped path...). Only the loaders
/// for representations the item actually has need to be provided; the defaults
/// report the representation as unavailable.
#[async_trait::async_trait]
pub trait PlatformDragItem: Send + Sync {
    /// Declared type categories, or `None` when the platform has no precise
    /// type metadata for this item.
    fn categories(&self) -> Option<Vec<Category>>;

    /// File name suggested by the source, if any.
    fn suggested_name(&self) -> Option<String> {
        None
    }

    /// MIME type known without loading any data.
    fn mime_hint(&self) -> Option<String> {
        None
    }

    async fn load_image(&self) -> Result<PlatformImage> {
        Err(Error::RepresentationUnavailable("image"))
    }

    /// A readable file holding the item's bytes. The file is only guaranteed to
    /// exist until the returned future's caller is done copying it.
    async fn load_file(&self) -> Result<PathBuf> {
        Err(Error::RepresentationUnavailable("file"))
    }

    async fn load_text(&self) -> Result<String> {
        Err(Error::RepresentationUnavailable("text"))
    }
}

/// Display orientation of a decoded image, named after the edge that is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl Orientation {
    /// Maps the EXIF `Orientation` tag value. Out of range values mean [`Orientation::Up`].
    pub fn from_exif(value: u16) -> Self {
        match value {
            2 => Orientation::UpMirrored,
            3 => Orientation::Down,
            4 => Orientation::DownMirrored,
            5 => Orientation::LeftMirrored,
            6 => Orientation::Right,
            7 => Orientation::RightMirrored,
            8 => Orientation::Left,
            _ => Orientation::Up,
        }
    }

    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Up => image,
            Orientation::UpMirrored => image.fliph(),
            Orientation::Down => image.rotate180(),
            Orientation::DownMirrored => image.flipv(),
            Orientation::LeftMirrored => image.rotate90().fliph(),
            Orientation::Right => image.rotate90(),
            Orientation::RightMirrored => image.rotate270().fliph(),
            Orientation::Left => image.rotate270(),
        }
    }
}

/// A decoded platform image object.
#[derive(Debug, Clone)]
pub struct PlatformImage {
    pub image: DynamicImage,
    pub orientation: Orientation,
}

impl PlatformImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            orientation: Orientation::Up,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    /// Pixels as they are meant to be displayed.
    pub fn into_oriented(self) -> DynamicImage {
        self.orientation.apply(self.image)
    }
}

/// A dropped file that already lives on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileItem {
    path: PathBuf,
    typed: bool,
}

impl FileItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            typed: true,
        }
    }

    /// A file whose platform reports no type metadata; only its name is known.
    pub fn untyped(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            typed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

#[async_trait::async_trait]
impl PlatformDragItem for FileItem {
    fn categories(&self) -> Option<Vec<Category>> {
        if !self.typed {
            return None;
        }
        Some(match self.mime_hint() {
            Some(mime) => Category::from_mime(&mime),
            None => vec![Category::Item],
        })
    }

    fn suggested_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn mime_hint(&self) -> Option<String> {
        if !self.typed {
            return None;
        }
        self.extension()
            .and_then(mime::mime_for_extension)
            .map(str::to_string)
    }

    async fn load_image(&self) -> Result<PlatformImage> {
        let path = self.path.clone();
        let image = tokio::task::spawn_blocking(move || image::open(path)).await??;
        Ok(PlatformImage::new(image))
    }

    async fn load_file(&self) -> Result<PathBuf> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        if !metadata.is_file() {
            return Err(Error::ProviderDeclined(format!(
                "{} is not a regular file",
                self.path.display()
            )));
        }
        Ok(self.path.clone())
    }

    async fn load_text(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

/// A plain-text payload.
#[derive(Debug, Clone)]
pub struct TextItem(String);

impl TextItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

#[async_trait::async_trait]
impl PlatformDragItem for TextItem {
    fn categories(&self) -> Option<Vec<Category>> {
        Some(vec![Category::PlainText])
    }

    fn mime_hint(&self) -> Option<String> {
        Some("text/plain".into())
    }

    async fn load_text(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// An already decoded image object, e.g. one handed over by a photo picker.
#[derive(Debug, Clone)]
pub struct ImageItem {
    image: PlatformImage,
    name: Option<String>,
}

impl ImageItem {
    pub fn new(image: PlatformImage) -> Self {
        Self { image, name: None }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[async_trait::async_trait]
impl PlatformDragItem for ImageItem {
    fn categories(&self) -> Option<Vec<Category>> {
        Some(vec![Category::Image, Category::Item])
    }

    fn suggested_name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn load_image(&self) -> Result<PlatformImage> {
        Ok(self.image.clone())
    }
}
