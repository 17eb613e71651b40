// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Outgoing drags: turning configured sources into a platform drag payload.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use base64::Engine;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    cache::{CacheDirectory, TransientCache},
    classify::Category,
    item::{FileItem, PlatformDragItem, PlatformImage, TextItem},
    mime::{self, OCTET_STREAM},
    CursorPosition, Error, Image, Result,
};

pub const DEFAULT_PREVIEW_SIZE: u32 = 200;

/// Edge of the square preview used when no source is an image.
const PLACEHOLDER_SIZE: u32 = 96;
const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([128, 128, 128, 160]);

/// Serves the bytes of a drag representation by MIME type.
pub type DataProvider = Box<dyn Fn(&str) -> Option<Vec<u8>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SourceType {
    Image,
    Video,
    Text,
    File,
}

/// Something the region offers to drag out.
///
/// `value` is literal text for [`SourceType::Text`] and a location otherwise:
/// a filesystem path, a `file://` URI, or a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DraggableSource {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: SourceType,
    pub value: String,
}

impl DraggableSource {
    pub fn new(kind: SourceType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A source loaded into something the platform can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragRepresentation {
    Image { bytes: Vec<u8>, mime: String },
    File { path: PathBuf, mime: String },
    Text(String),
}

impl DragRepresentation {
    pub fn mime(&self) -> &str {
        match self {
            DragRepresentation::Image { mime, .. } | DragRepresentation::File { mime, .. } => mime,
            DragRepresentation::Text(_) => "text/plain",
        }
    }

    fn bytes(&self) -> Option<Vec<u8>> {
        match self {
            DragRepresentation::Image { bytes, .. } => Some(bytes.clone()),
            DragRepresentation::File { path, .. } => std::fs::read(path).ok(),
            DragRepresentation::Text(text) => Some(text.clone().into_bytes()),
        }
    }
}

/// The visual that follows the pointer during a drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPreview {
    /// PNG encoded.
    pub image: Image,
    pub width: u32,
    pub height: u32,
    /// Top left corner, chosen so the preview is centred on the pointer.
    pub origin: CursorPosition,
}

/// The items of one outgoing drag, kept for the drop handler of the same
/// drag session on platforms without a native payload channel.
#[derive(Debug)]
pub struct LocalDragSession {
    id: Uuid,
    items: Vec<DragRepresentation>,
}

impl LocalDragSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn items(&self) -> &[DragRepresentation] {
        &self.items
    }

    /// Exposes the carried representations as droppable items.
    pub fn drop_items(&self) -> Vec<Box<dyn PlatformDragItem>> {
        self.items
            .iter()
            .map(|item| -> Box<dyn PlatformDragItem> {
                match item {
                    DragRepresentation::Image { bytes, mime } => Box::new(MemoryImageItem {
                        bytes: bytes.clone(),
                        mime: mime.clone(),
                    }),
                    DragRepresentation::File { path, .. } => Box::new(FileItem::new(path)),
                    DragRepresentation::Text(text) => Box::new(TextItem::new(text.clone())),
                }
            })
            .collect()
    }
}

/// Encoded image bytes handed over within the application.
struct MemoryImageItem {
    bytes: Vec<u8>,
    mime: String,
}

#[async_trait::async_trait]
impl PlatformDragItem for MemoryImageItem {
    fn categories(&self) -> Option<Vec<Category>> {
        Some(Category::from_mime(&self.mime))
    }

    fn mime_hint(&self) -> Option<String> {
        Some(self.mime.clone())
    }

    async fn load_image(&self) -> Result<PlatformImage> {
        let bytes = self.bytes.clone();
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
        Ok(PlatformImage::new(image))
    }
}

/// Everything the platform needs to start a drag.
pub struct DragPayload {
    preview: DragPreview,
    session: Arc<LocalDragSession>,
}

impl DragPayload {
    pub fn items(&self) -> &[DragRepresentation] {
        self.session.items()
    }

    pub fn preview(&self) -> &DragPreview {
        &self.preview
    }

    pub fn local_session(&self) -> Arc<LocalDragSession> {
        self.session.clone()
    }

    /// Paths of the file backed representations, for platforms that drag files.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.items()
            .iter()
            .filter_map(|item| match item {
                DragRepresentation::File { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Serves the first representation registered under the requested MIME type.
    pub fn data_provider(&self) -> DataProvider {
        let session = self.session.clone();
        Box::new(move |mime: &str| {
            session
                .items()
                .iter()
                .find(|item| item.mime().eq_ignore_ascii_case(mime))
                .and_then(DragRepresentation::bytes)
        })
    }
}

impl std::fmt::Debug for DragPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragPayload")
            .field("session", &self.session.id)
            .field("items", &self.session.items.len())
            .field("preview", &(self.preview.width, self.preview.height))
            .finish()
    }
}

/// Loads draggable sources. Decoded `data:` URLs for files and videos are
/// written to the cache so the platform can drag them as files.
#[derive(Clone)]
pub struct DragSourceBuilder {
    max_width: u32,
    max_height: u32,
    cache: Arc<dyn CacheDirectory>,
}

impl Default for DragSourceBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_SIZE, DEFAULT_PREVIEW_SIZE)
    }
}

impl DragSourceBuilder {
    /// `max_width` and `max_height` bound the preview box.
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
            cache: Arc::new(TransientCache::default()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheDirectory>) -> Self {
        self.cache = cache;
        self
    }

    /// Loads every source, skipping the ones that fail. Returns `None` when
    /// nothing could be loaded, in which case no drag must start.
    ///
    /// Reading, decoding and the preview run on the blocking pool.
    pub async fn begin_drag(
        &self,
        sources: Vec<DraggableSource>,
        pointer: CursorPosition,
    ) -> Option<DragPayload> {
        let builder = self.clone();
        match tokio::task::spawn_blocking(move || builder.build(&sources, pointer)).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "drag source loading aborted");
                None
            }
        }
    }

    fn build(&self, sources: &[DraggableSource], pointer: CursorPosition) -> Option<DragPayload> {
        let items: Vec<DragRepresentation> = sources
            .iter()
            .filter_map(|source| match self.load_source(source) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(kind = ?source.kind, error = %e, "skipping draggable source");
                    None
                }
            })
            .collect();

        if items.is_empty() {
            debug!("no draggable source could be loaded");
            return None;
        }

        let preview = match self.preview(&items, pointer) {
            Ok(preview) => preview,
            Err(e) => {
                warn!(error = %e, "failed to render drag preview");
                return None;
            }
        };

        Some(DragPayload {
            preview,
            session: Arc::new(LocalDragSession {
                id: Uuid::new_v4(),
                items,
            }),
        })
    }

    fn load_source(&self, source: &DraggableSource) -> Result<DragRepresentation> {
        match source.kind {
            SourceType::Text => {
                if source.value.is_empty() {
                    return Err(Error::EmptyText);
                }
                Ok(DragRepresentation::Text(source.value.clone()))
            }
            SourceType::Image => {
                let (bytes, declared) = match parse_data_url(&source.value)? {
                    Some(decoded) => decoded,
                    None => (Image::File(local_path(&source.value)?).bytes()?, None),
                };
                let mime = mime::sniff(&bytes)
                    .filter(|mime| mime.starts_with("image/"))
                    .map(str::to_string)
                    .or(declared.filter(|mime| mime.starts_with("image/")))
                    .ok_or_else(|| Error::InvalidSource("not an image".into()))?;
                Ok(DragRepresentation::Image { bytes, mime })
            }
            SourceType::Video | SourceType::File => {
                if let Some((bytes, declared)) = parse_data_url(&source.value)? {
                    return self.store_data(bytes, declared);
                }
                let path = local_path(&source.value)?;
                if !path.is_file() {
                    return Err(Error::InvalidSource(format!(
                        "{} is not a file",
                        path.display()
                    )));
                }
                let mime = extension_mime(&path).unwrap_or(OCTET_STREAM).to_string();
                Ok(DragRepresentation::File { path, mime })
            }
        }
    }

    fn store_data(&self, bytes: Vec<u8>, declared: Option<String>) -> Result<DragRepresentation> {
        let mime = declared
            .or_else(|| mime::sniff(&bytes).map(str::to_string))
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let extension = mime::extension_for_mime(&mime).unwrap_or_default();
        let path = self.cache.unique_path(extension)?;
        std::fs::write(&path, &bytes)?;
        debug!(path = %path.display(), mime = %mime, "stored inline drag source");
        Ok(DragRepresentation::File { path, mime })
    }

    fn preview(
        &self,
        items: &[DragRepresentation],
        pointer: CursorPosition,
    ) -> Result<DragPreview> {
        let decoded = items.iter().find_map(|item| match item {
            DragRepresentation::Image { bytes, .. } => image::load_from_memory(bytes).ok(),
            _ => None,
        });

        let visual = match decoded {
            Some(image) => {
                let (width, height) = image.dimensions();
                let (fit_width, fit_height) =
                    fit_within(width, height, self.max_width, self.max_height);
                if (fit_width, fit_height) == (width, height) {
                    image
                } else {
                    image.resize_exact(fit_width, fit_height, FilterType::Triangle)
                }
            }
            None => {
                let edge = PLACEHOLDER_SIZE.min(self.max_width).min(self.max_height);
                DynamicImage::ImageRgba8(RgbaImage::from_pixel(edge, edge, PLACEHOLDER_COLOR))
            }
        };

        let (width, height) = visual.dimensions();
        let mut png = Cursor::new(Vec::new());
        visual.write_to(&mut png, ImageFormat::Png)?;

        Ok(DragPreview {
            image: Image::Raw(png.into_inner()),
            width,
            height,
            origin: CursorPosition::new(
                pointer.x - (width / 2) as i32,
                pointer.y - (height / 2) as i32,
            ),
        })
    }
}

/// Largest size with the same aspect ratio that fits the box. Never upscales.
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

fn extension_mime(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime::mime_for_extension)
}

fn local_path(value: &str) -> Result<PathBuf> {
    if value.starts_with("file:") {
        let url = url::Url::parse(value).map_err(|e| Error::InvalidSource(e.to_string()))?;
        return url
            .to_file_path()
            .map_err(|_| Error::InvalidSource(format!("{value} is not a local file")));
    }
    Ok(PathBuf::from(value))
}

/// Decodes `data:<mime>;base64,<payload>`. Returns `None` for other values.
fn parse_data_url(value: &str) -> Result<Option<(Vec<u8>, Option<String>)>> {
    let Some(rest) = value.strip_prefix("data:") else {
        return Ok(None);
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidSource("malformed data URL".into()))?;
    let Some(mime) = header.strip_suffix(";base64") else {
        return Err(Error::InvalidSource("data URL is not base64 encoded".into()));
    };
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    let mime = (!mime.is_empty()).then(|| mime.to_ascii_lowercase());
    Ok(Some((bytes, mime)))
}
