// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Semantic classification of dropped items.
//!
//! Platform adapters translate their native type tokens (UTIs, MIME types,
//! clipboard flavours) into [`Category`] values; the priority rules below are
//! the only place where a kind is decided.

use std::path::Path;

use crate::item::PlatformDragItem;

/// Semantic kind of a dropped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ItemKind {
    Image,
    Video,
    Text,
    File,
    Unknown,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Image => "image",
            ItemKind::Video => "video",
            ItemKind::Text => "text",
            ItemKind::File => "file",
            ItemKind::Unknown => "unknown",
        }
    }
}

/// Normalised type taxonomy shared by every platform adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Movie,
    Video,
    Image,
    Pdf,
    Zip,
    Spreadsheet,
    Presentation,
    Database,
    Json,
    PlainText,
    /// Any opaque payload that can at least be read as bytes.
    Item,
}

impl Category {
    /// Categories a region declares as acceptable before anything is dropped.
    pub const DEFAULT_DROP_CATEGORIES: &'static [Category] = &[
        Category::Image,
        Category::Video,
        Category::Movie,
        Category::PlainText,
        Category::Pdf,
        Category::Json,
        Category::Zip,
        Category::Spreadsheet,
        Category::Presentation,
        Category::Database,
        Category::Item,
    ];

    fn is_document(&self) -> bool {
        matches!(
            self,
            Category::Pdf
                | Category::Zip
                | Category::Spreadsheet
                | Category::Presentation
                | Category::Database
                | Category::Json
        )
    }

    /// Every category a MIME type conforms to, most specific first.
    pub fn from_mime(mime: &str) -> Vec<Category> {
        let mime = mime.trim().to_ascii_lowercase();
        let mut categories = Vec::new();
        let (top, sub) = mime.split_once('/').unwrap_or((mime.as_str(), ""));

        match top {
            "video" => categories.push(Category::Video),
            "image" => categories.push(Category::Image),
            _ => {}
        }
        if sub == "quicktime" {
            categories.push(Category::Movie);
        }
        match sub {
            "pdf" => categories.push(Category::Pdf),
            "zip" | "x-zip-compressed" | "gzip" | "x-tar" => categories.push(Category::Zip),
            "json" => categories.push(Category::Json),
            "vnd.sqlite3" | "x-sqlite3" => categories.push(Category::Database),
            _ if sub.contains("spreadsheet") || sub == "vnd.ms-excel" || sub == "csv" => {
                categories.push(Category::Spreadsheet)
            }
            _ if sub.contains("presentation") || sub == "vnd.ms-powerpoint" => {
                categories.push(Category::Presentation)
            }
            _ => {}
        }
        if top == "text" || sub == "json" {
            categories.push(Category::PlainText);
        }
        if !mime.is_empty() {
            categories.push(Category::Item);
        }
        categories
    }

    /// Every category an Apple uniform type identifier conforms to.
    pub fn from_uti(uti: &str) -> Vec<Category> {
        let mut categories = match uti {
            "public.movie" | "com.apple.quicktime-movie" => vec![Category::Movie],
            "public.video" | "public.mpeg-4" | "public.avi" | "public.mpeg" => {
                vec![Category::Video, Category::Movie]
            }
            "public.image" | "public.png" | "public.jpeg" | "public.heic" | "public.heif"
            | "com.compuserve.gif" | "public.tiff" | "org.webmproject.webp" => {
                vec![Category::Image]
            }
            "com.adobe.pdf" => vec![Category::Pdf],
            "public.zip-archive" | "com.pkware.zip-archive" => vec![Category::Zip],
            "public.spreadsheet" | "org.openxmlformats.spreadsheetml.sheet" => {
                vec![Category::Spreadsheet]
            }
            "public.presentation" | "org.openxmlformats.presentationml.presentation" => {
                vec![Category::Presentation]
            }
            "public.database" => vec![Category::Database],
            "public.json" => vec![Category::Json, Category::PlainText],
            "public.text" | "public.plain-text" | "public.utf8-plain-text" => {
                vec![Category::PlainText]
            }
            _ => Vec::new(),
        };
        if !uti.is_empty() {
            categories.push(Category::Item);
        }
        categories
    }
}

/// Applies the priority rules to a set of declared categories.
pub fn classify_categories(categories: &[Category]) -> ItemKind {
    let has = |category: Category| categories.contains(&category);

    if has(Category::Video) || has(Category::Movie) {
        ItemKind::Video
    } else if has(Category::Image) {
        ItemKind::Image
    } else if categories.iter().any(Category::is_document) {
        ItemKind::File
    } else if has(Category::PlainText) {
        ItemKind::Text
    } else if has(Category::Item) {
        ItemKind::File
    } else {
        ItemKind::Unknown
    }
}

/// Fallback used when a platform exposes no precise type metadata.
pub fn kind_for_extension(ext: &str) -> ItemKind {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "mov" | "mp4" | "m4v" | "webm" | "3gp" => ItemKind::Video,
        "jpg" | "jpeg" | "png" | "gif" | "heic" | "webp" => ItemKind::Image,
        "json" | "zip" | "xlsx" | "xls" | "docx" | "doc" | "pptx" | "ppt" | "pdf" => {
            ItemKind::File
        }
        "txt" => ItemKind::Text,
        _ => ItemKind::Unknown,
    }
}

/// Assigns a semantic kind to a dropped item. Classification never loads the
/// item's data, so calling it repeatedly is cheap and always agrees.
pub fn classify(item: &dyn PlatformDragItem) -> ItemKind {
    if let Some(categories) = item.categories() {
        return classify_categories(&categories);
    }

    item.suggested_name()
        .as_deref()
        .map(Path::new)
        .and_then(Path::extension)
        .and_then(|ext| ext.to_str())
        .map(kind_for_extension)
        .unwrap_or(ItemKind::Unknown)
}
