// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

/// Literal MIME `type` reported for text assets.
pub const TEXT_TYPE: &str = "text";

/// The normalised result of resolving one dropped item.
///
/// Assets are built once by the resolver and then only read. Non-text assets
/// always carry a `uri` or a `path`; only text assets carry `text`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DropAsset {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    mime_type: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    uri: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    path: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    base64: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    file_name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    width: Option<u32>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    height: Option<u32>,
    /// Milliseconds.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    duration: Option<u64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    text: Option<String>,
}

impl DropAsset {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            mime_type: TEXT_TYPE.into(),
            uri: None,
            path: None,
            base64: None,
            file_name: None,
            width: None,
            height: None,
            duration: None,
            text: Some(text.into()),
        }
    }

    pub(crate) fn stored(mime_type: impl Into<String>, uri: String, path: String) -> Self {
        Self {
            mime_type: mime_type.into(),
            uri: Some(uri),
            path: Some(path),
            base64: None,
            file_name: None,
            width: None,
            height: None,
            duration: None,
            text: None,
        }
    }

    pub(crate) fn with_file_name(mut self, file_name: Option<String>) -> Self {
        self.file_name = file_name;
        self
    }

    pub(crate) fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub(crate) fn with_duration(mut self, duration: Option<u64>) -> Self {
        self.duration = duration;
        self
    }

    pub(crate) fn with_base64(mut self, base64: Option<String>) -> Self {
        self.base64 = base64;
        self
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn base64(&self) -> Option<&str> {
        self.base64.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.mime_type == TEXT_TYPE
    }
}
