// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use crate::{
    cache::TransientCache,
    mime::{MimeFilter, MimeRule},
    resolver::ResolveOptions,
    session::RegionOptions,
    source::{DraggableSource, DEFAULT_PREVIEW_SIZE},
};

/// Properties a host passes when mounting a drop region.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct DropZoneConfig {
    pub include_base64: bool,
    /// `None` accepts everything, an empty list accepts nothing.
    pub allowed_mime_types: Option<Vec<MimeRule>>,
    pub draggable_sources: Vec<DraggableSource>,
    /// Passed through to hosts that draw a hover affordance.
    pub highlight_color: Option<String>,
    pub highlight_border_radius: Option<f64>,
    pub preview_max_width: u32,
    pub preview_max_height: u32,
    /// Also deliver `onDropEvent`, `onDropStartEvent` and `onDropEndEvent`.
    pub legacy_event_names: bool,
    pub cache_directory: Option<PathBuf>,
}

impl Default for DropZoneConfig {
    fn default() -> Self {
        Self {
            include_base64: false,
            allowed_mime_types: None,
            draggable_sources: Vec::new(),
            highlight_color: None,
            highlight_border_radius: None,
            preview_max_width: DEFAULT_PREVIEW_SIZE,
            preview_max_height: DEFAULT_PREVIEW_SIZE,
            legacy_event_names: true,
            cache_directory: None,
        }
    }
}

impl DropZoneConfig {
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn region_options(&self) -> RegionOptions {
        RegionOptions {
            filter: MimeFilter::new(self.allowed_mime_types.clone()),
            resolve: ResolveOptions {
                include_inline: self.include_base64,
            },
            sources: self.draggable_sources.clone(),
            preview_max_width: self.preview_max_width,
            preview_max_height: self.preview_max_height,
            legacy_event_names: self.legacy_event_names,
        }
    }

    pub fn cache(&self) -> TransientCache {
        match &self.cache_directory {
            Some(root) => TransientCache::new(root),
            None => TransientCache::default(),
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use crate::source::SourceType;

    #[test]
    fn empty_object_uses_defaults() {
        let config = DropZoneConfig::from_json("{}").unwrap();
        assert_eq!(config, DropZoneConfig::default());
        assert!(!config.region_options().filter.is_restrictive());
        assert_eq!(config.cache().root(), TransientCache::default().root());
    }

    #[test]
    fn host_props_are_read_in_camel_case() {
        let config = DropZoneConfig::from_json(
            r##"{
              "includeBase64": true,
              "allowedMimeTypes": [
                "application/pdf",
                "__REGEX__^image/__FLAGS__i",
                { "pattern": "^video/", "flags": "" }
              ],
              "draggableSources": [{ "type": "text", "value": "hi" }],
              "highlightColor": "#ff000080",
              "highlightBorderRadius": 12.5,
              "previewMaxWidth": 120,
              "legacyEventNames": false,
              "cacheDirectory": "/tmp/drops"
            }"##,
        )
        .unwrap();

        let options = config.region_options();
        assert!(options.resolve.include_inline);
        assert!(options.filter.allows(Some("IMAGE/PNG")));
        assert!(options.filter.allows(Some("video/mp4")));
        assert!(options.filter.allows(Some("application/pdf")));
        assert!(!options.filter.allows(Some("text/plain")));
        assert_eq!(
            options.sources,
            vec![DraggableSource::new(SourceType::Text, "hi")]
        );
        assert_eq!((options.preview_max_width, options.preview_max_height), (120, 200));
        assert!(!options.legacy_event_names);
        assert_eq!(config.highlight_color.as_deref(), Some("#ff000080"));
        assert_eq!(config.cache().root(), std::path::Path::new("/tmp/drops"));
    }

    #[test]
    fn null_and_empty_rule_sets_differ() {
        let open = DropZoneConfig::from_json(r#"{ "allowedMimeTypes": null }"#).unwrap();
        assert!(open.region_options().filter.allows(Some("text/plain")));

        let closed = DropZoneConfig::from_json(r#"{ "allowedMimeTypes": [] }"#).unwrap();
        assert!(!closed.region_options().filter.allows(Some("text/plain")));
    }

    #[test]
    fn unknown_source_types_are_rejected() {
        assert!(DropZoneConfig::from_json(
            r#"{ "draggableSources": [{ "type": "audio", "value": "x" }] }"#
        )
        .is_err());
    }
}
