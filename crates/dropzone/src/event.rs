// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::{asset::DropAsset, CursorPosition, DragResult};

/// Notifications a region delivers to its host.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum DropZoneEvent {
    /// A compatible payload entered the region.
    Enter,
    /// The payload left the full bounds of the region without being dropped.
    Exit,
    /// Every dropped item finished resolving and at least one asset survived.
    Drop { assets: Vec<DropAsset> },
    /// Some drag started somewhere in the application.
    DropListeningStart,
    /// A drag out of this region is about to be handed to the platform.
    DragStart,
    /// The drag out of this region finished, successfully or not.
    DragEnd {
        result: DragResult,
        #[cfg_attr(feature = "serde", serde(rename = "cursorPos"))]
        cursor_pos: CursorPosition,
    },
}

impl DropZoneEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DropZoneEvent::Enter => "onEnter",
            DropZoneEvent::Exit => "onExit",
            DropZoneEvent::Drop { .. } => "onDrop",
            DropZoneEvent::DropListeningStart => "onDropListeningStart",
            DropZoneEvent::DragStart => "onDragStart",
            DropZoneEvent::DragEnd { .. } => "onDragEnd",
        }
    }

    /// Name used by older consumers for the same notification.
    pub fn legacy_name(&self) -> Option<&'static str> {
        match self {
            DropZoneEvent::Drop { .. } => Some("onDropEvent"),
            DropZoneEvent::Enter => Some("onDropStartEvent"),
            DropZoneEvent::Exit => Some("onDropEndEvent"),
            _ => None,
        }
    }
}

/// Receives region notifications, keyed by event name.
pub trait EventSink: Send + Sync {
    fn emit(&self, name: &str, event: &DropZoneEvent);
}

impl<F> EventSink for F
where
    F: Fn(&str, &DropZoneEvent) + Send + Sync,
{
    fn emit(&self, name: &str, event: &DropZoneEvent) {
        self(name, event)
    }
}

/// Delivers every event under its name and, while legacy names are enabled,
/// under its legacy alias too.
#[derive(Clone)]
pub struct Emitter {
    sink: Arc<dyn EventSink>,
    legacy_names: bool,
}

impl Emitter {
    pub fn new(sink: Arc<dyn EventSink>, legacy_names: bool) -> Self {
        Self { sink, legacy_names }
    }

    pub fn emit(&self, event: DropZoneEvent) {
        tracing::debug!(event = event.name(), "emitting region event");
        self.sink.emit(event.name(), &event);
        if self.legacy_names {
            if let Some(alias) = event.legacy_name() {
                self.sink.emit(alias, &event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (Arc<Mutex<Vec<String>>>, Arc<dyn EventSink>) {
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink_names = names.clone();
        let sink: Arc<dyn EventSink> = Arc::new(move |name: &str, _: &DropZoneEvent| {
            sink_names.lock().unwrap().push(name.to_string());
        });
        (names, sink)
    }

    #[test]
    fn legacy_aliases_are_delivered_alongside() {
        let (names, sink) = recording();
        let emitter = Emitter::new(sink, true);
        emitter.emit(DropZoneEvent::Enter);
        emitter.emit(DropZoneEvent::Exit);
        emitter.emit(DropZoneEvent::Drop { assets: vec![] });
        emitter.emit(DropZoneEvent::DragStart);

        assert_eq!(
            *names.lock().unwrap(),
            vec![
                "onEnter",
                "onDropStartEvent",
                "onExit",
                "onDropEndEvent",
                "onDrop",
                "onDropEvent",
                "onDragStart",
            ]
        );
    }

    #[test]
    fn legacy_aliases_can_be_disabled() {
        let (names, sink) = recording();
        Emitter::new(sink, false).emit(DropZoneEvent::Drop { assets: vec![] });
        assert_eq!(*names.lock().unwrap(), vec!["onDrop"]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn drag_end_payload_shape() {
        let event = DropZoneEvent::DragEnd {
            result: DragResult::Cancel,
            cursor_pos: CursorPosition::new(3, 4),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "result": "Cancel", "cursorPos": { "x": 3, "y": 4 } })
        );
        assert_eq!(
            serde_json::to_value(DropZoneEvent::Drop {
                assets: vec![DropAsset::text("a")]
            })
            .unwrap(),
            serde_json::json!({ "assets": [{ "type": "text", "text": "a" }] })
        );
    }
}
