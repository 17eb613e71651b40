// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use crate::{asset::DropAsset, item::PlatformDragItem, session::DropRegion, CursorPosition};

/// The calls a platform adapter makes while a drag hovers over or lands on a
/// region. Adapters translate their native callbacks into these.
#[async_trait::async_trait]
pub trait DropDelegate: Send + Sync {
    fn on_enter(&self);

    /// `pointer` is the last known position, when the platform reports one.
    fn on_exit(&self, pointer: Option<CursorPosition>);

    async fn on_drop(&self, items: Vec<Box<dyn PlatformDragItem>>) -> Vec<DropAsset>;

    /// Asked before a drop with the MIME hints of the hovering items.
    fn on_drag_query(&self, hints: &[String]) -> bool;
}

#[async_trait::async_trait]
impl DropDelegate for DropRegion {
    fn on_enter(&self) {
        self.drag_entered();
    }

    fn on_exit(&self, pointer: Option<CursorPosition>) {
        self.drag_exited(pointer);
    }

    async fn on_drop(&self, items: Vec<Box<dyn PlatformDragItem>>) -> Vec<DropAsset> {
        self.drop_items(items).await
    }

    fn on_drag_query(&self, hints: &[String]) -> bool {
        self.can_handle(hints)
    }
}
