// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The drop region state machine.
//!
//! Incoming drags move a region through `Idle -> Entered -> Dropped -> Idle`
//! (or straight back to `Idle` on exit). Outgoing drags started from the same
//! region are tracked separately and never touch the incoming state.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{
    asset::DropAsset,
    cache::CacheDirectory,
    classify::{classify, ItemKind},
    config::DropZoneConfig,
    event::{DropZoneEvent, Emitter, EventSink},
    item::PlatformDragItem,
    mime::MimeFilter,
    resolver::{AssetResolver, ResolveOptions},
    source::{
        DragPayload, DragSourceBuilder, DraggableSource, LocalDragSession, DEFAULT_PREVIEW_SIZE,
    },
    Bounds, CursorPosition, DragResult, Result,
};

/// MIME type text items are filtered as.
const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DropState {
    #[default]
    Idle,
    Entered,
    /// Released over the region, resolutions in flight.
    Dropped,
}

/// Snapshot of a region's incoming drag session.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    state: DropState,
    pending: Arc<AtomicUsize>,
}

impl DragSession {
    pub fn state(&self) -> DropState {
        self.state
    }

    /// Resolutions launched by the current drop that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Completion group membership. Dropping it, including while unwinding,
/// releases the slot.
struct Pending(Arc<AtomicUsize>);

impl Pending {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Returns the region to `Idle` however the drop ends, including when the
/// caller stops polling it.
struct DropInProgress<'a> {
    state: &'a Mutex<RegionState>,
}

impl Drop for DropInProgress<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.session.state = DropState::Idle;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionOptions {
    pub filter: MimeFilter,
    pub resolve: ResolveOptions,
    pub sources: Vec<DraggableSource>,
    pub preview_max_width: u32,
    pub preview_max_height: u32,
    pub legacy_event_names: bool,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            filter: MimeFilter::allow_all(),
            resolve: ResolveOptions::default(),
            sources: Vec::new(),
            preview_max_width: DEFAULT_PREVIEW_SIZE,
            preview_max_height: DEFAULT_PREVIEW_SIZE,
            legacy_event_names: true,
        }
    }
}

#[derive(Default)]
struct RegionState {
    session: DragSession,
    bounds: Option<Bounds>,
    sources: Vec<DraggableSource>,
    outgoing: Option<Arc<LocalDragSession>>,
}

/// One mounted drop region.
pub struct DropRegion {
    filter: MimeFilter,
    resolver: AssetResolver,
    builder: DragSourceBuilder,
    emitter: Emitter,
    state: Mutex<RegionState>,
    mounted: Arc<AtomicBool>,
}

impl DropRegion {
    /// Mounts a region caching into the configured (or default) transient directory.
    pub fn new(config: DropZoneConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let cache = config.cache();
        std::fs::create_dir_all(cache.root())?;
        Ok(Self::with_cache(config.region_options(), Arc::new(cache), sink))
    }

    pub fn with_cache(
        options: RegionOptions,
        cache: Arc<dyn CacheDirectory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            filter: options.filter,
            resolver: AssetResolver::new(cache.clone(), options.resolve),
            builder: DragSourceBuilder::new(options.preview_max_width, options.preview_max_height)
                .with_cache(cache.clone()),
            emitter: Emitter::new(sink, options.legacy_event_names),
            state: Mutex::new(RegionState {
                sources: options.sources,
                ..Default::default()
            }),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn emit(&self, event: DropZoneEvent) {
        if self.is_mounted() {
            self.emitter.emit(event);
        }
    }

    /// Full bounds of the region, children included, used to tell a real exit
    /// apart from the pointer moving onto a nested element.
    pub fn set_bounds(&self, bounds: Bounds) {
        self.lock().bounds = Some(bounds);
    }

    pub fn set_draggable_sources(&self, sources: Vec<DraggableSource>) {
        self.lock().sources = sources;
    }

    pub fn state(&self) -> DropState {
        self.lock().session.state
    }

    pub fn session(&self) -> DragSession {
        self.lock().session.clone()
    }

    pub fn outstanding(&self) -> usize {
        self.lock().session.outstanding()
    }

    pub fn filter(&self) -> &MimeFilter {
        &self.filter
    }

    /// Whether hovering items with these MIME hints could produce any asset.
    /// Unknown types are accepted here and settled after loading.
    pub fn can_handle(&self, hints: &[String]) -> bool {
        match self.filter.rules() {
            None => true,
            Some([]) => false,
            Some(_) => {
                hints.is_empty() || hints.iter().any(|hint| self.filter.allows(Some(hint)))
            }
        }
    }

    /// Some drag started somewhere in the application.
    pub fn listening_started(&self) {
        self.emit(DropZoneEvent::DropListeningStart);
    }

    /// Returns `true` when the region moved to [`DropState::Entered`].
    pub fn drag_entered(&self) -> bool {
        {
            let mut state = self.lock();
            if state.session.state != DropState::Idle {
                debug!(state = ?state.session.state, "ignoring enter");
                return false;
            }
            state.session.state = DropState::Entered;
        }
        debug!("drag entered region");
        self.emit(DropZoneEvent::Enter);
        true
    }

    /// Handles the platform's leave callback. With a pointer inside the
    /// region's bounds the leave came from a nested child and is ignored.
    pub fn drag_exited(&self, pointer: Option<CursorPosition>) -> bool {
        {
            let mut state = self.lock();
            if state.session.state != DropState::Entered {
                return false;
            }
            if let (Some(bounds), Some(pointer)) = (state.bounds, pointer) {
                if bounds.contains(pointer) {
                    debug!(?pointer, "pointer still inside region bounds");
                    return false;
                }
            }
            state.session.state = DropState::Idle;
        }
        debug!("drag exited region");
        self.emit(DropZoneEvent::Exit);
        true
    }

    /// Resolves every item concurrently and waits for all of them. `onDrop`
    /// is emitted once, with the surviving assets in item order, and only if
    /// there is at least one. Only a region in [`DropState::Entered`] accepts
    /// a drop; anything else is ignored without loading a single item.
    pub async fn drop_items(&self, items: Vec<Box<dyn PlatformDragItem>>) -> Vec<DropAsset> {
        let pending = {
            let mut state = self.lock();
            if state.session.state != DropState::Entered {
                debug!(state = ?state.session.state, "ignoring drop outside a hover");
                return Vec::new();
            }
            state.session.state = DropState::Dropped;
            state.session.pending = Arc::new(AtomicUsize::new(0));
            state.session.pending.clone()
        };
        let _in_progress = DropInProgress { state: &self.state };

        let total = items.len();
        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let kind = classify(&*item);
            let hint = match kind {
                ItemKind::Text => Some(TEXT_MIME.to_string()),
                _ => item.mime_hint(),
            };
            if !self.passes_pre_filter(hint.as_deref()) {
                debug!(index, kind = kind.as_str(), "item rejected before loading");
                continue;
            }

            let resolver = self.resolver.clone();
            let slot = Pending::enter(&pending);
            tasks.spawn(async move {
                let _slot = slot;
                let asset = resolver.resolve(&*item, kind).await;
                (index, kind, hint, asset)
            });
        }
        let launched = tasks.len();

        let mut slots: Vec<Option<DropAsset>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, kind, hint, Some(asset))) => {
                    let mime = filtered_type(kind, hint.as_deref(), &asset);
                    if self.filter.allows(Some(mime)) {
                        slots[index] = Some(asset);
                    } else {
                        debug!(index, kind = kind.as_str(), mime, "resolved item rejected");
                    }
                }
                Ok((_, _, _, None)) => {}
                Err(e) => warn!(error = %e, "item resolution aborted"),
            }
        }
        let assets: Vec<DropAsset> = slots.into_iter().flatten().collect();
        drop(_in_progress);

        if !self.is_mounted() {
            debug!(discarded = assets.len(), "region torn down during drop");
            return Vec::new();
        }

        info!(total, launched, accepted = assets.len(), "drop resolved");
        if !assets.is_empty() {
            self.emit(DropZoneEvent::Drop {
                assets: assets.clone(),
            });
        }
        assets
    }

    /// Drops the items of an outgoing drag started in this application.
    pub async fn drop_local(&self, session: &LocalDragSession) -> Vec<DropAsset> {
        self.drop_items(session.drop_items()).await
    }

    /// Items without a cheap hint are settled after loading.
    fn passes_pre_filter(&self, hint: Option<&str>) -> bool {
        if matches!(self.filter.rules(), Some([])) {
            return false;
        }
        hint.map_or(true, |hint| self.filter.allows(Some(hint)))
    }

    /// Loads the configured sources for a drag out of the region. `onDragStart`
    /// is emitted once, and only when a payload was produced.
    pub async fn begin_drag(&self, pointer: CursorPosition) -> Option<DragPayload> {
        let sources = self.lock().sources.clone();
        let payload = self.builder.begin_drag(sources, pointer).await?;
        self.lock().outgoing = Some(payload.local_session());
        self.emit(DropZoneEvent::DragStart);
        Some(payload)
    }

    /// The outgoing drag in progress, if any.
    pub fn outgoing(&self) -> Option<Arc<LocalDragSession>> {
        self.lock().outgoing.clone()
    }

    pub fn end_drag(&self, result: DragResult, pointer: CursorPosition) {
        if self.lock().outgoing.take().is_none() {
            debug!("drag end without a drag in progress");
            return;
        }
        self.emit(DropZoneEvent::DragEnd {
            result,
            cursor_pos: pointer,
        });
    }

    /// Tears the region down. Resolutions still in flight finish, but their
    /// results are discarded and nothing is emitted any more.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        let mut state = self.lock();
        state.outgoing = None;
        debug!(outstanding = state.session.outstanding(), "region unmounted");
    }
}

/// The type an asset is filtered as. Text counts as plain text; an image that
/// was re-encoded keeps the type of the image the source provided.
fn filtered_type<'a>(kind: ItemKind, hint: Option<&'a str>, asset: &'a DropAsset) -> &'a str {
    if asset.is_text() {
        return TEXT_MIME;
    }
    match hint {
        Some(hint)
            if kind == ItemKind::Image
                && hint.starts_with("image/")
                && asset.mime_type().starts_with("image/") =>
        {
            hint
        }
        _ => asset.mime_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::TransientCache, item::TextItem, mime::MimeRule, source::SourceType};
    type Log = Arc<Mutex<Vec<String>>>;

    fn region(options: RegionOptions, dir: &std::path::Path) -> (DropRegion, Log) {
        let log: Log = Default::default();
        let sink_log = log.clone();
        let sink = Arc::new(move |name: &str, _: &DropZoneEvent| {
            sink_log.lock().unwrap().push(name.to_string());
        });
        let region = DropRegion::with_cache(options, Arc::new(TransientCache::new(dir)), sink);
        (region, log)
    }

    fn modern() -> RegionOptions {
        RegionOptions {
            legacy_event_names: false,
            ..Default::default()
        }
    }

    #[test]
    fn enter_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let (region, log) = region(modern(), dir.path());
        assert!(region.drag_entered());
        assert!(!region.drag_entered());
        assert_eq!(region.state(), DropState::Entered);
        assert_eq!(*log.lock().unwrap(), vec!["onEnter"]);
    }

    #[test]
    fn listening_start_is_independent_and_silenced_by_unmount() {
        let dir = tempfile::tempdir().unwrap();
        let (region, log) = region(modern(), dir.path());
        region.listening_started();
        assert_eq!(region.state(), DropState::Idle);

        region.unmount();
        region.listening_started();
        region.drag_entered();
        assert_eq!(*log.lock().unwrap(), vec!["onDropListeningStart"]);
    }

    #[test]
    fn exit_requires_the_pointer_outside_the_full_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let (region, log) = region(modern(), dir.path());
        region.set_bounds(Bounds::new(0, 0, 100, 100));

        assert!(!region.drag_exited(Some(CursorPosition::new(1, 1))));
        region.drag_entered();
        assert!(!region.drag_exited(Some(CursorPosition::new(50, 50))));
        assert_eq!(region.state(), DropState::Entered);
        assert!(region.drag_exited(Some(CursorPosition::new(150, 50))));
        assert_eq!(region.state(), DropState::Idle);
        assert_eq!(*log.lock().unwrap(), vec!["onEnter", "onExit"]);
    }

    #[test]
    fn acceptance_query_follows_the_rules() {
        let dir = tempfile::tempdir().unwrap();
        let (open, _) = region(modern(), dir.path());
        assert!(open.can_handle(&["application/x-anything".into()]));

        let (closed, _) = region(
            RegionOptions {
                filter: MimeFilter::new(Some(vec![])),
                ..modern()
            },
            dir.path(),
        );
        assert!(!closed.can_handle(&[]));

        let (images, _) = region(
            RegionOptions {
                filter: MimeFilter::new(Some(vec![MimeRule::pattern("^image/", "")])),
                ..modern()
            },
            dir.path(),
        );
        assert!(images.can_handle(&["text/plain".into(), "image/gif".into()]));
        assert!(!images.can_handle(&["text/plain".into()]));
        assert!(images.can_handle(&[]));
    }

    #[tokio::test]
    async fn text_is_filtered_as_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let (region, log) = region(
            RegionOptions {
                filter: MimeFilter::new(Some(vec![MimeRule::exact("text/plain")])),
                ..modern()
            },
            dir.path(),
        );
        region.drag_entered();
        let assets = region
            .drop_items(vec![Box::new(TextItem::new("hello"))])
            .await;
        assert_eq!(assets, vec![DropAsset::text("hello")]);
        assert_eq!(*log.lock().unwrap(), vec!["onEnter", "onDrop"]);
        assert_eq!(region.state(), DropState::Idle);
        assert_eq!(region.outstanding(), 0);
    }

    #[tokio::test]
    async fn drops_need_a_hover_first() {
        let dir = tempfile::tempdir().unwrap();
        let (region, log) = region(modern(), dir.path());
        let assets = region
            .drop_items(vec![Box::new(TextItem::new("stray"))])
            .await;
        assert!(assets.is_empty());
        assert_eq!(region.state(), DropState::Idle);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn an_abandoned_drop_returns_the_region_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (region, _) = region(modern(), dir.path());
        region.drag_entered();
        {
            region.lock().session.state = DropState::Dropped;
            let _in_progress = DropInProgress {
                state: &region.state,
            };
            assert_eq!(region.state(), DropState::Dropped);
        }
        assert_eq!(region.state(), DropState::Idle);
        assert!(region.drag_entered());
    }

    #[tokio::test]
    async fn outgoing_drags_are_independent_of_the_incoming_state() {
        let dir = tempfile::tempdir().unwrap();
        let (region, log) = region(
            RegionOptions {
                sources: vec![DraggableSource::new(SourceType::Text, "out")],
                ..modern()
            },
            dir.path(),
        );
        region.drag_entered();
        let payload = region.begin_drag(CursorPosition::new(5, 5)).await.unwrap();
        assert_eq!(region.state(), DropState::Entered);
        assert_eq!(
            region.outgoing().map(|s| s.id()),
            Some(payload.local_session().id())
        );

        region.end_drag(DragResult::Dropped, CursorPosition::new(9, 9));
        region.end_drag(DragResult::Dropped, CursorPosition::new(9, 9));
        assert!(region.outgoing().is_none());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["onEnter", "onDragStart", "onDragEnd"]
        );
    }

    #[test]
    fn pending_slots_are_released_on_unwind() {
        let counter = Arc::new(AtomicUsize::new(0));
        let guarded = counter.clone();
        let result = std::panic::catch_unwind(move || {
            let _slot = Pending::enter(&guarded);
            panic!("resolution blew up");
        });
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
