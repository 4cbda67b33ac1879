use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::overlay::OverlayGeometry;

/// Annotations currently visible on the rendering surface.
///
/// The visible list is an immutable `Arc<[OverlayGeometry]>`. Writers build the
/// next list in an `OverlayBatch` and swap the reference in one step, so a
/// renderer holding a snapshot never sees a half-cleared or half-filled list.
pub struct OverlayStore {
    visible: RwLock<Arc<[OverlayGeometry]>>,
    generation: AtomicU64,
    dirty: AtomicBool,
}

/// Staging area for the next overlay contents. Invisible until published.
#[derive(Clone, Debug, Default)]
pub struct OverlayBatch {
    items: Vec<OverlayGeometry>,
}

impl OverlayBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn add(&mut self, geometry: OverlayGeometry) {
        self.items.push(geometry);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Extend<OverlayGeometry> for OverlayBatch {
    fn extend<I: IntoIterator<Item = OverlayGeometry>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl OverlayStore {
    pub fn new() -> Self {
        Self {
            visible: RwLock::new(Arc::from(Vec::new())),
            generation: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Copy of the visible contents to edit off the read path.
    pub fn stage(&self) -> OverlayBatch {
        OverlayBatch {
            items: self.snapshot_for_render().to_vec(),
        }
    }

    /// Make a batch visible in one swap.
    pub fn publish(&self, batch: OverlayBatch) {
        let next: Arc<[OverlayGeometry]> = Arc::from(batch.items);
        *self.visible.write().unwrap_or_else(PoisonError::into_inner) = next;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove every annotation.
    pub fn clear(&self) {
        self.publish(OverlayBatch::new());
    }

    /// The list the renderer should draw. Cheap: clones an `Arc`.
    pub fn snapshot_for_render(&self) -> Arc<[OverlayGeometry]> {
        self.visible
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of publishes so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn request_redraw(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Consume the redraw request. True if a redraw was pending.
    pub fn take_redraw(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }
}

impl Default for OverlayStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Classification, Rect};

    fn geometry(label: &str) -> OverlayGeometry {
        OverlayGeometry {
            bounds: Rect::new(0.0, 0.0, 1.0, 1.0),
            landmarks: Vec::new(),
            classification: Classification::new(label, 1.0),
            tracking_id: None,
        }
    }

    #[test]
    fn staged_changes_stay_invisible_until_publish() {
        let store = OverlayStore::new();
        let mut batch = store.stage();
        batch.add(geometry("a"));
        batch.add(geometry("b"));
        assert!(store.snapshot_for_render().is_empty());

        store.publish(batch);
        let snapshot = store.snapshot_for_render();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn old_snapshot_survives_replacement() {
        let store = OverlayStore::new();
        let mut batch = OverlayBatch::new();
        batch.add(geometry("old"));
        store.publish(batch);

        let held = store.snapshot_for_render();
        let mut next = store.stage();
        next.clear();
        next.add(geometry("new"));
        store.publish(next);

        assert_eq!(held[0].classification.label, "old");
        assert_eq!(store.snapshot_for_render()[0].classification.label, "new");
    }

    #[test]
    fn redraw_flag_is_consumed_once() {
        let store = OverlayStore::new();
        assert!(!store.take_redraw());
        store.request_redraw();
        store.request_redraw();
        assert!(store.is_dirty());
        assert!(store.take_redraw());
        assert!(!store.take_redraw());
    }

    #[test]
    fn clear_publishes_empty_list() {
        let store = OverlayStore::new();
        let mut batch = OverlayBatch::new();
        batch.extend([geometry("a")]);
        store.publish(batch);
        store.clear();
        assert!(store.snapshot_for_render().is_empty());
        assert_eq!(store.generation(), 2);
    }
}
