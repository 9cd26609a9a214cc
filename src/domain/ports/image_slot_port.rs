//! Port definition for UI objects that display cached images.

use std::sync::{Arc, Weak};

use crate::domain::entities::CachedBitmap;

/// A UI element the cache can push a bitmap into.
///
/// The element is owned by the UI; the cache only ever sees it through a
/// [`WeakHandle`].
pub trait ImageSlot: Send + Sync {
    /// Replaces the displayed image.
    fn set_image(&self, image: Arc<CachedBitmap>);

    /// Shows or hides the element.
    fn set_visible(&self, visible: bool);
}

/// Non-owning reference to an [`ImageSlot`].
///
/// Holding one never keeps the slot alive. [`WeakHandle::upgrade`] must be
/// called immediately before each mutation; a dropped slot yields `None`.
#[derive(Clone, Default)]
pub struct WeakHandle(Option<Weak<dyn ImageSlot>>);

impl WeakHandle {
    /// Creates a handle observing `slot`.
    #[must_use]
    pub fn new<T: ImageSlot + 'static>(slot: &Arc<T>) -> Self {
        let weak: Weak<T> = Arc::downgrade(slot);
        Self(Some(weak))
    }

    /// Creates a handle observing a type-erased slot.
    #[must_use]
    pub fn from_dyn(slot: &Arc<dyn ImageSlot>) -> Self {
        Self(Some(Arc::downgrade(slot)))
    }

    /// A handle that never resolves, for requests with no UI attached.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// Whether a slot was attached when the handle was created.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.0.is_some()
    }

    /// Whether the observed slot still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Borrows the slot for one update, if it still exists.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<dyn ImageSlot>> {
        self.0.as_ref().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakHandle")
            .field("attached", &self.is_attached())
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    /// Records what the cache did to it.
    #[derive(Default)]
    pub struct MockSlot {
        image: Mutex<Option<Arc<CachedBitmap>>>,
        visible: Mutex<Option<bool>>,
        updates: AtomicUsize,
    }

    impl MockSlot {
        /// Creates a slot wrapped for handle creation.
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// The last image set, if any.
        pub fn image(&self) -> Option<Arc<CachedBitmap>> {
            self.image.lock().clone()
        }

        /// The last visibility set, if any.
        pub fn visible(&self) -> Option<bool> {
            *self.visible.lock()
        }

        /// Number of calls received.
        pub fn update_count(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }
    }

    impl ImageSlot for MockSlot {
        fn set_image(&self, image: Arc<CachedBitmap>) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            *self.image.lock() = Some(image);
        }

        fn set_visible(&self, visible: bool) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            *self.visible.lock() = Some(visible);
        }
    }
}
