//! Collection of the customize change running on the current thread
//!
//! The host may change customization on several threads at once, so the
//! "current" collection is per thread. Scopes nest: leaving one restores
//! whatever the enclosing scope had set.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::collections::ResolveData;

thread_local! {
    static CURRENT: RefCell<Option<ResolveData>> = const { RefCell::new(None) };
}

/// Marks `data` as the collection of the customize change in progress
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct CustomizeChangeScope {
    previous: Option<ResolveData>,
    // Must be dropped on the thread that created it
    _not_send: PhantomData<*const ()>,
}

impl CustomizeChangeScope {
    pub fn enter(data: ResolveData) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(data)));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for CustomizeChangeScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}

/// Collection of the customize change running on this thread, if any
pub fn current_customize_change() -> Option<ResolveData> {
    CURRENT.with(|current| current.borrow().clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collections::ModCollection;

    fn data(name: &str) -> ResolveData {
        ResolveData::unassociated(Arc::new(ModCollection::new(name)))
    }

    #[test]
    fn test_nested_scopes() {
        assert!(current_customize_change().is_none());
        {
            let _outer = CustomizeChangeScope::enter(data("Outer"));
            {
                let _inner = CustomizeChangeScope::enter(data("Inner"));
                assert_eq!(current_customize_change().unwrap().collection.name(), "Inner");
            }
            assert_eq!(current_customize_change().unwrap().collection.name(), "Outer");
        }
        assert!(current_customize_change().is_none());
    }

    #[test]
    fn test_scopes_are_per_thread() {
        let _scope = CustomizeChangeScope::enter(data("Main"));
        let other = std::thread::spawn(|| current_customize_change().is_none())
            .join()
            .unwrap();
        assert!(other);
        assert_eq!(current_customize_change().unwrap().collection.name(), "Main");
    }
}
