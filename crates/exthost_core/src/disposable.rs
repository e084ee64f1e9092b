//! Idempotent release handles.

use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

type DisposeAction = Box<dyn FnOnce()>;

/// Runs its release action at most once, no matter how many clones call
/// [`Disposable::dispose`].
#[derive(Clone, Default)]
pub struct Disposable {
    action: Rc<RefCell<Option<DisposeAction>>>,
}

impl Disposable {
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Rc::new(RefCell::new(Some(Box::new(action)))),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Combines several handles; disposal runs them in order.
    pub fn from_all(items: Vec<Disposable>) -> Self {
        Self::new(move || {
            for item in items {
                item.dispose();
            }
        })
    }

    pub fn dispose(&self) {
        // Take first so a re-entrant dispose from inside the action is a no-op.
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl Debug for Disposable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Disposable;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn dispose_runs_once_across_clones() {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let handle = Disposable::new(move || counter.set(counter.get() + 1));
        let clone = handle.clone();

        handle.dispose();
        clone.dispose();
        handle.dispose();

        assert_eq!(count.get(), 1);
        assert!(clone.is_disposed());
    }

    #[test]
    fn combined_handles_release_every_member() {
        let count = Rc::new(Cell::new(0));
        let members = (0..3)
            .map(|_| {
                let counter = Rc::clone(&count);
                Disposable::new(move || counter.set(counter.get() + 1))
            })
            .collect();
        Disposable::from_all(members).dispose();
        assert_eq!(count.get(), 3);
    }
}
