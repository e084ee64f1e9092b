//! Code contribution registry.
//!
//! Decouples declaring a contribution in a manifest from providing its
//! implementation. A lookup that misses emits the point's activation event
//! for the requested id, so the owning extension activates on first use.

use super::ContributionError;
use crate::disposable::Disposable;
use crate::host::ExtensionHost;
use crate::store::CodeKey;
use log::{debug, warn};
use std::any::{type_name, Any};
use std::rc::Rc;

/// Opaque implementation value registered for a contribution id.
pub type CodeValue = Rc<dyn Any>;

impl ExtensionHost {
    /// Stores `value` under `(point, id)`.
    ///
    /// Registering the identical value again returns a no-op handle. The
    /// returned handle removes the entry only while it still holds `value`.
    pub fn register_code_contribution(
        &self,
        point: &str,
        id: &str,
        value: CodeValue,
    ) -> Disposable {
        let key: CodeKey = (point.to_string(), id.to_string());
        {
            let mut store = self.inner.store.borrow_mut();
            if let Some(current) = store.code.get(&key) {
                if Rc::ptr_eq(&current, &value) {
                    return Disposable::noop();
                }
                warn!(
                    "event=code_register module=contribution status=replaced point_id={} contribution_id={}",
                    point, id
                );
            }
            store.code.set(key.clone(), Rc::clone(&value));
        }
        debug!(
            "event=code_register module=contribution status=ok point_id={} contribution_id={}",
            point, id
        );

        let host = self.downgrade();
        Disposable::new(move || {
            let Some(host) = host.upgrade() else {
                return;
            };
            let mut store = host.inner.store.borrow_mut();
            let same = store
                .code
                .get(&key)
                .is_some_and(|current| Rc::ptr_eq(&current, &value));
            if same {
                store.code.delete(&key);
            }
        })
    }

    /// Registered value for `(point, id)`, without triggering activation.
    pub fn code_contribution(&self, point: &str, id: &str) -> Option<CodeValue> {
        self.inner
            .store
            .borrow()
            .code
            .get(&(point.to_string(), id.to_string()))
    }

    /// Ids with a registered implementation under `point`.
    pub fn code_contribution_ids(&self, point: &str) -> Vec<String> {
        self.inner
            .store
            .borrow()
            .code
            .all()
            .keys()
            .filter(|(owner, _)| owner == point)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Resolves `(point, id)`, activating the owning extension when needed.
    pub async fn load_code_contribution(
        &self,
        point: &str,
        id: &str,
    ) -> Result<CodeValue, ContributionError> {
        if let Some(value) = self.code_contribution(point, id) {
            return Ok(value);
        }
        let definition = self
            .contribution_point(point)
            .ok_or_else(|| ContributionError::UnregisteredPoint(point.to_string()))?;

        let event = definition
            .code_info
            .as_ref()
            .and_then(|code_info| code_info.activation_event_for(id));
        if let Some(event) = event {
            debug!(
                "event=code_load module=contribution status=activating point_id={} contribution_id={} activation_event={}",
                point, id, event
            );
            self.activate_by_event(&event).await;
            if let Some(value) = self.code_contribution(point, id) {
                return Ok(value);
            }
        }

        Err(ContributionError::UnregisteredCode {
            point: point.to_string(),
            id: id.to_string(),
        })
    }

    /// [`ExtensionHost::load_code_contribution`] downcast to `T`.
    pub async fn load_code_contribution_as<T: 'static>(
        &self,
        point: &str,
        id: &str,
    ) -> Result<Rc<T>, ContributionError> {
        let value = self.load_code_contribution(point, id).await?;
        value
            .downcast::<T>()
            .map_err(|_| ContributionError::TypeMismatch {
                point: point.to_string(),
                id: id.to_string(),
                expected: type_name::<T>(),
            })
    }
}
