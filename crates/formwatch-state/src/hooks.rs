//! # Lifecycle Hooks
//!
//! Optional listeners invoked synchronously at guard transitions:
//!
//! - `on_set_alert`: every time the watcher arms the guard, before the
//!   guard is touched.
//! - `on_unset_alert`: every time the watcher disarms the guard, before
//!   the guard is touched.
//! - `on_unload`: when the navigate-away prompt actually fires, before
//!   the prompt text is returned.
//!
//! Hooks run while the watcher is mutably borrowed and must not call
//! back into the same watcher.

use std::rc::Rc;

/// A shared, side-effecting callback.
pub type Callback = Rc<dyn Fn()>;

/// The set of optional hook callbacks for one session.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Invoked when the navigate-away prompt fires.
    pub on_unload: Option<Callback>,
    /// Invoked whenever the guard is armed.
    pub on_set_alert: Option<Callback>,
    /// Invoked whenever the guard is disarmed.
    pub on_unset_alert: Option<Callback>,
}

impl Hooks {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the `on_unload` hook.
    pub fn on_unload(mut self, f: impl Fn() + 'static) -> Self {
        self.on_unload = Some(Rc::new(f));
        self
    }

    /// Builder: set the `on_set_alert` hook.
    pub fn on_set_alert(mut self, f: impl Fn() + 'static) -> Self {
        self.on_set_alert = Some(Rc::new(f));
        self
    }

    /// Builder: set the `on_unset_alert` hook.
    pub fn on_unset_alert(mut self, f: impl Fn() + 'static) -> Self {
        self.on_unset_alert = Some(Rc::new(f));
        self
    }

    pub(crate) fn fire_set_alert(&self) {
        if let Some(f) = &self.on_set_alert {
            f();
        }
    }

    pub(crate) fn fire_unset_alert(&self) {
        if let Some(f) = &self.on_unset_alert {
            f();
        }
    }

    /// The unload callback handed to the guard (a no-op when unset).
    pub(crate) fn unload_callback(&self) -> Callback {
        self.on_unload.clone().unwrap_or_else(|| Rc::new(|| {}))
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_unload", &self.on_unload.is_some())
            .field("on_set_alert", &self.on_set_alert.is_some())
            .field("on_unset_alert", &self.on_unset_alert.is_some())
            .finish()
    }
}
