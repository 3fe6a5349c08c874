//! # formwatch-state: Unsaved-Change Tracking
//!
//! Implements the change watcher: a small state machine that follows
//! input events inside a region, decides whether the page holds unsaved
//! changes, and keeps the page-wide navigation guard in step.
//!
//! ## Components
//!
//! - **Watcher** (`watcher.rs`): `Clean → DirtyWarned ⇄ DirtyExcepted`
//!   with explicit `set_dirty` overrides and submit-intent disarming.
//!
//! - **Guard** (`guard.rs`): the shared navigate-away interceptor, with
//!   an arbitrated per-session policy and the legacy single-slot policy.
//!
//! - **Presenter** (`presenter.rs`): dirty/saved status rendering.
//!
//! - **Events** (`events.rs`): typed region events with subscribe and
//!   unsubscribe.
//!
//! - **Hooks** (`hooks.rs`): `on_set_alert`, `on_unset_alert` and
//!   `on_unload` listeners.
//!
//! ## Threading
//!
//! Everything here is single-threaded. Sessions share the guard through
//! `Rc<RefCell<_>>`, and events are handled synchronously in delivery
//! order.

pub mod events;
pub mod guard;
pub mod hooks;
pub mod presenter;
pub mod watcher;

// ─── Watcher re-exports ─────────────────────────────────────────────

pub use watcher::{
    ChangeWatcher, SessionSnapshot, TransitionCause, TransitionRecord, WatchSession, WatchState,
};

// ─── Guard re-exports ───────────────────────────────────────────────

pub use guard::{
    navigate_away, shared, ArbitratedGuard, GuardPolicy, NavigationGuard, SharedGuard,
    SingleSlotGuard, UnloadPrompt,
};

// ─── Presenter, event and hook re-exports ───────────────────────────

pub use events::{EventKind, Listener, Propagation, RegionEvent, RegionEventSource, Subscription};
pub use hooks::{Callback, Hooks};
pub use presenter::{ElementView, NullPresenter, PresenterTargets, StatusPresenter, VisibilityPresenter};
