//! # Change Watcher State Machine
//!
//! Tracks unsaved edits within one region and keeps the shared navigation
//! guard in step with them.
//!
//! ## States
//!
//! - `Clean` → no change since the last reset.
//! - `DirtyWarned` → changes exist; the last mutated field was not an
//!   exception, so the guard is armed.
//! - `DirtyExcepted` → changes exist, but the last mutated field matched
//!   the exception selector, so the guard is disarmed.
//!
//! ## Transitions
//!
//! ```text
//!            field mutation (non-exception)
//!   Clean ────────────────────────────────▶ DirtyWarned
//!     ▲                                       │     ▲
//!     │                exception mutation ────┘     │ non-exception mutation
//!     │                                       ▼     │
//!     └──── set_dirty(false) ─────────── DirtyExcepted
//!
//!   set_dirty(true) → DirtyWarned from any state
//!   submit intent   → guard disarmed, state unchanged
//! ```
//!
//! ## Invariants
//!
//! - `is_exception` is recomputed from each event's target alone.
//! - `has_changes` is monotonic under field mutations; only
//!   `set_dirty(false)` clears it.
//! - After any state update the guard is armed for this session iff
//!   `has_changes && !is_exception`. Submit intent disarms without a
//!   state update.
//! - Ignored fields change nothing at all.
//!
//! A watcher built over a selector that matches no region is inert:
//! every operation is a no-op. Tearing a watcher down (or dropping it)
//! withdraws its arm request and leaves it inert.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use formwatch_core::{Configuration, Document, Element, Options, Selector, SessionId, Timestamp};

use crate::events::{Propagation, RegionEvent, RegionEventSource, Subscription};
use crate::guard::SharedGuard;
use crate::hooks::Hooks;
use crate::presenter::{PresenterTargets, StatusPresenter};

// ─── State ───────────────────────────────────────────────────────────

/// Derived state of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchState {
    /// No unsaved changes.
    Clean,
    /// Unsaved changes; guard armed.
    DirtyWarned,
    /// Unsaved changes; last field was an exception, guard disarmed.
    DirtyExcepted,
}

impl WatchState {
    /// Derive the state from the session flags.
    pub fn from_flags(has_changes: bool, is_exception: bool) -> Self {
        match (has_changes, is_exception) {
            (false, _) => Self::Clean,
            (true, false) => Self::DirtyWarned,
            (true, true) => Self::DirtyExcepted,
        }
    }

    /// Returns the canonical state name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clean => "CLEAN",
            Self::DirtyWarned => "DIRTY_WARNED",
            Self::DirtyExcepted => "DIRTY_EXCEPTED",
        }
    }

    /// Whether unsaved changes exist.
    pub fn is_dirty(&self) -> bool {
        !matches!(self, Self::Clean)
    }
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Transition Record ───────────────────────────────────────────────

/// What caused a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// A field in the region emitted a mutation event.
    FieldMutation,
    /// The caller overrode the dirty flag.
    SetDirty,
}

/// Record of a single state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before the change.
    pub from_state: WatchState,
    /// State after the change.
    pub to_state: WatchState,
    /// What caused it.
    pub cause: TransitionCause,
    /// The mutated element, for field mutations.
    pub target: Option<String>,
    /// When it happened (UTC).
    pub timestamp: Timestamp,
}

// ─── Session ─────────────────────────────────────────────────────────

/// Per-region state owned by an active watcher.
#[derive(Debug)]
pub struct WatchSession {
    id: SessionId,
    region: Element,
    config: Configuration,
    hooks: Hooks,
    has_changes: bool,
    is_exception: bool,
    transition_log: Vec<TransitionRecord>,
}

impl WatchSession {
    fn new(region: Element, config: Configuration, hooks: Hooks) -> Self {
        Self {
            id: SessionId::new(),
            region,
            config,
            hooks,
            has_changes: false,
            is_exception: false,
            transition_log: Vec::new(),
        }
    }

    fn state(&self) -> WatchState {
        WatchState::from_flags(self.has_changes, self.is_exception)
    }

    fn record(&mut self, from: WatchState, cause: TransitionCause, target: Option<&Element>) {
        let to = self.state();
        if from == to {
            return;
        }
        tracing::debug!(session = %self.id, %from, %to, ?cause, "watch state transition");
        self.transition_log.push(TransitionRecord {
            from_state: from,
            to_state: to,
            cause,
            target: target.map(Element::to_string),
            timestamp: Timestamp::now(),
        });
    }
}

/// Serializable view of a watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier; `None` for inert watchers.
    pub session_id: Option<SessionId>,
    /// The bound region, rendered as `tag#id.class`.
    pub region: Option<String>,
    /// Whether the watcher is inert.
    pub inert: bool,
    /// Current derived state.
    pub state: Option<WatchState>,
    /// Unsaved changes exist.
    pub has_changes: bool,
    /// The last mutated field was an exception.
    pub is_exception: bool,
    /// This session's arm request is in effect on the guard.
    pub guard_armed: bool,
    /// Number of recorded state changes.
    pub transitions: usize,
}

// ─── The Watcher ─────────────────────────────────────────────────────

/// Watches one region for unsaved changes.
#[derive(Debug)]
pub struct ChangeWatcher<P: StatusPresenter> {
    session: Option<WatchSession>,
    guard: SharedGuard,
    presenter: P,
}

impl<P: StatusPresenter> ChangeWatcher<P> {
    /// Bind a watcher to the first element of `document` matching
    /// `region_selector`.
    ///
    /// Options resolve as declarative region attributes over `options`
    /// over defaults. If the selector is malformed or matches nothing
    /// the watcher is inert.
    pub fn initialize(
        document: &Document,
        region_selector: &str,
        options: &Options,
        hooks: Hooks,
        guard: SharedGuard,
        presenter: P,
    ) -> Self {
        let region = match Selector::parse(region_selector) {
            Ok(selector) => document.select_first(&selector),
            Err(e) => {
                tracing::warn!(selector = region_selector, error = %e, "region selector is malformed");
                None
            }
        };
        match region {
            Some(region) => Self::bind(region, options, hooks, guard, presenter),
            None => {
                tracing::debug!(selector = region_selector, "no region matched; watcher is inert");
                Self::inert(guard, presenter)
            }
        }
    }

    /// One watcher per element of `document` matching `region_selector`,
    /// each with a presenter from `make_presenter`. Empty when nothing
    /// matches.
    pub fn initialize_all(
        document: &Document,
        region_selector: &str,
        options: &Options,
        hooks: &Hooks,
        guard: &SharedGuard,
        mut make_presenter: impl FnMut(&Element) -> P,
    ) -> Vec<Self> {
        let selector = match Selector::parse(region_selector) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!(selector = region_selector, error = %e, "region selector is malformed");
                return Vec::new();
            }
        };
        document
            .select_all(&selector)
            .into_iter()
            .map(|region| {
                let presenter = make_presenter(region);
                Self::bind(region, options, hooks.clone(), guard.clone(), presenter)
            })
            .collect()
    }

    /// Bind a watcher to an explicit region element.
    pub fn bind(
        region: &Element,
        options: &Options,
        hooks: Hooks,
        guard: SharedGuard,
        mut presenter: P,
    ) -> Self {
        let declarative = Options::from_declarative(region);
        let config = Configuration::resolve(options, &declarative);
        presenter.bind(&PresenterTargets::from_config(&config));

        let session = WatchSession::new(region.clone(), config, hooks);
        tracing::info!(session = %session.id, region = %region, "watching region for changes");
        Self {
            session: Some(session),
            guard,
            presenter,
        }
    }

    /// A watcher with no region. Every operation is a no-op.
    pub fn inert(guard: SharedGuard, presenter: P) -> Self {
        Self {
            session: None,
            guard,
            presenter,
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    /// A submit-intent element was activated: disarm the guard and stop
    /// propagation. Dirty state is left as is.
    pub fn on_submit_intent(&mut self, target: &Element) -> Propagation {
        let Some(session) = self.session.as_mut() else {
            return Propagation::Continue;
        };
        tracing::debug!(session = %session.id, %target, "submit intent; disarming guard");
        disarm(session, &self.guard);
        Propagation::Stop
    }

    /// A field in the region emitted a keyup/change/input event.
    pub fn on_field_mutation(&mut self, target: &Element) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.config.ignored.matches(target) {
            tracing::trace!(session = %session.id, %target, "ignored field");
            return;
        }

        let before = session.state();
        session.is_exception = session.config.exceptions.matches(target);
        if !session.is_exception {
            session.has_changes = true;
        }
        session.record(before, TransitionCause::FieldMutation, Some(target));
        self.refresh();
    }

    /// Override the dirty flag, e.g. after an asynchronous save.
    ///
    /// Clears the transient exception flag, so `true` arms the guard and
    /// `false` disarms it.
    pub fn set_dirty(&mut self, state: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let before = session.state();
        session.has_changes = state;
        session.is_exception = false;
        session.record(before, TransitionCause::SetDirty, None);
        self.refresh();
    }

    /// Route a region event to the matching operation.
    ///
    /// Clicks on submit-intent elements disarm and stop propagation.
    /// Mutation events on input-capable elements update state. Anything
    /// else passes through.
    pub fn handle_event(&mut self, event: &RegionEvent) -> Propagation {
        let Some(session) = self.session.as_ref() else {
            return Propagation::Continue;
        };
        if event.kind.is_mutation() {
            if event.target.is_input_capable() {
                self.on_field_mutation(&event.target);
            }
            Propagation::Continue
        } else if session.config.submit_selector.matches(&event.target) {
            self.on_submit_intent(&event.target)
        } else {
            Propagation::Continue
        }
    }

    /// Subscribe a shared watcher to `source`.
    ///
    /// The listener holds a weak reference; once the watcher is dropped
    /// it lets events pass.
    pub fn subscribe(watcher: &Rc<RefCell<Self>>, source: &mut RegionEventSource) -> Subscription
    where
        P: 'static,
    {
        let weak: Weak<RefCell<Self>> = Rc::downgrade(watcher);
        source.subscribe(Box::new(move |event| match weak.upgrade() {
            Some(watcher) => {
                let mut watcher = watcher.borrow_mut();
                watcher.handle_event(event)
            }
            None => Propagation::Continue,
        }))
    }

    /// Withdraw this session from the guard and go inert.
    ///
    /// `on_unset_alert` fires if the session's request was in effect.
    /// Called on drop.
    pub fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if self.guard.borrow().is_armed_by(session.id) {
            disarm(&mut session, &self.guard);
        }
        tracing::debug!(session = %session.id, "watcher torn down");
    }

    fn refresh(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.has_changes {
            self.presenter.show_dirty(&session.config.status_message);
        } else {
            self.presenter.show_saved();
        }
        if session.has_changes && !session.is_exception {
            arm(session, &self.guard);
        } else {
            disarm(session, &self.guard);
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Whether the watcher has no region.
    pub fn is_inert(&self) -> bool {
        self.session.is_none()
    }

    /// Session identifier, if active.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// The bound region element.
    pub fn region(&self) -> Option<&Element> {
        self.session.as_ref().map(|s| &s.region)
    }

    /// Resolved configuration, if active.
    pub fn config(&self) -> Option<&Configuration> {
        self.session.as_ref().map(|s| &s.config)
    }

    /// Unsaved changes exist.
    pub fn has_changes(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.has_changes)
    }

    /// The last mutated field matched the exception selector.
    pub fn is_exception(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_exception)
    }

    /// This session's arm request is in effect on the guard.
    ///
    /// Read from the guard, so under the single-slot policy it turns false
    /// once another session empties the slot.
    pub fn is_guard_armed(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| self.guard.borrow().is_armed_by(s.id))
    }

    /// Current derived state, if active.
    pub fn state(&self) -> Option<WatchState> {
        self.session.as_ref().map(WatchSession::state)
    }

    /// Recorded state changes.
    pub fn transition_log(&self) -> &[TransitionRecord] {
        self.session
            .as_ref()
            .map(|s| s.transition_log.as_slice())
            .unwrap_or_default()
    }

    /// The shared guard.
    pub fn guard(&self) -> &SharedGuard {
        &self.guard
    }

    /// The presenter.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Serializable summary.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id(),
            region: self.region().map(Element::to_string),
            inert: self.is_inert(),
            state: self.state(),
            has_changes: self.has_changes(),
            is_exception: self.is_exception(),
            guard_armed: self.is_guard_armed(),
            transitions: self.transition_log().len(),
        }
    }
}

fn arm(session: &mut WatchSession, guard: &SharedGuard) {
    session.hooks.fire_set_alert();
    guard.borrow_mut().arm(
        session.id,
        &session.config.alert_message,
        session.hooks.unload_callback(),
    );
}

fn disarm(session: &mut WatchSession, guard: &SharedGuard) {
    session.hooks.fire_unset_alert();
    guard.borrow_mut().disarm(session.id);
}

impl<P: StatusPresenter> Drop for ChangeWatcher<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::guard::{navigate_away, GuardPolicy, NavigationGuard, UnloadPrompt};
    use crate::hooks::Callback;
    use crate::presenter::{NullPresenter, VisibilityPresenter};
    use formwatch_core::config::{DEFAULT_ALERT_MESSAGE, DEFAULT_STATUS_MESSAGE};
    use formwatch_core::OptionKey;

    fn name_input() -> Element {
        Element::new("input").with_attr("id", "name").with_attr("type", "text")
    }

    fn submit_button() -> Element {
        Element::new("button").with_attr("type", "submit")
    }

    fn data_submit_field() -> Element {
        Element::new("input").with_attr("id", "token").with_attr("data-submit", "")
    }

    fn ignored_field() -> Element {
        Element::new("input").with_attr("id", "search").with_attr("data-ignore-changes", "")
    }

    fn form() -> Element {
        Element::new("form")
            .with_attr("class", "js-watch-changes")
            .with_child(name_input())
            .with_child(data_submit_field())
            .with_child(ignored_field())
            .with_child(submit_button())
    }

    fn page() -> Document {
        Document::new(Element::new("body").with_child(form()))
    }

    fn watcher(guard: &SharedGuard) -> ChangeWatcher<VisibilityPresenter> {
        ChangeWatcher::initialize(
            &page(),
            ".js-watch-changes",
            &Options::default(),
            Hooks::new(),
            guard.clone(),
            VisibilityPresenter::new(),
        )
    }

    fn armed(guard: &SharedGuard) -> bool {
        guard.borrow().is_armed()
    }

    // ── Initialization ───────────────────────────────────────────────

    #[test]
    fn initial_state_is_clean() {
        let guard = GuardPolicy::Arbitrated.build();
        let w = watcher(&guard);
        assert!(!w.is_inert());
        assert_eq!(w.state(), Some(WatchState::Clean));
        assert!(!w.has_changes());
        assert!(!armed(&guard));
        assert_eq!(w.presenter().commands(), 0);
        assert_eq!(w.region().unwrap().tag, "form");
    }

    #[test]
    fn declarative_attributes_override_explicit_options() {
        let doc = Document::new(
            Element::new("body").with_child(
                Element::new("form")
                    .with_attr("id", "f")
                    .with_attr("data-status-message", "From markup"),
            ),
        );
        let explicit = Options::default()
            .with(OptionKey::StatusMessage, "From code")
            .with(OptionKey::AlertMessage, "Leave?");
        let w = ChangeWatcher::initialize(
            &doc,
            "#f",
            &explicit,
            Hooks::new(),
            GuardPolicy::Arbitrated.build(),
            NullPresenter,
        );
        let config = w.config().unwrap();
        assert_eq!(config.status_message, "From markup");
        assert_eq!(config.alert_message, "Leave?");
    }

    #[test]
    fn presenter_is_bound_to_configured_targets() {
        let w = watcher(&GuardPolicy::Arbitrated.build());
        let targets = w.presenter().targets().unwrap();
        assert_eq!(targets.status.as_str(), ".js-watch-changes-status");
        assert_eq!(targets.saved.as_str(), ".js-watch-changes-saved");
    }

    #[test]
    fn initialize_all_creates_one_watcher_per_region() {
        let doc = Document::new(
            Element::new("body")
                .with_child(Element::new("form").with_attr("class", "watch").with_attr("id", "a"))
                .with_child(Element::new("form").with_attr("class", "watch").with_attr("id", "b")),
        );
        let guard = GuardPolicy::Arbitrated.build();
        let watchers = ChangeWatcher::initialize_all(
            &doc,
            ".watch",
            &Options::default(),
            &Hooks::new(),
            &guard,
            |_| VisibilityPresenter::new(),
        );
        assert_eq!(watchers.len(), 2);
        assert_ne!(watchers[0].session_id(), watchers[1].session_id());
        assert!(ChangeWatcher::initialize_all(
            &doc,
            ".nothing",
            &Options::default(),
            &Hooks::new(),
            &guard,
            |_| NullPresenter,
        )
        .is_empty());
    }

    // ── Scenario A: typing then submitting ───────────────────────────

    #[test]
    fn typing_arms_guard_and_submit_disarms_without_cleaning() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);

        w.on_field_mutation(&name_input());
        assert!(w.has_changes());
        assert!(armed(&guard));
        assert_eq!(w.state(), Some(WatchState::DirtyWarned));
        assert!(w.presenter().status().visible);
        assert_eq!(w.presenter().status().text.as_deref(), Some(DEFAULT_STATUS_MESSAGE));
        assert!(!w.presenter().saved().visible);

        let status_before = w.presenter().status().clone();
        assert_eq!(w.on_submit_intent(&submit_button()), Propagation::Stop);
        assert!(!armed(&guard));
        assert!(w.has_changes());
        assert_eq!(w.presenter().status(), &status_before);
    }

    // ── Scenario B: exception field ──────────────────────────────────

    #[test]
    fn exception_field_keeps_guard_disarmed() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);

        w.on_field_mutation(&data_submit_field());
        assert!(w.is_exception());
        assert!(!w.has_changes());
        assert!(!armed(&guard));
        assert_eq!(w.state(), Some(WatchState::Clean));
        // Presenter still follows has_changes.
        assert!(w.presenter().saved().visible);
        assert!(!w.presenter().status().visible);
    }

    #[test]
    fn exception_after_changes_disarms_while_dirty() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);

        w.on_field_mutation(&name_input());
        assert!(armed(&guard));
        w.on_field_mutation(&data_submit_field());
        assert!(w.has_changes());
        assert!(!armed(&guard));
        assert_eq!(w.state(), Some(WatchState::DirtyExcepted));
        assert!(w.presenter().status().visible);

        // Exception status is not carried over to the next event.
        w.on_field_mutation(&name_input());
        assert!(!w.is_exception());
        assert!(armed(&guard));
        assert_eq!(w.state(), Some(WatchState::DirtyWarned));
    }

    // ── Scenario C: inert watcher ────────────────────────────────────

    #[test]
    fn unmatched_region_yields_inert_watcher() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = ChangeWatcher::initialize(
            &page(),
            "#does-not-exist",
            &Options::default(),
            Hooks::new(),
            guard.clone(),
            VisibilityPresenter::new(),
        );
        assert!(w.is_inert());

        w.on_field_mutation(&name_input());
        assert_eq!(w.on_submit_intent(&submit_button()), Propagation::Continue);
        w.set_dirty(true);
        let ev = RegionEvent::new(EventKind::KeyUp, name_input());
        assert_eq!(w.handle_event(&ev), Propagation::Continue);

        assert!(!w.has_changes());
        assert!(w.state().is_none());
        assert!(w.transition_log().is_empty());
        assert!(!armed(&guard));
        assert_eq!(w.presenter().commands(), 0);
        assert!(w.snapshot().inert);
    }

    #[test]
    fn malformed_region_selector_yields_inert_watcher() {
        let w = ChangeWatcher::initialize(
            &page(),
            "form >",
            &Options::default(),
            Hooks::new(),
            GuardPolicy::Arbitrated.build(),
            NullPresenter,
        );
        assert!(w.is_inert());
    }

    // ── Scenario D: explicit reset ───────────────────────────────────

    #[test]
    fn set_dirty_false_resets_presentation_and_disarms() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);
        w.on_field_mutation(&name_input());
        assert!(armed(&guard));

        w.set_dirty(false);
        assert_eq!(w.state(), Some(WatchState::Clean));
        assert!(!armed(&guard));
        assert!(!w.presenter().status().visible);
        assert!(w.presenter().saved().visible);
    }

    #[test]
    fn set_dirty_true_arms_even_after_exception() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);
        w.on_field_mutation(&data_submit_field());
        w.set_dirty(true);
        assert_eq!(w.state(), Some(WatchState::DirtyWarned));
        assert!(!w.is_exception());
        assert!(armed(&guard));
        assert!(w.presenter().status().visible);
    }

    // ── Ignored fields ───────────────────────────────────────────────

    #[test]
    fn ignored_field_changes_nothing() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);

        w.on_field_mutation(&data_submit_field());
        w.on_field_mutation(&ignored_field());
        assert!(w.is_exception(), "ignored field must not recompute is_exception");
        assert!(!w.has_changes());
        assert_eq!(w.presenter().commands(), 1);

        w.on_field_mutation(&name_input());
        let log_len = w.transition_log().len();
        w.on_field_mutation(&ignored_field());
        assert!(w.has_changes());
        assert!(armed(&guard));
        assert_eq!(w.transition_log().len(), log_len);
    }

    // ── Submit intent ────────────────────────────────────────────────

    #[test]
    fn submit_intent_disarms_from_any_state() {
        for setup in [0, 1, 2] {
            let guard = GuardPolicy::Arbitrated.build();
            let mut w = watcher(&guard);
            match setup {
                0 => {}
                1 => w.on_field_mutation(&name_input()),
                _ => {
                    w.on_field_mutation(&name_input());
                    w.on_field_mutation(&data_submit_field());
                }
            }
            let state = w.state();
            w.on_submit_intent(&submit_button());
            assert!(!armed(&guard));
            assert!(!w.is_guard_armed());
            assert_eq!(w.state(), state);
        }
    }

    // ── Event routing ────────────────────────────────────────────────

    #[test]
    fn handle_event_routes_by_kind_and_target() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);

        let click_name = RegionEvent::new(EventKind::Click, name_input());
        assert_eq!(w.handle_event(&click_name), Propagation::Continue);
        assert!(!w.has_changes());

        let label = Element::new("span").with_attr("id", "label");
        assert_eq!(
            w.handle_event(&RegionEvent::new(EventKind::KeyUp, label)),
            Propagation::Continue
        );
        assert!(!w.has_changes());

        w.handle_event(&RegionEvent::new(EventKind::Change, name_input()));
        assert!(w.has_changes());
        assert!(armed(&guard));

        let click_submit = RegionEvent::new(EventKind::Click, submit_button());
        assert_eq!(w.handle_event(&click_submit), Propagation::Stop);
        assert!(!armed(&guard));
    }

    #[test]
    fn subscription_delivers_events_until_unsubscribed() {
        let guard = GuardPolicy::Arbitrated.build();
        let w = Rc::new(RefCell::new(watcher(&guard)));
        let mut source = RegionEventSource::new(form());
        let sub = ChangeWatcher::subscribe(&w, &mut source);

        source.dispatch(&RegionEvent::new(EventKind::KeyUp, name_input()));
        assert!(w.borrow().has_changes());

        assert_eq!(
            source.dispatch(&RegionEvent::new(EventKind::Click, submit_button())),
            Propagation::Stop
        );
        assert!(!armed(&guard));

        assert!(source.unsubscribe(sub));
        source.dispatch(&RegionEvent::new(EventKind::KeyUp, name_input()));
        assert!(!armed(&guard));
    }

    #[test]
    fn dropped_watcher_lets_events_pass() {
        let guard = GuardPolicy::Arbitrated.build();
        let w = Rc::new(RefCell::new(watcher(&guard)));
        let mut source = RegionEventSource::new(form());
        ChangeWatcher::subscribe(&w, &mut source);
        drop(w);
        let result = source.dispatch(&RegionEvent::new(EventKind::Click, submit_button()));
        assert_eq!(result, Propagation::Continue);
    }

    // ── Hooks ────────────────────────────────────────────────────────

    #[derive(Debug)]
    struct LoggingGuard {
        log: Rc<RefCell<Vec<String>>>,
        armed: bool,
    }

    impl NavigationGuard for LoggingGuard {
        fn arm(&mut self, _owner: SessionId, _prompt: &str, _on_unload: Callback) {
            self.log.borrow_mut().push("guard.arm".into());
            self.armed = true;
        }
        fn disarm(&mut self, _owner: SessionId) {
            self.log.borrow_mut().push("guard.disarm".into());
            self.armed = false;
        }
        fn is_armed(&self) -> bool {
            self.armed
        }
        fn is_armed_by(&self, _owner: SessionId) -> bool {
            self.armed
        }
        fn pending_prompt(&self) -> Option<UnloadPrompt> {
            None
        }
        fn policy(&self) -> GuardPolicy {
            GuardPolicy::SingleSlot
        }
    }

    #[test]
    fn hooks_fire_before_guard_effect() {
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let guard: SharedGuard = Rc::new(RefCell::new(LoggingGuard {
            log: log.clone(),
            armed: false,
        }));
        let (l1, l2) = (log.clone(), log.clone());
        let hooks = Hooks::new()
            .on_set_alert(move || l1.borrow_mut().push("hook.set_alert".into()))
            .on_unset_alert(move || l2.borrow_mut().push("hook.unset_alert".into()));
        let mut w = ChangeWatcher::initialize(
            &page(),
            "form",
            &Options::default(),
            hooks,
            guard,
            NullPresenter,
        );

        w.on_field_mutation(&name_input());
        w.on_submit_intent(&submit_button());
        assert_eq!(
            *log.borrow(),
            vec!["hook.set_alert", "guard.arm", "hook.unset_alert", "guard.disarm"]
        );
    }

    #[test]
    fn on_unload_fires_when_prompt_fires() {
        let guard = GuardPolicy::SingleSlot.build();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        let mut w = ChangeWatcher::initialize(
            &page(),
            "form",
            &Options::default(),
            Hooks::new().on_unload(move || *f.borrow_mut() += 1),
            guard.clone(),
            NullPresenter,
        );
        assert!(navigate_away(&guard).is_none());
        w.on_field_mutation(&name_input());
        assert_eq!(navigate_away(&guard).as_deref(), Some(DEFAULT_ALERT_MESSAGE));
        assert_eq!(*fired.borrow(), 1);
    }

    // ── Shared guard between sessions ────────────────────────────────

    fn two_forms() -> Document {
        Document::new(
            Element::new("body")
                .with_child(
                    Element::new("form")
                        .with_attr("id", "a")
                        .with_child(Element::new("input").with_attr("id", "a-name")),
                )
                .with_child(
                    Element::new("form")
                        .with_attr("id", "b")
                        .with_child(Element::new("input").with_attr("id", "b-name"))
                        .with_child(submit_button()),
                ),
        )
    }

    fn pair(policy: GuardPolicy) -> (SharedGuard, ChangeWatcher<NullPresenter>, ChangeWatcher<NullPresenter>) {
        let guard = policy.build();
        let doc = two_forms();
        let a = ChangeWatcher::initialize(&doc, "#a", &Options::default(), Hooks::new(), guard.clone(), NullPresenter);
        let b = ChangeWatcher::initialize(&doc, "#b", &Options::default(), Hooks::new(), guard.clone(), NullPresenter);
        (guard, a, b)
    }

    #[test]
    fn arbitrated_guard_keeps_other_sessions_warning() {
        let (guard, mut a, mut b) = pair(GuardPolicy::Arbitrated);
        a.on_field_mutation(&Element::new("input").with_attr("id", "a-name"));
        b.on_submit_intent(&submit_button());
        assert!(armed(&guard));
        assert!(a.is_guard_armed());
    }

    #[test]
    fn single_slot_guard_lets_other_session_cancel_warning() {
        let (guard, mut a, mut b) = pair(GuardPolicy::SingleSlot);
        a.on_field_mutation(&Element::new("input").with_attr("id", "a-name"));
        b.on_submit_intent(&submit_button());
        assert!(!armed(&guard));
        assert!(!a.is_guard_armed());
        assert!(!a.snapshot().guard_armed);
        assert!(a.has_changes());
    }

    #[test]
    fn single_slot_reports_only_the_slot_holder_as_armed() {
        let (guard, mut a, mut b) = pair(GuardPolicy::SingleSlot);
        a.on_field_mutation(&Element::new("input").with_attr("id", "a-name"));
        b.on_field_mutation(&Element::new("input").with_attr("id", "b-name"));
        assert!(armed(&guard));
        assert!(a.is_guard_armed());
        assert!(!b.is_guard_armed());
    }

    // ── Teardown ─────────────────────────────────────────────────────

    #[test]
    fn dropping_an_armed_watcher_releases_the_guard() {
        let guard = GuardPolicy::Arbitrated.build();
        {
            let mut w = watcher(&guard);
            w.on_field_mutation(&name_input());
            assert!(armed(&guard));
        }
        assert!(!armed(&guard));
        assert!(navigate_away(&guard).is_none());
    }

    #[test]
    fn teardown_fires_unset_alert_and_goes_inert() {
        let guard = GuardPolicy::Arbitrated.build();
        let unset = Rc::new(RefCell::new(0));
        let u = unset.clone();
        let mut w = ChangeWatcher::initialize(
            &page(),
            ".js-watch-changes",
            &Options::default(),
            Hooks::new().on_unset_alert(move || *u.borrow_mut() += 1),
            guard.clone(),
            NullPresenter,
        );
        w.on_field_mutation(&name_input());
        w.teardown();
        assert_eq!(*unset.borrow(), 1);
        assert!(w.is_inert());
        assert!(!armed(&guard));

        drop(w);
        assert_eq!(*unset.borrow(), 1);
    }

    #[test]
    fn dropping_one_session_keeps_the_others_warning() {
        let (guard, mut a, mut b) = pair(GuardPolicy::Arbitrated);
        a.on_field_mutation(&Element::new("input").with_attr("id", "a-name"));
        b.on_field_mutation(&Element::new("input").with_attr("id", "b-name"));
        drop(b);
        assert!(armed(&guard));
        assert!(a.is_guard_armed());
    }

    #[test]
    fn dropping_a_session_never_clears_another_sessions_slot() {
        let (guard, mut a, b) = pair(GuardPolicy::SingleSlot);
        a.on_field_mutation(&Element::new("input").with_attr("id", "a-name"));
        drop(b);
        assert!(armed(&guard));
    }

    // ── Transition log ───────────────────────────────────────────────

    #[test]
    fn transition_log_records_state_changes_only() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);
        w.on_field_mutation(&name_input());
        w.on_field_mutation(&name_input());
        w.on_field_mutation(&data_submit_field());
        w.set_dirty(false);

        let log = w.transition_log();
        assert_eq!(log.len(), 3);
        assert_eq!((log[0].from_state, log[0].to_state), (WatchState::Clean, WatchState::DirtyWarned));
        assert_eq!(log[0].cause, TransitionCause::FieldMutation);
        assert_eq!(log[0].target.as_deref(), Some("input#name"));
        assert_eq!(log[1].to_state, WatchState::DirtyExcepted);
        assert_eq!(log[2].to_state, WatchState::Clean);
        assert_eq!(log[2].cause, TransitionCause::SetDirty);
        assert!(log[2].target.is_none());
    }

    #[test]
    fn state_names_and_serde() {
        assert_eq!(WatchState::DirtyWarned.name(), "DIRTY_WARNED");
        assert_eq!(WatchState::Clean.to_string(), "CLEAN");
        let json = serde_json::to_string(&WatchState::DirtyExcepted).unwrap();
        assert_eq!(json, "\"DIRTY_EXCEPTED\"");
        assert!(!WatchState::Clean.is_dirty());
        assert!(WatchState::DirtyExcepted.is_dirty());
    }

    #[test]
    fn snapshot_reflects_session() {
        let guard = GuardPolicy::Arbitrated.build();
        let mut w = watcher(&guard);
        w.on_field_mutation(&name_input());
        let snap = w.snapshot();
        assert!(!snap.inert);
        assert_eq!(snap.state, Some(WatchState::DirtyWarned));
        assert!(snap.has_changes && snap.guard_armed && !snap.is_exception);
        assert_eq!(snap.region.as_deref(), Some("form.js-watch-changes"));
        assert_eq!(snap.transitions, 1);
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["state"], "DIRTY_WARNED");
    }

    // ── Properties ───────────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Step {
            Plain,
            Exception,
            Ignored,
            Submit,
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                Just(Step::Plain),
                Just(Step::Exception),
                Just(Step::Ignored),
                Just(Step::Submit),
            ]
        }

        fn apply(w: &mut ChangeWatcher<VisibilityPresenter>, s: Step) {
            match s {
                Step::Plain => w.on_field_mutation(&name_input()),
                Step::Exception => w.on_field_mutation(&data_submit_field()),
                Step::Ignored => w.on_field_mutation(&ignored_field()),
                Step::Submit => {
                    w.on_submit_intent(&submit_button());
                }
            }
        }

        proptest! {
            /// Once a plain field mutates, has_changes stays true.
            #[test]
            fn dirty_is_monotonic(steps in prop::collection::vec(step(), 0..40)) {
                let guard = GuardPolicy::Arbitrated.build();
                let mut w = watcher(&guard);
                let mut seen_plain = false;
                for s in steps {
                    apply(&mut w, s);
                    seen_plain |= matches!(s, Step::Plain);
                    prop_assert_eq!(w.has_changes(), seen_plain);
                }
            }

            /// Ignored mutations never change has_changes or is_exception.
            #[test]
            fn ignored_is_inert(steps in prop::collection::vec(step(), 0..40)) {
                let guard = GuardPolicy::Arbitrated.build();
                let mut w = watcher(&guard);
                for s in steps {
                    apply(&mut w, s);
                    let before = (w.has_changes(), w.is_exception(), armed(&guard));
                    w.on_field_mutation(&ignored_field());
                    prop_assert_eq!((w.has_changes(), w.is_exception(), armed(&guard)), before);
                }
            }

            /// After a field mutation the guard is armed iff dirty and not excepted.
            #[test]
            fn guard_tracks_state_after_mutation(steps in prop::collection::vec(step(), 1..40)) {
                let guard = GuardPolicy::Arbitrated.build();
                let mut w = watcher(&guard);
                for s in steps {
                    apply(&mut w, s);
                    match s {
                        Step::Plain | Step::Exception => prop_assert_eq!(
                            armed(&guard),
                            w.has_changes() && !w.is_exception()
                        ),
                        Step::Submit => prop_assert!(!armed(&guard)),
                        Step::Ignored => {}
                    }
                }
            }
        }
    }
}
