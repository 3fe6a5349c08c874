//! # Status Presentation
//!
//! The watcher tells a [`StatusPresenter`] one of two things after every
//! state update: "dirty, with this text" or "saved". Presenters are
//! stateless apart from what they render, and every command must be
//! safe to repeat.

use serde::Serialize;

use formwatch_core::{Configuration, Selector};

/// The elements a presenter renders into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenterTargets {
    /// Element showing the dirty status text.
    pub status: Selector,
    /// Element hidden while dirty and shown while clean.
    pub saved: Selector,
}

impl PresenterTargets {
    /// Targets from a resolved configuration.
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            status: config.status_selector.clone(),
            saved: config.saved_selector.clone(),
        }
    }
}

/// Renders dirty/saved status for a session.
pub trait StatusPresenter {
    /// Called once when the session is bound to its region.
    fn bind(&mut self, _targets: &PresenterTargets) {}

    /// Show the status element with `text` and hide the saved message.
    fn show_dirty(&mut self, text: &str);

    /// Hide the status element and show the saved message.
    fn show_saved(&mut self);
}

/// Presenter that renders nothing. Used by inert watchers and hosts
/// without status elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl StatusPresenter for NullPresenter {
    fn show_dirty(&mut self, _text: &str) {}
    fn show_saved(&mut self) {}
}

/// Rendered state of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ElementView {
    /// Whether the element is shown.
    pub visible: bool,
    /// Current text content, if any was set.
    pub text: Option<String>,
}

/// In-memory presenter tracking visibility and text of the status and
/// saved elements.
///
/// Both elements start hidden. `toggles` counts effective changes only,
/// so a repeated command leaves it untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VisibilityPresenter {
    targets: Option<PresenterTargets>,
    status: ElementView,
    saved: ElementView,
    commands: usize,
    toggles: usize,
}

impl VisibilityPresenter {
    /// A presenter with both elements hidden.
    pub fn new() -> Self {
        Self::default()
    }

    /// The targets received at bind time.
    pub fn targets(&self) -> Option<&PresenterTargets> {
        self.targets.as_ref()
    }

    /// Rendered status element.
    pub fn status(&self) -> &ElementView {
        &self.status
    }

    /// Rendered saved-message element.
    pub fn saved(&self) -> &ElementView {
        &self.saved
    }

    /// Commands received.
    pub fn commands(&self) -> usize {
        self.commands
    }

    /// Effective visibility/text changes applied.
    pub fn toggles(&self) -> usize {
        self.toggles
    }

    fn apply(view: &mut ElementView, visible: bool, text: Option<&str>) -> usize {
        let mut changed = 0;
        if view.visible != visible {
            view.visible = visible;
            changed += 1;
        }
        if let Some(text) = text {
            if view.text.as_deref() != Some(text) {
                view.text = Some(text.to_string());
                changed += 1;
            }
        }
        changed
    }
}

impl StatusPresenter for VisibilityPresenter {
    fn bind(&mut self, targets: &PresenterTargets) {
        self.targets = Some(targets.clone());
    }

    fn show_dirty(&mut self, text: &str) {
        self.commands += 1;
        self.toggles += Self::apply(&mut self.status, true, Some(text));
        self.toggles += Self::apply(&mut self.saved, false, None);
    }

    fn show_saved(&mut self) {
        self.commands += 1;
        self.toggles += Self::apply(&mut self.status, false, None);
        self.toggles += Self::apply(&mut self.saved, true, None);
    }
}
