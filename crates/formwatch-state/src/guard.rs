//! # Navigation Guard
//!
//! The page-level "leave this page?" interceptor. A page has exactly one,
//! shared by every watch session on it through [`SharedGuard`].
//!
//! ## Policies
//!
//! - [`ArbitratedGuard`] keeps one arm request per session and stays
//!   armed while any session is armed. A disarm from session B never
//!   cancels session A's warning.
//! - [`SingleSlotGuard`] keeps a single handler slot. Arming an occupied
//!   slot is a no-op and any disarm empties it, so session B can silently
//!   cancel session A's warning. Kept for pages that rely on that
//!   behaviour.
//!
//! ## Firing
//!
//! [`navigate_away`] asks the guard for its prompt, releases the borrow,
//! runs the registered `on_unload` callbacks, and returns the prompt text.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use formwatch_core::SessionId;

use crate::hooks::Callback;

/// The process-wide guard handle shared by all sessions on a page.
pub type SharedGuard = Rc<RefCell<dyn NavigationGuard>>;

/// Wrap a guard for sharing between sessions.
pub fn shared<G: NavigationGuard + 'static>(guard: G) -> SharedGuard {
    Rc::new(RefCell::new(guard))
}

/// Interceptor for navigate-away attempts.
pub trait NavigationGuard: std::fmt::Debug {
    /// Register `owner`'s request to prompt with `prompt`, calling
    /// `on_unload` when the prompt fires.
    fn arm(&mut self, owner: SessionId, prompt: &str, on_unload: Callback);

    /// Withdraw `owner`'s request.
    fn disarm(&mut self, owner: SessionId);

    /// Whether leaving the page would currently prompt.
    fn is_armed(&self) -> bool;

    /// Whether `owner`'s request is currently in effect.
    fn is_armed_by(&self, owner: SessionId) -> bool;

    /// The prompt that would fire now, with the callbacks to run first.
    fn pending_prompt(&self) -> Option<UnloadPrompt>;

    /// Which policy this guard implements.
    fn policy(&self) -> GuardPolicy;
}

/// Guard policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardPolicy {
    /// One arm request per session; armed while any session is.
    #[default]
    Arbitrated,
    /// A single shared slot; any disarm clears it.
    SingleSlot,
}

impl GuardPolicy {
    /// Construct a fresh shared guard for this policy.
    pub fn build(self) -> SharedGuard {
        match self {
            Self::Arbitrated => shared(ArbitratedGuard::default()),
            Self::SingleSlot => shared(SingleSlotGuard::default()),
        }
    }
}

impl std::fmt::Display for GuardPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Arbitrated => "arbitrated",
            Self::SingleSlot => "single-slot",
        })
    }
}

/// What firing the guard would do.
#[derive(Clone)]
pub struct UnloadPrompt {
    /// Confirmation text returned to the host.
    pub message: String,
    /// Callbacks run before the text is returned, in order.
    pub callbacks: Vec<Callback>,
}

impl std::fmt::Debug for UnloadPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadPrompt")
            .field("message", &self.message)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Simulate a navigate-away attempt against `guard`.
///
/// Returns the confirmation text when the guard is armed, after running
/// the registered `on_unload` callbacks.
pub fn navigate_away(guard: &SharedGuard) -> Option<String> {
    let prompt = guard.borrow().pending_prompt()?;
    tracing::debug!(callbacks = prompt.callbacks.len(), "navigation guard fired");
    for callback in &prompt.callbacks {
        callback();
    }
    Some(prompt.message)
}

#[derive(Clone)]
struct UnloadHandler {
    owner: SessionId,
    prompt: String,
    on_unload: Callback,
}

impl std::fmt::Debug for UnloadHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadHandler")
            .field("owner", &self.owner)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

// ─── Single slot ─────────────────────────────────────────────────────

/// One handler slot for the whole page.
#[derive(Debug, Default)]
pub struct SingleSlotGuard {
    slot: Option<UnloadHandler>,
}

impl SingleSlotGuard {
    /// The session whose handler currently occupies the slot.
    pub fn owner(&self) -> Option<SessionId> {
        self.slot.as_ref().map(|h| h.owner)
    }
}

impl NavigationGuard for SingleSlotGuard {
    fn arm(&mut self, owner: SessionId, prompt: &str, on_unload: Callback) {
        if let Some(existing) = &self.slot {
            tracing::trace!(%owner, holder = %existing.owner, "guard already armed");
            return;
        }
        self.slot = Some(UnloadHandler {
            owner,
            prompt: prompt.to_string(),
            on_unload,
        });
    }

    fn disarm(&mut self, owner: SessionId) {
        if let Some(handler) = self.slot.take() {
            if handler.owner != owner {
                tracing::warn!(
                    %owner,
                    holder = %handler.owner,
                    "disarm cancels a warning armed by another session"
                );
            }
        }
    }

    fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    fn is_armed_by(&self, owner: SessionId) -> bool {
        self.owner() == Some(owner)
    }

    fn pending_prompt(&self) -> Option<UnloadPrompt> {
        self.slot.as_ref().map(|h| UnloadPrompt {
            message: h.prompt.clone(),
            callbacks: vec![h.on_unload.clone()],
        })
    }

    fn policy(&self) -> GuardPolicy {
        GuardPolicy::SingleSlot
    }
}

// ─── Arbitrated ──────────────────────────────────────────────────────

/// Per-session arm requests, OR-aggregated.
#[derive(Debug, Default)]
pub struct ArbitratedGuard {
    handlers: Vec<UnloadHandler>,
}

impl ArbitratedGuard {
    /// Number of sessions currently holding an arm request.
    pub fn armed_sessions(&self) -> usize {
        self.handlers.len()
    }
}

impl NavigationGuard for ArbitratedGuard {
    fn arm(&mut self, owner: SessionId, prompt: &str, on_unload: Callback) {
        if self.is_armed_by(owner) {
            return;
        }
        self.handlers.push(UnloadHandler {
            owner,
            prompt: prompt.to_string(),
            on_unload,
        });
        tracing::trace!(%owner, armed = self.handlers.len(), "arm request registered");
    }

    fn disarm(&mut self, owner: SessionId) {
        self.handlers.retain(|h| h.owner != owner);
    }

    fn is_armed(&self) -> bool {
        !self.handlers.is_empty()
    }

    fn is_armed_by(&self, owner: SessionId) -> bool {
        self.handlers.iter().any(|h| h.owner == owner)
    }

    fn pending_prompt(&self) -> Option<UnloadPrompt> {
        let first = self.handlers.first()?;
        Some(UnloadPrompt {
            message: first.prompt.clone(),
            callbacks: self.handlers.iter().map(|h| h.on_unload.clone()).collect(),
        })
    }

    fn policy(&self) -> GuardPolicy {
        GuardPolicy::Arbitrated
    }
}
