//! # Layered Configuration
//!
//! A watcher's configuration is resolved per option from an ordered list
//! of sources:
//!
//! 1. **Declarative**: `data-*` attributes on the region element.
//! 2. **Explicit**: the options passed by the caller.
//! 3. **Defaults**: the constants in this module.
//!
//! Declarative attributes win over explicit options. The order lives in
//! [`SOURCE_PRECEDENCE`] rather than in the shape of a merge call.
//!
//! Selector-valued options are parsed while resolving. A malformed
//! selector from a higher-precedence source is skipped (with a warning)
//! and the next source is consulted. Defaults always parse, so
//! resolution never fails.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::selector::Selector;

/// Status text shown while the region is dirty.
pub const DEFAULT_STATUS_MESSAGE: &str = "There are unsaved changes on this page";

/// Prompt text returned to the navigate-away confirmation.
pub const DEFAULT_ALERT_MESSAGE: &str = "There are unsaved changes on this page. \
If you leave or reload this page now, your changes will be lost. \
Are you sure you want to leave?";

/// Element that renders the dirty status text.
pub const DEFAULT_STATUS_SELECTOR: &str = ".js-watch-changes-status";

/// Element hidden while dirty and shown while clean.
pub const DEFAULT_SAVED_SELECTOR: &str = ".js-watch-changes-saved";

/// Fields whose mutation does not count as a change.
pub const DEFAULT_EXCEPTIONS_SELECTOR: &str = "[type=submit], [data-submit]";

/// Elements whose click disarms the guard outright.
pub const DEFAULT_SUBMIT_SELECTOR: &str = "[type=submit], [data-submit]";

/// Fields excluded from tracking entirely.
pub const DEFAULT_IGNORED_SELECTOR: &str = "[data-ignore-changes]";

/// Where a resolved option value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default constants.
    Defaults,
    /// Options supplied by the caller.
    Explicit,
    /// `data-*` attributes on the region element.
    Declarative,
}

/// Override order, highest precedence first.
pub const SOURCE_PRECEDENCE: [ConfigSource; 3] = [
    ConfigSource::Declarative,
    ConfigSource::Explicit,
    ConfigSource::Defaults,
];

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::Explicit => "explicit",
            Self::Declarative => "declarative",
        })
    }
}

/// The recognized configuration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    /// Dirty status text.
    StatusMessage,
    /// Navigate-away prompt text.
    AlertMessage,
    /// Status element selector.
    StatusSelector,
    /// Saved-message element selector.
    SavedSelector,
    /// Exception field selector.
    Exceptions,
    /// Submit-intent selector.
    SubmitSelector,
    /// Ignored field selector.
    Ignored,
}

impl OptionKey {
    /// Every option, in declaration order.
    pub const ALL: [OptionKey; 7] = [
        Self::StatusMessage,
        Self::AlertMessage,
        Self::StatusSelector,
        Self::SavedSelector,
        Self::Exceptions,
        Self::SubmitSelector,
        Self::Ignored,
    ];

    /// The declarative attribute name on the region element.
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::StatusMessage => "data-status-message",
            Self::AlertMessage => "data-alert-message",
            Self::StatusSelector => "data-status-selector",
            Self::SavedSelector => "data-saved-selector",
            Self::Exceptions => "data-exceptions",
            Self::SubmitSelector => "data-submit-selector",
            Self::Ignored => "data-ignored",
        }
    }

    /// The option read from declarative attribute `name`, if any.
    pub fn from_attribute(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.attribute() == name)
    }

    /// The built-in default value.
    pub fn default_value(&self) -> &'static str {
        match self {
            Self::StatusMessage => DEFAULT_STATUS_MESSAGE,
            Self::AlertMessage => DEFAULT_ALERT_MESSAGE,
            Self::StatusSelector => DEFAULT_STATUS_SELECTOR,
            Self::SavedSelector => DEFAULT_SAVED_SELECTOR,
            Self::Exceptions => DEFAULT_EXCEPTIONS_SELECTOR,
            Self::SubmitSelector => DEFAULT_SUBMIT_SELECTOR,
            Self::Ignored => DEFAULT_IGNORED_SELECTOR,
        }
    }

    /// Whether the option holds a selector (parsed during resolution).
    pub fn is_selector(&self) -> bool {
        !matches!(self, Self::StatusMessage | Self::AlertMessage)
    }
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::StatusMessage => "status_message",
            Self::AlertMessage => "alert_message",
            Self::StatusSelector => "status_selector",
            Self::SavedSelector => "saved_selector",
            Self::Exceptions => "exceptions",
            Self::SubmitSelector => "submit_selector",
            Self::Ignored => "ignored",
        })
    }
}

/// Unresolved options from one source. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    /// Dirty status text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Navigate-away prompt text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_message: Option<String>,
    /// Status element selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_selector: Option<String>,
    /// Saved-message element selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_selector: Option<String>,
    /// Exception field selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceptions: Option<String>,
    /// Submit-intent selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_selector: Option<String>,
    /// Ignored field selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored: Option<String>,
}

impl Options {
    /// Read declarative options from the region element's `data-*` attributes.
    pub fn from_declarative(region: &Element) -> Self {
        let mut options = Self::default();
        for (name, value) in region.data_attributes() {
            match OptionKey::from_attribute(name) {
                Some(key) => options.set(key, value),
                None => tracing::trace!(attribute = name, "not a watcher option"),
            }
        }
        options
    }

    /// The value for `key`, if this source provides one.
    pub fn get(&self, key: OptionKey) -> Option<&str> {
        self.slot(key).as_deref()
    }

    /// Set the value for `key`.
    pub fn set(&mut self, key: OptionKey, value: impl Into<String>) {
        *self.slot_mut(key) = Some(value.into());
    }

    /// Builder form of [`Options::set`].
    pub fn with(mut self, key: OptionKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    fn slot(&self, key: OptionKey) -> &Option<String> {
        match key {
            OptionKey::StatusMessage => &self.status_message,
            OptionKey::AlertMessage => &self.alert_message,
            OptionKey::StatusSelector => &self.status_selector,
            OptionKey::SavedSelector => &self.saved_selector,
            OptionKey::Exceptions => &self.exceptions,
            OptionKey::SubmitSelector => &self.submit_selector,
            OptionKey::Ignored => &self.ignored,
        }
    }

    fn slot_mut(&mut self, key: OptionKey) -> &mut Option<String> {
        match key {
            OptionKey::StatusMessage => &mut self.status_message,
            OptionKey::AlertMessage => &mut self.alert_message,
            OptionKey::StatusSelector => &mut self.status_selector,
            OptionKey::SavedSelector => &mut self.saved_selector,
            OptionKey::Exceptions => &mut self.exceptions,
            OptionKey::SubmitSelector => &mut self.submit_selector,
            OptionKey::Ignored => &mut self.ignored,
        }
    }
}

/// Fully resolved configuration for one watch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    /// Dirty status text.
    pub status_message: String,
    /// Navigate-away prompt text.
    pub alert_message: String,
    /// Status element selector.
    pub status_selector: Selector,
    /// Saved-message element selector.
    pub saved_selector: Selector,
    /// Exception field selector.
    pub exceptions: Selector,
    /// Submit-intent selector.
    pub submit_selector: Selector,
    /// Ignored field selector.
    pub ignored: Selector,
    provenance: BTreeMap<OptionKey, ConfigSource>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::resolve(&Options::default(), &Options::default())
    }
}

impl Configuration {
    /// Resolve every option across `SOURCE_PRECEDENCE`.
    pub fn resolve(explicit: &Options, declarative: &Options) -> Self {
        let mut provenance = BTreeMap::new();

        let mut text = |key: OptionKey| -> String {
            let (value, source) = resolve_text(key, explicit, declarative);
            provenance.insert(key, source);
            value
        };
        let status_message = text(OptionKey::StatusMessage);
        let alert_message = text(OptionKey::AlertMessage);

        let mut selector = |key: OptionKey| -> Selector {
            let (value, source) = resolve_selector(key, explicit, declarative);
            provenance.insert(key, source);
            value
        };
        let status_selector = selector(OptionKey::StatusSelector);
        let saved_selector = selector(OptionKey::SavedSelector);
        let exceptions = selector(OptionKey::Exceptions);
        let submit_selector = selector(OptionKey::SubmitSelector);
        let ignored = selector(OptionKey::Ignored);

        Self {
            status_message,
            alert_message,
            status_selector,
            saved_selector,
            exceptions,
            submit_selector,
            ignored,
            provenance,
        }
    }

    /// Which source supplied `key`.
    pub fn provenance(&self, key: OptionKey) -> ConfigSource {
        self.provenance
            .get(&key)
            .copied()
            .unwrap_or(ConfigSource::Defaults)
    }

    /// Source of every option.
    pub fn provenance_map(&self) -> &BTreeMap<OptionKey, ConfigSource> {
        &self.provenance
    }
}

fn candidate<'a>(
    source: ConfigSource,
    key: OptionKey,
    explicit: &'a Options,
    declarative: &'a Options,
) -> Option<&'a str> {
    match source {
        ConfigSource::Declarative => declarative.get(key),
        ConfigSource::Explicit => explicit.get(key),
        ConfigSource::Defaults => Some(key.default_value()),
    }
}

fn resolve_text(key: OptionKey, explicit: &Options, declarative: &Options) -> (String, ConfigSource) {
    SOURCE_PRECEDENCE
        .iter()
        .find_map(|&source| {
            candidate(source, key, explicit, declarative).map(|v| (v.to_string(), source))
        })
        .unwrap_or_else(|| (key.default_value().to_string(), ConfigSource::Defaults))
}

fn resolve_selector(
    key: OptionKey,
    explicit: &Options,
    declarative: &Options,
) -> (Selector, ConfigSource) {
    for source in SOURCE_PRECEDENCE {
        let Some(raw) = candidate(source, key, explicit, declarative) else {
            continue;
        };
        match Selector::parse(raw) {
            Ok(selector) => return (selector, source),
            Err(e) => {
                tracing::warn!(option = %key, %source, error = %e, "ignoring malformed selector");
            }
        }
    }
    tracing::error!(option = %key, "no usable selector in any source; matching nothing");
    (Selector::none(), ConfigSource::Defaults)
}
