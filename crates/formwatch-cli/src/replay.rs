//! # Replay Subcommand
//!
//! Drives watchers over a document with a scripted interaction sequence
//! and reports what each step did to watcher and guard state.
//!
//! ## Script format
//!
//! ```yaml
//! steps:
//!   - action: event
//!     kind: key_up            # key_up | change | input | click
//!     target: "#name"         # selector resolved against the document
//!   - action: set_dirty
//!     state: false
//!     region: "#profile"      # optional; defaults to every watcher
//!   - action: navigate        # attempt to leave the page
//! ```

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use formwatch_core::{Document, Element, Options, Selector};
use formwatch_state::{
    navigate_away, ChangeWatcher, EventKind, GuardPolicy, Hooks, Propagation, RegionEvent,
    RegionEventSource, SessionSnapshot, SharedGuard, VisibilityPresenter,
};

use crate::input::{load_document, load_options, load_structured};

/// Default region selector.
pub const DEFAULT_REGION_SELECTOR: &str = ".js-watch-changes";

/// Arguments for the `formwatch replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Document description (YAML or JSON).
    #[arg(long)]
    pub document: PathBuf,

    /// Replay script (YAML or JSON).
    #[arg(long)]
    pub script: PathBuf,

    /// Selector for the watched regions.
    #[arg(long, default_value = DEFAULT_REGION_SELECTOR)]
    pub region: String,

    /// Explicit options file (YAML or JSON).
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Navigation guard policy shared by all watchers.
    #[arg(long, value_enum, default_value = "arbitrated")]
    pub guard: GuardArg,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Guard policy as a CLI value.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GuardArg {
    /// One arm request per session; armed while any session is.
    Arbitrated,
    /// A single shared slot; any disarm clears it.
    SingleSlot,
}

impl From<GuardArg> for GuardPolicy {
    fn from(arg: GuardArg) -> Self {
        match arg {
            GuardArg::Arbitrated => GuardPolicy::Arbitrated,
            GuardArg::SingleSlot => GuardPolicy::SingleSlot,
        }
    }
}

/// Output format for replay results.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// One line per step plus a summary.
    Text,
    /// A single JSON report.
    Json,
}

/// A replay script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Steps, run in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One scripted step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Deliver an interaction event.
    Event {
        /// Event kind.
        kind: EventKind,
        /// Selector for the target element.
        target: String,
    },
    /// Override the dirty flag.
    SetDirty {
        /// New dirty state.
        state: bool,
        /// Restrict to watchers whose region matches this selector.
        #[serde(default)]
        region: Option<String>,
    },
    /// Attempt to leave the page.
    Navigate,
}

/// What one step did.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// 1-based step number.
    pub index: usize,
    /// Human-readable step description.
    pub step: String,
    /// Whether a watcher stopped propagation.
    pub stopped: bool,
    /// Prompt text returned by a navigate step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Guard state after the step.
    pub guard_armed: bool,
    /// Watcher snapshots after the step.
    pub sessions: Vec<SessionSnapshot>,
}

/// How often each hook fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HookCounts {
    /// `on_set_alert` calls.
    pub set_alert: usize,
    /// `on_unset_alert` calls.
    pub unset_alert: usize,
    /// `on_unload` calls.
    pub unload: usize,
}

/// Full replay result.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Guard policy used.
    pub policy: GuardPolicy,
    /// Region selector used.
    pub region: String,
    /// Per-step outcomes.
    pub steps: Vec<StepOutcome>,
    /// Final watcher snapshots.
    pub sessions: Vec<SessionSnapshot>,
    /// Final guard state.
    pub guard_armed: bool,
    /// Hook invocation counts.
    pub hooks: HookCounts,
}

struct Bound {
    watcher: Rc<RefCell<ChangeWatcher<VisibilityPresenter>>>,
    source: RegionEventSource,
}

/// Execute the replay subcommand.
pub fn run_replay(args: &ReplayArgs) -> Result<u8> {
    let document = load_document(&args.document)?;
    let script: Script = load_structured(&args.script)?;
    let options = load_options(args.options.as_deref())?;

    let report = replay(&document, &script, &args.region, &options, args.guard.into())?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(0)
}

/// Run `script` against watchers on every region of `document` matching
/// `region_selector`.
pub fn replay(
    document: &Document,
    script: &Script,
    region_selector: &str,
    options: &Options,
    policy: GuardPolicy,
) -> Result<ReplayReport> {
    let guard = policy.build();
    let counters = Rc::new([Cell::new(0usize), Cell::new(0usize), Cell::new(0usize)]);
    let hooks = counting_hooks(&counters);

    let mut bound: Vec<Bound> = ChangeWatcher::initialize_all(
        document,
        region_selector,
        options,
        &hooks,
        &guard,
        |_| VisibilityPresenter::new(),
    )
    .into_iter()
    .filter_map(|watcher| {
        let region = watcher.region()?.clone();
        let watcher = Rc::new(RefCell::new(watcher));
        let mut source = RegionEventSource::new(region);
        ChangeWatcher::subscribe(&watcher, &mut source);
        Some(Bound { watcher, source })
    })
    .collect();

    if bound.is_empty() {
        tracing::warn!(region = region_selector, "no region matched; nothing is watched");
    }

    let mut steps = Vec::with_capacity(script.steps.len());
    for (i, step) in script.steps.iter().enumerate() {
        let index = i + 1;
        let mut stopped = false;
        let mut prompt = None;

        match step {
            Step::Event { kind, target } => {
                let element = resolve_target(document, target)
                    .with_context(|| format!("step {index}"))?;
                let event = RegionEvent::new(*kind, element.clone());
                for b in bound.iter_mut() {
                    stopped |= b.source.dispatch(&event) == Propagation::Stop;
                }
            }
            Step::SetDirty { state, region } => {
                let filter = region
                    .as_deref()
                    .map(Selector::parse)
                    .transpose()
                    .with_context(|| format!("step {index}: invalid region selector"))?;
                for b in &bound {
                    let mut watcher = b.watcher.borrow_mut();
                    let selected = match (&filter, watcher.region()) {
                        (Some(sel), Some(el)) => sel.matches(el),
                        (None, _) => true,
                        (Some(_), None) => false,
                    };
                    if selected {
                        watcher.set_dirty(*state);
                    }
                }
            }
            Step::Navigate => {
                prompt = navigate_away(&guard);
            }
        }

        let outcome = StepOutcome {
            index,
            step: describe(step),
            stopped,
            prompt,
            guard_armed: is_armed(&guard),
            sessions: snapshots(&bound),
        };
        tracing::debug!(index, step = %outcome.step, guard_armed = outcome.guard_armed, "replayed step");
        steps.push(outcome);
    }

    Ok(ReplayReport {
        policy,
        region: region_selector.to_string(),
        steps,
        sessions: snapshots(&bound),
        guard_armed: is_armed(&guard),
        hooks: HookCounts {
            set_alert: counters[0].get(),
            unset_alert: counters[1].get(),
            unload: counters[2].get(),
        },
    })
}

fn counting_hooks(counters: &Rc<[Cell<usize>; 3]>) -> Hooks {
    let (a, b, c) = (counters.clone(), counters.clone(), counters.clone());
    Hooks::new()
        .on_set_alert(move || a[0].set(a[0].get() + 1))
        .on_unset_alert(move || b[1].set(b[1].get() + 1))
        .on_unload(move || c[2].set(c[2].get() + 1))
}

fn resolve_target<'a>(document: &'a Document, target: &str) -> Result<&'a Element> {
    let matches = document.query(target).context("invalid target selector")?;
    match matches.first() {
        Some(&element) => Ok(element),
        None => bail!("target {target:?} matched no element"),
    }
}

fn snapshots(bound: &[Bound]) -> Vec<SessionSnapshot> {
    bound.iter().map(|b| b.watcher.borrow().snapshot()).collect()
}

fn is_armed(guard: &SharedGuard) -> bool {
    guard.borrow().is_armed()
}

fn describe(step: &Step) -> String {
    match step {
        Step::Event { kind, target } => format!("{kind} {target}"),
        Step::SetDirty { state, region: None } => format!("set_dirty({state})"),
        Step::SetDirty {
            state,
            region: Some(region),
        } => format!("set_dirty({state}) {region}"),
        Step::Navigate => "navigate".to_string(),
    }
}

fn print_text(report: &ReplayReport) {
    for step in &report.steps {
        let states: Vec<String> = step
            .sessions
            .iter()
            .map(|s| {
                format!(
                    "{}={}",
                    s.region.as_deref().unwrap_or("-"),
                    s.state.map(|st| st.name()).unwrap_or("INERT")
                )
            })
            .collect();
        let mut line = format!(
            "[{}] {:<32} guard={} {}",
            step.index,
            step.step,
            if step.guard_armed { "armed" } else { "disarmed" },
            states.join(" ")
        );
        if step.stopped {
            line.push_str(" (stopped)");
        }
        if let Some(prompt) = &step.prompt {
            line.push_str(&format!(" prompt={prompt:?}"));
        }
        println!("{line}");
    }
    println!(
        "{} session(s), guard {} ({}), hooks: set_alert={} unset_alert={} unload={}",
        report.sessions.len(),
        if report.guard_armed { "armed" } else { "disarmed" },
        report.policy,
        report.hooks.set_alert,
        report.hooks.unset_alert,
        report.hooks.unload,
    );
}
