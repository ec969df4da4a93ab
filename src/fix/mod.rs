//! fix
//!
//! The repository remediation engine.
//!
//! # Architecture
//!
//! ```text
//! load_fix_repos ──► resolve_fix_target ──► eligible_fix_actions
//!                                                  │
//!                             caller picks an action
//!                                                  ▼
//!                     apply_fix_action_with_observer
//!        (re-check eligibility, build plan, run steps, revalidate)
//! ```
//!
//! # Modules
//!
//! - [`action`] - The closed set of actions
//! - [`feasibility`] - Rebase/merge trial probes
//! - [`eligibility`] - Which actions to offer, and why not
//! - [`plan`] - Ordered step plans
//! - [`exec`] - Step execution and observers
//! - [`resolve`] - Selector resolution
//! - [`load`] - Joined per-repository state and revalidation
//!
//! Every git call goes through [`GitOps`], every hosting call through
//! [`Forge`], and all persistence through [`StateStore`] under the fleet
//! lock.

pub mod action;
pub mod eligibility;
mod error;
pub mod exec;
pub mod feasibility;
pub mod load;
pub mod plan;
pub mod resolve;

pub use action::{FixAction, UnknownAction};
pub use eligibility::{eligible_fix_actions, ineligible_fix_reason, push_allowed, EligibilityContext};
pub use error::{FixError, StepError};
pub use exec::{
    ChannelObserver, FixObserver, FixOptions, FixOutcome, RecordingObserver, StepEvent, StepStatus,
};
pub use feasibility::{SyncFeasibility, SyncOutcome};
pub use load::{FixRepoState, RefreshMode};
pub use plan::{build_fix_plan, FixActionPlanEntry, PlanContext, REVALIDATE_STEP_ID};
pub use resolve::{resolve_fix_target, ResolveError};

use crate::core::config::Config;
use crate::core::store::StateStore;
use crate::forge::Forge;
use crate::git::GitOps;
use crate::risk::RiskCollector;

/// The collaborators one fix run works against.
pub struct FixEngine<'a> {
    pub(crate) config: &'a Config,
    pub(crate) store: &'a dyn StateStore,
    pub(crate) git: &'a dyn GitOps,
    pub(crate) forge: &'a dyn Forge,
    /// `None` uses a collector over `git`.
    pub(crate) risk: Option<&'a dyn RiskCollector>,
}

impl<'a> FixEngine<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn StateStore,
        git: &'a dyn GitOps,
        forge: &'a dyn Forge,
    ) -> Self {
        Self {
            config,
            store,
            git,
            forge,
            risk: None,
        }
    }

    /// Use `collector` instead of the git-backed risk collector.
    pub fn with_risk_collector(mut self, collector: &'a dyn RiskCollector) -> Self {
        self.risk = Some(collector);
        self
    }

    pub fn config(&self) -> &Config {
        self.config
    }
}
