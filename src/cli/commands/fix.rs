//! fix command - Explain and apply remediation actions

use anyhow::{bail, Result};

use super::Fleet;
use crate::cli::Context;
use crate::core::metadata::Visibility;
use crate::core::types::SyncStrategy;
use crate::fix::{
    resolve_fix_target, FixAction, FixOptions, FixOutcome, FixRepoState, RefreshMode, StepEvent,
};
use crate::ui::output::{self, Verbosity};
use crate::ui::prompts;

/// Parsed `fix` arguments.
#[derive(Debug, Clone, Default)]
pub struct FixArgs {
    pub selector: Option<String>,
    pub action: Option<FixAction>,
    pub message: Option<String>,
    pub project_name: Option<String>,
    pub visibility: Option<Visibility>,
    pub gitignore: Vec<String>,
    pub no_fetch: bool,
    pub catalogs: Vec<String>,
    pub refresh: RefreshMode,
    pub dry_run: bool,
    pub list: bool,
    pub yes: bool,
}

impl FixArgs {
    fn options(&self, interactive: bool) -> FixOptions {
        FixOptions {
            interactive,
            commit_message: self.message.clone(),
            project_name: self.project_name.clone(),
            visibility: self.visibility,
            gitignore_patterns: self.gitignore.clone(),
            fetch: self.no_fetch.then_some(false),
        }
    }
}

/// Run the fix command and return the exit code.
pub fn fix(ctx: &Context, args: FixArgs) -> Result<u8> {
    let options = args.options(ctx.interactive);
    if let Some(action) = args.action {
        options.validate_for(action)?;
    }

    let fleet = Fleet::open(ctx)?;
    let engine = fleet.engine();
    let strategy = fleet.config.sync_strategy();
    let verbosity = ctx.verbosity();

    let repos = engine.load_fix_repos(&args.catalogs, args.refresh)?;

    let Some(selector) = args.selector.as_deref() else {
        if args.action.is_some() {
            bail!("--action needs a repository selector");
        }
        overview(&repos, ctx.interactive, strategy, args.list, verbosity);
        return Ok(0);
    };
    let target = resolve_fix_target(selector, &repos)?;

    let Some(action) = args.action else {
        explain(target, ctx.interactive, strategy, args.list);
        return Ok(0);
    };

    let plan = engine.preview(target, action, &options);
    let label = output::format_repo(&target.record);

    if args.dry_run {
        println!("{} on {}:", action, label);
        println!("{}", output::format_plan(&plan));
        return Ok(0);
    }

    if ctx.interactive && !args.yes {
        println!("{} on {}:", action, label);
        println!("{}", output::format_plan(&plan));
        if !prompts::confirm(&format!("Apply {}?", action), false, true)? {
            output::print("Cancelled.", verbosity);
            return Ok(1);
        }
    }

    let mut observer = |event: &StepEvent| {
        if let Some(line) = output::format_step(event) {
            output::print(line, verbosity);
        }
    };
    let state = engine.apply_fix_action_with_observer(
        &args.catalogs,
        &target.record.path,
        action,
        &options,
        Some(&mut observer),
    )?;

    let outcome = FixOutcome::of(&state);
    match outcome {
        FixOutcome::Synced => output::success(format!("{} is syncable", label), verbosity),
        FixOutcome::StillUnsyncable => {
            output::warn(
                format!(
                    "{} is still unsyncable: {}",
                    label,
                    output::format_reasons(&state.record)
                ),
                verbosity,
            );
            let next = state.eligible_actions(ctx.interactive, strategy);
            if !next.is_empty() {
                output::print(
                    format!("next: {}", ids(&next)),
                    verbosity,
                );
            }
        }
    }
    Ok(outcome.exit_code() as u8)
}

fn ids(actions: &[FixAction]) -> String {
    actions.iter().map(|a| a.id()).collect::<Vec<_>>().join(", ")
}

fn overview(repos: &[FixRepoState], interactive: bool, strategy: SyncStrategy, list: bool, verbosity: Verbosity) {
    let unsyncable: Vec<&FixRepoState> = repos.iter().filter(|s| !s.record.syncable).collect();

    if list {
        for state in &unsyncable {
            println!(
                "repo:{}\t{}\t{}\t{}",
                output::format_repo(&state.record),
                state.record.path.display(),
                state.record.unsyncable_reasons.join(),
                ids(&state.eligible_actions(interactive, strategy))
            );
        }
        return;
    }

    if unsyncable.is_empty() {
        output::print(
            format!("All {} repositories are syncable.", repos.len()),
            verbosity,
        );
        return;
    }

    for state in unsyncable {
        let actions = state.eligible_actions(interactive, strategy);
        println!(
            "{}  ({})",
            output::format_repo(&state.record),
            output::format_reasons(&state.record)
        );
        if actions.is_empty() {
            println!("    no automatic fix; resolve manually");
        } else {
            println!("    {}", ids(&actions));
        }
    }
}

fn explain(state: &FixRepoState, interactive: bool, strategy: SyncStrategy, list: bool) {
    let eligible = state.eligible_actions(interactive, strategy);

    if list {
        for action in FixAction::ALL {
            if action == FixAction::Ignore {
                continue;
            }
            if eligible.contains(&action) {
                println!("action:{}\teligible", action);
            } else {
                println!(
                    "action:{}\tineligible\t{}",
                    action,
                    state.ineligible_reason(action, interactive, strategy)
                );
            }
        }
        return;
    }

    println!(
        "{}  {}  ({})",
        output::format_repo(&state.record),
        state.record.path.display(),
        output::format_reasons(&state.record)
    );
    if eligible.is_empty() {
        println!("No actions are eligible.");
    } else {
        println!("Eligible actions:");
        for action in &eligible {
            println!("  {:<20} {}", action.id(), action.label());
        }
    }

    for action in FixAction::ALL {
        if !action.is_explainable() || eligible.contains(&action) {
            continue;
        }
        let reason = state.ineligible_reason(action, interactive, strategy);
        if !reason.is_empty() {
            println!("  {:<20} not available: {}", action.id(), reason);
        }
    }

    if state.risk.has_noisy_changes() && !state.risk.missing_gitignore_patterns.is_empty() {
        println!(
            "Suggested .gitignore patterns: {}",
            state.risk.missing_gitignore_patterns.join(" ")
        );
    }
}
