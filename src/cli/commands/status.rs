//! status command - List repositories and why they are unsyncable

use anyhow::Result;

use super::Fleet;
use crate::cli::Context;
use crate::fix::RefreshMode;
use crate::ui::output;

/// Print one line per repository, unsyncable first.
pub fn status(ctx: &Context, catalogs: &[String], refresh: RefreshMode, unsyncable_only: bool) -> Result<()> {
    let fleet = Fleet::open(ctx)?;
    let repos = fleet.engine().load_fix_repos(catalogs, refresh)?;
    let verbosity = ctx.verbosity();

    let width = repos
        .iter()
        .map(|s| output::format_repo(&s.record).len())
        .max()
        .unwrap_or(0);

    let mut unsyncable = 0;
    for state in &repos {
        let record = &state.record;
        if !record.syncable {
            unsyncable += 1;
        } else if unsyncable_only {
            continue;
        }
        let marker = if state.is_default_catalog { "*" } else { " " };
        println!(
            "{}{:<width$}  {:<10}  {}",
            marker,
            output::format_repo(record),
            record.catalog,
            output::format_reasons(record),
            width = width
        );
    }

    output::print(
        format!("\n{} repositories, {} unsyncable", repos.len(), unsyncable),
        verbosity,
    );
    Ok(())
}
