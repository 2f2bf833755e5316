//! cli::commands::pull
//!
//! Fetch from a remote and reconcile local branches and tags.
//!
//! # Design
//!
//! The handler opens the repository, loads gg's configuration, takes the
//! repository lock (except for `--dry-run`), runs [`engine::pull`] and prints
//! either a human summary or the JSON report. When the pull fails after
//! reconciliation (tag conflicts, per-ref failures) the partial report is
//! still printed before the error.
//!
//! # Example
//!
//! ```bash
//! gg pull
//! gg pull upstream -r main --force-tags
//! gg pull https://example.com/other.git --pattern 'release/*' --dry-run
//! ```

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::core::lock::RepoLock;
use crate::engine::{self, Context, PlanRequest, PullOptions, PullReport};
use crate::git::Git;
use crate::ui::output::{self, Verbosity};

/// Arguments for `gg pull`.
#[derive(Debug, Clone, Default)]
pub struct PullArgs {
    /// Remote name or URL.
    pub source: Option<String>,
    /// Explicit refs.
    pub refs: Vec<String>,
    /// Glob over ref names.
    pub pattern: Option<String>,
    /// Overwrite differing tags.
    pub force_tags: bool,
    /// Plan only.
    pub dry_run: bool,
    /// Print the report as JSON.
    pub json: bool,
}

/// Run the pull command.
pub fn pull(ctx: &Context, args: &PullArgs) -> Result<()> {
    let verbosity = ctx.verbosity();
    let cwd = match &ctx.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let git = Git::open(&cwd).context("Failed to open repository")?;
    output::debug(format!("work tree: {}", git.work_dir().display()), verbosity);

    let config = Config::load(Some(git.git_dir())).context("Failed to load configuration")?;
    if let Some(path) = config.global_config_loaded_from() {
        output::debug(format!("global config: {}", path.display()), verbosity);
    }
    if let Some(path) = config.repo_config_loaded_from() {
        output::debug(format!("repo config: {}", path.display()), verbosity);
    }

    let options = PullOptions {
        source: args.source.clone(),
        default_remote: Some(config.default_remote().to_string()),
        request: PlanRequest {
            refs: args.refs.clone(),
            pattern: args.pattern.clone(),
            force_tags: args.force_tags || config.force_tags(),
        },
        dry_run: args.dry_run,
    };

    let mut lock = if args.dry_run {
        None
    } else {
        Some(RepoLock::acquire(git.git_dir())?)
    };

    let result = engine::pull(&git, &git, &options, verbosity);
    if let Some(lock) = lock.as_mut() {
        lock.release()?;
    }

    match result {
        Ok(report) => emit(&report, args.json, verbosity),
        Err(err) => {
            if let Some(report) = err.report() {
                emit(report, args.json, verbosity)?;
            }
            Err(err.into())
        }
    }
}

fn emit(report: &PullReport, json: bool, verbosity: Verbosity) -> Result<()> {
    if json {
        output::json(report)?;
    } else {
        for line in summarize(report) {
            output::print(line, verbosity);
        }
    }
    Ok(())
}

/// Human-readable summary lines for a report.
fn summarize(report: &PullReport) -> Vec<String> {
    let mut lines = Vec::new();
    let plan = &report.plan;

    if report.dry_run {
        if plan.is_empty() {
            lines.push(format!("Nothing to pull from {}", report.source));
            return lines;
        }
        lines.push(format!("Would pull from {}:", report.source));
        for spec in &plan.refspecs {
            lines.push(format!("  fetch {}", spec));
        }
        for candidate in &plan.deferred.branches {
            lines.push(format!(
                "  {} {} -> {}",
                match candidate.kind {
                    engine::CandidateKind::Create => "create",
                    engine::CandidateKind::FastForward => "update",
                },
                candidate.branch,
                candidate.remote_oid.short(7)
            ));
        }
        for refname in plan.deferred.deleted_refs.keys() {
            lines.push(format!("  delete {}", refname));
        }
        for conflict in &plan.conflicts {
            lines.push(format!("  conflict: {}", conflict));
        }
        return lines;
    }

    for update in &plan.tag_updates {
        let verb = if update.local_oid.is_some() {
            "Updated"
        } else {
            "Fetched"
        };
        lines.push(format!("{} tag {}", verb, update.tag.short_name()));
    }

    let Some(rec) = &report.reconcile else {
        return lines;
    };
    lines.extend(rec.created.iter().map(|b| format!("Created branch {}", b)));
    lines.extend(rec.fast_forwarded.iter().map(|b| format!("Fast-forwarded {}", b)));
    lines.extend(
        rec.diverged
            .iter()
            .map(|d| {
                let relation = if d.ahead { "ahead of" } else { "diverged from" };
                format!("Skipped {} ({} {})", d.branch, relation, report.source)
            }),
    );
    if let Some(current) = &rec.skipped_current {
        lines.push(format!("Skipped {} (checked out)", current));
    }
    lines.extend(
        rec.graveyard
            .iter()
            .map(|b| format!("Moved {} to refs/gg-old/{}", b, b)),
    );

    if lines.is_empty() {
        lines.push(format!("Already up to date with {}", report.source));
    }
    lines
}
