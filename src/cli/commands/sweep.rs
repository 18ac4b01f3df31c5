//! Sweep command - reclaim stale uploads

use crate::cache::{SweepReport, UploadCache};
use crate::cli::args::{OutputFormat, SweepArgs};
use crate::error::UpcacheResult;
use chrono::{Duration, Utc};
use console::style;

/// Execute the sweep command
pub async fn execute(args: SweepArgs, cache: &UploadCache) -> UpcacheResult<()> {
    let reclaimer = match args.max_age_hours {
        Some(hours) => cache.reclaimer().with_max_age(Duration::hours(i64::from(hours))),
        None => cache.reclaimer().clone(),
    };

    let report = if args.dry_run {
        reclaimer.plan_at(Utc::now())
    } else {
        reclaimer.sweep()
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report, args.dry_run, reclaimer.max_age()),
    }

    Ok(())
}

fn print_report(report: &SweepReport, dry_run: bool, max_age: Duration) {
    if report.disabled {
        println!("Reclamation is disabled (reclaim.disabled or UPCACHE_KEEP).");
        return;
    }

    if report.removed.is_empty() {
        println!(
            "No uploads older than {} hours ({} scanned).",
            max_age.num_hours(),
            report.scanned
        );
        return;
    }

    let verb = if dry_run { "Would remove" } else { "Removed" };
    println!("{} {} upload(s):", verb, report.removed.len());
    for dir in &report.removed {
        println!("  {} {}", style("•").red(), dir.display());
    }

    println!();
    println!(
        "Scanned {}, kept {}, skipped {}",
        report.scanned, report.kept, report.skipped
    );
    if dry_run {
        println!("Dry run - nothing removed.");
    }
}
