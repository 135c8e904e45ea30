//! Execution logic for subsync-cli's one job: read a reference and a
//! candidate SRT, analyze them, print the decision, and optionally write
//! the resulting candidate.

use crate::cli::Cli;
use crate::config::ConfigService;
use crate::core::caption::{AdPatternRegistry, CaptionList};
use crate::core::compare;
use crate::core::sync::Synchronizer;

pub fn execute(cli: &Cli, config_service: &dyn ConfigService) -> crate::Result<()> {
    let config = config_service.get_config()?;
    let ad_registry = AdPatternRegistry::new(&config.ad_params)?;

    let reference = CaptionList::from_path(&cli.reference)?;
    let candidate = CaptionList::from_path(&cli.candidate)?;

    let synchronizer = Synchronizer::new(&config, &ad_registry);
    let outcome = synchronizer.analyze(&candidate, &reference, None);

    println!("{}", outcome.decision);

    if cli.verbose {
        for anomaly in &outcome.captions.anomalies {
            log::info!("{anomaly}");
        }
        log::info!(
            "misnumbered={} purged_ads={} fixed_chars={}",
            outcome.captions.misnum_cnt,
            outcome.captions.purge_ads_cnt,
            outcome.captions.fixed_char_cnt,
        );
    }

    if cli.duration > 0 {
        check_tail(&outcome.captions, &ad_registry, cli.duration as i64 * 1000);
    }

    if let Some(out_path) = &cli.out {
        outcome.captions.write_atomic(out_path)?;
    }

    Ok(())
}

/// Runs the written caption list through the Comparator's tail checks
/// (spec.md §4.6) against the given video duration hint, logging whatever
/// it flags. Compared against itself: there is no second track here, just
/// a single list to check against `video_end_ms`.
fn check_tail(captions: &CaptionList, ad_registry: &AdPatternRegistry, video_end_ms: i64) {
    let report = compare::compare(captions, captions, ad_registry, Some(video_end_ms));
    if report.ends_short {
        log::warn!("subtitle ends suspiciously far before the video's end");
    }
    if report.ends_long {
        log::warn!("subtitle runs well past the video's end");
    }
    if !report.captions_beyond_video_end.is_empty() {
        log::warn!(
            "{} caption(s) extend beyond the video's end",
            report.captions_beyond_video_end.len()
        );
    }
}
