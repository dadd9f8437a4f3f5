//! End-to-end acquisition run: manifest, sessions, rounds, teardown.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::AcquisitionSettings;
use crate::coordinator::AcquisitionCoordinator;
use crate::device::DeviceInterface;
use crate::manifest::{DeviceManifest, ManifestReader};
use crate::report::Reporter;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub endpoints: usize,
    pub rounds_completed: u32,
    pub frames: u64,
    pub failures: u64,
    /// Start-up failed (manifest or session open); no round was run.
    pub startup_failed: bool,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        if self.startup_failed || self.failures > 0 {
            1
        } else {
            0
        }
    }
}

/// Run `settings.rounds` acquisition rounds against `device`.
///
/// Acquisition failures (manifest, session open, timeouts) are reported
/// through `reporter` and reflected in the summary; only I/O failures on the
/// reporter itself surface as `Err`. Stops early after a failed round or when
/// `shutdown` is raised between rounds.
pub fn run<D, O, E>(
    device: &D,
    settings: &AcquisitionSettings,
    reporter: &mut Reporter<O, E>,
    shutdown: &AtomicBool,
) -> Result<RunSummary>
where
    D: DeviceInterface + ?Sized,
    O: Write,
    E: Write,
{
    let mut summary = RunSummary::default();

    let manifest = match DeviceManifest::new(device).list_endpoints() {
        Ok(manifest) => manifest,
        Err(err) => {
            reporter.error(&err).context("writing diagnostic")?;
            summary.startup_failed = true;
            return Ok(summary);
        }
    };
    summary.endpoints = manifest.len();
    reporter
        .connections(&manifest)
        .context("writing connection listing")?;

    let coordinator = AcquisitionCoordinator::new(device)
        .with_policy(settings.policy)
        .with_parallel_waits(settings.parallel);
    let mut sessions = match coordinator.open_sessions(&manifest) {
        Ok(sessions) => sessions,
        Err(err) => {
            reporter.error(&err).context("writing diagnostic")?;
            summary.startup_failed = true;
            return Ok(summary);
        }
    };

    log::info!(
        "acquiring from {} head(s): timeout={}ms policy={} parallel={} rounds={}",
        sessions.len(),
        settings.timeout.as_millis(),
        settings.policy,
        settings.parallel,
        settings.rounds
    );

    for round_no in 1..=settings.rounds {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("shutdown requested, stopping before round {}", round_no);
            break;
        }
        let started = Instant::now();
        let round = coordinator.collect_one_round(&mut sessions, settings.timeout);
        log::debug!(
            "round {} finished in {} ms",
            round_no,
            started.elapsed().as_millis()
        );

        let failures = reporter.round(&round).context("writing round report")?;
        summary.rounds_completed += 1;
        summary.frames += round.captures().count() as u64;
        summary.failures += failures as u64;
        if failures > 0 {
            break;
        }
    }

    for session in &sessions {
        let stats = session.stats();
        log::info!(
            "{}: frames={} timeouts={}",
            stats.endpoint_id,
            stats.frames_received,
            stats.timeouts
        );
    }
    coordinator.close_sessions(&mut sessions);
    Ok(summary)
}
