//! Multi-session acquisition coordinator.
//!
//! The coordinator turns a manifest into one session per head, then runs
//! rounds: one bounded wait per session, one result per session, reported in
//! manifest order regardless of which head answered first.
//!
//! Two knobs shape a round:
//! - `RoundPolicy::CollectAll` (default) records every outcome, timeouts
//!   included, and leaves the decision to the caller.
//!   `RoundPolicy::FailFast` stops at the first failed endpoint, the way a
//!   plain sequential grab loop gives up on the first timeout.
//! - Parallel waits issue every session's wait on its own scoped thread, so a
//!   round costs the slowest wait rather than the sum of all waits. Since all
//!   waits are in flight at once, a parallel round is never halted: every
//!   outcome is kept, whatever the policy.
//!
//! There is no retry inside a round. A caller that wants another attempt
//! runs another round.

use anyhow::anyhow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::device::DeviceInterface;
use crate::error::{AcquisitionError, CoordinatorResult};
use crate::frame::Frame;
use crate::manifest::Manifest;
use crate::session::AcquisitionSession;
use crate::timestamp::CaptureTimestamp;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoundPolicy {
    #[default]
    CollectAll,
    FailFast,
}

impl FromStr for RoundPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collect-all" | "collect_all" => Ok(Self::CollectAll),
            "fail-fast" | "fail_fast" => Ok(Self::FailFast),
            other => Err(anyhow!(
                "unknown round policy '{}' (expected collect-all or fail-fast)",
                other
            )),
        }
    }
}

impl fmt::Display for RoundPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectAll => f.write_str("collect-all"),
            Self::FailFast => f.write_str("fail-fast"),
        }
    }
}

/// A frame and the capture time it was stamped with.
#[derive(Debug)]
pub struct Capture {
    pub timestamp: CaptureTimestamp,
    pub frame: Frame,
}

/// Outcome of one bounded wait on one endpoint.
#[derive(Debug)]
pub struct AcquisitionResult {
    pub endpoint_id: String,
    pub outcome: Result<Capture, AcquisitionError>,
}

impl AcquisitionResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn capture(&self) -> Option<&Capture> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&AcquisitionError> {
        self.outcome.as_ref().err()
    }
}

/// Results of one round, in manifest order.
#[derive(Debug)]
pub struct Round {
    results: Vec<AcquisitionResult>,
    sessions: usize,
}

impl Round {
    pub fn results(&self) -> &[AcquisitionResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<AcquisitionResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True when a sequential fail-fast round stopped before visiting every
    /// session.
    pub fn halted(&self) -> bool {
        self.results.len() < self.sessions
    }

    pub fn first_failure(&self) -> Option<&AcquisitionError> {
        self.results.iter().find_map(AcquisitionResult::error)
    }

    pub fn failures(&self) -> impl Iterator<Item = &AcquisitionError> {
        self.results.iter().filter_map(AcquisitionResult::error)
    }

    pub fn captures(&self) -> impl Iterator<Item = &Capture> {
        self.results.iter().filter_map(AcquisitionResult::capture)
    }

    /// Every session answered with a frame.
    pub fn is_complete(&self) -> bool {
        !self.halted() && self.results.iter().all(AcquisitionResult::is_success)
    }

    /// All captures in order, or the first failure.
    pub fn into_captures(self) -> CoordinatorResult<Vec<Capture>> {
        self.results.into_iter().map(|r| r.outcome).collect()
    }
}

pub struct AcquisitionCoordinator<'d, D: DeviceInterface + ?Sized> {
    device: &'d D,
    policy: RoundPolicy,
    parallel: bool,
}

impl<'d, D: DeviceInterface + ?Sized> AcquisitionCoordinator<'d, D> {
    pub fn new(device: &'d D) -> Self {
        Self {
            device,
            policy: RoundPolicy::default(),
            parallel: false,
        }
    }

    pub fn with_policy(mut self, policy: RoundPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parallel_waits(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn policy(&self) -> RoundPolicy {
        self.policy
    }

    /// Open one session per endpoint, in manifest order.
    ///
    /// All or nothing: if any endpoint fails to open, the sessions opened so
    /// far are closed before the error is returned.
    pub fn open_sessions(&self, manifest: &Manifest) -> CoordinatorResult<Vec<AcquisitionSession>> {
        let mut sessions = Vec::with_capacity(manifest.len());
        for endpoint in manifest {
            match AcquisitionSession::open(self.device, endpoint.clone()) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    log::error!("aborting start-up: {}", err);
                    self.close_sessions(&mut sessions);
                    return Err(err);
                }
            }
        }
        log::info!("opened {} session(s)", sessions.len());
        Ok(sessions)
    }

    /// Issue exactly one bounded wait per session and collect the outcomes.
    pub fn collect_one_round(
        &self,
        sessions: &mut [AcquisitionSession],
        timeout: Duration,
    ) -> Round {
        let count = sessions.len();
        let results = if self.parallel {
            self.collect_parallel(sessions, timeout)
        } else {
            self.collect_sequential(sessions, timeout)
        };
        Round {
            results,
            sessions: count,
        }
    }

    fn collect_sequential(
        &self,
        sessions: &mut [AcquisitionSession],
        timeout: Duration,
    ) -> Vec<AcquisitionResult> {
        let total = sessions.len();
        let mut results = Vec::with_capacity(total);
        for session in sessions.iter_mut() {
            let result = wait_one(session, timeout);
            let failed = !result.is_success();
            results.push(result);
            if failed && self.policy == RoundPolicy::FailFast {
                log::error!(
                    "round halted at {} after {} of {} session(s)",
                    session.id(),
                    results.len(),
                    total
                );
                break;
            }
        }
        results
    }

    fn collect_parallel(
        &self,
        sessions: &mut [AcquisitionSession],
        timeout: Duration,
    ) -> Vec<AcquisitionResult> {
        let ids: Vec<String> = sessions.iter().map(|s| s.id().to_string()).collect();
        let results: Vec<AcquisitionResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = sessions
                .iter_mut()
                .map(|session| scope.spawn(move || wait_one(session, timeout)))
                .collect();
            // Joining in spawn order keeps manifest order.
            handles
                .into_iter()
                .zip(ids)
                .map(|(handle, endpoint_id)| {
                    handle.join().unwrap_or_else(|_| AcquisitionResult {
                        outcome: Err(AcquisitionError::Wait {
                            endpoint_id: endpoint_id.clone(),
                            cause: anyhow!("wait thread panicked"),
                        }),
                        endpoint_id,
                    })
                })
                .collect()
        });

        // Every wait has already been issued, so nothing is dropped here even
        // under fail-fast; the caller decides from `first_failure()`.
        if self.policy == RoundPolicy::FailFast {
            if let Some(failed) = results.iter().find(|r| !r.is_success()) {
                log::error!(
                    "round failed at {} ({} of {} session(s) answered)",
                    failed.endpoint_id,
                    results.iter().filter(|r| r.is_success()).count(),
                    results.len()
                );
            }
        }
        results
    }

    /// Close every session. Already-closed sessions are skipped.
    pub fn close_sessions(&self, sessions: &mut [AcquisitionSession]) {
        for session in sessions.iter_mut() {
            session.close();
        }
    }
}

fn wait_one(session: &mut AcquisitionSession, timeout: Duration) -> AcquisitionResult {
    let outcome = session.wait_for_frame(timeout).map(|frame| Capture {
        timestamp: frame.timestamp,
        frame,
    });
    AcquisitionResult {
        endpoint_id: session.id().to_string(),
        outcome,
    }
}
