use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::Shared;
use crate::cache::CachedState;
use crate::error::LedgerError;
use crate::health::all_up;
use crate::ledger::{RegistryKind, Transaction};
use crate::probe::ProbeSample;
use crate::types::{ActorId, MultiAddr, ReportPayload};

/// The three polling loops of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollTask {
    /// Re-probe checkers reported by others and not yet voted against
    ReportedCheckers,
    /// Probe every member, recording health only
    Members,
    /// Probe every checker and report unreachable ones
    Checkers,
}

impl PollTask {
    pub const ALL: [PollTask; 3] = [PollTask::ReportedCheckers, PollTask::Members, PollTask::Checkers];
}

impl fmt::Display for PollTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollTask::ReportedCheckers => "reported-checkers",
            PollTask::Members => "members",
            PollTask::Checkers => "checkers",
        };
        f.write_str(name)
    }
}

pub(super) async fn run_loop(shared: Arc<Shared>, task: PollTask) {
    let mut stop = shared.stop.subscribe();
    let mut backoff = Backoff::new(shared.config.poll_interval, shared.config.max_backoff);
    info!(%task, "Polling loop started");

    while !shared.stop_requested() {
        let delay = match shared.poll_once(task).await {
            Ok(()) => {
                backoff.reset();
                shared.config.poll_interval
            }
            Err(e) => {
                let delay = backoff.next_delay();
                error!(%task, failures = backoff.failures(), "Cannot read ledger, retrying in {:?}: {}", delay, e);
                delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.wait_for(|stopped| *stopped) => break,
        }
    }

    info!(%task, "Polling loop stopped");
    shared.loop_exited();
}

impl Shared {
    pub(super) async fn poll_once(&self, task: PollTask) -> Result<(), LedgerError> {
        let state = self.cache.load(self.reader.as_ref()).await?;
        let snapshot = state.snapshot();
        if snapshot.decode_failures() > 0 {
            warn!(%task, skipped = snapshot.decode_failures(), "Ledger state has undecodable entries");
        }

        match task {
            PollTask::ReportedCheckers => {
                for (id, addresses) in state.list_reported_not_voted().await {
                    if !self.evaluate_checker(&state, id, &addresses).await {
                        break;
                    }
                }
            }
            PollTask::Checkers => {
                for id in snapshot.list_checkers() {
                    let addresses = snapshot.addresses_of(RegistryKind::Checkers, id).unwrap_or_default();
                    if !self.evaluate_checker(&state, id, &addresses).await {
                        break;
                    }
                }
            }
            PollTask::Members => {
                for id in snapshot.list_members() {
                    let addresses = snapshot.addresses_of(RegistryKind::Members, id).unwrap_or_default();
                    if self.check_member(id, &addresses).await.is_none() {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Probe every address of `target` except the local ones, one at a
    /// time. `None` if a stop was requested meanwhile.
    async fn probe_addresses(&self, target: ActorId, addresses: &[MultiAddr]) -> Option<Vec<ProbeSample>> {
        let mut stop = self.stop.subscribe();
        let mut samples = Vec::with_capacity(addresses.len());

        for address in addresses {
            if self.profile.is_own_address(address) {
                continue;
            }

            let sample = tokio::select! {
                sample = self.probe.probe(address, self.config.probe_timeout) => sample,
                _ = stop.wait_for(|stopped| *stopped) => return None,
            };
            debug!(%target, %address, online = sample.online, latency_ms = sample.latency_ms, "Probed");

            self.health.record(target, address, &sample).await;
            samples.push(sample);
        }

        Some(samples)
    }

    async fn check_member(&self, member: ActorId, addresses: &[MultiAddr]) -> Option<()> {
        let samples = self.probe_addresses(member, addresses).await?;
        if !all_up(&samples) {
            info!(%member, "Member has unreachable addresses");
        }
        Some(())
    }

    /// Probe a checker and vote against it if any address is down.
    /// Returns false if a stop was requested.
    async fn evaluate_checker(&self, state: &CachedState<'_>, target: ActorId, addresses: &[MultiAddr]) -> bool {
        if target == self.profile.actor_id {
            return true;
        }

        let Some(samples) = self.probe_addresses(target, addresses).await else {
            return false;
        };
        if all_up(&samples) {
            return true;
        }

        self.report(state, target).await;
        true
    }

    async fn report(&self, state: &CachedState<'_>, target: ActorId) {
        let _guard = self.report_lock.lock().await;

        if state.has_voted_reported_peer(target).await {
            debug!(checker = %target, "Already voted against checker");
            return;
        }

        info!(checker = %target, "Checker unreachable, reporting it offline");
        let transaction = Transaction::ReportChecker(ReportPayload { checker: target });
        match self.submitter.submit(transaction).await {
            Ok(()) => {
                self.cache.record_local_vote(target).await;
                info!(checker = %target, "Offline vote accepted");
            }
            Err(e) => error!(checker = %target, "Failed to report checker: {}", e),
        }
    }
}
