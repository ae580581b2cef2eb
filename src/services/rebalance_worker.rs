//! Background rebalancing of reviewer load.
//!
//! A single worker drains the rebalance mailbox and runs one transaction per
//! event:
//! - user activated: join understaffed pull requests of their team
//! - user deactivated: leave every open pull request, with a backfill per slot
//!
//! Failures are logged and the loop moves on to the next event. There is no
//! retry; a lost event stays lost until the user's flag changes again.

use crate::db::pool::DbPool;
use crate::db::pull_requests;
use crate::error::AppError;
use crate::logging::SharedLogger;
use crate::models::ReviewerBackfill;
use crate::services::rebalance_queue::RebalanceEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Counters returned when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub failed: u64,
}

/// What a single event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceReport {
    /// The user was added to these pull requests.
    Assigned {
        user_id: String,
        pull_request_ids: Vec<String>,
    },
    /// The user was removed from these pull requests.
    Released {
        user_id: String,
        backfills: Vec<ReviewerBackfill>,
    },
}

pub struct RebalanceWorker {
    pool: DbPool,
    logger: SharedLogger,
}

impl RebalanceWorker {
    pub fn new(pool: DbPool, logger: SharedLogger) -> Self {
        Self { pool, logger }
    }

    /// Apply one event in its own transaction.
    pub async fn handle_event(&self, event: &RebalanceEvent) -> Result<RebalanceReport, AppError> {
        if event.is_active {
            let pull_request_ids = pull_requests::assign_to_needy_prs(&self.pool, &event.user_id).await?;
            Ok(RebalanceReport::Assigned {
                user_id: event.user_id.clone(),
                pull_request_ids,
            })
        } else {
            let backfills = pull_requests::reassign_from_all_prs(&self.pool, &event.user_id).await?;
            Ok(RebalanceReport::Released {
                user_id: event.user_id.clone(),
                backfills,
            })
        }
    }

    /// Run the event loop until `shutdown` fires or every publisher is dropped.
    ///
    /// Cancellation also interrupts an event in flight; its transaction is
    /// dropped uncommitted and rolls back.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<RebalanceEvent>,
        shutdown: CancellationToken,
    ) -> WorkerStats {
        self.logger.info("Rebalance worker started");
        let mut stats = WorkerStats::default();

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.logger.info("Shutdown signal received, stopping rebalance worker");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => {
                        self.logger.info("Rebalance channel closed");
                        break;
                    }
                },
            };

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                result = self.handle_event(&event) => Some(result),
            };

            match result {
                None => {
                    self.logger.warn(&format!(
                        "Shutdown during rebalance for user {}, event abandoned",
                        event.user_id
                    ));
                    break;
                }
                Some(Ok(report)) => {
                    stats.processed += 1;
                    self.log_report(&report);
                }
                Some(Err(e)) => {
                    stats.failed += 1;
                    self.logger.error(&format!(
                        "Rebalance for user {} (is_active={}) failed: {}",
                        event.user_id, event.is_active, e
                    ));
                }
            }
        }

        self.logger.info(&format!(
            "Rebalance worker stopped: {} processed, {} failed",
            stats.processed, stats.failed
        ));
        stats
    }

    fn log_report(&self, report: &RebalanceReport) {
        match report {
            RebalanceReport::Assigned {
                user_id,
                pull_request_ids,
            } => {
                self.logger.info(&format!(
                    "Assigned user {} to {} understaffed pull request(s)",
                    user_id,
                    pull_request_ids.len()
                ));
            }
            RebalanceReport::Released { user_id, backfills } => {
                let unfilled = backfills.iter().filter(|b| b.replacement_id.is_none()).count();
                self.logger.info(&format!(
                    "Released user {} from {} open pull request(s), {} left without replacement",
                    user_id,
                    backfills.len(),
                    unfilled
                ));
            }
        }
    }
}
