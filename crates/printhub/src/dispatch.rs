//! Job dispatch for external print workers.
//!
//! Every call goes straight to the store; nothing is cached between calls.

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::db::order_repo::{self, GuardedUpdate, OrderFilter, StatusCounts};
use crate::db::Database;
use crate::error::{PrintHubError, Result, ValidationError};
use crate::order::{Order, OrderId, OrderStatus};

/// How status reports that skip a lifecycle step are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Accept every report, log a warning for illegal transitions.
    #[default]
    Permissive,
    /// Reject illegal transitions with `InvalidTransition`.
    Strict,
}

impl TransitionPolicy {
    pub fn from_enforce_flag(enforce: bool) -> Self {
        if enforce {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }
}

/// Acknowledgement of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub id: OrderId,
    pub previous: OrderStatus,
    pub status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct JobDispatcher {
    db: Database,
    policy: TransitionPolicy,
}

impl JobDispatcher {
    pub fn new(db: Database, policy: TransitionPolicy) -> Self {
        Self { db, policy }
    }

    /// Claims the oldest pending order for the caller, if any.
    pub fn poll_next_job(&self) -> Result<Option<Order>> {
        let _span = info_span!("poll_next_job").entered();
        let job = order_repo::claim_oldest_pending(&self.db)?;
        if let Some(job) = &job {
            info!(order_id = %job.id, files = job.files.len(), "Job dispatched");
        }
        Ok(job)
    }

    /// Parses a worker-supplied status; only terminal statuses are reportable.
    pub fn parse_reported_status(raw: &str) -> Result<OrderStatus> {
        match raw.trim().parse::<OrderStatus>() {
            Ok(status) if status.is_terminal() => Ok(status),
            _ => Err(ValidationError::UnsupportedStatus(raw.to_string()).into()),
        }
    }

    /// Records the outcome a worker reports for a job.
    pub fn report_status(&self, id: &str, status: OrderStatus) -> Result<Ack> {
        let _span = info_span!("report_status", order_id = %id, status = %status).entered();

        if !status.is_terminal() {
            return Err(ValidationError::UnsupportedStatus(status.to_string()).into());
        }

        let change = match self.policy {
            TransitionPolicy::Permissive => {
                let change = order_repo::update_status(&self.db, id, status)?
                    .ok_or_else(|| PrintHubError::NotFound { id: id.to_string() })?;
                if !change.previous.can_transition_to(status) {
                    warn!(
                        order_id = %id,
                        from = %change.previous,
                        to = %status,
                        "Illegal status transition accepted"
                    );
                }
                change
            }
            TransitionPolicy::Strict => {
                match order_repo::update_status_guarded(&self.db, id, status)? {
                    GuardedUpdate::Updated(change) => change,
                    GuardedUpdate::NotFound => {
                        return Err(PrintHubError::NotFound { id: id.to_string() })
                    }
                    GuardedUpdate::Rejected { current } => {
                        warn!(order_id = %id, from = %current, to = %status, "Illegal status transition rejected");
                        return Err(PrintHubError::InvalidTransition {
                            id: id.to_string(),
                            from: current,
                            to: status,
                        });
                    }
                }
            }
        };

        info!(order_id = %id, from = %change.previous, to = %status, "Job status updated");
        Ok(Ack {
            id: change.order.id,
            previous: change.previous,
            status: change.order.status,
        })
    }

    pub fn get_order(&self, id: &str) -> Result<Order> {
        order_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| PrintHubError::NotFound { id: id.to_string() })
    }

    pub fn status_counts(&self) -> Result<StatusCounts> {
        Ok(order_repo::status_counts(&self.db)?)
    }

    /// Lists orders newest first, with the total matching `filter` before paging.
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64)> {
        Ok(order_repo::query(&self.db, filter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{ColorMode, FileEntry};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn seed(db: &Database) -> OrderId {
        let order = Order::new_pending(
            vec![FileEntry {
                file_name: "a.pdf".into(),
                saved_as: "a.pdf".into(),
                storage_ref: "/uploads/a.pdf".into(),
                from: None,
                to: None,
                color: ColorMode::Bw,
                copies: 1,
                page_count: 2,
            }],
            "Stripe".into(),
            4,
        );
        order_repo::insert(db, &order).unwrap()
    }

    fn dispatcher(policy: TransitionPolicy) -> (JobDispatcher, Database) {
        let db = Database::open_in_memory().unwrap();
        (JobDispatcher::new(db.clone(), policy), db)
    }

    /// Buffer that collects formatted events for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Runs `f` with a warn-level subscriber installed and returns what it logged.
    fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (out, text)
    }

    #[test]
    fn test_poll_claims_then_runs_dry() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Permissive);
        let id = seed(&db);

        let job = dispatcher.poll_next_job().unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, OrderStatus::Processing);
        assert!(dispatcher.poll_next_job().unwrap().is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Strict);
        let id = seed(&db);
        dispatcher.poll_next_job().unwrap();

        let ack = dispatcher.report_status(&id, OrderStatus::Completed).unwrap();
        assert_eq!(ack.previous, OrderStatus::Processing);
        assert_eq!(ack.status, OrderStatus::Completed);
        assert_eq!(dispatcher.get_order(&id).unwrap().status, OrderStatus::Completed);
    }

    #[test]
    fn test_non_terminal_status_is_rejected() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Permissive);
        let id = seed(&db);

        for status in [OrderStatus::Pending, OrderStatus::Processing] {
            let err = dispatcher.report_status(&id, status).unwrap_err();
            assert!(matches!(
                err,
                PrintHubError::Validation(ValidationError::UnsupportedStatus(_))
            ));
        }
        assert_eq!(dispatcher.get_order(&id).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn test_parse_reported_status() {
        assert_eq!(
            JobDispatcher::parse_reported_status("completed").unwrap(),
            OrderStatus::Completed
        );
        assert_eq!(
            JobDispatcher::parse_reported_status(" failed ").unwrap(),
            OrderStatus::Failed
        );
        assert!(JobDispatcher::parse_reported_status("processing").is_err());
        assert!(JobDispatcher::parse_reported_status("done").is_err());
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        for policy in [TransitionPolicy::Permissive, TransitionPolicy::Strict] {
            let (dispatcher, _) = dispatcher(policy);
            let err = dispatcher
                .report_status("missing", OrderStatus::Failed)
                .unwrap_err();
            assert!(matches!(err, PrintHubError::NotFound { .. }));
        }
    }

    #[test]
    fn test_permissive_policy_accepts_skipped_step() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Permissive);
        let id = seed(&db);

        let ack = dispatcher.report_status(&id, OrderStatus::Completed).unwrap();
        assert_eq!(ack.previous, OrderStatus::Pending);
        assert_eq!(ack.status, OrderStatus::Completed);
    }

    #[test]
    fn test_permissive_policy_warns_on_illegal_transition_only() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Permissive);

        let skipped = seed(&db);
        let (ack, logs) = capture_warnings(|| dispatcher.report_status(&skipped, OrderStatus::Completed));
        assert_eq!(ack.unwrap().previous, OrderStatus::Pending);
        assert!(logs.contains("Illegal status transition accepted"), "{logs}");
        assert!(logs.contains("from=pending"), "{logs}");
        assert!(logs.contains("to=completed"), "{logs}");

        let claimed = seed(&db);
        let job = dispatcher.poll_next_job().unwrap().unwrap();
        assert_eq!(job.id, claimed);
        let (ack, logs) = capture_warnings(|| dispatcher.report_status(&claimed, OrderStatus::Completed));
        assert_eq!(ack.unwrap().previous, OrderStatus::Processing);
        assert!(!logs.contains("Illegal status transition"), "{logs}");
    }

    #[test]
    fn test_strict_policy_rejects_skipped_step() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Strict);
        let id = seed(&db);

        let err = dispatcher
            .report_status(&id, OrderStatus::Completed)
            .unwrap_err();
        assert!(matches!(
            err,
            PrintHubError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed,
                ..
            }
        ));
        assert_eq!(dispatcher.get_order(&id).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn test_strict_policy_rejects_second_terminal_report() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Strict);
        let id = seed(&db);
        dispatcher.poll_next_job().unwrap();
        dispatcher.report_status(&id, OrderStatus::Failed).unwrap();

        let err = dispatcher
            .report_status(&id, OrderStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, PrintHubError::InvalidTransition { .. }));
    }

    #[test]
    fn test_status_counts() {
        let (dispatcher, db) = dispatcher(TransitionPolicy::Permissive);
        seed(&db);
        seed(&db);
        dispatcher.poll_next_job().unwrap();

        let counts = dispatcher.status_counts().unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 1);
    }

    #[test]
    fn test_policy_from_flag() {
        assert_eq!(TransitionPolicy::from_enforce_flag(true), TransitionPolicy::Strict);
        assert_eq!(TransitionPolicy::from_enforce_flag(false), TransitionPolicy::Permissive);
    }
}
