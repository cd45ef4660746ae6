//! Fire-and-forget notification collaborator.
//!
//! Notifications are advisory. Callers log a failure and move on; a broken
//! mail gateway must never abort an approval or a ledger post.

use anyhow::Result;
use log::info;

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Employee(String),
    /// Everyone with an HR/admin role; fan-out is the implementation's
    /// problem.
    HrStaff,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: Recipient, message: &str) -> Result<()>;
}

/// Default implementation that only writes to the log. Useful for tests and
/// for deployments without a delivery channel configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: Recipient, message: &str) -> Result<()> {
        match recipient {
            Recipient::Employee(id) => info!("notification to employee {}: {}", id, message),
            Recipient::HrStaff => info!("notification to HR staff: {}", message),
        }
        Ok(())
    }
}
