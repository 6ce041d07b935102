//! Outbound notification seam. The runtime only knows the contract; delivery
//! lives behind it so tests and the CLI can substitute their own.

use log::info;
use uuid::Uuid;

use crate::error::NotificationError;

/// Receipt for a dispatched notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
}

pub trait Notifier {
    /// Tells the recipient their submission has been received.
    fn send_collection_submission(
        &self,
        email_address: &str,
        reference: &str,
        collection_name: &str,
    ) -> Result<Notification, NotificationError>;
}

/// Default implementation: records the send in the log and succeeds. Used by
/// the CLI, where there is no delivery service to talk to.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_collection_submission(
        &self,
        email_address: &str,
        reference: &str,
        collection_name: &str,
    ) -> Result<Notification, NotificationError> {
        let notification = Notification { id: Uuid::new_v4() };
        info!(
            target: "notify",
            "submission receipt {} -> {email_address}: {reference} ({collection_name})",
            notification.id
        );
        Ok(notification)
    }
}
