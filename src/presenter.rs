use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::error::LedgerError;
use crate::models::{Shipment, ShipmentId, ShipmentStatus};
use crate::store::{SyncState, SyncStore};

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Load,
    Create {
        receiver: String,
        product_details: String,
    },
    Inspect {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// The session cannot continue; the user has to fix the host setup and restart.
    pub fatal: bool,
}

impl Notification {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            fatal: false,
        }
    }

    fn error(err: &LedgerError) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: user_message(err),
            fatal: err.is_fatal(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NotificationLevel::Info => write!(f, "{}", self.message),
            NotificationLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentRow {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub product_details: String,
    pub status: String,
}

impl fmt::Display for ShipmentRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "From: {} To: {} - Product: {} - Status: {}",
            self.sender, self.receiver, self.product_details, self.status
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub rows: Vec<ShipmentRow>,
    pub state: SyncState,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub revision: u64,
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "B2B Supply Chain Dashboard")?;
        match (self.state, self.refreshed_at) {
            (_, None) => writeln!(f, "(not loaded)")?,
            (SyncState::Fresh, Some(at)) => {
                writeln!(f, "(loaded {})", at.format("%Y-%m-%d %H:%M:%S UTC"))?
            }
            (SyncState::Stale, Some(at)) => writeln!(
                f,
                "(stale, loaded {}; reload to see recent changes)",
                at.format("%Y-%m-%d %H:%M:%S UTC")
            )?,
        }
        if self.refreshed_at.is_some() && self.rows.is_empty() {
            writeln!(f, "No shipments.")?;
        }
        for row in &self.rows {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// Display labels for ledger status codes. Codes without a label render
/// as the raw number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLabels(Vec<String>);

impl StatusLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    pub fn render(&self, status: ShipmentStatus) -> String {
        self.0
            .get(usize::from(status.code()))
            .filter(|label| !label.is_empty())
            .cloned()
            .unwrap_or_else(|| status.to_string())
    }
}

/// Maps store state to view models and routes user intents to the core.
pub struct PresentationAdapter {
    store: Arc<SyncStore>,
    labels: StatusLabels,
}

impl PresentationAdapter {
    pub fn new(store: Arc<SyncStore>, labels: StatusLabels) -> Self {
        Self { store, labels }
    }

    pub fn view(&self) -> DashboardView {
        let snapshot = self.store.snapshot();
        DashboardView {
            rows: snapshot.shipments.iter().map(|s| self.row(s)).collect(),
            state: self.store.state(),
            refreshed_at: snapshot.refreshed_at,
            revision: snapshot.revision,
        }
    }

    pub fn row(&self, shipment: &Shipment) -> ShipmentRow {
        ShipmentRow {
            id: shipment.id.to_string(),
            sender: shipment.sender.to_string(),
            receiver: shipment.receiver.to_string(),
            product_details: shipment.product_details.clone(),
            status: self.labels.render(shipment.status),
        }
    }

    /// Run one intent to completion. Failures come back as error
    /// notifications; nothing is retried.
    pub async fn dispatch(&self, intent: Intent) -> Notification {
        let outcome = match intent {
            Intent::Load => self.load().await,
            Intent::Create {
                receiver,
                product_details,
            } => self.create(&receiver, &product_details).await,
            Intent::Inspect { id } => self.inspect(&id).await,
        };

        outcome.unwrap_or_else(|e| {
            warn!(error = %e, "intent failed");
            Notification::error(&e)
        })
    }

    async fn load(&self) -> Result<Notification, LedgerError> {
        let snapshot = self.store.refresh().await?;
        let mut message = format!("Loaded {} shipment(s).", snapshot.shipments.len());
        if self.store.state() == SyncState::Stale {
            message.push_str(" Newer changes are pending; load again to see them.");
        }
        Ok(Notification::info(message))
    }

    async fn create(
        &self,
        receiver: &str,
        product_details: &str,
    ) -> Result<Notification, LedgerError> {
        let receipt = match self
            .store
            .registry()
            .create_shipment(receiver, product_details)
            .await
        {
            Ok(receipt) => receipt,
            Err(e @ LedgerError::ReceiptUnavailable { .. }) => {
                // The write may have landed, so the snapshot can no longer be trusted.
                self.store.mark_stale();
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.store.mark_stale();

        Ok(Notification::info(format!(
            "Shipment created! (transaction {})",
            receipt.transaction_hash
        )))
    }

    async fn inspect(&self, id: &str) -> Result<Notification, LedgerError> {
        let id: ShipmentId = id.parse()?;
        let shipment = self.store.registry().get_shipment(id).await?;
        Ok(Notification::info(self.row(&shipment).to_string()))
    }
}

/// User-facing text for an error.
pub fn user_message(err: &LedgerError) -> String {
    match err {
        LedgerError::NoProvider(_) => {
            "No ledger provider found. Set LEDGER_RPC_URL to a reachable ledger node and start again."
                .to_string()
        }
        LedgerError::AccountUnavailable(detail) => format!(
            "No ledger account is available ({}). Grant account access and start again.",
            detail
        ),
        LedgerError::TransactionRejected(_) => {
            "The transaction was not signed. You can try again.".to_string()
        }
        LedgerError::TransactionReverted(reason) => {
            format!("The ledger rejected the shipment: {}", reason)
        }
        LedgerError::CallReverted(reason) => format!("The ledger refused the query: {}", reason),
        LedgerError::ReceiptUnavailable { tx_hash, reason } => format!(
            "Transaction {} was submitted but its outcome is unknown ({}). Reload the list before creating the shipment again.",
            tx_hash, reason
        ),
        LedgerError::NotFound(id) => {
            format!("Shipment {} does not exist. Reload the list and try again.", id)
        }
        LedgerError::InvalidArgument(detail) => format!("Invalid input: {}", detail),
        LedgerError::MalformedResponse(detail) => {
            format!("The ledger returned unexpected data: {}", detail)
        }
        LedgerError::Transport(detail) => format!("Could not reach the ledger: {}", detail),
    }
}
