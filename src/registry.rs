use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

use crate::abi::{self, Token};
use crate::error::{LedgerError, Result};
use crate::gateway::LedgerGateway;
use crate::models::{
    AccountAddress, Connection, Shipment, ShipmentId, ShipmentStatus, TransactionReceipt,
};

pub const GET_ALL_SHIPMENTS: &str = "getAllShipments()";
pub const GET_SHIPMENT: &str = "getShipment(uint256)";
pub const CREATE_SHIPMENT: &str = "createShipment(address,string)";

/// Typed view of the shipment registry contract.
///
/// Gateway errors pass through unchanged and nothing is retried here.
pub struct ShipmentRegistryClient {
    gateway: Arc<dyn LedgerGateway>,
    connection: Connection,
}

impl ShipmentRegistryClient {
    /// Connect through `gateway` and bind to the account it resolves.
    pub async fn connect(gateway: Arc<dyn LedgerGateway>) -> Result<Self> {
        let connection = gateway.connect().await?;
        Ok(Self::new(gateway, connection))
    }

    pub fn new(gateway: Arc<dyn LedgerGateway>, connection: Connection) -> Self {
        Self {
            gateway,
            connection,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn active_account(&self) -> &AccountAddress {
        &self.connection.active_account
    }

    /// Registry membership at call time, in whatever order the ledger returns.
    pub async fn list_shipment_ids(&self) -> Result<Vec<ShipmentId>> {
        let raw = self.gateway.query(GET_ALL_SHIPMENTS, &[]).await?;
        let ids = abi::decode_uint_array(&raw)?
            .into_iter()
            .map(ShipmentId::new)
            .collect::<Vec<_>>();

        debug!(count = ids.len(), "listed shipment ids");
        Ok(ids)
    }

    pub async fn get_shipment(&self, id: ShipmentId) -> Result<Shipment> {
        let raw = self
            .gateway
            .query(GET_SHIPMENT, &[Token::Uint(id.value())])
            .await
            .map_err(|e| match e {
                LedgerError::CallReverted(_) => LedgerError::NotFound(id.to_string()),
                other => other,
            })?;

        let (sender, receiver, product_details, status) = abi::decode_shipment_fields(&raw)?;

        Shipment::from_ledger(
            id,
            sender,
            receiver,
            product_details,
            ShipmentStatus::try_from(status)?,
        )
    }

    /// Fetch every shipment concurrently. The result follows the id order,
    /// and the first failing fetch fails the whole call.
    pub async fn list_all_shipments(&self) -> Result<Vec<Shipment>> {
        let ids = self.list_shipment_ids().await?;
        try_join_all(ids.into_iter().map(|id| self.get_shipment(id))).await
    }

    /// Submit a new shipment from the active account.
    ///
    /// The ledger does not echo the new entity back; re-query to observe it.
    pub async fn create_shipment(
        &self,
        receiver: &str,
        product_details: &str,
    ) -> Result<TransactionReceipt> {
        if receiver.trim().is_empty() {
            return Err(LedgerError::invalid_argument("receiver must not be empty"));
        }
        if product_details.trim().is_empty() {
            return Err(LedgerError::invalid_argument("product details must not be empty"));
        }

        let receiver: AccountAddress = receiver.parse()?;
        if receiver.is_zero() {
            return Err(LedgerError::invalid_argument("receiver must not be the zero address"));
        }

        let receipt = self
            .gateway
            .execute(
                CREATE_SHIPMENT,
                &[
                    Token::Address(receiver),
                    Token::String(product_details.to_string()),
                ],
                &self.connection.active_account,
            )
            .await?;

        info!(
            tx_hash = %receipt.transaction_hash,
            receiver = %receiver,
            "shipment created"
        );
        Ok(receipt)
    }
}
