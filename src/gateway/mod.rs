//! Funds gateway boundary.
//!
//! The payment provider itself is an external collaborator; this module
//! only fixes the contract the engine requires from it and drives the two
//! money flows across it. Deposits credit the wallet once the provider
//! reports a checkout completed; withdrawals debit optimistically and are
//! compensated with a refund credit if the provider fails the transfer.

use crate::wallet::{EntryKind, WalletError, WalletManager};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Gateway checkout state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutStatus::Pending => write!(f, "pending"),
            CheckoutStatus::Completed => write!(f, "completed"),
            CheckoutStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Provider-side failure
    #[error("Gateway provider error: {0}")]
    Provider(String),

    /// Provider does not know the reference
    #[error("Unknown checkout reference: {0}")]
    UnknownReference(String),

    /// Wallet error while applying the flow
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Contract the engine requires from the external payment provider.
#[async_trait]
pub trait FundsGateway: Send + Sync {
    /// Open a deposit checkout; returns the provider's checkout reference.
    async fn initiate_deposit(&self, user_id: i64, amount: i64) -> GatewayResult<String>;

    /// Request an outbound transfer for an already-held withdrawal.
    async fn initiate_withdrawal(
        &self,
        user_id: i64,
        amount: i64,
        reference: &str,
    ) -> GatewayResult<()>;

    /// Poll the provider for the state of a checkout or transfer.
    async fn verify(&self, reference: &str) -> GatewayResult<CheckoutStatus>;
}

/// Drives deposit and withdrawal flows across a [`FundsGateway`].
///
/// All balance movement goes through the wallet primitives; the checkout
/// reference doubles as the ledger reference, which makes repeated polls
/// of the same checkout idempotent.
#[derive(Clone)]
pub struct PaymentsService<G> {
    gateway: G,
    wallet: WalletManager,
}

impl<G: FundsGateway> PaymentsService<G> {
    /// Create a new payments service
    pub fn new(gateway: G, wallet: WalletManager) -> Self {
        Self { gateway, wallet }
    }

    /// Open a deposit checkout with the provider.
    pub async fn start_deposit(&self, user_id: i64, amount: i64) -> GatewayResult<String> {
        if amount <= 0 {
            return Err(GatewayError::Wallet(WalletError::InvalidAmount(amount)));
        }
        self.gateway.initiate_deposit(user_id, amount).await
    }

    /// Poll a deposit checkout; on `Completed` the wallet is credited.
    /// Safe to poll repeatedly: a second completed poll finds the ledger
    /// reference already used and leaves the balance alone.
    pub async fn poll_deposit(
        &self,
        user_id: i64,
        amount: i64,
        reference: &str,
    ) -> GatewayResult<CheckoutStatus> {
        let status = self.gateway.verify(reference).await?;

        if status == CheckoutStatus::Completed {
            match self
                .wallet
                .credit(
                    user_id,
                    amount,
                    EntryKind::Deposit,
                    reference.to_string(),
                    None,
                    Some("Gateway deposit".to_string()),
                )
                .await
            {
                Ok(_) => {}
                // Credited on an earlier poll.
                Err(WalletError::DuplicateReference(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(status)
    }

    /// Hold a withdrawal (optimistic debit) and hand it to the provider.
    /// If the provider refuses outright, the hold is reversed before the
    /// error is returned. Returns the transfer reference to poll.
    pub async fn request_withdrawal(&self, user_id: i64, amount: i64) -> GatewayResult<String> {
        let reference = format!("wd:{}", Uuid::new_v4());
        self.wallet
            .begin_withdrawal(user_id, amount, reference.clone())
            .await?;

        if let Err(e) = self
            .gateway
            .initiate_withdrawal(user_id, amount, &reference)
            .await
        {
            log::warn!("withdrawal {reference} refused by provider, reversing hold");
            self.wallet.reverse_withdrawal(&reference).await?;
            return Err(e);
        }

        Ok(reference)
    }

    /// Poll a withdrawal transfer; settles the held entry on `Completed`,
    /// reverses it with a compensating refund on `Failed`. Repeated polls
    /// after the entry left pending are no-ops.
    pub async fn poll_withdrawal(&self, reference: &str) -> GatewayResult<CheckoutStatus> {
        let status = self.gateway.verify(reference).await?;

        match status {
            CheckoutStatus::Pending => {}
            CheckoutStatus::Completed => match self.wallet.settle_withdrawal(reference).await {
                Ok(()) => {}
                Err(WalletError::EntryNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            },
            CheckoutStatus::Failed => match self.wallet.reverse_withdrawal(reference).await {
                Ok(_) => {
                    log::warn!("withdrawal {reference} failed at provider, hold reversed");
                }
                Err(WalletError::EntryNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            },
        }

        Ok(status)
    }
}
