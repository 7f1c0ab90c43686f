//! Ledger of settled payouts and withdrawal requests.
//!
//! The available balance is never stored. It is the opening balance plus
//! every recorded payout, minus every withdrawal that still holds funds.

use chrono::{DateTime, Utc};
use courier_settlement::{WithdrawalError, WithdrawalPolicy};
use courier_storage::{StorageError, StorageService};
use courier_types::{Payout, StorageKey, Withdrawal, WithdrawalStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors that can occur while reading or writing the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
	/// The requested amount is outside the withdrawal limits.
	#[error(transparent)]
	Rejected(#[from] WithdrawalError),
	#[error("Withdrawal not found: {0}")]
	WithdrawalNotFound(Uuid),
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Storage-backed record of what the partner earned and withdrew.
pub struct PayoutLedger {
	storage: Arc<StorageService>,
	policy: WithdrawalPolicy,
	opening_balance: Decimal,
	/// Held from a balance read until the write that depends on it.
	write_lock: Mutex<()>,
}

impl PayoutLedger {
	pub fn new(
		storage: Arc<StorageService>,
		policy: WithdrawalPolicy,
		opening_balance: Decimal,
	) -> Self {
		Self {
			storage,
			policy,
			opening_balance,
			write_lock: Mutex::new(()),
		}
	}

	/// Records a settled payout under its order id.
	pub async fn record_payout(&self, payout: &Payout) -> Result<(), LedgerError> {
		let _guard = self.write_lock.lock().await;
		self.storage
			.store(StorageKey::Payouts.as_str(), &payout.order_id, payout)
			.await
			.map_err(|e| LedgerError::Storage(e.to_string()))
	}

	/// Payout recorded for an order, if it has been settled.
	pub async fn payout_for(&self, order_id: &str) -> Result<Option<Payout>, LedgerError> {
		match self
			.storage
			.retrieve(StorageKey::Payouts.as_str(), order_id)
			.await
		{
			Ok(payout) => Ok(Some(payout)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(LedgerError::Storage(e.to_string())),
		}
	}

	/// Amount currently available for withdrawal.
	pub async fn balance(&self) -> Result<Decimal, LedgerError> {
		let payouts: Vec<Payout> = self
			.storage
			.list(StorageKey::Payouts.as_str())
			.await
			.map_err(|e| LedgerError::Storage(e.to_string()))?;
		let earned: Decimal = payouts.iter().map(|payout| payout.amount).sum();

		let held: Decimal = self
			.withdrawals()
			.await?
			.iter()
			.filter(|withdrawal| withdrawal.holds_balance())
			.map(|withdrawal| withdrawal.amount)
			.sum();

		Ok(self.opening_balance + earned - held)
	}

	/// Checks an amount against the limits without holding any funds.
	///
	/// Returns the balance the amount was checked against.
	pub async fn check(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
		let balance = self.balance().await?;
		self.policy.check(amount, balance)?;
		Ok(balance)
	}

	/// Accepts a withdrawal and holds its amount against the balance.
	pub async fn reserve(
		&self,
		amount: Decimal,
		account_id: &str,
		at: DateTime<Utc>,
	) -> Result<Withdrawal, LedgerError> {
		let _guard = self.write_lock.lock().await;
		let balance = self.balance().await?;
		self.policy.check(amount, balance)?;

		let withdrawal = Withdrawal::new(amount, account_id, at);
		self.storage
			.store(
				StorageKey::Withdrawals.as_str(),
				&withdrawal.id.to_string(),
				&withdrawal,
			)
			.await
			.map_err(|e| LedgerError::Storage(e.to_string()))?;
		Ok(withdrawal)
	}

	pub async fn withdrawal(&self, id: Uuid) -> Result<Withdrawal, LedgerError> {
		self.storage
			.retrieve(StorageKey::Withdrawals.as_str(), &id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => LedgerError::WithdrawalNotFound(id),
				other => LedgerError::Storage(other.to_string()),
			})
	}

	/// Moves a withdrawal to a new status and returns the updated record.
	pub async fn set_status(
		&self,
		id: Uuid,
		status: WithdrawalStatus,
	) -> Result<Withdrawal, LedgerError> {
		let _guard = self.write_lock.lock().await;
		let mut withdrawal = self.withdrawal(id).await?;
		withdrawal.status = status;
		self.storage
			.update(StorageKey::Withdrawals.as_str(), &id.to_string(), &withdrawal)
			.await
			.map_err(|e| LedgerError::Storage(e.to_string()))?;
		Ok(withdrawal)
	}

	/// Every withdrawal request, in any status.
	pub async fn withdrawals(&self) -> Result<Vec<Withdrawal>, LedgerError> {
		self.storage
			.list(StorageKey::Withdrawals.as_str())
			.await
			.map_err(|e| LedgerError::Storage(e.to_string()))
	}
}
