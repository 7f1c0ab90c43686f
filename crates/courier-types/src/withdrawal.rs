//! Withdrawal requests against the partner's available balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a withdrawal request currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WithdrawalStatus {
	/// Accepted and counted against the balance, not yet handed to the bank.
	Processing,
	/// Handed to the bank. Money arrives within a day.
	Submitted,
	/// Withdrawn before submission. The amount is back in the balance.
	Cancelled,
}

impl fmt::Display for WithdrawalStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WithdrawalStatus::Processing => write!(f, "Processing"),
			WithdrawalStatus::Submitted => write!(f, "Submitted"),
			WithdrawalStatus::Cancelled => write!(f, "Cancelled"),
		}
	}
}

/// A request to move earnings to one of the partner's bank accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
	pub id: Uuid,
	pub amount: Decimal,
	/// Bank account the money goes to.
	pub account_id: String,
	pub requested_at: DateTime<Utc>,
	pub status: WithdrawalStatus,
}

impl Withdrawal {
	/// Creates a request in the `Processing` status.
	pub fn new(amount: Decimal, account_id: impl Into<String>, requested_at: DateTime<Utc>) -> Self {
		Self {
			id: Uuid::new_v4(),
			amount,
			account_id: account_id.into(),
			requested_at,
			status: WithdrawalStatus::Processing,
		}
	}

	/// True while the amount is held against the balance.
	pub fn holds_balance(&self) -> bool {
		self.status != WithdrawalStatus::Cancelled
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_cancelled_request_releases_balance() {
		let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
		let mut withdrawal = Withdrawal::new(Decimal::from(500), "acc1", at);
		assert_eq!(withdrawal.status, WithdrawalStatus::Processing);
		assert!(withdrawal.holds_balance());

		withdrawal.status = WithdrawalStatus::Submitted;
		assert!(withdrawal.holds_balance());

		withdrawal.status = WithdrawalStatus::Cancelled;
		assert!(!withdrawal.holds_balance());
	}

	#[test]
	fn test_status_serde_names() {
		let json = serde_json::to_string(&WithdrawalStatus::Processing).unwrap();
		assert_eq!(json, "\"processing\"");
	}
}
