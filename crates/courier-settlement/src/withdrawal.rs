//! Limits on withdrawing settled earnings.

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a withdrawal amount is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WithdrawalError {
	#[error("Minimum withdrawal amount is {minimum}, requested {amount}")]
	BelowMinimum { amount: Decimal, minimum: Decimal },
	#[error("Requested {amount} exceeds available balance {balance}")]
	ExceedsBalance { amount: Decimal, balance: Decimal },
}

/// Bounds a single withdrawal must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalPolicy {
	pub minimum: Decimal,
}

impl WithdrawalPolicy {
	pub fn new(minimum: Decimal) -> Self {
		Self { minimum }
	}

	/// Accepts `amount` if it is at least the minimum and at most `balance`.
	///
	/// Both bounds are inclusive. The minimum is checked first, so a balance
	/// below the minimum reports `BelowMinimum` for small amounts.
	pub fn check(&self, amount: Decimal, balance: Decimal) -> Result<(), WithdrawalError> {
		if amount < self.minimum {
			return Err(WithdrawalError::BelowMinimum {
				amount,
				minimum: self.minimum,
			});
		}
		if amount > balance {
			return Err(WithdrawalError::ExceedsBalance { amount, balance });
		}
		Ok(())
	}
}

impl Default for WithdrawalPolicy {
	fn default() -> Self {
		Self::new(Decimal::from(100))
	}
}
