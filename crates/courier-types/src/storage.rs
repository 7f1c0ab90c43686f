//! Storage-related types.

/// Namespaces used in the key/value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records from the order source
	Orders,
	/// Fulfillment sessions, one per open order
	Fulfillments,
	/// Settled payouts, keyed by order id
	Payouts,
	/// Withdrawal requests, keyed by request id
	Withdrawals,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Fulfillments => "fulfillments",
			StorageKey::Payouts => "payouts",
			StorageKey::Withdrawals => "withdrawals",
		}
	}
}
