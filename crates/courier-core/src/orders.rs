//! Order source for the fulfillment engine.
//!
//! Order records are read-only inputs. The repository hands them to the
//! engine by id; the engine reads the origin status and never writes back.

use async_trait::async_trait;
use courier_storage::{StorageError, StorageService};
use courier_types::{
	Customer, EarningsBreakdown, OrderItem, OrderRecord, OriginStatus, Restaurant, StorageKey,
};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while reading or seeding order records.
#[derive(Debug, Error)]
pub enum RepositoryError {
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid seed data: {0}")]
	Seed(String),
}

/// Read access to order records, plus seeding.
#[async_trait]
pub trait OrderRepository: Send + Sync {
	/// Fetches a single order by id.
	async fn get_order(&self, order_id: &str) -> Result<OrderRecord, RepositoryError>;

	/// Every known order, ordered by id.
	async fn list_orders(&self) -> Result<Vec<OrderRecord>, RepositoryError>;

	/// Adds or replaces an order record.
	async fn store_order(&self, order: &OrderRecord) -> Result<(), RepositoryError>;
}

/// Order repository over the shared storage service.
pub struct StorageOrderRepository {
	storage: Arc<StorageService>,
}

impl StorageOrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Stores every record in `orders`, returning how many were written.
	pub async fn seed(&self, orders: &[OrderRecord]) -> Result<usize, RepositoryError> {
		for order in orders {
			self.store_order(order).await?;
		}
		tracing::debug!(count = orders.len(), "Seeded order repository");
		Ok(orders.len())
	}
}

#[async_trait]
impl OrderRepository for StorageOrderRepository {
	async fn get_order(&self, order_id: &str) -> Result<OrderRecord, RepositoryError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => RepositoryError::OrderNotFound(order_id.to_string()),
				other => RepositoryError::Storage(other.to_string()),
			})
	}

	async fn list_orders(&self) -> Result<Vec<OrderRecord>, RepositoryError> {
		self.storage
			.list(StorageKey::Orders.as_str())
			.await
			.map_err(|e| RepositoryError::Storage(e.to_string()))
	}

	async fn store_order(&self, order: &OrderRecord) -> Result<(), RepositoryError> {
		if order.id.trim().is_empty() {
			return Err(RepositoryError::Seed("order id cannot be empty".into()));
		}
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| RepositoryError::Storage(e.to_string()))
	}
}

/// Reads a JSON array of order records from disk.
pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<OrderRecord>, RepositoryError> {
	let path = path.as_ref();
	let content = tokio::fs::read_to_string(path)
		.await
		.map_err(|e| RepositoryError::Seed(format!("{}: {}", path.display(), e)))?;
	serde_json::from_str(&content)
		.map_err(|e| RepositoryError::Seed(format!("{}: {}", path.display(), e)))
}

fn rupees(paise: i64) -> Decimal {
	Decimal::new(paise, 2)
}

fn restaurant(name: &str, address: &str, distance_tenths: i64, time_mins: u32) -> Restaurant {
	Restaurant {
		name: name.to_string(),
		address: address.to_string(),
		distance_km: Decimal::new(distance_tenths, 1),
		time_mins,
	}
}

fn item(name: &str, quantity: u32, price: i64) -> OrderItem {
	OrderItem {
		name: name.to_string(),
		quantity,
		price: Decimal::from(price),
	}
}

fn earnings(base: i64, distance: i64, commission: i64, bonuses: Option<(i64, i64)>) -> EarningsBreakdown {
	let (membership_bonus, petrol_incentive) = match bonuses {
		Some((membership, petrol)) => (Some(rupees(membership)), Some(rupees(petrol))),
		None => (None, None),
	};
	let mut breakdown = EarningsBreakdown {
		base_pay: rupees(base),
		distance_pay: rupees(distance),
		commission: rupees(commission),
		membership_bonus,
		petrol_incentive,
		total: Decimal::ZERO,
	};
	breakdown.total = breakdown.component_sum();
	breakdown
}

/// Built-in demo dataset, used when no seed file is configured.
///
/// One active order, two delivered in earlier sessions and one cancelled.
pub fn demo_orders() -> Vec<OrderRecord> {
	const DEFAULT_ADDRESS: &str = "123 Food Street, Anytown";

	vec![
		OrderRecord {
			id: "ORD-001".into(),
			customer: Customer {
				name: "Rahul S.".into(),
				instructions: None,
			},
			destination: "Apartment 4B, Green View, HSR Layout".into(),
			restaurant: restaurant("Biryani House", "123 Food Street, Koramangala", 23, 15),
			distance_km: Decimal::new(68, 1),
			estimated_time_mins: 35,
			status: OriginStatus::InProgress,
			items: vec![item("Chicken Biryani", 1, 250), item("Coke", 2, 40)],
			earnings: earnings(1400, 5440, 7360, Some((2000, 1500))),
		},
		OrderRecord {
			id: "ORD-002".into(),
			customer: Customer {
				name: "Bob Williams".into(),
				instructions: None,
			},
			destination: "789 Pine St, Metropolis".into(),
			restaurant: restaurant("Pizza Palace", DEFAULT_ADDRESS, 20, 10),
			distance_km: Decimal::new(51, 1),
			estimated_time_mins: 25,
			status: OriginStatus::Delivered,
			items: vec![item("Margherita Pizza", 1, 300)],
			earnings: earnings(2000, 10000, 3000, None),
		},
		OrderRecord {
			id: "ORD-003".into(),
			customer: Customer {
				name: "Charlie Brown".into(),
				instructions: None,
			},
			destination: "101 Maple Dr, Gotham".into(),
			restaurant: restaurant("Sushi Central", DEFAULT_ADDRESS, 20, 10),
			distance_km: Decimal::new(25, 1),
			estimated_time_mins: 18,
			status: OriginStatus::Delivered,
			items: vec![item("California Roll", 2, 150)],
			earnings: earnings(1500, 6200, 2000, None),
		},
		OrderRecord {
			id: "ORD-004".into(),
			customer: Customer {
				name: "Diana Prince".into(),
				instructions: None,
			},
			destination: "222 Birch Ln, Star City".into(),
			restaurant: restaurant("Taco Town", DEFAULT_ADDRESS, 20, 10),
			distance_km: Decimal::new(40, 1),
			estimated_time_mins: 22,
			status: OriginStatus::Cancelled,
			items: vec![item("Beef Taco", 3, 90)],
			earnings: earnings(0, 0, 0, None),
		},
	]
}
