//! Consumers of post-delivery feedback.

use async_trait::async_trait;
use courier_types::Feedback;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum FeedbackSinkError {
	#[error("Feedback sink unavailable: {0}")]
	Unavailable(String),
}

/// Receives feedback once it is stored on the fulfillment session.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
	async fn record(&self, order_id: &str, feedback: &Feedback) -> Result<(), FeedbackSinkError>;
}

/// Writes feedback to the log.
#[derive(Debug, Default)]
pub struct TracingFeedbackSink;

#[async_trait]
impl FeedbackSink for TracingFeedbackSink {
	async fn record(&self, order_id: &str, feedback: &Feedback) -> Result<(), FeedbackSinkError> {
		tracing::info!(
			order_id = %order_id,
			restaurant_rating = feedback.restaurant_rating,
			customer_rating = feedback.customer_rating,
			restaurant_comment = %feedback.restaurant_comment,
			customer_comment = %feedback.customer_comment,
			"Feedback recorded"
		);
		Ok(())
	}
}

/// Keeps feedback in memory, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct MemoryFeedbackSink {
	records: Arc<RwLock<Vec<(String, Feedback)>>>,
}

impl MemoryFeedbackSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of everything recorded so far.
	pub async fn records(&self) -> Vec<(String, Feedback)> {
		self.records.read().await.clone()
	}
}

#[async_trait]
impl FeedbackSink for MemoryFeedbackSink {
	async fn record(&self, order_id: &str, feedback: &Feedback) -> Result<(), FeedbackSinkError> {
		self.records
			.write()
			.await
			.push((order_id.to_string(), feedback.clone()));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_memory_sink_keeps_order() {
		let sink = MemoryFeedbackSink::new();
		let feedback = Feedback {
			restaurant_rating: 3,
			restaurant_comment: "ok".into(),
			customer_rating: 5,
			customer_comment: String::new(),
		};

		sink.record("ORD-001", &feedback).await.unwrap();
		sink.record("ORD-002", &feedback).await.unwrap();

		let ids: Vec<_> = sink.records().await.into_iter().map(|(id, _)| id).collect();
		assert_eq!(ids, vec!["ORD-001", "ORD-002"]);
	}
}
