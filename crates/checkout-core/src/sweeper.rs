//! Retries cart clears that failed after a successful checkout.
//!
//! An order is authoritative once written; the cart delete that follows is
//! cleanup. When that delete fails the owner is remembered here together with
//! the `updated_at` of the cart that was checked out. A retry only deletes a
//! cart that has not been written since, so items added after checkout are
//! kept.

use crate::error::{bounded, CheckoutError};
use crate::event_bus::EventBus;
use checkout_storage::CartStore;
use checkout_types::{CheckoutEvent, OwnerKey};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
	/// Carts deleted on this pass.
	pub cleared: usize,
	/// Entries dropped because the cart was gone or had changed.
	pub skipped: usize,
	/// Entries still waiting after a failed retry.
	pub remaining: usize,
}

#[derive(Clone)]
pub struct CartSweeper {
	carts: CartStore,
	pending: Arc<Mutex<HashMap<OwnerKey, DateTime<Utc>>>>,
	event_bus: EventBus,
	timeout: Duration,
}

impl CartSweeper {
	pub fn new(carts: CartStore, event_bus: EventBus, timeout: Duration) -> Self {
		Self {
			carts,
			pending: Arc::new(Mutex::new(HashMap::new())),
			event_bus,
			timeout,
		}
	}

	/// Queues `owner` for a retry; `checked_out_at` is the `updated_at` of
	/// the cart the order was created from.
	pub async fn enqueue(&self, owner: OwnerKey, checked_out_at: DateTime<Utc>) {
		let mut pending = self.pending.lock().await;
		pending
			.entry(owner)
			.and_modify(|at| *at = (*at).max(checked_out_at))
			.or_insert(checked_out_at);
	}

	/// Number of owners waiting for a retry.
	pub async fn pending_count(&self) -> usize {
		self.pending.lock().await.len()
	}

	/// Retries every queued clear once.
	pub async fn sweep(&self) -> SweepReport {
		// Snapshot so store calls happen without holding the lock
		let queued: Vec<(OwnerKey, DateTime<Utc>)> = {
			let pending = self.pending.lock().await;
			pending.iter().map(|(k, v)| (k.clone(), *v)).collect()
		};

		let mut report = SweepReport::default();
		for (owner, checked_out_at) in queued {
			match self.retry(&owner, checked_out_at).await {
				Ok(true) => {
					report.cleared += 1;
					self.forget(&owner, checked_out_at).await;
					self.event_bus
						.publish(CheckoutEvent::CartSwept {
							owner: owner.clone(),
						})
						.ok();
				},
				Ok(false) => {
					report.skipped += 1;
					self.forget(&owner, checked_out_at).await;
				},
				Err(e) => {
					report.remaining += 1;
					tracing::warn!(owner = %owner, error = %e, "Cart clear retry failed");
				},
			}
		}

		if report == SweepReport::default() {
			tracing::debug!("Cart sweep: nothing queued");
		} else {
			tracing::info!(
				cleared = report.cleared,
				skipped = report.skipped,
				remaining = report.remaining,
				"Cart sweep finished"
			);
		}
		report
	}

	/// Drops TTL-expired carts from the backend.
	pub async fn cleanup_expired(&self) -> Result<usize, CheckoutError> {
		bounded(self.timeout, "cart cleanup", self.carts.cleanup_expired()).await
	}

	/// Returns `Ok(true)` when the stale cart was deleted.
	async fn retry(
		&self,
		owner: &OwnerKey,
		checked_out_at: DateTime<Utc>,
	) -> Result<bool, CheckoutError> {
		let current = bounded(self.timeout, "cart read", self.carts.get(owner)).await?;
		match current {
			Some(cart) if cart.updated_at <= checked_out_at => {
				bounded(self.timeout, "cart clear", self.carts.delete(owner)).await?;
				Ok(true)
			},
			_ => Ok(false),
		}
	}

	/// Removes the entry unless a newer failure replaced it meanwhile.
	async fn forget(&self, owner: &OwnerKey, checked_out_at: DateTime<Utc>) {
		let mut pending = self.pending.lock().await;
		if pending.get(owner) == Some(&checked_out_at) {
			pending.remove(owner);
		}
	}
}
