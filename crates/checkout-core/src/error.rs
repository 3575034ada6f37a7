//! Error taxonomy shared by every checkout entry point.

use checkout_orders::OrderStoreError;
use checkout_storage::StorageError;
use checkout_types::{InvalidStatus, MissingIdentity};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the cart service, the checkout coordinator and the
/// order lifecycle manager.
#[derive(Debug, Error)]
pub enum CheckoutError {
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Unauthorized: {0}")]
	Unauthorized(String),
	#[error("Invalid state: {0}")]
	InvalidState(String),
	/// A store was unreachable, failed, or did not answer in time.
	#[error("Storage failure: {0}")]
	StorageFailure(String),
}

/// Coarse category of a [`CheckoutError`], for mapping onto a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	NotFound,
	Unauthorized,
	InvalidState,
	StorageFailure,
}

impl CheckoutError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			CheckoutError::NotFound(_) => ErrorKind::NotFound,
			CheckoutError::Unauthorized(_) => ErrorKind::Unauthorized,
			CheckoutError::InvalidState(_) => ErrorKind::InvalidState,
			CheckoutError::StorageFailure(_) => ErrorKind::StorageFailure,
		}
	}
}

impl From<StorageError> for CheckoutError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound => CheckoutError::NotFound("cart not found".into()),
			other => CheckoutError::StorageFailure(other.to_string()),
		}
	}
}

impl From<OrderStoreError> for CheckoutError {
	fn from(err: OrderStoreError) -> Self {
		match err {
			OrderStoreError::NotFound => CheckoutError::NotFound("order not found".into()),
			other => CheckoutError::StorageFailure(other.to_string()),
		}
	}
}

impl From<InvalidStatus> for CheckoutError {
	fn from(err: InvalidStatus) -> Self {
		CheckoutError::InvalidState(err.to_string())
	}
}

impl From<MissingIdentity> for CheckoutError {
	fn from(err: MissingIdentity) -> Self {
		CheckoutError::InvalidState(err.to_string())
	}
}

/// Runs one store call, failing with `StorageFailure` once `limit` elapses.
pub(crate) async fn bounded<T, E, F>(
	limit: Duration,
	operation: &'static str,
	call: F,
) -> Result<T, CheckoutError>
where
	F: Future<Output = Result<T, E>>,
	CheckoutError: From<E>,
{
	match tokio::time::timeout(limit, call).await {
		Ok(result) => result.map_err(CheckoutError::from),
		Err(_) => Err(CheckoutError::StorageFailure(format!(
			"{} timed out after {}ms",
			operation,
			limit.as_millis()
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_store_errors_map_to_kinds() {
		assert_eq!(
			CheckoutError::from(OrderStoreError::NotFound).kind(),
			ErrorKind::NotFound
		);
		assert_eq!(
			CheckoutError::from(OrderStoreError::Backend("down".into())).kind(),
			ErrorKind::StorageFailure
		);
		assert_eq!(
			CheckoutError::from(StorageError::Serialization("bad".into())).kind(),
			ErrorKind::StorageFailure
		);
		assert_eq!(
			CheckoutError::from(InvalidStatus("nope".into())).kind(),
			ErrorKind::InvalidState
		);
		assert_eq!(
			CheckoutError::from(MissingIdentity).kind(),
			ErrorKind::InvalidState
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_bounded_times_out() {
		let slow = async {
			tokio::time::sleep(Duration::from_secs(10)).await;
			Ok::<(), OrderStoreError>(())
		};
		let err = bounded(Duration::from_millis(50), "order create", slow)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::StorageFailure);
		assert!(err.to_string().contains("order create timed out"));
	}
}
