use std::future::Future;
use std::time::Duration;

/// Error type returned by pluggable stores.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Record of authorization codes that have already been redeemed.
///
/// Shared by every request in the process (or, for an external cache,
/// every instance). [`InMemoryCodeStore`](crate::InMemoryCodeStore) is the
/// in-process implementation.
///
/// # Example
///
/// ```rust,ignore
/// impl UsedCodeStore for RedisCodes {
///     async fn insert_if_absent(&self, code: &str, ttl: Duration) -> Result<bool, StoreError> {
///         // SET key 1 NX PX ttl  ->  true when the key was written
///         let written: bool = self.conn().set_nx_px(code, ttl).await?;
///         Ok(written)
///     }
///
///     async fn purge_expired(&self) -> Result<usize, StoreError> {
///         Ok(0) // the cache expires keys itself
///     }
/// }
/// ```
pub trait UsedCodeStore: Send + Sync + 'static {
    /// Record `code` as used for `ttl`.
    ///
    /// Returns `true` if the code was not present (or its entry had expired)
    /// and is now recorded, `false` if an unexpired entry already existed.
    /// Check and insert must be a single atomic step: two concurrent calls
    /// with the same code must never both return `true`.
    fn insert_if_absent(
        &self,
        code: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Drop entries whose replay window has elapsed. Returns how many were removed.
    fn purge_expired(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
