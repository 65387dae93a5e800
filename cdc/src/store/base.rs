use crate::error::CdcResult;
use crate::mutation::RowMutation;

/// A transactional destination for row mutations.
#[async_trait::async_trait]
pub trait TargetStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> CdcResult<Box<dyn StoreTransaction>>;
}

/// One open transaction on a [`TargetStore`].
///
/// Dropping a transaction without committing discards its writes.
#[async_trait::async_trait]
pub trait StoreTransaction: Send {
    /// Executes the statement for `mutation`, returning the number of affected rows.
    async fn execute(&mut self, mutation: &RowMutation) -> CdcResult<u64>;

    async fn commit(self: Box<Self>) -> CdcResult<()>;

    async fn rollback(self: Box<Self>) -> CdcResult<()>;
}
