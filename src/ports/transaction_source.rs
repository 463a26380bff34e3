//! Transaction source port trait.

use crate::domain::error::ReportError;
use crate::domain::transaction::TransactionDefinition;

/// Ordered sequence of raw transaction rows.
pub trait TransactionSource {
    fn read(&self) -> Result<Vec<TransactionDefinition>, ReportError>;
}
