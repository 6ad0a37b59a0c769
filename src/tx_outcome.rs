/// How a [`UnitOfWork`](crate::unit_of_work::UnitOfWork) ended.
///
/// Either way the connection has already been handed back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    RolledBack,
}

impl TxOutcome {
    #[must_use]
    pub fn is_committed(self) -> bool {
        matches!(self, TxOutcome::Committed)
    }
}
