mod limiter;

pub use limiter::{SlotError, SlotPermit, SlotStats, TransactionSlots};
