//! Repository layer — entity-scoped database operations.
//!
//! One sub-module per table of the layout graph. Inserts return the
//! assigned row id immediately so children can reference their parent
//! inside the same transaction.

mod block;
mod consistency;
mod module;
mod partition;
mod region;
mod test_case;

pub use block::*;
pub use consistency::*;
pub use module::*;
pub use partition::*;
pub use region::*;
pub use test_case::*;
