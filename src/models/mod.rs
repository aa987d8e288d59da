pub mod enums;
pub mod test_case;
pub mod module;
pub mod partition;
pub mod block;
pub mod region;

pub use enums::*;
pub use test_case::*;
pub use module::*;
pub use partition::*;
pub use block::*;
pub use region::*;
