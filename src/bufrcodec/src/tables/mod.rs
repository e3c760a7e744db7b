pub mod loader;
pub mod registry;
pub mod table_b;
pub mod table_c;
pub mod table_d;

pub use loader::LocalKey;
pub use registry::{EffectiveTables, TableRegistry};
pub use table_b::{TableB, TableBEntry};
pub use table_c::TableC;
pub use table_d::TableD;
