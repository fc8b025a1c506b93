pub mod aggregate;
pub mod dataset;
pub mod page;
pub mod record;

pub use aggregate::*;
pub use dataset::*;
pub use page::*;
pub use record::*;
