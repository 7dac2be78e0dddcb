pub mod forecast;
pub mod pricing;
pub mod restock;

pub use forecast::*;
pub use pricing::*;
pub use restock::*;
