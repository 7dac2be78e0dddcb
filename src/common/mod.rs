pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod error;
pub mod event;

pub use aggregate::*;
pub use cache::*;
pub use clock::*;
pub use error::*;
pub use event::*;
