pub mod router;
pub mod subscriber;

pub use router::*;
pub use subscriber::*;
