pub mod counters;
pub mod session;

pub use counters::Counters;
pub use session::Session;
