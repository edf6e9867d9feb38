//! Cookie-handshake session against the exchange's public JSON API.

pub mod response;
pub mod session;

pub use response::{MarketState, MarketStatusResponse};
pub use session::NseSession;
