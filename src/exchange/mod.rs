pub mod client;
pub mod paper;

pub use client::MarketGateway;
pub use paper::PaperExchange;
