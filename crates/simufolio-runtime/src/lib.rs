//! # simufolio-runtime
//!
//! Production collaborator implementations for the simulation core: the
//! CoinGecko market data gateway and the Telegram chat transport. Both
//! bound every request with a client-level timeout so a slow upstream
//! can never hang a chat event or a sweep.

pub mod coingecko;
pub mod telegram;

pub use coingecko::{CoinGeckoConfig, CoinGeckoGateway};
pub use telegram::{TelegramConfig, TelegramTransport};
