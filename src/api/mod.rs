pub mod dexscreener;
pub mod jito;

pub use dexscreener::{DexScreenerClient, PairQuote};
pub use jito::JitoClient;
