pub mod builder;
pub mod curve;
pub mod executor;
pub mod fees;
pub mod gate;
pub mod listener;
pub mod monitor;

pub use curve::{BondingCurveState, PoolResolver, TokenHandle};
pub use executor::{BuyOutcome, TradeExecutor, TradeResult};
pub use gate::ConcurrencyGate;
pub use listener::PumpListener;
pub use monitor::{ExitMonitor, ExitParams};
