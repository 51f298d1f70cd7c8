//! REST source backed by the public TCBS market data API.
//!
//! - Daily bars: `GET {base}/stock-insight/v1/stock/bars-long-term`
//! - Yearly ratios: `GET {base}/tcanalysis/v1/finance/{symbol}/financialratio`

pub mod params;
pub mod provider;
pub mod response;

pub use provider::TcbsProvider;
