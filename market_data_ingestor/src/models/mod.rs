pub mod asset;
pub mod bar;
pub mod bar_series;
pub mod market_index;
pub mod ratio;
pub mod request_params;
