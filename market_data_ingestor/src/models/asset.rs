use serde::{Deserialize, Serialize};

/// Kind of instrument a history request targets.
///
/// Quoting sources route stocks and market indices to different query types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Stock,
    Index,
}

impl AssetClass {
    /// Query value understood by the REST sources.
    pub fn as_query_value(self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Index => "index",
        }
    }
}
