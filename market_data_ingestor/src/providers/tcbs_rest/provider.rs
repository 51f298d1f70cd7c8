use async_trait::async_trait;
use reqwest::{Client, Response};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{bar::RawBar, ratio::RatioRow, request_params::HistoryRequest},
    providers::{
        ClientBuildSnafu, MalformedSnafu, ProviderError, ProviderInitError, QuoteSource,
        SourceSettings, StatusSnafu,
        tcbs_rest::{
            params::{construct_history_params, construct_ratio_params},
            response::{TcbsBarsResponse, ticker_matches},
        },
    },
};

const DEFAULT_BASE_URL: &str = "https://apipubaws.tcbs.com.vn";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) portfolio-sync";

pub struct TcbsProvider {
    client: Client,
    base_url: String,
}

impl TcbsProvider {
    /// Creates a new TCBS source.
    ///
    /// The API is public; only the base URL and the client timeout are configurable.
    pub fn new(settings: &SourceSettings) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context(ClientBuildSnafu)?;

        let base_url = settings
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(
        &self,
        symbol: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Response, ProviderError> {
        debug!(%url, symbol, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(symbol, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return StatusSnafu {
                symbol,
                status,
                message,
            }
            .fail();
        }

        Ok(response)
    }
}

#[async_trait]
impl QuoteSource for TcbsProvider {
    fn name(&self) -> &str {
        "tcbs"
    }

    async fn fetch_history(&self, req: &HistoryRequest) -> Result<Vec<RawBar>, ProviderError> {
        let url = format!("{}/stock-insight/v1/stock/bars-long-term", self.base_url);
        let query = construct_history_params(req);

        let body = self
            .get(&req.symbol, &url, &query)
            .await?
            .json::<TcbsBarsResponse>()
            .await
            .map_err(|e| ProviderError::from_transport(&req.symbol, e))?;
        if !ticker_matches(&req.symbol, body.ticker.as_deref()) {
            return MalformedSnafu {
                symbol: req.symbol.as_str(),
                message: format!("bars returned for {:?}", body.ticker),
            }
            .fail();
        }

        body.data
            .into_iter()
            .map(|bar| {
                let stamp = bar.trading_date.clone();
                bar.into_raw().ok_or_else(|| {
                    MalformedSnafu {
                        symbol: req.symbol.as_str(),
                        message: format!("unparseable trading date {stamp:?}"),
                    }
                    .build()
                })
            })
            .collect()
    }

    async fn fetch_ratios(&self, symbol: &str) -> Result<Vec<RatioRow>, ProviderError> {
        let url = format!(
            "{}/tcanalysis/v1/finance/{}/financialratio",
            self.base_url, symbol
        );
        let query = construct_ratio_params();

        let rows = self
            .get(symbol, &url, &query)
            .await?
            .json::<Vec<RatioRow>>()
            .await
            .map_err(|e| ProviderError::from_transport(symbol, e))?;
        if let Some(row) = rows.iter().find(|r| !ticker_matches(symbol, r.ticker.as_deref())) {
            return MalformedSnafu {
                symbol,
                message: format!("ratio row for {:?}", row.ticker),
            }
            .fail();
        }
        Ok(rows)
    }
}
