use serde::Deserialize;

/// Body of the market-status endpoint.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarketStatusResponse {
    pub market_state: Vec<MarketState>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    pub market_status: String,
}

impl MarketStatusResponse {
    /// Status string reported for `index`, if the index is listed.
    pub fn status_for(&self, index: &str) -> Option<&str> {
        self.market_state
            .iter()
            .find(|s| s.index.as_deref().map(str::trim) == Some(index))
            .map(|s| s.market_status.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_status_by_index_name() {
        let body = r#"{"marketState":[
            {"market":"Capital Market","marketStatus":"Open","tradeDate":"19-Oct-2026 09:20","index":"NIFTY 50"},
            {"market":"Currency","marketStatus":"Close","index":""}
        ]}"#;
        let parsed: MarketStatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status_for("NIFTY 50"), Some("Open"));
        assert_eq!(parsed.status_for("NIFTY BANK"), None);
    }
}
