//! HTTP price oracle adapter.
//!
//! Speaks the price API's wire format: `GET
//! {host}/price_window/{type}/{symbol}?start=dd-MM-yyyy&end=dd-MM-yyyy`
//! returning `{ "data": [ { "day": "...", "quotes": { "USD": "..." } } ] }`.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::error::ReportError;
use crate::domain::instrument::InstrumentType;
use crate::domain::price_cache::ORACLE_DATE_FORMAT;
use crate::ports::price_source::{DailyPrice, PriceSource};

pub const DEFAULT_API_HOST: &str = "http://127.0.0.1:8000";

pub struct RestPriceAdapter {
    host: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct PriceWindowResponse {
    data: Vec<DailyPrice>,
}

impl RestPriceAdapter {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        log::info!("price source created for host {host}");
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { host, client }
    }
}

impl PriceSource for RestPriceAdapter {
    fn price_window(
        &self,
        instrument_type: InstrumentType,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyPrice>, ReportError> {
        let url = format!(
            "{}/price_window/{}/{}",
            self.host.trim_end_matches('/'),
            instrument_type.label(),
            symbol
        );
        // Transport, HTTP status and body-shape failures all collapse into
        // the same typed condition carrying the requested window.
        let unavailable = |e: &dyn std::fmt::Display| {
            log::error!("price api request failed for {url}: {e}");
            ReportError::PriceUnavailable {
                instrument_type,
                symbol: symbol.to_string(),
                start,
                end,
            }
        };

        let response = self
            .client
            .get(&url)
            .query(&[
                ("start", start.format(ORACLE_DATE_FORMAT).to_string()),
                ("end", end.format(ORACLE_DATE_FORMAT).to_string()),
            ])
            .send()
            .map_err(|e| unavailable(&e))?
            .error_for_status()
            .map_err(|e| unavailable(&e))?;

        let body: PriceWindowResponse = response.json().map_err(|e| unavailable(&e))?;
        Ok(body.data)
    }
}
