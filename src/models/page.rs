use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config;

// ---------------------------------------------------------------------------
// PageRequest — Form parameters for one page of the price listing
// ---------------------------------------------------------------------------

/// Form fields posted to the price endpoint.
///
/// `None` fields are omitted from the encoded body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date_end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prod_pcatid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prod_catid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prod_name: Option<String>,
}

impl PageRequest {
    /// Request for a 1-based `page` of `limit` rows carrying the filters of `query`.
    pub fn page(query: &FetchQuery, page: u32, limit: u32) -> Self {
        let fmt = |d: &NaiveDate| d.format(config::REQUEST_DATE_FORMAT).to_string();
        Self {
            limit,
            current: Some(page),
            pub_date_start_time: query.from.as_ref().map(fmt),
            pub_date_end_time: query.to.as_ref().map(fmt),
            prod_pcatid: query.parent_category_id,
            prod_catid: query.category_id,
            prod_name: query.product.clone(),
        }
    }

    /// 1-based page index, defaulting to the first page.
    pub fn page_index(&self) -> u32 {
        self.current.unwrap_or(1)
    }
}

// ---------------------------------------------------------------------------
// FetchQuery — What a fetch run asks the source for
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub parent_category_id: Option<u32>,
    pub category_id: Option<u32>,
    pub product: Option<String>,
}

// ---------------------------------------------------------------------------
// RawPage — Response body plus the request that produced it
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RawPage {
    pub request: PageRequest,
    pub body: String,
}

// ---------------------------------------------------------------------------
// PageEnvelope / RawRow — JSON shape of a response body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub current: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    pub count: u64,
    pub list: Vec<RawRow>,
}

/// One listing entry as sent by the source.
///
/// Values are kept as raw JSON because the source mixes numbers, numeric
/// strings, empty strings and nulls for the same field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRow {
    pub prod_name: Option<serde_json::Value>,
    pub prod_cat: Option<serde_json::Value>,
    pub prod_pcat: Option<serde_json::Value>,
    pub unit_info: Option<serde_json::Value>,
    pub low_price: Option<serde_json::Value>,
    pub avg_price: Option<serde_json::Value>,
    pub high_price: Option<serde_json::Value>,
    pub place: Option<serde_json::Value>,
    pub spec_info: Option<serde_json::Value>,
    pub pub_date: Option<serde_json::Value>,
}
