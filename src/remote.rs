//! Remote catalog source

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::types::RawRecord;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; StampCatalogSync/1.0)";
/// Stop walking pages if the server never sends a short page
const MAX_PAGES: u32 = 10_000;

pub trait RemoteCatalogSource {
    /// Full raw dataset of one catalog. Paging happens inside.
    fn fetch_all(
        &self,
        catalog_id: &str,
        page_size: u32,
        auth_token: Option<&str>,
    ) -> Result<Vec<RawRecord>>;
}

/// A page is either a bare array or an envelope around one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogPage {
    Bare(Vec<RawRecord>),
    Envelope {
        #[serde(alias = "Items", alias = "data", alias = "Data")]
        items: Vec<RawRecord>,
    },
}

fn parse_page(body: &str) -> Result<Vec<RawRecord>> {
    let page: CatalogPage = serde_json::from_str(body)?;
    Ok(match page {
        CatalogPage::Bare(items) => items,
        CatalogPage::Envelope { items } => items,
    })
}

pub struct HttpCatalogSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpCatalogSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self, catalog_id: &str, page: u32, page_size: u32) -> String {
        format!(
            "{}/catalogs/{}/stamps?page={}&pageSize={}",
            self.base_url, catalog_id, page, page_size
        )
    }

    fn fetch_page(
        &self,
        catalog_id: &str,
        page: u32,
        page_size: u32,
        auth_token: Option<&str>,
    ) -> Result<Vec<RawRecord>> {
        let url = self.page_url(catalog_id, page, page_size);
        let mut request = self.client.get(&url);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Fetch {
                catalog_id: catalog_id.to_string(),
                message: format!("{} returned {}", url, status),
            });
        }
        let body = response.text()?;
        parse_page(&body)
    }
}

impl RemoteCatalogSource for HttpCatalogSource {
    fn fetch_all(
        &self,
        catalog_id: &str,
        page_size: u32,
        auth_token: Option<&str>,
    ) -> Result<Vec<RawRecord>> {
        let page_size = page_size.max(1);
        let mut records = Vec::new();
        for page in 1..=MAX_PAGES {
            let items = self.fetch_page(catalog_id, page, page_size, auth_token)?;
            let count = items.len();
            debug!(catalog_id, page, count, "Fetched catalog page");
            records.extend(items);
            if count < page_size as usize {
                break;
            }
        }
        info!(catalog_id, total = records.len(), "Fetched remote catalog");
        Ok(records)
    }
}
