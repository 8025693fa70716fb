use serde::Deserialize;
use serde_json::Value;

// estate (v1 and v2 share this shape)
//  ├── hash_id
//  ├── price
//  ├── price_czk          (v2 only)
//  │    └── value_raw
//  ├── locality
//  ├── name
//  ├── is_auction
//  ├── labelsAll
//  ├── seo
//  │    ├── locality
//  │    ├── category_type_cb
//  │    ├── category_main_cb
//  │    └── category_sub_cb
//  └── _links
//       └── images[]
//            └── href

/// Which flavour of the listing API a query talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V1,
    V2,
}

/// A configured search: the API flavour plus the filter URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Query {
    pub api: ApiVersion,
    pub url: String,
}

/// Cursor handed back by a page source to request the following page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    Offset(u64),
    Page(u64),
}

/// One raw estate payload, tagged with the API shape it came from.
#[derive(Debug, Clone)]
pub struct RawListing {
    pub api: ApiVersion,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct Page {
    pub records: Vec<RawListing>,
    pub next: Option<PageToken>,
}

#[derive(Debug, Deserialize)]
pub struct RawEstate {
    pub hash_id: Option<Value>,
    pub price: Option<Value>,
    pub price_czk: Option<PriceCzk>,
    pub locality: Option<String>,
    pub name: Option<String>,
    pub is_auction: Option<bool>,
    #[serde(rename = "labelsAll")]
    pub labels_all: Option<Value>,
    pub seo: Option<Seo>,
    #[serde(rename = "_links")]
    pub links: Option<Links>,
}

#[derive(Debug, Deserialize)]
pub struct PriceCzk {
    pub value_raw: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Seo {
    pub locality: Option<String>,
    pub category_type_cb: Option<u64>,
    pub category_main_cb: Option<u64>,
    pub category_sub_cb: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub images: Vec<Href>,
}

#[derive(Debug, Deserialize)]
pub struct Href {
    pub href: Option<String>,
}

/// `/api/v1/estates/search` response body.
#[derive(Debug, Deserialize)]
pub struct V1Envelope {
    pub results: Vec<Value>,
    pub pagination: Option<V1Pagination>,
}

#[derive(Debug, Deserialize)]
pub struct V1Pagination {
    pub limit: u64,
    pub offset: u64,
    pub total: u64,
}

/// `/api/cs/v2/estates` response body.
#[derive(Debug, Deserialize)]
pub struct V2Envelope {
    #[serde(rename = "_embedded")]
    pub embedded: V2Embedded,
    pub result_size: Option<u64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct V2Embedded {
    pub estates: Vec<Value>,
}
