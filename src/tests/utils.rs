use crate::config::QueryGroup;
use crate::notifier::{Channel, NotifyError, Notifier};
use crate::scraper::{ApiVersion, Page, PageSource, PageToken, Query, RawListing, ScraperError};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;

/// A v1-shaped estate payload with the fields the pipeline cares about.
pub fn v1_estate(id: &str, price: i64) -> Value {
    json!({
        "hash_id": id,
        "price": price,
        "locality": "Brno - Líšeň",
        "name": format!("Prodej domu {id}"),
        "is_auction": false,
        "seo": { "locality": "brno-lisen" },
        "_links": { "images": [{ "href": format!("https://img.test/{id}.jpg") }] }
    })
}

pub fn query(url: &str) -> Query {
    Query {
        api: ApiVersion::V1,
        url: url.to_string(),
    }
}

pub fn group(name: &str, urls: &[&str]) -> QueryGroup {
    QueryGroup {
        name: name.to_string(),
        queries: urls.iter().map(|u| query(u)).collect(),
        new_channel: Channel::new(format!("{name}-new"), format!("https://hooks.test/{name}/new")),
        update_channel: Channel::new(
            format!("{name}-update"),
            format!("https://hooks.test/{name}/update"),
        ),
        removed_channel: None,
    }
}

pub fn group_with_removed(name: &str, urls: &[&str]) -> QueryGroup {
    QueryGroup {
        removed_channel: Some(Channel::new(
            format!("{name}-sold"),
            format!("https://hooks.test/{name}/sold"),
        )),
        ..group(name, urls)
    }
}

pub fn removed_channel() -> Channel {
    Channel::new("sold", "https://hooks.test/sold")
}

enum Step {
    Page(Vec<Value>),
    Fail,
}

/// Page source that replays scripted pages, per query url or a default script.
#[derive(Default)]
pub struct ScriptedSource {
    default: Vec<Step>,
    scripts: HashMap<String, Vec<Step>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, estates: Vec<Value>) -> Self {
        self.default.push(Step::Page(estates));
        self
    }

    pub fn failure(mut self) -> Self {
        self.default.push(Step::Fail);
        self
    }

    pub fn page_for(mut self, url: &str, estates: Vec<Value>) -> Self {
        self.scripts
            .entry(url.to_string())
            .or_default()
            .push(Step::Page(estates));
        self
    }

    pub fn failure_for(mut self, url: &str) -> Self {
        self.scripts.entry(url.to_string()).or_default().push(Step::Fail);
        self
    }
}

impl PageSource for ScriptedSource {
    fn fetch_page(&self, query: &Query, token: Option<PageToken>) -> Result<Page, ScraperError> {
        let steps = self.scripts.get(&query.url).unwrap_or(&self.default);
        let idx = match token {
            None => 0,
            Some(PageToken::Offset(i)) | Some(PageToken::Page(i)) => i as usize,
        };

        match steps.get(idx) {
            None => Ok(Page::default()),
            Some(Step::Fail) => Err(ScraperError::Status {
                status: 503,
                url: query.url.clone(),
            }),
            Some(Step::Page(estates)) => Ok(Page {
                records: estates
                    .iter()
                    .map(|payload| RawListing {
                        api: query.api,
                        payload: payload.clone(),
                    })
                    .collect(),
                next: (idx + 1 < steps.len()).then_some(PageToken::Offset(idx as u64 + 1)),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub channel: String,
    pub subject: String,
    pub body: String,
}

/// Records every notification; deliveries to `failing_channel` error out
/// after being recorded.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<Sent>>,
    pub failing_channel: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(channel: &str) -> Self {
        Self {
            sent: RefCell::default(),
            failing_channel: Some(channel.to_string()),
        }
    }

    pub fn sent_to(&self, channel: &str) -> Vec<Sent> {
        self.sent
            .borrow()
            .iter()
            .filter(|s| s.channel == channel)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, channel: &Channel, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(Sent {
            channel: channel.name.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        if self.failing_channel.as_deref() == Some(channel.name.as_str()) {
            return Err(NotifyError::ApiError {
                status: 500,
                body: "webhook down".to_string(),
            });
        }
        Ok(())
    }
}
