use crate::jsonl::Keyed;
use avatar_core::{classify, AvatarReport, ImageReference};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a stored avatar lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    Url(String),
    File(String),
}

/// A tracked avatar image, with the outcome of its most recent check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub local_file: String,
    pub added_at: DateTime<Utc>,
    /// Expected outcome, when the item is part of a labelled set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_pass: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<AvatarReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(id: u64, source: ItemSource, should_pass: Option<bool>) -> Self {
        let (url, local_file) = match source {
            ItemSource::Url(url) => (url, String::new()),
            ItemSource::File(path) => (String::new(), path),
        };
        Self {
            id,
            url,
            local_file,
            added_at: Utc::now(),
            should_pass,
            report: None,
            passed: None,
            checked_at: None,
        }
    }

    /// Classified image reference. The URL wins when both are set.
    pub fn reference(&self) -> ImageReference {
        if self.url.is_empty() {
            classify(&self.local_file)
        } else {
            classify(&self.url)
        }
    }

    pub fn record_report(&mut self, report: AvatarReport) {
        self.passed = Some(report.has_valid_avatar);
        self.checked_at = Some(Utc::now());
        self.report = Some(report);
    }

    /// Whether the last check matched the expected outcome. `None` until the
    /// item is both labelled and checked.
    pub fn agrees(&self) -> Option<bool> {
        Some(self.passed? == self.should_pass?)
    }
}

impl Keyed for Item {
    fn id(&self) -> u64 {
        self.id
    }
}
