/// Common test fixtures and data structures
///
/// Defines reusable records implementing DynamoTable and GSITable for use
/// across the integration tests.
use super::{Deserialize, DynamoTable, Item, Serialize};
use dynamo_fetch::table::{GSITable, SortKey};

/// Append-only event log, one partition per stream
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Event {
    pub stream: String,
    pub seq: u32,
    pub kind: String,
    pub actor: Option<String>,
}

impl Event {
    pub fn new(stream: &str, seq: u32, kind: &str) -> Self {
        Self {
            stream: stream.to_string(),
            seq,
            kind: kind.to_string(),
            actor: None,
        }
    }

    pub fn item(&self) -> Item {
        serde_dynamo::to_item(self).unwrap()
    }

    /// `count` events numbered from 1, kinds alternating between `keep` and `drop`
    pub fn series(stream: &str, count: u32) -> Vec<Self> {
        (1..=count)
            .map(|seq| Self::new(stream, seq, if seq % 2 == 0 { "keep" } else { "drop" }))
            .collect()
    }
}

impl DynamoTable for Event {
    type PK = String;
    type SK = u32;
    const TABLE: &'static str = "events";
    const PARTITION_KEY: &'static str = "stream";
    const SORT_KEY: Option<&'static str> = Some("seq");
    const FIELDS: &'static [&'static str] = &["kind", "actor"];

    fn partition_key(&self) -> String {
        self.stream.clone()
    }

    fn sort_key(&self) -> SortKey<u32> {
        Some(self.seq)
    }
}

impl GSITable for Event {
    const GSI_PARTITION_KEY: &'static str = "actor";
    const GSI_SORT_KEY: Option<&'static str> = Some("seq");
}

/// Hash-keyed record joined onto posts
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Author {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn item(&self) -> Item {
        serde_dynamo::to_item(self).unwrap()
    }
}

impl DynamoTable for Author {
    type PK = String;
    type SK = String;
    const TABLE: &'static str = "authors";
    const PARTITION_KEY: &'static str = "id";
    const FIELDS: &'static [&'static str] = &["name"];

    fn partition_key(&self) -> String {
        self.id.clone()
    }
}

/// Left-hand rows of the join tests; not stored
#[derive(PartialEq, Debug, Clone)]
pub struct Post {
    pub title: String,
    pub author_id: Option<String>,
}

impl Post {
    pub fn new(title: &str, author_id: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            author_id: author_id.map(str::to_string),
        }
    }
}
