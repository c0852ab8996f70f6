use rand::Rng;
use serde::de::DeserializeOwned;
use std::{num::NonZeroUsize, time::Duration};

use crate::condition::Condition;
use crate::error::{Error, KeyError};
use crate::table::descriptor::Collection;
use crate::table::helpers::retry_config;
use crate::table::keys::{item_to_key, project_key};
use crate::Item;

/// Range component of a key, `None` for hash-only tables
pub type SortKey<SK> = Option<SK>;

/// Hash value paired with its optional range value
pub type CompositeKey<PK, SK> = (PK, SortKey<SK>);

/// Read consistency
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Consistency {
    /// Eventually consistent read
    #[default]
    Eventually,
    /// Strongly consistent read
    Strongly,
}

impl Consistency {
    /// Value of the `ConsistentRead` request field
    pub fn consistent_read(self) -> bool {
        matches!(self, Consistency::Strongly)
    }
}

/// Range key traversal order of a query
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Ascending
    #[default]
    Forward,
    /// Descending
    Backward,
}

impl Direction {
    /// Value of the `ScanIndexForward` request field
    pub fn scan_index_forward(self) -> bool {
        matches!(self, Direction::Forward)
    }
}

/// Condition on the range key of a query
#[derive(Clone, Debug, PartialEq)]
pub enum RangeCondition<R> {
    /// `range = value`
    Eq(R),
    /// `range < value`
    Lt(R),
    /// `range <= value`
    Le(R),
    /// `range > value`
    Gt(R),
    /// `range >= value`
    Ge(R),
    /// `range BETWEEN low AND high`
    Between(R, R),
    /// `begins_with(range, prefix)`
    BeginsWith(R),
}

/// Query options
///
/// ```rust
/// use dynamo_fetch::table::{Direction, QueryOpts, RangeCondition};
///
/// let opts = QueryOpts::new("user-1".to_string())
///     .range(RangeCondition::BeginsWith("2024-".to_string()))
///     .direction(Direction::Backward)
///     .page_size(50);
/// assert_eq!(opts.page_size, Some(50));
/// ```
#[derive(Clone, Debug)]
pub struct QueryOpts<H, R> {
    /// Hash key value
    pub hash_key: H,
    /// Optional range key condition
    pub range: Option<RangeCondition<R>>,
    /// Filter applied by DynamoDB after the key condition
    pub filter: Option<Condition>,
    /// Requested consistency
    pub consistency: Consistency,
    /// Traversal order
    pub direction: Direction,
    /// Server-side page size cap
    pub page_size: Option<u16>,
    /// Resume position
    pub start: Option<Cursor>,
}

impl<H, R> QueryOpts<H, R> {
    /// Options for every item under `hash_key`
    pub fn new(hash_key: H) -> Self {
        Self {
            hash_key,
            range: None,
            filter: None,
            consistency: Consistency::default(),
            direction: Direction::default(),
            page_size: None,
            start: None,
        }
    }

    /// Restrict the range key
    pub fn range(mut self, range: RangeCondition<R>) -> Self {
        self.range = Some(range);
        self
    }

    /// Filter results
    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set read consistency
    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Set traversal order
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Cap the number of items DynamoDB evaluates per call
    pub fn page_size(mut self, page_size: u16) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Resume from a cursor returned by a previous fetch
    pub fn start(mut self, start: Option<Cursor>) -> Self {
        self.start = start;
        self
    }
}

/// Segment of a parallel scan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanSegment {
    segment: i32,
    total_segments: i32,
}

impl ScanSegment {
    /// Largest `TotalSegments` DynamoDB accepts
    pub const MAX_SEGMENTS: i32 = 1_000_000;

    /// Segment `segment` of `total_segments`, `None` if out of range
    pub fn new(segment: i32, total_segments: i32) -> Option<Self> {
        let valid = (1..=Self::MAX_SEGMENTS).contains(&total_segments)
            && (0..total_segments).contains(&segment);
        valid.then_some(Self {
            segment,
            total_segments,
        })
    }

    /// Zero-based segment number
    pub fn segment(&self) -> i32 {
        self.segment
    }

    /// Total number of segments
    pub fn total_segments(&self) -> i32 {
        self.total_segments
    }
}

/// Scan options
#[derive(Clone, Debug, Default)]
pub struct ScanOpts {
    /// Filter applied by DynamoDB after reading
    pub filter: Option<Condition>,
    /// Requested consistency
    pub consistency: Consistency,
    /// Server-side page size cap
    pub page_size: Option<u16>,
    /// Parallel scan segment
    pub segment: Option<ScanSegment>,
    /// Resume position
    pub start: Option<Cursor>,
}

impl ScanOpts {
    /// Scan the whole collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter results
    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set read consistency
    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Cap the number of items DynamoDB evaluates per call
    pub fn page_size(mut self, page_size: u16) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Scan a single segment
    pub fn segment(mut self, segment: ScanSegment) -> Self {
        self.segment = Some(segment);
        self
    }

    /// Resume from a cursor returned by a previous fetch
    pub fn start(mut self, start: Option<Cursor>) -> Self {
        self.start = start;
        self
    }
}

/// Opaque resume position of a query or scan.
///
/// Holds every key attribute the source needs as `ExclusiveStartKey`: the
/// index key and the table key when reading an index.
#[must_use = "cursor should be used for pagination to fetch the next page"]
#[derive(Clone, Debug, PartialEq)]
pub struct Cursor {
    key: Item,
}

impl Cursor {
    /// Cursor positioned after `item`, `None` if a key attribute is missing
    pub fn from_item(collection: &Collection, item: &Item) -> Option<Self> {
        project_key(collection.cursor_fields(), item).map(|key| Self { key })
    }

    /// Wrap a `LastEvaluatedKey`, `None` when it is empty
    pub fn from_key(key: Item) -> Option<Self> {
        (!key.is_empty()).then_some(Self { key })
    }

    /// Decode the table key of the item the cursor points after
    pub fn key<PK, SK>(&self, collection: &Collection) -> Result<CompositeKey<PK, SK>, Error>
    where
        PK: DeserializeOwned,
        SK: DeserializeOwned,
    {
        let schema = collection.primary_key();
        item_to_key(schema, &self.key)?.ok_or_else(|| {
            let field = schema
                .fields()
                .find(|field| !self.key.contains_key(*field))
                .unwrap_or(schema.hash_key.as_str())
                .to_string();
            KeyError::MissingAttribute { field }.into()
        })
    }

    /// Raw key attributes
    pub fn as_item(&self) -> &Item {
        &self.key
    }

    /// Raw key attributes, for use as `ExclusiveStartKey`
    pub fn into_item(self) -> Item {
        self.key
    }
}

/// Items of a bounded fetch plus where to resume
#[must_use = "query results should be used or you'll lose the fetched data"]
#[derive(Clone, Debug)]
pub struct OutputItems<T> {
    /// Decoded items, at most the requested count
    pub items: Vec<T>,
    /// Resume position, `None` once the data is exhausted
    pub cursor: Option<Cursor>,
    /// Number of calls made
    pub pages: usize,
    /// Items DynamoDB evaluated before filtering
    pub scanned_count: usize,
}

impl<T> OutputItems<T> {
    /// Cursor for the next fetch, if more data may exist
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Whether the source has no more data after these items
    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }
}

impl<T> Default for OutputItems<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            pages: 0,
            scanned_count: 0,
        }
    }
}

/// Retry policy for unprocessed batch work
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retry rounds allowed before giving up, `None` retries until drained
    pub max_retries: Option<usize>,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound of the exponential delay
    pub max_delay: Duration,
}

impl RetryConfig {
    /// 100ms doubling up to 5s, no retry ceiling
    pub const DEFAULT: Self = Self {
        max_retries: None,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(5),
    };

    /// Give up after `max_retries` rounds
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Backoff before retry `attempt` (0-based), with equal jitter
    pub fn delay(&self, attempt: usize) -> Duration {
        let capped = retry_config::retry_delay(attempt, self.initial_delay, self.max_delay);
        let half = capped / 2;
        let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// Whether another round is allowed after `attempts` retries
    pub fn allows(&self, attempts: usize) -> bool {
        self.max_retries.is_none_or(|max| attempts < max)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("batch chunk size must be non-zero"),
    }
}

/// Chunk sizes and retry policy of the batch driver
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Write requests per BatchWriteItem call
    pub write_chunk_size: NonZeroUsize,
    /// Keys per BatchGetItem call
    pub read_chunk_size: NonZeroUsize,
    /// Retry policy for unprocessed items and keys
    pub retry: RetryConfig,
}

impl BatchConfig {
    /// DynamoDB limits: 25 writes and 100 reads per call
    pub const DEFAULT: Self = Self {
        write_chunk_size: non_zero(25),
        read_chunk_size: non_zero(100),
        retry: RetryConfig::DEFAULT,
    };

    /// Replace the retry policy
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
