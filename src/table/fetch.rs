//! Bounded pagination over Query and Scan.
//!
//! [`fetch`] keeps calling DynamoDB until it holds exactly the requested
//! number of items or the source runs out, and hands back a [`Cursor`] that
//! resumes right after the last item returned.

use aws_sdk_dynamodb::operation::query::builders::QueryInputBuilder;
use aws_sdk_dynamodb::operation::scan::builders::ScanInputBuilder;
use futures_util::{Stream, TryStreamExt, stream};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use tracing::debug;

use crate::error::{Error, KeyError};
use crate::table::descriptor::Collection;
use crate::table::helpers::query_builder;
use crate::table::types::{Cursor, OutputItems, QueryOpts, ScanOpts};
use crate::transport::Transport;
use crate::Item;

/// Turns a raw item into a record
pub type Decoder<T> = fn(Item) -> Result<T, serde_dynamo::Error>;

/// Default record codec backed by `serde_dynamo`
pub fn decode_item<T: DeserializeOwned>(item: Item) -> Result<T, serde_dynamo::Error> {
    serde_dynamo::from_item(item)
}

/// One response of a paged request
#[derive(Clone, Debug, Default)]
pub struct Page {
    /// Raw items in response order
    pub items: Vec<Item>,
    /// Server resume key, `None` when the source is exhausted
    pub last_evaluated_key: Option<Item>,
    /// Items evaluated before filtering
    pub scanned_count: usize,
}

/// A request that can be resent page after page
pub trait PagedRequest: Clone + Send + Sync {
    /// `Limit` currently set
    fn page_limit(&self) -> Option<i32>;

    /// Replace `Limit`
    fn with_page_limit(self, limit: Option<i32>) -> Self;

    /// `ExclusiveStartKey` currently set
    fn start_key(&self) -> Option<&Item>;

    /// Replace `ExclusiveStartKey`
    fn with_start_key(self, key: Option<Item>) -> Self;

    /// Whether a `FilterExpression` is set
    fn has_filter(&self) -> bool;

    /// Send through `transport`
    fn send_page<Tr: Transport>(
        self,
        transport: &Tr,
    ) -> impl Future<Output = Result<Page, Error>> + Send;
}

fn scanned(count: i32) -> usize {
    usize::try_from(count).unwrap_or(0)
}

impl PagedRequest for QueryInputBuilder {
    fn page_limit(&self) -> Option<i32> {
        *self.get_limit()
    }

    fn with_page_limit(self, limit: Option<i32>) -> Self {
        self.set_limit(limit)
    }

    fn start_key(&self) -> Option<&Item> {
        self.get_exclusive_start_key().as_ref()
    }

    fn with_start_key(self, key: Option<Item>) -> Self {
        self.set_exclusive_start_key(key)
    }

    fn has_filter(&self) -> bool {
        self.get_filter_expression().is_some()
    }

    fn send_page<Tr: Transport>(
        self,
        transport: &Tr,
    ) -> impl Future<Output = Result<Page, Error>> + Send {
        async move {
            let output = transport.query(self).await?;
            Ok(Page {
                items: output.items.unwrap_or_default(),
                last_evaluated_key: output.last_evaluated_key.filter(|key| !key.is_empty()),
                scanned_count: scanned(output.scanned_count),
            })
        }
    }
}

impl PagedRequest for ScanInputBuilder {
    fn page_limit(&self) -> Option<i32> {
        *self.get_limit()
    }

    fn with_page_limit(self, limit: Option<i32>) -> Self {
        self.set_limit(limit)
    }

    fn start_key(&self) -> Option<&Item> {
        self.get_exclusive_start_key().as_ref()
    }

    fn with_start_key(self, key: Option<Item>) -> Self {
        self.set_exclusive_start_key(key)
    }

    fn has_filter(&self) -> bool {
        self.get_filter_expression().is_some()
    }

    fn send_page<Tr: Transport>(
        self,
        transport: &Tr,
    ) -> impl Future<Output = Result<Page, Error>> + Send {
        async move {
            let output = transport.scan(self).await?;
            Ok(Page {
                items: output.items.unwrap_or_default(),
                last_evaluated_key: output.last_evaluated_key.filter(|key| !key.is_empty()),
                scanned_count: scanned(output.scanned_count),
            })
        }
    }
}

fn decode_page<T>(
    collection: &Collection,
    items: Vec<Item>,
    decode: Decoder<T>,
) -> Result<Vec<T>, Error> {
    items
        .into_iter()
        .map(|item| {
            decode(item.clone()).map_err(|e| Error::decode(collection.table_name(), item, e))
        })
        .collect()
}

/// Cursor after the last item kept from an overshooting page
///
/// The trimmed remainder can only be reached through this cursor, so an item
/// missing a key attribute is an error rather than an exhausted fetch.
fn overflow_cursor(collection: &Collection, item: &Item) -> Result<Cursor, Error> {
    Cursor::from_item(collection, item).ok_or_else(|| {
        let field = collection
            .cursor_fields()
            .into_iter()
            .find(|field| !item.contains_key(field))
            .unwrap_or_default();
        Error::Key(KeyError::MissingAttribute { field })
    })
}

/// Fetch exactly `desired` items, or every remaining item if fewer exist.
///
/// Without a filter or an explicit `Limit`, each call asks for just the
/// remaining count. When a page overshoots, the surplus is dropped and the
/// cursor is built from the last item kept, so resuming neither skips nor
/// repeats items. When the count is met exactly the server's
/// `LastEvaluatedKey` is the cursor. A missing `LastEvaluatedKey` ends the
/// fetch with no cursor.
///
/// A record that fails to decode aborts the whole fetch.
pub async fn fetch<T, Tr, P>(
    transport: &Tr,
    collection: &Collection,
    request: P,
    desired: usize,
    decode: Decoder<T>,
) -> Result<OutputItems<T>, Error>
where
    Tr: Transport,
    P: PagedRequest,
{
    if desired == 0 {
        return Ok(OutputItems {
            cursor: request.start_key().cloned().and_then(Cursor::from_key),
            ..OutputItems::default()
        });
    }

    let limit_to_remaining = request.page_limit().is_none() && !request.has_filter();
    let mut request = request;
    let mut output = OutputItems::default();

    loop {
        let remaining = desired - output.items.len();
        if limit_to_remaining {
            request = request.with_page_limit(Some(i32::try_from(remaining).unwrap_or(i32::MAX)));
        }

        let mut page = request.clone().send_page(transport).await?;
        output.pages += 1;
        output.scanned_count += page.scanned_count;

        debug!(
            table = collection.table_name(),
            index = collection.index_name(),
            page = output.pages,
            returned = page.items.len(),
            scanned = page.scanned_count,
            remaining,
            "fetched page"
        );

        if page.items.len() > remaining {
            page.items.truncate(remaining);
            let cursor = page
                .items
                .last()
                .map(|item| overflow_cursor(collection, item))
                .transpose()?;
            output.items.extend(decode_page(collection, page.items, decode)?);
            output.cursor = cursor;
            return Ok(output);
        }

        output.items.extend(decode_page(collection, page.items, decode)?);

        let Some(last_evaluated_key) = page.last_evaluated_key else {
            return Ok(output);
        };

        if output.items.len() == desired {
            output.cursor = Cursor::from_key(last_evaluated_key);
            return Ok(output);
        }

        request = request.with_start_key(Some(last_evaluated_key));
    }
}

type StreamState<P> = Option<(Collection, P)>;

async fn next_page<T, Tr, P>(
    transport: &Tr,
    state: StreamState<P>,
    decode: Decoder<T>,
) -> Result<Option<(Vec<T>, StreamState<P>)>, Error>
where
    Tr: Transport,
    P: PagedRequest,
{
    let Some((collection, request)) = state else {
        return Ok(None);
    };

    let page = request.clone().send_page(transport).await?;
    debug!(
        table = collection.table_name(),
        returned = page.items.len(),
        more = page.last_evaluated_key.is_some(),
        "streamed page"
    );

    let items = decode_page(&collection, page.items, decode)?;
    let next = page
        .last_evaluated_key
        .map(|key| (collection, request.with_start_key(Some(key))));
    Ok(Some((items, next)))
}

/// Stream every remaining item, one page at a time.
///
/// Items are yielded once their whole page decoded; a decode failure ends the
/// stream with that error.
pub fn fetch_stream<'a, T, Tr, P>(
    transport: &'a Tr,
    collection: Collection,
    request: P,
    decode: Decoder<T>,
) -> impl Stream<Item = Result<T, Error>> + Send + use<'a, T, Tr, P>
where
    T: Send,
    Tr: Transport,
    P: PagedRequest,
{
    stream::try_unfold(Some((collection, request)), move |state| {
        next_page(transport, state, decode)
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, Error>)))
    .try_flatten()
}

/// Query up to `desired` items
pub async fn query<T, Tr, H, R>(
    transport: &Tr,
    collection: &Collection,
    opts: &QueryOpts<H, R>,
    desired: usize,
) -> Result<OutputItems<T>, Error>
where
    T: DeserializeOwned,
    Tr: Transport,
    H: Serialize,
    R: Serialize,
{
    let input = query_builder::query_input(collection, opts)?;
    fetch(transport, collection, input, desired, decode_item::<T>).await
}

/// Scan up to `desired` items
pub async fn scan<T, Tr>(
    transport: &Tr,
    collection: &Collection,
    opts: &ScanOpts,
    desired: usize,
) -> Result<OutputItems<T>, Error>
where
    T: DeserializeOwned,
    Tr: Transport,
{
    let input = query_builder::scan_input(collection, opts)?;
    fetch(transport, collection, input, desired, decode_item::<T>).await
}

/// Stream every item matching a query
pub fn query_stream<'a, T, Tr, H, R>(
    transport: &'a Tr,
    collection: &Collection,
    opts: &QueryOpts<H, R>,
) -> Result<impl Stream<Item = Result<T, Error>> + Send + use<'a, T, Tr, H, R>, Error>
where
    T: DeserializeOwned + Send,
    Tr: Transport,
    H: Serialize,
    R: Serialize,
{
    let input = query_builder::query_input(collection, opts)?;
    Ok(fetch_stream(
        transport,
        collection.clone(),
        input,
        decode_item::<T>,
    ))
}

/// Stream every item of a scan
pub fn scan_stream<'a, T, Tr>(
    transport: &'a Tr,
    collection: &Collection,
    opts: &ScanOpts,
) -> Result<impl Stream<Item = Result<T, Error>> + Send + use<'a, T, Tr>, Error>
where
    T: DeserializeOwned + Send,
    Tr: Transport,
{
    let input = query_builder::scan_input(collection, opts)?;
    Ok(fetch_stream(
        transport,
        collection.clone(),
        input,
        decode_item::<T>,
    ))
}
