use aws_sdk_dynamodb::operation::delete_item::{DeleteItemInput, DeleteItemOutput};
use aws_sdk_dynamodb::operation::get_item::GetItemInput;
use aws_sdk_dynamodb::operation::put_item::{PutItemInput, PutItemOutput};
use aws_sdk_dynamodb::types::{ReturnConsumedCapacity, ReturnValue};
use futures_util::{Stream, TryStreamExt, stream};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::future::Future;

use crate::Item;
use crate::condition::Condition;
use crate::error::Error;
use crate::table::batch::{
    BatchReadOutput, BatchWriteOutput, batch_delete_items, batch_get_items, batch_put_items,
};
use crate::table::descriptor::{Collection, KeySchema};
use crate::table::fetch::{fetch, fetch_stream};
use crate::table::helpers::query_builder;
use crate::table::keys::key_to_item;
use crate::table::types::{
    BatchConfig, CompositeKey, Consistency, OutputItems, QueryOpts, ScanOpts,
};
use crate::transport::Transport;

/// A record type stored in one DynamoDB table.
///
/// The constants describe the table; everything else has a default. Records
/// are encoded with `serde_dynamo` unless [`to_item`](DynamoTable::to_item)
/// and [`from_item`](DynamoTable::from_item) are overridden.
///
/// # Example
///
/// ```rust
/// use dynamo_fetch::DynamoTable;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Order {
///     user_id: String,
///     order_id: u64,
///     status: String,
/// }
///
/// impl DynamoTable for Order {
///     type PK = String;
///     type SK = u64;
///
///     const TABLE: &'static str = "orders";
///     const PARTITION_KEY: &'static str = "user_id";
///     const SORT_KEY: Option<&'static str> = Some("order_id");
///     const FIELDS: &'static [&'static str] = &["status"];
///
///     fn partition_key(&self) -> String {
///         self.user_id.clone()
///     }
///
///     fn sort_key(&self) -> Option<u64> {
///         Some(self.order_id)
///     }
/// }
///
/// assert!(Order::collection().has_field("status"));
/// ```
pub trait DynamoTable: Serialize + DeserializeOwned + Send + Sync {
    /// Associated partition key type
    type PK: Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug;

    /// Associated sort key type
    type SK: Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug;

    /// Name of table to retrieve
    const TABLE: &'static str;

    /// Partition key of the table
    const PARTITION_KEY: &'static str;

    /// Sort key of the table
    const SORT_KEY: Option<&'static str> = None;

    /// Non-key attributes conditions may reference
    const FIELDS: &'static [&'static str];

    /// Number of items `query` and `scan` return when no count is given
    const DEFAULT_PAGE_SIZE: u16 = 10;

    /// Chunk sizes and retry policy of batch operations
    const BATCH_CONFIG: BatchConfig = BatchConfig::DEFAULT;

    /// Partition key value of this record
    fn partition_key(&self) -> Self::PK;

    /// Sort key value of this record
    fn sort_key(&self) -> Option<Self::SK> {
        None
    }

    /// Full primary key of this record
    fn composite_key(&self) -> CompositeKey<Self::PK, Self::SK> {
        (self.partition_key(), self.sort_key())
    }

    /// Primary key schema of the table
    fn key_schema() -> KeySchema {
        KeySchema::new(Self::PARTITION_KEY, Self::SORT_KEY)
    }

    /// Descriptor of the base table
    fn collection() -> Collection {
        Collection::table(Self::TABLE, Self::key_schema()).with_fields(Self::FIELDS.iter().copied())
    }

    /// Encode this record
    fn to_item(&self) -> Result<Item, serde_dynamo::Error> {
        serde_dynamo::to_item(self)
    }

    /// Decode a record
    fn from_item(item: Item) -> Result<Self, serde_dynamo::Error> {
        serde_dynamo::from_item(item)
    }

    /// Get the DynamoDB client for this table
    ///
    /// By default, returns the global client. Can be overridden for testing
    /// or to use a different client per table.
    fn dynamodb_client() -> impl Future<Output = &'static aws_sdk_dynamodb::Client> {
        crate::dynamodb_client()
    }

    /// Get an item by its primary key, `None` if it does not exist
    fn get_item(
        partition_key: &Self::PK,
        sort_key: Option<&Self::SK>,
    ) -> impl Future<Output = Result<Option<Self>, Error>> {
        let key = (partition_key.clone(), sort_key.cloned());
        async move {
            let client = Self::dynamodb_client().await;
            get_item::<Self, _>(client, &key, Consistency::Eventually).await
        }
    }

    /// Put this record, replacing any item with the same key.
    ///
    /// With a condition the write only happens if it holds; otherwise the
    /// error satisfies [`Error::is_conditional_check_failed`].
    fn put_item(
        &self,
        condition: Option<&Condition>,
    ) -> impl Future<Output = Result<PutItemOutput, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            put_item(client, self, condition).await
        }
    }

    /// Put this record only if no item with its key exists
    fn insert_item(&self) -> impl Future<Output = Result<PutItemOutput, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            insert_item(client, self).await
        }
    }

    /// Delete an item by its primary key
    fn delete_item(
        partition_key: Self::PK,
        sort_key: Option<Self::SK>,
        condition: Option<&Condition>,
    ) -> impl Future<Output = Result<DeleteItemOutput, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            delete_item::<Self, _>(client, &(partition_key, sort_key), condition).await
        }
    }

    /// Query up to `limit` records (default `DEFAULT_PAGE_SIZE`)
    ///
    /// Resume with `opts.start(output.cursor)`.
    fn query(
        opts: &QueryOpts<Self::PK, Self::SK>,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<OutputItems<Self>, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            query_items(client, &Self::collection(), opts, limit).await
        }
    }

    /// Scan up to `limit` records (default `DEFAULT_PAGE_SIZE`)
    fn scan(
        opts: &ScanOpts,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<OutputItems<Self>, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            scan_items(client, &Self::collection(), opts, limit).await
        }
    }

    /// Stream every record matching a query
    fn query_stream(
        opts: QueryOpts<Self::PK, Self::SK>,
    ) -> impl Stream<Item = Result<Self, Error>> {
        let collection = Self::collection();
        let input = query_builder::query_input(&collection, &opts);
        stream::once(async move {
            let input = input?;
            let client = Self::dynamodb_client().await;
            Ok::<_, Error>(fetch_stream(client, collection, input, Self::from_item))
        })
        .try_flatten()
    }

    /// Batch retrieve records by key
    fn batch_get(
        keys: Vec<CompositeKey<Self::PK, Self::SK>>,
        consistency: Consistency,
    ) -> impl Future<Output = Result<BatchReadOutput<Self>, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            batch_get_items::<Self, _>(client, keys, consistency).await
        }
    }

    /// Batch put records
    fn batch_put(items: &[Self]) -> impl Future<Output = Result<BatchWriteOutput, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            batch_put_items(client, items).await
        }
    }

    /// Batch delete records by key
    fn batch_delete(
        keys: Vec<CompositeKey<Self::PK, Self::SK>>,
    ) -> impl Future<Output = Result<BatchWriteOutput, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            batch_delete_items::<Self, _>(client, keys).await
        }
    }
}

/// Get a single record by primary key
pub async fn get_item<T, Tr>(
    transport: &Tr,
    key: &CompositeKey<T::PK, T::SK>,
    consistency: Consistency,
) -> Result<Option<T>, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let input = GetItemInput::builder()
        .table_name(T::TABLE)
        .set_key(Some(key_to_item(&T::key_schema(), key)?))
        .consistent_read(consistency.consistent_read())
        .set_return_consumed_capacity(None);

    let result = transport.get_item(input).await?;

    match result.item {
        Some(item) => T::from_item(item.clone())
            .map(Some)
            .map_err(|e| Error::decode(T::TABLE, item, e)),
        None => Ok(None),
    }
}

/// Put a record, optionally guarded by a condition
pub async fn put_item<T, Tr>(
    transport: &Tr,
    payload: &T,
    condition: Option<&Condition>,
) -> Result<PutItemOutput, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let (expression, names, values) = match condition {
        Some(condition) => {
            let (expression, names, values) = condition.compile(&T::collection())?.into_parts();
            (Some(expression), names, values)
        }
        None => (None, None, None),
    };

    let input = PutItemInput::builder()
        .table_name(T::TABLE)
        .set_item(Some(payload.to_item()?))
        .set_condition_expression(expression)
        .set_expression_attribute_names(names)
        .set_expression_attribute_values(values)
        .return_values(ReturnValue::None)
        .return_consumed_capacity(ReturnConsumedCapacity::None);

    transport.put_item(input).await
}

/// Put a record only if its key is not taken yet
///
/// Fails with a conditional check error when an item with the same key
/// exists. The condition carries no values, so no value map is sent.
pub async fn insert_item<T, Tr>(transport: &Tr, payload: &T) -> Result<PutItemOutput, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let condition = Condition::not_exists(T::PARTITION_KEY);
    put_item(transport, payload, Some(&condition)).await
}

/// Delete a record by primary key, optionally guarded by a condition
pub async fn delete_item<T, Tr>(
    transport: &Tr,
    key: &CompositeKey<T::PK, T::SK>,
    condition: Option<&Condition>,
) -> Result<DeleteItemOutput, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let (expression, names, values) = match condition {
        Some(condition) => {
            let (expression, names, values) = condition.compile(&T::collection())?.into_parts();
            (Some(expression), names, values)
        }
        None => (None, None, None),
    };

    let input = DeleteItemInput::builder()
        .table_name(T::TABLE)
        .set_key(Some(key_to_item(&T::key_schema(), key)?))
        .set_condition_expression(expression)
        .set_expression_attribute_names(names)
        .set_expression_attribute_values(values)
        .set_return_consumed_capacity(None);

    transport.delete_item(input).await
}

/// Query up to `limit` records of `T` from `collection` (the table or one of its indexes)
pub async fn query_items<T, Tr, H, R>(
    transport: &Tr,
    collection: &Collection,
    opts: &QueryOpts<H, R>,
    limit: Option<usize>,
) -> Result<OutputItems<T>, Error>
where
    T: DynamoTable,
    Tr: Transport,
    H: Serialize,
    R: Serialize,
{
    let input = query_builder::query_input(collection, opts)?;
    let desired = limit.unwrap_or(usize::from(T::DEFAULT_PAGE_SIZE));
    fetch(transport, collection, input, desired, T::from_item).await
}

/// Scan up to `limit` records of `T` from `collection`
pub async fn scan_items<T, Tr>(
    transport: &Tr,
    collection: &Collection,
    opts: &ScanOpts,
    limit: Option<usize>,
) -> Result<OutputItems<T>, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let input = query_builder::scan_input(collection, opts)?;
    let desired = limit.unwrap_or(usize::from(T::DEFAULT_PAGE_SIZE));
    fetch(transport, collection, input, desired, T::from_item).await
}
