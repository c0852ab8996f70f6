use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemInput;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemInput;
use aws_sdk_dynamodb::types::{
    ConsumedCapacity, DeleteRequest, ItemCollectionMetrics, KeysAndAttributes, PutRequest,
    ReturnConsumedCapacity, ReturnItemCollectionMetrics, WriteRequest,
};
use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Error;
use crate::table::DynamoTable;
use crate::table::helpers::chunk;
use crate::table::keys::{is_key_defined, key_to_item};
use crate::table::types::{BatchConfig, CompositeKey, Consistency, RetryConfig};
use crate::transport::Transport;
use crate::Item;

/// Batch write output containing metrics and tracking
///
/// Every request was processed once this is returned; unprocessed items are
/// retried until drained or the retry ceiling is hit.
#[must_use = "batch write results contain metrics that should be checked"]
#[derive(Debug, Default)]
pub struct BatchWriteOutput {
    /// Number of BatchWriteItem calls sent
    pub request_count: usize,
    /// Number of retry rounds (0 means everything went through at once)
    pub retry_count: usize,
    /// Total execution time including all retries
    pub total_duration: Duration,
    /// Item collection metrics per table, for tables with local secondary indexes
    pub item_collection_metrics: HashMap<String, Vec<ItemCollectionMetrics>>,
    /// Capacity units consumed by every call
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// Raw batch read output, items grouped by table
#[must_use = "batch get results contain the fetched items"]
#[derive(Debug, Default)]
pub struct BatchGetOutput {
    /// Items returned across all rounds, per table
    pub responses: BTreeMap<String, Vec<Item>>,
    /// Number of BatchGetItem calls sent
    pub request_count: usize,
    /// Number of retry rounds
    pub retry_count: usize,
    /// Total execution time including all retries
    pub total_duration: Duration,
    /// Capacity units consumed by every call
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// Typed batch read output
#[must_use = "batch read results contain the fetched items"]
#[derive(Debug)]
pub struct BatchReadOutput<T> {
    /// Items found; keys with no stored item are simply absent
    pub items: Vec<T>,
    /// Number of BatchGetItem calls sent
    pub request_count: usize,
    /// Number of retry rounds
    pub retry_count: usize,
    /// Total execution time including all retries
    pub total_duration: Duration,
    /// Capacity units consumed by every call
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

fn group_by_table<V>(requests: Vec<(String, V)>) -> HashMap<String, Vec<V>> {
    let mut grouped: HashMap<String, Vec<V>> = HashMap::new();
    for (table, request) in requests {
        grouped.entry(table).or_default().push(request);
    }
    grouped
}

/// Drop repeated keys of the same table, keeping first occurrences in order
fn unique_keys(keys: Vec<(String, Item)>) -> Vec<(String, Item)> {
    let mut seen: HashMap<String, Vec<Item>> = HashMap::new();
    let mut unique = Vec::with_capacity(keys.len());
    for (table, key) in keys {
        let table_keys = seen.entry(table.clone()).or_default();
        if !table_keys.contains(&key) {
            table_keys.push(key.clone());
            unique.push((table, key));
        }
    }
    unique
}

/// Wait before the next round, or fail once the retry ceiling is reached
async fn backoff(
    retry: &RetryConfig,
    operation: &'static str,
    attempts: usize,
    unprocessed: usize,
) -> Result<(), Error> {
    if !retry.allows(attempts) {
        return Err(Error::RetriesExhausted {
            operation,
            attempts,
            unprocessed,
        });
    }

    let delay = retry.delay(attempts);
    warn!(
        operation,
        unprocessed,
        retry = attempts + 1,
        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        "retrying unprocessed batch work"
    );
    sleep(delay).await;
    Ok(())
}

/// Write `(table, request)` pairs with BatchWriteItem
///
/// Each round splits the pending requests into chunks of
/// `config.write_chunk_size` and sends them one after another. Whatever
/// DynamoDB reports as unprocessed is resubmitted alone in the next round,
/// after a jittered exponential backoff.
///
/// # Errors
///
/// Transport errors abort the batch. With `config.retry.max_retries` set,
/// work still unprocessed after that many retries yields
/// [`Error::RetriesExhausted`].
pub async fn batch_write<Tr>(
    transport: &Tr,
    config: &BatchConfig,
    requests: Vec<(String, WriteRequest)>,
) -> Result<BatchWriteOutput, Error>
where
    Tr: Transport,
{
    let start_time = Instant::now();
    let mut output = BatchWriteOutput::default();
    let mut pending = requests;

    loop {
        let round_size = pending.len();
        let mut unprocessed: Vec<(String, WriteRequest)> = Vec::new();

        for batch in chunk(pending, config.write_chunk_size) {
            let input = BatchWriteItemInput::builder()
                .set_request_items(Some(group_by_table(batch)))
                .return_consumed_capacity(ReturnConsumedCapacity::Total)
                .return_item_collection_metrics(ReturnItemCollectionMetrics::Size);
            let result = transport.batch_write_item(input).await?;
            output.request_count += 1;

            if let Some(unprocessed_items) = result.unprocessed_items {
                let ordered: BTreeMap<String, Vec<WriteRequest>> =
                    unprocessed_items.into_iter().collect();
                for (table, requests) in ordered {
                    unprocessed.extend(requests.into_iter().map(|r| (table.clone(), r)));
                }
            }

            if let Some(item_collection_metrics) = result.item_collection_metrics {
                for (table_name, values) in item_collection_metrics {
                    output
                        .item_collection_metrics
                        .entry(table_name)
                        .or_default()
                        .extend(values);
                }
            }

            if let Some(capacities) = result.consumed_capacity {
                output.consumed_capacity.extend(capacities);
            }
        }

        debug!(
            round = output.retry_count,
            requests = round_size,
            unprocessed = unprocessed.len(),
            "batch write round finished"
        );

        if unprocessed.is_empty() {
            break;
        }

        backoff(
            &config.retry,
            "BatchWriteItem",
            output.retry_count,
            unprocessed.len(),
        )
        .await?;
        output.retry_count += 1;
        pending = unprocessed;
    }

    output.total_duration = start_time.elapsed();
    Ok(output)
}

/// Read `(table, key)` pairs with BatchGetItem
///
/// Same round structure as [`batch_write`], with chunks of
/// `config.read_chunk_size` keys. Responses of every round are accumulated,
/// so the result is the union of all rounds. A key repeated for the same
/// table is sent once, since BatchGetItem rejects duplicates.
pub async fn batch_get<Tr>(
    transport: &Tr,
    config: &BatchConfig,
    consistency: Consistency,
    keys: Vec<(String, Item)>,
) -> Result<BatchGetOutput, Error>
where
    Tr: Transport,
{
    let start_time = Instant::now();
    let mut output = BatchGetOutput::default();
    let mut pending = unique_keys(keys);

    loop {
        let round_size = pending.len();
        let mut unprocessed: Vec<(String, Item)> = Vec::new();

        for batch in chunk(pending, config.read_chunk_size) {
            let request_items = group_by_table(batch)
                .into_iter()
                .map(|(table, keys)| {
                    KeysAndAttributes::builder()
                        .set_keys(Some(keys))
                        .consistent_read(consistency.consistent_read())
                        .build()
                        .map(|keys| (table, keys))
                })
                .collect::<Result<HashMap<_, _>, _>>()?;

            let input = BatchGetItemInput::builder()
                .set_request_items(Some(request_items))
                .return_consumed_capacity(ReturnConsumedCapacity::Total);
            let result = transport.batch_get_item(input).await?;
            output.request_count += 1;

            if let Some(responses) = result.responses {
                for (table, items) in responses {
                    output.responses.entry(table).or_default().extend(items);
                }
            }

            if let Some(unprocessed_keys) = result.unprocessed_keys {
                let ordered: BTreeMap<String, KeysAndAttributes> =
                    unprocessed_keys.into_iter().collect();
                for (table, keys_attrs) in ordered {
                    unprocessed.extend(keys_attrs.keys.into_iter().map(|k| (table.clone(), k)));
                }
            }

            if let Some(capacities) = result.consumed_capacity {
                output.consumed_capacity.extend(capacities);
            }
        }

        debug!(
            round = output.retry_count,
            keys = round_size,
            unprocessed = unprocessed.len(),
            "batch get round finished"
        );

        if unprocessed.is_empty() {
            break;
        }

        backoff(
            &config.retry,
            "BatchGetItem",
            output.retry_count,
            unprocessed.len(),
        )
        .await?;
        output.retry_count += 1;
        pending = unprocessed;
    }

    output.total_duration = start_time.elapsed();
    Ok(output)
}

/// Batch retrieve records of `T` by key
///
/// Keys with an undefined component (sparse keys) are skipped.
pub async fn batch_get_items<T, Tr>(
    transport: &Tr,
    keys: Vec<CompositeKey<T::PK, T::SK>>,
    consistency: Consistency,
) -> Result<BatchReadOutput<T>, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let schema = T::key_schema();
    let mut wire_keys = Vec::with_capacity(keys.len());
    for key in keys.iter().filter(|key| is_key_defined(&schema, key)) {
        wire_keys.push((T::TABLE.to_string(), key_to_item(&schema, key)?));
    }

    let output = batch_get(transport, &T::BATCH_CONFIG, consistency, wire_keys).await?;

    let mut items = Vec::new();
    for item in output.responses.into_values().flatten() {
        let record = T::from_item(item.clone()).map_err(|e| Error::decode(T::TABLE, item, e))?;
        items.push(record);
    }

    Ok(BatchReadOutput {
        items,
        request_count: output.request_count,
        retry_count: output.retry_count,
        total_duration: output.total_duration,
        consumed_capacity: output.consumed_capacity,
    })
}

/// Batch put records of `T`
pub async fn batch_put_items<T, Tr>(transport: &Tr, items: &[T]) -> Result<BatchWriteOutput, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let mut requests = Vec::with_capacity(items.len());
    for value in items {
        let put_request = PutRequest::builder()
            .set_item(Some(value.to_item()?))
            .build()?;
        requests.push((
            T::TABLE.to_string(),
            WriteRequest::builder()
                .set_put_request(Some(put_request))
                .build(),
        ));
    }

    batch_write(transport, &T::BATCH_CONFIG, requests).await
}

/// Batch delete records of `T` by key
pub async fn batch_delete_items<T, Tr>(
    transport: &Tr,
    keys: Vec<CompositeKey<T::PK, T::SK>>,
) -> Result<BatchWriteOutput, Error>
where
    T: DynamoTable,
    Tr: Transport,
{
    let schema = T::key_schema();
    let mut requests = Vec::with_capacity(keys.len());
    for key in &keys {
        let delete_request = DeleteRequest::builder()
            .set_key(Some(key_to_item(&schema, key)?))
            .build()?;
        requests.push((
            T::TABLE.to_string(),
            WriteRequest::builder()
                .set_delete_request(Some(delete_request))
                .build(),
        ));
    }

    batch_write(transport, &T::BATCH_CONFIG, requests).await
}
