#![allow(dead_code)]
/// Test helpers and fixtures for the integration tests
///
/// [`MemoryStore`] is an in-memory [`Transport`] that pages like DynamoDB,
/// records every request it receives, and can be told to leave batch work
/// unprocessed. Key conditions are not evaluated: each table holds a single
/// partition.
pub mod fixtures;

pub use dynamo_fetch::table::DynamoTable;
pub use dynamo_fetch::{Error, Item, Transport};
pub use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
pub use fixtures::{Author, Event, Post};

use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemOutput;
use aws_sdk_dynamodb::operation::batch_get_item::builders::BatchGetItemInputBuilder;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemOutput;
use aws_sdk_dynamodb::operation::batch_write_item::builders::BatchWriteItemInputBuilder;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemOutput;
use aws_sdk_dynamodb::operation::delete_item::builders::DeleteItemInputBuilder;
use aws_sdk_dynamodb::operation::get_item::GetItemOutput;
use aws_sdk_dynamodb::operation::get_item::builders::GetItemInputBuilder;
use aws_sdk_dynamodb::operation::put_item::PutItemOutput;
use aws_sdk_dynamodb::operation::put_item::builders::PutItemInputBuilder;
use aws_sdk_dynamodb::operation::query::QueryOutput;
use aws_sdk_dynamodb::operation::query::builders::QueryInputBuilder;
use aws_sdk_dynamodb::operation::scan::ScanOutput;
use aws_sdk_dynamodb::operation::scan::builders::ScanInputBuilder;
use aws_sdk_dynamodb::types::{KeysAndAttributes, WriteRequest};
use std::collections::{HashMap, VecDeque};
use std::future::{Future, ready};
use std::sync::{Arc, Mutex};

/// Install a tracing subscriber honoring `RUST_LOG` (idempotent)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Filter = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

struct Table {
    key_fields: Vec<String>,
    page_size: usize,
    honor_limit: bool,
    filter: Option<Filter>,
    items: Vec<Item>,
}

impl Table {
    fn key_of(&self, item: &Item) -> Item {
        self.key_fields
            .iter()
            .filter_map(|field| item.get(field).map(|v| (field.clone(), v.clone())))
            .collect()
    }

    fn position(&self, key: &Item) -> Option<usize> {
        self.items
            .iter()
            .position(|item| key.iter().all(|(k, v)| item.get(k) == Some(v)))
    }

    fn upsert(&mut self, item: Item) {
        let key = self.key_of(&item);
        match self.position(&key) {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
    }

    fn remove(&mut self, key: &Item) {
        if let Some(index) = self.position(key) {
            let _ = self.items.remove(index);
        }
    }

    /// Evaluate one page starting after `start`
    fn page(
        &self,
        start: Option<&Item>,
        limit: Option<i32>,
        filtered: bool,
    ) -> (Vec<Item>, Option<Item>, usize) {
        let from = match start {
            Some(key) => self.position(key).map_or(self.items.len(), |i| i + 1),
            None => 0,
        };
        let mut budget = self.page_size;
        if self.honor_limit {
            if let Some(limit) = limit {
                budget = budget.min(limit as usize);
            }
        }
        let to = (from + budget).min(self.items.len());
        let evaluated = &self.items[from..to];

        let items = evaluated
            .iter()
            .filter(|item| match (&self.filter, filtered) {
                (Some(filter), true) => filter(*item),
                _ => true,
            })
            .cloned()
            .collect();
        let last_evaluated_key = (to < self.items.len())
            .then(|| evaluated.last().map(|item| self.key_of(item)))
            .flatten();
        (items, last_evaluated_key, evaluated.len())
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Table>,
    queries: Vec<QueryInputBuilder>,
    scans: Vec<ScanInputBuilder>,
    batch_writes: Vec<BatchWriteItemInputBuilder>,
    batch_gets: Vec<BatchGetItemInputBuilder>,
    puts: Vec<PutItemInputBuilder>,
    deletes: Vec<DeleteItemInputBuilder>,
    unprocessed_writes: VecDeque<usize>,
    unprocessed_keys: VecDeque<usize>,
}

impl State {
    fn table(&mut self, name: &Option<String>) -> &mut Table {
        let name = name.as_deref().unwrap_or_default();
        self.tables
            .get_mut(name)
            .unwrap_or_else(|| panic!("unknown table {name}"))
    }
}

/// In-memory DynamoDB stand-in
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table keyed by `key_fields`, serving at most `page_size`
    /// items per Query or Scan
    pub fn with_table(self, name: &str, key_fields: &[&str], page_size: usize) -> Self {
        let _ = self.state.lock().unwrap().tables.insert(
            name.to_string(),
            Table {
                key_fields: key_fields.iter().map(|f| f.to_string()).collect(),
                page_size,
                honor_limit: true,
                filter: None,
                items: Vec::new(),
            },
        );
        self
    }

    /// Serve full pages whatever `Limit` says
    pub fn ignoring_limit(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .table(&Some(name.to_string()))
            .honor_limit = false;
        self
    }

    /// Predicate applied to requests carrying a filter expression
    pub fn with_filter<F>(self, name: &str, filter: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.state
            .lock()
            .unwrap()
            .table(&Some(name.to_string()))
            .filter = Some(Arc::new(filter));
        self
    }

    pub fn insert(&self, table: &str, items: impl IntoIterator<Item = Item>) {
        let mut state = self.state.lock().unwrap();
        let table = state.table(&Some(table.to_string()));
        for item in items {
            table.upsert(item);
        }
    }

    pub fn items(&self, table: &str) -> Vec<Item> {
        self.state
            .lock()
            .unwrap()
            .table(&Some(table.to_string()))
            .items
            .clone()
    }

    /// Number of write requests successive BatchWriteItem calls leave unprocessed
    pub fn plan_unprocessed_writes(&self, counts: impl IntoIterator<Item = usize>) {
        self.state.lock().unwrap().unprocessed_writes.extend(counts);
    }

    /// Number of keys successive BatchGetItem calls leave unprocessed
    pub fn plan_unprocessed_keys(&self, counts: impl IntoIterator<Item = usize>) {
        self.state.lock().unwrap().unprocessed_keys.extend(counts);
    }

    pub fn queries(&self) -> Vec<QueryInputBuilder> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn scans(&self) -> Vec<ScanInputBuilder> {
        self.state.lock().unwrap().scans.clone()
    }

    pub fn batch_writes(&self) -> Vec<BatchWriteItemInputBuilder> {
        self.state.lock().unwrap().batch_writes.clone()
    }

    pub fn batch_gets(&self) -> Vec<BatchGetItemInputBuilder> {
        self.state.lock().unwrap().batch_gets.clone()
    }

    pub fn puts(&self) -> Vec<PutItemInputBuilder> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn deletes(&self) -> Vec<DeleteItemInputBuilder> {
        self.state.lock().unwrap().deletes.clone()
    }

    fn run_query(&self, input: QueryInputBuilder) -> QueryOutput {
        let mut state = self.state.lock().unwrap();
        state.queries.push(input.clone());
        let (items, last_evaluated_key, scanned) = state.table(input.get_table_name()).page(
            input.get_exclusive_start_key().as_ref(),
            *input.get_limit(),
            input.get_filter_expression().is_some(),
        );
        QueryOutput::builder()
            .count(items.len() as i32)
            .scanned_count(scanned as i32)
            .set_items(Some(items))
            .set_last_evaluated_key(last_evaluated_key)
            .build()
    }

    fn run_scan(&self, input: ScanInputBuilder) -> ScanOutput {
        let mut state = self.state.lock().unwrap();
        state.scans.push(input.clone());
        let (items, last_evaluated_key, scanned) = state.table(input.get_table_name()).page(
            input.get_exclusive_start_key().as_ref(),
            *input.get_limit(),
            input.get_filter_expression().is_some(),
        );
        ScanOutput::builder()
            .count(items.len() as i32)
            .scanned_count(scanned as i32)
            .set_items(Some(items))
            .set_last_evaluated_key(last_evaluated_key)
            .build()
    }

    fn run_batch_write(&self, input: BatchWriteItemInputBuilder) -> BatchWriteItemOutput {
        let mut state = self.state.lock().unwrap();
        state.batch_writes.push(input.clone());
        let mut skip = state.unprocessed_writes.pop_front().unwrap_or(0);
        let mut unprocessed: HashMap<String, Vec<WriteRequest>> = HashMap::new();

        for (name, requests) in input.get_request_items().clone().unwrap_or_default() {
            let table = state.table(&Some(name.clone()));
            let keep = requests.len() - skip.min(requests.len());
            for (i, request) in requests.into_iter().enumerate() {
                if i >= keep {
                    skip -= 1;
                    unprocessed.entry(name.clone()).or_default().push(request);
                    continue;
                }
                if let Some(put) = &request.put_request {
                    table.upsert(put.item.clone());
                }
                if let Some(delete) = &request.delete_request {
                    table.remove(&delete.key);
                }
            }
        }

        BatchWriteItemOutput::builder()
            .set_unprocessed_items(Some(unprocessed))
            .build()
    }

    fn run_batch_get(&self, input: BatchGetItemInputBuilder) -> BatchGetItemOutput {
        let mut state = self.state.lock().unwrap();
        state.batch_gets.push(input.clone());
        let mut skip = state.unprocessed_keys.pop_front().unwrap_or(0);
        let mut responses: HashMap<String, Vec<Item>> = HashMap::new();
        let mut unprocessed: HashMap<String, KeysAndAttributes> = HashMap::new();

        for (name, keys_and_attributes) in input.get_request_items().clone().unwrap_or_default() {
            let table = state.table(&Some(name.clone()));
            let keys = keys_and_attributes.keys;
            let keep = keys.len() - skip.min(keys.len());
            let mut left_over = Vec::new();
            for (i, key) in keys.into_iter().enumerate() {
                if i >= keep {
                    skip -= 1;
                    left_over.push(key);
                    continue;
                }
                if let Some(index) = table.position(&key) {
                    responses
                        .entry(name.clone())
                        .or_default()
                        .push(table.items[index].clone());
                }
            }
            if !left_over.is_empty() {
                let _ = unprocessed.insert(
                    name,
                    KeysAndAttributes::builder()
                        .set_keys(Some(left_over))
                        .build()
                        .unwrap(),
                );
            }
        }

        BatchGetItemOutput::builder()
            .set_responses(Some(responses))
            .set_unprocessed_keys(Some(unprocessed))
            .build()
    }

    fn run_get(&self, input: GetItemInputBuilder) -> GetItemOutput {
        let mut state = self.state.lock().unwrap();
        let table = state.table(input.get_table_name());
        let key = input.get_key().clone().unwrap_or_default();
        let item = table.position(&key).map(|index| table.items[index].clone());
        GetItemOutput::builder().set_item(item).build()
    }

    fn run_put(&self, input: PutItemInputBuilder) -> PutItemOutput {
        let mut state = self.state.lock().unwrap();
        state.puts.push(input.clone());
        let item = input.get_item().clone().unwrap_or_default();
        state.table(input.get_table_name()).upsert(item);
        PutItemOutput::builder().build()
    }

    fn run_delete(&self, input: DeleteItemInputBuilder) -> DeleteItemOutput {
        let mut state = self.state.lock().unwrap();
        state.deletes.push(input.clone());
        let key = input.get_key().clone().unwrap_or_default();
        state.table(input.get_table_name()).remove(&key);
        DeleteItemOutput::builder().build()
    }
}

impl Transport for MemoryStore {
    fn query(
        &self,
        input: QueryInputBuilder,
    ) -> impl Future<Output = Result<QueryOutput, Error>> + Send {
        ready(Ok(self.run_query(input)))
    }

    fn scan(
        &self,
        input: ScanInputBuilder,
    ) -> impl Future<Output = Result<ScanOutput, Error>> + Send {
        ready(Ok(self.run_scan(input)))
    }

    fn batch_get_item(
        &self,
        input: BatchGetItemInputBuilder,
    ) -> impl Future<Output = Result<BatchGetItemOutput, Error>> + Send {
        ready(Ok(self.run_batch_get(input)))
    }

    fn batch_write_item(
        &self,
        input: BatchWriteItemInputBuilder,
    ) -> impl Future<Output = Result<BatchWriteItemOutput, Error>> + Send {
        ready(Ok(self.run_batch_write(input)))
    }

    fn get_item(
        &self,
        input: GetItemInputBuilder,
    ) -> impl Future<Output = Result<GetItemOutput, Error>> + Send {
        ready(Ok(self.run_get(input)))
    }

    fn put_item(
        &self,
        input: PutItemInputBuilder,
    ) -> impl Future<Output = Result<PutItemOutput, Error>> + Send {
        ready(Ok(self.run_put(input)))
    }

    fn delete_item(
        &self,
        input: DeleteItemInputBuilder,
    ) -> impl Future<Output = Result<DeleteItemOutput, Error>> + Send {
        ready(Ok(self.run_delete(input)))
    }
}

/// Store with the fixture tables registered, pages of `page_size`
pub fn store(page_size: usize) -> MemoryStore {
    init_tracing();
    MemoryStore::new()
        .with_table(Event::TABLE, &["stream", "seq"], page_size)
        .with_table(Author::TABLE, &["id"], page_size)
}
