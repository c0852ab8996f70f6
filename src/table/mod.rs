mod batch;
mod descriptor;
mod fetch;
mod gsi;
mod helpers;
mod keys;
mod operations;
mod types;

pub use batch::{
    BatchGetOutput, BatchReadOutput, BatchWriteOutput, batch_delete_items, batch_get,
    batch_get_items, batch_put_items, batch_write,
};
pub use descriptor::{Collection, KeySchema, Source};
pub use fetch::{
    Decoder, Page, PagedRequest, decode_item, fetch, fetch_stream, query, query_stream, scan,
    scan_stream,
};
pub use gsi::*;
pub use helpers::chunk;
pub use keys::{is_item_key_defined, is_key_defined, item_to_key, key_to_item, project_key};
pub use operations::*;
pub use types::{
    BatchConfig, CompositeKey, Consistency, Cursor, Direction, OutputItems, QueryOpts,
    RangeCondition, RetryConfig, ScanOpts, ScanSegment, SortKey,
};
