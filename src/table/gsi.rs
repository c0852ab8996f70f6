use serde::Serialize;
use std::future::Future;

use crate::table::descriptor::{Collection, KeySchema};
use crate::table::keys::is_item_key_defined;
use crate::table::operations::{query_items, scan_items};
use crate::table::types::{OutputItems, QueryOpts, ScanOpts};
use crate::{Error, table::DynamoTable};

/// Global Secondary Index (GSI) table trait for querying on alternate keys
pub trait GSITable: DynamoTable {
    /// GSI partition key field name
    const GSI_PARTITION_KEY: &'static str;
    /// GSI sort key field name (optional)
    const GSI_SORT_KEY: Option<&'static str> = None;

    /// GSI index name
    fn global_index_name() -> String {
        if let Some(sort_key) = Self::GSI_SORT_KEY {
            format!(
                "global-{}-{}-{}",
                Self::TABLE,
                Self::GSI_PARTITION_KEY,
                sort_key
            )
        } else {
            format!("global-{}-{}", Self::TABLE, Self::GSI_PARTITION_KEY)
        }
    }

    /// Descriptor of the index
    fn gsi_collection() -> Collection {
        Self::collection().global_index(
            Self::global_index_name(),
            KeySchema::new(Self::GSI_PARTITION_KEY, Self::GSI_SORT_KEY),
        )
    }

    /// Whether this record appears in the index.
    ///
    /// Records with a missing or `NULL` index key are left out of a sparse
    /// index.
    fn has_gsi_key(&self) -> bool {
        self.to_item()
            .map(|item| {
                is_item_key_defined(
                    &KeySchema::new(Self::GSI_PARTITION_KEY, Self::GSI_SORT_KEY),
                    &item,
                )
            })
            .unwrap_or(false)
    }

    /// Query up to `limit` records through the index
    ///
    /// Strongly consistent reads are downgraded, GSIs only serve eventually
    /// consistent ones.
    fn query_gsi<H, R>(
        opts: &QueryOpts<H, R>,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<OutputItems<Self>, Error>>
    where
        H: Serialize,
        R: Serialize,
    {
        async move {
            let client = Self::dynamodb_client().await;
            query_items(client, &Self::gsi_collection(), opts, limit).await
        }
    }

    /// Scan up to `limit` records of the index
    fn scan_gsi(
        opts: &ScanOpts,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<OutputItems<Self>, Error>> {
        async move {
            let client = Self::dynamodb_client().await;
            scan_items(client, &Self::gsi_collection(), opts, limit).await
        }
    }
}
