//! # dynamo-fetch
//!
//! Client-side orchestration for DynamoDB reads and writes:
//! - bounded Query and Scan fetches that return exactly the requested number
//!   of items and a cursor resuming right after the last one
//! - batch writes and reads chunked to DynamoDB's limits, with unprocessed
//!   work retried under jittered exponential backoff
//! - a condition builder compiled to placeholder expressions
//! - left and inner joins resolved with a single batched lookup
//!
//! Everything goes through the [`Transport`] trait, implemented for
//! [`aws_sdk_dynamodb::Client`]. The typed layer ([`DynamoTable`],
//! [`GSITable`]) uses a lazily initialized global client.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamo_fetch::condition::{Condition, attribute_value};
//! use dynamo_fetch::table::QueryOpts;
//! use dynamo_fetch::{DynamoTable, Error};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Order {
//!     user_id: String,
//!     order_id: String,
//!     status: String,
//! }
//!
//! impl DynamoTable for Order {
//!     type PK = String;
//!     type SK = String;
//!
//!     const TABLE: &'static str = "orders";
//!     const PARTITION_KEY: &'static str = "user_id";
//!     const SORT_KEY: Option<&'static str> = Some("order_id");
//!     const FIELDS: &'static [&'static str] = &["status"];
//!
//!     fn partition_key(&self) -> Self::PK {
//!         self.user_id.clone()
//!     }
//!
//!     fn sort_key(&self) -> Option<Self::SK> {
//!         Some(self.order_id.clone())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
//!     dynamo_fetch::init(&config).await;
//!
//!     let opts = QueryOpts::new("u-1".to_string())
//!         .filter(Condition::eq("status", attribute_value("open")?));
//!
//!     // exactly 100 open orders, or all of them if fewer exist
//!     let page = Order::query(&opts, Some(100)).await?;
//!
//!     if let Some(cursor) = page.cursor {
//!         let _next = Order::query(&opts.start(Some(cursor)), Some(100)).await?;
//!     }
//!     Ok(())
//! }
//! ```
#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    deprecated,
    unreachable_code,
    unused_mut
)]
#![warn(unused, unreachable_pub, unused_qualifications, unused_results)]

mod error;
pub use error::{DecodeError, Error, ExpressionError, KeyError};

/// Condition trees and their placeholder compiler
pub mod condition;

/// Collections, keys, fetching, batching and the typed record layer
pub mod table;

/// Batched joins over typed records
pub mod methods;

/// The request seam
pub mod transport;

// Re-export main types for convenience
pub use aws_sdk_dynamodb::types::AttributeValue;
pub use methods::DynamoTableMethods;
pub use table::{CompositeKey, DynamoTable, GSITable};
pub use transport::Transport;

/// A raw DynamoDB item
pub type Item = std::collections::HashMap<String, AttributeValue>;

// Re-export aws-config types for configuration
pub use aws_config::{
    BehaviorVersion, Region, SdkConfig, defaults,
    meta::region::{ProvideRegion, RegionProviderChain},
    retry::{RetryConfig, RetryMode},
    timeout::TimeoutConfig,
};

// Re-export aws-types for advanced configuration
pub use aws_types::sdk_config::Builder as SdkConfigBuilder;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Global DynamoDB client instance
static GLOBAL_CLIENT: OnceCell<DynamoDbClient> = OnceCell::const_new();

const LOCALSTACK_PROFILE: &str = "localstack";
const LOCALSTACK_ENDPOINT: &str = "http://127.0.0.1:4566";

/// SDK configuration used when nothing was registered with [`init`].
///
/// Adaptive retries (3 attempts, 1s initial backoff), 3s connect, 20s read
/// and 60s operation timeouts. `AWS_PROFILE=localstack` points the client at
/// a local LocalStack endpoint.
async fn aws_config_defaults() -> SdkConfig {
    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(3))
        .read_timeout(Duration::from_secs(20))
        .operation_timeout(Duration::from_secs(60))
        .build();

    let mut loader = defaults(BehaviorVersion::latest())
        .retry_config(
            RetryConfig::adaptive()
                .with_max_attempts(3)
                .with_initial_backoff(Duration::from_secs(1)),
        )
        .timeout_config(timeout_config);

    if std::env::var("AWS_PROFILE").is_ok_and(|profile| profile == LOCALSTACK_PROFILE) {
        loader = loader.endpoint_url(LOCALSTACK_ENDPOINT);
    }

    loader.load().await
}

/// Register the global client built from `config`.
///
/// Has no effect once the global client exists.
///
/// ```rust,no_run
/// # async fn example() {
/// let config = dynamo_fetch::defaults(dynamo_fetch::BehaviorVersion::latest())
///     .region(dynamo_fetch::Region::new("eu-west-1"))
///     .load()
///     .await;
/// dynamo_fetch::init(&config).await;
/// # }
/// ```
pub async fn init(config: &SdkConfig) {
    let _ = GLOBAL_CLIENT
        .get_or_init(|| async { DynamoDbClient::new(config) })
        .await;
}

/// Register an already built client as the global one
pub async fn init_with_client(client: DynamoDbClient) {
    let _ = GLOBAL_CLIENT.get_or_init(|| async { client }).await;
}

/// The global client, built from the defaults on first use unless
/// [`init`] or [`init_with_client`] ran before.
///
/// The client implements [`Transport`], so it can be handed to every free
/// function of this crate.
pub async fn dynamodb_client() -> &'static DynamoDbClient {
    GLOBAL_CLIENT
        .get_or_init(|| async {
            let config = aws_config_defaults().await;
            DynamoDbClient::new(&config)
        })
        .await
}
