//! The network seam.
//!
//! Every request the crate issues goes through [`Transport`]. The production
//! implementation is [`aws_sdk_dynamodb::Client`]; tests plug in an in-memory
//! store that records the requests it receives.

use aws_sdk_dynamodb::Client;
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
use std::future::Future;

use crate::Error;

/// Sends fully assembled DynamoDB requests.
///
/// Implementations must not retry partially processed batches themselves;
/// the batch driver owns that loop.
pub trait Transport: Send + Sync {
    /// Send a Query request
    fn query(
        &self,
        input: QueryInputBuilder,
    ) -> impl Future<Output = Result<QueryOutput, Error>> + Send;

    /// Send a Scan request
    fn scan(&self, input: ScanInputBuilder)
    -> impl Future<Output = Result<ScanOutput, Error>> + Send;

    /// Send a BatchGetItem request
    fn batch_get_item(
        &self,
        input: BatchGetItemInputBuilder,
    ) -> impl Future<Output = Result<BatchGetItemOutput, Error>> + Send;

    /// Send a BatchWriteItem request
    fn batch_write_item(
        &self,
        input: BatchWriteItemInputBuilder,
    ) -> impl Future<Output = Result<BatchWriteItemOutput, Error>> + Send;

    /// Send a GetItem request
    fn get_item(
        &self,
        input: GetItemInputBuilder,
    ) -> impl Future<Output = Result<GetItemOutput, Error>> + Send;

    /// Send a PutItem request
    fn put_item(
        &self,
        input: PutItemInputBuilder,
    ) -> impl Future<Output = Result<PutItemOutput, Error>> + Send;

    /// Send a DeleteItem request
    fn delete_item(
        &self,
        input: DeleteItemInputBuilder,
    ) -> impl Future<Output = Result<DeleteItemOutput, Error>> + Send;
}

impl Transport for Client {
    fn query(
        &self,
        input: QueryInputBuilder,
    ) -> impl Future<Output = Result<QueryOutput, Error>> + Send {
        async move { Ok(input.send_with(self).await?) }
    }

    fn scan(
        &self,
        input: ScanInputBuilder,
    ) -> impl Future<Output = Result<ScanOutput, Error>> + Send {
        async move { Ok(input.send_with(self).await?) }
    }

    fn batch_get_item(
        &self,
        input: BatchGetItemInputBuilder,
    ) -> impl Future<Output = Result<BatchGetItemOutput, Error>> + Send {
        async move { Ok(input.send_with(self).await?) }
    }

    fn batch_write_item(
        &self,
        input: BatchWriteItemInputBuilder,
    ) -> impl Future<Output = Result<BatchWriteItemOutput, Error>> + Send {
        async move { Ok(input.send_with(self).await?) }
    }

    fn get_item(
        &self,
        input: GetItemInputBuilder,
    ) -> impl Future<Output = Result<GetItemOutput, Error>> + Send {
        async move { Ok(input.send_with(self).await?) }
    }

    fn put_item(
        &self,
        input: PutItemInputBuilder,
    ) -> impl Future<Output = Result<PutItemOutput, Error>> + Send {
        async move { Ok(input.send_with(self).await?) }
    }

    fn delete_item(
        &self,
        input: DeleteItemInputBuilder,
    ) -> impl Future<Output = Result<DeleteItemOutput, Error>> + Send {
        async move { Ok(input.send_with(self).await?) }
    }
}
