use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::types::error::ConditionalCheckFailedException;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use serde_dynamo::Error as SerdeDynamoError;
use std::error::Error as StdError;
use std::fmt;

use crate::Item;

type DynamoPutError = SdkError<PutItemError, Response>;
type DynamoGetError = SdkError<GetItemError, Response>;
type DynamoQueryError = SdkError<QueryError, Response>;
type DynamoScanError = SdkError<ScanError, Response>;
type DynamoDeleteItemError = SdkError<DeleteItemError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;
type DynamoBatchGetItemError = SdkError<BatchGetItemError, Response>;

/// DynamoDB request orchestration error
#[derive(Debug)]
pub enum Error {
    /// Serde DynamoDB serialization error (encoding records, keys or literals)
    SerdeDynamo(SerdeDynamoError),
    /// A stored item could not be decoded into the requested record type
    Decode(DecodeError),
    /// A condition could not be compiled against its collection
    Expression(ExpressionError),
    /// A primary key does not match the collection's key schema
    Key(KeyError),
    /// A batch still had unprocessed work after the configured retry ceiling
    RetriesExhausted {
        /// The batch operation that gave up
        operation: &'static str,
        /// Number of retry rounds made
        attempts: usize,
        /// Requests or keys left unprocessed
        unprocessed: usize,
    },
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB PutItem operation error
    DynamoPutError(DynamoPutError),
    /// DynamoDB GetItem operation error
    DynamoGetError(DynamoGetError),
    /// DynamoDB Query operation error
    DynamoQueryError(DynamoQueryError),
    /// DynamoDB Scan operation error
    DynamoScanError(DynamoScanError),
    /// DynamoDB DeleteItem operation error
    DynamoDeleteItemError(DynamoDeleteItemError),
    /// DynamoDB BatchWriteItem operation error
    DynamoBatchWriteItemError(DynamoBatchWriteItemError),
    /// DynamoDB BatchGetItem operation error
    DynamoBatchGetItemError(DynamoBatchGetItemError),
}

/// A returned item that the record codec rejected.
///
/// Carries the raw item so the malformed record can be inspected.
#[derive(Debug)]
pub struct DecodeError {
    /// Table the item was read from
    pub table: String,
    /// The raw item as returned by DynamoDB
    pub item: Item,
    /// Codec failure
    pub source: SerdeDynamoError,
}

/// Condition compilation failures, raised before any request is sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpressionError {
    /// A path root is not a field of the collection
    UnknownField {
        /// Table of the collection
        table: String,
        /// Offending field name
        field: String,
    },
    /// A query filter references a key attribute of the queried source
    KeyFieldInFilter {
        /// Offending key field
        field: String,
    },
    /// `IN` with no operands
    EmptyInList {
        /// Field the membership test applies to
        field: String,
    },
    /// `IN` with more operands than DynamoDB accepts
    TooManyInOperands {
        /// Field the membership test applies to
        field: String,
        /// Number of operands given
        count: usize,
    },
}

/// Primary key shape errors
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyError {
    /// The key schema is range-keyed but no range value was given
    MissingRangeKey {
        /// Range key field
        field: String,
    },
    /// A range value was given for a hash-only key schema
    UnexpectedRangeKey {
        /// Hash key field of the schema
        hash_key: String,
    },
    /// A key attribute is absent from an item that must carry it
    MissingAttribute {
        /// Missing attribute name
        field: String,
    },
    /// A range condition was given for a source without a range key
    RangeConditionWithoutRangeKey {
        /// Table of the collection
        table: String,
    },
}

impl Error {
    pub(crate) fn decode(table: &str, item: Item, source: SerdeDynamoError) -> Self {
        Error::Decode(DecodeError {
            table: table.to_string(),
            item,
            source,
        })
    }

    /// Check if the error is a DynamoDB ConditionalCheckFailedException
    ///
    /// Raised when the condition attached to a put or delete (for example by
    /// `insert_item`) does not hold.
    pub fn is_conditional_check_failed(&self) -> bool {
        match self {
            Error::DynamoPutError(err) => matches!(
                err.as_service_error(),
                Some(PutItemError::ConditionalCheckFailedException(
                    ConditionalCheckFailedException { .. }
                ))
            ),
            Error::DynamoDeleteItemError(err) => matches!(
                err.as_service_error(),
                Some(DeleteItemError::ConditionalCheckFailedException(
                    ConditionalCheckFailedException { .. }
                ))
            ),
            _ => false,
        }
    }

    /// Check if the error is a serialization/deserialization error
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::SerdeDynamo(_) | Error::Decode(_))
    }

    /// Check if a returned item failed to decode
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// Check if the error came from the DynamoDB SDK
    pub fn is_dynamodb_error(&self) -> bool {
        matches!(
            self,
            Error::BuildError(_)
                | Error::DynamoPutError(_)
                | Error::DynamoGetError(_)
                | Error::DynamoQueryError(_)
                | Error::DynamoScanError(_)
                | Error::DynamoDeleteItemError(_)
                | Error::DynamoBatchWriteItemError(_)
                | Error::DynamoBatchGetItemError(_)
        )
    }
}

macro_rules! impl_from_error {
    ($name:ident, $variant:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
    ($name:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

impl_from_error!(SerdeDynamoError, SerdeDynamo);
impl_from_error!(DecodeError, Decode);
impl_from_error!(ExpressionError, Expression);
impl_from_error!(KeyError, Key);
impl_from_error!(BuildError);
impl_from_error!(DynamoPutError);
impl_from_error!(DynamoGetError);
impl_from_error!(DynamoQueryError);
impl_from_error!(DynamoScanError);
impl_from_error!(DynamoDeleteItemError);
impl_from_error!(DynamoBatchWriteItemError);
impl_from_error!(DynamoBatchGetItemError);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerdeDynamo(e) => write!(f, "DynamoDB serialization error: {}", e),
            Error::Decode(e) => write!(f, "{}", e),
            Error::Expression(e) => write!(f, "invalid expression: {}", e),
            Error::Key(e) => write!(f, "invalid key: {}", e),
            Error::RetriesExhausted {
                operation,
                attempts,
                unprocessed,
            } => write!(
                f,
                "DynamoDB {} left {} unprocessed after {} retries",
                operation, unprocessed, attempts
            ),
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            Error::DynamoPutError(e) => {
                write!(f, "DynamoDB PutItem operation failed: {}", e)
            }
            Error::DynamoGetError(e) => {
                write!(f, "DynamoDB GetItem operation failed: {}", e)
            }
            Error::DynamoQueryError(e) => {
                write!(f, "DynamoDB Query operation failed: {}", e)
            }
            Error::DynamoScanError(e) => {
                write!(f, "DynamoDB Scan operation failed: {}", e)
            }
            Error::DynamoDeleteItemError(e) => {
                write!(f, "DynamoDB DeleteItem operation failed: {}", e)
            }
            Error::DynamoBatchWriteItemError(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            Error::DynamoBatchGetItemError(e) => {
                write!(f, "DynamoDB BatchGetItem operation failed: {}", e)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::SerdeDynamo(e) => Some(e),
            Error::Decode(e) => Some(&e.source),
            Error::BuildError(e) => Some(e),
            Error::DynamoPutError(e) => Some(e),
            Error::DynamoGetError(e) => Some(e),
            Error::DynamoQueryError(e) => Some(e),
            Error::DynamoScanError(e) => Some(e),
            Error::DynamoDeleteItemError(e) => Some(e),
            Error::DynamoBatchWriteItemError(e) => Some(e),
            Error::DynamoBatchGetItemError(e) => Some(e),
            Error::Expression(_) | Error::Key(_) | Error::RetriesExhausted { .. } => None,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to decode item from table '{}' ({} attributes): {}",
            self.table,
            self.item.len(),
            self.source
        )
    }
}

impl StdError for DecodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::UnknownField { table, field } => {
                write!(f, "field '{}' is not defined on table '{}'", field, table)
            }
            ExpressionError::KeyFieldInFilter { field } => {
                write!(f, "filter must not reference key field '{}'", field)
            }
            ExpressionError::EmptyInList { field } => {
                write!(f, "IN on '{}' needs at least one operand", field)
            }
            ExpressionError::TooManyInOperands { field, count } => {
                write!(f, "IN on '{}' has {} operands (max 100)", field, count)
            }
        }
    }
}

impl StdError for ExpressionError {}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::MissingRangeKey { field } => {
                write!(f, "sort key '{}' requires a value", field)
            }
            KeyError::UnexpectedRangeKey { hash_key } => {
                write!(f, "key on '{}' has no sort key", hash_key)
            }
            KeyError::MissingAttribute { field } => {
                write!(f, "key attribute '{}' is missing", field)
            }
            KeyError::RangeConditionWithoutRangeKey { table } => {
                write!(f, "range condition given but '{}' has no range key", table)
            }
        }
    }
}

impl StdError for KeyError {}
