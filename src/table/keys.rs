use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Serialize, de::DeserializeOwned};
use serde_dynamo::{from_attribute_value, to_attribute_value};

use crate::error::{Error, KeyError};
use crate::table::descriptor::KeySchema;
use crate::table::types::CompositeKey;
use crate::Item;

/// Encode a typed key into the attribute map DynamoDB expects.
///
/// The range component must be present exactly when the schema has a range
/// key.
pub fn key_to_item<PK, SK>(schema: &KeySchema, key: &CompositeKey<PK, SK>) -> Result<Item, Error>
where
    PK: Serialize,
    SK: Serialize,
{
    let (hash, range) = key;
    let mut item = Item::with_capacity(2);
    let _ = item.insert(schema.hash_key.clone(), to_attribute_value(hash)?);

    match (schema.range_key.as_ref(), range) {
        (Some(field), Some(range)) => {
            let _ = item.insert(field.clone(), to_attribute_value(range)?);
        }
        (Some(field), None) => {
            return Err(KeyError::MissingRangeKey {
                field: field.clone(),
            }
            .into());
        }
        (None, Some(_)) => {
            return Err(KeyError::UnexpectedRangeKey {
                hash_key: schema.hash_key.clone(),
            }
            .into());
        }
        (None, None) => {}
    }

    Ok(item)
}

/// Decode the typed key out of an item, `None` if a key attribute is absent
pub fn item_to_key<PK, SK>(
    schema: &KeySchema,
    item: &Item,
) -> Result<Option<CompositeKey<PK, SK>>, Error>
where
    PK: DeserializeOwned,
    SK: DeserializeOwned,
{
    let Some(hash) = item.get(&schema.hash_key) else {
        return Ok(None);
    };
    let hash: PK = from_attribute_value(hash.clone())?;

    let range = match schema.range_key.as_ref() {
        Some(field) => match item.get(field) {
            Some(value) => Some(from_attribute_value(value.clone())?),
            None => return Ok(None),
        },
        None => None,
    };

    Ok(Some((hash, range)))
}

/// Copy the named attributes out of `item`, `None` unless all are present
pub fn project_key<I, S>(fields: I, item: &Item) -> Option<Item>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|field| {
            let field = field.as_ref();
            item.get(field)
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect()
}

/// Whether every component of a typed key is set.
///
/// Keys of sparse indexes may be `Option`s serializing to `NULL`; such keys
/// are undefined and never sent to DynamoDB.
pub fn is_key_defined<PK, SK>(schema: &KeySchema, key: &CompositeKey<PK, SK>) -> bool
where
    PK: Serialize,
    SK: Serialize,
{
    let (hash, range) = key;
    if !is_value_defined(hash) {
        return false;
    }
    match (schema.range_key.is_some(), range) {
        (true, Some(range)) => is_value_defined(range),
        (false, None) => true,
        _ => false,
    }
}

/// Whether `item` carries a non-`NULL` value for every key attribute
pub fn is_item_key_defined(schema: &KeySchema, item: &Item) -> bool {
    schema
        .fields()
        .all(|field| matches!(item.get(field), Some(value) if !value.is_null()))
}

fn is_value_defined<V: Serialize>(value: &V) -> bool {
    matches!(to_attribute_value::<_, AttributeValue>(value), Ok(value) if !value.is_null())
}
