use serde::{Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use crate::Item;
use crate::error::Error;
use crate::table::{
    BatchConfig, Collection, CompositeKey, Consistency, Decoder, DynamoTable, KeySchema,
    batch_get, decode_item, is_key_defined, item_to_key, key_to_item,
};
use crate::transport::Transport;

/// Convenience methods over DynamoTable using associated key types
pub trait DynamoTableMethods: DynamoTable + Clone
where
    Self::PK: Ord,
    Self::SK: Ord,
{
    /// Pair every left row with the record its key points to, if any.
    ///
    /// Rows come back in their original order. Rows whose key is `None` or
    /// undefined get `None`.
    fn left_join<L, F>(
        left: Vec<L>,
        key_of: F,
        consistency: Consistency,
    ) -> impl Future<Output = Result<Vec<(L, Option<Self>)>, Error>>
    where
        F: Fn(&L) -> Option<CompositeKey<Self::PK, Self::SK>>,
    {
        async move {
            let client = Self::dynamodb_client().await;
            join_with(
                client,
                &Self::collection(),
                &Self::BATCH_CONFIG,
                consistency,
                left,
                key_of,
                Self::from_item,
            )
            .await
        }
    }

    /// Like [`left_join`](DynamoTableMethods::left_join) but only keeps rows
    /// that found a record
    fn inner_join<L, F>(
        left: Vec<L>,
        key_of: F,
        consistency: Consistency,
    ) -> impl Future<Output = Result<Vec<(L, Self)>, Error>>
    where
        F: Fn(&L) -> Option<CompositeKey<Self::PK, Self::SK>>,
    {
        async move {
            let joined = Self::left_join(left, key_of, consistency).await?;
            Ok(matched(joined))
        }
    }
}

impl<T> DynamoTableMethods for T
where
    T: DynamoTable + Clone,
    T::PK: Ord,
    T::SK: Ord,
{
}

/// Resolve a foreign key of each left row with one batched read.
///
/// Keys are deduplicated, so a record referenced by several rows is fetched
/// once and cloned into each of them.
pub async fn left_join<L, R, PK, SK, Tr, F>(
    transport: &Tr,
    collection: &Collection,
    config: &BatchConfig,
    consistency: Consistency,
    left: Vec<L>,
    key_of: F,
) -> Result<Vec<(L, Option<R>)>, Error>
where
    R: DeserializeOwned + Clone,
    PK: Serialize + DeserializeOwned + Ord,
    SK: Serialize + DeserializeOwned + Ord,
    Tr: Transport,
    F: Fn(&L) -> Option<CompositeKey<PK, SK>>,
{
    join_with(
        transport,
        collection,
        config,
        consistency,
        left,
        key_of,
        decode_item::<R>,
    )
    .await
}

/// [`left_join`] without the unmatched rows
pub async fn inner_join<L, R, PK, SK, Tr, F>(
    transport: &Tr,
    collection: &Collection,
    config: &BatchConfig,
    consistency: Consistency,
    left: Vec<L>,
    key_of: F,
) -> Result<Vec<(L, R)>, Error>
where
    R: DeserializeOwned + Clone,
    PK: Serialize + DeserializeOwned + Ord,
    SK: Serialize + DeserializeOwned + Ord,
    Tr: Transport,
    F: Fn(&L) -> Option<CompositeKey<PK, SK>>,
{
    let joined = left_join(transport, collection, config, consistency, left, key_of).await?;
    Ok(matched(joined))
}

fn matched<L, R>(joined: Vec<(L, Option<R>)>) -> Vec<(L, R)> {
    joined
        .into_iter()
        .filter_map(|(row, record)| record.map(|record| (row, record)))
        .collect()
}

fn lookup_keys<L, PK, SK, F>(
    schema: &KeySchema,
    left: &[L],
    key_of: &F,
) -> BTreeSet<CompositeKey<PK, SK>>
where
    PK: Serialize + Ord,
    SK: Serialize + Ord,
    F: Fn(&L) -> Option<CompositeKey<PK, SK>>,
{
    left.iter()
        .filter_map(key_of)
        .filter(|key| is_key_defined(schema, key))
        .collect()
}

fn index_items<R, PK, SK>(
    collection: &Collection,
    items: impl IntoIterator<Item = Item>,
    decode: Decoder<R>,
) -> Result<BTreeMap<CompositeKey<PK, SK>, R>, Error>
where
    PK: DeserializeOwned + Ord,
    SK: DeserializeOwned + Ord,
{
    let mut index = BTreeMap::new();
    for item in items {
        let Some(key) = item_to_key(collection.primary_key(), &item)? else {
            continue;
        };
        let record =
            decode(item.clone()).map_err(|e| Error::decode(collection.table_name(), item, e))?;
        let _ = index.insert(key, record);
    }
    Ok(index)
}

async fn join_with<L, R, PK, SK, Tr, F>(
    transport: &Tr,
    collection: &Collection,
    config: &BatchConfig,
    consistency: Consistency,
    left: Vec<L>,
    key_of: F,
    decode: Decoder<R>,
) -> Result<Vec<(L, Option<R>)>, Error>
where
    R: Clone,
    PK: Serialize + DeserializeOwned + Ord,
    SK: Serialize + DeserializeOwned + Ord,
    Tr: Transport,
    F: Fn(&L) -> Option<CompositeKey<PK, SK>>,
{
    let schema = collection.primary_key();
    let keys = lookup_keys(schema, &left, &key_of);

    let index = if keys.is_empty() {
        BTreeMap::new()
    } else {
        let mut wire_keys = Vec::with_capacity(keys.len());
        for key in &keys {
            wire_keys.push((collection.table_name().to_string(), key_to_item(schema, key)?));
        }
        let output = batch_get(transport, config, consistency, wire_keys).await?;
        index_items(collection, output.responses.into_values().flatten(), decode)?
    };

    Ok(left
        .into_iter()
        .map(|row| {
            let record = key_of(&row).and_then(|key| index.get(&key).cloned());
            (row, record)
        })
        .collect())
}
