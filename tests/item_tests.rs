/// Single-item operation tests
///
/// Get, put, insert and delete through the in-memory store, checking the
/// condition expressions that reach the wire.
mod helpers;
use dynamo_fetch::condition::{Condition, attribute_value};
use dynamo_fetch::table::{Consistency, delete_item, get_item, insert_item, put_item};
use helpers::*;

#[tokio::test]
async fn test_put_then_get() {
    let store = store(10);
    let event = Event::new("s1", 1, "created");

    let _ = put_item(&store, &event, None).await.unwrap();
    let got = get_item::<Event, _>(&store, &("s1".to_string(), Some(1)), Consistency::Strongly)
        .await
        .unwrap();

    assert_eq!(got, Some(event));
    let put = &store.puts()[0];
    assert!(put.get_condition_expression().is_none());
    assert!(put.get_expression_attribute_values().is_none());
}

#[tokio::test]
async fn test_get_missing_item() {
    let store = store(10);

    let got = get_item::<Event, _>(&store, &("s1".to_string(), Some(9)), Consistency::Eventually)
        .await
        .unwrap();

    assert_eq!(got, None);
}

/// Insert guards on the hash key and sends no value map
#[tokio::test]
async fn test_insert_condition_on_wire() {
    let store = store(10);

    let _ = insert_item(&store, &Event::new("s1", 1, "created"))
        .await
        .unwrap();

    let put = &store.puts()[0];
    assert_eq!(
        put.get_condition_expression().as_deref(),
        Some("attribute_not_exists(#N0)")
    );
    assert_eq!(
        put.get_expression_attribute_names()
            .as_ref()
            .unwrap()
            .get("#N0")
            .map(String::as_str),
        Some("stream")
    );
    assert!(put.get_expression_attribute_values().is_none());
}

#[tokio::test]
async fn test_conditional_put_carries_values() {
    let store = store(10);
    let condition = Condition::ne("kind", attribute_value("archived").unwrap())
        | Condition::not_exists("actor");

    let _ = put_item(&store, &Event::new("s1", 1, "created"), Some(&condition))
        .await
        .unwrap();

    let put = &store.puts()[0];
    assert_eq!(
        put.get_condition_expression().as_deref(),
        Some("(#N0 <> :V0) OR (attribute_not_exists(#N1))")
    );
    assert_eq!(put.get_expression_attribute_values().as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_field_fails_before_sending() {
    let store = store(10);
    let condition = Condition::exists("nickname");

    let err = put_item(&store, &Event::new("s1", 1, "created"), Some(&condition))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Expression(_)));
    assert!(store.puts().is_empty());
}

#[tokio::test]
async fn test_conditional_delete() {
    let store = store(10);
    store.insert(Event::TABLE, [Event::new("s1", 1, "created").item()]);
    let condition = Condition::eq("kind", attribute_value("created").unwrap());

    let _ = delete_item::<Event, _>(&store, &("s1".to_string(), Some(1)), Some(&condition))
        .await
        .unwrap();

    assert!(store.items(Event::TABLE).is_empty());
    let delete = &store.deletes()[0];
    assert_eq!(delete.get_condition_expression().as_deref(), Some("#N0 = :V0"));
    assert_eq!(delete.get_key().as_ref().unwrap().len(), 2);
}

#[tokio::test]
async fn test_key_shape_is_checked() {
    let store = store(10);

    let err = get_item::<Author, _>(
        &store,
        &("a1".to_string(), Some("extra".to_string())),
        Consistency::Eventually,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Key(_)));
}
