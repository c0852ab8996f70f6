/// Join helper tests
mod helpers;
use dynamo_fetch::methods::{inner_join, left_join};
use dynamo_fetch::table::{BatchConfig, CompositeKey, Consistency};
use helpers::*;

fn author_of(post: &Post) -> Option<CompositeKey<String, String>> {
    post.author_id.clone().map(|id| (id, None))
}

fn seeded() -> MemoryStore {
    let store = store(100);
    store.insert(
        Author::TABLE,
        [
            Author::new("a1", "Ada").item(),
            Author::new("a2", "Bob").item(),
        ],
    );
    store
}

fn posts() -> Vec<Post> {
    vec![
        Post::new("first", Some("a1")),
        Post::new("draft", None),
        Post::new("second", Some("a2")),
        Post::new("orphan", Some("gone")),
        Post::new("third", Some("a1")),
    ]
}

#[tokio::test]
async fn test_left_join_preserves_rows() {
    let store = seeded();

    let joined: Vec<(Post, Option<Author>)> = left_join(
        &store,
        &Author::collection(),
        &BatchConfig::DEFAULT,
        Consistency::Eventually,
        posts(),
        author_of,
    )
    .await
    .unwrap();

    let titles: Vec<&str> = joined.iter().map(|(post, _)| post.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "draft", "second", "orphan", "third"]);

    let names: Vec<Option<&str>> = joined
        .iter()
        .map(|(_, author)| author.as_ref().map(|a| a.name.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![Some("Ada"), None, Some("Bob"), None, Some("Ada")]
    );
}

/// Shared keys are fetched once, in a single batch call
#[tokio::test]
async fn test_left_join_deduplicates_lookups() {
    let store = seeded();

    let _: Vec<(Post, Option<Author>)> = left_join(
        &store,
        &Author::collection(),
        &BatchConfig::DEFAULT,
        Consistency::Eventually,
        posts(),
        author_of,
    )
    .await
    .unwrap();

    let calls = store.batch_gets();
    assert_eq!(calls.len(), 1);
    let keys = &calls[0].get_request_items().as_ref().unwrap()[Author::TABLE].keys;
    assert_eq!(keys.len(), 3);
}

#[tokio::test]
async fn test_inner_join_drops_unmatched() {
    let store = seeded();

    let joined: Vec<(Post, Author)> = inner_join(
        &store,
        &Author::collection(),
        &BatchConfig::DEFAULT,
        Consistency::Eventually,
        posts(),
        author_of,
    )
    .await
    .unwrap();

    let pairs: Vec<(&str, &str)> = joined
        .iter()
        .map(|(post, author)| (post.title.as_str(), author.id.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("first", "a1"), ("second", "a2"), ("third", "a1")]
    );
}

#[tokio::test]
async fn test_join_without_keys_sends_nothing() {
    let store = seeded();
    let rows = vec![Post::new("a", None), Post::new("b", None)];

    let joined: Vec<(Post, Option<Author>)> = left_join(
        &store,
        &Author::collection(),
        &BatchConfig::DEFAULT,
        Consistency::Eventually,
        rows,
        author_of,
    )
    .await
    .unwrap();

    assert_eq!(joined.len(), 2);
    assert!(joined.iter().all(|(_, author)| author.is_none()));
    assert!(store.batch_gets().is_empty());
}
