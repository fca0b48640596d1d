//! End-to-end store tests over the in-memory backend.

use futures::executor::block_on;
use typelayer::{
    IndexRequest, MemoryBackend, Order, Query, Record, SchemaError, Store, StoreError,
};

#[derive(Record, Clone, Debug, PartialEq)]
struct User {
    #[record("id,index")]
    id: String,
    name: String,
    age: i64,
}

#[derive(Record, Clone, Debug, PartialEq)]
struct Widget {
    label: String,
}

fn user(id: &str, name: &str, age: i64) -> User {
    User {
        id: id.into(),
        name: name.into(),
        age,
    }
}

#[test]
fn opening_a_collection_registers_unique_indexes() {
    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let users = store.collection::<User>().await.unwrap();
        assert_eq!(users.name(), "users");

        // Re-opening re-requests the same index without duplicating it.
        store.collection::<User>().await.unwrap();
        assert_eq!(
            store.backend().index_requests().await,
            [IndexRequest {
                collection: "users".into(),
                field: "id".into(),
                unique: true,
            }]
        );
    });
}

#[test]
fn save_and_find_one() {
    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let users = store.collection::<User>().await.unwrap();

        users
            .save(Query::new().payload(user("u-1", "Ada", 36)))
            .await
            .unwrap();
        users.insert(&user("u-2", "Lin", 29)).await.unwrap();

        let found = users
            .find_one(Query::new().eq("name", "Lin"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, user("u-2", "Lin", 29));

        assert!(users
            .find_one(Query::new().eq("name", "nobody"))
            .await
            .unwrap()
            .is_none());
    });
}

#[test]
fn save_requires_a_payload_of_the_right_type() {
    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let users = store.collection::<User>().await.unwrap();

        assert!(matches!(
            users.save(Query::new()).await.unwrap_err(),
            StoreError::Schema(SchemaError::NilInput)
        ));

        let err = users
            .save(Query::new().payload(Widget { label: "w".into() }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch {
                expected: "User",
                found: "Widget",
            }
        ));

        // Nothing was written by either failed save.
        assert!(store.backend().dump("users").await.is_empty());
    });
}

#[test]
fn find_many_sorts_and_pages() {
    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let users = store.collection::<User>().await.unwrap();
        for (id, name, age) in [
            ("u-1", "Ada", 36),
            ("u-2", "Lin", 29),
            ("u-3", "Bea", 41),
            ("u-4", "Kai", 33),
        ] {
            users.insert(&user(id, name, age)).await.unwrap();
        }

        let ascending = users
            .find_many(Query::new().order_by("age", Order::Asc))
            .await
            .unwrap();
        let ages: Vec<_> = ascending.iter().map(|u| u.age).collect();
        assert_eq!(ages, [29, 33, 36, 41]);

        let paged = users
            .find_many(
                Query::new()
                    .order_by("age", Order::Desc)
                    .skip(1)
                    .limit(2),
            )
            .await
            .unwrap();
        let ages: Vec<_> = paged.iter().map(|u| u.age).collect();
        assert_eq!(ages, [36, 33]);
    });
}

#[test]
fn update_overwrites_matching_documents() {
    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let users = store.collection::<User>().await.unwrap();
        users.insert(&user("u-1", "Ada", 36)).await.unwrap();
        users.insert(&user("u-2", "Lin", 29)).await.unwrap();

        users
            .update_one(
                Query::new()
                    .eq("id", "u-1")
                    .payload(user("u-1", "Ada", 37)),
            )
            .await
            .unwrap();

        let updated = users
            .find_one(Query::new().eq("id", "u-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.age, 37);

        users
            .update_many(Query::new().payload(user("u-0", "Reset", 0)))
            .await
            .unwrap();
        let all = users.find_many(Query::new()).await.unwrap();
        assert!(all.iter().all(|u| u.name == "Reset"));
    });
}

#[test]
fn delete_one_and_many() {
    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let users = store.collection::<User>().await.unwrap();
        for n in 0..3 {
            users
                .insert(&user(&format!("u-{n}"), "dup", 20 + n))
                .await
                .unwrap();
        }

        users
            .delete_one(Query::new().eq("name", "dup"))
            .await
            .unwrap();
        assert_eq!(users.find_many(Query::new()).await.unwrap().len(), 2);

        users
            .delete_many(Query::new().eq("name", "dup"))
            .await
            .unwrap();
        assert!(users.find_many(Query::new()).await.unwrap().is_empty());
    });
}

#[test]
fn unique_index_rejects_duplicate_ids() {
    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let users = store.collection::<User>().await.unwrap();

        users.insert(&user("u-1", "Ada", 36)).await.unwrap();
        let err = users.insert(&user("u-1", "Imposter", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    });
}

#[test]
fn failed_encode_writes_nothing() {
    #[derive(Record, Clone, Debug, PartialEq)]
    struct Counter {
        hits: u64,
    }

    block_on(async {
        let store = Store::new(MemoryBackend::new());
        let counters = store.collection::<Counter>().await.unwrap();

        let err = counters.insert(&Counter { hits: u64::MAX }).await.unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
        assert!(store.backend().dump("counters").await.is_empty());
    });
}
