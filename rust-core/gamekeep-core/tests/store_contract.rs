//! Behaviour every `GameStore` backend must share.

use std::sync::Arc;

use gamekeep_core::{GameError, GameFields, GameId, GameStore, MemoryGameStore, SqlGameStore};
use tokio_test::{assert_err, assert_ok};

async fn backends() -> Vec<(&'static str, Box<dyn GameStore>)> {
    let sqlite = SqlGameStore::connect("sqlite::memory:", None).await.unwrap();
    vec![
        ("memory", Box::new(MemoryGameStore::new())),
        ("sqlite", Box::new(sqlite)),
    ]
}

#[tokio::test]
async fn create_assigns_fresh_ids_and_zero_version() {
    for (name, store) in backends().await {
        let a = assert_ok!(store.create(GameFields::new("California Games", "Sports")).await);
        let b = assert_ok!(store.create(GameFields::new("California Games", "Sports")).await);

        assert_ne!(a.id, b.id, "{name}");
        assert_eq!(a.version, 0, "{name}");
        assert_eq!(a.release_date, None, "{name}");
    }
}

#[tokio::test]
async fn create_rejects_missing_fields() {
    for (name, store) in backends().await {
        let err = assert_err!(store.create(GameFields::default()).await);
        match err {
            GameError::Validation(errors) => {
                assert!(errors.contains("title"), "{name}");
                assert!(errors.contains("genre"), "{name}");
            }
            other => panic!("{name}: unexpected {other:?}"),
        }
        assert!(assert_ok!(store.list_all().await).is_empty(), "{name}");
    }
}

#[tokio::test]
async fn list_returns_exactly_what_was_created() {
    for (name, store) in backends().await {
        assert!(assert_ok!(store.list_all().await).is_empty(), "{name}");

        let mut created = Vec::new();
        for title in ["Washington Games", "Vancouver Games", "Oregon Games"] {
            created.push(assert_ok!(store.create(GameFields::new(title, "Recreational")).await));
        }

        let mut listed = assert_ok!(store.list_all().await);
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        created.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(listed, created, "{name}");
    }
}

#[tokio::test]
async fn update_replaces_title_and_keeps_the_rest() {
    for (name, store) in backends().await {
        let game = assert_ok!(
            store
                .create(GameFields::new("Vancouver Games", "Chill").with_release_date("March 2018"))
                .await
        );

        let changes = GameFields {
            title: Some("Vancouver Games Redux".into()),
            ..GameFields::default()
        };
        let updated = assert_ok!(store.update_by_id(&game.id, changes).await);

        assert_eq!(updated.id, game.id, "{name}");
        assert_eq!(updated.title, "Vancouver Games Redux", "{name}");
        assert_eq!(updated.genre, "Chill", "{name}");
        assert_eq!(updated.release_date.as_deref(), Some("March 2018"), "{name}");
        assert_eq!(updated.version, 1, "{name}");
        assert_eq!(assert_ok!(store.find_by_id(&game.id).await), updated, "{name}");
    }
}

#[tokio::test]
async fn update_requires_title() {
    for (name, store) in backends().await {
        let game = assert_ok!(store.create(GameFields::new("Texas Games", "Cattle")).await);
        let changes = GameFields {
            title: Some(String::new().into()),
            ..GameFields::default()
        };

        let err = assert_err!(store.update_by_id(&game.id, changes).await);
        assert!(matches!(err, GameError::MissingField { field: "title" }), "{name}");
        assert_eq!(assert_ok!(store.find_by_id(&game.id).await).version, 0, "{name}");
    }
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let id: GameId = "5a9f1c2b3d4e5f6071829304".parse().unwrap();
    for (name, store) in backends().await {
        let changes = GameFields::new("Ghost Games", "Horror");
        assert!(
            matches!(store.find_by_id(&id).await, Err(GameError::NotFound { .. })),
            "{name}"
        );
        assert!(
            matches!(store.update_by_id(&id, changes).await, Err(GameError::NotFound { .. })),
            "{name}"
        );
        assert!(
            matches!(store.delete_by_id(&id).await, Err(GameError::NotFound { .. })),
            "{name}"
        );
    }
}

#[tokio::test]
async fn delete_returns_title_and_removes() {
    for (name, store) in backends().await {
        let keep = assert_ok!(store.create(GameFields::new("California Games", "Sports")).await);
        let gone = assert_ok!(store.create(GameFields::new("Oregon Games", "Recreational")).await);

        assert_eq!(assert_ok!(store.delete_by_id(&gone.id).await), "Oregon Games", "{name}");
        assert_err!(store.find_by_id(&gone.id).await);

        let listed = assert_ok!(store.list_all().await);
        assert_eq!(listed, vec![keep], "{name}");
    }
}

#[tokio::test]
async fn clear_empties_the_collection() {
    for (name, store) in backends().await {
        for title in ["A", "B", "C"] {
            assert_ok!(store.create(GameFields::new(title, "Genre")).await);
        }
        assert_eq!(assert_ok!(store.clear().await), 3, "{name}");
        assert_eq!(assert_ok!(store.clear().await), 0, "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_are_not_lost() {
    const WRITERS: u64 = 12;

    for (name, store) in backends().await {
        let store: Arc<dyn GameStore> = Arc::from(store);
        let game = assert_ok!(store.create(GameFields::new("Washington Games", "Recreational")).await);

        let mut tasks = Vec::new();
        for i in 0..WRITERS {
            let store = store.clone();
            let id = game.id.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update_by_id(&id, GameFields::titled(format!("Washington Games {i}")))
                    .await
            }));
        }

        let mut versions = Vec::new();
        for task in tasks {
            versions.push(assert_ok!(task.await.unwrap()).version);
        }
        versions.sort_unstable();

        // Each writer observed its own version; none overwrote another.
        assert_eq!(versions, (1..=WRITERS).collect::<Vec<_>>(), "{name}");
        let stored = assert_ok!(store.find_by_id(&game.id).await);
        assert_eq!(stored.version, WRITERS, "{name}");
        assert_eq!(stored.genre, "Recreational", "{name}");
    }
}

#[tokio::test]
async fn interleaved_updates_keep_both_changes() {
    for (name, store) in backends().await {
        for round in 0..5 {
            let game = assert_ok!(store.create(GameFields::new("Oregon Games", "Recreational")).await);

            let (genre_change, title_change) = tokio::join!(
                store.update_by_id(&game.id, GameFields::new("Oregon Games", "Strategy")),
                store.update_by_id(&game.id, GameFields::titled("Oregon Games Deluxe")),
            );
            assert_ok!(genre_change);
            assert_ok!(title_change);

            let stored = assert_ok!(store.find_by_id(&game.id).await);
            assert_eq!(stored.genre, "Strategy", "{name} round {round}");
            assert_eq!(stored.version, 2, "{name} round {round}");
        }
    }
}
