#[cfg(test)]
mod tests {
    use crate::bookmarks::models::*;
    use crate::bookmarks::services::*;
    use crate::bookmarks::validators::BookmarkValidator;
    use crate::common::{migrations, Validator};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    fn request(title: &str, url: &str) -> CreateBookmarkRequest {
        CreateBookmarkRequest {
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    /// In-memory database with the real schema. One connection, so every
    /// query sees the same memory database.
    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory database");
        migrations::run_migrations(&pool)
            .await
            .expect("migrations failed");
        pool
    }

    #[test]
    fn test_bookmark_validator_valid_request() {
        let result = BookmarkValidator.validate(&request("Docs", "https://example.com"));
        assert!(result.is_valid);
        assert_eq!(result.errors.len(), 0);

        let result = BookmarkValidator.validate(&request("Docs", "http://example.com/a?b=c"));
        assert!(result.is_valid);
    }

    #[test]
    fn test_bookmark_validator_rejects_empty_fields() {
        // Empty or whitespace-only fields are rejected before any SQL runs
        assert!(!BookmarkValidator.validate(&request("", "https://example.com")).is_valid);
        assert!(!BookmarkValidator.validate(&request("   ", "https://example.com")).is_valid);
        assert!(!BookmarkValidator.validate(&request("Docs", "")).is_valid);
        assert!(!BookmarkValidator.validate(&request("Docs", "   ")).is_valid);

        let result = BookmarkValidator.validate(&request("", ""));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_bookmark_validator_rejects_bad_urls() {
        assert!(!BookmarkValidator.validate(&request("Docs", "ftp://example.com")).is_valid);
        assert!(!BookmarkValidator.validate(&request("Docs", "example.com")).is_valid);
        assert!(!BookmarkValidator.validate(&request("Docs", "https://exa mple.com")).is_valid);

        let long_url = format!("https://example.com/{}", "a".repeat(2048));
        assert!(!BookmarkValidator.validate(&request("Docs", &long_url)).is_valid);
    }

    #[test]
    fn test_bookmark_validator_rejects_oversized_title() {
        let long_title = "a".repeat(201);
        assert!(!BookmarkValidator
            .validate(&request(&long_title, "https://example.com"))
            .is_valid);
    }

    #[test]
    fn test_websocket_message_serialization() {
        let bookmark = Bookmark {
            id: "B_TEST01".to_string(),
            url: "https://example.com".to_string(),
            title: "Docs".to_string(),
            user_id: "U_TEST01".to_string(),
            created_at: "2024-01-01 00:00:00".to_string(),
        };

        let insert = WebSocketMessage::Insert { bookmark };
        let json = serde_json::to_string(&insert).unwrap();
        assert!(json.contains("\"type\":\"insert\""));
        assert!(json.contains("B_TEST01"));

        let delete = WebSocketMessage::Delete {
            id: "B_TEST01".to_string(),
        };
        let json = serde_json::to_string(&delete).unwrap();
        assert!(json.contains("\"type\":\"delete\""));

        let revoked = WebSocketMessage::SessionRevoked;
        let json = serde_json::to_string(&revoked).unwrap();
        assert!(json.contains("session_revoked"));

        // Test Ping/Pong
        let ping = WebSocketMessage::Ping;
        assert!(serde_json::to_string(&ping).unwrap().contains("ping"));
        let pong = WebSocketMessage::Pong;
        assert!(serde_json::to_string(&pong).unwrap().contains("pong"));
    }

    #[tokio::test]
    async fn test_connection_manager() {
        let manager = ConnectionManager::new();

        // Initially no connections
        assert_eq!(manager.get_total_connections().await, 0);
        assert!(!manager.is_user_subscribed("user1").await);

        // Register a connection
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        manager
            .register("user1".to_string(), "conn1".to_string(), tx)
            .await;

        assert_eq!(manager.get_total_connections().await, 1);
        assert!(manager.is_user_subscribed("user1").await);
        assert_eq!(manager.get_user_connection_count("user1").await, 1);

        // Unregister connection
        manager.unregister("conn1").await;

        assert_eq!(manager.get_total_connections().await, 0);
        assert!(!manager.is_user_subscribed("user1").await);
    }

    #[tokio::test]
    async fn test_connection_manager_multiple_connections() {
        let manager = ConnectionManager::new();

        // One user, two open sessions
        let (tx1, _rx1) = tokio::sync::mpsc::unbounded_channel();
        let (tx2, _rx2) = tokio::sync::mpsc::unbounded_channel();

        manager
            .register("user1".to_string(), "conn1".to_string(), tx1)
            .await;
        manager
            .register("user1".to_string(), "conn2".to_string(), tx2)
            .await;

        assert_eq!(manager.get_user_connection_count("user1").await, 2);
        assert_eq!(manager.get_total_connections().await, 2);

        manager.unregister("conn1").await;

        assert!(manager.is_user_subscribed("user1").await);
        assert_eq!(manager.get_user_connection_count("user1").await, 1);

        manager.unregister("conn2").await;

        assert!(!manager.is_user_subscribed("user1").await);
    }

    #[tokio::test]
    async fn test_events_only_reach_the_owner() {
        let manager = ConnectionManager::new();

        let (tx1, mut rx1) = tokio::sync::mpsc::unbounded_channel();
        let (tx2, mut rx2) = tokio::sync::mpsc::unbounded_channel();

        manager
            .register("user1".to_string(), "conn1".to_string(), tx1)
            .await;
        manager
            .register("user2".to_string(), "conn2".to_string(), tx2)
            .await;

        manager
            .send_to_user(
                "user1",
                WebSocketMessage::Delete {
                    id: "B_TEST01".to_string(),
                },
            )
            .await
            .unwrap();

        // user1 sees the event, user2 sees nothing
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let pool = memory_pool().await;
        let service = BookmarkService::new(pool, ConnectionManager::new());

        let bookmark = service
            .create("U_TEST01", "Docs", "https://example.com")
            .await
            .unwrap();

        assert!(bookmark.id.starts_with("B_"));
        assert_eq!(bookmark.title, "Docs");
        assert_eq!(bookmark.url, "https://example.com");
        assert_eq!(bookmark.user_id, "U_TEST01");

        let listed = service.list_for_user("U_TEST01").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, bookmark.id);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let pool = memory_pool().await;

        // Explicit timestamps; datetime('now') only has second resolution
        for (id, created_at) in [
            ("B_OLD001", "2024-01-01 10:00:00"),
            ("B_NEW001", "2024-01-03 10:00:00"),
            ("B_MID001", "2024-01-02 10:00:00"),
        ] {
            sqlx::query(
                "INSERT INTO bookmarks (id, url, title, user_id, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind("https://example.com")
            .bind("Docs")
            .bind("U_TEST01")
            .bind(created_at)
            .execute(&pool)
            .await
            .unwrap();
        }

        let service = BookmarkService::new(pool, ConnectionManager::new());
        let listed = service.list_for_user("U_TEST01").await.unwrap();

        let ids: Vec<&str> = listed.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["B_NEW001", "B_MID001", "B_OLD001"]);
    }

    #[tokio::test]
    async fn test_list_never_crosses_owners() {
        let pool = memory_pool().await;
        let service = BookmarkService::new(pool, ConnectionManager::new());

        service
            .create("U_ALICE1", "Alice's", "https://example.com/a")
            .await
            .unwrap();
        service
            .create("U_BOB001", "Bob's", "https://example.com/b")
            .await
            .unwrap();

        let alice = service.list_for_user("U_ALICE1").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert!(alice.iter().all(|b| b.user_id == "U_ALICE1"));

        // A user with no rows gets an empty list, not an error
        let nobody = service.list_for_user("U_NOBODY").await.unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        use crate::common::ApiError;

        let pool = memory_pool().await;
        let service = BookmarkService::new(pool, ConnectionManager::new());

        let bookmark = service
            .create("U_ALICE1", "Alice's", "https://example.com/a")
            .await
            .unwrap();

        // Someone else's bookmark deletes as NotFound
        let err = service.delete("U_BOB001", &bookmark.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        // The owner's delete succeeds and empties the list
        service.delete("U_ALICE1", &bookmark.id).await.unwrap();
        let listed = service.list_for_user("U_ALICE1").await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_create_publishes_insert_event_to_owner_only() {
        use axum::extract::ws::Message;

        let pool = memory_pool().await;
        let manager = ConnectionManager::new();
        let service = BookmarkService::new(pool, manager.clone());

        let (tx_owner, mut rx_owner) = tokio::sync::mpsc::unbounded_channel();
        let (tx_other, mut rx_other) = tokio::sync::mpsc::unbounded_channel();
        manager
            .register("U_ALICE1".to_string(), "conn1".to_string(), tx_owner)
            .await;
        manager
            .register("U_BOB001".to_string(), "conn2".to_string(), tx_other)
            .await;

        let bookmark = service
            .create("U_ALICE1", "Docs", "https://example.com")
            .await
            .unwrap();

        // Exactly one insert event, carrying the created row
        let msg = rx_owner.try_recv().expect("owner should receive the event");
        match msg {
            Message::Text(json) => {
                assert!(json.contains("\"type\":\"insert\""));
                assert!(json.contains(&bookmark.id));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(rx_owner.try_recv().is_err(), "no duplicate events");
        assert!(rx_other.try_recv().is_err(), "no cross-user delivery");
    }

    #[tokio::test]
    async fn test_delete_publishes_delete_event() {
        use axum::extract::ws::Message;

        let pool = memory_pool().await;
        let manager = ConnectionManager::new();
        let service = BookmarkService::new(pool, manager.clone());

        let bookmark = service
            .create("U_ALICE1", "Docs", "https://example.com")
            .await
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        manager
            .register("U_ALICE1".to_string(), "conn1".to_string(), tx)
            .await;

        service.delete("U_ALICE1", &bookmark.id).await.unwrap();

        let msg = rx.try_recv().expect("owner should receive the event");
        match msg {
            Message::Text(json) => {
                assert!(json.contains("\"type\":\"delete\""));
                assert!(json.contains(&bookmark.id));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
