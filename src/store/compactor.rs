use tracing::{debug, warn};

use super::InMemoryStore;

/// Rewrite the WAL once `threshold` superseded entries have piled up.
/// Returns whether a compaction ran.
pub async fn compact_if_due(store: &InMemoryStore, threshold: u64) -> bool {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        debug!("compactor: {appends} appends since last compaction, below {threshold}");
        return false;
    }
    match store.compact_wal().await {
        Ok(()) => true,
        Err(e) => {
            warn!("compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::store::ItemStore;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("lendit_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let store = InMemoryStore::open(&path).unwrap();
        let id = Ulid::new();
        store
            .insert_item(Item {
                id,
                owner: 1,
                name: "Projector".into(),
                description: String::new(),
                available: true,
            })
            .await
            .unwrap();

        assert!(!compact_if_due(&store, 3).await);

        for _ in 0..2 {
            let patch = ItemPatch {
                description: Some("HDMI".into()),
                ..Default::default()
            };
            store.update_item(id, &patch).await.unwrap();
        }
        assert!(compact_if_due(&store, 3).await);
        assert_eq!(store.wal_appends_since_compact().await, 0);
    }
}
