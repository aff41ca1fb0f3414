    use super::*;
    use crate::error::Error;
    use crate::subscriptions::SqliteSubscriptionStore;
    use std::sync::Mutex as StdMutex;

    /// Keeps every batch it was handed
    #[derive(Default)]
    struct RecordingStore {
        batches: StdMutex<Vec<Vec<(String, i64)>>>,
    }

    impl RecordingStore {
        fn total(&self, action: &str) -> i64 {
            self.batches
                .lock()
                .unwrap()
                .iter()
                .flatten()
                .filter(|(a, _)| a == action)
                .map(|(_, c)| c)
                .sum()
        }
    }

    #[async_trait]
    impl StatsStore for RecordingStore {
        async fn add_counts(&self, counts: &[(String, i64)]) -> Result<()> {
            self.batches.lock().unwrap().push(counts.to_vec());
            Ok(())
        }

        async fn load_counts(&self) -> Result<Vec<(String, i64)>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_record_accumulates() {
        let stats = UsageStats::new();
        stats.record("requests").await;
        stats.record("requests").await;
        stats.record("command/list").await;

        let pending = stats.pending().await;
        assert_eq!(pending.get("requests"), Some(&2));
        assert_eq!(pending.get("command/list"), Some(&1));
    }

    #[tokio::test]
    async fn test_flush_drains_so_totals_are_not_double_counted() {
        let store = SqliteSubscriptionStore::in_memory().await.unwrap();
        let stats = UsageStats::new();

        stats.record("requests").await;
        stats.record("requests").await;
        assert_eq!(stats.flush(&store).await.unwrap(), 1);
        assert!(stats.pending().await.is_empty());

        // Nothing new: a second flush writes nothing
        assert_eq!(stats.flush(&store).await.unwrap(), 0);

        stats.record("requests").await;
        stats.flush(&store).await.unwrap();

        assert_eq!(
            store.load_counts().await.unwrap(),
            vec![("requests".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_counts() {
        let mut store = MockStatsStore::new();
        store
            .expect_add_counts()
            .times(1)
            .returning(|_| Err(Error::Internal("database is locked".into())));

        let stats = UsageStats::new();
        stats.record("requests").await;
        assert!(stats.flush(&store).await.is_err());

        // Counted while the flush was failing
        stats.record("requests").await;
        assert_eq!(stats.pending().await.get("requests"), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_flushes_periodically_and_on_cancel() {
        let store = Arc::new(RecordingStore::default());
        let stats = Arc::new(UsageStats::new());
        let token = CancellationToken::new();

        let handle = tokio::spawn(stats.clone().run(
            store.clone(),
            Duration::from_secs(60),
            token.clone(),
        ));

        stats.record("requests").await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(stats.pending().await.is_empty());
        assert_eq!(store.total("requests"), 1);

        stats.record("requests").await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(store.total("requests"), 2);
        assert_eq!(store.batches.lock().unwrap().len(), 2);
    }
