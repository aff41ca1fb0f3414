
    use super::*;
    use crate::schedule::windows::Deadline;

    const DEFAULT: Duration = Duration::from_secs(30 * 60);

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    fn ticker_for(deadline: &str) -> AdaptiveTicker {
        let deadline = Deadline::parse(deadline, "slot").unwrap();
        AdaptiveTicker::from_deadlines(DEFAULT, &[deadline])
    }

    #[test]
    fn test_inside_window_uses_window_interval() {
        let ticker = ticker_for("2025-09-06T09:00:00Z");

        assert_eq!(ticker.wait_at(at("2025-09-06T08:00:00Z")), minutes(30));
        assert_eq!(ticker.wait_at(at("2025-09-06T08:30:00Z")), minutes(15));
        assert_eq!(ticker.wait_at(at("2025-09-06T08:50:00Z")), minutes(5));
        assert_eq!(ticker.wait_at(at("2025-09-06T08:58:00Z")), minutes(1));
    }

    #[test]
    fn test_inside_window_lands_on_next_window_start() {
        let ticker = ticker_for("2025-09-06T09:00:00Z");
        // 30m window, but the 15m window opens in 20m
        assert_eq!(ticker.wait_at(at("2025-09-06T08:10:00Z")), minutes(20));
    }

    #[test]
    fn test_lands_on_window_start_when_default_overshoots() {
        let ticker = ticker_for("2025-09-06T09:00:00Z");
        // T-61m, default 30m: the first window opens in one minute
        assert_eq!(ticker.wait_at(at("2025-09-06T07:59:00Z")), minutes(1));
        // T-31m, 30m window: the 15m window opens in one minute
        assert_eq!(ticker.wait_at(at("2025-09-06T08:29:00Z")), minutes(1));
    }

    #[test]
    fn test_default_when_window_is_far_away() {
        let ticker = ticker_for("2025-09-06T09:00:00Z");
        // T-65m: next window opens in 5m, still within the default
        assert_eq!(ticker.wait_at(at("2025-09-06T07:55:00Z")), minutes(5));
        assert_eq!(ticker.wait_at(at("2025-09-06T06:00:00Z")), DEFAULT);
    }

    #[test]
    fn test_after_deadline_returns_to_default() {
        let ticker = ticker_for("2025-09-06T09:00:00Z");

        assert_eq!(ticker.wait_at(at("2025-09-06T09:00:00Z")), DEFAULT);
        assert_eq!(ticker.wait_at(at("2025-09-06T12:00:00Z")), DEFAULT);
    }

    #[test]
    fn test_window_boundaries() {
        let ticker = ticker_for("2025-09-06T09:00:00Z");

        assert_eq!(ticker.wait_at(at("2025-09-06T08:55:00Z")), minutes(1));
        assert_eq!(ticker.wait_at(at("2025-09-06T08:45:00Z")), minutes(5));
        assert_eq!(ticker.wait_at(at("2025-09-06T08:30:00Z")), minutes(15));
    }

    #[test]
    fn test_no_windows_always_default() {
        let ticker = AdaptiveTicker::new(DEFAULT, Vec::new());
        assert_eq!(ticker.wait_at(Utc::now()), DEFAULT);
        assert!(ticker.active_window(Utc::now()).is_none());
    }

    #[test]
    fn test_later_window_overrides_tighter_window() {
        let windows = vec![
            ScheduleWindow {
                from: at("2025-09-06T08:00:00Z"),
                till: at("2025-09-06T10:00:00Z"),
                interval: minutes(1),
                label: "tight".into(),
            },
            ScheduleWindow {
                from: at("2025-09-06T08:30:00Z"),
                till: at("2025-09-06T09:30:00Z"),
                interval: minutes(20),
                label: "loose".into(),
            },
        ];
        let ticker = AdaptiveTicker::new(Duration::from_secs(3 * 3600), windows);
        let now = at("2025-09-06T09:00:00Z");

        assert_eq!(ticker.wait_at(now), minutes(20));
        assert_eq!(ticker.active_window(now).unwrap().label, "loose");
    }

    #[test]
    fn test_tighter_window_wins_when_listed_last() {
        let deadlines = vec![
            Deadline::parse("2025-09-06T09:20:00Z", "second").unwrap(),
            Deadline::parse("2025-09-06T09:00:00Z", "first").unwrap(),
        ];
        let ticker = AdaptiveTicker::from_deadlines(Duration::from_secs(3 * 3600), &deadlines);

        assert_eq!(ticker.wait_at(at("2025-09-06T08:57:00Z")), minutes(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_delivered() {
        let token = CancellationToken::new();
        let ticker = AdaptiveTicker::new(Duration::from_secs(10), Vec::new());
        let mut ticks = ticker.spawn(token.clone());

        assert!(ticks.recv().await.is_some());
        assert!(ticks.recv().await.is_some());

        ticks.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconsumed_ticks_are_dropped() {
        let token = CancellationToken::new();
        let ticker = AdaptiveTicker::new(Duration::from_secs(10), Vec::new());
        let mut ticks = ticker.spawn(token.clone());

        // Three ticks fire while nobody listens; only one is buffered
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert!(ticks.recv().await.is_some());
        let next = tokio::time::timeout(Duration::from_secs(1), ticks.recv()).await;
        assert!(next.is_err(), "backlog should not build up");

        ticks.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_stream() {
        let token = CancellationToken::new();
        let ticker = AdaptiveTicker::new(Duration::from_secs(10), Vec::new());
        let mut ticks = ticker.spawn(token.clone());

        ticks.stop();
        assert!(ticks.recv().await.is_none());
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_ticker() {
        let token = CancellationToken::new();
        let ticker = AdaptiveTicker::new(Duration::from_secs(10), Vec::new());
        let mut ticks = ticker.spawn(token.child_token());

        token.cancel();
        assert!(ticks.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_tick_is_published() {
        let token = CancellationToken::new();
        let ticker = AdaptiveTicker::new(Duration::from_secs(600), Vec::new());
        let ticks = ticker.spawn(token);
        let mut watch = ticks.next_tick_watch();

        watch.changed().await.unwrap();
        let planned = ticks.next_tick_at().unwrap();
        assert!(planned > Utc::now());

        ticks.shutdown().await;
    }
