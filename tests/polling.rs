//! Polling loop integration tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use trigger_gateway::channels::telegram::{PollOutcome, Poller, UpdateSource};
use trigger_gateway::config::PollingConfig;
use trigger_gateway::{Error, MessageSender, Result};

mod common;
use common::{RecordingSender, build_dispatcher, create_test_trigger, setup_test_db, text_update};

type Batch = Result<Vec<serde_json::Value>>;

/// Update source that replays a script, then long-polls forever
#[derive(Clone)]
struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Batch>>>,
    offsets: Arc<Mutex<Vec<(Option<i64>, Instant)>>>,
}

impl ScriptedSource {
    fn new(script: Vec<Batch>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            offsets: Arc::default(),
        }
    }

    fn offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().unwrap().iter().map(|(o, _)| *o).collect()
    }

    fn fetch_times(&self) -> Vec<Instant> {
        self.offsets.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn fetch(&self, offset: Option<i64>, _long_poll: Duration) -> Batch {
        self.offsets.lock().unwrap().push((offset, Instant::now()));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => std::future::pending::<Batch>().await,
        }
    }
}

/// Sender that fails for one chat
struct FlakySender {
    inner: RecordingSender,
    failing_chat: i64,
}

#[async_trait]
impl MessageSender for FlakySender {
    async fn send(&self, chat_id: i64, text: &str) -> bool {
        self.inner.send(chat_id, text).await && chat_id != self.failing_chat
    }
}

fn fetch_error() -> Batch {
    Err(Error::Channel("getUpdates failed: connection refused".to_string()))
}

#[tokio::test]
async fn test_cursor_advances_past_failed_dispatch() {
    let db = setup_test_db();
    create_test_trigger(&db, "ping", "pong");
    let sender = Arc::new(FlakySender {
        inner: RecordingSender::default(),
        failing_chat: 6,
    });
    let dispatcher = Arc::new(trigger_gateway::Dispatcher::new(
        Arc::new(trigger_gateway::TriggerRepo::new(db.clone())),
        sender.clone(),
    ));

    let source = ScriptedSource::new(vec![Ok(vec![
        text_update(5, 5, "ping"),
        text_update(6, 6, "ping"),
        text_update(7, 7, "ping"),
    ])]);
    let mut poller = Poller::new(source.clone(), dispatcher, PollingConfig::default());

    let PollOutcome::Batch(summary) = poller.poll_once().await else {
        panic!("expected a batch");
    };

    assert_eq!(summary.received, 3);
    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.sent, 2);
    assert_eq!(poller.cursor().last_update_id(), Some(7));
    assert_eq!(poller.cursor().next_offset(), Some(8));

    let chats: Vec<i64> = sender.inner.sent().await.iter().map(|(c, _)| *c).collect();
    assert_eq!(chats, vec![5, 6, 7]);
}

#[tokio::test]
async fn test_fetch_failure_leaves_cursor() {
    let db = setup_test_db();
    create_test_trigger(&db, "ping", "pong");
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = build_dispatcher(&db, sender.clone());

    let source = ScriptedSource::new(vec![
        Ok(vec![text_update(10, 1, "ping")]),
        fetch_error(),
    ]);
    let mut poller = Poller::new(source.clone(), dispatcher, PollingConfig::default());

    assert!(matches!(poller.poll_once().await, PollOutcome::Batch(_)));
    assert_eq!(poller.poll_once().await, PollOutcome::FetchFailed);

    assert_eq!(poller.cursor().last_update_id(), Some(10));
    assert_eq!(source.offsets(), vec![None, Some(11)]);
    assert_eq!(sender.sent().await.len(), 1);
}

#[tokio::test]
async fn test_unusable_entries_still_advance_cursor() {
    let db = setup_test_db();
    create_test_trigger(&db, "ping", "pong");
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = build_dispatcher(&db, sender.clone());

    let source = ScriptedSource::new(vec![Ok(vec![
        serde_json::json!({"update_id": 20, "edited_message": {"text": "ping"}}),
        serde_json::json!({"message": {"text": "ping", "chat": {"id": 1}}}),
        text_update(21, 1, ""),
        serde_json::json!({"update_id": 22, "message": {"text": "ping", "chat": {"id": 3}}}),
    ])]);
    let mut poller = Poller::new(source, dispatcher, PollingConfig::default());

    let PollOutcome::Batch(summary) = poller.poll_once().await else {
        panic!("expected a batch");
    };

    assert_eq!(summary.received, 4);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(poller.cursor().last_update_id(), Some(22));
    assert_eq!(sender.sent().await, vec![(3, "pong".to_string())]);
}

#[tokio::test]
async fn test_repeated_update_id_replies_once() {
    let db = setup_test_db();
    create_test_trigger(&db, "ping", "pong");
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = build_dispatcher(&db, sender.clone());

    let source = ScriptedSource::new(vec![
        Ok(vec![text_update(30, 1, "ping"), text_update(30, 1, "ping")]),
        Ok(vec![text_update(30, 1, "ping"), text_update(31, 1, "PING")]),
    ]);
    let mut poller = Poller::new(source, dispatcher, PollingConfig::default());

    poller.poll_once().await;
    poller.poll_once().await;

    assert_eq!(poller.cursor().last_update_id(), Some(31));
    assert_eq!(sender.sent().await.len(), 2);
}

#[tokio::test]
async fn test_poller_and_webhook_share_dedup() {
    let db = setup_test_db();
    create_test_trigger(&db, "ping", "pong");
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = build_dispatcher(&db, sender.clone());

    let webhook_update = trigger_gateway::channels::normalize(&text_update(40, 1, "ping")).unwrap();
    dispatcher.dispatch(webhook_update).await;

    let source = ScriptedSource::new(vec![Ok(vec![text_update(40, 1, "ping")])]);
    let mut poller = Poller::new(source, dispatcher, PollingConfig::default());
    poller.poll_once().await;

    assert_eq!(poller.cursor().last_update_id(), Some(40));
    assert_eq!(sender.sent().await.len(), 1);
}

#[tokio::test]
async fn test_run_backs_off_then_stops_on_shutdown() {
    let db = setup_test_db();
    create_test_trigger(&db, "ping", "pong");
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = build_dispatcher(&db, sender.clone());

    let config = PollingConfig {
        long_poll_timeout: Duration::from_secs(1),
        interval: Duration::from_millis(50),
        backoff: Duration::from_millis(400),
    };
    let source = ScriptedSource::new(vec![fetch_error(), Ok(vec![text_update(50, 9, "ping")])]);
    let poller = Poller::new(source.clone(), dispatcher, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(poller.run(shutdown_rx));

    // Third fetch parks forever once the script runs out
    while source.offsets().len() < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    let cursor = handle.await.unwrap();

    assert_eq!(cursor.last_update_id(), Some(50));
    assert_eq!(source.offsets(), vec![None, None, Some(51)]);
    assert_eq!(sender.sent().await, vec![(9, "pong".to_string())]);

    let times = source.fetch_times();
    assert!(times[1] - times[0] >= config.backoff);
    assert!(times[2] - times[1] >= config.interval);
    assert!(times[2] - times[1] < config.backoff);
}

#[tokio::test]
async fn test_run_exits_when_already_shut_down() {
    let db = setup_test_db();
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = build_dispatcher(&db, sender);

    let source = ScriptedSource::new(vec![]);
    let poller = Poller::new(source.clone(), dispatcher, PollingConfig::default());

    let (shutdown_tx, shutdown_rx) = watch::channel(true);
    let cursor = poller.run(shutdown_rx).await;
    drop(shutdown_tx);

    assert_eq!(cursor.last_update_id(), None);
    assert!(source.offsets().is_empty());
}
