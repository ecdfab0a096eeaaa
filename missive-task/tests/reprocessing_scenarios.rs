//! Reprocessing scenarios over a real queue

use std::sync::Arc;

use async_trait::async_trait;

use missive_blob::{MailPartsStore, MemoryBlobStore};
use missive_common::{Mail, NoopMetrics, Signal};
use missive_queue::{Enqueuer, MemoryBroker, MemoryQueueView, QueueConfig, QueueName, QueueView};
use missive_task::{
    MailLocator, MailSource, MemoryMailSource, QueueReprocessor, Reprocessor, ReprocessingKind,
    ReprocessingTask, SourceError, StoredMail, TaskError, TaskOutcome,
};

struct Fixture {
    view: Arc<MemoryQueueView>,
    reprocessor: Arc<QueueReprocessor>,
}

fn fixture() -> Fixture {
    let broker = MemoryBroker::new();
    let view = Arc::new(MemoryQueueView::new());
    let enqueuer = Enqueuer::new(
        QueueName::new("outbound"),
        Arc::new(broker),
        MailPartsStore::new(Arc::new(MemoryBlobStore::new())),
        view.clone(),
        Arc::new(NoopMetrics),
        &QueueConfig::default(),
    );

    Fixture {
        view,
        reprocessor: Arc::new(QueueReprocessor::new(Arc::new(enqueuer))),
    }
}

fn stored(mailbox: &str, uid: u64, poison: bool) -> StoredMail {
    let mut builder = Mail::builder()
        .name(format!("stored-{mailbox}-{uid}"))
        .sender("a@x")
        .recipient("b@y")
        .body(format!("body {mailbox}/{uid}").into_bytes());
    if poison {
        builder = builder.attribute("poison", "true");
    }

    StoredMail {
        locator: MailLocator::new(mailbox, uid),
        mail: builder.build(),
    }
}

/// Fails mails carrying the poison attribute before they reach the queue,
/// standing in for any per-mail enqueue failure.
#[derive(Debug)]
struct GatedReprocessor {
    inner: Arc<QueueReprocessor>,
}

#[async_trait]
impl Reprocessor for GatedReprocessor {
    async fn reprocess(&self, mail: Mail) -> missive_queue::Result<()> {
        if mail.attributes().contains_key("poison") {
            return Err(missive_queue::QueueError::Broker(
                missive_queue::BrokerError::Unavailable("enqueue refused".to_string()),
            ));
        }
        self.inner.reprocess(mail).await
    }
}

fn shutdown() -> tokio::sync::broadcast::Receiver<Signal> {
    tokio::sync::broadcast::channel(1).1
}

#[tokio::test]
async fn full_reprocessing_over_two_mailboxes() {
    let fx = fixture();

    // Mailbox 1 fails at uid 10, mailbox 2 fails at uid 20; 42 others succeed
    let mails = (1..=22)
        .map(|uid| stored("1", uid, uid == 10))
        .chain((1..=22).map(|uid| stored("2", uid, uid == 20)));
    let source = MemoryMailSource::new(mails);

    let mut task = ReprocessingTask::new(
        ReprocessingKind::Full,
        source,
        Arc::new(GatedReprocessor {
            inner: fx.reprocessor.clone(),
        }),
    );

    let outcome = task.run(shutdown()).await.expect("run");
    assert_eq!(outcome, TaskOutcome::Completed);

    let details = task.snapshot();
    assert_eq!(details.successfully_reprocessed_mail_count, 42);
    assert_eq!(details.failed_reprocessed_mail_count, 2);
    assert_eq!(details.failures.len(), 2);
    assert_eq!(details.failures[0].mailbox_id, "1");
    assert_eq!(details.failures[0].uids, [10]);
    assert_eq!(details.failures[1].mailbox_id, "2");
    assert_eq!(details.failures[1].uids, [20]);

    // The serialized failure groups follow the monitoring contract
    let value = serde_json::to_value(&details).expect("serialize");
    assert_eq!(
        value["failures"],
        serde_json::json!([
            { "mailboxId": "1", "uids": [10] },
            { "mailboxId": "2", "uids": [20] }
        ])
    );

    // Every successful mail landed in the queue
    let queue = QueueName::new("outbound");
    assert_eq!(fx.view.get_size(&queue).await.expect("size"), 42);
}

#[tokio::test]
async fn reprocessed_mail_gets_a_fresh_identity() {
    let fx = fixture();

    let source = MemoryMailSource::new([stored("1", 1, false)]);
    let mut task = ReprocessingTask::new(
        ReprocessingKind::SingleMessage,
        source,
        fx.reprocessor.clone(),
    );
    task.run(shutdown()).await.expect("run");

    let queue = QueueName::new("outbound");
    let items: Vec<_> = fx.view.browse(&queue).await.expect("browse").collect();
    assert_eq!(items.len(), 1);

    // The original name must not survive: a consumer that already classified
    // "stored-1-1" as deleted would otherwise drop the reprocessed mail
    assert_ne!(items[0].name, "stored-1-1");
    assert!(items[0].name.starts_with("reprocess-"));
    assert_eq!(items[0].sender, "a@x");
}

/// Source that fails mid-walk.
struct CollapsingSource {
    remaining: MemoryMailSource,
    yield_before_failure: usize,
}

#[async_trait]
impl MailSource for CollapsingSource {
    async fn next(&mut self) -> Result<Option<StoredMail>, SourceError> {
        if self.yield_before_failure == 0 {
            return Err(SourceError::Unreadable(
                "repository connection lost".to_string(),
            ));
        }
        self.yield_before_failure -= 1;
        self.remaining.next().await
    }
}

#[tokio::test]
async fn source_failure_aborts_but_preserves_accounting() {
    let fx = fixture();

    let source = CollapsingSource {
        remaining: MemoryMailSource::new((1..=10).map(|uid| stored("1", uid, false))),
        yield_before_failure: 3,
    };
    let mut task = ReprocessingTask::new(ReprocessingKind::Full, source, fx.reprocessor.clone());
    let progress = task.progress();

    let err = task.run(shutdown()).await.expect_err("walk must fail");
    assert!(matches!(err, TaskError::Source(_)));

    // The three mails walked before the collapse are accounted for
    assert_eq!(progress.snapshot().successfully_reprocessed_mail_count, 3);
}
