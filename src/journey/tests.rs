use super::Journey;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use giro_core::{
    config::{ConversationConfig, LimitsConfig, MemoryConfig},
    error::GiroError,
    message::{Answer, ChatKind, ContextEntry, InboundMessage, Outcome},
    templates::Templates,
    traits::{Reasoner, Transport},
};
use giro_memory::{ClaimResult, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// -----------------------------------------------------------------------
// Test doubles
// -----------------------------------------------------------------------

#[derive(Default)]
struct MockTransport {
    sent: Mutex<Vec<(ChatKind, String, String)>>,
    fail_send: bool,
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_text(&self, kind: ChatKind, target: &str, text: &str) -> Result<(), GiroError> {
        if self.fail_send {
            return Err(GiroError::Channel("connection reset".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((kind, target.to_string(), text.to_string()));
        Ok(())
    }
}

impl MockTransport {
    fn sent(&self) -> Vec<(ChatKind, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

struct MockReasoner {
    answer: Result<Answer, String>,
    fatal: bool,
    calls: AtomicUsize,
    last_context_len: AtomicUsize,
}

impl MockReasoner {
    fn replying(answer: Answer) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(answer),
            fatal: false,
            calls: AtomicUsize::new(0),
            last_context_len: AtomicUsize::new(0),
        })
    }

    fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(reason.to_string()),
            fatal: false,
            calls: AtomicUsize::new(0),
            last_context_len: AtomicUsize::new(0),
        })
    }

    /// Fails with a catalog desync, the one error class that must not
    /// trigger a retry.
    fn failing_fatally(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(reason.to_string()),
            fatal: true,
            calls: AtomicUsize::new(0),
            last_context_len: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn answer(
        &self,
        _kind: ChatKind,
        context: &[ContextEntry],
        _text: &str,
    ) -> Result<Answer, GiroError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_context_len.store(context.len(), Ordering::SeqCst);
        match &self.answer {
            Ok(a) => Ok(a.clone()),
            Err(e) if self.fatal => Err(GiroError::DataIntegrity(e.clone())),
            Err(e) => Err(GiroError::Agent(e.clone())),
        }
    }
}

// -----------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------

async fn test_store() -> Store {
    Store::new(
        &MemoryConfig {
            db_path: ":memory:".to_string(),
        },
        &ConversationConfig::default(),
    )
    .await
    .unwrap()
}

struct Harness {
    journey: Journey,
    transport: Arc<MockTransport>,
    recommend: Arc<MockReasoner>,
    register: Arc<MockReasoner>,
}

async fn harness_with(
    recommend: Arc<MockReasoner>,
    register: Arc<MockReasoner>,
    fail_send: bool,
) -> Harness {
    let store = test_store().await;
    let transport = Arc::new(MockTransport {
        sent: Mutex::new(Vec::new()),
        fail_send,
    });
    let journey = Journey::new(
        store,
        transport.clone(),
        recommend.clone(),
        register.clone(),
        Templates::default(),
        LimitsConfig::default(),
        ConversationConfig::default(),
    );
    Harness {
        journey,
        transport,
        recommend,
        register,
    }
}

async fn harness() -> Harness {
    let answer = Answer {
        text: Some("Stasera c'è un concerto!".to_string()),
        outcome: Outcome::Ai,
        item_ids: vec![42],
    };
    harness_with(
        MockReasoner::replying(answer),
        MockReasoner::replying(Answer {
            text: Some("Parliamo del tuo locale.".to_string()),
            outcome: Outcome::Conversational,
            item_ids: vec![],
        }),
        false,
    )
    .await
}

fn msg(external_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        external_id: external_id.to_string(),
        channel_key: "393331234567".to_string(),
        kind: ChatKind::User,
        text: text.to_string(),
        received_at: Utc::now(),
    }
}

/// The (outcome, outbound) recorded for a turn.
async fn turn_record(store: &Store, external_id: &str) -> (String, Option<String>, i64) {
    sqlx::query_as("SELECT outcome, outbound, identity_id FROM turns WHERE external_id = ?")
        .bind(external_id)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

/// Seed `count` finalized turns with `outcome`, oldest `oldest_days_ago` days
/// old, one hour apart. Returns the earliest receive time.
async fn seed_turns(
    h: &Harness,
    identity_id: i64,
    outcome: Outcome,
    count: i64,
    oldest_days_ago: i64,
) -> chrono::DateTime<Utc> {
    let earliest = Utc::now() - Duration::days(oldest_days_ago);
    for i in 0..count {
        let mut m = msg(&format!("wamid.seed-{}-{i}", outcome.as_str()), "q");
        m.received_at = earliest + Duration::hours(i);
        let ClaimResult::Claimed(turn_id) = h.journey.store.claim_turn(&m).await.unwrap() else {
            panic!("expected claim");
        };
        let answer = Answer {
            text: Some("r".to_string()),
            outcome,
            item_ids: vec![],
        };
        h.journey
            .store
            .finalize_turn(turn_id, identity_id, &answer)
            .await
            .unwrap();
    }
    earliest
}

// -----------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_first_contact_gets_welcome() {
    let h = harness().await;
    h.journey.handle_message(msg("wamid.1", "ciao")).await;

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "393331234567");
    assert_eq!(sent[0].2, Templates::default().welcome);
    // The inbound question itself is not answered on first contact.
    assert_eq!(h.recommend.calls(), 0);

    let identity = h
        .journey
        .store
        .find_identity(ChatKind::User, "393331234567")
        .await
        .unwrap()
        .unwrap();
    let (outcome, _, identity_id) = turn_record(&h.journey.store, "wamid.1").await;
    assert_eq!(outcome, "template");
    assert_eq!(identity_id, identity.id);
}

#[tokio::test]
async fn test_capacity_refuses_new_senders() {
    let mut h = harness().await;
    h.journey.limits.max_identity_capacity = 1;

    h.journey.handle_message(msg("wamid.c1", "ciao")).await;

    let mut second = msg("wamid.c2", "ciao anche a me");
    second.channel_key = "393339999999".to_string();
    h.journey.handle_message(second).await;

    let sent = h.transport.sent();
    assert_eq!(sent[1].2, Templates::default().capacity_reached);

    // The refused sender exists, indefinitely blocked, and stays silent.
    let refused = h
        .journey
        .store
        .find_identity(ChatKind::User, "393339999999")
        .await
        .unwrap()
        .unwrap();
    assert!(refused.is_blocked);
    assert!(refused.block_expires_at.is_none());

    let mut third = msg("wamid.c3", "ci sei?");
    third.channel_key = "393339999999".to_string();
    h.journey.handle_message(third).await;
    assert_eq!(h.transport.sent().len(), 2);

    // Business onboarding is never capacity-capped.
    let mut biz = msg("wamid.c4", "registro il locale");
    biz.kind = ChatKind::Business;
    biz.channel_key = "393338888888".to_string();
    h.journey.handle_message(biz).await;
    assert_eq!(
        h.transport.sent().last().unwrap().2,
        Templates::default().business_welcome
    );
}

#[tokio::test]
async fn test_duplicate_delivery_is_dropped() {
    let h = harness().await;
    let m = msg("wamid.dup", "ciao");
    h.journey.handle_message(m.clone()).await;
    h.journey.handle_message(m).await;

    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn test_known_identity_reaches_reasoner_with_context() {
    let h = harness().await;
    h.journey.handle_message(msg("wamid.a", "ciao")).await;
    h.journey
        .handle_message(msg("wamid.b", "che concerti ci sono stasera?"))
        .await;

    assert_eq!(h.recommend.calls(), 1);
    // Welcome turn contributes both its lines to the context.
    assert_eq!(h.recommend.last_context_len.load(Ordering::SeqCst), 2);

    let sent = h.transport.sent();
    assert_eq!(sent.last().unwrap().2, "Stasera c'è un concerto!");

    let (outcome, outbound, _) = turn_record(&h.journey.store, "wamid.b").await;
    assert_eq!(outcome, "ai");
    assert_eq!(outbound.as_deref(), Some("Stasera c'è un concerto!"));
}

#[tokio::test]
async fn test_business_chat_uses_register_agent() {
    let h = harness().await;
    let mut m = msg("wamid.biz1", "ciao");
    m.kind = ChatKind::Business;
    h.journey.handle_message(m).await;

    // First contact: business welcome, no reasoner yet.
    assert_eq!(h.transport.sent()[0].2, Templates::default().business_welcome);
    assert_eq!(h.transport.sent()[0].0, ChatKind::Business);

    let mut m = msg("wamid.biz2", "vorrei registrare il mio bar");
    m.kind = ChatKind::Business;
    h.journey.handle_message(m).await;

    assert_eq!(h.register.calls(), 1);
    assert_eq!(h.recommend.calls(), 0);
}

#[tokio::test]
async fn test_answer_limit_blocks_anchored_to_earliest_turn() {
    let h = harness().await;
    let identity = h
        .journey
        .store
        .create_identity(ChatKind::User, "393331234567", false)
        .await
        .unwrap();

    // Ten answered turns in the window, the earliest three days ago.
    let earliest = seed_turns(&h, identity.id, Outcome::Ai, 10, 3).await;

    h.journey.handle_message(msg("wamid.limit", "e stasera?")).await;

    assert_eq!(h.recommend.calls(), 0);
    let sent = h.transport.sent();
    let until = (earliest + Duration::days(7)).format("%d/%m/%Y").to_string();
    assert!(sent[0].2.contains("10"));
    assert!(sent[0].2.contains(&until));

    let blocked = h
        .journey
        .store
        .find_identity(ChatKind::User, "393331234567")
        .await
        .unwrap()
        .unwrap();
    assert!(blocked.is_blocked);
    let expires = blocked.block_expires_at.unwrap();
    assert!((expires - (earliest + Duration::days(7))).num_seconds().abs() < 2);

    let (outcome, _, _) = turn_record(&h.journey.store, "wamid.limit").await;
    assert_eq!(outcome, "template");
}

#[tokio::test]
async fn test_refusal_limit_blocks() {
    let h = harness().await;
    let identity = h
        .journey
        .store
        .create_identity(ChatKind::User, "393331234567", false)
        .await
        .unwrap();
    seed_turns(&h, identity.id, Outcome::Blocked, 5, 2).await;

    h.journey.handle_message(msg("wamid.ref", "dai rispondi")).await;

    assert_eq!(h.recommend.calls(), 0);
    assert!(h.transport.sent()[0].2.contains('5'));
}

#[tokio::test]
async fn test_old_turns_do_not_count_toward_limits() {
    let h = harness().await;
    let identity = h
        .journey
        .store
        .create_identity(ChatKind::User, "393331234567", false)
        .await
        .unwrap();
    // Ten answered turns, but all older than the window.
    seed_turns(&h, identity.id, Outcome::Ai, 10, 30).await;

    h.journey.handle_message(msg("wamid.fresh", "che si fa?")).await;
    assert_eq!(h.recommend.calls(), 1);
}

#[tokio::test]
async fn test_blocked_identity_is_silent_until_expiry() {
    let h = harness().await;
    let identity = h
        .journey
        .store
        .create_identity(ChatKind::User, "393331234567", false)
        .await
        .unwrap();
    h.journey
        .store
        .block_identity(identity.id, Some(Utc::now() + Duration::days(2)))
        .await
        .unwrap();

    h.journey.handle_message(msg("wamid.quiet", "ci sei?")).await;

    assert!(h.transport.sent().is_empty());
    assert_eq!(h.recommend.calls(), 0);
    let (outcome, outbound, _) = turn_record(&h.journey.store, "wamid.quiet").await;
    assert_eq!(outcome, "unanswered");
    assert!(outbound.is_none());
}

#[tokio::test]
async fn test_indefinite_block_never_expires() {
    let h = harness().await;
    let identity = h
        .journey
        .store
        .create_identity(ChatKind::User, "393331234567", false)
        .await
        .unwrap();
    h.journey.store.block_identity(identity.id, None).await.unwrap();

    h.journey.handle_message(msg("wamid.cap", "ciao?")).await;

    assert!(h.transport.sent().is_empty());
    let refreshed = h
        .journey
        .store
        .find_identity(ChatKind::User, "393331234567")
        .await
        .unwrap()
        .unwrap();
    assert!(refreshed.is_blocked);
}

#[tokio::test]
async fn test_expired_block_lifts_with_notice() {
    let h = harness().await;
    let identity = h
        .journey
        .store
        .create_identity(ChatKind::User, "393331234567", false)
        .await
        .unwrap();
    h.journey
        .store
        .block_identity(identity.id, Some(Utc::now() - Duration::hours(1)))
        .await
        .unwrap();

    h.journey.handle_message(msg("wamid.back", "ci sei?")).await;

    // The triggering message gets the notice, not an answer.
    assert_eq!(h.transport.sent()[0].2, Templates::default().unblocked);
    assert_eq!(h.recommend.calls(), 0);
    let refreshed = h
        .journey
        .store
        .find_identity(ChatKind::User, "393331234567")
        .await
        .unwrap()
        .unwrap();
    assert!(!refreshed.is_blocked);

    // The next message flows normally.
    h.journey.handle_message(msg("wamid.next", "che si fa?")).await;
    assert_eq!(h.recommend.calls(), 1);
}

#[tokio::test]
async fn test_admin_bypasses_limits() {
    let h = harness().await;
    let identity = h
        .journey
        .store
        .create_identity(ChatKind::User, "393331234567", false)
        .await
        .unwrap();
    sqlx::query("UPDATE identities SET is_admin = 1 WHERE id = ?")
        .bind(identity.id)
        .execute(h.journey.store.pool())
        .await
        .unwrap();
    seed_turns(&h, identity.id, Outcome::Ai, 20, 2).await;

    h.journey.handle_message(msg("wamid.adm", "che si fa?")).await;
    assert_eq!(h.recommend.calls(), 1);
}

#[tokio::test]
async fn test_stale_message_gets_apology() {
    let h = harness().await;
    h.journey.handle_message(msg("wamid.w", "ciao")).await;

    let mut m = msg("wamid.late", "che si fa stasera?");
    m.received_at = Utc::now() - Duration::hours(2);
    h.journey.handle_message(m).await;

    assert_eq!(h.recommend.calls(), 0);
    assert_eq!(
        h.transport.sent().last().unwrap().2,
        Templates::default().not_delivered
    );
    let (outcome, _, _) = turn_record(&h.journey.store, "wamid.late").await;
    assert_eq!(outcome, "failed");
}

#[tokio::test]
async fn test_reasoner_failure_releases_claim() {
    let h = harness_with(
        MockReasoner::failing("model overloaded"),
        MockReasoner::failing("model overloaded"),
        false,
    )
    .await;
    h.journey.handle_message(msg("wamid.w", "ciao")).await;

    let m = msg("wamid.err", "che si fa?");
    h.journey.handle_message(m.clone()).await;

    // The claim was released: the retry gets a fresh one.
    assert!(matches!(
        h.journey.store.claim_turn(&m).await.unwrap(),
        ClaimResult::Claimed(_)
    ));
}

#[tokio::test]
async fn test_catalog_desync_keeps_claim() {
    let h = harness_with(
        MockReasoner::failing_fatally("retrieval returned unknown item ids: [42]"),
        MockReasoner::replying(Answer::unanswered()),
        false,
    )
    .await;
    h.journey.handle_message(msg("wamid.w", "ciao")).await;

    let m = msg("wamid.desync", "che si fa?");
    h.journey.handle_message(m.clone()).await;

    // A desync fails every retry the same way, so the claim is kept and
    // redeliveries are dropped as duplicates instead of looping.
    assert!(matches!(
        h.journey.store.claim_turn(&m).await.unwrap(),
        ClaimResult::AlreadyProcessed
    ));
    // Only the welcome went out.
    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn test_send_failure_releases_claim() {
    let h = harness_with(
        MockReasoner::replying(Answer {
            text: Some("risposta".to_string()),
            outcome: Outcome::Ai,
            item_ids: vec![],
        }),
        MockReasoner::replying(Answer::unanswered()),
        true,
    )
    .await;

    let m = msg("wamid.down", "ciao");
    h.journey.handle_message(m.clone()).await;

    // Even the welcome failed to send, so the turn must be reclaimable.
    assert!(matches!(
        h.journey.store.claim_turn(&m).await.unwrap(),
        ClaimResult::Claimed(_)
    ));
}
