//! End-to-end conversation flows against an in-memory database.
//!
//! Two colleagues register, find each other, bookmark, and one of them
//! leaves. Everything goes through the public engine and dispatcher API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cinema_collab::catalog::Catalog;
use cinema_collab::channels::{Channel, EventStream, InboundEvent};
use cinema_collab::conversation::{ConversationEngine, FavoriteAction, Payload};
use cinema_collab::dispatcher::Dispatcher;
use cinema_collab::error::ChannelError;
use cinema_collab::render::{Keyboard, Outgoing, RenderRequest, labels};
use cinema_collab::store::{LibSqlBackend, ProfileStore, UserId};

const ANNA: UserId = 101;
const BORIS: UserId = 202;

/// Maximum time to wait for the dispatcher to deliver.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    engine: Arc<ConversationEngine>,
    store: Arc<LibSqlBackend>,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let engine = Arc::new(ConversationEngine::new(
            store.clone(),
            Arc::new(Catalog::default()),
        ));
        Self { engine, store }
    }

    async fn say(&self, user: UserId, text: &str) -> Vec<Outgoing> {
        let event = InboundEvent::text("it", user, user, text).with_handle(format!("u{user}"));
        self.engine.handle(&event).await
    }

    async fn press(&self, user: UserId, payload: Payload) -> Vec<Outgoing> {
        let event = InboundEvent::button("it", user, user, payload.to_string());
        self.engine.handle(&event).await
    }

    async fn register(&self, user: UserId, profession: &str, location: &str) {
        self.say(user, "/start").await;
        self.press(user, Payload::EditProfile).await;
        self.say(user, "Sound").await;
        self.say(user, profession).await;
        self.say(user, "3-5 years").await;
        self.say(user, "skip").await;
        self.say(user, location).await;
    }
}

/// Inline keyboards of every card in a reply batch.
fn cards(replies: &[Outgoing]) -> Vec<(&str, Vec<Payload>)> {
    replies
        .iter()
        .filter_map(|r| match r {
            Outgoing::Send(RenderRequest {
                text,
                keyboard: Keyboard::Inline(rows),
                ..
            }) => Some((
                text.as_str(),
                rows.iter().flatten().map(|b| b.payload).collect(),
            )),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn colleagues_find_bookmark_and_leave() {
    let h = Harness::new().await;
    h.register(ANNA, "Sound engineers", "Tbilisi").await;
    h.register(BORIS, "Sound engineers", "Batumi").await;

    // Anna searches for sound engineers and sees both profiles.
    h.say(ANNA, labels::SEARCH).await;
    h.say(ANNA, "Sound").await;
    let replies = h.say(ANNA, "Sound engineers").await;
    let found = cards(&replies);
    assert_eq!(found.len(), 2);

    let add_boris = Payload::Favorite {
        action: FavoriteAction::Add,
        target: BORIS,
    };
    let (boris_card, boris_buttons) = found
        .iter()
        .find(|(_, buttons)| buttons.contains(&add_boris))
        .expect("Boris card offers an add button");
    assert!(boris_card.contains("Batumi"));
    assert!(boris_card.contains(&format!("tg://user?id={BORIS}")));
    assert_eq!(boris_buttons.len(), 1);

    // Anna's own card carries owner controls instead.
    assert!(
        found
            .iter()
            .any(|(_, buttons)| buttons.contains(&Payload::EditProfile))
    );

    // Bookmark Boris; the card flips to a remove button.
    let replies = h.press(ANNA, add_boris).await;
    assert!(h.store.is_favorite(ANNA, BORIS).await.unwrap());
    match &replies[0] {
        Outgoing::ReplaceButtons { buttons, .. } => assert_eq!(
            buttons[0][0].payload,
            Payload::Favorite {
                action: FavoriteAction::Remove,
                target: BORIS,
            }
        ),
        other => panic!("expected ReplaceButtons, got {other:?}"),
    }

    let replies = h.say(ANNA, labels::FAVORITES).await;
    let favorites = cards(&replies);
    assert_eq!(favorites.len(), 1);
    assert!(favorites[0].0.contains("Batumi"));

    // Boris deletes his profile; Anna's bookmark goes with it.
    h.press(BORIS, Payload::DeleteProfile).await;
    h.press(BORIS, Payload::ConfirmDelete).await;
    assert!(h.store.get(BORIS).await.unwrap().is_none());
    assert!(h.store.list_favorites(ANNA).await.unwrap().is_empty());

    // A stale add button on an old card is answered, not applied.
    let replies = h.press(ANNA, add_boris).await;
    assert!(matches!(&replies[..], [Outgoing::Notice(_)]));
    assert!(!h.store.is_favorite(ANNA, BORIS).await.unwrap());
}

#[tokio::test]
async fn search_with_no_match_returns_to_menu() {
    let h = Harness::new().await;
    h.register(ANNA, "Sound engineers", "Tbilisi").await;

    h.say(ANNA, labels::SEARCH).await;
    h.say(ANNA, "Camera").await;
    let catalog = Catalog::default();
    let camera = &catalog.departments[2];
    let replies = h.say(ANNA, &camera.professions[0]).await;

    assert!(cards(&replies).is_empty());
    assert!(matches!(
        &replies[0],
        Outgoing::Send(RenderRequest {
            keyboard: Keyboard::Menu(_),
            ..
        })
    ));
    assert!(h.engine.sessions().get(ANNA).await.is_idle());
}

#[tokio::test]
async fn restart_mid_wizard_keeps_saved_profile() {
    let h = Harness::new().await;
    h.register(ANNA, "Sound engineers", "Tbilisi").await;

    h.press(ANNA, Payload::EditProfile).await;
    h.say(ANNA, "Camera").await;
    h.say(ANNA, "/start").await;

    assert!(h.engine.sessions().get(ANNA).await.is_idle());
    let profile = h.store.get(ANNA).await.unwrap().unwrap();
    assert_eq!(profile.department, "Sound");
    assert_eq!(profile.handle, format!("u{ANNA}"));
}

// ── Through the dispatcher ──────────────────────────────────────────

#[derive(Default)]
struct Transcript {
    batches: Mutex<Vec<(UserId, Vec<Outgoing>)>>,
}

#[async_trait]
impl Channel for Transcript {
    fn name(&self) -> &str {
        "transcript"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn respond(&self, event: &InboundEvent, replies: Vec<Outgoing>) -> Result<(), ChannelError> {
        self.batches.lock().unwrap().push((event.user_id, replies));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[tokio::test]
async fn dispatcher_preserves_per_user_order() {
    let h = Harness::new().await;
    h.register(ANNA, "Sound engineers", "Tbilisi").await;
    h.register(BORIS, "Sound engineers", "Batumi").await;
    let transcript = Arc::new(Transcript::default());
    let dispatcher = Dispatcher::new(
        h.engine.clone(),
        transcript.clone(),
        Duration::from_secs(60),
    );

    let script = [
        labels::MY_PROFILE,
        labels::SEARCH,
        "Sound",
        "Sound engineers",
    ];
    let events: Vec<InboundEvent> = script
        .iter()
        .flat_map(|text| {
            [ANNA, BORIS].map(|user| InboundEvent::text("it", user, user, *text))
        })
        .collect();
    dispatcher
        .run(Box::pin(futures::stream::iter(events)))
        .await;

    let expected = script.len() * 2;
    tokio::time::timeout(TEST_TIMEOUT, async {
        while transcript.batches.lock().unwrap().len() < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all events delivered");

    // The last reply each user got is the search result for two profiles.
    let batches = transcript.batches.lock().unwrap();
    for user in [ANNA, BORIS] {
        let (_, last) = batches
            .iter()
            .rev()
            .find(|(u, _)| *u == user)
            .expect("user got replies");
        assert_eq!(cards(last).len(), 2, "user {user}");
    }
}
