//! End-to-end flow across the realtime services, driving them the way a
//! websocket session would: connect, join, send, mark seen, disconnect.

use tokio::sync::mpsc;
use uuid::Uuid;

use parley_realtime::{
    ConnectionRegistry, EventSender, MessageGateway, PresenceService, ReceiptTracker, RoomManager,
    SendRequest, ServerEvent, TypingRelay,
};
use parley_store::{AccountRepository, ConversationKind, ConversationRepository, test_pool};

struct Session {
    connection_id: Uuid,
    rx: mpsc::Receiver<ServerEvent>,
}

async fn open_session(
    presence: &PresenceService,
    account_id: &str,
) -> (Session, EventSender) {
    let (tx, rx) = mpsc::channel(32);
    let connection_id = Uuid::new_v4();
    presence
        .connect(account_id, connection_id, tx.clone())
        .await
        .unwrap();
    (Session { connection_id, rx }, tx)
}

#[tokio::test]
async fn chat_session_from_connect_to_disconnect() {
    let pool = test_pool().await;
    let accounts = AccountRepository::new(pool.clone());
    let conversations = ConversationRepository::new(pool.clone());

    let registry = ConnectionRegistry::new();
    let rooms = RoomManager::new();
    let presence = PresenceService::new(registry.clone(), pool.clone());
    let gateway = MessageGateway::new(pool.clone(), rooms.clone());
    let receipts = ReceiptTracker::new(pool.clone(), rooms.clone());
    let typing = TypingRelay::new(rooms.clone());

    let ada = accounts
        .create("Ada", "ada@example.com", "hash")
        .await
        .unwrap()
        .id;
    let bob = accounts
        .create("Bob", "bob@example.com", "hash")
        .await
        .unwrap()
        .id;
    accounts.add_contact(&ada, &bob).await.unwrap();
    let conv = conversations
        .create(ConversationKind::Direct, None, &[ada.clone(), bob.clone()])
        .await
        .unwrap();

    // Bob connects first, then sees Ada come online.
    let (mut bob_session, bob_tx) = open_session(&presence, &bob).await;
    let (mut ada_session, ada_tx) = open_session(&presence, &ada).await;
    assert_eq!(
        bob_session.rx.recv().await.unwrap(),
        ServerEvent::ContactOnline {
            user_id: ada.clone()
        }
    );

    // Both join the conversation room.
    rooms
        .join(&conv.id, ada_session.connection_id, ada_tx)
        .await;
    rooms
        .join(&conv.id, bob_session.connection_id, bob_tx)
        .await;

    // Ada types, Bob sees the indicator, Ada does not.
    typing.start(&conv.id, &ada, ada_session.connection_id).await;
    assert!(matches!(
        bob_session.rx.recv().await.unwrap(),
        ServerEvent::TypingStart { .. }
    ));
    assert!(ada_session.rx.try_recv().is_err());

    // Ada sends; both room occupants get the identical broadcast.
    let view = gateway
        .send(
            &conv.id,
            &ada,
            SendRequest {
                text: Some("hello bob".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for session in [&mut ada_session, &mut bob_session] {
        match session.rx.recv().await.unwrap() {
            ServerEvent::MessageNew { message } => assert_eq!(message, view),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // Bob marks the message seen; the receipt reaches the room once.
    assert!(receipts.mark_seen(&view.id, &bob).await.unwrap());
    for session in [&mut ada_session, &mut bob_session] {
        assert_eq!(
            session.rx.recv().await.unwrap(),
            ServerEvent::MessageSeen {
                message_id: view.id.clone(),
                user_id: bob.clone(),
            }
        );
    }
    assert!(!receipts.mark_seen(&view.id, &bob).await.unwrap());

    // Ada disconnects: room cleanup, then the offline flip reaches Bob.
    rooms.leave_all(ada_session.connection_id).await;
    presence
        .disconnect(&ada, ada_session.connection_id)
        .await
        .unwrap();
    match bob_session.rx.recv().await.unwrap() {
        ServerEvent::ContactOffline { user_id, .. } => assert_eq!(user_id, ada),
        other => panic!("unexpected event: {other:?}"),
    }

    // Messages sent after the leave no longer reach Ada's old queue.
    gateway
        .send(
            &conv.id,
            &bob,
            SendRequest {
                text: Some("still there?".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        bob_session.rx.recv().await.unwrap(),
        ServerEvent::MessageNew { .. }
    ));
    assert!(ada_session.rx.try_recv().is_err());
}
