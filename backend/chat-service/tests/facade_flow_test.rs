// End-to-end facade behavior on the in-memory store: ordering, DM dedup,
// reaction toggles, unread accounting and live subscriptions, without any
// infrastructure.

use std::sync::Arc;

use chat_service::config::{BadgeScope, Config};
use chat_service::error::AppError;
use chat_service::models::{ConversationKind, MemberProfile};
use chat_service::services::ChatService;
use chat_service::store::MemoryChatStore;
use chat_service::websocket::{ChatEvent, ConnectionRegistry};
use uuid::Uuid;

// ============================================
// Fixtures
// ============================================

fn facade() -> ChatService {
    ChatService::new(
        Arc::new(MemoryChatStore::new()),
        &Config::test_defaults(),
        ConnectionRegistry::new(),
        None,
    )
}

fn dad(name: &str) -> MemberProfile {
    MemberProfile {
        user_id: Uuid::new_v4(),
        display_name: name.to_string(),
        avatar_url: Some(format!("https://cdn.dadspace.dev/avatars/{name}.png")),
    }
}

async fn dm(chat: &ChatService, a: &MemberProfile, b: &MemberProfile) -> Uuid {
    let (conversation, _) = chat.create_or_get_dm(a, b).await.unwrap();
    conversation.id
}

// ============================================
// Ordering
// ============================================

#[tokio::test]
async fn messages_arrive_in_send_order_with_ascending_timestamps() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    for text in ["one", "two", "three", "four", "five"] {
        chat.send_message(conversation, &alice, text, None)
            .await
            .unwrap();
    }

    let messages = chat
        .messages(conversation, bob.user_id, None, None)
        .await
        .unwrap();
    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["one", "two", "three", "four", "five"]);
    for pair in messages.windows(2) {
        assert!(pair[0].sent_at <= pair[1].sent_at);
    }
}

#[tokio::test]
async fn history_pages_walk_backwards_through_the_stream() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    for i in 0..7 {
        chat.send_message(conversation, &alice, &format!("m{i}"), None)
            .await
            .unwrap();
    }

    let newest = chat
        .messages(conversation, bob.user_id, Some(3), None)
        .await
        .unwrap();
    assert_eq!(
        newest.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
        ["m4", "m5", "m6"]
    );

    let older = chat
        .messages(conversation, bob.user_id, Some(3), Some(newest[0].id))
        .await
        .unwrap();
    assert_eq!(
        older.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
        ["m1", "m2", "m3"]
    );
}

// ============================================
// DM dedup
// ============================================

#[tokio::test]
async fn create_or_get_dm_is_idempotent() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");

    let (first, created_first) = chat.create_or_get_dm(&alice, &bob).await.unwrap();
    let (second, created_second) = chat.create_or_get_dm(&alice, &bob).await.unwrap();

    assert!(created_first);
    assert!(!created_second);
    assert_eq!(first.id, second.id);
    assert_eq!(chat.list_conversations(alice.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn dm_dedup_ignores_which_side_initiates() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");

    let (from_alice, _) = chat.create_or_get_dm(&alice, &bob).await.unwrap();
    let (from_bob, created) = chat.create_or_get_dm(&bob, &alice).await.unwrap();

    assert!(!created);
    assert_eq!(from_alice.id, from_bob.id);
}

// ============================================
// Reactions
// ============================================

#[tokio::test]
async fn double_toggle_restores_the_original_state() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;
    let sent = chat
        .send_message(conversation, &bob, "hi back", None)
        .await
        .unwrap();

    let once = chat
        .toggle_reaction(sent.message.id, alice.user_id, "👍")
        .await
        .unwrap();
    assert!(once.added);
    assert_eq!(once.message.reactions.len(), 1);
    assert_eq!(once.message.reactions[0].user_ids, vec![alice.user_id]);

    let twice = chat
        .toggle_reaction(sent.message.id, alice.user_id, "👍")
        .await
        .unwrap();
    assert!(!twice.added);
    assert!(twice.message.reactions.is_empty());
}

#[tokio::test]
async fn second_user_joins_the_existing_entry_without_duplicates() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;
    let sent = chat
        .send_message(conversation, &alice, "park at noon?", None)
        .await
        .unwrap();
    let message_id = sent.message.id;

    chat.toggle_reaction(message_id, alice.user_id, "👍")
        .await
        .unwrap();
    let outcome = chat
        .toggle_reaction(message_id, bob.user_id, "👍")
        .await
        .unwrap();

    assert_eq!(outcome.message.reactions.len(), 1);
    assert_eq!(
        outcome.message.reactions[0].user_ids,
        vec![alice.user_id, bob.user_id]
    );
}

#[tokio::test]
async fn emptied_entries_disappear_while_others_survive() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;
    let sent = chat
        .send_message(conversation, &alice, "who's in?", None)
        .await
        .unwrap();
    let message_id = sent.message.id;

    chat.toggle_reaction(message_id, alice.user_id, "👍")
        .await
        .unwrap();
    chat.toggle_reaction(message_id, bob.user_id, "🔥")
        .await
        .unwrap();
    let outcome = chat
        .toggle_reaction(message_id, alice.user_id, "👍")
        .await
        .unwrap();

    assert_eq!(outcome.message.reactions.len(), 1);
    assert_eq!(outcome.message.reactions[0].emoji, "🔥");
    assert_eq!(outcome.message.reactions[0].user_ids, vec![bob.user_id]);
}

// ============================================
// Unread ledger
// ============================================

#[tokio::test]
async fn unread_counts_track_unacknowledged_messages() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    for i in 0..3 {
        chat.send_message(conversation, &alice, &format!("ping {i}"), None)
            .await
            .unwrap();
    }

    let view = chat
        .get_conversation(conversation, bob.user_id)
        .await
        .unwrap();
    assert_eq!(view.unread_for(bob.user_id), 3);
    assert_eq!(view.unread_for(alice.user_id), 0);
}

#[tokio::test]
async fn mark_read_zeroes_the_counter_and_stamps_the_time() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    for _ in 0..5 {
        chat.send_message(conversation, &alice, "ping", None)
            .await
            .unwrap();
    }

    let receipt = chat.mark_read(conversation, bob.user_id).await.unwrap();
    assert_eq!(receipt.conversation_id, conversation);
    assert_eq!(receipt.user_id, bob.user_id);

    let view = chat
        .get_conversation(conversation, bob.user_id)
        .await
        .unwrap();
    let member = view.member(bob.user_id).unwrap();
    assert_eq!(member.unread_count, 0);
    assert_eq!(member.last_read_at, Some(receipt.last_read_at));

    // Retrying blindly is safe.
    chat.mark_read(conversation, bob.user_id).await.unwrap();
}

#[tokio::test]
async fn group_send_fans_out_to_everyone_but_the_sender() {
    let chat = facade();
    let creator = dad("creator");
    let members: Vec<MemberProfile> = (0..3).map(|i| dad(&format!("dad{i}"))).collect();
    let group = chat
        .create_group_chat(&creator, "saturday football", Some("⚽"), &members)
        .await
        .unwrap();

    chat.send_message(group.id, &members[0], "who brings the oranges?", None)
        .await
        .unwrap();

    let view = chat
        .get_conversation(group.id, creator.user_id)
        .await
        .unwrap();
    assert_eq!(view.unread_for(members[0].user_id), 0);
    assert_eq!(view.unread_for(members[1].user_id), 1);
    assert_eq!(view.unread_for(members[2].user_id), 1);
    assert_eq!(view.unread_for(creator.user_id), 1);
}

#[tokio::test]
async fn badge_total_excludes_groups_unless_scoped_to_all() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let carol = dad("carol");

    let direct = dm(&chat, &alice, &bob).await;
    let group = chat
        .create_group_chat(&alice, "school run", None, &[bob.clone(), carol.clone()])
        .await
        .unwrap();

    chat.send_message(direct, &alice, "dm ping", None)
        .await
        .unwrap();
    chat.send_message(group.id, &alice, "group ping", None)
        .await
        .unwrap();
    chat.send_message(group.id, &carol, "another", None)
        .await
        .unwrap();

    // Default scope is direct_only.
    assert_eq!(chat.total_unread(bob.user_id, None).await.unwrap(), 1);
    assert_eq!(
        chat.total_unread(bob.user_id, Some(BadgeScope::All))
            .await
            .unwrap(),
        3
    );
}

// ============================================
// Conversation directory summaries
// ============================================

#[tokio::test]
async fn conversation_list_sorts_by_latest_activity() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let carol = dad("carol");

    let with_bob = dm(&chat, &alice, &bob).await;
    let with_carol = dm(&chat, &alice, &carol).await;

    chat.send_message(with_bob, &bob, "first", None)
        .await
        .unwrap();
    chat.send_message(with_carol, &carol, "second", None)
        .await
        .unwrap();

    let list = chat.list_conversations(alice.user_id).await.unwrap();
    assert_eq!(list[0].id, with_carol);
    assert_eq!(list[1].id, with_bob);

    chat.send_message(with_bob, &bob, "third", None)
        .await
        .unwrap();
    let list = chat.list_conversations(alice.user_id).await.unwrap();
    assert_eq!(list[0].id, with_bob);
    assert_eq!(list[0].last_message_preview.as_deref(), Some("third"));
}

#[tokio::test]
async fn conversation_list_is_not_truncated_for_busy_users() {
    let chat = facade();
    let alice = dad("alice");

    for i in 0..120 {
        let other = dad(&format!("dad{i}"));
        dm(&chat, &alice, &other).await;
    }

    let list = chat.list_conversations(alice.user_id).await.unwrap();
    assert_eq!(list.len(), 120);
}

// ============================================
// Idempotent sends
// ============================================

#[tokio::test]
async fn retried_send_with_the_same_key_does_not_duplicate() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    let first = chat
        .send_message(conversation, &alice, "hello", Some("send-1".into()))
        .await
        .unwrap();
    let replay = chat
        .send_message(conversation, &alice, "hello", Some("send-1".into()))
        .await
        .unwrap();

    assert!(!first.deduplicated);
    assert!(replay.deduplicated);
    assert_eq!(first.message.id, replay.message.id);

    let history = chat
        .messages(conversation, bob.user_id, None, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    // The replay did not increment the partner's counter a second time.
    let view = chat
        .get_conversation(conversation, bob.user_id)
        .await
        .unwrap();
    assert_eq!(view.unread_for(bob.user_id), 1);
}

// ============================================
// Validation and access control
// ============================================

#[tokio::test]
async fn validation_failures_surface_before_any_store_write() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    let err = chat
        .send_message(conversation, &alice, "   ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let history = chat
        .messages(conversation, alice.user_id, None, None)
        .await
        .unwrap();
    assert!(history.is_empty());

    assert!(matches!(
        chat.create_group_chat(&alice, "  ", None, &[bob.clone()])
            .await
            .unwrap_err(),
        AppError::Validation(_)
    ));
    assert!(matches!(
        chat.create_group_chat(&alice, "dads fc", None, &[])
            .await
            .unwrap_err(),
        AppError::Validation(_)
    ));
    assert!(matches!(
        chat.create_or_get_dm(&alice, &alice).await.unwrap_err(),
        AppError::Validation(_)
    ));
}

#[tokio::test]
async fn non_members_are_rejected_everywhere() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let outsider = dad("outsider");
    let conversation = dm(&chat, &alice, &bob).await;
    let sent = chat
        .send_message(conversation, &alice, "members only", None)
        .await
        .unwrap();

    assert!(matches!(
        chat.send_message(conversation, &outsider, "let me in", None)
            .await
            .unwrap_err(),
        AppError::Forbidden
    ));
    assert!(matches!(
        chat.messages(conversation, outsider.user_id, None, None)
            .await
            .unwrap_err(),
        AppError::Forbidden
    ));
    assert!(matches!(
        chat.mark_read(conversation, outsider.user_id)
            .await
            .unwrap_err(),
        AppError::Forbidden
    ));
    assert!(matches!(
        chat.toggle_reaction(sent.message.id, outsider.user_id, "👍")
            .await
            .unwrap_err(),
        AppError::Forbidden
    ));
    assert!(matches!(
        chat.subscribe(conversation, outsider.user_id)
            .await
            .unwrap_err(),
        AppError::Forbidden
    ));
}

// ============================================
// Live subscriptions
// ============================================

#[tokio::test]
async fn subscribers_receive_typed_events_for_their_conversation() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    chat.send_message(conversation, &alice, "before subscribe", None)
        .await
        .unwrap();

    let (backlog, mut rx) = chat.subscribe(conversation, bob.user_id).await.unwrap();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].text, "before subscribe");

    let sent = chat
        .send_message(conversation, &alice, "after subscribe", None)
        .await
        .unwrap();
    match rx.recv().await.unwrap() {
        ChatEvent::MessageNew { message } => {
            assert_eq!(message.id, sent.message.id);
            assert_eq!(message.text, "after subscribe");
        }
        other => panic!("expected message.new, got {other:?}"),
    }

    chat.toggle_reaction(sent.message.id, bob.user_id, "👍")
        .await
        .unwrap();
    match rx.recv().await.unwrap() {
        ChatEvent::ReactionUpdated {
            message_id,
            added,
            reactions,
            ..
        } => {
            assert_eq!(message_id, sent.message.id);
            assert!(added);
            assert_eq!(reactions.len(), 1);
        }
        other => panic!("expected reaction.updated, got {other:?}"),
    }

    chat.mark_read(conversation, bob.user_id).await.unwrap();
    match rx.recv().await.unwrap() {
        ChatEvent::ReadMarked { user_id, .. } => assert_eq!(user_id, bob.user_id),
        other => panic!("expected read.marked, got {other:?}"),
    }
}

#[tokio::test]
async fn subscribe_backlog_is_the_newest_history_page() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    for i in 0..55 {
        chat.send_message(conversation, &alice, &format!("m{i}"), None)
            .await
            .unwrap();
    }

    let (backlog, _rx) = chat.subscribe(conversation, bob.user_id).await.unwrap();
    assert_eq!(backlog.len(), 50);
    assert_eq!(backlog.first().unwrap().text, "m5");
    assert_eq!(backlog.last().unwrap().text, "m54");
}

#[tokio::test]
async fn dropping_a_subscription_detaches_it_without_disturbing_others() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let conversation = dm(&chat, &alice, &bob).await;

    let (_, dropped_rx) = chat.subscribe(conversation, bob.user_id).await.unwrap();
    let (_, mut live_rx) = chat.subscribe(conversation, alice.user_id).await.unwrap();
    drop(dropped_rx);

    chat.send_message(conversation, &alice, "still flowing", None)
        .await
        .unwrap();

    match live_rx.recv().await.unwrap() {
        ChatEvent::MessageNew { message } => assert_eq!(message.text, "still flowing"),
        other => panic!("expected message.new, got {other:?}"),
    }
}

#[tokio::test]
async fn events_do_not_leak_across_conversations() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let carol = dad("carol");

    let with_bob = dm(&chat, &alice, &bob).await;
    let with_carol = dm(&chat, &alice, &carol).await;

    let (_, mut bob_rx) = chat.subscribe(with_bob, bob.user_id).await.unwrap();
    chat.send_message(with_carol, &alice, "for carol only", None)
        .await
        .unwrap();

    assert!(bob_rx.try_recv().is_err());
}

// ============================================
// The worked example
// ============================================

#[tokio::test]
async fn direct_chat_walkthrough() {
    let chat = facade();
    let a = dad("a");
    let b = dad("b");
    let c = dm(&chat, &a, &b).await;

    // A sends "hello".
    chat.send_message(c, &a, "hello", None).await.unwrap();
    let view = chat.get_conversation(c, a.user_id).await.unwrap();
    assert_eq!(view.last_message_preview.as_deref(), Some("hello"));
    assert_eq!(view.unread_for(b.user_id), 1);

    // B sends "hi back"; B's own counter is untouched.
    let hi_back = chat.send_message(c, &b, "hi back", None).await.unwrap();
    let view = chat.get_conversation(c, a.user_id).await.unwrap();
    assert_eq!(view.unread_for(a.user_id), 1);
    assert_eq!(view.unread_for(b.user_id), 1);

    // A reacts 👍 to B's message, then un-reacts.
    let reacted = chat
        .toggle_reaction(hi_back.message.id, a.user_id, "👍")
        .await
        .unwrap();
    assert_eq!(reacted.message.reactions.len(), 1);
    assert_eq!(reacted.message.reactions[0].emoji, "👍");
    assert_eq!(reacted.message.reactions[0].user_ids, vec![a.user_id]);

    let unreacted = chat
        .toggle_reaction(hi_back.message.id, a.user_id, "👍")
        .await
        .unwrap();
    assert!(unreacted.message.reactions.is_empty());

    // B marks the conversation read.
    chat.mark_read(c, b.user_id).await.unwrap();
    let view = chat.get_conversation(c, b.user_id).await.unwrap();
    assert_eq!(view.unread_for(b.user_id), 0);
    assert_eq!(view.unread_for(a.user_id), 1);
}

#[tokio::test]
async fn direct_kind_has_exactly_two_members() {
    let chat = facade();
    let alice = dad("alice");
    let bob = dad("bob");
    let (conversation, _) = chat.create_or_get_dm(&alice, &bob).await.unwrap();

    assert_eq!(conversation.kind, ConversationKind::Direct);
    assert_eq!(conversation.members.len(), 2);
}
