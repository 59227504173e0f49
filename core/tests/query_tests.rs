mod common;

use common::{memory_store, ts};
use wa_bridge_core::models::{ChatSort, MediaDescriptor, MessageFilter};
use wa_bridge_core::query::{
    contact_chats, get_chat, get_nickname, last_interaction, list_chats, list_messages,
    list_nicknames, media_info, message_context, remove_nickname, search_messages, set_nickname,
    store_stats,
};
use wa_bridge_core::{CoreError, MessageStore};

const ALICE: &str = "15550001111@s.whatsapp.net";
const BOB: &str = "15550002222@s.whatsapp.net";
const GROUP: &str = "120363025246125888@g.us";

fn seed(store: &MessageStore) {
    store.store_chat(ALICE, "Alice", ts(30)).unwrap();
    store.store_chat(BOB, "Bob", ts(50)).unwrap();
    store.store_chat(GROUP, "Weekend plans", ts(10)).unwrap();

    store.store_message("A1", ALICE, ALICE, "hello there", ts(10), false, None).unwrap();
    store.store_message("A2", ALICE, "me", "lunch tomorrow?", ts(20), true, None).unwrap();
    store.store_message("A3", ALICE, ALICE, "Sure, LUNCH works", ts(30), false, None).unwrap();
    store.store_message("B1", BOB, BOB, "100% agree", ts(50), false, None).unwrap();
    store.store_message("G1", GROUP, ALICE, "lunch at noon", ts(10), false, None).unwrap();

    let media = MediaDescriptor {
        media_type: "document".to_string(),
        filename: "menu.pdf".to_string(),
        url: "https://mmg.example.net/menu.enc".to_string(),
        media_key: vec![9; 32],
        file_sha256: vec![3; 32],
        file_enc_sha256: vec![4; 32],
        file_length: 4096,
    };
    store.store_message("B2", BOB, BOB, "", ts(40), false, Some(&media)).unwrap();
}

#[test]
fn get_chat_includes_latest_message() {
    let store = memory_store();
    seed(&store);
    let chat = get_chat(&store.conn, ALICE).expect("query").expect("chat");
    assert_eq!(chat.name.as_deref(), Some("Alice"));
    assert_eq!(chat.last_message.as_deref(), Some("Sure, LUNCH works"));
    assert_eq!(chat.last_is_from_me, Some(false));
    assert!(!chat.is_group());

    assert!(get_chat(&store.conn, "nobody@s.whatsapp.net").expect("query").is_none());
}

#[test]
fn list_chats_filters_and_sorts() {
    let store = memory_store();
    seed(&store);

    let by_activity = list_chats(&store.conn, None, 10, 0, ChatSort::LastActive).expect("list");
    let jids: Vec<_> = by_activity.iter().map(|c| c.jid.as_str()).collect();
    assert_eq!(jids, vec![BOB, ALICE, GROUP]);

    let by_name = list_chats(&store.conn, None, 10, 0, ChatSort::Name).expect("list");
    assert_eq!(by_name[0].name.as_deref(), Some("Alice"));
    assert_eq!(by_name[2].name.as_deref(), Some("Weekend plans"));

    let filtered = list_chats(&store.conn, Some("WEEKEND"), 10, 0, ChatSort::LastActive).expect("filter");
    assert_eq!(filtered.len(), 1);
    assert!(filtered[0].is_group());

    let by_jid = list_chats(&store.conn, Some("0002222"), 10, 0, ChatSort::LastActive).expect("jid");
    assert_eq!(by_jid.len(), 1);
    assert_eq!(by_jid[0].jid, BOB);

    let paged = list_chats(&store.conn, None, 1, 1, ChatSort::LastActive).expect("page");
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].jid, ALICE);
}

#[test]
fn search_is_case_insensitive_and_scoped() {
    let store = memory_store();
    seed(&store);

    let hits = search_messages(&store.conn, "lunch", None, 10, 0).expect("search");
    let ids: Vec<_> = hits.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["A3", "A2", "G1"]);

    let scoped = search_messages(&store.conn, "lunch", Some(GROUP), 10, 0).expect("scoped");
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, "G1");

    let literal = search_messages(&store.conn, "100%", None, 10, 0).expect("literal");
    assert_eq!(literal.len(), 1);
    let wildcard_only = search_messages(&store.conn, "%", None, 10, 0).expect("percent");
    assert_eq!(wildcard_only.len(), 1);

    let err = search_messages(&store.conn, "  ", None, 10, 0).expect_err("empty");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
}

#[test]
fn message_context_returns_neighbours_in_order() {
    let store = memory_store();
    seed(&store);

    let context = message_context(&store.conn, "A2", ALICE, 1, 1).expect("context");
    let ids: Vec<_> = context.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["A1", "A2", "A3"]);

    let edge = message_context(&store.conn, "A1", ALICE, 5, 0).expect("edge");
    assert_eq!(edge.len(), 1);

    let err = message_context(&store.conn, "A1", BOB, 1, 1).expect_err("wrong chat");
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn media_info_returns_full_descriptor() {
    let store = memory_store();
    seed(&store);

    let media = media_info(&store.conn, "B2", BOB).expect("query").expect("media");
    assert_eq!(media.descriptor.filename, "menu.pdf");
    assert_eq!(media.descriptor.media_key, vec![9; 32]);
    assert_eq!(media.descriptor.file_length, 4096);
    assert_eq!(media.timestamp, ts(40));

    assert!(media_info(&store.conn, "B1", BOB).expect("query").is_none());
}

#[test]
fn listing_projection_omits_media_secrets() {
    let store = memory_store();
    seed(&store);
    let messages = store.get_messages(BOB, 10).expect("messages");
    let json = serde_json::to_value(&messages).expect("json");
    let first = json[1].as_object().expect("object");
    assert_eq!(first["id"], "B2");
    assert!(!first.contains_key("media_key"));
    assert!(!first.contains_key("url"));
    assert!(!first.contains_key("file_sha256"));
}

#[test]
fn stats_count_rows() {
    let store = memory_store();
    seed(&store);
    let stats = store_stats(&store.conn).expect("stats");
    assert_eq!(stats.chats, 3);
    assert_eq!(stats.messages, 6);
    assert_eq!(stats.media_messages, 1);
}

fn ids(rows: &[wa_bridge_core::models::MessageRow]) -> Vec<&str> {
    rows.iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn list_messages_applies_every_filter() {
    let store = memory_store();
    seed(&store);

    let by_sender = list_messages(
        &store.conn,
        &MessageFilter {
            sender: Some(ALICE.to_string()),
            ..Default::default()
        },
    )
    .expect("sender");
    assert_eq!(ids(&by_sender), vec!["A3", "G1", "A1"]);

    let by_phone = list_messages(
        &store.conn,
        &MessageFilter {
            sender: Some("+1 555 000 1111".to_string()),
            ..Default::default()
        },
    )
    .expect("phone");
    assert_eq!(ids(&by_phone), ids(&by_sender));

    let window = list_messages(
        &store.conn,
        &MessageFilter {
            after: Some(ts(10)),
            before: Some(ts(50)),
            ..Default::default()
        },
    )
    .expect("window");
    assert_eq!(ids(&window), vec!["B2", "A3", "A2"]);

    let scoped = list_messages(
        &store.conn,
        &MessageFilter {
            chat_jid: Some(ALICE.to_string()),
            query: Some("lunch".to_string()),
            ..Default::default()
        },
    )
    .expect("scoped");
    assert_eq!(ids(&scoped), vec!["A3", "A2"]);
}

#[test]
fn list_messages_pages_in_units_of_limit() {
    let store = memory_store();
    seed(&store);

    let all = list_messages(&store.conn, &MessageFilter::default()).expect("all");
    assert_eq!(ids(&all), vec!["B1", "B2", "A3", "A2", "G1", "A1"]);

    let second = list_messages(
        &store.conn,
        &MessageFilter {
            limit: 2,
            page: 1,
            ..Default::default()
        },
    )
    .expect("page");
    assert_eq!(ids(&second), vec!["A3", "A2"]);

    let err = list_messages(
        &store.conn,
        &MessageFilter {
            page: -1,
            ..Default::default()
        },
    )
    .expect_err("negative page");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
}

#[test]
fn contact_chats_include_groups_the_contact_posted_in() {
    let store = memory_store();
    seed(&store);

    let chats = contact_chats(&store.conn, ALICE, 10, 0).expect("chats");
    let jids: Vec<_> = chats.iter().map(|c| c.jid.as_str()).collect();
    assert_eq!(jids, vec![ALICE, GROUP]);

    let second = contact_chats(&store.conn, ALICE, 1, 1).expect("page");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].jid, GROUP);

    assert!(contact_chats(&store.conn, "nobody@s.whatsapp.net", 10, 0)
        .expect("none")
        .is_empty());
}

#[test]
fn last_interaction_is_newest_message_involving_contact() {
    let store = memory_store();
    seed(&store);

    let last = last_interaction(&store.conn, ALICE).expect("query").expect("message");
    assert_eq!(last.id, "A3");
    let last = last_interaction(&store.conn, BOB).expect("query").expect("message");
    assert_eq!(last.id, "B1");
    assert!(last_interaction(&store.conn, "nobody@s.whatsapp.net")
        .expect("query")
        .is_none());
}

#[test]
fn nicknames_upsert_list_and_remove() {
    let store = memory_store();
    set_nickname(&store.conn, ALICE, "Ally").expect("set");
    set_nickname(&store.conn, BOB, "bobby").expect("set");
    let updated = set_nickname(&store.conn, ALICE, "  Al ").expect("overwrite");
    assert_eq!(updated.nickname, "Al");

    assert_eq!(get_nickname(&store.conn, ALICE).expect("get").as_deref(), Some("Al"));
    let listed = list_nicknames(&store.conn).expect("list");
    let names: Vec<_> = listed.iter().map(|n| n.nickname.as_str()).collect();
    assert_eq!(names, vec!["Al", "bobby"]);
    assert_eq!(listed[0], updated);

    assert!(remove_nickname(&store.conn, BOB).expect("remove"));
    assert!(!remove_nickname(&store.conn, BOB).expect("remove again"));
    assert!(get_nickname(&store.conn, BOB).expect("get").is_none());

    let err = set_nickname(&store.conn, BOB, "   ").expect_err("empty");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
}

#[test]
fn negative_limits_and_offsets_are_rejected() {
    let store = memory_store();
    seed(&store);

    let err = list_chats(&store.conn, None, -1, 0, ChatSort::LastActive).expect_err("limit");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
    let err = list_chats(&store.conn, None, 10, -1, ChatSort::LastActive).expect_err("offset");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
    let err = search_messages(&store.conn, "lunch", None, -1, 0).expect_err("limit");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
    let err = message_context(&store.conn, "A2", ALICE, -1, 1).expect_err("before");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
    let err = contact_chats(&store.conn, ALICE, -1, 0).expect_err("limit");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
}
