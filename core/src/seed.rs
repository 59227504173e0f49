use chrono::{Duration, TimeZone, Utc};

use crate::error::CoreError;
use crate::models::MediaDescriptor;
use crate::store::MessageStore;

/// Fills the store with deterministic demo chats, all in one transaction.
/// Chat `i` gets JID `1555000000{i}@s.whatsapp.net`; every fifth message
/// carries an image instead of text.
pub fn seed_demo(store: &MessageStore, chats: i64, messages_per_chat: i64) -> Result<(), CoreError> {
    store.conn.execute_batch("BEGIN;")?;
    let result = (|| -> Result<(), CoreError> {
        let base = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_default();
        for chat_idx in 0..chats {
            let jid = format!("1555000000{}@s.whatsapp.net", chat_idx);
            let chat_base = base + Duration::hours(chat_idx);
            let last = chat_base + Duration::minutes(messages_per_chat.saturating_sub(1));
            store.store_chat(&jid, &format!("Demo contact {}", chat_idx + 1), last)?;

            for idx in 0..messages_per_chat {
                let id = format!("DEMO{}M{}", chat_idx, idx + 1);
                let ts = chat_base + Duration::minutes(idx);
                let from_me = idx % 2 == 0;
                let sender = if from_me { "me" } else { jid.as_str() };
                if (idx + 1) % 5 == 0 {
                    let media = MediaDescriptor {
                        media_type: "image".to_string(),
                        filename: format!("demo_{}.jpg", idx + 1),
                        file_length: 1024,
                        ..Default::default()
                    };
                    store.store_message(&id, &jid, sender, "", ts, from_me, Some(&media))?;
                } else {
                    let body = if from_me {
                        format!("Demo message {}", idx + 1)
                    } else {
                        format!("Reply {}", idx + 1)
                    };
                    store.store_message(&id, &jid, sender, &body, ts, from_me, None)?;
                }
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            store.conn.execute_batch("COMMIT;")?;
            Ok(())
        }
        Err(err) => {
            let _ = store.conn.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}
