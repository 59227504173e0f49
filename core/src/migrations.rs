pub const MESSAGE_MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS chats (
      jid TEXT PRIMARY KEY,
      name TEXT,
      last_message_time TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS messages (
      id TEXT,
      chat_jid TEXT,
      sender TEXT,
      content TEXT,
      timestamp TIMESTAMP,
      is_from_me BOOLEAN,
      media_type TEXT,
      filename TEXT,
      url TEXT,
      media_key BLOB,
      file_sha256 BLOB,
      file_enc_sha256 BLOB,
      file_length INTEGER,
      PRIMARY KEY (id, chat_jid),
      FOREIGN KEY (chat_jid) REFERENCES chats(jid)
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
      ON messages(chat_jid, timestamp DESC);
    CREATE INDEX IF NOT EXISTS idx_chats_last_message_time
      ON chats(last_message_time DESC);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contact_nicknames (
      jid TEXT PRIMARY KEY,
      nickname TEXT NOT NULL,
      updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_sender_ts
      ON messages(sender, timestamp DESC);
    "#,
];

pub const SESSION_MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS devices (
      registration_id INTEGER PRIMARY KEY,
      jid TEXT UNIQUE,
      noise_key BLOB NOT NULL,
      identity_key BLOB NOT NULL,
      created_at INTEGER NOT NULL
    );
    "#];
