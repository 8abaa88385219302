use async_trait::async_trait;
use palaver_core::MessagePart;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::{ChatPage, ChatRecord, Cursor, HistoryError, HistoryStore, MessageRecord};

/// Redis-backed history store
///
/// Chats and messages are JSON records; a per-user sorted set indexed
/// by creation time drives newest-first cursor pagination.
pub struct RedisHistory {
    client: redis::Client,
    key_prefix: String,
}

impl RedisHistory {
    /// Create a new Redis-backed store
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis URL is invalid
    pub fn new(url: &str) -> Result<Self, HistoryError> {
        let client = redis::Client::open(url).map_err(|e| HistoryError::Backend(format!("invalid URL: {e}")))?;

        Ok(Self {
            client,
            key_prefix: "palaver:history".to_owned(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, HistoryError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| HistoryError::Backend(format!("connection failed: {e}")))
    }

    fn chat_key(&self, id: Uuid) -> String {
        format!("{}:chat:{id}", self.key_prefix)
    }

    fn messages_key(&self, chat_id: Uuid) -> String {
        format!("{}:chat:{chat_id}:messages", self.key_prefix)
    }

    fn message_index_key(&self, id: Uuid) -> String {
        format!("{}:msg:{id}", self.key_prefix)
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}:user:{user_id}", self.key_prefix)
    }

    /// Creation-time score of a chat, for cursor anchoring
    async fn chat_score(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        user_id: &str,
        id: Uuid,
    ) -> Result<i64, HistoryError> {
        let score: Option<i64> = conn
            .zscore(self.user_key(user_id), id.to_string())
            .await
            .map_err(|e| HistoryError::Backend(format!("ZSCORE failed: {e}")))?;
        score.ok_or(HistoryError::NotFound)
    }

    async fn fetch_chat(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        id: Uuid,
    ) -> Result<Option<ChatRecord>, HistoryError> {
        let raw: Option<String> = conn
            .get(self.chat_key(id))
            .await
            .map_err(|e| HistoryError::Backend(format!("GET failed: {e}")))?;

        raw.map(|data| {
            serde_json::from_str(&data).map_err(|e| HistoryError::Serialization(format!("chat record: {e}")))
        })
        .transpose()
    }
}

#[async_trait]
impl HistoryStore for RedisHistory {
    async fn get_chat(&self, id: Uuid) -> Result<Option<ChatRecord>, HistoryError> {
        let mut conn = self.connection().await?;
        self.fetch_chat(&mut conn, id).await
    }

    async fn create_chat(&self, record: ChatRecord) -> Result<(), HistoryError> {
        let mut conn = self.connection().await?;

        let data = serde_json::to_string(&record)
            .map_err(|e| HistoryError::Serialization(format!("chat record: {e}")))?;

        let _: () = conn
            .set(self.chat_key(record.id), data)
            .await
            .map_err(|e| HistoryError::Backend(format!("SET failed: {e}")))?;

        let _: () = conn
            .zadd(
                self.user_key(&record.user_id),
                record.id.to_string(),
                record.created_at.as_millisecond(),
            )
            .await
            .map_err(|e| HistoryError::Backend(format!("ZADD failed: {e}")))?;

        Ok(())
    }

    async fn update_title(&self, id: Uuid, title: &str) -> Result<(), HistoryError> {
        let mut conn = self.connection().await?;

        let mut record = self.fetch_chat(&mut conn, id).await?.ok_or(HistoryError::NotFound)?;
        title.clone_into(&mut record.title);

        let data = serde_json::to_string(&record)
            .map_err(|e| HistoryError::Serialization(format!("chat record: {e}")))?;

        let _: () = conn
            .set(self.chat_key(id), data)
            .await
            .map_err(|e| HistoryError::Backend(format!("SET failed: {e}")))?;

        Ok(())
    }

    async fn delete_chat(&self, id: Uuid) -> Result<(), HistoryError> {
        let mut conn = self.connection().await?;

        if let Some(record) = self.fetch_chat(&mut conn, id).await? {
            let _: () = conn
                .zrem(self.user_key(&record.user_id), id.to_string())
                .await
                .map_err(|e| HistoryError::Backend(format!("ZREM failed: {e}")))?;
        }

        // Drop per-message index entries before the list itself
        let messages = self.list_messages(id).await?;
        for message in &messages {
            let _: () = conn
                .del(self.message_index_key(message.id))
                .await
                .map_err(|e| HistoryError::Backend(format!("DEL failed: {e}")))?;
        }

        let _: () = conn
            .del(&[self.chat_key(id), self.messages_key(id)])
            .await
            .map_err(|e| HistoryError::Backend(format!("DEL failed: {e}")))?;

        Ok(())
    }

    async fn list_chats(&self, user_id: &str, limit: usize, cursor: Option<Cursor>) -> Result<ChatPage, HistoryError> {
        let mut conn = self.connection().await?;
        let user_key = self.user_key(user_id);

        let (max, min) = match cursor {
            None => ("+inf".to_owned(), "-inf".to_owned()),
            Some(Cursor::After(anchor)) => {
                let score = self.chat_score(&mut conn, user_id, anchor).await?;
                ("+inf".to_owned(), format!("({score}"))
            }
            Some(Cursor::Before(anchor)) => {
                let score = self.chat_score(&mut conn, user_id, anchor).await?;
                (format!("({score}"), "-inf".to_owned())
            }
        };

        let ids: Vec<String> = redis::cmd("ZREVRANGEBYSCORE")
            .arg(&user_key)
            .arg(&max)
            .arg(&min)
            .arg("LIMIT")
            .arg(0)
            .arg(limit + 1)
            .query_async(&mut conn)
            .await
            .map_err(|e| HistoryError::Backend(format!("ZREVRANGEBYSCORE failed: {e}")))?;

        let has_more = ids.len() > limit;
        let mut chats = Vec::with_capacity(ids.len().min(limit));

        for id in ids.into_iter().take(limit) {
            let id = id
                .parse::<Uuid>()
                .map_err(|e| HistoryError::Serialization(format!("chat id: {e}")))?;
            if let Some(record) = self.fetch_chat(&mut conn, id).await? {
                chats.push(record);
            }
        }

        Ok(ChatPage { chats, has_more })
    }

    async fn delete_chats_for_user(&self, user_id: &str) -> Result<u64, HistoryError> {
        let mut conn = self.connection().await?;

        let ids: Vec<String> = conn
            .zrange(self.user_key(user_id), 0, -1)
            .await
            .map_err(|e| HistoryError::Backend(format!("ZRANGE failed: {e}")))?;

        let mut deleted = 0u64;
        for id in ids {
            let id = id
                .parse::<Uuid>()
                .map_err(|e| HistoryError::Serialization(format!("chat id: {e}")))?;
            self.delete_chat(id).await?;
            deleted += 1;
        }

        let _: () = conn
            .del(self.user_key(user_id))
            .await
            .map_err(|e| HistoryError::Backend(format!("DEL failed: {e}")))?;

        Ok(deleted)
    }

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<MessageRecord>, HistoryError> {
        let mut conn = self.connection().await?;

        let raw: Vec<String> = conn
            .lrange(self.messages_key(chat_id), 0, -1)
            .await
            .map_err(|e| HistoryError::Backend(format!("LRANGE failed: {e}")))?;

        raw.into_iter()
            .map(|data| {
                serde_json::from_str(&data).map_err(|e| HistoryError::Serialization(format!("message record: {e}")))
            })
            .collect()
    }

    async fn save_messages(&self, messages: Vec<MessageRecord>) -> Result<(), HistoryError> {
        let mut conn = self.connection().await?;

        for message in messages {
            let data = serde_json::to_string(&message)
                .map_err(|e| HistoryError::Serialization(format!("message record: {e}")))?;

            let _: () = conn
                .rpush(self.messages_key(message.chat_id), data)
                .await
                .map_err(|e| HistoryError::Backend(format!("RPUSH failed: {e}")))?;

            let _: () = conn
                .set(self.message_index_key(message.id), message.chat_id.to_string())
                .await
                .map_err(|e| HistoryError::Backend(format!("SET failed: {e}")))?;
        }

        Ok(())
    }

    async fn update_message(&self, id: Uuid, parts: Vec<MessagePart>) -> Result<(), HistoryError> {
        let mut conn = self.connection().await?;

        let chat_id: Option<String> = conn
            .get(self.message_index_key(id))
            .await
            .map_err(|e| HistoryError::Backend(format!("GET failed: {e}")))?;
        let chat_id = chat_id
            .ok_or(HistoryError::NotFound)?
            .parse::<Uuid>()
            .map_err(|e| HistoryError::Serialization(format!("chat id: {e}")))?;

        let raw: Vec<String> = conn
            .lrange(self.messages_key(chat_id), 0, -1)
            .await
            .map_err(|e| HistoryError::Backend(format!("LRANGE failed: {e}")))?;

        for (index, data) in raw.iter().enumerate() {
            let mut record: MessageRecord = serde_json::from_str(data)
                .map_err(|e| HistoryError::Serialization(format!("message record: {e}")))?;

            if record.id == id {
                record.parts = parts;
                let updated = serde_json::to_string(&record)
                    .map_err(|e| HistoryError::Serialization(format!("message record: {e}")))?;

                let index = isize::try_from(index).map_err(|e| HistoryError::Backend(e.to_string()))?;
                let _: () = conn
                    .lset(self.messages_key(chat_id), index, updated)
                    .await
                    .map_err(|e| HistoryError::Backend(format!("LSET failed: {e}")))?;

                return Ok(());
            }
        }

        Err(HistoryError::NotFound)
    }
}
