use async_trait::async_trait;
use dashmap::DashMap;
use palaver_core::MessagePart;
use uuid::Uuid;

use crate::{ChatPage, ChatRecord, Cursor, HistoryError, HistoryStore, MessageRecord};

/// In-memory history store (single instance only)
///
/// Default backend; also the backend every test suite runs against.
#[derive(Default)]
pub struct MemoryHistory {
    chats: DashMap<Uuid, ChatRecord>,
    messages: DashMap<Uuid, Vec<MessageRecord>>,
    message_chats: DashMap<Uuid, Uuid>,
}

impl MemoryHistory {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All of a user's chats, newest first
    fn user_chats(&self, user_id: &str) -> Vec<ChatRecord> {
        let mut chats: Vec<ChatRecord> = self
            .chats
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();

        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        chats
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn get_chat(&self, id: Uuid) -> Result<Option<ChatRecord>, HistoryError> {
        Ok(self.chats.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create_chat(&self, record: ChatRecord) -> Result<(), HistoryError> {
        self.chats.insert(record.id, record);
        Ok(())
    }

    async fn update_title(&self, id: Uuid, title: &str) -> Result<(), HistoryError> {
        let mut entry = self.chats.get_mut(&id).ok_or(HistoryError::NotFound)?;
        title.clone_into(&mut entry.value_mut().title);
        Ok(())
    }

    async fn delete_chat(&self, id: Uuid) -> Result<(), HistoryError> {
        self.chats.remove(&id);
        if let Some((_, messages)) = self.messages.remove(&id) {
            for message in messages {
                self.message_chats.remove(&message.id);
            }
        }
        Ok(())
    }

    async fn list_chats(&self, user_id: &str, limit: usize, cursor: Option<Cursor>) -> Result<ChatPage, HistoryError> {
        let all = self.user_chats(user_id);

        let filtered: Vec<ChatRecord> = match cursor {
            None => all,
            Some(Cursor::After(anchor_id)) => {
                let anchor = self
                    .chats
                    .get(&anchor_id)
                    .ok_or(HistoryError::NotFound)?
                    .created_at;
                all.into_iter().filter(|chat| chat.created_at > anchor).collect()
            }
            Some(Cursor::Before(anchor_id)) => {
                let anchor = self
                    .chats
                    .get(&anchor_id)
                    .ok_or(HistoryError::NotFound)?
                    .created_at;
                all.into_iter().filter(|chat| chat.created_at < anchor).collect()
            }
        };

        let has_more = filtered.len() > limit;
        let chats = filtered.into_iter().take(limit).collect();

        Ok(ChatPage { chats, has_more })
    }

    async fn delete_chats_for_user(&self, user_id: &str) -> Result<u64, HistoryError> {
        let ids: Vec<Uuid> = self
            .chats
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| *entry.key())
            .collect();

        let count = ids.len() as u64;
        for id in ids {
            self.delete_chat(id).await?;
        }
        Ok(count)
    }

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<MessageRecord>, HistoryError> {
        Ok(self
            .messages
            .get(&chat_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save_messages(&self, messages: Vec<MessageRecord>) -> Result<(), HistoryError> {
        for message in messages {
            self.message_chats.insert(message.id, message.chat_id);
            self.messages.entry(message.chat_id).or_default().push(message);
        }
        Ok(())
    }

    async fn update_message(&self, id: Uuid, parts: Vec<MessagePart>) -> Result<(), HistoryError> {
        let chat_id = *self.message_chats.get(&id).ok_or(HistoryError::NotFound)?;
        let mut entry = self.messages.get_mut(&chat_id).ok_or(HistoryError::NotFound)?;

        let message = entry
            .value_mut()
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or(HistoryError::NotFound)?;

        message.parts = parts;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Visibility;
    use jiff::Timestamp;
    use palaver_core::Role;

    fn chat(user: &str, seconds: i64) -> ChatRecord {
        ChatRecord {
            id: Uuid::new_v4(),
            user_id: user.to_owned(),
            title: "New chat".to_owned(),
            visibility: Visibility::Private,
            created_at: Timestamp::from_second(seconds).unwrap(),
        }
    }

    fn message(chat_id: Uuid, text: &str) -> MessageRecord {
        MessageRecord {
            id: Uuid::new_v4(),
            chat_id,
            role: Role::User,
            parts: vec![MessagePart::Text { text: text.to_owned() }],
            created_at: Timestamp::from_second(1_700_000_000).unwrap(),
            moderation: false,
        }
    }

    #[tokio::test]
    async fn listing_is_newest_first_with_has_more() {
        let store = MemoryHistory::new();
        for seconds in 0..5 {
            store.create_chat(chat("usr_1", 1000 + seconds)).await.unwrap();
        }
        store.create_chat(chat("usr_2", 9999)).await.unwrap();

        let page = store.list_chats("usr_1", 3, None).await.unwrap();
        assert_eq!(page.chats.len(), 3);
        assert!(page.has_more);
        assert!(page.chats[0].created_at > page.chats[2].created_at);

        let page = store.list_chats("usr_1", 10, None).await.unwrap();
        assert_eq!(page.chats.len(), 5);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn cursor_pagination_walks_older_pages() {
        let store = MemoryHistory::new();
        for seconds in 0..4 {
            store.create_chat(chat("usr_1", 1000 + seconds)).await.unwrap();
        }

        let first = store.list_chats("usr_1", 2, None).await.unwrap();
        let anchor = first.chats.last().unwrap().id;

        let second = store
            .list_chats("usr_1", 2, Some(Cursor::Before(anchor)))
            .await
            .unwrap();
        assert_eq!(second.chats.len(), 2);
        assert!(!second.has_more);
        assert!(second.chats[0].created_at < first.chats[1].created_at);

        let newer = store
            .list_chats("usr_1", 10, Some(Cursor::After(anchor)))
            .await
            .unwrap();
        assert_eq!(newer.chats.len(), 1);
        assert_eq!(newer.chats[0].id, first.chats[0].id);
    }

    #[tokio::test]
    async fn unknown_cursor_is_not_found() {
        let store = MemoryHistory::new();
        let result = store.list_chats("usr_1", 2, Some(Cursor::After(Uuid::new_v4()))).await;
        assert!(matches!(result, Err(HistoryError::NotFound)));
    }

    #[tokio::test]
    async fn update_message_replaces_parts() {
        let store = MemoryHistory::new();
        let record = chat("usr_1", 1000);
        let chat_id = record.id;
        store.create_chat(record).await.unwrap();

        let msg = message(chat_id, "original");
        let msg_id = msg.id;
        store.save_messages(vec![msg]).await.unwrap();

        store
            .update_message(msg_id, vec![MessagePart::Text { text: "edited".to_owned() }])
            .await
            .unwrap();

        let messages = store.list_messages(chat_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].parts, vec![MessagePart::Text { text: "edited".to_owned() }]);

        let missing = store.update_message(Uuid::new_v4(), vec![]).await;
        assert!(matches!(missing, Err(HistoryError::NotFound)));
    }

    #[tokio::test]
    async fn delete_all_for_user_leaves_other_users() {
        let store = MemoryHistory::new();
        store.create_chat(chat("usr_1", 1)).await.unwrap();
        store.create_chat(chat("usr_1", 2)).await.unwrap();
        store.create_chat(chat("usr_2", 3)).await.unwrap();

        let deleted = store.delete_chats_for_user("usr_1").await.unwrap();
        assert_eq!(deleted, 2);

        assert!(store.list_chats("usr_1", 10, None).await.unwrap().chats.is_empty());
        assert_eq!(store.list_chats("usr_2", 10, None).await.unwrap().chats.len(), 1);
    }
}
