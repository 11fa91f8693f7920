//! Direct message repository
//!
//! Two-party conversations. Both participants resolve the same thread key,
//! so either side reads and writes one collection.

use social_core::entities::validate_content;
use social_core::{
    CollectionPath, Direction, DomainError, Fields, Message, OrderKey, Query, ThreadKey, UserId,
};
use tracing::{info, instrument};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use crate::dto::records::{self, MessageRecord};
use crate::sync::{Subscription, ViewEvent, ViewKey, ViewSource};

/// Snapshot type of a thread view, oldest message first
pub type ThreadSnapshot = Vec<Message>;

/// Direct message repository
pub struct DirectMessageRepository<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> DirectMessageRepository<'a> {
    /// Create a new DirectMessageRepository
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Key of the conversation between two users, independent of order
    pub fn thread_key(a: &UserId, b: &UserId) -> ThreadKey {
        ThreadKey::between(a, b)
    }

    /// Append a message to the thread between `sender_id` and `recipient_id`
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_message(
        &self,
        sender_id: &UserId,
        recipient_id: &UserId,
        text: &str,
    ) -> ServiceResult<Message> {
        if sender_id == recipient_id {
            return Err(DomainError::SelfMessage.into());
        }
        validate_content(text, self.ctx.settings().max_message_length)?;

        let thread_key = Self::thread_key(sender_id, recipient_id);
        let record = MessageRecord {
            thread_key: thread_key.clone(),
            sender_id: sender_id.clone(),
            recipient_id: recipient_id.clone(),
            text: text.to_string(),
        };
        let fields = records::to_fields(&record)?;
        let path = self.ctx.paths().thread(&thread_key);

        let message = self
            .ctx
            .write("send_message", self.append_message(&path, fields))
            .await?;

        info!(
            message_id = %message.id,
            thread_key = %thread_key,
            sender_id = %sender_id,
            "Message sent"
        );
        Ok(message)
    }

    async fn append_message(&self, path: &CollectionPath, fields: Fields) -> ServiceResult<Message> {
        let message_id = self.ctx.store().insert(path, fields).await?;
        let doc = self
            .ctx
            .store()
            .get(path, &message_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Message", message_id.to_string()))?;
        Ok(records::message_from_document(&doc)?)
    }

    /// One-shot read of a thread, oldest first
    pub async fn messages(&self, a: &UserId, b: &UserId) -> ServiceResult<ThreadSnapshot> {
        let path = self.ctx.paths().thread(&Self::thread_key(a, b));
        let docs = self.ctx.store().list(&path, &thread_query()).await?;
        Ok(records::messages_from_documents(&docs))
    }

    /// Follow the thread between `a` and `b` live
    pub fn subscribe_thread<F>(&self, a: &UserId, b: &UserId, callback: F) -> ServiceResult<Subscription>
    where
        F: Fn(ViewEvent<ThreadSnapshot>) + Send + 'static,
    {
        let key = Self::thread_key(a, b);
        let source = ViewSource::new(
            self.ctx.paths().thread(&key),
            thread_query(),
            records::messages_from_documents,
        );
        self.ctx
            .coordinator()
            .subscribe(ViewKey::Thread(key), source, callback)
    }
}

fn thread_query() -> Query {
    Query::new()
        .order_by(OrderKey::CreateTime, Direction::Asc)
        .order_by(OrderKey::Id, Direction::Asc)
}
