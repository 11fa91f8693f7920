//! Stored document bodies and their conversion to domain entities
//!
//! Store metadata (id, creation time) lives on the [`Document`], not in the
//! body. Documents that fail to decode are skipped by the snapshot
//! projections with a warning, so one malformed record cannot blank a view.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use social_core::{Document, Fields, FollowEdge, Message, Post, StoreResult, ThreadKey, UserId};
use std::collections::BTreeSet;

/// Field holding the set of users who liked a post
pub const LIKED_BY: &str = "liked_by";

/// Body of a post document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub author_id: UserId,
    pub text: String,
    #[serde(default)]
    pub liked_by: Vec<UserId>,
}

/// Body of a follow edge document; the document id is the followee id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRecord {
    pub follower_id: UserId,
    pub followee_id: UserId,
}

/// Body of a direct message document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub thread_key: ThreadKey,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub text: String,
}

/// Serialize a record into a document body
pub fn to_fields<T: Serialize>(record: &T) -> StoreResult<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(serde_json::Error::custom("record must serialize to an object").into()),
    }
}

// ============================================================================
// Document -> entity
// ============================================================================

pub fn post_from_document(doc: &Document) -> StoreResult<Post> {
    let record: PostRecord = doc.decode()?;
    Ok(Post {
        id: doc.id.clone(),
        author_id: record.author_id,
        text: record.text,
        created_at: doc.create_time,
        liked_by: record.liked_by.into_iter().collect(),
    })
}

pub fn follow_from_document(doc: &Document) -> StoreResult<FollowEdge> {
    let record: FollowRecord = doc.decode()?;
    Ok(FollowEdge {
        follower_id: record.follower_id,
        followee_id: record.followee_id,
        created_at: doc.create_time,
    })
}

pub fn message_from_document(doc: &Document) -> StoreResult<Message> {
    let record: MessageRecord = doc.decode()?;
    Ok(Message {
        id: doc.id.clone(),
        thread_key: record.thread_key,
        sender_id: record.sender_id,
        recipient_id: record.recipient_id,
        text: record.text,
        sent_at: doc.create_time,
    })
}

// ============================================================================
// Snapshot projections
// ============================================================================

/// All decodable posts, newest first
pub fn posts_from_documents(docs: &[Document]) -> Vec<Post> {
    let mut posts: Vec<Post> = decode_all(docs, post_from_document);
    posts.sort_by(Post::feed_order);
    posts
}

/// Followee ids of all decodable follow edges
pub fn followees_from_documents(docs: &[Document]) -> BTreeSet<UserId> {
    decode_all(docs, follow_from_document)
        .into_iter()
        .map(|edge| edge.followee_id)
        .collect()
}

/// All decodable messages, oldest first
pub fn messages_from_documents(docs: &[Document]) -> Vec<Message> {
    let mut messages: Vec<Message> = decode_all(docs, message_from_document);
    messages.sort_by(Message::thread_order);
    messages
}

fn decode_all<T>(docs: &[Document], decode: fn(&Document) -> StoreResult<T>) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(document_id = %doc.id, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}
