//! Comment enrichment worker.
//!
//! Consumes `CommentJob`s and derives the `NotificationJob`s they warrant:
//! 1. Load the comment (and its parent, if any) through the cached fetcher
//! 2. Reply or reaction → one job for the parent author
//! 3. Every distinct mentioned address → one mention job
//! 4. Enqueue everything, only after all fetches succeeded

use std::sync::Arc;

use serde_json::{Map, Value};

use ripple_common::queue::{JobQueue, NOTIFICATIONS_QUEUE, enqueue_all};
use ripple_common::types::{
    COMMENT_TYPE_REACTION, CommentJob, EventMeta, NotificationJob, NotificationKind,
    PushNotification, normalize_address,
};
use ripple_indexer::CommentSource;
use ripple_indexer::models::{CommentData, is_zero_id};

/// Reaction content that reads as "liked" rather than "reacted".
const LIKE_REACTION: &str = "like";

pub struct CommentEnrichmentWorker {
    comments: Arc<dyn CommentSource>,
    jobs: Arc<dyn JobQueue>,
}

impl CommentEnrichmentWorker {
    pub fn new(comments: Arc<dyn CommentSource>, jobs: Arc<dyn JobQueue>) -> Self {
        Self { comments, jobs }
    }

    /// Process one comment job. Returns the number of notification jobs enqueued.
    ///
    /// Derived jobs are pushed as one batch, so a failed enqueue leaves none of
    /// them behind and a redelivered comment job does not duplicate pushes.
    pub async fn on_comment_job(&self, job: &CommentJob) -> anyhow::Result<usize> {
        let comment = self.comments.comment(job.chain_id, &job.comment_id).await?;

        let parent = match parent_id(job, &comment) {
            Some(parent_id) => Some(self.comments.comment(job.chain_id, &parent_id).await?),
            None => None,
        };

        let notifications = derive_jobs(job, &comment, parent.as_ref());

        enqueue_all(self.jobs.as_ref(), NOTIFICATIONS_QUEUE, &notifications).await?;

        tracing::info!(
            comment_id = %job.comment_id,
            chain_id = job.chain_id,
            enqueued = notifications.len(),
            "Comment job processed"
        );

        Ok(notifications.len())
    }
}

/// Parent id from the fetched comment, falling back to the one on the job.
fn parent_id(job: &CommentJob, comment: &CommentData) -> Option<String> {
    comment
        .parent()
        .or(job.parent_id.as_deref())
        .filter(|id| !id.is_empty() && !is_zero_id(id))
        .map(str::to_string)
}

/// Build the notification jobs for a comment. Pure; no I/O.
pub fn derive_jobs(
    job: &CommentJob,
    comment: &CommentData,
    parent: Option<&CommentData>,
) -> Vec<NotificationJob> {
    let replier = comment.author.display_name();
    let actor = normalize_address(&comment.author.address);
    let content = job.content.as_deref().unwrap_or(&comment.content);
    let mut jobs = Vec::new();

    if let Some(parent) = parent {
        let recipient = normalize_address(&parent.author.address);
        let is_reaction =
            job.comment_type.or(comment.comment_type) == Some(COMMENT_TYPE_REACTION);

        let (kind, title, body, reaction_type) = if is_reaction {
            let reaction = content.trim().to_lowercase();
            let verb = if reaction == LIKE_REACTION {
                "liked"
            } else {
                "reacted"
            };
            (
                NotificationKind::Reaction,
                format!("@{} {}", replier, verb),
                format!("\"{}\"", parent.content),
                Some(reaction),
            )
        } else {
            (
                NotificationKind::Reply,
                format!("@{} replied", replier),
                content.to_string(),
                None,
            )
        };

        let group_key = reaction_type
            .as_ref()
            .map(|reaction| format!("reaction:{}:{}:{}", job.chain_id, parent.id, reaction));

        jobs.push(NotificationJob {
            author: recipient.clone(),
            notification: PushNotification {
                title,
                body,
                data: Some(data(kind, job.chain_id, comment, &actor, Some(parent))),
                ..Default::default()
            },
            target_user_ids: None,
            event: Some(EventMeta {
                kind,
                origin_address: actor.clone(),
                chain_id: job.chain_id,
                subject_comment_id: comment.id.clone(),
                target_comment_id: Some(parent.id.clone()),
                parent_comment_id: Some(parent.id.clone()),
                reaction_type,
                group_key,
            }),
        });
    }

    for mentioned in comment.mentioned_addresses() {
        jobs.push(NotificationJob {
            author: mentioned,
            notification: PushNotification {
                title: format!("@{} mentioned you", replier),
                body: content.to_string(),
                data: Some(data(
                    NotificationKind::Mention,
                    job.chain_id,
                    comment,
                    &actor,
                    parent,
                )),
                ..Default::default()
            },
            target_user_ids: None,
            event: Some(EventMeta {
                kind: NotificationKind::Mention,
                origin_address: actor.clone(),
                chain_id: job.chain_id,
                subject_comment_id: comment.id.clone(),
                target_comment_id: Some(comment.id.clone()),
                parent_comment_id: parent.map(|p| p.id.clone()),
                reaction_type: None,
                group_key: None,
            }),
        });
    }

    jobs
}

fn data(
    kind: NotificationKind,
    chain_id: i64,
    comment: &CommentData,
    actor: &str,
    parent: Option<&CommentData>,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("type".to_string(), Value::String(kind.to_string()));
    data.insert("commentId".to_string(), Value::String(comment.id.clone()));
    data.insert("chainId".to_string(), Value::from(chain_id));
    data.insert("actorAddress".to_string(), Value::String(actor.to_string()));
    if let Some(parent) = parent {
        data.insert("parentId".to_string(), Value::String(parent.id.clone()));
        data.insert(
            "parentAddress".to_string(),
            Value::String(normalize_address(&parent.author.address)),
        );
    }
    data
}
