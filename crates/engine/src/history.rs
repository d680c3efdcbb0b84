//! Notification history read path.
//!
//! A page is one raw window of stored events. Reactions sharing a group key
//! collapse into a single item placed at the group's earliest position in the
//! window; everything else keeps its slot. The cursor always advances by the
//! raw window, however many items grouping leaves behind.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use ripple_common::error::AppError;
use ripple_common::types::{NotificationEvent, NotificationKind, normalize_address};
use ripple_indexer::models::Author;

use crate::events::EventStore;
use crate::profiles::ProfileLookup;

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 200;

/// Other actors attached to a group for avatar stacks.
const MAX_OTHER_ACTORS: usize = 10;

/// Actor addresses recorded in a group's `data.actorAddresses`.
const MAX_ACTOR_ADDRESSES: usize = 6;

/// One entry of a history page: a stored event, or a reaction group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub chain_id: i64,
    pub subject_comment_id: String,
    pub target_comment_id: Option<String>,
    pub parent_comment_id: Option<String>,
    pub reaction_type: Option<String>,
    pub group_key: Option<String>,
    pub badge: Option<i32>,
    pub sound: Option<String>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub actor: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_author: Option<Author>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other_actors: Vec<Author>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    pub events: Vec<HistoryItem>,
    pub next_cursor: Option<Uuid>,
}

pub struct HistoryAggregator {
    events: Arc<dyn EventStore>,
    profiles: Arc<ProfileLookup>,
}

impl HistoryAggregator {
    pub fn new(events: Arc<dyn EventStore>, profiles: Arc<ProfileLookup>) -> Self {
        Self { events, profiles }
    }

    /// One page of `user_id`'s history, newest first.
    ///
    /// `limit` defaults to 50 and must be within 1..=200. `cursor` is the id of
    /// the last raw event of the previous page.
    pub async fn get_events(
        &self,
        user_id: &str,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<EventsPage, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        let cursor = cursor
            .filter(|c| !c.is_empty())
            .map(|c| {
                Uuid::parse_str(c).map_err(|_| AppError::Validation(format!("Invalid cursor: {}", c)))
            })
            .transpose()?;

        let mut window = self
            .events
            .page(user_id, i64::from(limit) + 1, cursor)
            .await?;

        let has_more = window.len() > limit as usize;
        window.truncate(limit as usize);
        let next_cursor = if has_more {
            window.last().map(|e| e.id)
        } else {
            None
        };

        let addresses: Vec<String> = window
            .iter()
            .flat_map(|e| {
                std::iter::once(e.origin_address.clone())
                    .chain(e.parent_address().map(str::to_string))
            })
            .collect();
        let profiles = self.profiles.lookup(&addresses).await;

        Ok(EventsPage {
            events: group_events(&window, &profiles),
            next_cursor,
        })
    }
}

enum Slot<'a> {
    Single(&'a NotificationEvent),
    Group(Vec<&'a NotificationEvent>),
}

/// Collapse reactions sharing a group key, keeping window order.
///
/// Each group lands at the index of its first member; every other event keeps
/// its own index.
pub fn group_events(
    events: &[NotificationEvent],
    profiles: &HashMap<String, Author>,
) -> Vec<HistoryItem> {
    let mut slots: Vec<(usize, Slot<'_>)> = Vec::new();
    let mut group_slot: HashMap<&str, usize> = HashMap::new();

    for (index, event) in events.iter().enumerate() {
        match (event.kind, event.group_key.as_deref()) {
            (NotificationKind::Reaction, Some(key)) => match group_slot.get(key) {
                Some(&slot) => {
                    if let Slot::Group(members) = &mut slots[slot].1 {
                        members.push(event);
                    }
                }
                None => {
                    group_slot.insert(key, slots.len());
                    slots.push((index, Slot::Group(vec![event])));
                }
            },
            _ => slots.push((index, Slot::Single(event))),
        }
    }

    slots.sort_by_key(|(index, _)| *index);

    slots
        .into_iter()
        .map(|(_, slot)| match slot {
            Slot::Single(event) => single_item(event, profiles),
            Slot::Group(members) => group_item(&members, profiles),
        })
        .collect()
}

fn profile(profiles: &HashMap<String, Author>, address: &str) -> Author {
    let address = normalize_address(address);
    profiles
        .get(&address)
        .cloned()
        .unwrap_or_else(|| Author::bare(&address))
}

fn single_item(event: &NotificationEvent, profiles: &HashMap<String, Author>) -> HistoryItem {
    HistoryItem {
        id: event.id,
        kind: event.kind,
        title: event.title.clone(),
        body: event.body.clone(),
        chain_id: event.chain_id,
        subject_comment_id: event.subject_comment_id.clone(),
        target_comment_id: event.target_comment_id.clone(),
        parent_comment_id: event.parent_comment_id.clone(),
        reaction_type: event.reaction_type.clone(),
        group_key: event.group_key.clone(),
        badge: event.badge,
        sound: event.sound.clone(),
        data: event.data.clone(),
        created_at: event.created_at,
        actor: profile(profiles, &event.origin_address),
        parent_author: event.parent_address().map(|a| profile(profiles, a)),
        other_actors: Vec::new(),
    }
}

fn group_item(members: &[&NotificationEvent], profiles: &HashMap<String, Author>) -> HistoryItem {
    let template = members[0];

    let mut actors: Vec<String> = Vec::new();
    for member in members {
        let address = normalize_address(&member.origin_address);
        if !actors.contains(&address) {
            actors.push(address);
        }
    }

    let primary = profile(profiles, &actors[0]);
    let verb = if template.reaction_type.as_deref() == Some("like") {
        "liked"
    } else {
        "reacted to"
    };
    let title = match actors.len() - 1 {
        0 => format!("{} {} your post", primary.display_name(), verb),
        1 => format!("{} and 1 other {} your post", primary.display_name(), verb),
        others => format!(
            "{} and {} others {} your post",
            primary.display_name(),
            others,
            verb
        ),
    };

    let mut data = match &template.data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    data.insert(
        "actorAddresses".to_string(),
        Value::Array(
            actors
                .iter()
                .take(MAX_ACTOR_ADDRESSES)
                .map(|a| Value::String(a.clone()))
                .collect(),
        ),
    );
    data.insert("actorCount".to_string(), Value::from(actors.len()));

    let mut item = single_item(template, profiles);
    item.title = title;
    item.actor = primary;
    item.data = Value::Object(data);
    item.other_actors = actors
        .iter()
        .skip(1)
        .take(MAX_OTHER_ACTORS)
        .map(|a| profile(profiles, a))
        .collect();
    item
}
