use crate::models::OwnerId;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Habits,
    Completions,
    Goals,
    Posts,
    Profiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub table: Table,
    pub kind: ChangeKind,
    pub owner: OwnerId,
    pub record_id: Option<Uuid>,
    pub habit_id: Option<Uuid>,
}

impl Change {
    pub fn new(table: Table, kind: ChangeKind, owner: &OwnerId, record_id: Option<Uuid>) -> Self {
        Self {
            table,
            kind,
            owner: owner.clone(),
            record_id,
            habit_id: None,
        }
    }

    pub fn completion(kind: ChangeKind, owner: &OwnerId, record_id: Uuid, habit_id: Uuid) -> Self {
        Self {
            habit_id: Some(habit_id),
            ..Self::new(Table::Completions, kind, owner, Some(record_id))
        }
    }
}

/// Interest in one table of one owner, optionally narrowed to one habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub owner: OwnerId,
    pub habit_id: Option<Uuid>,
}

impl ChangeFilter {
    pub fn table(table: Table, owner: OwnerId) -> Self {
        Self {
            table,
            owner,
            habit_id: None,
        }
    }

    pub fn habit(mut self, habit_id: Uuid) -> Self {
        self.habit_id = Some(habit_id);
        self
    }

    pub fn matches(&self, change: &Change) -> bool {
        self.table == change.table
            && self.owner == change.owner
            && self
                .habit_id
                .is_none_or(|habit_id| change.habit_id == Some(habit_id))
    }
}

/// Fan-out of row changes to interested subscribers.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, change: Change) {
        debug!(
            table = ?change.table,
            kind = ?change.kind,
            owner = %change.owner,
            "publishing change"
        );
        // No subscribers is fine; the change is simply dropped.
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription {
            filter,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription {
    filter: ChangeFilter,
    receiver: broadcast::Receiver<Change>,
}

impl Subscription {
    /// Waits for the next matching change. Returns `None` once every feed
    /// handle has been dropped.
    pub async fn next(&mut self) -> Option<Change> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, owner = %self.filter.owner, "change subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
