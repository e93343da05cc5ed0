//! Identity and lifecycle record carried by every storable object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a storable object.
///
/// The UUID is generated once when the object is constructed and never
/// changes afterwards. The lifecycle flags are only touched by the
/// collection that owns the object's type, during a write or a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    uuid: Uuid,
    /// Reserved for remote synchronization
    remote_id: Option<String>,
    /// Update sequence number of the stored row
    usn: i64,
    persistent: bool,
    used_in_relation: bool,
    synced: bool,
    last_modified: Option<DateTime<Utc>>,
}

impl Identity {
    /// Create a fresh, unpersisted identity with a new v4 UUID
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            remote_id: None,
            usn: 0,
            persistent: false,
            used_in_relation: false,
            synced: false,
            last_modified: None,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn usn(&self) -> i64 {
        self.usn
    }

    /// True after a successful write (or when read back from the store)
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// True while another persisted object embeds or lists this one
    pub fn is_used_in_relation(&self) -> bool {
        self.used_in_relation
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Restore identity fields from a stored row, bypassing construction.
    pub(crate) fn restore(
        uuid: Uuid,
        remote_id: Option<String>,
        usn: i64,
        last_modified: Option<DateTime<Utc>>,
        used_in_relation: bool,
    ) -> Self {
        Self {
            uuid,
            remote_id,
            usn,
            persistent: true,
            used_in_relation,
            synced: false,
            last_modified,
        }
    }

    pub(crate) fn mark_written(&mut self, usn: i64, at: DateTime<Utc>) {
        self.persistent = true;
        self.usn = usn;
        self.last_modified = Some(at);
    }

    pub(crate) fn mark_removed(&mut self) {
        self.persistent = false;
        self.used_in_relation = false;
        self.usn = 0;
    }

    pub(crate) fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    pub(crate) fn set_used_in_relation(&mut self, used: bool) {
        self.used_in_relation = used;
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}
