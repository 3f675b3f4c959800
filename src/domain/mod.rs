pub mod custom;
pub mod event;

pub use custom::{CustomEventDef, CustomEventTable, CustomEventType};
pub use event::{
    DropReason, EventKind, EventRecord, FIRST_CUSTOM_EVENT_ID, Item, Payload, PayloadShape,
    epoch_seconds, unix_time_now,
};

use uuid::Uuid;

/// Metadata shared by a batch and every sub-batch file cut from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMeta {
    /// Not persisted in queue files; supplied by the running dispatcher.
    pub install_id: Uuid,
    pub user_id: Uuid,
    pub data_session_id: Uuid,
    pub batch_num: i32,
    pub start_time: u32,
    pub end_time: u32,
    pub custom_events_version: u32,
}

impl BatchMeta {
    pub fn new(install_id: Uuid, user_id: Uuid, data_session_id: Uuid) -> Self {
        Self {
            install_id,
            user_id,
            data_session_id,
            batch_num: 0,
            start_time: 0,
            end_time: 0,
            custom_events_version: 0,
        }
    }
}
