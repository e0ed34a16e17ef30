//! Data models for harvested board content.

mod item;
mod record;
mod status;

pub use item::{id_from_url, DateRange, ListItem, MeetingInfo};
pub use record::{EnrichedRecord, OutputRecord, RecordCells, PREVIEW_CHARS};
pub use status::{SiteReport, SiteStatus, StopReason};
