//! Parish Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no business logic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod entities;
pub mod error;

pub use entities::{ContentChannel, DefinedValue, FinancialBatch, GroupType};
pub use error::{BatchError, CacheError, ParishError, ParishResult, StorageError};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Integer primary key for all persisted entities.
/// Matches the backing store's identity column.
pub type EntityId = i64;

/// Stable external identifier. Assigned once at row creation and never
/// changed afterwards; random (v4) rather than timestamp-sortable because
/// guids are published to external systems.
pub type EntityGuid = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new random EntityGuid.
pub fn new_entity_guid() -> EntityGuid {
    Uuid::new_v4()
}

// ============================================================================
// ENUMS
// ============================================================================

/// Entity type discriminator for polymorphic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    ContentChannel,
    GroupType,
    DefinedValue,
    FinancialBatch,
}

/// Type of the control used when editing content channel items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentControlType {
    /// Plain multi-line text editor.
    #[default]
    CodeEditor,
    /// Rich HTML editor.
    HtmlEditor,
}

/// How attendance is recorded for a group type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceRule {
    /// No restriction on who can attend.
    #[default]
    None,
    /// Attendee must already be a group member.
    MustBeMember,
    /// Attendee is added to the group when first checked in.
    AddOnCheckIn,
}

/// Where attendance labels are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendancePrintTo {
    #[default]
    Default,
    Kiosk,
    Location,
}

/// Lifecycle status of a financial batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Transactions may still be added.
    #[default]
    Open,
    /// Awaiting review.
    Pending,
    /// Finalized; no further changes.
    Closed,
}

// ============================================================================
// TESTS
// ============================================================================
