//! Core entity structures
//!
//! Backing-store models as the ORM layer hands them to us. Every struct
//! carries `#[serde(default)]` so rows written by an older store schema
//! deserialize with zero-valued fields instead of failing the whole read.

use crate::{
    AttendancePrintTo, AttendanceRule, BatchStatus, ContentControlType, EntityGuid, EntityId,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Content channel - a named stream of content items (news, sermons,
/// announcements). Channels nest: a channel may have child channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentChannel {
    pub id: EntityId,
    pub guid: EntityGuid,
    pub content_channel_type_id: EntityId,
    pub name: String,
    pub description: String,
    pub icon_css_class: String,
    pub requires_approval: bool,
    pub items_manually_ordered: bool,
    pub child_items_manually_ordered: bool,
    pub enable_rss: bool,
    pub channel_url: String,
    pub item_url: String,
    /// Minutes a generated feed may stay cached before refresh.
    pub time_to_live: Option<i32>,
    pub content_control_type: ContentControlType,
    pub root_image_directory: String,
    pub is_index_enabled: bool,
    pub created_date_time: Option<Timestamp>,
    pub modified_date_time: Option<Timestamp>,
}

/// Group type - classification for groups (small groups, serving teams,
/// check-in areas). Group types form a graph via parent/child associations
/// and may inherit from another group type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupType {
    pub id: EntityId,
    pub guid: EntityGuid,
    pub name: String,
    pub description: String,
    pub group_term: String,
    pub group_member_term: String,
    pub default_group_role_id: Option<EntityId>,
    pub allow_multiple_locations: bool,
    pub show_in_group_list: bool,
    pub show_in_navigation: bool,
    pub icon_css_class: String,
    pub takes_attendance: bool,
    pub attendance_counts_as_weekend_service: bool,
    pub attendance_rule: AttendanceRule,
    pub attendance_print_to: AttendancePrintTo,
    pub order: i32,
    /// Group type this one inherits attributes from, if any. Inheritance
    /// chains are not guaranteed acyclic.
    pub inherited_group_type_id: Option<EntityId>,
    pub is_system: bool,
    pub created_date_time: Option<Timestamp>,
    pub modified_date_time: Option<Timestamp>,
}

/// Defined value - one entry of an administrator-editable lookup list
/// (currency types, credit card types, connection statuses).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinedValue {
    pub id: EntityId,
    pub guid: EntityGuid,
    pub defined_type_id: EntityId,
    pub order: i32,
    pub value: String,
    pub description: String,
    /// Loose attribute bag (e.g. "BatchNameSuffix" on credit card types).
    pub attributes: HashMap<String, String>,
}

/// Financial batch - a grouping of transactions posted together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialBatch {
    pub id: EntityId,
    pub guid: EntityGuid,
    pub name: String,
    pub status: BatchStatus,
    pub batch_start_date_time: Option<Timestamp>,
    pub batch_end_date_time: Option<Timestamp>,
    /// Expected total of the batch's transactions, in minor currency units.
    pub control_amount: i64,
}
