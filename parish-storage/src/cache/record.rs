//! Cacheable record trait and per-entity snapshot types.
//!
//! Each cached entity supplies its field extraction through [`CacheRecord`]
//! by composition; there is no base-class hierarchy. A record is a deep copy
//! of the model's scalar fields taken at load time, so the cache never
//! shares mutable state with the ORM layer's row instances.

use std::collections::HashMap;

use parish_core::{
    AttendancePrintTo, AttendanceRule, ContentChannel, ContentControlType, DefinedValue,
    EntityGuid, EntityId, EntityType, GroupType,
};

use crate::store::Model;

/// Field-extraction contract for cacheable entities.
///
/// # Implementation Requirements
///
/// - `from_model` must copy every scalar field; no references back into the
///   source model may survive construction
/// - `id()` and `guid()` are immutable once assigned and must echo the
///   model's values
/// - `name()` is the human-readable display string
pub trait CacheRecord: Clone + Send + Sync + 'static {
    /// The backing-store model this record snapshots.
    type Model: Model;

    /// Type discriminator, consistent across all instances.
    fn entity_type() -> EntityType {
        <Self::Model as Model>::entity_type()
    }

    /// Deep-copy the model's scalar fields into a new record.
    fn from_model(model: &Self::Model) -> Self;

    /// Integer primary key.
    fn id(&self) -> EntityId;

    /// Stable external identifier.
    fn guid(&self) -> EntityGuid;

    /// Display name.
    fn name(&self) -> &str;
}

// ============================================================================
// CONTENT CHANNEL
// ============================================================================

/// Cached snapshot of a [`ContentChannel`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChannelRecord {
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
    pub time_to_live: Option<i32>,
    pub content_control_type: ContentControlType,
    pub root_image_directory: String,
    pub is_index_enabled: bool,
}

impl CacheRecord for ContentChannelRecord {
    type Model = ContentChannel;

    fn from_model(model: &ContentChannel) -> Self {
        Self {
            id: model.id,
            guid: model.guid,
            content_channel_type_id: model.content_channel_type_id,
            name: model.name.clone(),
            description: model.description.clone(),
            icon_css_class: model.icon_css_class.clone(),
            requires_approval: model.requires_approval,
            items_manually_ordered: model.items_manually_ordered,
            child_items_manually_ordered: model.child_items_manually_ordered,
            enable_rss: model.enable_rss,
            channel_url: model.channel_url.clone(),
            item_url: model.item_url.clone(),
            time_to_live: model.time_to_live,
            content_control_type: model.content_control_type,
            root_image_directory: model.root_image_directory.clone(),
            is_index_enabled: model.is_index_enabled,
        }
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn guid(&self) -> EntityGuid {
        self.guid
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// GROUP TYPE
// ============================================================================

/// Cached snapshot of a [`GroupType`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTypeRecord {
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
    pub inherited_group_type_id: Option<EntityId>,
}

impl CacheRecord for GroupTypeRecord {
    type Model = GroupType;

    fn from_model(model: &GroupType) -> Self {
        Self {
            id: model.id,
            guid: model.guid,
            name: model.name.clone(),
            description: model.description.clone(),
            group_term: model.group_term.clone(),
            group_member_term: model.group_member_term.clone(),
            default_group_role_id: model.default_group_role_id,
            allow_multiple_locations: model.allow_multiple_locations,
            show_in_group_list: model.show_in_group_list,
            show_in_navigation: model.show_in_navigation,
            icon_css_class: model.icon_css_class.clone(),
            takes_attendance: model.takes_attendance,
            attendance_counts_as_weekend_service: model.attendance_counts_as_weekend_service,
            attendance_rule: model.attendance_rule,
            attendance_print_to: model.attendance_print_to,
            order: model.order,
            inherited_group_type_id: model.inherited_group_type_id,
        }
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn guid(&self) -> EntityGuid {
        self.guid
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// DEFINED VALUE
// ============================================================================

/// Cached snapshot of a [`DefinedValue`].
///
/// Defined values have no parent/child relations; their relation lists
/// always resolve empty.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedValueRecord {
    pub id: EntityId,
    pub guid: EntityGuid,
    pub defined_type_id: EntityId,
    pub order: i32,
    pub value: String,
    pub description: String,
    pub attributes: HashMap<String, String>,
}

impl DefinedValueRecord {
    /// Look up an attribute by key. Returns the raw (untrimmed) value.
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl CacheRecord for DefinedValueRecord {
    type Model = DefinedValue;

    fn from_model(model: &DefinedValue) -> Self {
        Self {
            id: model.id,
            guid: model.guid,
            defined_type_id: model.defined_type_id,
            order: model.order,
            value: model.value.clone(),
            description: model.description.clone(),
            attributes: model.attributes.clone(),
        }
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn guid(&self) -> EntityGuid {
        self.guid
    }

    fn name(&self) -> &str {
        &self.value
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parish_core::new_entity_guid;

    #[test]
    fn test_record_deep_copies_scalars() {
        let mut model = ContentChannel {
            id: 5,
            guid: new_entity_guid(),
            name: "Announcements".to_string(),
            channel_url: "/announcements".to_string(),
            time_to_live: Some(30),
            ..Default::default()
        };

        let record = ContentChannelRecord::from_model(&model);

        // Mutating the model afterwards must not affect the snapshot.
        model.name.push_str(" (edited)");
        model.time_to_live = None;

        assert_eq!(record.name, "Announcements");
        assert_eq!(record.time_to_live, Some(30));
        assert_eq!(record.id, 5);
    }

    #[test]
    fn test_entity_types() {
        assert_eq!(
            ContentChannelRecord::entity_type(),
            EntityType::ContentChannel
        );
        assert_eq!(GroupTypeRecord::entity_type(), EntityType::GroupType);
        assert_eq!(DefinedValueRecord::entity_type(), EntityType::DefinedValue);
    }

    #[test]
    fn test_defined_value_record_name_is_value() {
        let model = DefinedValue {
            id: 9,
            value: "Visa".to_string(),
            ..Default::default()
        };
        let record = DefinedValueRecord::from_model(&model);
        assert_eq!(record.name(), "Visa");
        assert_eq!(record.get_attribute("BatchNameSuffix"), None);
    }
}
