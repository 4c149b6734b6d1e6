//! Typed directed edge between two tags

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    #[sea_orm(string_value = "IS_A")]
    IsA,
    #[sea_orm(string_value = "RELATED_TO")]
    RelatedTo,
    #[sea_orm(string_value = "PART_OF")]
    PartOf,
    #[sea_orm(string_value = "OPPOSITE_OF")]
    OppositeOf,
}

impl Default for RelationshipType {
    fn default() -> Self {
        RelationshipType::RelatedTo
    }
}

/// Unique on (source_tag_id, target_tag_id, relationship_type)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag_relationships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub source_tag_id: Uuid,

    pub target_tag_id: Uuid,

    pub relationship_type: RelationshipType,

    /// In [0, 1]
    pub confidence: f64,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tag::Entity",
        from = "Column::SourceTagId",
        to = "super::tag::Column::Id",
        on_delete = "Cascade"
    )]
    SourceTag,

    #[sea_orm(
        belongs_to = "super::tag::Entity",
        from = "Column::TargetTagId",
        to = "super::tag::Column::Id",
        on_delete = "Cascade"
    )]
    TargetTag,
}

impl ActiveModelBehavior for ActiveModel {}
