//! Memory entity: durable facts and preferences about a user

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    #[sea_orm(string_value = "preference")]
    Preference,
    #[sea_orm(string_value = "context")]
    Context,
    #[sea_orm(string_value = "interest")]
    Interest,
    #[sea_orm(string_value = "correction")]
    Correction,
    #[sea_orm(string_value = "fact")]
    Fact,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "memories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub memory_type: MemoryType,

    #[sea_orm(column_type = "Text")]
    pub key: String,

    #[sea_orm(column_type = "Text")]
    pub value: String,

    pub confidence: f64,

    pub is_active: bool,

    pub source_conversation_id: Option<Uuid>,

    pub last_used_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl ActiveModelBehavior for ActiveModel {}
