//! User entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Preferred interface language
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[sea_orm(string_value = "en")]
    En,
    #[sea_orm(string_value = "bn")]
    Bn,
}

impl Language {
    /// Parse the wire form ("en" / "bn")
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "en" => Some(Language::En),
            "bn" => Some(Language::Bn),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub display_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub avatar_url: Option<String>,

    pub preferred_language: Language,

    pub is_active: bool,

    pub last_login_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document::Entity")]
    Documents,

    #[sea_orm(has_many = "super::refresh_token::Entity")]
    RefreshTokens,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl Related<super::refresh_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefreshTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
