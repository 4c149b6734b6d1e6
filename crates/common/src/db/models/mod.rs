//! SeaORM entity models
//!
//! Database entities for the Cortex knowledge base

mod conversation;
mod conversation_message;
mod document;
mod document_tag;
mod memory;
mod refresh_token;
mod tag;
mod tag_relationship;
mod user;

pub use user::{
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Entity as UserEntity,
    Language,
    Model as User,
};

pub use refresh_token::{
    ActiveModel as RefreshTokenActiveModel,
    Column as RefreshTokenColumn,
    Entity as RefreshTokenEntity,
    Model as RefreshToken,
};

pub use document::{
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
    DocumentStatus,
    DocumentType,
    Entity as DocumentEntity,
    Model as Document,
    METADATA_ONLY_LOCATOR,
};

pub use tag::{
    ActiveModel as TagActiveModel,
    Column as TagColumn,
    Entity as TagEntity,
    Model as Tag,
};

pub use document_tag::{
    ActiveModel as DocumentTagActiveModel,
    Column as DocumentTagColumn,
    Entity as DocumentTagEntity,
    Model as DocumentTag,
};

pub use tag_relationship::{
    ActiveModel as TagRelationshipActiveModel,
    Column as TagRelationshipColumn,
    Entity as TagRelationshipEntity,
    Model as TagRelationship,
    RelationshipType,
};

pub use conversation::{
    ActiveModel as ConversationActiveModel,
    Column as ConversationColumn,
    Entity as ConversationEntity,
    Model as Conversation,
};

pub use conversation_message::{
    ActiveModel as ConversationMessageActiveModel,
    Column as ConversationMessageColumn,
    Entity as ConversationMessageEntity,
    MessageRole,
    Model as ConversationMessage,
};

pub use memory::{
    ActiveModel as MemoryActiveModel,
    Column as MemoryColumn,
    Entity as MemoryEntity,
    MemoryType,
    Model as Memory,
};
