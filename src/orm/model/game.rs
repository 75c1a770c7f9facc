use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "Game")]
pub struct Model {
    #[sea_orm(primary_key, column_name = "id")]
    pub id: i64,
    // Doubles as the directory name below the upload root
    #[sea_orm(unique, column_name = "name")]
    pub name: String,
    #[sea_orm(column_name = "version")]
    pub version: String,
    #[sea_orm(column_name = "description")]
    pub description: String,
    #[sea_orm(column_name = "author")]
    pub author: String,
    #[sea_orm(column_name = "max_players")]
    pub max_players: i32,
    // Full developer archive, never served to players
    #[sea_orm(column_name = "archive_path")]
    pub archive_path: String,
    #[sea_orm(column_name = "client_archive_path")]
    pub client_archive_path: String,
    #[sea_orm(column_name = "created_at")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[sea_orm(column_name = "updated_at")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
