use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "Review")]
pub struct Model {
    #[sea_orm(primary_key, column_name = "id")]
    pub id: i64,
    // Keyed by name, not by Game.id: reviews outlive a deleted game
    #[sea_orm(column_name = "game_name")]
    pub game_name: String,
    #[sea_orm(column_name = "username")]
    pub username: String,
    #[sea_orm(column_name = "rating")]
    pub rating: i32,
    #[sea_orm(column_name = "comment")]
    pub comment: String,
    #[sea_orm(column_name = "created_at")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
