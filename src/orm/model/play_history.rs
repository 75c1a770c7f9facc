use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "PlayHistory")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "username")]
    pub username: String,
    #[sea_orm(primary_key, auto_increment = false, column_name = "game_name")]
    pub game_name: String,
    #[sea_orm(column_name = "first_played_at")]
    pub first_played_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
