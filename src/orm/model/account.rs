use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "Account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "username")]
    pub username: String,
    #[sea_orm(column_name = "password_hashed")]
    pub password_hashed: String,
    // "player" or "developer"
    #[sea_orm(column_name = "role")]
    pub role: String,
    #[sea_orm(column_name = "created_at")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
