use sea_orm::entity::*;
use sea_orm::query::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, FromQueryResult, SqlErr};
use std::collections::HashMap;
use tracing::debug;

use crate::lobby_errors::LobbyErr;
use crate::orm::create_tables;
use crate::orm::model::{game, play_history, review};
use crate::store::{
    Account, GameListing, GameRecord, NewReview, Persistence, ReviewOutcome, ReviewRecord, Role,
};
use crate::utils::auth::user::{register_new_user, validate_credentials};

/// [`Persistence`] on top of a sea-orm connection (SQLite or PostgreSQL).
#[derive(Debug, Clone)]
pub struct OrmPersistence {
    db: DatabaseConnection,
}

impl OrmPersistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn connect(conn_string: &str, init_schemas: bool) -> Result<Self, LobbyErr> {
        let db = Database::connect(conn_string).await?;
        if init_schemas {
            create_tables(&db).await?;
        }
        Ok(Self::new(db))
    }

    /// Private in-memory SQLite database with the schema in place.
    pub async fn in_memory() -> Result<Self, LobbyErr> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        // Every pooled connection would see its own empty database otherwise
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options).await?;
        create_tables(&db).await?;
        Ok(Self::new(db))
    }

    async fn listings(&self, games: Vec<game::Model>) -> Result<Vec<GameListing>, LobbyErr> {
        if games.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = games.iter().map(|g| g.name.clone()).collect();
        let aggregates: HashMap<String, RatingAggregate> = review::Entity::find()
            .select_only()
            .column(review::Column::GameName)
            .column_as(Expr::col(review::Column::Rating).sum(), "rating_sum")
            .column_as(Expr::col(review::Column::Id).count(), "review_count")
            .filter(review::Column::GameName.is_in(names))
            .group_by(review::Column::GameName)
            .into_model::<RatingAggregate>()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|aggregate| (aggregate.game_name.clone(), aggregate))
            .collect();

        games
            .into_iter()
            .map(|db_game| -> Result<GameListing, LobbyErr> {
                let (sum, count) = aggregates
                    .get(&db_game.name)
                    .map(|aggregate| (aggregate.rating_sum.unwrap_or(0), aggregate.review_count))
                    .unwrap_or((0, 0));
                let avg_rating = if count > 0 {
                    Some(((sum as f64 / count as f64) * 100.0).round() / 100.0)
                } else {
                    None
                };
                Ok(GameListing {
                    max_players: stored_max_players(&db_game)?,
                    name: db_game.name,
                    version: db_game.version,
                    description: db_game.description,
                    author: db_game.author,
                    avg_rating,
                    review_count: u64::try_from(count).unwrap_or(0),
                })
            })
            .collect()
    }

    async fn find_game_model(&self, name: &str) -> Result<Option<game::Model>, LobbyErr> {
        Ok(game::Entity::find()
            .filter(game::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }
}

/// Per-game review totals, grouped by the database.
#[derive(Debug, FromQueryResult)]
struct RatingAggregate {
    game_name: String,
    rating_sum: Option<i64>,
    review_count: i64,
}

fn stored_max_players(db_game: &game::Model) -> Result<u32, LobbyErr> {
    u32::try_from(db_game.max_players).map_err(|_| {
        LobbyErr::Internal(format!(
            "game '{}' has a corrupt max_players of {}",
            db_game.name, db_game.max_players
        ))
    })
}

fn column_max_players(record: &GameRecord) -> Result<i32, LobbyErr> {
    i32::try_from(record.max_players).map_err(|_| {
        LobbyErr::Internal(format!(
            "max_players {} of '{}' does not fit the catalog",
            record.max_players, record.name
        ))
    })
}

fn to_record(db_game: game::Model) -> Result<GameRecord, LobbyErr> {
    Ok(GameRecord {
        max_players: stored_max_players(&db_game)?,
        name: db_game.name,
        version: db_game.version,
        description: db_game.description,
        author: db_game.author,
        archive_path: db_game.archive_path,
        client_archive_path: db_game.client_archive_path,
    })
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait::async_trait]
impl Persistence for OrmPersistence {
    async fn register(&self, username: &str, password: &str, role: Role) -> Result<bool, LobbyErr> {
        register_new_user(username, password, role, &self.db).await
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, LobbyErr> {
        match validate_credentials(username, password, &self.db).await? {
            Ok(account) => Ok(Some(account)),
            Err(auth_err) => {
                debug!(target: "auth", "Authentication of {} failed: {:?}", username, auth_err);
                Ok(None)
            }
        }
    }

    async fn add_game(&self, record: &GameRecord) -> Result<bool, LobbyErr> {
        if self.find_game_model(&record.name).await?.is_some() {
            return Ok(false);
        }

        let max_players = column_max_players(record)?;
        let now = chrono::Utc::now();
        let db_game = game::ActiveModel {
            name: Set(record.name.clone()),
            version: Set(record.version.clone()),
            description: Set(record.description.clone()),
            author: Set(record.author.clone()),
            max_players: Set(max_players),
            archive_path: Set(record.archive_path.clone()),
            client_archive_path: Set(record.client_archive_path.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match db_game.insert(&self.db).await {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_game(&self, record: &GameRecord) -> Result<bool, LobbyErr> {
        let max_players = column_max_players(record)?;
        let Some(db_game) = self.find_game_model(&record.name).await? else {
            return Ok(false);
        };

        let mut active_game = db_game.into_active_model();
        active_game.version = Set(record.version.clone());
        active_game.description = Set(record.description.clone());
        active_game.max_players = Set(max_players);
        active_game.archive_path = Set(record.archive_path.clone());
        active_game.client_archive_path = Set(record.client_archive_path.clone());
        active_game.updated_at = Set(chrono::Utc::now());
        active_game.update(&self.db).await?;
        Ok(true)
    }

    async fn delete_game(&self, name: &str) -> Result<bool, LobbyErr> {
        let result = game::Entity::delete_many()
            .filter(game::Column::Name.eq(name))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn find_game(&self, name: &str) -> Result<Option<GameRecord>, LobbyErr> {
        self.find_game_model(name).await?.map(to_record).transpose()
    }

    async fn list_games(&self) -> Result<Vec<GameListing>, LobbyErr> {
        let games = game::Entity::find()
            .order_by_asc(game::Column::Name)
            .all(&self.db)
            .await?;
        self.listings(games).await
    }

    async fn list_games_by_author(&self, author: &str) -> Result<Vec<GameListing>, LobbyErr> {
        let games = game::Entity::find()
            .filter(game::Column::Author.eq(author))
            .order_by_asc(game::Column::Name)
            .all(&self.db)
            .await?;
        self.listings(games).await
    }

    async fn record_play(&self, username: &str, game_name: &str) -> Result<(), LobbyErr> {
        if self.has_played(username, game_name).await? {
            return Ok(());
        }

        let db_play = play_history::ActiveModel {
            username: Set(username.to_string()),
            game_name: Set(game_name.to_string()),
            first_played_at: Set(chrono::Utc::now()),
        };
        match db_play.insert(&self.db).await {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn has_played(&self, username: &str, game_name: &str) -> Result<bool, LobbyErr> {
        Ok(
            play_history::Entity::find_by_id((username.to_string(), game_name.to_string()))
                .one(&self.db)
                .await?
                .is_some(),
        )
    }

    async fn add_review(&self, new_review: &NewReview) -> Result<ReviewOutcome, LobbyErr> {
        if self.find_game_model(&new_review.game_name).await?.is_none() {
            return Ok(ReviewOutcome::GameNotFound);
        }
        if !self
            .has_played(&new_review.username, &new_review.game_name)
            .await?
        {
            return Ok(ReviewOutcome::NotEligible);
        }

        let existing = review::Entity::find()
            .filter(review::Column::GameName.eq(new_review.game_name.as_str()))
            .filter(review::Column::Username.eq(new_review.username.as_str()))
            .one(&self.db)
            .await?;

        if let Some(db_review) = existing {
            let mut active_review = db_review.into_active_model();
            active_review.rating = Set(i32::from(new_review.rating));
            active_review.comment = Set(new_review.comment.clone());
            active_review.created_at = Set(chrono::Utc::now());
            active_review.update(&self.db).await?;
            return Ok(ReviewOutcome::Replaced);
        }

        let db_review = review::ActiveModel {
            game_name: Set(new_review.game_name.clone()),
            username: Set(new_review.username.clone()),
            rating: Set(i32::from(new_review.rating)),
            comment: Set(new_review.comment.clone()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        db_review.insert(&self.db).await?;
        Ok(ReviewOutcome::Added)
    }

    async fn get_reviews(&self, game_name: &str) -> Result<Vec<ReviewRecord>, LobbyErr> {
        let reviews = review::Entity::find()
            .filter(review::Column::GameName.eq(game_name))
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?;

        Ok(reviews
            .into_iter()
            .map(|db_review| ReviewRecord {
                game_name: db_review.game_name,
                username: db_review.username,
                rating: u8::try_from(db_review.rating).unwrap_or(0),
                comment: db_review.comment,
                created_at: db_review.created_at.to_rfc3339(),
            })
            .collect())
    }
}
