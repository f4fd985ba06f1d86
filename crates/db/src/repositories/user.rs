//! User repository for database operations.

use std::collections::HashSet;

use expensa_core::identity::UserRole;
use expensa_shared::types::UserId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::users;

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Login email, unique.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role in the organization.
    pub role: UserRole,
    /// Direct manager, if any.
    pub manager_id: Option<UserId>,
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<users::Model>, DbErr> {
        find_user(&self.db, id).await
    }

    /// Lists active users ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::IsActive.eq(true))
            .order_by_asc(users::Column::FullName)
            .all(&self.db)
            .await
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, input: CreateUserInput) -> Result<users::Model, DbErr> {
        let now = chrono::Utc::now().into();
        let user = users::ActiveModel {
            id: Set(UserId::new().into()),
            email: Set(input.email.trim().to_lowercase()),
            full_name: Set(input.full_name),
            role: Set(input.role.into()),
            manager_id: Set(input.manager_id.map(Uuid::from)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(&self.db).await
    }

    /// Returns the IDs from `ids` that do not belong to an active user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn missing_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>, DbErr> {
        missing_user_ids(&self.db, ids).await
    }
}

pub(crate) async fn find_user<C: ConnectionTrait>(
    db: &C,
    id: UserId,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(Uuid::from(id)).one(db).await
}

pub(crate) async fn missing_user_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[UserId],
) -> Result<Vec<UserId>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let found: HashSet<Uuid> = users::Entity::find()
        .filter(users::Column::Id.is_in(ids.iter().map(|id| Uuid::from(*id))))
        .filter(users::Column::IsActive.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect();

    Ok(ids
        .iter()
        .copied()
        .filter(|id| !found.contains(&Uuid::from(*id)))
        .collect())
}
