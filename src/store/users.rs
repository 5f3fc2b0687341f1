use chrono::Duration;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, TransactionTrait,
};

use crate::auth::{generate_token, hash_password};
use crate::config::AdminSeed;
use crate::entity::{user, user_session};
use crate::error::{AppError, Result};
use crate::store::{now, Store};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Fields an administrator may change; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub is_admin: Option<bool>,
}

/// Request metadata recorded on a login session.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Store {
    pub async fn find_active_by_email(&self, email: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .filter(user::Column::Active.eq(true))
            .one(self.conn())
            .await?)
    }

    /// The active user currently holding `token`, compared exactly.
    pub async fn find_active_by_token(&self, token: &str) -> Result<Option<user::Model>> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(user::Entity::find()
            .filter(user::Column::SessionToken.eq(token))
            .filter(user::Column::Active.eq(true))
            .one(self.conn())
            .await?)
    }

    pub async fn create_user(&self, new: NewUser) -> Result<user::Model> {
        let email = normalize_email(&new.email);
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(self.conn())
            .await?
            .is_some();
        if taken {
            return Err(AppError::validation("Email already in use"));
        }

        let model = user::ActiveModel {
            email: Set(email),
            name: Set(new.name.trim().to_string()),
            password_hash: Set(new.password_hash),
            is_admin: Set(new.is_admin),
            active: Set(true),
            created_at: Set(now()),
            last_login_at: Set(None),
            session_token: Set(Some(generate_token())),
            ..Default::default()
        }
        .insert(self.conn())
        .await?;
        Ok(model)
    }

    /// Rotates the user's token to `token`, stamps the login time and opens an
    /// expiring session row. Expired session rows of every user are purged
    /// first.
    pub async fn record_login(
        &self,
        user: user::Model,
        token: &str,
        client: ClientInfo,
        ttl_hours: i64,
    ) -> Result<user::Model> {
        let at = now();
        let txn = self.conn().begin().await?;

        let purged = user_session::Entity::delete_many()
            .filter(user_session::Column::ExpiresAt.lt(at))
            .exec(&txn)
            .await?;
        if purged.rows_affected > 0 {
            tracing::debug!(count = purged.rows_affected, "purged expired user sessions");
        }

        let user_id = user.id;
        let mut active = user.into_active_model();
        active.session_token = Set(Some(token.to_string()));
        active.last_login_at = Set(Some(at));
        let user = active.update(&txn).await?;

        user_session::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.to_string()),
            created_at: Set(at),
            expires_at: Set(at + Duration::hours(ttl_hours)),
            active: Set(true),
            ip_address: Set(client.ip_address),
            user_agent: Set(client.user_agent),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(user)
    }

    /// Replaces the user's token with an unrelated one and closes their
    /// sessions, so the old token stops resolving.
    pub async fn logout(&self, user: user::Model) -> Result<()> {
        let txn = self.conn().begin().await?;
        let user_id = user.id;
        let mut active = user.into_active_model();
        active.session_token = Set(Some(generate_token()));
        active.update(&txn).await?;
        close_sessions(&txn, user_id).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Stores the new hash, rotates the token to `token` and closes the
    /// user's open sessions.
    pub async fn change_password(
        &self,
        user: user::Model,
        password_hash: String,
        token: &str,
    ) -> Result<user::Model> {
        let txn = self.conn().begin().await?;
        let user_id = user.id;
        let mut active = user.into_active_model();
        active.password_hash = Set(password_hash);
        active.session_token = Set(Some(token.to_string()));
        let user = active.update(&txn).await?;
        close_sessions(&txn, user_id).await?;
        txn.commit().await?;
        Ok(user)
    }

    /// Every user, active or not, newest first.
    pub async fn list_users(&self) -> Result<Vec<user::Model>> {
        Ok(user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .order_by_desc(user::Column::Id)
            .all(self.conn())
            .await?)
    }

    pub async fn get_user(&self, id: i32) -> Result<user::Model> {
        user::Entity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }

    /// Applies `update` on behalf of `actor_id`, who may not demote or
    /// deactivate themselves.
    pub async fn update_user(
        &self,
        actor_id: i32,
        id: i32,
        update: UserUpdate,
    ) -> Result<user::Model> {
        let target = self.get_user(id).await?;
        if target.id == actor_id {
            if update.is_admin == Some(false) {
                return Err(AppError::validation(
                    "Cannot remove admin privileges from yourself",
                ));
            }
            if update.active == Some(false) {
                return Err(AppError::validation("Cannot deactivate yourself"));
            }
        }

        let mut active = target.into_active_model();
        if let Some(name) = update.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(flag) = update.active {
            active.active = Set(flag);
        }
        if let Some(flag) = update.is_admin {
            active.is_admin = Set(flag);
        }
        Ok(active.update(self.conn()).await?)
    }

    /// Soft delete: the row stays, flagged inactive.
    pub async fn deactivate_user(&self, actor_id: i32, id: i32) -> Result<user::Model> {
        if id == actor_id {
            return Err(AppError::validation("Cannot delete yourself"));
        }
        let target = self.get_user(id).await?;
        let txn = self.conn().begin().await?;
        let mut active = target.into_active_model();
        active.active = Set(false);
        let user = active.update(&txn).await?;
        close_sessions(&txn, id).await?;
        txn.commit().await?;
        Ok(user)
    }

    /// Creates the seeded administrator unless a user with that email exists.
    /// Returns whether a user was created.
    pub async fn ensure_admin(&self, seed: &AdminSeed, bcrypt_cost: u32) -> Result<bool> {
        let email = normalize_email(&seed.email);
        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(self.conn())
            .await?;
        if existing.is_some() {
            tracing::debug!(email = %email, "admin account already present");
            return Ok(false);
        }

        let admin = self
            .create_user(NewUser {
                email,
                name: seed.name.clone(),
                password_hash: hash_password(&seed.password, bcrypt_cost)?,
                is_admin: true,
            })
            .await?;
        tracing::info!(user_id = admin.id, email = %admin.email, "seeded admin account");
        Ok(true)
    }

    /// Open session rows of a user, most recent first.
    pub async fn active_sessions(&self, user_id: i32) -> Result<Vec<user_session::Model>> {
        let sessions = user_session::Entity::find()
            .filter(user_session::Column::UserId.eq(user_id))
            .filter(user_session::Column::Active.eq(true))
            .order_by_desc(user_session::Column::CreatedAt)
            .all(self.conn())
            .await?;
        let at = chrono::Utc::now();
        Ok(sessions.into_iter().filter(|s| s.is_valid(at)).collect())
    }
}

async fn close_sessions<C: sea_orm::ConnectionTrait>(db: &C, user_id: i32) -> Result<()> {
    user_session::Entity::update_many()
        .col_expr(user_session::Column::Active, Expr::value(false))
        .filter(user_session::Column::UserId.eq(user_id))
        .filter(user_session::Column::Active.eq(true))
        .exec(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Store {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn new_user(email: &str, is_admin: bool) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: " Ana ".to_string(),
            password_hash: hash_password("secret1", 4).unwrap(),
            is_admin,
        }
    }

    #[tokio::test]
    async fn emails_are_normalized_and_unique() {
        let store = store().await;
        let user = store
            .create_user(new_user("  Ana@City.GOV ", false))
            .await
            .unwrap();
        assert_eq!(user.email, "ana@city.gov");
        assert_eq!(user.name, "Ana");

        let err = store
            .create_user(new_user("ana@city.gov", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store
            .find_active_by_email("ANA@city.gov")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn login_and_logout_manage_tokens_and_sessions() {
        let store = store().await;
        let user = store.create_user(new_user("a@b.c", false)).await.unwrap();

        let user = store
            .record_login(user, "tok-1", ClientInfo::default(), 24)
            .await
            .unwrap();
        assert!(user.last_login_at.is_some());
        assert_eq!(
            store.find_active_by_token("tok-1").await.unwrap().map(|u| u.id),
            Some(user.id)
        );
        assert_eq!(store.active_sessions(user.id).await.unwrap().len(), 1);

        store.logout(user.clone()).await.unwrap();
        assert!(store.find_active_by_token("tok-1").await.unwrap().is_none());
        assert!(store.active_sessions(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admins_cannot_demote_or_remove_themselves() {
        let store = store().await;
        let admin = store.create_user(new_user("admin@b.c", true)).await.unwrap();
        let other = store.create_user(new_user("x@b.c", false)).await.unwrap();

        let demote = UserUpdate {
            is_admin: Some(false),
            ..Default::default()
        };
        assert!(matches!(
            store.update_user(admin.id, admin.id, demote).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            store.deactivate_user(admin.id, admin.id).await,
            Err(AppError::Validation(_))
        ));

        let promoted = store
            .update_user(
                admin.id,
                other.id,
                UserUpdate {
                    name: Some("Bea".into()),
                    is_admin: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(promoted.is_admin);
        assert_eq!(promoted.name, "Bea");
    }

    #[tokio::test]
    async fn deactivated_users_stay_listed_but_cannot_be_found_active() {
        let store = store().await;
        let admin = store.create_user(new_user("admin@b.c", true)).await.unwrap();
        let other = store.create_user(new_user("x@b.c", false)).await.unwrap();
        let token = other.session_token.clone().unwrap();

        let gone = store.deactivate_user(admin.id, other.id).await.unwrap();
        assert!(!gone.active);
        assert!(store.find_active_by_email("x@b.c").await.unwrap().is_none());
        assert!(store.find_active_by_token(&token).await.unwrap().is_none());
        assert_eq!(store.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn admin_seeding_is_create_if_absent() {
        let store = store().await;
        let seed = AdminSeed {
            email: "Root@City.gov".into(),
            name: "Root".into(),
            password: "changeme".into(),
        };
        assert!(store.ensure_admin(&seed, 4).await.unwrap());
        assert!(!store.ensure_admin(&seed, 4).await.unwrap());

        let admin = store
            .find_active_by_email("root@city.gov")
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_admin);
    }
}
