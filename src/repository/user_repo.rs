//! 用户存储 - PostgreSQL 实现
//!
//! `UserStore` 是会话核心依赖的最小用户查询接口，Postgres 实现
//! 面向 `sys_user` 表。测试用的内存实现在集成测试里。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{Result, ServerError};
use crate::model::user::{User, UserStatus};

/// 用户存储能力接口
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按主键查找用户
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>>;

    /// 按手机号查找用户
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>>;

    /// 按用户名查找用户
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// 创建用户，返回数据库生成的主键
    async fn create(&self, user: &User) -> Result<i64>;

    /// 刷新最后登录时间
    async fn update_login_time(&self, phone: &str) -> Result<()>;

    /// 删除用户
    async fn delete(&self, user_id: i64) -> Result<()>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    phone: String,
    username: String,
    password: Option<String>,
    nickname: Option<String>,
    status: i16,
    is_admin: bool,
    is_multi_login: bool,
    join_time: DateTime<Utc>,
    last_login_time: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            uuid: r.uuid,
            phone: r.phone,
            username: r.username,
            password: r.password,
            nickname: r.nickname,
            status: UserStatus::from_db(r.status),
            is_admin: r.is_admin,
            is_multi_login: r.is_multi_login,
            join_time: r.join_time,
            last_login_time: r.last_login_time,
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT
        id,
        uuid,
        phone,
        username,
        password,
        nickname,
        status,
        is_admin,
        is_multi_login,
        join_time,
        last_login_time
    FROM sys_user
"#;

/// 用户存储 (PostgreSQL 实现)
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Arc<PgPool>,
}

impl PgUserRepository {
    /// 创建新的用户存储
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE id = $1", SELECT_USER))
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| ServerError::Database(format!("Failed to query user: {}", e)))?;

        Ok(row.map(User::from))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE phone = $1", SELECT_USER))
            .bind(phone)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| ServerError::Database(format!("Failed to query user by phone: {}", e)))?;

        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE LOWER(username) = LOWER($1)",
            SELECT_USER
        ))
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::Database(format!("Failed to query user by username: {}", e)))?;

        Ok(row.map(User::from))
    }

    async fn create(&self, user: &User) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sys_user (
                uuid, phone, username, password, nickname,
                status, is_admin, is_multi_login, join_time, last_login_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&user.uuid)
        .bind(&user.phone)
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.nickname)
        .bind(user.status as i16)
        .bind(user.is_admin)
        .bind(user.is_multi_login)
        .bind(user.join_time)
        .bind(user.last_login_time)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| ServerError::Database(format!("Failed to create user: {}", e)))?;

        Ok(id)
    }

    async fn update_login_time(&self, phone: &str) -> Result<()> {
        let result = sqlx::query("UPDATE sys_user SET last_login_time = $1 WHERE phone = $2")
            .bind(Utc::now())
            .bind(phone)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| ServerError::Database(format!("Failed to update login time: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound("用户不存在".to_string()));
        }

        Ok(())
    }

    async fn delete(&self, user_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM sys_user WHERE id = $1")
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| ServerError::Database(format!("Failed to delete user: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound("用户不存在".to_string()));
        }

        Ok(())
    }
}
