//! 会话生命周期集成测试
//!
//! 用内存缓存 + 内存用户存储跑完整的登录 / 刷新 / 登出 / 踢人流程，
//! 不依赖外部 Redis 和 PostgreSQL。

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use auth_center::auth::models::{ClientContext, LoginRequest};
use auth_center::auth::{SessionManager, TokenService};
use auth_center::config::TokenConfig;
use auth_center::error::{Result, ServerError};
use auth_center::infra::{KvCache, MemoryCache};
use auth_center::model::user::{User, UserStatus};
use auth_center::repository::UserStore;
use auth_center::service::UserService;

/// 内存用户存储
#[derive(Default)]
struct MemoryUserStore {
    users: DashMap<i64, User>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn set_multi_login(&self, user_id: i64, multi_login: bool) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.is_multi_login = multi_login;
        }
    }

    fn set_status(&self, user_id: i64, status: UserStatus) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.status = status;
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.phone == phone)
            .map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .map(|u| u.clone()))
    }

    async fn create(&self, user: &User) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut user = user.clone();
        user.id = id;
        self.users.insert(id, user);
        Ok(id)
    }

    async fn update_login_time(&self, phone: &str) -> Result<()> {
        let mut entry = self
            .users
            .iter_mut()
            .find(|u| u.phone == phone)
            .ok_or_else(|| ServerError::NotFound("用户不存在".to_string()))?;
        entry.last_login_time = Some(chrono::Utc::now());
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> Result<()> {
        self.users
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| ServerError::NotFound("用户不存在".to_string()))
    }
}

struct TestEnv {
    cache: Arc<MemoryCache>,
    users: Arc<MemoryUserStore>,
    sessions: SessionManager,
    tokens: TokenService,
    user_service: UserService,
    config: TokenConfig,
}

fn test_env() -> TestEnv {
    let config = TokenConfig {
        secret_key: "test-secret-key-at-least-32-chars".to_string(),
        ..TokenConfig::default()
    };
    let cache = Arc::new(MemoryCache::new());
    let users = Arc::new(MemoryUserStore::new());

    let sessions = SessionManager::new(
        config.clone(),
        cache.clone() as Arc<dyn KvCache>,
        users.clone() as Arc<dyn UserStore>,
    )
    .unwrap();
    let tokens = TokenService::new(config.clone(), cache.clone() as Arc<dyn KvCache>).unwrap();
    let user_service = UserService::new(
        config.clone(),
        users.clone() as Arc<dyn UserStore>,
        cache.clone() as Arc<dyn KvCache>,
    );

    TestEnv {
        cache,
        users,
        sessions,
        tokens,
        user_service,
        config,
    }
}

fn login_request(phone: &str, password: &str) -> LoginRequest {
    LoginRequest {
        phone: Some(phone.to_string()),
        username: None,
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_login_refresh_logout_flow() {
    let env = test_env();
    let user = env
        .user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();

    // 登录
    let login = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(login.user.id, user.id);

    // access key / refresh key 已写入会话存储
    assert!(env
        .cache
        .get(&env.config.access_key(user.id, &login.session_uuid))
        .await
        .unwrap()
        .is_some());
    assert!(env
        .cache
        .get(&env.config.refresh_key(user.id, &login.refresh_token))
        .await
        .unwrap()
        .is_some());

    // 登录结果不携带密码哈希
    assert!(login.user.password.is_none());

    // Bearer 认证：缓存未命中（回源数据库）和命中两条路径都不泄漏密码哈希
    let authed = env.sessions.authenticate(&login.access_token).await.unwrap();
    assert_eq!(authed.id, user.id);
    assert!(authed.password.is_none());
    let authed = env.sessions.authenticate(&login.access_token).await.unwrap();
    assert!(authed.password.is_none());

    // 刷新轮换出新会话
    let rotated = env
        .sessions
        .refresh(
            &login.access_token,
            &login.refresh_token,
            &ClientContext::default(),
        )
        .await
        .unwrap();
    assert_ne!(rotated.session_uuid, login.session_uuid);
    assert!(env
        .sessions
        .authenticate(&rotated.new_access_token)
        .await
        .is_ok());

    // 旧 access token 已失效，旧 refresh token 不可重放
    assert!(matches!(
        env.sessions.authenticate(&login.access_token).await,
        Err(ServerError::TokenExpired(_))
    ));
    assert!(matches!(
        env.sessions
            .refresh(
                &rotated.new_access_token,
                &login.refresh_token,
                &ClientContext::default()
            )
            .await,
        Err(ServerError::TokenExpired(_))
    ));

    // 登出后会话全部失效
    env.sessions
        .logout(&rotated.new_access_token, Some(&rotated.new_refresh_token))
        .await
        .unwrap();
    assert!(matches!(
        env.sessions.authenticate(&rotated.new_access_token).await,
        Err(ServerError::TokenExpired(_))
    ));
    assert!(matches!(
        env.sessions
            .refresh(
                &rotated.new_access_token,
                &rotated.new_refresh_token,
                &ClientContext::default()
            )
            .await,
        Err(ServerError::TokenExpired(_))
    ));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let env = test_env();
    env.user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();

    // 密码错误
    assert!(matches!(
        env.sessions
            .login(
                &login_request("13800000000", "wrong-password"),
                &ClientContext::default()
            )
            .await,
        Err(ServerError::Forbidden(_))
    ));

    // 账号不存在
    assert!(matches!(
        env.sessions
            .login(
                &login_request("13900000000", "abc12345"),
                &ClientContext::default()
            )
            .await,
        Err(ServerError::NotFound(_))
    ));

    // 手机号与用户名都缺失
    let request = LoginRequest {
        phone: None,
        username: None,
        password: "abc12345".to_string(),
    };
    assert!(matches!(
        env.sessions.login(&request, &ClientContext::default()).await,
        Err(ServerError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_disabled_user_cannot_login() {
    let env = test_env();
    let user = env
        .user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();
    env.users.set_status(user.id, UserStatus::Disabled);

    assert!(matches!(
        env.sessions
            .login(
                &login_request("13800000000", "abc12345"),
                &ClientContext::default()
            )
            .await,
        Err(ServerError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_single_login_evicts_previous_session() {
    let env = test_env();
    env.user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();

    let first = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();
    let second = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();

    // 第二次登录把第一个会话挤下线
    assert!(matches!(
        env.sessions.authenticate(&first.access_token).await,
        Err(ServerError::TokenExpired(_))
    ));
    assert!(env.sessions.authenticate(&second.access_token).await.is_ok());

    // 第一个 refresh token 也被清掉
    assert!(matches!(
        env.sessions
            .refresh(
                &first.access_token,
                &first.refresh_token,
                &ClientContext::default()
            )
            .await,
        Err(ServerError::TokenExpired(_))
    ));
}

#[tokio::test]
async fn test_multi_login_sessions_coexist() {
    let env = test_env();
    let user = env
        .user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();
    env.users.set_multi_login(user.id, true);

    let first = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();
    let second = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();

    // 两个会话同时有效
    assert!(env.sessions.authenticate(&first.access_token).await.is_ok());
    assert!(env.sessions.authenticate(&second.access_token).await.is_ok());

    // 登出第一个不影响第二个
    env.sessions
        .logout(&first.access_token, Some(&first.refresh_token))
        .await
        .unwrap();
    assert!(matches!(
        env.sessions.authenticate(&first.access_token).await,
        Err(ServerError::TokenExpired(_))
    ));
    assert!(env.sessions.authenticate(&second.access_token).await.is_ok());
}

#[tokio::test]
async fn test_list_sessions_and_kick_out() {
    let env = test_env();
    let user = env
        .user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();
    env.users.set_multi_login(user.id, true);

    let ctx = ClientContext {
        ip: Some("192.168.1.10".to_string()),
        os: Some("macOS".to_string()),
        browser: Some("Chrome".to_string()),
        device: Some("PC".to_string()),
    };
    let first = env
        .sessions
        .login(&login_request("13800000000", "abc12345"), &ctx)
        .await
        .unwrap();
    let second = env
        .sessions
        .login(&login_request("13800000000", "abc12345"), &ctx)
        .await
        .unwrap();

    // 两个会话都在列表里且在线
    let sessions = env.tokens.list_sessions(None).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.online && s.id == user.id));
    assert!(sessions
        .iter()
        .any(|s| s.session_uuid == first.session_uuid));

    // 按用户名过滤
    let filtered = env
        .tokens
        .list_sessions(Some("13800000000"))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 2);
    assert!(env
        .tokens
        .list_sessions(Some("someone-else"))
        .await
        .unwrap()
        .is_empty());

    // 踢掉第一个会话
    env.tokens.kick_out(user.id, &first.session_uuid).await.unwrap();

    assert!(env
        .cache
        .get(&env.config.access_key(user.id, &first.session_uuid))
        .await
        .unwrap()
        .is_none());
    assert!(env
        .cache
        .get(&env.config.extra_info_key(&first.session_uuid))
        .await
        .unwrap()
        .is_none());
    assert!(matches!(
        env.sessions.authenticate(&first.access_token).await,
        Err(ServerError::TokenExpired(_))
    ));

    // 被踢会话从列表消失，另一个会话不受影响
    let sessions = env.tokens.list_sessions(None).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_uuid, second.session_uuid);
    assert!(env.sessions.authenticate(&second.access_token).await.is_ok());

    // 被踢用户的 refresh token 全部失效，无法靠刷新复活
    assert!(matches!(
        env.sessions
            .refresh(&first.access_token, &first.refresh_token, &ctx)
            .await,
        Err(ServerError::TokenExpired(_))
    ));

    // 重复踢同一个会话报 NotFound
    assert!(matches!(
        env.tokens.kick_out(user.id, &first.session_uuid).await,
        Err(ServerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_sessions_prunes_stale_online_members() {
    let env = test_env();
    env.user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();

    let first = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();
    let second = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();

    // 单端策略挤掉第一个会话后，没人替它清理在线集合
    let members = env.cache.smembers(&env.config.online_key).await.unwrap();
    assert!(members.iter().any(|s| *s == first.session_uuid));

    let sessions = env.tokens.list_sessions(None).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_uuid, second.session_uuid);

    // 扫描顺带清掉了失效成员，在线集合只剩存活会话
    let members = env.cache.smembers(&env.config.online_key).await.unwrap();
    assert!(!members.iter().any(|s| *s == first.session_uuid));
    assert!(members.iter().any(|s| *s == second.session_uuid));
}

#[tokio::test]
async fn test_register_rejects_duplicate_phone() {
    let env = test_env();
    env.user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();

    // 重复注册是请求错误（400），不是权限问题
    assert!(matches!(
        env.user_service.register("13800000000", "other").await,
        Err(ServerError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_delete_user_invalidates_sessions() {
    let env = test_env();
    let user = env
        .user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();

    let login = env
        .sessions
        .login(
            &login_request("13800000000", "abc12345"),
            &ClientContext::default(),
        )
        .await
        .unwrap();
    // 用户信息已进缓存
    env.sessions.authenticate(&login.access_token).await.unwrap();

    env.user_service.delete_user(user.id).await.unwrap();

    // access key 和用户缓存都被清理
    assert!(matches!(
        env.sessions.authenticate(&login.access_token).await,
        Err(ServerError::TokenExpired(_))
    ));
    assert!(env
        .cache
        .get(&env.config.user_cache_key(user.id))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_admin_is_rejected() {
    let env = test_env();
    let user = env
        .user_service
        .register("13800000000", "abc12345")
        .await
        .unwrap();
    if let Some(mut u) = env.users.users.get_mut(&user.id) {
        u.is_admin = true;
    }

    assert!(matches!(
        env.user_service.delete_user(user.id).await,
        Err(ServerError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_logout_tolerates_garbage_token() {
    let env = test_env();
    // token 解析失败时登出直接成功
    env.sessions.logout("not-a-token", None).await.unwrap();
}
