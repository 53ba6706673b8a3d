//! 连接生命周期端到端测试
//!
//! 关注点：
//! 1. 发起→回调→状态→断开的完整状态机
//! 2. PKCE验证器的单次使用与重放拒绝
//! 3. 用户拒绝授权时存储不被触碰
//! 4. 令牌静态加密与元数据尽力而为语义

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serial_test::serial;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use entity::{UserIntegrations, user_integrations};
use integration_hub::AppError;
use integration_hub::error::IntegrationError;
use integration_hub::integration::metadata::DubMetadataFetcher;
use integration_hub::integration::registry::{EnvCredentialKeys, ProviderDefinition};
use integration_hub::integration::store::UpsertIntegration;
use integration_hub::integration::{
    CallbackOutcome, ConnectionService, IntegrationStore, MetadataFetcherSet, ProviderRegistry,
    TokenCipher,
};
use migration::MigratorTrait;

const USER_ID: i32 = 1;

/// 测试密钥（64个十六进制字符）
const TEST_KEY: [u8; 32] = [42u8; 32];

async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

/// 构建指向wiremock的dub提供商定义
///
/// 每个测试使用独立的环境变量前缀，避免并行测试互相干扰
fn test_definition(env_prefix: &str, token_url: &str) -> ProviderDefinition {
    let client_id_var = format!("{env_prefix}_CLIENT_ID");
    let client_secret_var = format!("{env_prefix}_CLIENT_SECRET");
    let redirect_uri_var = format!("{env_prefix}_REDIRECT_URI");

    unsafe {
        std::env::set_var(&client_id_var, "test_client_id");
        std::env::set_var(&client_secret_var, "test_client_secret");
        std::env::set_var(&redirect_uri_var, "https://example.com/callback");
    }

    ProviderDefinition {
        slug: "dub".to_string(),
        display_name: "Dub".to_string(),
        authorize_url: "https://app.dub.co/oauth/authorize".to_string(),
        token_url: token_url.to_string(),
        scopes: vec!["workspaces.read".to_string(), "links.read".to_string()],
        pkce_required: true,
        env: EnvCredentialKeys {
            client_id: client_id_var,
            client_secret: client_secret_var,
            redirect_uri: redirect_uri_var,
        },
        extra_authorize_params: vec![],
    }
}

fn build_service(
    db: DatabaseConnection,
    definition: ProviderDefinition,
    metadata_fetchers: MetadataFetcherSet,
) -> ConnectionService {
    let registry = Arc::new(ProviderRegistry::new(vec![definition]));
    let cipher = Arc::new(TokenCipher::new(&TEST_KEY));
    ConnectionService::new(db, registry, cipher, metadata_fetchers)
}

async fn fetch_record(db: &DatabaseConnection) -> Option<user_integrations::Model> {
    UserIntegrations::find()
        .filter(user_integrations::Column::UserId.eq(USER_ID))
        .filter(user_integrations::Column::Provider.eq("dub"))
        .one(db)
        .await
        .unwrap()
}

fn mount_token_endpoint(body: serde_json::Value) -> Mock {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

#[tokio::test]
#[serial]
async fn test_initiate_then_callback_creates_active_record() {
    let server = MockServer::start().await;
    mount_token_endpoint(json!({
        "access_token": "tok_x",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "ref_y",
        "scope": "workspaces.read"
    }))
    .mount(&server)
    .await;

    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "ws_1", "name": "Acme", "slug": "acme"}
        ])))
        .mount(&server)
        .await;

    let db = setup_db().await;
    let definition = test_definition("T1_DUB", &format!("{}/oauth/token", server.uri()));
    let metadata = MetadataFetcherSet::new(vec![Arc::new(DubMetadataFetcher::with_base_url(
        reqwest::Client::new(),
        server.uri(),
    ))]);
    let service = build_service(db.clone(), definition, metadata);

    // 发起：授权URL包含43字符的code_challenge
    let authorize_url = service.initiate(USER_ID, "dub").await.unwrap();
    let parsed = Url::parse(&authorize_url).unwrap();
    let challenge = parsed
        .query_pairs()
        .find(|(k, _)| k == "code_challenge")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(challenge.len(), 43);

    // 模拟提供商重定向
    let before = chrono::Utc::now().naive_utc();
    let outcome = service
        .callback(USER_ID, "dub", Some("abc123"), None)
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::Connected);

    let record = fetch_record(&db).await.unwrap();
    assert_eq!(record.status, "active");
    assert_eq!(record.scopes, "workspaces.read");
    // 令牌以密文存储
    assert_ne!(record.access_token, "tok_x");
    assert!(record.refresh_token.is_some());
    // expires_at ≈ now + 3600s
    let expires_at = record.expires_at.unwrap();
    let delta = expires_at - (before + chrono::Duration::seconds(3600));
    assert!(delta.num_seconds().abs() < 10);
    // 元数据已富集
    let metadata = record.metadata.unwrap();
    assert_eq!(metadata["workspace_id"], "ws_1");

    // 状态查询
    let status = service.status(USER_ID, "dub").await.unwrap();
    assert!(status.connected);
    assert_eq!(status.status, "active");

    // 解密后的令牌可供协作方使用
    let token = service.access_token(USER_ID, "dub").await.unwrap();
    assert_eq!(token, Some("tok_x".to_string()));
}

#[tokio::test]
#[serial]
async fn test_callback_replay_fails_with_missing_verifier() {
    let server = MockServer::start().await;
    mount_token_endpoint(json!({"access_token": "tok_x"}))
        .mount(&server)
        .await;

    let db = setup_db().await;
    let definition = test_definition("T2_DUB", &format!("{}/oauth/token", server.uri()));
    let service = build_service(db.clone(), definition, MetadataFetcherSet::new(vec![]));

    service.initiate(USER_ID, "dub").await.unwrap();
    let outcome = service
        .callback(USER_ID, "dub", Some("abc123"), None)
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::Connected);

    // 验证器已在首次使用时删除，重放必然失败
    let err = service
        .callback(USER_ID, "dub", Some("abc123"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Integration(IntegrationError::MissingVerifier(_))
    ));

    // 仅存在一条记录
    let count = UserIntegrations::find()
        .filter(user_integrations::Column::UserId.eq(USER_ID))
        .all(&db)
        .await
        .unwrap()
        .len();
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn test_declined_authorization_touches_nothing() {
    let db = setup_db().await;
    let definition = test_definition("T3_DUB", "https://api.dub.co/oauth/token");
    let service = build_service(db.clone(), definition, MetadataFetcherSet::new(vec![]));

    service.initiate(USER_ID, "dub").await.unwrap();
    let outcome = service
        .callback(USER_ID, "dub", None, Some("access_denied"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CallbackOutcome::Declined {
            reason: "access_denied".to_string()
        }
    );

    assert!(fetch_record(&db).await.is_none());
}

#[tokio::test]
#[serial]
async fn test_status_without_connection_and_unknown_slug() {
    let db = setup_db().await;
    let definition = test_definition("T4_DUB", "https://api.dub.co/oauth/token");
    let service = build_service(db, definition, MetadataFetcherSet::new(vec![]));

    // 无记录不是错误
    let status = service.status(USER_ID, "dub").await.unwrap();
    assert!(!status.connected);
    assert_eq!(status.status, "not_connected");

    // 未知slug是调用方缺陷
    let err = service.status(USER_ID, "notion").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Integration(IntegrationError::UnknownIntegration(_))
    ));
}

#[tokio::test]
#[serial]
async fn test_disconnect_is_idempotent() {
    let server = MockServer::start().await;
    mount_token_endpoint(json!({"access_token": "tok_x"}))
        .mount(&server)
        .await;

    let db = setup_db().await;
    let definition = test_definition("T5_DUB", &format!("{}/oauth/token", server.uri()));
    let service = build_service(db.clone(), definition, MetadataFetcherSet::new(vec![]));

    service.initiate(USER_ID, "dub").await.unwrap();
    service
        .callback(USER_ID, "dub", Some("abc123"), None)
        .await
        .unwrap();
    assert!(fetch_record(&db).await.is_some());

    service.disconnect(USER_ID, "dub").await.unwrap();
    assert!(fetch_record(&db).await.is_none());

    let status = service.status(USER_ID, "dub").await.unwrap();
    assert!(!status.connected);

    // 重复断开同样成功
    service.disconnect(USER_ID, "dub").await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_exchange_failure_marks_prior_record_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(json!({"access_token": "tok_x", "expires_in": 3600}))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup_db().await;
    let definition = test_definition("T6_DUB", &format!("{}/oauth/token", server.uri()));
    let service = build_service(db.clone(), definition, MetadataFetcherSet::new(vec![]));

    // 首次连接成功
    service.initiate(USER_ID, "dub").await.unwrap();
    service
        .callback(USER_ID, "dub", Some("abc123"), None)
        .await
        .unwrap();

    // 提供商此后拒绝授权码
    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The authorization code is invalid"
        })))
        .mount(&server)
        .await;

    service.initiate(USER_ID, "dub").await.unwrap();
    let err = service
        .callback(USER_ID, "dub", Some("stale"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Integration(IntegrationError::TokenExchangeFailed { .. })
    ));

    // 先前的记录被置为error而非删除
    let record = fetch_record(&db).await.unwrap();
    assert_eq!(record.status, "error");
    assert_eq!(record.error_message, Some("exchange_failed".to_string()));
}

#[tokio::test]
#[serial]
async fn test_metadata_failure_does_not_fail_connection() {
    let server = MockServer::start().await;
    mount_token_endpoint(json!({"access_token": "tok_x"}))
        .mount(&server)
        .await;

    // 元数据端点不可用
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = setup_db().await;
    let definition = test_definition("T7_DUB", &format!("{}/oauth/token", server.uri()));
    let metadata = MetadataFetcherSet::new(vec![Arc::new(DubMetadataFetcher::with_base_url(
        reqwest::Client::new(),
        server.uri(),
    ))]);
    let service = build_service(db.clone(), definition, metadata);

    service.initiate(USER_ID, "dub").await.unwrap();
    let outcome = service
        .callback(USER_ID, "dub", Some("abc123"), None)
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::Connected);

    // 连接建立，metadata留空
    let record = fetch_record(&db).await.unwrap();
    assert_eq!(record.status, "active");
    assert!(record.metadata.is_none());
}

#[tokio::test]
#[serial]
async fn test_reconnect_updates_record_in_place() {
    let server = MockServer::start().await;
    mount_token_endpoint(json!({"access_token": "tok_first"}))
        .mount(&server)
        .await;

    let db = setup_db().await;
    let definition = test_definition("T8_DUB", &format!("{}/oauth/token", server.uri()));
    let service = build_service(db.clone(), definition, MetadataFetcherSet::new(vec![]));

    service.initiate(USER_ID, "dub").await.unwrap();
    service
        .callback(USER_ID, "dub", Some("code1"), None)
        .await
        .unwrap();
    let first = fetch_record(&db).await.unwrap();

    server.reset().await;
    mount_token_endpoint(json!({"access_token": "tok_second"}))
        .mount(&server)
        .await;

    service.initiate(USER_ID, "dub").await.unwrap();
    service
        .callback(USER_ID, "dub", Some("code2"), None)
        .await
        .unwrap();

    // 原地更新，不产生重复行
    let records = UserIntegrations::find()
        .filter(user_integrations::Column::UserId.eq(USER_ID))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, first.id);
    assert_ne!(records[0].access_token, first.access_token);

    let token = service.access_token(USER_ID, "dub").await.unwrap();
    assert_eq!(token, Some("tok_second".to_string()));
}

#[tokio::test]
#[serial]
async fn test_expired_access_token_is_not_served() {
    let db = setup_db().await;
    let definition = test_definition("T10_DUB", "https://api.dub.co/oauth/token");
    let service = build_service(db.clone(), definition, MetadataFetcherSet::new(vec![]));

    // 一小时前就过期的active记录
    let cipher = TokenCipher::new(&TEST_KEY);
    IntegrationStore::new(db)
        .upsert(UpsertIntegration {
            user_id: USER_ID,
            provider: "dub".to_string(),
            access_token: cipher.encrypt("tok_stale").unwrap(),
            refresh_token: None,
            expires_at: Some(chrono::Utc::now().naive_utc() - chrono::Duration::hours(1)),
            scopes: "workspaces.read".to_string(),
            metadata: None,
        })
        .await
        .unwrap();

    let status = service.status(USER_ID, "dub").await.unwrap();
    assert!(status.connected);

    // 过期令牌不对协作方提供
    assert_eq!(service.access_token(USER_ID, "dub").await.unwrap(), None);
}

#[tokio::test]
#[serial]
async fn test_overview_lists_catalog_with_connection_state() {
    let db = setup_db().await;
    let definition = test_definition("T9_DUB", "https://api.dub.co/oauth/token");
    let service = build_service(db, definition, MetadataFetcherSet::new(vec![]));

    let summaries = service.overview(USER_ID).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].provider, "dub");
    assert!(!summaries[0].connected);
    assert_eq!(summaries[0].status, "not_connected");
}
