use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use dashboard_backend::{
    AppState,
    cache::{CachedSnapshotStore, RedisSnapshotCache},
    config::Config,
    database::{self, PgConnectionStore, PgSnapshotStore, PgThrottleStore},
    middleware::{RateLimiter, log_errors, rate_limit},
    provider::{AnalyticsHttpClient, Providers, SeoHttpClient},
    refresh::{DashboardService, RefreshPolicy, Stores, SystemClock},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'dashboard_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");
    database::ensure_schema(&pool)
        .await
        .expect("Failed to create database schema");
    let db = Arc::new(pool);

    // 设置 Redis 客户端
    let redis_client = Arc::new(
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client"),
    );

    // 提供方客户端，超时由刷新执行器统一控制，这里只是兜底
    let http = reqwest::Client::builder()
        .timeout(config.provider_timeout() * 2)
        .build()
        .expect("Failed to build HTTP client");
    let providers = Providers::new(
        Arc::new(AnalyticsHttpClient::new(
            http.clone(),
            config.analytics_api_url.clone(),
        )),
        Arc::new(SeoHttpClient::new(http, config.seo_api_url.clone())),
    );

    let stores = Stores {
        connections: Arc::new(PgConnectionStore::new(db.clone())),
        throttle: Arc::new(PgThrottleStore::new(db.clone())),
        snapshots: Arc::new(CachedSnapshotStore::new(
            Arc::new(PgSnapshotStore::new(db)),
            Arc::new(RedisSnapshotCache::new(
                redis_client.clone(),
                config.snapshot_cache_ttl_secs,
            )),
        )),
    };
    let dashboard = DashboardService::new(
        stores,
        providers,
        Arc::new(SystemClock),
        RefreshPolicy::from_config(&config),
    );

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        dashboard: Arc::new(dashboard),
    };

    // 设置限流器
    let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));

    // 添加日志中间件和限流中间件
    let router = routes::router(state.clone())
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit));

    // 开发模式下放开 CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
