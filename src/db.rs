//! 数据库连接
//!
//! 根据配置打开连接池。SQLite 连接池只保留一个连接，
//! 这样内存数据库在整个连接池内共享同一份数据，PRAGMA 也对所有操作生效。

use crate::config::{DatabaseConfig, DatabaseKind};
use anyhow::Context;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};

const SQLITE_PRAGMAS: [&str; 3] = [
    "PRAGMA journal_mode=WAL",
    "PRAGMA synchronous=NORMAL",
    // LIKE 默认不区分 ASCII 大小写，这里改为区分，不区分大小写请使用 ilike
    "PRAGMA case_sensitive_like=ON",
];

/// 打开连接池；SQLite 会自动创建数据文件所在目录
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let url = config.database_url();
    let postgres = url.starts_with("postgres");

    if !postgres && !config.is_memory() {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("创建数据目录失败: {}", parent.display()))?;
        }
    }

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(if postgres { config.max_connections() } else { 1 })
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(options)
        .await
        .with_context(|| format!("连接数据库失败 ({:?})", config.kind))?;

    if db.get_database_backend() == DbBackend::Sqlite {
        prepare_sqlite(&db).await?;
    }

    match config.kind {
        DatabaseKind::Postgresql if postgres => {
            log::info!("[cathaybot-db] 已连接 PostgreSQL");
        }
        _ => log::info!("[cathaybot-db] 已连接 SQLite: {}", config.path.display()),
    }
    Ok(db)
}

async fn prepare_sqlite(db: &DatabaseConnection) -> anyhow::Result<()> {
    for sql in SQLITE_PRAGMAS {
        db.execute(Statement::from_string(DbBackend::Sqlite, sql))
            .await
            .with_context(|| format!("执行 {sql} 失败"))?;
    }
    Ok(())
}
