use super::entity;
use log::info;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use std::time::Duration;

pub async fn establish_connection(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let in_memory = db_url.contains(":memory:");
    let mut opt = ConnectOptions::new(db_url.to_owned());
    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);
    if in_memory {
        // 每个连接各自一份内存库，只能用单连接且不能回收
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(4)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(60));
    }

    let db = Database::connect(opt).await?;

    if !in_memory {
        // 启用 WAL 模式
        db.execute(sea_orm::Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "PRAGMA journal_mode=WAL;".to_string(),
        ))
        .await?;
    }

    // 创建表（如果不存在）
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let stmt = builder.build(
        schema
            .create_table_from_entity(entity::Entity)
            .if_not_exists(),
    );
    db.execute(stmt).await?;

    info!("草稿库已就绪: {}", db_url);
    Ok(db)
}
