pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_chat_session;
mod m20250601_000002_create_access_log;
mod m20250601_000003_create_bot_config;
mod m20250715_000001_create_users;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_chat_session::Migration),
            Box::new(m20250601_000002_create_access_log::Migration),
            Box::new(m20250601_000003_create_bot_config::Migration),
            Box::new(m20250715_000001_create_users::Migration),
        ]
    }
}
