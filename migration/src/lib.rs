pub use sea_orm_migration::prelude::*;

mod m20250420_090000_create_funding_schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250420_090000_create_funding_schema::Migration)]
    }
}
