pub use sea_orm_migration::prelude::*;

mod m20260810_120000_add_service_status_table;
mod m20260810_121000_add_documents_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_120000_add_service_status_table::Migration),
            Box::new(m20260810_121000_add_documents_table::Migration),
        ]
    }
}
