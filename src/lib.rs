pub mod accounts;
pub mod billing;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod controllers;
pub mod errors;
pub mod identity;
pub mod insertables;
pub mod lifecycle;
pub mod models;
pub mod orders;
pub mod payments;
pub mod schema;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2;

pub type DbPool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;

pub fn initialize_db_pool(database_url: &str) -> Result<DbPool, r2d2::PoolError> {
    let manager = r2d2::ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder().build(manager)
}

/// Single connection for the seed binary and integration tests.
pub fn establish_connection(database_url: &str) -> ConnectionResult<PgConnection> {
    PgConnection::establish(database_url)
}
