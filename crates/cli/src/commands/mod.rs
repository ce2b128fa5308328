//! CLI subcommands.

pub mod admin;
pub mod backfill;
pub mod migrate;
pub mod seed;

/// Resolve the connection string the same way the API does: the
/// app-specific variable first, then the generic `DATABASE_URL`.
fn database_url() -> Option<String> {
    std::env::var("MARIGOLD_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}
