//! One-shot migration runner: applies pending schema migrations and exits.

use anyhow::Context;

use vab_store::Database;

fn main() -> anyhow::Result<()> {
    vab_core::logging::init("vab-migrate")?;

    let path = vab_core::config::database_path();
    let db = Database::open(&path).with_context(|| format!("opening {}", path.display()))?;

    let applied = db.migrate().context("running migrations")?;
    let version = db.schema_version()?;
    tracing::info!(applied, version, "finished running migrations");

    Ok(())
}
