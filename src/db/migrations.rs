use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades the database to version `n + 1`.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

const CURRENT_SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

fn schema_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

/// Bring the exposure schema up to date inside one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let found = schema_version(conn)?;
    let pending = match usize::try_from(found) {
        Ok(applied) if applied <= MIGRATIONS.len() => &MIGRATIONS[applied..],
        _ => bail!("unsupported exposure schema version {found} (expected 0..={CURRENT_SCHEMA_VERSION})"),
    };
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction().context("failed to open migration transaction")?;
    for (offset, script) in pending.iter().enumerate() {
        let target = found + offset as i32 + 1;
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply exposure schema v{target}"))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to record schema version")?;
    tx.commit().context("failed to commit schema migrations")
}
