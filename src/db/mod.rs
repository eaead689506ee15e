use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

pub mod helpers;
mod migrations;
pub mod repositories;

use migrations::run_migrations;

pub const DATABASE_FILE: &str = "singlingo.sqlite3";

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

/// Owns the worker thread; the last `Database` clone to drop stops it.
struct Worker {
    sender: mpsc::Sender<DbCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let Some(thread) = self
            .thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        // A send error means the thread is already gone; join reports why.
        let _ = self.sender.send(DbCommand::Shutdown);
        if thread.join().is_err() {
            error!("exposure database thread panicked");
        }
    }
}

/// Open the connection, migrate it, report readiness, then serve tasks until
/// shutdown or until every sender is gone.
fn worker_loop(
    open: impl FnOnce() -> Result<Connection>,
    ready: mpsc::Sender<Result<()>>,
    commands: mpsc::Receiver<DbCommand>,
) {
    let opened = open()
        .context("failed to open SQLite database")
        .and_then(|mut conn| {
            run_migrations(&mut conn).context("failed to run database migrations")?;
            Ok(conn)
        });
    let mut conn = match opened {
        Ok(conn) => {
            if ready.send(Ok(())).is_err() {
                return;
            }
            conn
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    for command in commands {
        match command {
            DbCommand::Execute(task) => task(&mut conn),
            DbCommand::Shutdown => break,
        }
    }
    info!("Exposure database closed");
}

/// SQLite exposure store. A dedicated thread owns the connection; callers
/// submit closures and await the reply.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        let database = Self::spawn(db_path, move || {
            let conn = Connection::open(&path_for_thread)?;
            if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                error!("Failed to enable WAL mode: {err}");
            }
            Ok(conn)
        })?;

        info!("Database initialized at {}", database.path().display());
        Ok(database)
    }

    /// Private in-memory database, gone when the last clone drops.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(PathBuf::from(":memory:"), || Ok(Connection::open_in_memory()?))
    }

    fn spawn<F>(db_path: PathBuf, open: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Connection> + Send + 'static,
    {
        let (sender, commands) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("singlingo-db".into())
            .spawn(move || worker_loop(open, ready_tx, commands))
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        Ok(Self {
            worker: Arc::new(Worker {
                sender,
                thread: Mutex::new(Some(thread)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.worker.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ExposureStore;
    use crate::models::SegmentKey;
    use uuid::Uuid;

    #[tokio::test]
    async fn counts_survive_closing_and_reopening_the_file() {
        let dir = std::env::temp_dir().join(format!("singlingo-db-{}", Uuid::new_v4()));
        let path = dir.join(DATABASE_FILE);
        let key = SegmentKey::new(0, 2);

        let db = Database::new(path.clone()).expect("open database file");
        db.upsert_count("kalinka", key, "anonymous", 7).await.unwrap();
        drop(db);

        let reopened = Database::new(path).expect("reopen database file");
        assert_eq!(
            reopened.fetch_count("kalinka", key, "anonymous").await.unwrap(),
            Some(7)
        );
        drop(reopened);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn task_errors_reach_the_caller() {
        let db = Database::in_memory().expect("open in-memory database");
        let result: Result<()> = db
            .execute(|conn| {
                conn.execute_batch("SELECT * FROM no_such_table")?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        let tables: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM exposures", [], |row| row.get(0))?))
            .await
            .expect("database still serves tasks");
        assert_eq!(tables, 0);
    }
}
