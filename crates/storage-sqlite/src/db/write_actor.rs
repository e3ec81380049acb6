//! Single writer thread. Every write job runs in its own immediate
//! transaction on one dedicated connection, so writers never contend for the
//! SQLite write lock among themselves.

use diesel::sqlite::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use orderlens_core::errors::{Error, Result};

use super::DbPool;
use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

#[derive(Clone)]
pub struct WriteHandle {
    sender: mpsc::UnboundedSender<Job>,
}

impl WriteHandle {
    /// Runs `job` inside one committed transaction. An error returned by the
    /// job rolls the whole transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<Result<T>>();
        let wrapped: Job = Box::new(move |conn: &mut SqliteConnection| {
            let result = conn
                .immediate_transaction::<T, StorageError, _>(|tx| {
                    job(tx).map_err(StorageError::from)
                })
                .map_err(Error::from);
            // The caller may have gone away; nothing to report to.
            let _ = reply_tx.send(result);
        });

        self.sender
            .send(wrapped)
            .map_err(|_| StorageError::Writer("write actor has stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| StorageError::Writer("write job was dropped".to_string()))?
    }
}

/// Starts the writer thread on a connection taken from `pool`.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

    let spawned = std::thread::Builder::new()
        .name("orderlens-db-writer".to_string())
        .spawn(move || {
            let mut conn = match pool.get() {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Write actor could not acquire a connection: {}", e);
                    return;
                }
            };
            while let Some(job) = receiver.blocking_recv() {
                job(&mut *conn);
            }
            debug!("Write actor stopped");
        });
    if let Err(e) = spawned {
        error!("Failed to start write actor: {}", e);
    }

    WriteHandle { sender }
}
