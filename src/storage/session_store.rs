use std::{
    future::{self, Future},
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDate;
use futures::{stream, Stream, StreamExt};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::{date_to_day_file, day_file_to_date};

use super::entities::SessionEntity;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write session records: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to read session records: {0}")]
    Read(#[source] std::io::Error),
}

/// Interface for abstracting storage of finished sessions.
///
/// Records live in day files keyed by the UTC date of the session start,
/// which keeps reads for a stats window cheap and keeps every file small
/// enough to fix by hand.
pub trait SessionStore {
    /// Appends one finalized session to the day file of its start date.
    fn append(&self, session: SessionEntity) -> impl Future<Output = Result<(), StorageError>>;

    /// Retrieves every session recorded on a certain day. Days without a
    /// file read as empty.
    fn day_sessions(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<SessionEntity>, StorageError>> + Send;

    /// Lists the days that have a record file, oldest first.
    fn stored_days(&self) -> impl Future<Output = Result<Vec<NaiveDate>, StorageError>> + Send;
}

impl<T: Deref> SessionStore for T
where
    T::Target: SessionStore,
{
    fn append(&self, session: SessionEntity) -> impl Future<Output = Result<(), StorageError>> {
        self.deref().append(session)
    }

    fn day_sessions(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<SessionEntity>, StorageError>> + Send {
        self.deref().day_sessions(date)
    }

    fn stored_days(&self) -> impl Future<Output = Result<Vec<NaiveDate>, StorageError>> + Send {
        self.deref().stored_days()
    }
}

/// The main realization of [SessionStore].
pub struct SessionStoreImpl {
    session_dir: PathBuf,
}

impl SessionStoreImpl {
    pub fn new(session_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&session_dir).map_err(StorageError::Write)?;

        Ok(Self { session_dir })
    }

    async fn read_day_file(&self, path: &Path) -> Result<Vec<SessionEntity>, StorageError> {
        async fn extract(path: &Path) -> Result<Vec<SessionEntity>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut sessions = vec![];
            while let Ok(Some(v)) = lines.next_line().await {
                match serde_json::from_str::<SessionEntity>(&v) {
                    Ok(v) => sessions.push(v),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &v
                        )
                    }
                }
            }

            Ok(sessions)
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(StorageError::Read(e))
                }
            }
        }
    }
}

impl SessionStore for SessionStoreImpl {
    async fn append(&self, session: SessionEntity) -> Result<(), StorageError> {
        let file_name = date_to_day_file(session.start.date_naive());
        let path = self.session_dir.join(file_name);

        let mut line = serde_json::to_vec(&session)?;
        line.push(b'\n');

        let mut file = File::options()
            .append(true)
            .create(true)
            .open(path)
            .await
            .map_err(StorageError::Write)?;
        file.write_all(&line).await.map_err(StorageError::Write)?;
        file.flush().await.map_err(StorageError::Write)?;
        Ok(())
    }

    async fn day_sessions(&self, date: NaiveDate) -> Result<Vec<SessionEntity>, StorageError> {
        let file_name = date_to_day_file(date);
        let path = self.session_dir.join(file_name);
        self.read_day_file(&path).await
    }

    async fn stored_days(&self) -> Result<Vec<NaiveDate>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.session_dir)
            .await
            .map_err(StorageError::Read)?;

        let mut days = vec![];
        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Read)? {
            let name = entry.file_name();
            match name.to_str().and_then(day_file_to_date) {
                Some(day) => days.push(day),
                None => debug!("Ignoring foreign file {name:?} in session directory"),
            }
        }
        days.sort();
        Ok(days)
    }
}

/// Lazily streams every stored session, oldest day file first. Each call
/// opens fresh handles, so the stream is restartable by calling again.
/// Unreadable days surface as stream errors without ending the stream.
pub fn all_sessions<'a, S: SessionStore + Send + Sync + 'a>(
    store: S,
) -> impl Stream<Item = Result<SessionEntity, StorageError>> + 'a {
    let store = Arc::new(store);

    let days = stream::once({
        let store = store.clone();
        async move { store.stored_days().await }
    });

    days.flat_map(move |days| match days {
        Ok(days) => {
            let store = store.clone();
            stream::iter(days)
                .map(move |day| {
                    let store = store.clone();
                    async move { store.day_sessions(day).await }
                })
                .buffered(4)
                .flat_map(|data| match data {
                    Ok(data) => stream::iter(data).map(Ok).boxed(),
                    Err(e) => stream::once(future::ready(Err(e))).boxed(),
                })
                .boxed()
        }
        Err(e) => stream::once(future::ready(Err(e))).boxed(),
    })
}

/// Filtered view of [all_sessions] for a single category. Read errors pass
/// through so callers still get to decide what a failed scan means.
pub fn category_sessions<'a, S: SessionStore + Send + Sync + 'a>(
    store: S,
    category: Arc<str>,
) -> impl Stream<Item = Result<SessionEntity, StorageError>> + 'a {
    all_sessions(store).filter(move |v| {
        future::ready(match v {
            Ok(session) => session.category == category,
            Err(_) => true,
        })
    })
}

#[cfg(test)]
mod tests {
    use std::pin::pin;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use futures::StreamExt;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    use super::{all_sessions, category_sessions, SessionStore, SessionStoreImpl};
    use crate::storage::entities::SessionEntity;

    fn session(category: &str, day: u32, hour: u32, minutes: i64) -> SessionEntity {
        SessionEntity {
            category: category.into(),
            start: Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap(),
            duration: Duration::minutes(minutes),
        }
    }

    async fn collect(
        stream: impl futures::Stream<Item = Result<SessionEntity, super::StorageError>>,
    ) -> Vec<SessionEntity> {
        let mut stream = pin!(stream);
        let mut sessions = vec![];
        while let Some(item) = stream.next().await {
            sessions.push(item.expect("stream item"));
        }
        sessions
    }

    #[tokio::test]
    async fn round_trips_sessions_across_days() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStoreImpl::new(dir.path().to_owned())?;

        let recorded = [
            session("Writing", 5, 9, 25),
            session("Coding", 5, 14, 40),
            session("Writing", 7, 10, 10),
        ];
        for session in &recorded {
            storage.append(session.clone()).await?;
        }

        let mut reloaded = collect(all_sessions(&storage)).await;
        reloaded.sort_by_key(|s| s.start);
        assert_eq!(reloaded, recorded);

        Ok(())
    }

    #[tokio::test]
    async fn appends_into_the_day_file_of_the_start_date() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStoreImpl::new(dir.path().to_owned())?;

        storage.append(session("Writing", 5, 9, 25)).await?;

        assert!(dir.path().join("2026-08-05").exists());
        let day = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        assert_eq!(storage.day_sessions(day).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn skips_malformed_lines_on_load() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStoreImpl::new(dir.path().to_owned())?;

        let good = session("Writing", 5, 9, 25);
        let mut content = serde_json::to_string(&good)?;
        content.push('\n');
        content.push_str("{\"category\":\"Cod");
        content.push('\n');
        content.push_str(&serde_json::to_string(&session("Coding", 5, 14, 40))?);
        content.push('\n');

        let mut file = tokio::fs::File::create(dir.path().join("2026-08-05")).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        let day = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        let sessions = storage.day_sessions(day).await?;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0], good);

        Ok(())
    }

    #[tokio::test]
    async fn missing_day_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStoreImpl::new(dir.path().to_owned())?;

        let day = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        assert!(storage.day_sessions(day).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn lists_stored_days_and_ignores_foreign_files() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStoreImpl::new(dir.path().to_owned())?;

        storage.append(session("Writing", 7, 10, 10)).await?;
        storage.append(session("Writing", 5, 9, 25)).await?;
        tokio::fs::write(dir.path().join("notes.txt"), b"not a day file").await?;

        let days = storage.stored_days().await?;
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn filters_by_category() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStoreImpl::new(dir.path().to_owned())?;

        storage.append(session("Writing", 5, 9, 25)).await?;
        storage.append(session("Coding", 5, 14, 40)).await?;
        storage.append(session("Writing", 7, 10, 10)).await?;

        let writing =
            collect(category_sessions(&storage, std::sync::Arc::from("Writing"))).await;
        assert_eq!(writing.len(), 2);
        assert!(writing.iter().all(|s| s.category.as_ref() == "Writing"));

        Ok(())
    }
}
