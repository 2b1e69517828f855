//! Flat-file listing store.
//!
//! All listings live in a single JSON array on disk. Every operation
//! reads the full file; every mutation rewrites it atomically
//! (temp file + rename) and then snapshots a timestamped backup copy
//! next to it. The whole read-modify-write-backup cycle runs under an
//! internal mutex so concurrent handlers cannot lose updates.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::listing::{Listing, ListingDraft};

/// Prefix for timestamped backup files written next to the data file.
const BACKUP_PREFIX: &str = "data_backup_";

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Listing is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Failed to access the listings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode listings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistence layer for rental listings.
pub struct ListingStore {
    /// Path to the JSON data file.
    data_path: PathBuf,

    /// How many backup files to keep when pruning.
    backup_keep: usize,

    /// Serializes every read-modify-write-backup cycle.
    lock: Mutex<()>,
}

impl ListingStore {
    /// Creates a store over the given data file.
    #[must_use]
    pub fn new(data_path: impl Into<PathBuf>, backup_keep: usize) -> Self {
        Self {
            data_path: data_path.into(),
            backup_keep,
            lock: Mutex::new(()),
        }
    }

    /// Returns the path of the underlying data file.
    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Loads the full collection.
    ///
    /// A missing file is created empty as a side effect; an unparsable
    /// file is masked for this read (warning + empty collection), not
    /// repaired.
    ///
    /// # Errors
    ///
    /// Returns an error only on I/O failures other than the file being
    /// absent.
    pub async fn load(&self) -> Result<Vec<Listing>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_all()
    }

    /// Overwrites the persisted collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, listings: &[Listing]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write_all(listings)
    }

    /// Snapshots the current data file to a timestamped backup.
    ///
    /// Runs automatically after every mutation; exposed for callers
    /// that want an extra snapshot (e.g. before maintenance).
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub async fn backup_now(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.backup()
    }

    /// Validates the draft, assigns a fresh id, appends, saves and
    /// backs up.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingFields`] naming the absent keys if
    /// the draft is incomplete; the persisted collection is left
    /// unchanged in that case.
    pub async fn add(&self, draft: ListingDraft) -> Result<Listing, StoreError> {
        let missing = draft.missing_fields();
        if !missing.is_empty() {
            return Err(StoreError::MissingFields(missing));
        }

        let _guard = self.lock.lock().await;

        let id = Uuid::new_v4().to_string();
        // missing_fields() was empty, so the conversion cannot fail
        let Some(listing) = draft.into_listing(id) else {
            return Err(StoreError::MissingFields(vec![]));
        };

        let mut listings = self.read_all()?;
        listings.push(listing.clone());
        self.write_all(&listings)?;
        self.backup()?;

        info!("Added listing {} for user {}", listing.id, listing.user_id);
        Ok(listing)
    }

    /// Removes the listing with the given id, if any.
    ///
    /// An unknown id is a no-op, not an error; the file is rewritten
    /// and backed up either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        let mut listings = self.read_all()?;
        let before = listings.len();
        listings.retain(|l| l.id != id);

        if listings.len() == before {
            debug!("Delete requested for unknown listing id {}", id);
        } else {
            info!("Deleted listing {}", id);
        }

        self.write_all(&listings)?;
        self.backup()?;
        Ok(())
    }

    /// Returns all listings owned by the given user.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub async fn by_user(&self, user_id: i64) -> Result<Vec<Listing>, StoreError> {
        let _guard = self.lock.lock().await;
        let listings = self.read_all()?;
        Ok(listings.into_iter().filter(|l| l.user_id == user_id).collect())
    }

    /// Returns all listings in the given city.
    ///
    /// Matching is case-insensitive: the stored city and the query are
    /// compared in their Unicode-lowercased forms, while stored values
    /// keep their original casing.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub async fn by_city(&self, city: &str) -> Result<Vec<Listing>, StoreError> {
        let _guard = self.lock.lock().await;
        let needle = city.to_lowercase();
        let listings = self.read_all()?;
        Ok(listings
            .into_iter()
            .filter(|l| l.city.to_lowercase() == needle)
            .collect())
    }

    /// Returns all listings in the given district (exact match).
    ///
    /// Unused by the chat flows but part of the store contract.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub async fn by_district(&self, district: &str) -> Result<Vec<Listing>, StoreError> {
        let _guard = self.lock.lock().await;
        let listings = self.read_all()?;
        Ok(listings
            .into_iter()
            .filter(|l| l.district == district)
            .collect())
    }

    /// Reads the data file, bootstrapping an empty one if absent.
    fn read_all(&self) -> Result<Vec<Listing>, StoreError> {
        let content = match std::fs::read_to_string(&self.data_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Data file {} not found, creating it", self.data_path.display());
                self.write_all(&[])?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(listings) => Ok(listings),
            Err(e) => {
                warn!(
                    "Data file {} is unparsable ({}), treating as empty",
                    self.data_path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Atomically replaces the data file (write to temp, then rename).
    fn write_all(&self, listings: &[Listing]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(listings)?;
        let tmp_path = self.data_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.data_path)?;
        Ok(())
    }

    /// Snapshots the data file to `data_backup_<YYYYMMDD_HHMMSS>.json`
    /// next to it, then prunes old backups.
    ///
    /// A missing source file makes this a no-op.
    fn backup(&self) -> Result<(), StoreError> {
        if !self.data_path.exists() {
            return Ok(());
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let backup_name = format!("{BACKUP_PREFIX}{timestamp}.json");
        let backup_path = self.backup_dir().join(backup_name);

        std::fs::copy(&self.data_path, &backup_path)?;
        debug!("Wrote backup {}", backup_path.display());

        self.prune_backups()?;
        Ok(())
    }

    /// Removes all but the newest `backup_keep` backup files.
    fn prune_backups(&self) -> Result<(), StoreError> {
        let mut backups: Vec<PathBuf> = std::fs::read_dir(self.backup_dir())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_backup_file(path))
            .collect();

        if backups.len() <= self.backup_keep {
            return Ok(());
        }

        // Timestamped names sort chronologically; oldest first.
        backups.sort();
        let excess = backups.len() - self.backup_keep;
        for old in &backups[..excess] {
            if let Err(e) = std::fs::remove_file(old) {
                warn!("Failed to prune backup {}: {}", old.display(), e);
            } else {
                debug!("Pruned backup {}", old.display());
            }
        }

        Ok(())
    }

    /// Directory where the data file and its backups live.
    fn backup_dir(&self) -> PathBuf {
        self.data_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }
}

/// Checks whether a path names one of our timestamped backup files.
fn is_backup_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(".json"))
}

impl std::fmt::Debug for ListingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingStore")
            .field("data_path", &self.data_path)
            .field("backup_keep", &self.backup_keep)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ListingStore {
        ListingStore::new(dir.join("data.json"), 10)
    }

    fn full_draft(user_id: i64) -> ListingDraft {
        ListingDraft {
            price: Some("1000".to_owned()),
            district: Some("Центр".to_owned()),
            photo: Some("p1".to_owned()),
            city: Some("Москва".to_owned()),
            address: Some("ул. 1".to_owned()),
            user_id: Some(user_id),
        }
    }

    #[tokio::test]
    async fn test_load_bootstraps_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let listings = store.load().await.unwrap();
        assert!(listings.is_empty());
        assert!(dir.path().join("data.json").exists());
    }

    #[tokio::test]
    async fn test_load_masks_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), "{not json").unwrap();
        let store = store_in(dir.path());

        let listings = store.load().await.unwrap();
        assert!(listings.is_empty());
    }

    #[tokio::test]
    async fn test_add_assigns_fresh_unique_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut ids = std::collections::HashSet::new();
        for _ in 0..5 {
            let listing = store.add(full_draft(1)).await.unwrap();
            assert!(!listing.id.is_empty());
            assert!(ids.insert(listing.id));
        }
    }

    #[tokio::test]
    async fn test_add_missing_fields_fails_and_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add(full_draft(1)).await.unwrap();

        let mut draft = full_draft(1);
        draft.photo = None;
        draft.address = None;

        let err = store.add(draft).await.unwrap_err();
        match err {
            StoreError::MissingFields(fields) => {
                assert_eq!(fields, vec!["photo", "address"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_then_by_user_returns_exactly_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let added = store.add(full_draft(42)).await.unwrap();
        assert_eq!(added.price, "1000");
        assert_eq!(added.district, "Центр");
        assert_eq!(added.city, "Москва");
        assert_eq!(added.address, "ул. 1");

        let mine = store.by_user(42).await.unwrap();
        assert_eq!(mine, vec![added]);
        assert!(store.by_user(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_from_all_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let kept = store.add(full_draft(1)).await.unwrap();
        let doomed = store.add(full_draft(2)).await.unwrap();

        store.delete(&doomed.id).await.unwrap();

        assert!(store.by_user(2).await.unwrap().is_empty());
        assert_eq!(store.by_user(1).await.unwrap(), vec![kept.clone()]);
        let in_city = store.by_city("Москва").await.unwrap();
        assert!(in_city.iter().all(|l| l.id != doomed.id));
        let in_district = store.by_district("Центр").await.unwrap();
        assert!(in_district.iter().all(|l| l.id != doomed.id));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let listing = store.add(full_draft(1)).await.unwrap();

        store.delete("no-such-id").await.unwrap();

        assert_eq!(store.load().await.unwrap(), vec![listing]);
    }

    #[tokio::test]
    async fn test_save_load_round_trip_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add(full_draft(1)).await.unwrap();
        store.add(full_draft(2)).await.unwrap();

        let first = store.load().await.unwrap();
        store.save(&first).await.unwrap();
        let second = store.load().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_by_city_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut lowercase = full_draft(1);
        lowercase.city = Some("москва".to_owned());
        store.add(lowercase).await.unwrap();
        store.add(full_draft(2)).await.unwrap();

        let found = store.by_city("Москва").await.unwrap();
        assert_eq!(found.len(), 2);
        // Stored casing is preserved.
        assert!(found.iter().any(|l| l.city == "москва"));
        assert!(found.iter().any(|l| l.city == "Москва"));

        assert!(store.by_city("Питер").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_by_district_is_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add(full_draft(1)).await.unwrap();

        assert_eq!(store.by_district("Центр").await.unwrap().len(), 1);
        assert!(store.by_district("центр").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_write_backups_with_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = ListingStore::new(dir.path().join("data.json"), 3);

        for i in 0..6 {
            store.add(full_draft(i)).await.unwrap();
        }

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| is_backup_file(p))
            .collect();

        assert!(!backups.is_empty());
        assert!(backups.len() <= 3, "retention should prune old backups");
    }
}
