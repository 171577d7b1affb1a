//! A filesystem backed store of staff records
//!
//! The [`Directory`] keeps the whole staff list in a single JSON data file
//! under its root, with configuration in `.staff/config.toml`. It is a
//! wrapper around the filesystem agnostic [`Tree`].
//!
//! An open [`Directory`] holds an exclusive advisory lock on a file beside
//! the data file until it is dropped. Another handle on the same root, in
//! this process or another, waits in [`Directory::open`] until then, and
//! only reads the data once it holds the lock. Every check made against an
//! open handle therefore sees the latest committed data.

use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    domain::{Config, Parent, Profile, StaffId, StaffRecord},
    storage::{Filters, PageRequest, RecordStore, StoreError, Tree},
};

/// The directory holding configuration, relative to the root.
pub const CONFIG_DIR: &str = ".staff";

const CONFIG_FILE: &str = "config.toml";

const DATA_VERSION: &str = "1";

/// A filesystem backed store of staff records.
#[derive(Debug)]
pub struct Directory {
    /// The root of the directory the data file is stored in.
    root: PathBuf,
    config: Config,
    tree: Tree,
    /// Exclusive lock, released on drop.
    _lock: File,
}

/// On-disk layout of the data file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataFile<R> {
    #[serde(rename = "_version")]
    version: String,
    last_id: u64,
    #[serde(default = "Vec::new")]
    staff: Vec<R>,
}

impl Directory {
    /// Opens the directory at the given path, loading every record.
    ///
    /// Blocks until no other handle holds the directory's lock. A missing
    /// configuration file falls back to the defaults, and a missing data file
    /// is treated as an empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data file exists but cannot be read, parsed, or
    /// describes an inconsistent hierarchy.
    #[instrument(level = "debug")]
    pub fn open(root: PathBuf) -> Result<Self, StoreError> {
        let config = load_config(&root);
        let path = root.join(config.data_file());
        let lock = acquire_lock(&path)?;

        let tree = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let data: DataFile<StaffRecord> = serde_json::from_reader(reader)?;
            if data.version != DATA_VERSION {
                return Err(StoreError::Corrupt(format!(
                    "unsupported data file version '{}'",
                    data.version
                )));
            }
            Tree::from_records(data.staff, data.last_id)?
        } else {
            tracing::debug!("No data file at {}, starting empty", path.display());
            Tree::default()
        };

        tracing::debug!("Loaded {} staff records", tree.records().count());

        Ok(Self {
            root,
            config,
            tree,
            _lock: lock,
        })
    }

    /// Creates a new, empty directory at the given path.
    ///
    /// Writes a default configuration and an empty data file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is already initialised or the files
    /// cannot be written.
    pub fn init(root: PathBuf) -> Result<Self, StoreError> {
        Self::init_with_config(root, Config::default())
    }

    /// Creates a new, empty directory at the given path with the given
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is already initialised or the files
    /// cannot be written.
    #[instrument(level = "debug")]
    pub fn init_with_config(root: PathBuf, config: Config) -> Result<Self, StoreError> {
        let config_dir = root.join(CONFIG_DIR);
        if config_dir.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "directory already initialised (found existing {})",
                    config_dir.display()
                ),
            )
            .into());
        }

        fs::create_dir_all(&config_dir)?;
        config
            .save(&config_dir.join(CONFIG_FILE))
            .map_err(io::Error::other)?;
        let lock = acquire_lock(&root.join(config.data_file()))?;

        let directory = Self {
            root,
            config,
            tree: Tree::default(),
            _lock: lock,
        };
        directory.flush()?;
        Ok(directory)
    }

    /// The root of the directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The in-memory records.
    #[must_use]
    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The path of the data file.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.root.join(self.config.data_file())
    }

    /// Write every record to the data file.
    ///
    /// The file is written beside its final location and then renamed over
    /// it, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or renamed.
    pub fn flush(&self) -> Result<(), StoreError> {
        let path = self.data_path();
        let staging = path.with_extension("json.tmp");

        let data = DataFile {
            version: DATA_VERSION.to_string(),
            last_id: self.tree.last_id(),
            staff: self.tree.records().collect::<Vec<_>>(),
        };

        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            serde_json::to_writer_pretty(&mut writer, &data)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    /// Apply a mutation to the tree and persist it.
    ///
    /// If persisting fails the tree is restored, so memory and disk agree.
    fn commit<T>(
        &mut self,
        mutate: impl FnOnce(&mut Tree) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let snapshot = self.tree.clone();
        let value = mutate(&mut self.tree)?;
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to persist staff data, rolling back: {e}");
            self.tree = snapshot;
            return Err(e);
        }
        Ok(value)
    }
}

/// `<data file>.lock`, beside the data file.
///
/// The data file itself is replaced on every flush, so it cannot carry the
/// lock.
fn lock_path(data_path: &Path) -> PathBuf {
    let mut name = OsString::from(data_path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Take the exclusive lock for a data file, waiting for any other holder.
fn acquire_lock(data_path: &Path) -> Result<File, StoreError> {
    let path = lock_path(data_path);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)?;
    tracing::debug!("Waiting for lock on {}", path.display());
    file.lock_exclusive()?;
    Ok(file)
}

fn load_config(root: &Path) -> Config {
    let path = root.join(CONFIG_DIR).join(CONFIG_FILE);
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}

impl RecordStore for Directory {
    fn find(&self, id: StaffId) -> Result<Option<StaffRecord>, StoreError> {
        self.tree.find(id)
    }

    fn exists(&self, id: StaffId) -> Result<bool, StoreError> {
        self.tree.exists(id)
    }

    fn find_chief(&self) -> Result<Option<StaffRecord>, StoreError> {
        self.tree.find_chief()
    }

    fn find_by_email(&self, email: &str) -> Result<Option<StaffRecord>, StoreError> {
        self.tree.find_by_email(email)
    }

    fn subordinates(&self, id: StaffId) -> Result<Vec<StaffRecord>, StoreError> {
        self.tree.subordinates(id)
    }

    fn is_ancestor(&self, ancestor: StaffId, id: StaffId) -> Result<bool, StoreError> {
        self.tree.is_ancestor(ancestor, id)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.tree.count()
    }

    fn scan(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> Result<(Vec<StaffRecord>, usize), StoreError> {
        self.tree.scan(filters, page)
    }

    fn search_by_name(&self, term: &str) -> Result<Vec<StaffRecord>, StoreError> {
        self.tree.search_by_name(term)
    }

    fn find_by_position(&self, position: &str) -> Result<Vec<StaffRecord>, StoreError> {
        self.tree.find_by_position(position)
    }

    fn insert(&mut self, parent: Parent, profile: Profile) -> Result<StaffRecord, StoreError> {
        self.commit(|tree| tree.insert(parent, profile))
    }

    fn update(
        &mut self,
        id: StaffId,
        parent: Parent,
        profile: Profile,
    ) -> Result<StaffRecord, StoreError> {
        self.commit(|tree| tree.update(id, parent, profile))
    }

    fn remove(&mut self, id: StaffId) -> Result<StaffRecord, StoreError> {
        self.commit(|tree| tree.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        thread,
        time::Duration,
    };

    use tempfile::TempDir;

    use super::*;

    fn setup_temp_directory() -> (TempDir, Directory) {
        let tmp = TempDir::new().unwrap();
        let directory = Directory::init(tmp.path().to_path_buf()).unwrap();
        (tmp, directory)
    }

    fn named(first: &str) -> Profile {
        Profile {
            first_name: Some(first.into()),
            ..Profile::default()
        }
    }

    #[test]
    fn init_writes_config_and_data_file() {
        let (tmp, directory) = setup_temp_directory();

        assert!(tmp.path().join(CONFIG_DIR).join(CONFIG_FILE).exists());
        assert!(directory.data_path().exists());
        assert_eq!(directory.count().unwrap(), 0);
    }

    #[test]
    fn init_refuses_existing_directory() {
        let (tmp, _directory) = setup_temp_directory();

        let error = Directory::init(tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(error, StoreError::Io(e) if e.kind() == io::ErrorKind::AlreadyExists));
    }

    #[test]
    fn open_without_data_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let directory = Directory::open(tmp.path().to_path_buf()).unwrap();
        assert_eq!(directory.count().unwrap(), 0);
        assert_eq!(directory.config(), &Config::default());
    }

    #[test]
    fn mutations_survive_reopening() {
        let (tmp, mut directory) = setup_temp_directory();
        let chief = directory.insert(Parent::Root, named("Ada")).unwrap();
        let report = directory
            .insert(Parent::Staff(chief.id()), named("Grace"))
            .unwrap();
        directory
            .update(report.id(), Parent::Staff(chief.id()), named("Hedy"))
            .unwrap();
        drop(directory);

        let reopened = Directory::open(tmp.path().to_path_buf()).unwrap();

        assert_eq!(reopened.count().unwrap(), 2);
        assert_eq!(
            reopened.find(report.id()).unwrap().unwrap().display_name(),
            "Hedy"
        );
        assert_eq!(reopened.tree().children(chief.id()).len(), 1);
    }

    #[test]
    fn removed_ids_stay_retired_after_reopening() {
        let (tmp, mut directory) = setup_temp_directory();
        let first = directory.insert(Parent::Root, Profile::default()).unwrap();
        directory.remove(first.id()).unwrap();
        drop(directory);

        let mut reopened = Directory::open(tmp.path().to_path_buf()).unwrap();
        let next = reopened.insert(Parent::Root, Profile::default()).unwrap();
        assert_eq!(next.id().get(), 2);
    }

    #[test]
    fn custom_data_file_name_is_respected() {
        let tmp = TempDir::new().unwrap();
        let config_dir = tmp.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join(CONFIG_FILE),
            "_version = \"1\"\ndata_file = \"people.json\"\n",
        )
        .unwrap();

        let mut directory = Directory::open(tmp.path().to_path_buf()).unwrap();
        directory.insert(Parent::Root, Profile::default()).unwrap();

        assert!(tmp.path().join("people.json").exists());
    }

    #[test]
    fn unreadable_data_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("staff.json"), "not json").unwrap();

        let error = Directory::open(tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(error, StoreError::Json(_)));
    }

    #[test]
    fn unknown_data_version_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("staff.json"),
            r#"{"_version": "9", "lastId": 0, "staff": []}"#,
        )
        .unwrap();

        let error = Directory::open(tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(error, StoreError::Corrupt(_)));
    }

    #[test]
    fn hierarchy_lookups_survive_reopening() {
        let (tmp, mut directory) = setup_temp_directory();
        let chief = directory.insert(Parent::Root, named("Ada")).unwrap().id();
        let report = directory
            .insert(Parent::Staff(chief), named("Grace"))
            .unwrap()
            .id();
        drop(directory);

        let reopened = Directory::open(tmp.path().to_path_buf()).unwrap();
        assert!(reopened.exists(report).unwrap());
        assert!(!reopened.exists(StaffId::new(3).unwrap()).unwrap());
        assert!(reopened.is_ancestor(chief, report).unwrap());
        assert!(!reopened.is_ancestor(report, chief).unwrap());
    }

    #[test]
    fn second_handle_waits_and_sees_committed_records() {
        let (tmp, mut first) = setup_temp_directory();
        let released = Arc::new(AtomicBool::new(false));

        let second = {
            let root = tmp.path().to_path_buf();
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let mut second = Directory::open(root).unwrap();
                let waited = released.load(Ordering::SeqCst);
                let chief = second.find_chief().unwrap().map(|record| record.id());
                let next = second.insert(Parent::Root, named("Bea")).unwrap().id();
                (waited, chief, next)
            })
        };

        thread::sleep(Duration::from_millis(50));
        let ada = first.insert(Parent::Root, named("Ada")).unwrap();
        released.store(true, Ordering::SeqCst);
        drop(first);

        let (waited, chief, next) = second.join().unwrap();
        assert!(waited, "second handle opened while the first was live");
        assert_eq!(chief, Some(ada.id()));
        assert_eq!(next.get(), 2);

        let reopened = Directory::open(tmp.path().to_path_buf()).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
    }

    #[test]
    fn lock_file_sits_beside_data_file() {
        let (tmp, _directory) = setup_temp_directory();
        assert!(tmp.path().join("staff.json.lock").exists());
    }

    #[test]
    fn failed_write_rolls_back() {
        let (tmp, mut directory) = setup_temp_directory();
        let data_path = directory.data_path();
        fs::remove_file(&data_path).unwrap();
        // A directory in place of the data file makes the final rename fail.
        fs::create_dir(&data_path).unwrap();

        assert!(directory.insert(Parent::Root, Profile::default()).is_err());
        assert_eq!(directory.count().unwrap(), 0);
        assert!(!tmp.path().join("staff.json.tmp").exists());
    }
}
