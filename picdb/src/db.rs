//! Database operations: `create`, `open`, `close`, `insert`, `read`,
//! `delete`, `garbage_collect`.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::dedup;
use crate::error::{Error, Result};
use crate::file::{self, FileHandle, OpenMode};
use crate::layout::{
    self, Header, MAX_PIC_ID, ResizeConfig, Row, Validity, Variant, HEADER_BYTES, MAX_MAX_FILES,
    ROW_BYTES,
};
use crate::table::MetadataTable;
use crate::variant::{self, DefaultImageProvider, ImageProvider};

/// Configuration for [`Database::create`].
#[derive(Debug, Clone, Copy)]
pub struct CreateConfig {
    /// Row capacity.
    pub max_files: u32,
    /// Bounding boxes for the derived variants.
    pub res_resized: ResizeConfig,
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self {
            max_files: 10,
            res_resized: ResizeConfig::DEFAULT,
        }
    }
}

/// An open picture database.
///
/// Single-threaded and non-reentrant: every operation assumes exclusive
/// access to both the in-memory state and the file handle. Hosts that
/// want to serve concurrent callers must serialize access externally (a
/// single worker, or a mutex around the handle).
pub struct Database {
    file: FileHandle,
    header: Header,
    table: MetadataTable,
    provider: Rc<dyn ImageProvider>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.file.path())
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a new database file at `path`, truncating any prior file.
    pub fn create(path: impl AsRef<Path>, config: CreateConfig) -> Result<Self> {
        Self::create_with_provider(path, config, Rc::new(DefaultImageProvider))
    }

    /// Same as [`Self::create`], but with an explicit [`ImageProvider`]
    /// (used by tests, and by hosts that supply their own codec).
    pub fn create_with_provider(
        path: impl AsRef<Path>,
        config: CreateConfig,
        provider: Rc<dyn ImageProvider>,
    ) -> Result<Self> {
        validate_filename(path.as_ref())?;
        let header = Header::new(config.max_files, config.res_resized)?;
        let table = MetadataTable::empty(header.max_files)?;

        let mut file = FileHandle::create(&path)?;
        file.write_at(0, &header.to_bytes())?;
        for (i, row) in table.rows().iter().enumerate() {
            let offset = layout::row_offset(i);
            file.write_at(offset, &row.to_bytes())?;
        }
        file.sync()?;

        tracing::info!(path = %path.as_ref().display(), max_files = header.max_files, "created database");
        Ok(Self {
            file,
            header,
            table,
            provider,
        })
    }

    /// Opens an existing database file.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_provider(path, mode, Rc::new(DefaultImageProvider))
    }

    /// Same as [`Self::open`], but with an explicit [`ImageProvider`].
    pub fn open_with_provider(
        path: impl AsRef<Path>,
        mode: OpenMode,
        provider: Rc<dyn ImageProvider>,
    ) -> Result<Self> {
        validate_filename(path.as_ref())?;
        let mut file = FileHandle::open(&path, mode)?;
        let header_bytes: [u8; HEADER_BYTES] = file
            .read_at(0, HEADER_BYTES)?
            .try_into()
            .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)))?;
        let header = Header::from_bytes(&header_bytes)?;

        if header.num_files > MAX_MAX_FILES {
            return Err(Error::TooManyFiles(header.num_files, MAX_MAX_FILES));
        }
        if header.max_files == 0 || header.max_files > MAX_MAX_FILES {
            return Err(Error::TooManyFiles(header.max_files, MAX_MAX_FILES));
        }

        let mut rows = Vec::with_capacity(header.max_files as usize);
        for i in 0..header.max_files as usize {
            let buf: [u8; ROW_BYTES] = file
                .read_at(layout::row_offset(i), ROW_BYTES)?
                .try_into()
                .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)))?;
            rows.push(Row::from_bytes(&buf)?);
        }

        tracing::info!(path = %path.as_ref().display(), num_files = header.num_files, "opened database");
        Ok(Self {
            file,
            header,
            table: MetadataTable::from_rows(rows),
            provider,
        })
    }

    /// Releases the file handle. There is no explicit "closed" state to
    /// re-check afterwards — the value is simply gone.
    pub fn close(self) {}

    /// Read-only access to the header (name, version, counts, resize
    /// config).
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Read-only access to the metadata rows, in index order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        self.table.rows()
    }

    /// Inserts `blob` under `id`.
    pub fn insert(&mut self, id: &str, blob: &[u8]) -> Result<()> {
        validate_pict_id(id)?;
        if self.header.num_files >= self.header.max_files {
            return Err(Error::FullDatabase {
                max_files: self.header.max_files,
            });
        }
        let index = self
            .table
            .find_empty_slot()
            .ok_or(Error::FullDatabase {
                max_files: self.header.max_files,
            })?;

        let sha = crate::hash::digest(blob);
        let size_orig = u32::try_from(blob.len())
            .map_err(|_| Error::InvalidArgument("blob exceeds u32::MAX bytes".to_owned()))?;

        {
            let row = self.table.get_mut(index);
            row.pict_id = id.to_owned();
            row.sha = sha;
            row.size[Variant::Orig.index()] = size_orig;
        }

        dedup::resolve(&mut self.table, index)?;

        if self.table.get(index).offset[Variant::Orig.index()] == 0 {
            let (w, h) = self.provider.decode_dimensions(blob)?;
            let offset = self.file.append(blob)?;
            let row = self.table.get_mut(index);
            row.offset[Variant::Orig.index()] = offset;
            row.res_orig = (w, h);
        }

        self.table.get_mut(index).is_valid = Validity::NonEmpty;
        self.header.db_version += 1;
        self.header.num_files += 1;

        self.persist_header()?;
        self.persist_row(index)?;

        tracing::debug!(id, index, "inserted picture");
        Ok(())
    }

    /// Reads `id`'s variant `v`, materializing it first if necessary.
    pub fn read(&mut self, id: &str, v: Variant) -> Result<Vec<u8>> {
        let index = self
            .table
            .find_by_id(id)
            .ok_or_else(|| Error::FileNotFound(id.to_owned()))?;

        variant::ensure_materialized(
            &mut self.table,
            &mut self.file,
            self.provider.as_ref(),
            self.header.res_resized,
            index,
            v,
        )?;
        // Back-propagation and/or fresh materialization may have mutated
        // sibling rows too; persist this row's current state.
        self.persist_row(index)?;

        let row = self.table.get(index);
        self.file
            .read_at(row.offset[v.index()], row.size[v.index()] as usize)
    }

    /// Tombstones `id`: the row becomes `EMPTY`, but its blob bytes
    /// remain in the file until compaction.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let index = self
            .table
            .find_by_id(id)
            .ok_or_else(|| Error::FileNotFound(id.to_owned()))?;

        self.table.get_mut(index).is_valid = Validity::Empty;
        self.persist_row(index)?;

        self.header.db_version += 1;
        self.header.num_files -= 1;
        self.persist_header()?;

        tracing::debug!(id, index, "deleted picture");
        Ok(())
    }

    /// Copy-compacts the database: rewrites `src_path` via a sibling
    /// `tmp_path`, dropping tombstoned rows and re-packing the rest.
    ///
    /// This is `remove(src)` then `rename(tmp, src)` — not atomic. A
    /// crash between the two loses the database; an atomic
    /// `rename(tmp, src)`-only alternative is a deliberate future change,
    /// not part of this contract.
    pub fn garbage_collect(&mut self, src_path: impl AsRef<Path>, tmp_path: impl AsRef<Path>) -> Result<()> {
        let config = CreateConfig {
            max_files: self.header.max_files,
            res_resized: self.header.res_resized,
        };
        let mut tmp = Self::create_with_provider(&tmp_path, config, Rc::clone(&self.provider))?;

        for index in 0..self.table.len() {
            let row = self.table.get(index).clone();
            if !row.is_occupied() {
                continue;
            }

            let orig = self.file.read_at(
                row.offset[Variant::Orig.index()],
                row.size[Variant::Orig.index()] as usize,
            )?;
            tmp.insert(&row.pict_id, &orig)?;

            if row.size[Variant::Small.index()] != 0 {
                let new_index = tmp
                    .table
                    .find_by_id(&row.pict_id)
                    .ok_or_else(|| Error::FileNotFound(row.pict_id.clone()))?;
                variant::ensure_materialized(
                    &mut tmp.table,
                    &mut tmp.file,
                    self.provider.as_ref(),
                    tmp.header.res_resized,
                    new_index,
                    Variant::Small,
                )?;
                tmp.persist_row(new_index)?;
            }
            if row.size[Variant::Thumb.index()] != 0 {
                let new_index = tmp
                    .table
                    .find_by_id(&row.pict_id)
                    .ok_or_else(|| Error::FileNotFound(row.pict_id.clone()))?;
                variant::ensure_materialized(
                    &mut tmp.table,
                    &mut tmp.file,
                    self.provider.as_ref(),
                    tmp.header.res_resized,
                    new_index,
                    Variant::Thumb,
                )?;
                tmp.persist_row(new_index)?;
            }
        }

        tmp.close();
        file::remove(&src_path)?;
        file::rename(&tmp_path, &src_path)?;

        // Re-open in place so `self` reflects the compacted file.
        *self = Self::open_with_provider(
            &src_path,
            OpenMode::ReadWrite,
            Rc::clone(&self.provider),
        )?;

        tracing::info!(num_files = self.header.num_files, "garbage collected database");
        Ok(())
    }

    fn persist_header(&mut self) -> Result<()> {
        self.file.write_at(0, &self.header.to_bytes())
    }

    fn persist_row(&mut self, index: usize) -> Result<()> {
        let bytes = self.table.get(index).to_bytes();
        self.file.write_at(layout::row_offset(index), &bytes)
    }
}

fn validate_filename(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(Error::InvalidFilename("empty database filename".to_owned()));
    }
    Ok(())
}

fn validate_pict_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidPictId("picture id must not be empty".to_owned()));
    }
    if id.len() > MAX_PIC_ID {
        return Err(Error::InvalidPictId(format!(
            "picture id exceeds {MAX_PIC_ID} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::test_provider::FakeImageProvider;

    fn open_test_db(path: &Path, max_files: u32) -> Database {
        let config = CreateConfig {
            max_files,
            res_resized: ResizeConfig {
                thumb: (64, 64),
                small: (256, 256),
            },
        };
        Database::create_with_provider(path, config, Rc::new(FakeImageProvider)).expect("create")
    }

    #[test]
    fn scenario_create_has_zeroed_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let db = open_test_db(&path, 10);
        assert_eq!(db.header().db_name, crate::layout::DB_NAME);
        assert_eq!(db.header().num_files, 0);
        assert_eq!(db.header().db_version, 0);
    }

    #[test]
    fn create_close_open_round_trips_header_and_empty_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        open_test_db(&path, 10).close();

        let reopened = Database::open_with_provider(
            &path,
            OpenMode::ReadWrite,
            Rc::new(FakeImageProvider),
        )
        .expect("open");
        assert_eq!(reopened.header().max_files, 10);
        assert_eq!(reopened.header().num_files, 0);
        assert!(reopened.rows().iter().all(|r| !r.is_occupied()));
    }

    #[test]
    fn insert_then_read_orig_returns_same_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let mut db = open_test_db(&path, 10);

        let blob = FakeImageProvider::encode(640, 480);
        db.insert("pic1", &blob).expect("insert");
        assert_eq!(db.header().num_files, 1);
        assert_eq!(db.header().db_version, 1);
        assert_eq!(db.rows()[0].size[Variant::Thumb.index()], 0);
        assert_eq!(db.rows()[0].size[Variant::Small.index()], 0);

        let back = db.read("pic1", Variant::Orig).expect("read");
        assert_eq!(back, blob);
    }

    #[test]
    fn read_materializes_thumb_once_and_caches_after() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let mut db = open_test_db(&path, 10);
        let blob = FakeImageProvider::encode(640, 480);
        db.insert("pic1", &blob).expect("insert");

        let size_before = db.file.size().expect("size");
        let thumb1 = db.read("pic1", Variant::Thumb).expect("read thumb");
        assert!(!thumb1.is_empty());
        assert!(db.rows()[0].size[Variant::Thumb.index()] > 0);
        let size_after_first = db.file.size().expect("size");
        assert!(size_after_first > size_before);

        let thumb2 = db.read("pic1", Variant::Thumb).expect("read thumb again");
        assert_eq!(thumb1, thumb2);
        let size_after_second = db.file.size().expect("size");
        assert_eq!(size_after_first, size_after_second);
    }

    #[test]
    fn duplicate_content_shares_offset_and_back_propagates_thumb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let mut db = open_test_db(&path, 10);
        let blob = FakeImageProvider::encode(640, 480);

        db.insert("pic1", &blob).expect("insert pic1");
        db.read("pic1", Variant::Thumb).expect("materialize thumb for pic1");
        db.insert("pic2", &blob).expect("insert pic2");

        assert_eq!(db.header().num_files, 2);
        let (row0, row1) = (db.rows()[0].clone(), db.rows()[1].clone());
        assert_eq!(row0.offset[Variant::Orig.index()], row1.offset[Variant::Orig.index()]);
        assert_eq!(row0.size[Variant::Thumb.index()], row1.size[Variant::Thumb.index()]);
        assert_eq!(row0.offset[Variant::Thumb.index()], row1.offset[Variant::Thumb.index()]);
    }

    #[test]
    fn materializing_via_one_duplicate_persists_to_every_sibling_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let mut db = open_test_db(&path, 10);
        let blob = FakeImageProvider::encode(640, 480);

        db.insert("pic1", &blob).expect("insert pic1");
        db.insert("pic2", &blob).expect("insert pic2");
        db.insert("pic3", &blob).expect("insert pic3");
        db.read("pic3", Variant::Thumb).expect("materialize thumb via pic3");
        db.close();

        // Reopening forces every row to be re-read from disk, so this only
        // passes if materializing through pic3 actually wrote pic1's and
        // pic2's rows too, not just pic3's.
        let mut reopened = Database::open_with_provider(
            &path,
            OpenMode::ReadWrite,
            Rc::new(FakeImageProvider),
        )
        .expect("reopen");

        let pic1_row = reopened.rows()[reopened.table.find_by_id("pic1").expect("pic1 present")].clone();
        let pic2_row = reopened.rows()[reopened.table.find_by_id("pic2").expect("pic2 present")].clone();
        assert!(pic1_row.size[Variant::Thumb.index()] > 0);
        assert!(pic2_row.size[Variant::Thumb.index()] > 0);
        assert_eq!(pic1_row.offset[Variant::Thumb.index()], pic2_row.offset[Variant::Thumb.index()]);

        let size_before = reopened.file.size().expect("size");
        let thumb1 = reopened.read("pic1", Variant::Thumb).expect("read pic1 thumb");
        // No second materialization: the on-disk row already carried the
        // shared thumb offset, so this read must not append a new blob.
        assert_eq!(reopened.file.size().expect("size"), size_before);
        assert_eq!(thumb1, reopened.read("pic3", Variant::Thumb).expect("read pic3 thumb"));
        assert_eq!(pic1_row.offset[Variant::Thumb.index()], reopened.rows()[reopened.table.find_by_id("pic1").expect("present")].offset[Variant::Thumb.index()]);
    }

    #[test]
    fn delete_tombstones_and_leaves_other_rows_readable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let mut db = open_test_db(&path, 10);
        let blob = FakeImageProvider::encode(640, 480);
        db.insert("pic1", &blob).expect("insert");
        db.insert("pic2", &blob).expect("insert");

        db.delete("pic1").expect("delete");
        assert_eq!(db.header().num_files, 1);
        assert!(!db.rows()[0].is_occupied());
        assert!(matches!(
            db.read("pic1", Variant::Orig).unwrap_err(),
            Error::FileNotFound(_)
        ));
        assert_eq!(db.read("pic2", Variant::Orig).expect("still readable"), blob);
    }

    #[test]
    fn duplicate_id_without_delete_is_rejected_and_file_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let mut db = open_test_db(&path, 10);
        let blob = FakeImageProvider::encode(640, 480);
        db.insert("pic1", &blob).expect("first insert");
        let size_before = db.file.size().expect("size");
        let version_before = db.header().db_version;

        let err = db.insert("pic1", &blob).expect_err("must fail");
        assert!(matches!(err, Error::DuplicateId(_)));
        assert_eq!(db.file.size().expect("size"), size_before);
        assert_eq!(db.header().db_version, version_before);
    }

    #[test]
    fn full_database_rejects_extra_insert() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let mut db = open_test_db(&path, 2);
        db.insert("a", &FakeImageProvider::encode(10, 10)).expect("insert a");
        db.insert("b", &FakeImageProvider::encode(10, 10)).expect("insert b");

        let err = db
            .insert("c", &FakeImageProvider::encode(10, 10))
            .expect_err("must fail");
        assert!(matches!(err, Error::FullDatabase { .. }));
    }

    #[test]
    fn garbage_collect_drops_tombstones_and_preserves_reads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src.db");
        let tmp = dir.path().join("tmp.db");
        let mut db = open_test_db(&src, 10);

        let blob1 = FakeImageProvider::encode(640, 480);
        let blob2 = FakeImageProvider::encode(320, 240);
        db.insert("pic1", &blob1).expect("insert pic1");
        db.insert("pic2", &blob2).expect("insert pic2");
        db.read("pic2", Variant::Thumb).expect("materialize thumb for pic2");
        db.delete("pic1").expect("delete pic1");

        let size_before_gc = db.file.size().expect("size");
        db.garbage_collect(&src, &tmp).expect("gc");

        assert_eq!(db.header().num_files, 1);
        assert!(db.file.size().expect("size") <= size_before_gc);
        assert_eq!(db.read("pic2", Variant::Orig).expect("read orig"), blob2);
        assert!(db.rows().iter().any(|r| r.is_occupied() && r.size[Variant::Thumb.index()] > 0));
        assert!(matches!(
            db.read("pic1", Variant::Orig).unwrap_err(),
            Error::FileNotFound(_)
        ));
    }
}
