//! Flat-file state store.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::StateConfig;
use crate::link::{parse_backlog, parse_links, BacklogEntry, Link};

use super::traits::{StateStore, StoreError};

/// State kept in newline-delimited UTF-8 text files.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    backlog: PathBuf,
    processing: PathBuf,
    completed: PathBuf,
    failed: PathBuf,
}

impl FileStateStore {
    /// Creates a store over the configured files, creating the state
    /// directory if it does not exist.
    pub fn new(config: &StateConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.dir).map_err(|e| StoreError::io(&config.dir, e))?;
        Ok(Self {
            backlog: config.backlog_path(),
            processing: config.processing_path(),
            completed: config.completed_path(),
            failed: config.failed_path(),
        })
    }

    pub fn backlog_path(&self) -> &Path {
        &self.backlog
    }

    pub fn processing_path(&self) -> &Path {
        &self.processing
    }

    pub fn completed_path(&self) -> &Path {
        &self.completed
    }

    pub fn failed_path(&self) -> &Path {
        &self.failed
    }

    /// Reads a file, treating a missing file as empty.
    fn read(path: &Path) -> Result<String, StoreError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Replaces a file through a sibling temp file and a rename.
    fn write_lines<I>(path: &Path, lines: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut contents = String::new();
        for line in lines {
            contents.push_str(&line);
            contents.push('\n');
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, contents).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
    }

    /// Appends one line, first terminating a previous line that an external
    /// writer left without a newline.
    fn append_line(path: &Path, line: &str) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        let len = file
            .metadata()
            .map_err(|e| StoreError::io(path, e))?
            .len();
        let mut record = String::with_capacity(line.len() + 2);
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))
                .and_then(|_| file.read_exact(&mut last))
                .map_err(|e| StoreError::io(path, e))?;
            if last[0] != b'\n' {
                record.push('\n');
            }
        }
        record.push_str(line);
        record.push('\n');

        file.write_all(record.as_bytes())
            .map_err(|e| StoreError::io(path, e))
    }
}

impl StateStore for FileStateStore {
    fn load_backlog(&self) -> Result<Vec<BacklogEntry>, StoreError> {
        Ok(parse_backlog(&Self::read(&self.backlog)?))
    }

    fn append_backlog(&self, entry: &BacklogEntry) -> Result<(), StoreError> {
        Self::append_line(&self.backlog, &entry.to_line())
    }

    fn snapshot_backlog(&self) -> Result<Vec<BacklogEntry>, StoreError> {
        match fs::rename(&self.backlog, &self.processing) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.backlog.display(), "No backlog file");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&self.backlog, e)),
        }

        // Append mode so a line written right after the rename is not truncated.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.backlog)
            .map_err(|e| StoreError::io(&self.backlog, e))?;

        Ok(parse_backlog(&Self::read(&self.processing)?))
    }

    fn load_snapshot(&self) -> Result<Option<Vec<BacklogEntry>>, StoreError> {
        match File::open(&self.processing) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents)
                    .map_err(|e| StoreError::io(&self.processing, e))?;
                Ok(Some(parse_backlog(&contents)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.processing, e)),
        }
    }

    fn discard_snapshot(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.processing) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.processing, e)),
        }
    }

    fn load_completed(&self) -> Result<Vec<Link>, StoreError> {
        Ok(parse_links(&Self::read(&self.completed)?))
    }

    fn append_completed(&self, link: &Link) -> Result<(), StoreError> {
        Self::append_line(&self.completed, link.as_str())
    }

    fn load_failed(&self) -> Result<Vec<Link>, StoreError> {
        Ok(parse_links(&Self::read(&self.failed)?))
    }

    fn save_failed(&self, links: &[Link]) -> Result<(), StoreError> {
        Self::write_lines(&self.failed, links.iter().map(Link::to_string))
    }

    fn append_failed(&self, link: &Link) -> Result<(), StoreError> {
        Self::append_line(&self.failed, link.as_str())
    }
}
