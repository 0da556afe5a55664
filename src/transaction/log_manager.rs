use std::{collections::HashMap, io::SeekFrom, path::{Path, PathBuf}};

use log::debug;

use crate::{
    error::DbError,
    io::{DbFile, DbWriter, Encodeable},
    transaction::{Transaction, TransactionID},
    types::DbResult,
};

#[derive(Debug, PartialEq, Clone, Copy)]
#[repr(u8)]
enum RecordType {
    Abort = 0,
    Commit = 1,
    Update = 2,
    Start = 3,
}

impl Encodeable for RecordType {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

/// The write-ahead log.
///
/// Record layouts (all integers little-endian):
///
/// - START:  type, tid, start offset
/// - UPDATE: type, tid, before image (length-prefixed), after image
///   (length-prefixed), start offset
/// - COMMIT / ABORT: type, tid, start offset
///
/// An UPDATE record must be on disk (see [`LogManager::force`]) before
/// the page bytes it describes are written out. Replay is an external
/// concern; this module only guarantees the records exist in order.
pub struct LogManager {
    /// Record the start position of each transaction.
    tx_start_position: HashMap<TransactionID, u64>,

    file: DbFile,

    /// The absolute position of the file descriptor cursor.
    current_offset: u64,

    total_records: usize,

    file_path: PathBuf,
}

impl LogManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, DbError> {
        Ok(Self {
            tx_start_position: HashMap::new(),
            file: DbFile::new(&file_path)?,
            current_offset: 0,
            total_records: 0,
            file_path: file_path.as_ref().to_path_buf(),
        })
    }

    /// Reopen the log file and forget in-memory positions. Test hook.
    pub fn reset(&mut self) -> DbResult {
        self.file = DbFile::new(&self.file_path)?;
        self.file.set_len(0)?;
        self.tx_start_position.clear();
        self.current_offset = 0;
        self.total_records = 0;
        Ok(())
    }

    pub fn records_count(&self) -> usize {
        self.total_records
    }

    pub fn log_start(&mut self, tx: &Transaction) -> DbResult {
        self.pre_append()?;

        self.file.write(&RecordType::Start)?;
        self.file.write(&tx.get_id())?;
        self.file.write(&self.current_offset)?;

        self.tx_start_position.insert(tx.get_id(), self.current_offset);
        self.current_offset = self.file.get_current_position()?;

        Ok(())
    }

    /// Write an UPDATE record for one page: who changed it, the bytes
    /// at the last commit, and the bytes about to hit the disk. The
    /// record is assembled in memory and appended in one write.
    pub fn log_update(
        &mut self,
        tid: TransactionID,
        before_image: &[u8],
        after_image: &[u8],
    ) -> DbResult {
        self.pre_append()?;

        let mut record = DbWriter::new();
        record.write(&RecordType::Update);
        record.write(&tid);
        record.write(&before_image.to_vec());
        record.write(&after_image.to_vec());
        record.write(&self.current_offset);
        self.file.write_bytes(&record.to_bytes())?;

        self.current_offset = self.file.get_current_position()?;
        debug!(
            "logged update of {} bytes for tx_{}, log now at {}",
            after_image.len(),
            tid,
            self.current_offset
        );

        Ok(())
    }

    pub fn log_commit(&mut self, tx: &Transaction) -> DbResult {
        self.pre_append()?;

        self.file.write(&RecordType::Commit)?;
        self.file.write(&tx.get_id())?;
        self.file.write(&self.current_offset)?;

        self.current_offset = self.file.get_current_position()?;
        self.tx_start_position.remove(&tx.get_id());
        self.force()
    }

    pub fn log_abort(&mut self, tx: &Transaction) -> DbResult {
        self.pre_append()?;

        self.file.write(&RecordType::Abort)?;
        self.file.write(&tx.get_id())?;
        self.file.write(&self.current_offset)?;

        self.current_offset = self.file.get_current_position()?;
        self.tx_start_position.remove(&tx.get_id());
        self.force()
    }

    /// Push everything appended so far down to the OS.
    pub fn force(&mut self) -> DbResult {
        self.file.flush()
    }

    fn pre_append(&mut self) -> DbResult {
        self.file.seek(SeekFrom::End(0))?;
        self.total_records += 1;
        Ok(())
    }
}
