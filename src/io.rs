use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::{error::DbError, types::DbResult};

/// A file handle shared between threads. All positioned operations go
/// through the inner mutex, one caller at a time.
pub struct DbFile {
    file: Mutex<File>,
}

impl DbFile {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, DbError> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn get_file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    pub fn write<T: Encodeable>(&self, obj: &T) -> DbResult {
        self.get_file().write_all(&obj.encode())?;
        Ok(())
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> DbResult {
        self.get_file().write_all(bytes)?;
        Ok(())
    }

    pub fn get_current_position(&self) -> Result<u64, DbError> {
        let offset = self.get_file().seek(SeekFrom::Current(0))?;
        Ok(offset)
    }

    pub fn seek(&self, pos: SeekFrom) -> Result<u64, DbError> {
        let offset = self.get_file().seek(pos)?;
        Ok(offset)
    }

    pub fn set_len(&self, len: u64) -> DbResult {
        self.get_file().set_len(len)?;
        Ok(())
    }

    /// Force buffered writes down to the OS.
    pub fn flush(&self) -> DbResult {
        self.get_file().flush()?;
        Ok(())
    }
}

pub fn read_into<T: Decodeable, R: std::io::Read>(reader: &mut R) -> T {
    T::decode_from(reader)
}

pub fn read_exact<R: std::io::Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|_| panic!("io error, expect {} bytes", bytes_count));
    buffer
}

/// An append-only byte buffer used to assemble log records and page
/// images before they hit the file.
pub struct DbWriter {
    buf: Vec<u8>,
}

impl DbWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(obj.encode().as_slice());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = self.buf.clone();

        if buf.len() > size {
            panic!(
                "buffer size is larger than the given size: {} > {}",
                buf.len(),
                size
            );
        }

        buf.resize(size, 0);
        buf
    }
}

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self;
}

impl Encodeable for &[u8] {
    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }
}

/// # Format
///
/// - 4 bytes: payload size
/// - n bytes: payload
impl Encodeable for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();

        let len = self.len() as u32;
        buffer.extend_from_slice(&len.to_le_bytes());
        buffer.extend_from_slice(&self);

        buffer
    }
}

impl Decodeable for Vec<u8> {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let len = u32::from_le_bytes(read_exact(reader, 4).try_into().unwrap());
        read_exact(reader, len as usize)
    }
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, usize);
