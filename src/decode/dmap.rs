// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A reader for the SuperDARN DMAP container format.
//!
//! A DMAP file is a sequence of records. Each record is:
//!
//! - an `i32` encoding code (always `0x00010001`);
//! - an `i32` record size in bytes, including this 16-byte header;
//! - an `i32` number of scalars and an `i32` number of arrays;
//! - the scalars, each a NUL-terminated name, an `i8` type and a value;
//! - the arrays, each a NUL-terminated name, an `i8` type, an `i32` number of
//!   dimensions, the `i32` dimensions and then the data.
//!
//! Everything is little endian. Only scalars are kept; array data is skipped.

use std::{collections::HashMap, io::Cursor};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

use crate::{constants::DMAP_ENCODING_CODE, quarantine::FailureReason};

const HEADER_SIZE: usize = 16;

/// The fewest bytes a scalar can occupy: a one-character name with its NUL,
/// and a type byte. A `char` value adds one more.
const MIN_SCALAR_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DmapScalar {
    Char(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    UChar(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl DmapScalar {
    /// The value as an integer, if it is one.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match *self {
            DmapScalar::Char(v) => Some(v.into()),
            DmapScalar::Short(v) => Some(v.into()),
            DmapScalar::Int(v) => Some(v.into()),
            DmapScalar::Long(v) => Some(v),
            DmapScalar::UChar(v) => Some(v.into()),
            DmapScalar::UShort(v) => Some(v.into()),
            DmapScalar::UInt(v) => Some(v.into()),
            DmapScalar::ULong(v) => i64::try_from(v).ok(),
            DmapScalar::Float(_) | DmapScalar::Double(_) | DmapScalar::String(_) => None,
        }
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            DmapScalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// The type code written before the value.
    pub(crate) fn type_code(&self) -> i8 {
        match self {
            DmapScalar::Char(_) => DmapType::Char as i8,
            DmapScalar::Short(_) => DmapType::Short as i8,
            DmapScalar::Int(_) => DmapType::Int as i8,
            DmapScalar::Long(_) => DmapType::Long as i8,
            DmapScalar::UChar(_) => DmapType::UChar as i8,
            DmapScalar::UShort(_) => DmapType::UShort as i8,
            DmapScalar::UInt(_) => DmapType::UInt as i8,
            DmapScalar::ULong(_) => DmapType::ULong as i8,
            DmapScalar::Float(_) => DmapType::Float as i8,
            DmapScalar::Double(_) => DmapType::Double as i8,
            DmapScalar::String(_) => DmapType::String as i8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub(crate) enum DmapType {
    Char = 1,
    Short = 2,
    Int = 3,
    Float = 4,
    Double = 8,
    String = 9,
    Long = 10,
    UChar = 16,
    UShort = 17,
    UInt = 18,
    ULong = 19,
}

impl DmapType {
    fn from_code(code: i8) -> Option<DmapType> {
        let t = match code {
            1 => DmapType::Char,
            2 => DmapType::Short,
            3 => DmapType::Int,
            4 => DmapType::Float,
            8 => DmapType::Double,
            9 => DmapType::String,
            10 => DmapType::Long,
            16 => DmapType::UChar,
            17 => DmapType::UShort,
            18 => DmapType::UInt,
            19 => DmapType::ULong,
            _ => return None,
        };
        Some(t)
    }

    /// The number of bytes a value of this type occupies. Strings are
    /// variable length.
    fn size(self) -> Option<usize> {
        match self {
            DmapType::Char | DmapType::UChar => Some(1),
            DmapType::Short | DmapType::UShort => Some(2),
            DmapType::Int | DmapType::UInt | DmapType::Float => Some(4),
            DmapType::Long | DmapType::ULong | DmapType::Double => Some(8),
            DmapType::String => None,
        }
    }
}

/// The scalars of one DMAP record.
#[derive(Debug, Clone, Default)]
pub(crate) struct DmapRecord {
    pub(crate) scalars: HashMap<String, DmapScalar>,
}

impl DmapRecord {
    pub(crate) fn get(&self, name: &str) -> Option<&DmapScalar> {
        self.scalars.get(name)
    }
}

/// Read every record out of a (decompressed) DMAP byte stream.
pub(crate) fn read_records(bytes: &[u8]) -> Result<Vec<DmapRecord>, DmapError> {
    let mut reader = RecordReader {
        cursor: Cursor::new(bytes),
        record: 0,
    };
    let mut records = vec![];
    while !reader.at_end() {
        reader.record = records.len();
        records.push(reader.read_record()?);
    }
    Ok(records)
}

struct RecordReader<'a> {
    cursor: Cursor<&'a [u8]>,
    /// The index of the record being read; used for error messages.
    record: usize,
}

impl RecordReader<'_> {
    fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    fn at_end(&self) -> bool {
        self.position() >= self.len()
    }

    fn truncated(&self) -> DmapError {
        DmapError::Truncated {
            record: self.record,
            offset: self.position(),
        }
    }

    fn read_record(&mut self) -> Result<DmapRecord, DmapError> {
        let start = self.position();
        let code = self.i32()?;
        if code != DMAP_ENCODING_CODE {
            return Err(DmapError::UnsupportedVersion {
                record: self.record,
                code,
            });
        }
        let size = self.i32()?;
        let size = match usize::try_from(size) {
            Ok(s) if s >= HEADER_SIZE => s,
            _ => {
                return Err(DmapError::BadSize {
                    record: self.record,
                    size: size.into(),
                })
            }
        };
        if start + size > self.len() {
            return Err(self.truncated());
        }

        let num_scalars = self.count("scalars")?;
        let num_arrays = self.count("arrays")?;

        // The counts come from the file; don't let them size allocations
        // beyond what the record could hold.
        let body = (start + size).saturating_sub(self.position());
        let mut scalars = HashMap::with_capacity(num_scalars.min(body / MIN_SCALAR_SIZE));
        for _ in 0..num_scalars {
            let name = self.cstring()?;
            let data_type = self.data_type(&name)?;
            let value = self.scalar(data_type)?;
            scalars.insert(name, value);
        }

        for _ in 0..num_arrays {
            let name = self.cstring()?;
            let data_type = self.data_type(&name)?;
            let num_dims = self.count("array dimensions")?;
            let mut num_elements: usize = 1;
            for _ in 0..num_dims {
                let dim = self.count("array elements")?;
                num_elements = num_elements.checked_mul(dim).ok_or(DmapError::BadSize {
                    record: self.record,
                    size: dim as i64,
                })?;
            }
            match data_type.size() {
                Some(s) => {
                    let num_bytes = num_elements
                        .checked_mul(s)
                        .ok_or_else(|| self.truncated())?;
                    self.skip(num_bytes)?;
                }
                None => {
                    for _ in 0..num_elements {
                        self.cstring()?;
                    }
                }
            }
        }

        let consumed = self.position() - start;
        if consumed != size {
            return Err(DmapError::SizeMismatch {
                record: self.record,
                expected: size,
                got: consumed,
            });
        }
        Ok(DmapRecord { scalars })
    }

    fn i32(&mut self) -> Result<i32, DmapError> {
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    fn count(&mut self, what: &'static str) -> Result<usize, DmapError> {
        let n = self.i32()?;
        usize::try_from(n).map_err(|_| DmapError::NegativeCount {
            record: self.record,
            what,
            count: n,
        })
    }

    fn data_type(&mut self, name: &str) -> Result<DmapType, DmapError> {
        let code = self.cursor.read_i8().map_err(|_| self.truncated())?;
        DmapType::from_code(code).ok_or_else(|| DmapError::UnknownType {
            record: self.record,
            name: name.to_string(),
            code,
        })
    }

    fn cstring(&mut self) -> Result<String, DmapError> {
        let mut bytes = vec![];
        loop {
            match self.cursor.read_u8().map_err(|_| self.truncated())? {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| DmapError::NonUtf8 {
            record: self.record,
        })
    }

    fn skip(&mut self, num_bytes: usize) -> Result<(), DmapError> {
        let new_position = self
            .position()
            .checked_add(num_bytes)
            .filter(|&p| p <= self.len())
            .ok_or_else(|| self.truncated())?;
        self.cursor.set_position(new_position as u64);
        Ok(())
    }

    fn scalar(&mut self, data_type: DmapType) -> Result<DmapScalar, DmapError> {
        let c = &mut self.cursor;
        let value = match data_type {
            DmapType::Char => c.read_i8().map(DmapScalar::Char),
            DmapType::Short => c.read_i16::<LittleEndian>().map(DmapScalar::Short),
            DmapType::Int => c.read_i32::<LittleEndian>().map(DmapScalar::Int),
            DmapType::Long => c.read_i64::<LittleEndian>().map(DmapScalar::Long),
            DmapType::UChar => c.read_u8().map(DmapScalar::UChar),
            DmapType::UShort => c.read_u16::<LittleEndian>().map(DmapScalar::UShort),
            DmapType::UInt => c.read_u32::<LittleEndian>().map(DmapScalar::UInt),
            DmapType::ULong => c.read_u64::<LittleEndian>().map(DmapScalar::ULong),
            DmapType::Float => c.read_f32::<LittleEndian>().map(DmapScalar::Float),
            DmapType::Double => c.read_f64::<LittleEndian>().map(DmapScalar::Double),
            DmapType::String => return self.cstring().map(DmapScalar::String),
        };
        value.map_err(|_| self.truncated())
    }
}

#[derive(Error, Debug)]
pub enum DmapError {
    #[error("Record {record} has encoding code {code:#x}; only {DMAP_ENCODING_CODE:#x} is supported")]
    UnsupportedVersion { record: usize, code: i32 },

    #[error("Record {record} is truncated (ran out of bytes at offset {offset})")]
    Truncated { record: usize, offset: usize },

    #[error("Record {record} has an invalid size ({size})")]
    BadSize { record: usize, size: i64 },

    #[error("Record {record} declares {expected} bytes, but its contents occupy {got}")]
    SizeMismatch {
        record: usize,
        expected: usize,
        got: usize,
    },

    #[error("Record {record} has a negative number of {what} ({count})")]
    NegativeCount {
        record: usize,
        what: &'static str,
        count: i32,
    },

    #[error("Record {record}: '{name}' has unknown data type {code}")]
    UnknownType {
        record: usize,
        name: String,
        code: i8,
    },

    #[error("Record {record} contains a string that isn't valid UTF-8")]
    NonUtf8 { record: usize },
}

impl DmapError {
    pub(crate) fn reason(&self) -> FailureReason {
        match self {
            DmapError::UnsupportedVersion { .. } => FailureReason::UnsupportedVersion,
            DmapError::Truncated { .. } => FailureReason::Truncated,
            DmapError::BadSize { .. }
            | DmapError::SizeMismatch { .. }
            | DmapError::NegativeCount { .. }
            | DmapError::UnknownType { .. }
            | DmapError::NonUtf8 { .. } => FailureReason::FormatError,
        }
    }
}
