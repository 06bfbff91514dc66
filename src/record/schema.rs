//! Schema definition, record-size computation, and the page-0 byte layout
//! (§4.3) used to persist a table's schema.

use crate::common::config::PAGE_SIZE;
use crate::error::{StorageError, StorageResult};
use crate::record::value::DataType;

const INT_SIZE: usize = std::mem::size_of::<i32>();
const FLOAT_SIZE: usize = std::mem::size_of::<f32>();
const BOOL_SIZE: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub attr_names: Vec<String>,
    pub data_types: Vec<DataType>,
    /// Only consulted for `DataType::String` attributes.
    pub type_length: Vec<usize>,
    pub key_attrs: Vec<usize>,
}

impl Schema {
    pub fn new(
        attr_names: Vec<String>,
        data_types: Vec<DataType>,
        type_length: Vec<usize>,
        key_attrs: Vec<usize>,
    ) -> Self {
        Self {
            attr_names,
            data_types,
            type_length,
            key_attrs,
        }
    }

    pub fn num_attr(&self) -> usize {
        self.attr_names.len()
    }

    /// The packed byte size of one record under this schema: the sum, over
    /// attributes, of `sizeof(int)` for INT, `sizeof(float)` for FLOAT,
    /// `type_length[i]` for STRING, and one byte for BOOL.
    pub fn record_size(&self) -> usize {
        self.data_types
            .iter()
            .enumerate()
            .map(|(i, dt)| match dt {
                DataType::Int => INT_SIZE,
                DataType::Float => FLOAT_SIZE,
                DataType::String => self.type_length[i],
                DataType::Bool => BOOL_SIZE,
            })
            .sum()
    }

    /// The byte offset within a record's payload at which attribute `i`
    /// begins.
    pub fn attr_offset(&self, i: usize) -> StorageResult<usize> {
        if i >= self.num_attr() {
            return Err(StorageError::AttributeIndexOutOfRange(i));
        }
        Ok(self.data_types[..i]
            .iter()
            .enumerate()
            .map(|(j, dt)| match dt {
                DataType::Int => INT_SIZE,
                DataType::Float => FLOAT_SIZE,
                DataType::String => self.type_length[j],
                DataType::Bool => BOOL_SIZE,
            })
            .sum())
    }

    /// Encodes this schema into a zeroed `PAGE_SIZE` buffer following the
    /// byte layout of §4.3: `num_attr`, then NUL-terminated names, then
    /// per-attribute type tags, then per-attribute type lengths, then
    /// `key_size` followed by that many key-attribute indexes.
    pub fn encode(&self) -> StorageResult<[u8; PAGE_SIZE]> {
        let mut buf = [0u8; PAGE_SIZE];
        let mut offset = 0usize;

        let mut put = |bytes: &[u8], offset: &mut usize| -> StorageResult<()> {
            if *offset + bytes.len() > PAGE_SIZE {
                return Err(StorageError::PageFull);
            }
            buf[*offset..*offset + bytes.len()].copy_from_slice(bytes);
            *offset += bytes.len();
            Ok(())
        };

        put(&(self.num_attr() as i32).to_ne_bytes(), &mut offset)?;

        for name in &self.attr_names {
            put(name.as_bytes(), &mut offset)?;
            put(&[0u8], &mut offset)?;
        }

        for dt in &self.data_types {
            put(&dt.tag().to_ne_bytes(), &mut offset)?;
        }

        for len in &self.type_length {
            put(&(*len as i32).to_ne_bytes(), &mut offset)?;
        }

        put(&(self.key_attrs.len() as i32).to_ne_bytes(), &mut offset)?;
        for key in &self.key_attrs {
            put(&(*key as i32).to_ne_bytes(), &mut offset)?;
        }

        Ok(buf)
    }

    /// Decodes a schema previously written by `encode`.
    pub fn decode(buf: &[u8; PAGE_SIZE]) -> StorageResult<Self> {
        let mut offset = 0usize;

        let read_i32 = |buf: &[u8; PAGE_SIZE], offset: &mut usize| -> StorageResult<i32> {
            if *offset + INT_SIZE > PAGE_SIZE {
                return Err(StorageError::PageOutOfRange(0));
            }
            let v = i32::from_ne_bytes(buf[*offset..*offset + INT_SIZE].try_into().unwrap());
            *offset += INT_SIZE;
            Ok(v)
        };

        let num_attr = read_i32(buf, &mut offset)? as usize;

        let mut attr_names = Vec::with_capacity(num_attr);
        for _ in 0..num_attr {
            let start = offset;
            while offset < PAGE_SIZE && buf[offset] != 0 {
                offset += 1;
            }
            if offset >= PAGE_SIZE {
                return Err(StorageError::PageOutOfRange(0));
            }
            let name = String::from_utf8_lossy(&buf[start..offset]).into_owned();
            attr_names.push(name);
            offset += 1; // skip the NUL terminator
        }

        let mut data_types = Vec::with_capacity(num_attr);
        for _ in 0..num_attr {
            data_types.push(DataType::from_tag(read_i32(buf, &mut offset)?)?);
        }

        let mut type_length = Vec::with_capacity(num_attr);
        for _ in 0..num_attr {
            type_length.push(read_i32(buf, &mut offset)? as usize);
        }

        let key_size = read_i32(buf, &mut offset)? as usize;
        let mut key_attrs = Vec::with_capacity(key_size);
        for _ in 0..key_size {
            key_attrs.push(read_i32(buf, &mut offset)? as usize);
        }

        Ok(Schema {
            attr_names,
            data_types,
            type_length,
            key_attrs,
        })
    }
}
