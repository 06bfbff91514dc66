//! A single tuple: a `Rid` plus its packed attribute bytes, and the
//! value<->bytes conversions schema-driven CRUD needs.

use crate::common::config::Rid;
use crate::error::{StorageError, StorageResult};
use crate::record::schema::Schema;
use crate::record::value::{DataType, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Rid,
    pub data: Vec<u8>,
}

impl Record {
    /// A zeroed record of the right size for `schema`, with an invalid id
    /// — the state before `insert_record` assigns it a `Rid`.
    pub fn create(schema: &Schema) -> Self {
        Self {
            id: Rid::INVALID,
            data: vec![0u8; schema.record_size()],
        }
    }

    /// Frees the record's storage. A no-op beyond ordinary drop — provided
    /// for symmetry with `create_record`/`free_record` in the operation
    /// set, and is idempotent since it just consumes `self`.
    pub fn free(self) {}

    pub fn get_attr(&self, schema: &Schema, index: usize) -> StorageResult<Value> {
        if index >= schema.num_attr() {
            return Err(StorageError::AttributeIndexOutOfRange(index));
        }
        let offset = schema.attr_offset(index)?;
        Ok(match schema.data_types[index] {
            DataType::Int => {
                let bytes: [u8; 4] = self.data[offset..offset + 4].try_into().unwrap();
                Value::Int(i32::from_ne_bytes(bytes))
            }
            DataType::Float => {
                let bytes: [u8; 4] = self.data[offset..offset + 4].try_into().unwrap();
                Value::Float(f32::from_ne_bytes(bytes))
            }
            DataType::String => {
                let len = schema.type_length[index];
                let raw = &self.data[offset..offset + len];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Value::String(String::from_utf8_lossy(&raw[..end]).into_owned())
            }
            DataType::Bool => Value::Bool(self.data[offset] != 0),
        })
    }

    pub fn set_attr(&mut self, schema: &Schema, index: usize, value: &Value) -> StorageResult<()> {
        if index >= schema.num_attr() {
            return Err(StorageError::AttributeIndexOutOfRange(index));
        }
        if value.data_type() != schema.data_types[index] {
            return Err(StorageError::AttributeTypeMismatch(index));
        }
        let offset = schema.attr_offset(index)?;
        match value {
            Value::Int(v) => {
                self.data[offset..offset + 4].copy_from_slice(&v.to_ne_bytes());
            }
            Value::Float(v) => {
                self.data[offset..offset + 4].copy_from_slice(&v.to_ne_bytes());
            }
            Value::String(v) => {
                let len = schema.type_length[index];
                let bytes = v.as_bytes();
                let copy_len = bytes.len().min(len);
                let slot = &mut self.data[offset..offset + len];
                slot.fill(0);
                slot[..copy_len].copy_from_slice(&bytes[..copy_len]);
            }
            Value::Bool(v) => {
                self.data[offset] = *v as u8;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::value::DataType;

    fn sample_schema() -> Schema {
        Schema::new(
            vec!["a".to_string(), "b".to_string()],
            vec![DataType::Int, DataType::String],
            vec![0, 4],
            vec![0],
        )
    }

    #[test]
    fn set_then_get_round_trips_every_attribute() {
        let schema = sample_schema();
        let mut record = Record::create(&schema);
        record.set_attr(&schema, 0, &Value::Int(7)).unwrap();
        record
            .set_attr(&schema, 1, &Value::String("abcd".to_string()))
            .unwrap();

        assert_eq!(record.get_attr(&schema, 0).unwrap(), Value::Int(7));
        assert_eq!(
            record.get_attr(&schema, 1).unwrap(),
            Value::String("abcd".to_string())
        );
    }

    #[test]
    fn set_attr_rejects_type_mismatch() {
        let schema = sample_schema();
        let mut record = Record::create(&schema);
        assert!(matches!(
            record.set_attr(&schema, 0, &Value::Bool(true)),
            Err(StorageError::AttributeTypeMismatch(0))
        ));
    }

    #[test]
    fn string_shorter_than_type_length_is_nul_padded() {
        let schema = sample_schema();
        let mut record = Record::create(&schema);
        record
            .set_attr(&schema, 1, &Value::String("ab".to_string()))
            .unwrap();
        assert_eq!(
            record.get_attr(&schema, 1).unwrap(),
            Value::String("ab".to_string())
        );
    }
}
