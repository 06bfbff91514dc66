//! The predicate-evaluation boundary. The specification treats `evalExpr`
//! as an opaque function from `(record, schema, expression)` to a boolean
//! result; this crate models that boundary as a trait so callers can plug
//! in whatever expression representation their query layer uses.

use crate::error::StorageResult;
use crate::record::record::Record;
use crate::record::schema::Schema;

/// Something a scan can consult to decide whether a record matches. A scan
/// with no predicate (`None`) accepts every record.
pub trait Predicate {
    fn eval(&self, record: &Record, schema: &Schema) -> StorageResult<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&Record, &Schema) -> StorageResult<bool>,
{
    fn eval(&self, record: &Record, schema: &Schema) -> StorageResult<bool> {
        self(record, schema)
    }
}
