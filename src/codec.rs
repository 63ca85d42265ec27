//! FieldRecord engine: decode/encode bit-packed records from their declarative schema.
//!
//! Decoding is a single forward pass in declaration order. Encoding is two passes:
//!
//! 1. **restriction** (reverse declaration order): every width field is recomputed as the
//!    minimum width covering the fields that name it, and every conditional group derives
//!    its flag from whether any data field inside it is present;
//! 2. **emission** (forward): bits are written using the widths and flags from pass 1.
//!
//! A width field is never data: a group holding only its width field is absent, and an
//! absent group is cleared, width field included. Re-encoding therefore narrows a record
//! that was read with an oversized width; [`EncodedRecord`] keeps the wire bytes of an
//! untouched record instead.

use crate::bits::{BitCursor, BitWriter};
use crate::error::MovieError;
use crate::schema::{FieldSpec, RecordKind, RecordSchema, Width};
use crate::value::{fixed_to_raw, raw_to_fixed};
use serde::{Deserialize, Serialize};

/// Field values of one record, indexed by the schema's slot layout. `None` is "absent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    kind: RecordKind,
    values: Vec<Option<i64>>,
}

fn slot(schema: &RecordSchema, name: &str) -> Result<usize, MovieError> {
    schema
        .slot(name)
        .ok_or_else(|| MovieError::Format(format!("{}: unknown field {}", schema.name, name)))
}

/// Whether some variable-width field in `fields` takes its width from `name`.
fn names_width(fields: &[FieldSpec], name: &str) -> bool {
    fields.iter().any(|f| match f {
        FieldSpec::Value { width: Width::Field(wf), .. } => *wf == name,
        FieldSpec::Value { .. } => false,
        FieldSpec::When { fields, .. } => names_width(fields, name),
    })
}

fn width_of(v: i64) -> Result<u32, MovieError> {
    u32::try_from(v).map_err(|_| MovieError::Format(format!("invalid bit width {}", v)))
}

impl Record {
    /// All fields absent.
    pub fn new(kind: RecordKind) -> Self {
        Record { kind, values: vec![None; kind.schema().slots.len()] }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn schema(&self) -> &'static RecordSchema {
        self.kind.schema()
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.schema().slot(name).and_then(|i| self.values[i])
    }

    pub fn set(&mut self, name: &str, value: Option<i64>) {
        match self.schema().slot(name) {
            Some(i) => self.values[i] = value,
            None => debug_assert!(false, "{}: unknown field {}", self.schema().name, name),
        }
    }

    pub fn get_fixed(&self, name: &str) -> Option<f64> {
        self.get(name).map(raw_to_fixed)
    }

    pub fn set_fixed(&mut self, name: &str, value: Option<f64>) {
        self.set(name, value.map(fixed_to_raw));
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).unwrap_or(0) != 0
    }

    /// Decode from the cursor's current bit position. The cursor is left unaligned.
    pub fn decode(kind: RecordKind, cursor: &mut BitCursor<'_>) -> Result<Self, MovieError> {
        let mut record = Record::new(kind);
        record.decode_fields(kind.schema().fields, cursor)?;
        Ok(record)
    }

    fn decode_fields(&mut self, fields: &[FieldSpec], cursor: &mut BitCursor<'_>) -> Result<(), MovieError> {
        let schema = self.schema();
        for f in fields {
            match f {
                FieldSpec::Value { name, codec, width } => {
                    let n = match width {
                        Width::Bits(n) => *n,
                        Width::Field(wf) => {
                            let w = self.values[slot(schema, wf)?].ok_or_else(|| {
                                MovieError::Format(format!("{}: width field {} not decoded", schema.name, wf))
                            })?;
                            width_of(w)?
                        }
                    };
                    let bits = cursor.read_bits(n)?;
                    self.values[slot(schema, name)?] = Some(codec.decode(bits));
                }
                FieldSpec::When { flag, equals, fields } => {
                    let set = self.values[slot(schema, flag)?].map(|v| v != 0).unwrap_or(false);
                    if set == *equals {
                        self.decode_fields(fields, cursor)?;
                    } else {
                        self.clear_fields(fields)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn clear_fields(&mut self, fields: &[FieldSpec]) -> Result<(), MovieError> {
        let schema = self.schema();
        for f in fields {
            match f {
                FieldSpec::Value { name, .. } => self.values[slot(schema, name)?] = None,
                FieldSpec::When { fields, .. } => self.clear_fields(fields)?,
            }
        }
        Ok(())
    }

    fn any_present(&self, fields: &[FieldSpec]) -> bool {
        let schema = self.schema();
        fields.iter().any(|f| match f {
            FieldSpec::Value { name, .. } if names_width(schema.fields, name) => false,
            FieldSpec::Value { name, .. } => schema.slot(name).and_then(|i| self.values[i]).is_some(),
            FieldSpec::When { fields, .. } => self.any_present(fields),
        })
    }

    /// Pass 1 of encoding: a copy with every flag and width field derived from the data.
    pub fn restricted(&self) -> Result<Record, MovieError> {
        let mut out = self.clone();
        out.reset_widths(self.schema().fields)?;
        out.restrict(self.schema().fields)?;
        Ok(out)
    }

    fn reset_widths(&mut self, fields: &[FieldSpec]) -> Result<(), MovieError> {
        let schema = self.schema();
        for f in fields {
            match f {
                FieldSpec::Value { width: Width::Field(wf), .. } => self.values[slot(schema, wf)?] = None,
                FieldSpec::Value { .. } => {}
                FieldSpec::When { fields, .. } => self.reset_widths(fields)?,
            }
        }
        Ok(())
    }

    fn restrict(&mut self, fields: &[FieldSpec]) -> Result<(), MovieError> {
        let schema = self.schema();
        for f in fields.iter().rev() {
            match f {
                FieldSpec::When { flag, equals, fields } => {
                    let present = self.any_present(fields);
                    let bit = if present { *equals } else { !*equals };
                    self.values[slot(schema, flag)?] = Some(bit as i64);
                    if present {
                        self.restrict(fields)?;
                    } else {
                        self.clear_fields(fields)?;
                    }
                }
                FieldSpec::Value { name, codec, width: Width::Field(wf) } => {
                    if let Some(v) = self.values[slot(schema, name)?] {
                        let need = codec.natural_width(v)? as i64;
                        let w = slot(schema, wf)?;
                        self.values[w] = Some(self.values[w].unwrap_or(0).max(need));
                    }
                }
                FieldSpec::Value { .. } => {}
            }
        }
        Ok(())
    }

    /// Both encoding passes, writing into `w` without trailing alignment.
    pub fn encode_bits(&self, w: &mut BitWriter) -> Result<(), MovieError> {
        let restricted = self.restricted()?;
        restricted.emit(self.schema().fields, w)
    }

    fn emit(&self, fields: &[FieldSpec], w: &mut BitWriter) -> Result<(), MovieError> {
        let schema = self.schema();
        for f in fields {
            match f {
                FieldSpec::Value { name, codec, width } => {
                    let n = match width {
                        Width::Bits(n) => *n,
                        Width::Field(wf) => width_of(self.values[slot(schema, wf)?].unwrap_or(0))?,
                    };
                    let v = self.values[slot(schema, name)?].unwrap_or(0);
                    w.write_bits(codec.encode(v, n)?);
                }
                FieldSpec::When { flag, equals, fields } => {
                    let set = self.values[slot(schema, flag)?].unwrap_or(0) != 0;
                    if set == *equals {
                        self.emit(fields, w)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Encode and pad to a byte boundary.
    pub fn encode(&self) -> Result<Vec<u8>, MovieError> {
        let mut w = BitWriter::new();
        self.encode_bits(&mut w)?;
        Ok(w.into_bytes())
    }
}

/// A record together with the exact bytes it occupies on the wire (byte-aligned after).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRecord {
    pub record: Record,
    pub bytes: Vec<u8>,
}

impl EncodedRecord {
    /// Decode at a byte boundary and align the cursor afterwards.
    pub fn decode(kind: RecordKind, cursor: &mut BitCursor<'_>) -> Result<Self, MovieError> {
        cursor.align_to_byte();
        let start = cursor.position();
        let record = Record::decode(kind, cursor)?;
        cursor.align_to_byte();
        let bytes = cursor.data()[start..cursor.position()].to_vec();
        Ok(EncodedRecord { record, bytes })
    }

    pub fn from_record(record: Record) -> Result<Self, MovieError> {
        let bytes = record.encode()?;
        Ok(EncodedRecord { record, bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rect_is_one_byte() {
        let mut r = Record::new(RecordKind::Rect);
        for f in ["x_min", "x_max", "y_min", "y_max"] {
            r.set(f, Some(0));
        }
        assert_eq!(r.encode().unwrap(), vec![0x00]);
        assert_eq!(r.restricted().unwrap().get("nbits"), Some(0));
    }

    #[test]
    fn rect_width_covers_every_bound() {
        let mut r = Record::new(RecordKind::Rect);
        r.set("x_min", Some(0));
        r.set("x_max", Some(11000));
        r.set("y_min", Some(-1));
        r.set("y_max", Some(8000));
        let bytes = r.encode().unwrap();
        // 11000 needs 15 bits signed
        assert_eq!(r.restricted().unwrap().get("nbits"), Some(15));
        assert_eq!(bytes.len(), (5 + 4 * 15 + 7) / 8);
        let mut c = BitCursor::new(&bytes);
        let back = Record::decode(RecordKind::Rect, &mut c).unwrap();
        assert_eq!(back.get("x_max"), Some(11000));
        assert_eq!(back.get("y_min"), Some(-1));
    }

    #[test]
    fn absent_group_clears_flag() {
        let mut m = Record::new(RecordKind::Matrix);
        m.set("translate_x", Some(20));
        m.set("translate_y", Some(-20));
        let r = m.restricted().unwrap();
        assert_eq!(r.get("has_scale"), Some(0));
        assert_eq!(r.get("has_rotate"), Some(0));
        assert_eq!(r.get("n_translate_bits"), Some(6));
    }

    #[test]
    fn present_group_sets_flag() {
        let mut m = Record::new(RecordKind::Matrix);
        m.set_fixed("scale_x", Some(2.0));
        m.set_fixed("scale_y", Some(0.5));
        let bytes = m.encode().unwrap();
        let mut c = BitCursor::new(&bytes);
        let back = Record::decode(RecordKind::Matrix, &mut c).unwrap();
        assert!(back.flag("has_scale"));
        assert_eq!(back.get_fixed("scale_x"), Some(2.0));
        assert_eq!(back.get_fixed("scale_y"), Some(0.5));
        assert_eq!(back.get("rotate_skew0"), None);
    }

    #[test]
    fn reencode_uses_minimum_width() {
        // nbits = 10 although every bound fits in 3 bits
        let mut w = BitWriter::new();
        w.write_bits(crate::value::Bits::new(10, 5));
        for _ in 0..4 {
            w.write_bits(crate::value::Bits::new(3, 10));
        }
        let bytes = w.into_bytes();
        let mut c = BitCursor::new(&bytes);
        let r = Record::decode(RecordKind::Rect, &mut c).unwrap();
        assert_eq!(r.get("nbits"), Some(10));
        assert_eq!(r.restricted().unwrap().get("nbits"), Some(3));
        assert_eq!(r.encode().unwrap().len(), (5 + 4 * 3 + 7) / 8);
    }

    #[test]
    fn stale_width_is_ignored() {
        let mut m = Record::new(RecordKind::Matrix);
        m.set("translate_x", Some(3));
        m.set("translate_y", Some(0));
        m.set("n_translate_bits", Some(40));
        assert_eq!(m.restricted().unwrap().get("n_translate_bits"), Some(3));
    }

    #[test]
    fn width_field_overflow_fails() {
        let mut m = Record::new(RecordKind::Matrix);
        m.set("translate_x", Some(1 << 40));
        m.set("translate_y", Some(0));
        assert!(matches!(m.encode(), Err(MovieError::Align { .. })));
    }

    #[test]
    fn cleared_scale_drops_group() {
        let mut m = Record::new(RecordKind::Matrix);
        m.set_fixed("scale_x", Some(2.0));
        m.set_fixed("scale_y", Some(0.5));
        m.set("translate_x", Some(40));
        m.set("translate_y", Some(0));
        let bytes = m.encode().unwrap();
        let mut decoded = Record::decode(RecordKind::Matrix, &mut BitCursor::new(&bytes)).unwrap();
        assert!(decoded.get("n_scale_bits").is_some());

        decoded.set("scale_x", None);
        decoded.set("scale_y", None);
        let r = decoded.restricted().unwrap();
        assert_eq!(r.get("has_scale"), Some(0));
        assert_eq!(r.get("n_scale_bits"), None);

        let back = Record::decode(RecordKind::Matrix, &mut BitCursor::new(&decoded.encode().unwrap())).unwrap();
        assert!(!back.flag("has_scale"));
        assert_eq!(back.get_fixed("scale_x"), None);
        assert_eq!(back.get("translate_x"), Some(40));
    }
}
