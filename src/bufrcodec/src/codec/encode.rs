use std::collections::{HashMap, VecDeque};

use crate::bitio::{missing_sentinel, BitWriter};
use crate::descriptor::Descriptor;
use crate::error::{BufrError, Result};
use crate::tables::TableB;
use crate::value::Value;

use super::expander::{ElementSink, OperatorState};

/// Where an [`Encoder`] draws the value for the next element it is asked
/// to write.
enum ValueSource {
    /// Values are consumed strictly in expansion order — the shape used by
    /// generic codec-level callers that already know the exact sequence.
    Sequential(VecDeque<Value>),
    /// Values are looked up by descriptor and popped from a per-descriptor
    /// queue, defaulting to [`Value::Missing`] once a descriptor's queue is
    /// exhausted (or was never supplied) — the shape the domain message
    /// builder uses, since it does not track how a standard sequence
    /// expands, only which quantities it has values for (§4.5). A
    /// descriptor visited more than once (inside a delayed-replication
    /// group) draws successive values off its queue in order.
    Keyed(HashMap<Descriptor, VecDeque<Value>>),
}

/// Encodes a pre-built value stream back into packed bits. The dual of
/// [`super::decode::Decoder`]: where decode reads bits and derives a
/// value, encode looks up the next supplied value and derives bits.
pub struct Encoder {
    writer: BitWriter,
    values: ValueSource,
}

impl Encoder {
    pub fn new(values: Vec<Value>) -> Self {
        Encoder {
            writer: BitWriter::new(),
            values: ValueSource::Sequential(values.into()),
        }
    }

    /// Builds an encoder that resolves each element by its descriptor
    /// rather than by position, emitting MISSING for any descriptor the
    /// caller never supplied (or whose queue has run dry).
    pub fn keyed(values: HashMap<Descriptor, Vec<Value>>) -> Self {
        let values = values.into_iter().map(|(k, v)| (k, v.into())).collect();
        Encoder {
            writer: BitWriter::new(),
            values: ValueSource::Keyed(values),
        }
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.writer.align_to_byte();
        self.writer.into_bytes()
    }

    fn next_value(&mut self, descriptor: Descriptor) -> Result<Value> {
        match &mut self.values {
            ValueSource::Sequential(q) => q.pop_front().ok_or(BufrError::TruncatedMessage),
            ValueSource::Keyed(m) => Ok(m
                .get_mut(&descriptor)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Value::Missing)),
        }
    }

    fn element_width(&self, entry: &crate::tables::TableBEntry, op: &OperatorState) -> u32 {
        if entry.is_ia5() {
            if op.character_width_override > 0 {
                op.character_width_override * 8
            } else {
                entry.width
            }
        } else {
            (entry.width as i64 + op.width_delta as i64).max(0) as u32
        }
    }

    fn write_value(
        &mut self,
        descriptor: Descriptor,
        entry: &crate::tables::TableBEntry,
        op: &OperatorState,
        value: &Value,
    ) -> Result<()> {
        let width = self.element_width(entry, op);
        if value.is_missing() {
            self.writer.write_bits(missing_sentinel(width), width);
            return Ok(());
        }
        match value {
            Value::Text(s) => {
                let octets = (width / 8) as usize;
                let mut bytes = s.as_bytes().to_vec();
                bytes.resize(octets, b' ');
                bytes.truncate(octets);
                let mut raw: u64 = 0;
                for b in &bytes {
                    raw = (raw << 8) | *b as u64;
                }
                self.writer.write_bits(raw, width);
            }
            Value::Code(c) => {
                self.writer.write_bits(*c, width);
            }
            Value::Numeric(v) => {
                let reference = op
                    .reference_delta_map
                    .get(&descriptor)
                    .copied()
                    .unwrap_or(entry.reference);
                let scale = entry.scale + op.scale_delta;
                let scaled = v * 10f64.powi(scale) - reference as f64;
                let raw = scaled.trunc() as i64;
                let max = missing_sentinel(width) as i64 - 1;
                let clamped = raw.clamp(0, max) as u64;
                self.writer.write_bits(clamped, width);
            }
            Value::Missing => unreachable!("handled above"),
        }
        Ok(())
    }
}

impl ElementSink for Encoder {
    fn element(
        &mut self,
        descriptor: Descriptor,
        table_b: &TableB,
        op: &mut OperatorState,
    ) -> Result<()> {
        if op.new_reference_width > 0 {
            let value = self.next_value(descriptor)?;
            let raw = value.as_f64().unwrap_or(0.0) as i64;
            op.reference_delta_map.insert(descriptor, raw);
            let width = op.new_reference_width;
            let sign_bit = 1u64 << (width - 1);
            let magnitude = raw.unsigned_abs();
            let packed = if raw < 0 { sign_bit | magnitude } else { magnitude };
            self.writer.write_bits(packed, width);
            return Ok(());
        }

        if op.data_not_present_count > 0 {
            op.data_not_present_count -= 1;
            let _ = self.next_value(descriptor);
            let entry = table_b
                .get(descriptor)
                .ok_or(BufrError::UnknownDescriptor(descriptor.as_fxxyyy_num()))?;
            let width = self.element_width(entry, op);
            self.writer.write_bits(missing_sentinel(width), width);
            return Ok(());
        }

        if op.associated_field_width > 0 {
            self.writer.write_bits(0, op.associated_field_width);
        }

        let entry = table_b
            .get(descriptor)
            .ok_or(BufrError::UnknownDescriptor(descriptor.as_fxxyyy_num()))?
            .clone();
        let value = self.next_value(descriptor)?;
        self.write_value(descriptor, &entry, op, &value)
    }

    fn replication_count(
        &mut self,
        descriptor: Descriptor,
        table_b: &TableB,
        op: &mut OperatorState,
    ) -> Result<u32> {
        let entry = table_b
            .get(descriptor)
            .ok_or(BufrError::UnknownDescriptor(descriptor.as_fxxyyy_num()))?
            .clone();
        let value = self.next_value(descriptor)?;
        let count = value.as_f64().unwrap_or(0.0) as u32;
        self.write_value(descriptor, &entry, op, &value)?;
        Ok(count)
    }

    fn inline_text(&mut self, width_octets: u8) -> Result<()> {
        let width = width_octets as u32 * 8;
        let descriptor = Descriptor::new(0, 5, width_octets);
        let value = self.next_value(descriptor)?;
        match value {
            Value::Text(s) => {
                let octets = width_octets as usize;
                let mut bytes = s.as_bytes().to_vec();
                bytes.resize(octets, b' ');
                bytes.truncate(octets);
                let mut raw: u64 = 0;
                for b in &bytes {
                    raw = (raw << 8) | *b as u64;
                }
                self.writer.write_bits(raw, width);
            }
            _ => {
                self.writer.write_bits(missing_sentinel(width), width);
            }
        }
        Ok(())
    }
}
