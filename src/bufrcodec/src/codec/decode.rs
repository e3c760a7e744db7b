use crate::bitio::{missing_sentinel, BitReader};
use crate::descriptor::Descriptor;
use crate::error::{BufrError, Result};
use crate::tables::TableB;
use crate::value::Value;

use super::expander::{ElementSink, OperatorState};

/// Decodes one subset's worth of element values from a bit stream, per the
/// six-step rule in §4.4 ("Decode of one F=0 value").
pub struct Decoder<'a> {
    reader: BitReader<'a>,
    pub output: Vec<(Descriptor, Value)>,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder {
            reader: BitReader::new(data),
            output: Vec::new(),
        }
    }

    fn read_raw(&mut self, width: u32) -> Result<u64> {
        self.reader.read_bits(width).map_err(|_| BufrError::TruncatedMessage)
    }

    fn read_signed(&mut self, width: u32) -> Result<i64> {
        let raw = self.read_raw(width)?;
        // BUFR signed raw fields (new-reference redefinition) use sign +
        // magnitude: the top bit is the sign, not two's complement.
        let sign_bit = 1u64 << (width - 1);
        if raw & sign_bit != 0 {
            Ok(-((raw & !sign_bit) as i64))
        } else {
            Ok(raw as i64)
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

    fn decode_numeric(
        &mut self,
        descriptor: Descriptor,
        entry: &crate::tables::TableBEntry,
        op: &OperatorState,
    ) -> Result<Value> {
        let width = self.element_width(entry, op);
        let raw = self.read_raw(width)?;
        if raw == missing_sentinel(width) {
            return Ok(Value::Missing);
        }
        if entry.is_ia5() {
            let mut bytes = Vec::with_capacity((width / 8) as usize);
            let octets = width / 8;
            // Already consumed as one big read_raw above for simplicity:
            // re-derive bytes from `raw`.
            for i in (0..octets).rev() {
                bytes.push(((raw >> (i * 8)) & 0xFF) as u8);
            }
            let text = String::from_utf8_lossy(&bytes).trim_end().to_string();
            return Ok(Value::Text(text));
        }
        if entry.is_code_or_flag() {
            return Ok(Value::Code(raw));
        }
        let reference = op
            .reference_delta_map
            .get(&descriptor)
            .copied()
            .unwrap_or(entry.reference);
        let scale = entry.scale + op.scale_delta;
        let value = (raw as i64 + reference) as f64 * 10f64.powi(-scale);
        Ok(Value::Numeric(value))
    }
}

impl<'a> ElementSink for Decoder<'a> {
    fn element(
        &mut self,
        descriptor: Descriptor,
        table_b: &TableB,
        op: &mut OperatorState,
    ) -> Result<()> {
        if op.new_reference_width > 0 {
            let raw = self.read_signed(op.new_reference_width)?;
            op.reference_delta_map.insert(descriptor, raw);
            return Ok(());
        }

        if op.data_not_present_count > 0 {
            op.data_not_present_count -= 1;
            self.output.push((descriptor, Value::Missing));
            return Ok(());
        }

        if op.associated_field_width > 0 {
            let _quality = self.read_raw(op.associated_field_width)?;
        }

        let entry = table_b
            .get(descriptor)
            .ok_or(BufrError::UnknownDescriptor(descriptor.as_fxxyyy_num()))?;
        let value = self.decode_numeric(descriptor, entry, op)?;
        self.output.push((descriptor, value));
        Ok(())
    }

    fn replication_count(
        &mut self,
        descriptor: Descriptor,
        table_b: &TableB,
        op: &mut OperatorState,
    ) -> Result<u32> {
        let entry = table_b
            .get(descriptor)
            .ok_or(BufrError::UnknownDescriptor(descriptor.as_fxxyyy_num()))?;
        let value = self.decode_numeric(descriptor, entry, op)?;
        let count = match &value {
            Value::Numeric(v) => *v as u32,
            Value::Code(v) => *v as u32,
            Value::Missing => 0,
            Value::Text(_) => 0,
        };
        self.output.push((descriptor, value));
        Ok(count)
    }

    fn inline_text(&mut self, width_octets: u8) -> Result<()> {
        let width = width_octets as u32 * 8;
        let raw = self.read_raw(width)?;
        let descriptor = Descriptor::new(0, 5, width_octets);
        let value = if raw == missing_sentinel(width) {
            Value::Missing
        } else {
            let mut bytes = Vec::with_capacity(width_octets as usize);
            for i in (0..width_octets as u32).rev() {
                bytes.push(((raw >> (i * 8)) & 0xFF) as u8);
            }
            Value::Text(String::from_utf8_lossy(&bytes).trim_end().to_string())
        };
        self.output.push((descriptor, value));
        Ok(())
    }
}

/// Decodes one subset of a compressed §4 block (decode-only, §4.4): each
/// element writes a base value at its declared width, a 6-bit increment
/// width, then one increment per subset.
pub struct CompressedDecoder<'a> {
    reader: BitReader<'a>,
    subset_count: u32,
    pub per_subset: Vec<Vec<(Descriptor, Value)>>,
}

impl<'a> CompressedDecoder<'a> {
    pub fn new(data: &'a [u8], subset_count: u32) -> Self {
        CompressedDecoder {
            reader: BitReader::new(data),
            subset_count,
            per_subset: (0..subset_count).map(|_| Vec::new()).collect(),
        }
    }

    fn read_raw(&mut self, width: u32) -> Result<u64> {
        self.reader.read_bits(width).map_err(|_| BufrError::TruncatedMessage)
    }

    fn decode_one(
        &mut self,
        descriptor: Descriptor,
        entry: &crate::tables::TableBEntry,
        op: &OperatorState,
    ) -> Result<()> {
        let width = if entry.is_ia5() {
            if op.character_width_override > 0 {
                op.character_width_override * 8
            } else {
                entry.width
            }
        } else {
            (entry.width as i64 + op.width_delta as i64).max(0) as u32
        };

        let base = self.read_raw(width)?;
        let inc_width = self.read_raw(6)? as u32;
        let base_missing = base == missing_sentinel(width);

        for i in 0..self.subset_count {
            let value = if inc_width == 0 {
                self.raw_to_value(descriptor, entry, op, base, width, base_missing)
            } else {
                let inc = self.read_raw(inc_width)?;
                if base_missing || inc == missing_sentinel(inc_width) {
                    Value::Missing
                } else {
                    self.raw_to_value(descriptor, entry, op, base + inc, width, false)
                }
            };
            self.per_subset[i as usize].push((descriptor, value));
        }
        Ok(())
    }

    fn raw_to_value(
        &self,
        descriptor: Descriptor,
        entry: &crate::tables::TableBEntry,
        op: &OperatorState,
        raw: u64,
        width: u32,
        force_missing: bool,
    ) -> Value {
        if force_missing || raw == missing_sentinel(width) {
            return Value::Missing;
        }
        if entry.is_ia5() {
            let octets = width / 8;
            let mut bytes = Vec::with_capacity(octets as usize);
            for i in (0..octets).rev() {
                bytes.push(((raw >> (i * 8)) & 0xFF) as u8);
            }
            return Value::Text(String::from_utf8_lossy(&bytes).trim_end().to_string());
        }
        if entry.is_code_or_flag() {
            return Value::Code(raw);
        }
        let reference = op
            .reference_delta_map
            .get(&descriptor)
            .copied()
            .unwrap_or(entry.reference);
        let scale = entry.scale + op.scale_delta;
        Value::Numeric((raw as i64 + reference) as f64 * 10f64.powi(-scale))
    }
}

impl<'a> ElementSink for CompressedDecoder<'a> {
    fn element(
        &mut self,
        descriptor: Descriptor,
        table_b: &TableB,
        op: &mut OperatorState,
    ) -> Result<()> {
        if op.data_not_present_count > 0 {
            op.data_not_present_count -= 1;
            for subset in self.per_subset.iter_mut() {
                subset.push((descriptor, Value::Missing));
            }
            return Ok(());
        }
        let entry = table_b
            .get(descriptor)
            .ok_or(BufrError::UnknownDescriptor(descriptor.as_fxxyyy_num()))?
            .clone();
        self.decode_one(descriptor, &entry, op)
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
        self.decode_one(descriptor, &entry, op)?;
        let first = self.per_subset[0]
            .last()
            .map(|(_, v)| v.as_f64().unwrap_or(0.0) as u32)
            .unwrap_or(0);
        Ok(first)
    }

    fn inline_text(&mut self, width_octets: u8) -> Result<()> {
        let width = width_octets as u32 * 8;
        let base = self.read_raw(width)?;
        let inc_width = self.read_raw(6)? as u32;
        let descriptor = Descriptor::new(0, 5, width_octets);
        for i in 0..self.subset_count {
            let value = if inc_width == 0 {
                if base == missing_sentinel(width) {
                    Value::Missing
                } else {
                    let mut bytes = Vec::with_capacity(width_octets as usize);
                    for j in (0..width_octets as u32).rev() {
                        bytes.push(((base >> (j * 8)) & 0xFF) as u8);
                    }
                    Value::Text(String::from_utf8_lossy(&bytes).trim_end().to_string())
                }
            } else {
                let _inc = self.read_raw(inc_width)?;
                Value::Missing
            };
            self.per_subset[i as usize].push((descriptor, value));
        }
        Ok(())
    }
}
