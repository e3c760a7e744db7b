pub mod decode;
pub mod encode;
pub mod expander;

use std::collections::HashMap;

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::message::Section3;
use crate::tables::EffectiveTables;
use crate::value::Value;

use decode::{CompressedDecoder, Decoder};
use encode::Encoder;
use expander::Expander;

/// Decodes every subset of one message's §4 payload, replaying the same
/// expansion skeleton `subset_count` times (or once, for compressed §4).
pub fn decode_subsets(
    section3: &Section3,
    section4_data: &[u8],
    tables: &EffectiveTables,
) -> Result<Vec<Vec<(Descriptor, Value)>>> {
    if section3.compressed {
        let mut decoder = CompressedDecoder::new(section4_data, section3.subset_count as u32);
        let mut expander = Expander::new(&tables.table_b, &tables.table_d, &mut decoder);
        expander.run(&section3.descriptors)?;
        Ok(decoder.per_subset)
    } else {
        let mut decoder = Decoder::new(section4_data);
        let mut subsets = Vec::with_capacity(section3.subset_count as usize);
        for _ in 0..section3.subset_count {
            let start = decoder.output.len();
            let mut expander = Expander::new(&tables.table_b, &tables.table_d, &mut decoder);
            expander.run(&section3.descriptors)?;
            subsets.push(decoder.output[start..].to_vec());
        }
        Ok(subsets)
    }
}

/// Encodes one subset's `(descriptor, value)` stream, expanding the same
/// top-level descriptor list to know how to interpret each value, and
/// returns the packed bits for just that subset (the caller concatenates
/// subsets and byte-aligns the whole §4 payload).
pub fn encode_subset(
    descriptors: &[Descriptor],
    values: Vec<Value>,
    tables: &EffectiveTables,
) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(values);
    {
        let mut expander = Expander::new(&tables.table_b, &tables.table_d, &mut encoder);
        expander.run(descriptors)?;
    }
    Ok(encoder.into_bytes())
}

/// Encodes one subset by descriptor lookup rather than by position — the
/// shape the domain message builder uses (§4.5), since it knows which
/// quantities it has values for but not how a standard sequence expands
/// into elements.
pub fn encode_subset_keyed(
    descriptors: &[Descriptor],
    values: HashMap<Descriptor, Vec<Value>>,
    tables: &EffectiveTables,
) -> Result<Vec<u8>> {
    let mut encoder = Encoder::keyed(values);
    {
        let mut expander = Expander::new(&tables.table_b, &tables.table_d, &mut encoder);
        expander.run(descriptors)?;
    }
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::BitWriter;
    use crate::tables::{TableB, TableBEntry, TableD};

    fn width7_table() -> TableB {
        let mut tb = TableB::new();
        tb.insert(
            Descriptor::new(0, 1, 1),
            TableBEntry {
                name: "WMO BLOCK NUMBER".into(),
                unit: "NUMERIC".into(),
                scale: 0,
                reference: 0,
                width: 7,
            },
        );
        tb
    }

    #[test]
    fn minimal_decode_of_single_element() {
        let mut w = BitWriter::new();
        w.write_bits(3, 7);
        w.align_to_byte();
        let data = w.into_bytes();

        let tables = EffectiveTables {
            table_b: width7_table(),
            table_d: TableD::new(),
        };
        let section3 = Section3 {
            subset_count: 1,
            observed: true,
            compressed: false,
            descriptors: vec![Descriptor::new(0, 1, 1)],
        };
        let subsets = decode_subsets(&section3, &data, &tables).unwrap();
        assert_eq!(subsets.len(), 1);
        assert_eq!(
            subsets[0],
            vec![(Descriptor::new(0, 1, 1), Value::Numeric(3.0))]
        );
    }

    #[test]
    fn minimal_encode_matches_expected_bit_pattern() {
        let tables = EffectiveTables {
            table_b: width7_table(),
            table_d: TableD::new(),
        };
        let descriptors = vec![Descriptor::new(0, 1, 1)];
        let bytes = encode_subset(&descriptors, vec![Value::Numeric(3.0)], &tables).unwrap();
        assert_eq!(bytes[0] & 0b1111_1110, 0b0000_0110);
    }

    #[test]
    fn delayed_replication_reads_count_then_repeats() {
        let mut tb = TableB::new();
        tb.insert(
            Descriptor::new(0, 31, 1),
            TableBEntry {
                name: "DELAYED DESCRIPTOR REPLICATION FACTOR".into(),
                unit: "NUMERIC".into(),
                scale: 0,
                reference: 0,
                width: 8,
            },
        );
        tb.insert(
            Descriptor::new(0, 12, 101),
            TableBEntry {
                name: "TEMPERATURE".into(),
                unit: "K".into(),
                scale: 1,
                reference: 0,
                width: 12,
            },
        );

        let mut w = BitWriter::new();
        w.write_bits(2, 8); // replication count
        w.write_bits(100, 12); // first value
        w.write_bits(200, 12); // second value
        w.align_to_byte();
        let data = w.into_bytes();

        let tables = EffectiveTables {
            table_b: tb,
            table_d: TableD::new(),
        };
        let section3 = Section3 {
            subset_count: 1,
            observed: true,
            compressed: false,
            descriptors: vec![
                Descriptor::new(1, 1, 0),
                Descriptor::new(0, 31, 1),
                Descriptor::new(0, 12, 101),
            ],
        };
        let subsets = decode_subsets(&section3, &data, &tables).unwrap();
        assert_eq!(
            subsets[0],
            vec![
                (Descriptor::new(0, 31, 1), Value::Numeric(2.0)),
                (Descriptor::new(0, 12, 101), Value::Numeric(10.0)),
                (Descriptor::new(0, 12, 101), Value::Numeric(20.0)),
            ]
        );
    }
}
