//! Section 0-5 framing for one BUFR edition-4 message (edition 3 tolerated
//! on input, per §1). All multi-byte integers are big-endian (§6.1).

use crate::descriptor::Descriptor;
use crate::error::{BufrError, Result};

const MAGIC: &[u8; 4] = b"BUFR";
const TERMINATOR: &[u8; 4] = b"7777";

fn be24(b: &[u8]) -> u32 {
    (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32
}

fn put_be24(out: &mut Vec<u8>, v: u32) {
    out.push((v >> 16) as u8);
    out.push((v >> 8) as u8);
    out.push(v as u8);
}

#[derive(Debug, Clone)]
pub struct Section0 {
    pub total_length: u32,
    pub edition: u8,
}

#[derive(Debug, Clone)]
pub struct Section1 {
    pub master_table: u8,
    pub centre: u16,
    pub sub_centre: u16,
    pub update_sequence: u8,
    pub has_section2: bool,
    pub data_category: u8,
    pub international_subcategory: u8,
    pub local_subcategory: u8,
    pub master_version: u8,
    pub local_version: u8,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[derive(Debug, Clone)]
pub struct Section2 {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Section3 {
    pub subset_count: u16,
    pub observed: bool,
    pub compressed: bool,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Clone)]
pub struct Section4 {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub section0: Section0,
    pub section1: Section1,
    pub section2: Option<Section2>,
    pub section3: Section3,
    pub section4: Section4,
}

impl Message {
    /// Parses one complete message starting at `bytes[0]`. `bytes` may
    /// contain trailing data belonging to the next message; only the
    /// section-0-declared length is consumed.
    pub fn parse(bytes: &[u8]) -> Result<Message> {
        if bytes.len() < 8 || &bytes[0..4] != MAGIC {
            return Err(BufrError::InvalidMagic);
        }
        let total_length = be24(&bytes[4..7]);
        let edition = bytes[7];
        if edition != 3 && edition != 4 {
            return Err(BufrError::InvalidEdition(edition));
        }
        if (total_length as usize) > bytes.len() {
            return Err(BufrError::TruncatedMessage);
        }
        let body = &bytes[..total_length as usize];

        let mut pos = 8usize;
        let (section1, consumed) = Self::parse_section1(&body[pos..])?;
        pos += consumed;

        let section2 = if section1.has_section2 {
            let (s2, consumed) = Self::parse_section2(&body[pos..])?;
            pos += consumed;
            Some(s2)
        } else {
            None
        };

        let (section3, consumed) = Self::parse_section3(&body[pos..])?;
        pos += consumed;

        let (section4, consumed) = Self::parse_section4(&body[pos..])?;
        pos += consumed;

        if body.len() < pos + 4 || &body[pos..pos + 4] != TERMINATOR {
            return Err(BufrError::InvalidTerminator);
        }

        Ok(Message {
            section0: Section0 {
                total_length,
                edition,
            },
            section1,
            section2,
            section3,
            section4,
        })
    }

    fn parse_section1(b: &[u8]) -> Result<(Section1, usize)> {
        if b.len() < 22 {
            return Err(BufrError::TruncatedMessage);
        }
        let length = be24(&b[0..3]) as usize;
        if b.len() < length {
            return Err(BufrError::TruncatedMessage);
        }
        let section1 = Section1 {
            master_table: b[3],
            centre: u16::from_be_bytes([b[4], b[5]]),
            sub_centre: u16::from_be_bytes([b[6], b[7]]),
            update_sequence: b[8],
            has_section2: b[9] & 0x80 != 0,
            data_category: b[10],
            international_subcategory: b[11],
            local_subcategory: b[12],
            master_version: b[13],
            local_version: b[14],
            year: u16::from_be_bytes([b[15], b[16]]),
            month: b[17],
            day: b[18],
            hour: b[19],
            minute: b[20],
            second: b[21],
        };
        Ok((section1, length))
    }

    fn parse_section2(b: &[u8]) -> Result<(Section2, usize)> {
        if b.len() < 4 {
            return Err(BufrError::TruncatedMessage);
        }
        let length = be24(&b[0..3]) as usize;
        if b.len() < length {
            return Err(BufrError::TruncatedMessage);
        }
        Ok((
            Section2 {
                data: b[4..length].to_vec(),
            },
            length,
        ))
    }

    fn parse_section3(b: &[u8]) -> Result<(Section3, usize)> {
        if b.len() < 7 {
            return Err(BufrError::TruncatedMessage);
        }
        let length = be24(&b[0..3]) as usize;
        if b.len() < length {
            return Err(BufrError::TruncatedMessage);
        }
        let subset_count = u16::from_be_bytes([b[4], b[5]]);
        let flags = b[6];
        let observed = flags & 0x80 != 0;
        let compressed = flags & 0x40 != 0;
        let descriptor_bytes = &b[7..length];
        let mut descriptors = Vec::with_capacity(descriptor_bytes.len() / 2);
        for chunk in descriptor_bytes.chunks(2) {
            if chunk.len() < 2 {
                break;
            }
            let raw = u16::from_be_bytes([chunk[0], chunk[1]]);
            descriptors.push(Descriptor::from_packed(raw));
        }
        Ok((
            Section3 {
                subset_count,
                observed,
                compressed,
                descriptors,
            },
            length,
        ))
    }

    fn parse_section4(b: &[u8]) -> Result<(Section4, usize)> {
        if b.len() < 4 {
            return Err(BufrError::TruncatedMessage);
        }
        let length = be24(&b[0..3]) as usize;
        if b.len() < length {
            return Err(BufrError::TruncatedMessage);
        }
        Ok((
            Section4 {
                data: b[4..length].to_vec(),
            },
            length,
        ))
    }

    /// Encodes sections 0-5 into a byte stream, computing every section
    /// length and the section-0 total length from the actual encoded sizes
    /// (§8's "section length consistency" property).
    pub fn encode(
        section1: &Section1,
        section2: Option<&Section2>,
        section3: &Section3,
        section4_payload: &[u8],
    ) -> Vec<u8> {
        let mut s1 = Vec::new();
        put_be24(&mut s1, 0); // patched below
        s1.push(section1.master_table);
        s1.extend_from_slice(&section1.centre.to_be_bytes());
        s1.extend_from_slice(&section1.sub_centre.to_be_bytes());
        s1.push(section1.update_sequence);
        s1.push(if section2.is_some() { 0x80 } else { 0x00 });
        s1.push(section1.data_category);
        s1.push(section1.international_subcategory);
        s1.push(section1.local_subcategory);
        s1.push(section1.master_version);
        s1.push(section1.local_version);
        s1.extend_from_slice(&section1.year.to_be_bytes());
        s1.push(section1.month);
        s1.push(section1.day);
        s1.push(section1.hour);
        s1.push(section1.minute);
        s1.push(section1.second);
        patch_length(&mut s1);

        let s2 = section2.map(|s2| {
            let mut out = Vec::new();
            put_be24(&mut out, 0);
            out.push(0);
            out.extend_from_slice(&s2.data);
            patch_length(&mut out);
            out
        });

        let mut s3 = Vec::new();
        put_be24(&mut s3, 0);
        s3.push(0);
        s3.extend_from_slice(&section3.subset_count.to_be_bytes());
        let mut flags = 0u8;
        if section3.observed {
            flags |= 0x80;
        }
        if section3.compressed {
            flags |= 0x40;
        }
        s3.push(flags);
        for d in &section3.descriptors {
            s3.extend_from_slice(&d.to_packed().to_be_bytes());
        }
        if s3.len() % 2 != 0 {
            s3.push(0);
        }
        patch_length(&mut s3);

        let mut s4 = Vec::new();
        put_be24(&mut s4, 0);
        s4.push(0);
        s4.extend_from_slice(section4_payload);
        patch_length(&mut s4);

        let mut total_len = 8 + s1.len() + s2.as_ref().map_or(0, Vec::len) + s3.len() + s4.len() + 4;
        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(MAGIC);
        put_be24(&mut out, total_len as u32);
        out.push(4);
        out.extend_from_slice(&s1);
        if let Some(s2) = &s2 {
            out.extend_from_slice(s2);
        }
        out.extend_from_slice(&s3);
        out.extend_from_slice(&s4);
        out.extend_from_slice(TERMINATOR);

        debug_assert_eq!(out.len(), total_len);
        total_len = out.len();
        let _ = total_len;
        out
    }

    /// Finds the byte offset of the next `BUFR` magic at or after `from`,
    /// used to resynchronise after a message-level decode error (§7).
    pub fn find_next_magic(bytes: &[u8], from: usize) -> Option<usize> {
        if from >= bytes.len() {
            return None;
        }
        bytes[from..]
            .windows(4)
            .position(|w| w == MAGIC)
            .map(|p| p + from)
    }
}

fn patch_length(section: &mut [u8]) {
    let len = section.len() as u32;
    section[0] = (len >> 16) as u8;
    section[1] = (len >> 8) as u8;
    section[2] = len as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_section1() -> Section1 {
        Section1 {
            master_table: 0,
            centre: 98,
            sub_centre: 0,
            update_sequence: 0,
            has_section2: false,
            data_category: 0,
            international_subcategory: 0,
            local_subcategory: 0,
            master_version: 34,
            local_version: 0,
            year: 2024,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    #[test]
    fn encode_then_parse_round_trips_sections() {
        let section1 = sample_section1();
        let section3 = Section3 {
            subset_count: 1,
            observed: true,
            compressed: false,
            descriptors: vec![Descriptor::new(0, 1, 1)],
        };
        let bytes = Message::encode(&section1, None, &section3, &[0u8; 3]);
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(&bytes[bytes.len() - 4..], TERMINATOR);

        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.section1.centre, 98);
        assert_eq!(msg.section1.master_version, 34);
        assert_eq!(msg.section3.subset_count, 1);
        assert_eq!(msg.section3.descriptors, vec![Descriptor::new(0, 1, 1)]);
        assert_eq!(msg.section0.total_length as usize, bytes.len());
    }

    #[test]
    fn rejects_bad_terminator() {
        let section1 = sample_section1();
        let section3 = Section3 {
            subset_count: 1,
            observed: false,
            compressed: false,
            descriptors: vec![],
        };
        let mut bytes = Message::encode(&section1, None, &section3, &[]);
        let last = bytes.len() - 1;
        bytes[last] = b'8';
        assert!(matches!(
            Message::parse(&bytes),
            Err(BufrError::InvalidTerminator)
        ));
    }
}
