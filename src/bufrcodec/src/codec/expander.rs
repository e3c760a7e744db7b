//! Descriptor expansion: walks a top-level descriptor list, substituting
//! Table D sequences, honouring Class 2 operators, and applying Class 1
//! replication, driving an [`ElementSink`] for every resulting F=0 element.
//!
//! Expansion and the bit-level codec are interleaved rather than separate
//! passes: delayed replication (`1 X 0`) needs the replication count that
//! only the bit stream (decode) or the caller's value sequence (encode)
//! can supply, so the walker calls back into the codec side for every
//! leaf element and for every replication-count read.

use std::collections::HashMap;

use crate::descriptor::Descriptor;
use crate::error::{BufrError, Result};
use crate::tables::{TableB, TableD};
use crate::value::Value;

/// Operator state threaded linearly through the whole expansion. It is not
/// scoped to Table D nesting: an operator set inside a sub-sequence remains
/// in force after that sequence returns, exactly like the real bit stream.
#[derive(Debug, Clone, Default)]
pub struct OperatorState {
    pub width_delta: i32,
    pub scale_delta: i32,
    pub reference_delta_map: HashMap<Descriptor, i64>,
    pub new_reference_width: u32,
    pub associated_field_width: u32,
    pub data_not_present_count: u32,
    pub character_width_override: u32,
}

/// Callback surface the walker drives for every leaf of the expansion.
/// Implemented once for decode (reads bits) and once for encode (writes
/// bits, consuming the caller-supplied value sequence).
pub trait ElementSink {
    /// Handles one F=0 element (not a replication-count trigger).
    /// `table_b` is `None` when the descriptor has no Table B entry and is
    /// not itself a code/flag table reference (local-width IA5 descriptor,
    /// e.g.) — the sink decides whether that is an error.
    fn element(
        &mut self,
        descriptor: Descriptor,
        table_b: &TableB,
        op: &mut OperatorState,
    ) -> Result<()>;

    /// Handles the `0 31 Y` descriptor that supplies a delayed-replication
    /// count. Always delivered, even if `data_not_present_count` is active.
    /// Returns the replication count.
    fn replication_count(
        &mut self,
        descriptor: Descriptor,
        table_b: &TableB,
        op: &mut OperatorState,
    ) -> Result<u32>;

    /// Handles `2 05 Y`: the operator itself carries `Y` octets of inline
    /// IA5 text for the synthetic descriptor `0 05 Y`.
    fn inline_text(&mut self, width_octets: u8) -> Result<()>;
}

fn replication_width(y: u8) -> Option<u32> {
    match y {
        0 => Some(8),
        1 => Some(16),
        2 => Some(1),
        _ => None,
    }
}

pub struct Expander<'a, S: ElementSink> {
    table_b: &'a TableB,
    table_d: &'a TableD,
    sink: &'a mut S,
    op: OperatorState,
    visiting: Vec<Descriptor>,
}

impl<'a, S: ElementSink> Expander<'a, S> {
    pub fn new(table_b: &'a TableB, table_d: &'a TableD, sink: &'a mut S) -> Self {
        Expander {
            table_b,
            table_d,
            sink,
            op: OperatorState::default(),
            visiting: Vec::new(),
        }
    }

    pub fn run(&mut self, top_level: &[Descriptor]) -> Result<()> {
        self.walk(top_level, 0)
    }

    fn walk(&mut self, descriptors: &[Descriptor], depth: u32) -> Result<()> {
        if depth > 64 {
            return Err(BufrError::DescriptorCycle(
                self.visiting.last().copied().unwrap_or(Descriptor::new(0, 0, 0)).as_fxxyyy_num(),
            ));
        }
        let mut i = 0usize;
        while i < descriptors.len() {
            let d = descriptors[i];
            match d.f {
                0 => {
                    // `0 00 000` is the domain builder's terminating-zero
                    // marker (§4.5), not a real element — it carries no
                    // Table B entry and no bits.
                    if d.x != 0 || d.y != 0 {
                        self.sink.element(d, self.table_b, &mut self.op)?;
                    }
                    i += 1;
                }
                1 => {
                    let x = d.x as usize;
                    if d.y > 0 {
                        // Fixed replication: the next `x` descriptors form
                        // the repeated group, repeated `y` times.
                        let body_end = i + 1 + x;
                        if body_end > descriptors.len() {
                            return Err(BufrError::UnknownDescriptor(d.as_fxxyyy_num()));
                        }
                        let body = &descriptors[i + 1..body_end];
                        let count = d.y as usize;
                        for _ in 0..count {
                            self.walk(body, depth + 1)?;
                        }
                        i = body_end;
                    } else {
                        // Delayed replication: the descriptor immediately
                        // following is the count trigger (`0 31 y'`); the
                        // `x` descriptors after THAT are the repeated
                        // group, so `x + 1` descriptors total are consumed
                        // here (not `x`).
                        let body_end = i + 1 + 1 + x;
                        if body_end > descriptors.len() {
                            return Err(BufrError::UnknownDescriptor(d.as_fxxyyy_num()));
                        }
                        let body = &descriptors[i + 1..body_end];
                        let trigger = body[0];
                        let _width = replication_width(trigger.y)
                            .ok_or(BufrError::UnknownDescriptor(trigger.as_fxxyyy_num()))?;
                        if !(trigger.f == 0 && trigger.x == 31) {
                            return Err(BufrError::UnknownDescriptor(trigger.as_fxxyyy_num()));
                        }
                        let count = self
                            .sink
                            .replication_count(trigger, self.table_b, &mut self.op)?;
                        let inner = &body[1..];
                        for _ in 0..count {
                            self.walk(inner, depth + 1)?;
                        }
                        i = body_end;
                    }
                }
                2 => {
                    self.apply_operator(d)?;
                    i += 1;
                }
                3 => {
                    if self.visiting.contains(&d) {
                        return Err(BufrError::DescriptorCycle(d.as_fxxyyy_num()));
                    }
                    let children = self
                        .table_d
                        .get(d)
                        .ok_or(BufrError::UnknownDescriptor(d.as_fxxyyy_num()))?
                        .to_vec();
                    self.visiting.push(d);
                    self.walk(&children, depth + 1)?;
                    self.visiting.pop();
                    i += 1;
                }
                _ => unreachable!("descriptor F is 2 bits"),
            }
        }
        Ok(())
    }

    fn apply_operator(&mut self, d: Descriptor) -> Result<()> {
        match d.x {
            1 => {
                self.op.width_delta = if d.y == 0 { 0 } else { d.y as i32 - 128 };
            }
            2 => {
                self.op.scale_delta = if d.y == 0 { 0 } else { d.y as i32 - 128 };
            }
            3 => {
                if d.y == 0 {
                    self.op.new_reference_width = 0;
                    self.op.reference_delta_map.clear();
                } else {
                    self.op.new_reference_width = d.y as u32;
                }
            }
            4 => {
                self.op.associated_field_width = d.y as u32;
            }
            5 => {
                if d.y > 0 {
                    self.sink.inline_text(d.y)?;
                }
            }
            6 => {
                self.op.character_width_override = d.y as u32;
            }
            7 => {
                // "increase scale, reference and width simultaneously":
                // applies the same Y to scale_delta and width_delta; the
                // reference adjustment is folded in at decode/encode time
                // via `reference + y * 2^(old_scale)` per the WMO Manual,
                // which is out of this contract's numeric detail (§9).
                self.op.scale_delta += d.y as i32;
                self.op.width_delta += d.y as i32;
            }
            8 => {
                self.op.character_width_override = if d.y == 0 { 0 } else { d.y as u32 };
            }
            21 => {
                self.op.data_not_present_count = d.y as u32;
            }
            22..=37 => {
                // Quality indicator / substituted value / first-order
                // statistics subsections: tracked as annotations only.
            }
            _ => {}
        }
        Ok(())
    }
}
