//! Program serialization (in-scope half of spec §6): a `postcard`-encoded
//! payload plus length-delimited stream framing. The protobuf wire schema
//! some corpus stores use is an external contract and out of scope; this
//! module owns only a round-trippable encoding of the same logical fields
//! (`uuid`, `code`, `type_collection_status`, `comments`, `parent`).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ir::instruction::{Instruction, Variable};
use crate::ir::opcode::Opcode;
use crate::ir::program::{Program, TypeCollectionStatus};

#[derive(Debug, Error)]
pub enum CorruptSerialization {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream declared payload length {declared} but only {available} bytes padded-available")]
    LengthMismatch { declared: u32, available: usize },

    #[error("postcard decode failed: {0}")]
    Decode(#[from] postcard::Error),
}

pub type SerializationResult<T> = Result<T, CorruptSerialization>;

/// Serde mirror of [`Instruction`]; `Instruction`'s real fields are
/// private so inputs/outputs/inner_outputs are reconstructed through
/// `Instruction::new` on decode rather than serialized as one opaque
/// `inouts` vector (keeps the wire format stable under constructor
/// changes).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireInstruction {
    opcode: Opcode,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    inner_outputs: Vec<Variable>,
    index: usize,
}

impl From<&Instruction> for WireInstruction {
    fn from(instr: &Instruction) -> Self {
        WireInstruction {
            opcode: instr.opcode.clone(),
            inputs: instr.inputs().to_vec(),
            outputs: instr.outputs().to_vec(),
            inner_outputs: instr.inner_outputs().to_vec(),
            index: instr.index,
        }
    }
}

impl From<WireInstruction> for Instruction {
    fn from(wire: WireInstruction) -> Self {
        Instruction::new(wire.opcode, wire.inputs, wire.outputs, wire.inner_outputs, wire.index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireProgram {
    id: Uuid,
    code: Vec<WireInstruction>,
    type_collection_status: bool,
    comments: HashMap<usize, String>,
    parent: Option<Box<WireProgram>>,
}

impl WireProgram {
    fn from_program(program: &Program) -> Self {
        WireProgram {
            id: program.id(),
            code: program.code().iter().map(WireInstruction::from).collect(),
            type_collection_status: matches!(program.type_collection_status, TypeCollectionStatus::Collected),
            comments: program.comments.clone(),
            parent: program.parent().map(|p| Box::new(WireProgram::from_program(p))),
        }
    }

    fn into_program(self) -> Program {
        let code = self.code.into_iter().map(Instruction::from).collect();
        let mut program = Program::new(code);
        program.type_collection_status =
            if self.type_collection_status { TypeCollectionStatus::Collected } else { TypeCollectionStatus::NotCollected };
        program.comments = self.comments;
        if let Some(parent) = self.parent {
            program = program.with_parent(Arc::new(parent.into_program()));
        }
        program
    }
}

/// Encodes a [`Program`] to its `postcard` payload bytes, without any
/// stream framing. Use [`write_program`] to write a framed record.
pub fn encode_program(program: &Program) -> SerializationResult<Vec<u8>> {
    let wire = WireProgram::from_program(program);
    Ok(postcard::to_allocvec(&wire)?)
}

/// Decodes a `postcard` payload produced by [`encode_program`].
pub fn decode_program(payload: &[u8]) -> SerializationResult<Program> {
    let wire: WireProgram = postcard::from_bytes(payload)?;
    Ok(wire.into_program())
}

/// Writes one framed program record: `size:u32(LE)` + `payload` +
/// zero-pad to the next 4-byte boundary.
pub struct ProgramWriter<W: Write> {
    inner: W,
}

impl<W: Write> ProgramWriter<W> {
    pub fn new(inner: W) -> Self {
        ProgramWriter { inner }
    }

    pub fn write_program(&mut self, program: &Program) -> SerializationResult<()> {
        let payload = encode_program(program)?;
        let size = payload.len() as u32;
        self.inner.write_all(&size.to_le_bytes())?;
        self.inner.write_all(&payload)?;
        let padding = pad_len(payload.len());
        if padding > 0 {
            self.inner.write_all(&[0u8; 4][..padding])?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads framed program records written by [`ProgramWriter`].
pub struct ProgramReader<R: Read> {
    inner: R,
}

impl<R: Read> ProgramReader<R> {
    pub fn new(inner: R) -> Self {
        ProgramReader { inner }
    }

    /// Reads the next record, or `Ok(None)` at a clean end of stream.
    pub fn read_program(&mut self) -> SerializationResult<Option<Program>> {
        let mut size_buf = [0u8; 4];
        if !read_exact_or_eof(&mut self.inner, &mut size_buf)? {
            return Ok(None);
        }
        let size = u32::from_le_bytes(size_buf);
        let mut payload = vec![0u8; size as usize];
        self.inner.read_exact(&mut payload).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                CorruptSerialization::LengthMismatch { declared: size, available: payload.len() }
            } else {
                CorruptSerialization::Io(e)
            }
        })?;
        let padding = pad_len(size as usize);
        if padding > 0 {
            let mut pad_buf = [0u8; 4];
            self.inner.read_exact(&mut pad_buf[..padding])?;
        }
        Ok(Some(decode_program(&payload)?))
    }
}

fn pad_len(payload_len: usize) -> usize {
    (4 - payload_len % 4) % 4
}

/// Like `Read::read_exact`, but returns `Ok(false)` instead of an error
/// when the very first byte hits a clean EOF (no record left to read),
/// and an error for a short read partway through the buffer.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> SerializationResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(CorruptSerialization::LengthMismatch { declared: buf.len() as u32, available: filled })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CorruptSerialization::Io(e)),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcode::Opcode;

    fn sample_program() -> Program {
        let code = vec![
            Instruction::new(Opcode::LoadInteger(7), vec![], vec![Variable(0)], vec![], 0),
            Instruction::new(Opcode::LoadInteger(9), vec![], vec![Variable(1)], vec![], 1),
        ];
        Program::new(code)
    }

    #[test]
    fn round_trip_preserves_code_and_comments() {
        let mut program = sample_program();
        program.comments.insert(0, "seed".to_string());
        let payload = encode_program(&program).unwrap();
        let decoded = decode_program(&payload).unwrap();
        assert_eq!(decoded.len(), program.len());
        assert_eq!(decoded.comments, program.comments);
        for (a, b) in decoded.iter().zip(program.iter()) {
            assert_eq!(a.opcode, b.opcode);
            assert_eq!(a.inputs(), b.inputs());
            assert_eq!(a.outputs(), b.outputs());
        }
    }

    #[test]
    fn stream_framing_round_trips_multiple_records() {
        let mut buf = Vec::new();
        {
            let mut writer = ProgramWriter::new(&mut buf);
            writer.write_program(&sample_program()).unwrap();
            writer.write_program(&sample_program()).unwrap();
        }
        let mut reader = ProgramReader::new(&buf[..]);
        let first = reader.read_program().unwrap().expect("first record");
        assert_eq!(first.len(), 2);
        let second = reader.read_program().unwrap().expect("second record");
        assert_eq!(second.len(), 2);
        assert!(reader.read_program().unwrap().is_none());
    }

    #[test]
    fn stream_records_are_padded_to_four_byte_boundary() {
        let mut buf = Vec::new();
        ProgramWriter::new(&mut buf).write_program(&sample_program()).unwrap();
        let declared = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        let consumed_after_size = buf.len() - 4;
        assert_eq!(consumed_after_size % 4, 0);
        assert!(consumed_after_size >= declared);
    }

    #[test]
    fn truncated_payload_is_reported_as_corrupt() {
        let mut buf = Vec::new();
        ProgramWriter::new(&mut buf).write_program(&sample_program()).unwrap();
        buf.truncate(buf.len() - 1);
        let mut reader = ProgramReader::new(&buf[..]);
        let err = reader.read_program().unwrap_err();
        assert!(matches!(err, CorruptSerialization::LengthMismatch { .. } | CorruptSerialization::Io(_)));
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        let err = decode_program(&[0xffu8; 16]).unwrap_err();
        assert!(matches!(err, CorruptSerialization::Decode(_)));
    }
}
