use std::io::Read;

use crate::errors::{ ErrorKind, Result };

// copy instructions with a zero length field mean this many bytes
const COPY_ZERO_SIZE: u64 = 0x10000;

fn next_byte<R: Read>(input: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into())
        }
    }
}

fn operand<R: Read>(input: &mut R) -> Result<u64> {
    match next_byte(input)? {
        Some(xs) => Ok(u64::from(xs)),
        None => Err(ErrorKind::TruncatedDelta.into())
    }
}

// bits 0-3 of a copy command say which offset bytes follow, bits 4-6 which length bytes.
fn read_copy<R: Read>(command: u8, input: &mut R) -> Result<(u64, u64)> {
    let mut offset = 0u64;
    for shift in 0..4 {
        if command & (1 << shift) != 0 {
            offset |= operand(input)? << (8 * shift);
        }
    }

    let mut length = 0u64;
    for shift in 0..3 {
        if command & (0x10 << shift) != 0 {
            length |= operand(input)? << (8 * shift);
        }
    }

    if length == 0 {
        length = COPY_ZERO_SIZE;
    }

    Ok((offset, length))
}

/// Rebuild an object from its delta base and the instruction stream that follows the two
/// size prefixes. The output must come to exactly `expected` bytes.
pub fn apply<R: Read>(base: &[u8], instructions: &mut R, expected: u64) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(std::cmp::min(expected, base.len() as u64 + 0x10000) as usize);
    let mut literal = [0u8; 0x7f];

    while let Some(command) = next_byte(instructions)? {
        if command & 0x80 != 0 {
            let (offset, length) = read_copy(command, instructions)?;
            let end = offset.checked_add(length).filter(|end| *end <= base.len() as u64);
            let end = match end {
                Some(xs) => xs as usize,
                None => return Err(ErrorKind::DeltaOutOfRange(offset, length, base.len() as u64).into())
            };
            output.extend_from_slice(&base[offset as usize .. end]);
        } else if command == 0 {
            return Err(ErrorKind::BadDeltaInstruction(command).into())
        } else {
            let run = &mut literal[.. command as usize];
            instructions.read_exact(run).map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => ErrorKind::TruncatedDelta.into(),
                _ => crate::errors::Error::from(e)
            })?;
            output.extend_from_slice(run);
        }

        if output.len() as u64 > expected {
            return Err(ErrorKind::DeltaLengthMismatch(expected, output.len() as u64).into())
        }
    }

    if output.len() as u64 != expected {
        return Err(ErrorKind::DeltaLengthMismatch(expected, output.len() as u64).into())
    }

    Ok(output)
}
