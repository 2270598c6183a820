use crate::id::Id;

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Encoding(::std::str::Utf8Error);
        BadNumber(::std::num::ParseIntError);
        BadHex(::hex::FromHexError);
    }

    errors {
        BadId
        TruncatedDelta
        MalformedPackHeader
        UnsupportedIndexVersion

        MalformedIndex(reason: String) {
            description("malformed pack index")
            display("malformed pack index: {}", reason)
        }

        MalformedLength(reason: String) {
            description("malformed object length")
            display("malformed object length: {}", reason)
        }

        UnknownObjectType(word: String) {
            description("unknown object type")
            display("unknown object type: {:?}", word)
        }

        BaseObjectNotFound(id: Id) {
            description("delta base object not found")
            display("delta base object {} not found in pack index", id)
        }

        DeltaLengthMismatch(expected: u64, actual: u64) {
            description("delta result length mismatch")
            display("delta declared {} bytes, produced {}", expected, actual)
        }

        DeltaOutOfRange(offset: u64, length: u64, base_len: u64) {
            description("delta copy out of range")
            display("delta copy of {} bytes at {} exceeds base of {} bytes", length, offset, base_len)
        }

        BadDeltaInstruction(byte: u8) {
            description("bad delta instruction")
            display("bad delta instruction byte {:#04x}", byte)
        }

        SeekFailed(requested: u64, actual: u64) {
            description("seek failed")
            display("seek to {} landed at {}", requested, actual)
        }

        EmptyRead(offset: u64) {
            description("nothing read from packfile")
            display("nothing read from packfile at offset {}", offset)
        }

        CorruptedPackfile(reason: String) {
            description("corrupted packfile")
            display("corrupted packfile: {}", reason)
        }

        DeltaChainTooDeep(limit: usize) {
            description("delta chain too deep")
            display("delta chain exceeds {} levels", limit)
        }

        DeltaCycle(offset: u64) {
            description("delta chain cycle")
            display("delta chain revisits offset {}", offset)
        }

        ChecksumMismatch(what: String) {
            description("checksum mismatch")
            display("checksum mismatch: {}", what)
        }
    }
}
