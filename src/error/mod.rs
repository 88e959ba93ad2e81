//! Error type for failures while parsing, loading or relocating an object.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Hash)]
/// Error type for failures while parsing, loading or relocating an object
pub enum Error {
    /// The input does not begin with the four ELF magic bytes
    #[error("input does not begin with \\x7fELF")]
    BadMagic,
    /// A header, name or table read landed outside the input image. Given a
    /// well-formed image this cannot happen, but truncated inputs must still
    /// fail cleanly instead of reading out of bounds.
    #[error("read of {len} bytes at offset {offset:#x} is outside the input image")]
    SectionRead {
        /// Byte offset of the attempted read
        offset: usize,
        /// Length of the attempted read
        len: usize,
    },
    /// The host allocator returned nothing for a section buffer
    #[error("host allocator failed for a section of {size} bytes")]
    AllocFailed {
        /// Requested buffer size in bytes
        size: usize,
    },
    /// A relocation section names a target that does not precede it
    #[error("relocation section {section} targets section {target}, which does not precede it")]
    RelaBadLink {
        /// Index of the offending SHT_RELA section
        section: usize,
        /// The sh_info value it carried
        target: usize,
    },
    /// The scan finished without locating both `.symtab` and `.strtab`
    #[error("missing .symtab or .strtab")]
    MissingSymtabStrtab,
    /// A relocation references a symbol that is neither host-exported nor
    /// defined by a loaded section
    #[error("undefined symbol {name:?}")]
    UndefinedSymbol {
        /// Name of the unresolved symbol
        name: String,
    },
    /// The slot-0 opcode at the relocation target is not one the patcher
    /// knows how to rewrite
    #[error("unknown opcode {opcode:#04x} at relocation target")]
    RelocOpcodeUnknown {
        /// Low byte of the instruction word
        opcode: u8,
    },
    /// A branch displacement does not fit the instruction's immediate field
    #[error("{format} displacement {delta} out of range")]
    RelocRange {
        /// Instruction format name (`bri8`, `bri12`, `ri6`)
        format: &'static str,
        /// The displacement that did not fit
        delta: isize,
    },
    /// A word-scaled displacement is not a multiple of four
    #[error("{format} displacement {delta} is not word aligned")]
    RelocAlignment {
        /// Instruction format name (`l32r`, `call`)
        format: &'static str,
        /// The misaligned displacement
        delta: isize,
    },
    /// The relocation type is outside the supported Xtensa set
    #[error("unsupported relocation type {value}")]
    RelocTypeUnsupported {
        /// Raw relocation type from `r_info`
        value: u8,
    },
    /// One or more relocation entries failed; each was already logged
    #[error("{failures} relocation(s) failed")]
    RelocationFailed {
        /// Number of entries that failed across the whole walk
        failures: usize,
    },
    /// `set_function` did not find the requested name in the symbol table
    #[error("entry symbol {name:?} not found")]
    EntryNotFound {
        /// The requested entry name
        name: String,
    },
}

/// Result alias for loader operations
pub type Result<T> = core::result::Result<T, Error>;
