//! ELF32 wire structures: file header, section headers, symbols and
//! relocation entries.
//!
//! Only the little-endian 32-bit forms exist here; the loader accepts
//! nothing else. Each structure reads itself out of an [`ElfImage`] by
//! byte copies at its fixed field offsets.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::{
    error::{Error, Result},
    image::ElfImage,
};

/// The four magic bytes every ELF object begins with
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
/// Relocatable object file type
pub const ET_REL: u16 = 1;
/// Machine value for Tensilica Xtensa
pub const EM_XTENSA: u16 = 94;
/// The reserved undefined section index
pub const SHN_UNDEF: u16 = 0;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The defined section header types. Processor-specific types (for example
/// the Xtensa property sections) decode to no variant and are simply not
/// dispatched on.
pub enum SectionType {
    /// Inactive header with no associated section
    Null = 0,
    /// Program-defined contents
    ProgBits = 1,
    /// A symbol table
    SymTab = 2,
    /// A string table
    StrTab = 3,
    /// Relocation entries with explicit addends (Elf32_Rela)
    Rela = 4,
    /// A symbol hash table
    Hash = 5,
    /// Dynamic linking information
    Dynamic = 6,
    /// A note section
    Note = 7,
    /// Occupies no file space but otherwise resembles ProgBits
    NoBits = 8,
    /// Relocation entries without addends
    Rel = 9,
    /// Reserved
    ShLib = 10,
    /// A minimal symbol table for dynamic linking
    DynSym = 11,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Section attribute flags. Bits the loader does not dispatch on are
    /// dropped at parse.
    pub struct SectionFlags: u32 {
        /// Writable during execution
        const WRITE = 0x1;
        /// Occupies memory during execution
        const ALLOC = 0x2;
        /// Contains executable machine instructions
        const EXECINSTR = 0x4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The ELF file header (Elf32_Ehdr), reduced to the fields the loader
/// consumes
pub struct FileHeader {
    /// Object file type (`ET_REL` for the inputs this loader accepts)
    pub kind: u16,
    /// Target machine (`EM_XTENSA` for the inputs this loader accepts)
    pub machine: u16,
    /// File offset of the section header table
    pub shoff: usize,
    /// Number of section headers
    pub shnum: usize,
    /// Section header index of the section-name string table
    pub shstrndx: usize,
}

impl FileHeader {
    /// Encoded size of an Elf32_Ehdr
    pub const SIZE: usize = 52;

    /// Read the header at offset 0, validating the magic. No other ident
    /// field is checked.
    pub fn parse(image: &ElfImage) -> Result<Self> {
        if image.bytes(0, 4)? != ELF_MAGIC.as_slice() {
            return Err(Error::BadMagic);
        }
        Ok(Self {
            kind: image.u16_at(16)?,
            machine: image.u16_at(18)?,
            shoff: image.u32_at(32)? as usize,
            shnum: image.u16_at(48)? as usize,
            shstrndx: image.u16_at(50)? as usize,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A section header (Elf32_Shdr)
pub struct SectionHeader {
    /// Offset of the section's name in the section-name string table
    pub name_index: usize,
    /// Raw section type (`sh_type`)
    pub kind: u32,
    /// Attribute flags
    pub flags: SectionFlags,
    /// File offset of the section's contents
    pub offset: usize,
    /// Size of the section in bytes
    pub size: usize,
    /// Associated table index (`sh_link`); for a symbol table, its string
    /// table
    pub link: usize,
    /// Extra information (`sh_info`); for a relocation section, the index
    /// of the section the relocations apply to
    pub info: usize,
}

impl SectionHeader {
    /// Encoded size of an Elf32_Shdr
    pub const SIZE: usize = 40;

    /// Read section header `index` from the table at `shoff`
    pub fn parse(image: &ElfImage, shoff: usize, index: usize) -> Result<Self> {
        let at = shoff + index * Self::SIZE;
        Ok(Self {
            name_index: image.u32_at(at)? as usize,
            kind: image.u32_at(at + 4)?,
            flags: SectionFlags::from_bits_truncate(image.u32_at(at + 8)?),
            offset: image.u32_at(at + 16)? as usize,
            size: image.u32_at(at + 20)? as usize,
            link: image.u32_at(at + 24)? as usize,
            info: image.u32_at(at + 28)? as usize,
        })
    }

    /// The typed section kind, if `sh_type` is one of the defined values
    pub fn section_type(&self) -> Option<SectionType> {
        SectionType::from_u32(self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A symbol table entry (Elf32_Sym)
pub struct SymbolEntry {
    /// Offset of the symbol's name in the symbol string table; zero means
    /// the symbol takes the name of the section it marks
    pub name_index: usize,
    /// Value of the symbol: an offset into its defining section
    pub value: u32,
    /// Index of the defining section, or `SHN_UNDEF`
    pub shndx: u16,
}

impl SymbolEntry {
    /// Encoded size of an Elf32_Sym
    pub const SIZE: usize = 16;

    /// Read symbol `index` from the table at `symtab_offset`
    pub fn parse(image: &ElfImage, symtab_offset: usize, index: usize) -> Result<Self> {
        let at = symtab_offset + index * Self::SIZE;
        Ok(Self {
            name_index: image.u32_at(at)? as usize,
            value: image.u32_at(at + 4)?,
            shndx: image.u16_at(at + 14)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A relocation entry with addend (Elf32_Rela)
pub struct RelaEntry {
    /// Byte offset of the patch target within the target section
    pub offset: usize,
    /// Packed symbol index and relocation type (`r_info`)
    pub info: u32,
    /// Signed constant added to the resolved symbol address
    pub addend: i32,
}

impl RelaEntry {
    /// Encoded size of an Elf32_Rela
    pub const SIZE: usize = 12;

    /// Read the relocation entry at absolute file offset `at`
    pub fn parse(image: &ElfImage, at: usize) -> Result<Self> {
        Ok(Self {
            offset: image.u32_at(at)? as usize,
            info: image.u32_at(at + 4)?,
            addend: image.u32_at(at + 8)? as i32,
        })
    }

    /// Index of the referenced symbol
    pub fn symbol_index(&self) -> usize {
        (self.info >> 8) as usize
    }

    /// Raw relocation type
    pub fn type_value(&self) -> u8 {
        (self.info & 0xff) as u8
    }
}
