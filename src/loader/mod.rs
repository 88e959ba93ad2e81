//! The loader context: section scan, relocation walk, entry dispatch and
//! teardown.

use log::{debug, error};
use typed_builder::TypedBuilder;

use crate::{
    arch::xtensa::{self, RelocationType},
    base::{CodeAddr, DataAddr},
    error::{Error, Result},
    header::{FileHeader, RelaEntry, SectionFlags, SectionHeader, SectionType, SymbolEntry},
    host::Host,
    image::ElfImage,
    section::{LoadedSection, SectionTable},
    symbol::{self, ExportedSymbol, Resolution},
};

#[derive(Debug, Clone, Copy, TypedBuilder)]
/// Everything a load starts from: the object bytes and the symbols the
/// host exports to it. Both are borrowed and must outlive the loader.
pub struct LoadRequest<'a> {
    /// The ELF object image
    image: &'a [u8],
    #[builder(default = &[])]
    /// Host-exported symbols visible to the object, searched before any
    /// section-local definition
    exports: &'a [ExportedSymbol<'a>],
}

/// A loaded, relocated object and the host services it was loaded with.
///
/// Dropping the loader releases every section buffer; there is no
/// per-section teardown.
pub struct Loader<'a, H: Host> {
    host: H,
    image: ElfImage<'a>,
    exports: &'a [ExportedSymbol<'a>],
    shoff: usize,
    shnum: usize,
    shstrtab_offset: usize,
    symtab_offset: usize,
    symtab_count: usize,
    strtab_offset: usize,
    pub(crate) sections: SectionTable,
    pub(crate) text: Option<DataAddr>,
    pub(crate) entry: Option<(DataAddr, CodeAddr)>,
}

impl<'a, H: Host> Loader<'a, H> {
    /// Parse the image, allocate and fill every SHF_ALLOC section, resolve
    /// symbols and apply all relocations.
    ///
    /// Scan failures abort immediately. Relocation failures are
    /// accumulated so the log names every offending entry, then surfaced
    /// as a single [`Error::RelocationFailed`]. Either way the partial
    /// load is torn down before returning.
    pub fn load(request: LoadRequest<'a>, host: H) -> Result<Self> {
        let image = ElfImage::new(request.image);
        let header = FileHeader::parse(&image)?;
        debug!(
            "object type {:#x} machine {:#x}, {} section headers at {:#x}",
            header.kind, header.machine, header.shnum, header.shoff
        );
        let shstrtab = SectionHeader::parse(&image, header.shoff, header.shstrndx)?;
        let mut loader = Self {
            host,
            image,
            exports: request.exports,
            shoff: header.shoff,
            shnum: header.shnum,
            shstrtab_offset: shstrtab.offset,
            symtab_offset: 0,
            symtab_count: 0,
            strtab_offset: 0,
            sections: SectionTable::new(),
            text: None,
            entry: None,
        };
        loader.scan()?;
        loader.relocate()?;
        Ok(loader)
    }

    /// One pass over section headers 1..shnum: allocate and copy the
    /// SHF_ALLOC sections, bind relocation sections to their targets, and
    /// record the symbol and string tables.
    fn scan(&mut self) -> Result<()> {
        for n in 1..self.shnum {
            let header = SectionHeader::parse(&self.image, self.shoff, n)?;
            let name = self.image.cstr(self.shstrtab_offset + header.name_index)?;
            if header.flags.contains(SectionFlags::ALLOC) {
                if header.size == 0 {
                    debug!("section {n}: empty, skipped");
                    continue;
                }
                let section = LoadedSection::load(&mut self.host, &self.image, &header, n)?;
                if name == b".text" {
                    self.text = Some(section.data());
                }
                self.sections.push(section);
            } else if header.section_type() == Some(SectionType::Rela) {
                // A relocation section must reference an earlier section.
                if header.info >= n {
                    return Err(Error::RelaBadLink {
                        section: n,
                        target: header.info,
                    });
                }
                if !self.sections.bind_rela(header.info, n) {
                    debug!("section {n}: relocations for an unallocated target, ignored");
                }
            } else if name == b".symtab" {
                self.symtab_offset = header.offset;
                self.symtab_count = header.size / SymbolEntry::SIZE;
                debug!("symtab at {:#x}, {} symbols", header.offset, self.symtab_count);
            } else if name == b".strtab" {
                self.strtab_offset = header.offset;
                debug!("strtab at {:#x}", header.offset);
            }
        }
        if self.symtab_offset == 0 || self.strtab_offset == 0 {
            return Err(Error::MissingSymtabStrtab);
        }
        debug!("{} sections loaded", self.sections.len());
        Ok(())
    }

    /// Walk every relocation section bound during the scan, applying its
    /// entries in file order.
    fn relocate(&self) -> Result<()> {
        let mut failures = 0usize;
        for section in self.sections.iter() {
            if section.relsecidx == 0 {
                continue;
            }
            let header = SectionHeader::parse(&self.image, self.shoff, section.relsecidx)?;
            let count = header.size / RelaEntry::SIZE;
            for j in 0..count {
                let rela = RelaEntry::parse(&self.image, header.offset + j * RelaEntry::SIZE)?;
                if let Err(e) = self.apply_one(section, &rela) {
                    error!(
                        "relocation {j} of section {}: {e}",
                        section.relsecidx
                    );
                    failures += 1;
                }
            }
        }
        if failures != 0 {
            return Err(Error::RelocationFailed { failures });
        }
        Ok(())
    }

    /// Resolve and apply a single relocation entry against its target
    /// section.
    fn apply_one(&self, section: &LoadedSection, rela: &RelaEntry) -> Result<()> {
        let rel_addr = section.data().byte_add(rela.offset);
        let kind = RelocationType::decode(rela.type_value())?;
        let sym = SymbolEntry::parse(&self.image, self.symtab_offset, rela.symbol_index())?;
        let name = self.symbol_name(&sym)?;
        let resolution = symbol::resolve(self.exports, &self.sections, &sym, name);
        if kind.is_noop() {
            debug!("reloc {kind:?} at {rel_addr}: no patch");
            return Ok(());
        }
        if resolution == Resolution::Undefined && sym.value == 0 {
            return Err(Error::UndefinedSymbol {
                name: String::from_utf8_lossy(name).into_owned(),
            });
        }
        let target = resolution
            .addr_or_sentinel()
            .wrapping_add_signed(rela.addend as isize);
        debug!(
            "reloc {kind:?} at {rel_addr}: {} -> {target:#x}",
            String::from_utf8_lossy(name)
        );
        unsafe {
            xtensa::apply(kind, rel_addr, target, &mut |addr, len| {
                self.host.flush_dcache(addr, len)
            })
        }
    }

    /// The name of a symbol; a zero `st_name` takes the name of the
    /// section the symbol marks.
    fn symbol_name(&self, sym: &SymbolEntry) -> Result<&'a [u8]> {
        if sym.name_index == 0 {
            let header = SectionHeader::parse(&self.image, self.shoff, sym.shndx as usize)?;
            self.image.cstr(self.shstrtab_offset + header.name_index)
        } else {
            self.image.cstr(self.strtab_offset + sym.name_index)
        }
    }

    /// Locate the named function in the symbol table and record it as the
    /// entry point, translated onto the instruction bus.
    pub fn set_function(&mut self, name: &str) -> Result<()> {
        for i in 0..self.symtab_count {
            let sym = SymbolEntry::parse(&self.image, self.symtab_offset, i)?;
            if self.symbol_name(&sym)? != name.as_bytes() {
                continue;
            }
            return match symbol::resolve(self.exports, &self.sections, &sym, name.as_bytes()) {
                Resolution::Defined(addr) => {
                    let data = DataAddr::new(addr);
                    let code = self.host.instr_alias(data);
                    debug!("entry {name:?} at {data}, fetched at {code}");
                    self.entry = Some((data, code));
                    Ok(())
                }
                Resolution::Undefined => Err(Error::UndefinedSymbol { name: name.into() }),
            };
        }
        Err(Error::EntryNotFound { name: name.into() })
    }

    /// Call the entry point with `arg` and return its result, or 0 when no
    /// entry has been set.
    pub fn run(&mut self, arg: i32) -> i32 {
        match self.entry {
            Some((_, code)) => unsafe { self.host.call(code, arg) },
            None => 0,
        }
    }

    /// Data-bus address of the loaded `.text` section, for diagnostics
    pub fn text_addr(&self) -> Option<DataAddr> {
        self.text
    }
}

impl<H: Host> Drop for Loader<'_, H> {
    fn drop(&mut self) {
        for section in self.sections.drain() {
            unsafe {
                self.host
                    .dealloc(section.data, section.size, section.exec)
            };
        }
    }
}
