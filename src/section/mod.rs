//! Loaded-section records and the table binding relocation sections to
//! their targets.

use log::debug;

use crate::{
    base::{self, DataAddr},
    error::{Error, Result},
    header::{SectionFlags, SectionHeader, SectionType},
    host::Host,
    image::ElfImage,
};

#[derive(Debug)]
/// One allocated copy of an SHF_ALLOC section
pub struct LoadedSection {
    /// Data-bus address of the backing buffer
    pub(crate) data: DataAddr,
    /// Section size in bytes
    pub(crate) size: usize,
    /// The section's index in the input's section header table
    pub(crate) secidx: usize,
    /// Index of the SHT_RELA section targeting this one, or zero for none
    pub(crate) relsecidx: usize,
    /// Whether the buffer came from the executable-capable allocator
    pub(crate) exec: bool,
}

impl LoadedSection {
    /// Allocate a backing buffer for `header` and fill it from the image.
    ///
    /// The buffer is executable-capable iff the section carries
    /// SHF_EXECINSTR. SHT_NOBITS sections stay zeroed (the allocator
    /// contract zero-initializes); everything else is copied over the word
    /// bus from `sh_offset`.
    pub(crate) fn load<H: Host>(
        host: &mut H,
        image: &ElfImage,
        header: &SectionHeader,
        secidx: usize,
    ) -> Result<Self> {
        let exec = header.flags.contains(SectionFlags::EXECINSTR);
        let data = if exec {
            host.alloc_exec(header.size)
        } else {
            host.alloc_data(header.size)
        }
        .ok_or(Error::AllocFailed { size: header.size })?;
        if header.section_type() != Some(SectionType::NoBits) {
            let src = image.bytes(header.offset, header.size)?;
            unsafe { base::copy(data.get(), src.as_ptr() as usize, header.size) };
        }
        debug!(
            "section {secidx}: {} bytes at {data}{}",
            header.size,
            if exec { " (exec)" } else { "" }
        );
        Ok(Self {
            data,
            size: header.size,
            secidx,
            relsecidx: 0,
            exec,
        })
    }

    /// Data-bus address of the section's buffer
    pub fn data(&self) -> DataAddr {
        self.data
    }

    /// Section size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Debug, Default)]
/// The loaded sections of one object, looked up by their original section
/// index. Counts are tens of entries, so lookups are linear scans.
pub(crate) struct SectionTable {
    sections: Vec<LoadedSection>,
}

impl SectionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, section: LoadedSection) {
        self.sections.push(section);
    }

    /// The loaded section copied from input section `secidx`
    pub(crate) fn by_index(&self, secidx: usize) -> Option<&LoadedSection> {
        self.sections.iter().find(|s| s.secidx == secidx)
    }

    /// Bind relocation section `relsecidx` to its target `secidx`. Returns
    /// false when the target was never allocated (the relocations are then
    /// ignored).
    pub(crate) fn bind_rela(&mut self, secidx: usize, relsecidx: usize) -> bool {
        match self.sections.iter_mut().find(|s| s.secidx == secidx) {
            Some(section) => {
                section.relsecidx = relsecidx;
                true
            }
            None => false,
        }
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, LoadedSection> {
        self.sections.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.sections.len()
    }

    /// Remove and yield every section, leaving the table empty
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = LoadedSection> + '_ {
        self.sections.drain(..)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    fn record(secidx: usize) -> LoadedSection {
        LoadedSection {
            data: DataAddr::new(0x1000 * secidx),
            size: 16,
            secidx,
            relsecidx: 0,
            exec: false,
        }
    }

    #[test]
    fn test_lookup_by_original_index() {
        let mut table = SectionTable::new();
        table.push(record(1));
        table.push(record(4));
        assert_eq!(table.by_index(4).unwrap().data.get(), 0x4000);
        assert!(table.by_index(2).is_none());
    }

    #[test]
    fn test_bind_rela_targets_allocated_sections_only() {
        let mut table = SectionTable::new();
        table.push(record(1));
        assert!(table.bind_rela(1, 3));
        assert_eq!(table.by_index(1).unwrap().relsecidx, 3);
        assert!(!table.bind_rela(2, 5));
    }
}
