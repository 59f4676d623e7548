//! The fixed size record at the start of every ELF file.
use super::{Offset, Reader, Stream};
use crate::errors::KmiError;
use crate::utils::require;
use std::io::Write;

pub const HEADER_SIZE: u64 = 64;
pub const SECTION_HEADER_SIZE: u64 = 64;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;
const EI_OSABI: usize = 7;

const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const ELFOSABI_SYSV: u8 = 0;
const ET_REL: u16 = 1;
const EM_AARCH64: u16 = 183;

/// Elf64_Ehdr
#[derive(Clone, Debug)]
pub struct ElfHeader {
    /// Magic number, class, data encoding, version, and OS ABI.
    pub ident: [u8; 16],

    /// Relocatable, executable, shared, or core.
    pub etype: u16,

    /// Target CPU.
    pub machine: u16,

    pub version: u32,
    pub entry: u64,

    /// Program headers are only present in files that can be loaded.
    pub ph_offset: u64,

    pub section_offset: u64,
    pub flags: u32,
    pub header_size: u16,
    pub ph_entry_size: u16,
    pub num_ph_entries: u16,
    pub section_entry_size: u16,
    pub num_section_entries: u16,

    /// Section holding the section names.
    pub string_table_index: u16,
}

impl ElfHeader {
    pub fn new(reader: Reader) -> Result<Self, KmiError> {
        require(
            reader.len() >= HEADER_SIZE,
            "file is too small to be an ELF file",
        )?;
        let mut s = Stream::new(reader, Offset(0));
        Ok(ElfHeader {
            ident: s.read_bytes()?,
            etype: s.read_half()?,
            machine: s.read_half()?,
            version: s.read_word()?,
            entry: s.read_xword()?,
            ph_offset: s.read_xword()?,
            section_offset: s.read_xword()?,
            flags: s.read_word()?,
            header_size: s.read_half()?,
            ph_entry_size: s.read_half()?,
            num_ph_entries: s.read_half()?,
            section_entry_size: s.read_half()?,
            num_section_entries: s.read_half()?,
            string_table_index: s.read_half()?,
        })
    }

    /// Only little-endian 64-bit ARM relocatable objects are accepted. Checks are made
    /// in a fixed order so that the first problem is the one reported.
    pub fn validate(&self, length: u64) -> Result<(), KmiError> {
        require(self.ident[..4] == ELF_MAGIC, "not an ELF file")?;
        require(
            self.ident[EI_VERSION] == EV_CURRENT,
            "invalid ELF file version",
        )?;
        require(self.ident[EI_OSABI] == ELFOSABI_SYSV, "invalid ELF file ABI")?;
        require(
            self.ident[EI_CLASS] == ELFCLASS64,
            "ELF file is not a 64 bit ELF file",
        )?;
        require(
            self.ident[EI_DATA] == ELFDATA2LSB,
            "ELF file is not a little-endian ELF file",
        )?;
        require(
            self.machine == EM_AARCH64,
            "ELF file is not an ARM AARCH64 ELF file",
        )?;
        require(self.etype == ET_REL, "ELF file is not a relocatable file")?;
        require(
            self.ph_offset == 0 && self.num_ph_entries == 0,
            "program headers must not be present in .o ELF file",
        )?;
        require(
            self.section_offset != 0 && self.num_section_entries != 0,
            "section headers must be present in .o ELF file",
        )?;
        require(
            u64::from(self.section_entry_size) == SECTION_HEADER_SIZE,
            "section header size is the wrong size",
        )?;

        let table_size = u64::from(self.num_section_entries) * SECTION_HEADER_SIZE;
        require(
            self.section_offset >= HEADER_SIZE,
            "section header table overlaps with ELF header",
        )?;
        let end = self
            .section_offset
            .checked_add(table_size)
            .ok_or_else(|| KmiError::format("section header table end arithmetic overflow"))?;
        require(end <= length, "section header table outside of file")?;
        require(
            self.string_table_index < self.num_section_entries,
            "string section header index outside section table",
        )
    }

    /// Offset of the section header at index.
    pub fn section_header_offset(&self, index: u32) -> Offset {
        // validate ensures the whole table fits within the file
        Offset(self.section_offset + u64::from(index) * SECTION_HEADER_SIZE)
    }

    /// Debug dump of the header fields.
    pub fn write_fields(&self, mut out: impl Write) -> std::io::Result<()> {
        writeln!(out, "{:<16} 0x{:04x}", "e_type", self.etype)?;
        writeln!(out, "{:<16} 0x{:04x}", "e_machine", self.machine)?;
        writeln!(out, "{:<16} 0x{:08x}", "e_version", self.version)?;
        writeln!(out, "{:<16} 0x{:016x}", "e_entry", self.entry)?;
        writeln!(out, "{:<16} 0x{:016x}", "e_phoff", self.ph_offset)?;
        writeln!(out, "{:<16} 0x{:016x}", "e_shoff", self.section_offset)?;
        writeln!(out, "{:<16} 0x{:08x}", "e_flags", self.flags)?;
        writeln!(out, "{:<16} 0x{:04x}", "e_ehsize", self.header_size)?;
        writeln!(out, "{:<16} 0x{:04x}", "e_phentsize", self.ph_entry_size)?;
        writeln!(out, "{:<16} 0x{:04x}", "e_phnum", self.num_ph_entries)?;
        writeln!(out, "{:<16} 0x{:04x}", "e_shentsize", self.section_entry_size)?;
        writeln!(out, "{:<16} 0x{:04x}", "e_shnum", self.num_section_entries)?;
        writeln!(out, "{:<16} 0x{:04x}", "e_shstrndx", self.string_table_index)
    }
}
