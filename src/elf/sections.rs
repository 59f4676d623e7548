//! Section headers along with the validation applied to each of them. Relocatable
//! objects have no segments so sections are all there is.
use super::{
    ElfHeader, Extent, Offset, Reader, SECTION_HEADER_SIZE, SectionIndex, Stream, StringIndex,
};
use crate::errors::KmiError;
use crate::utils::require;
use std::io::Write;

const WRITE_FLAG: u64 = 1 << 0; // Writable
const ALLOC_FLAG: u64 = 1 << 1; // Occupies memory during execution
const EXECINSTR_FLAG: u64 = 1 << 2; // Executable
const MERGE_FLAG: u64 = 1 << 4; // Might be merged
const STRINGS_FLAG: u64 = 1 << 5; // Contains nul-terminated strings
pub const INFO_LINK_FLAG: u64 = 1 << 6; // `sh_info' contains SHT index
const LINK_ORDER_FLAG: u64 = 1 << 7; // Preserve order after combining
const OS_NONCONFORMING_FLAG: u64 = 1 << 8; // Non-standard OS specific handling required
const GROUP_FLAG: u64 = 1 << 9; // Section is member of a group.
const TLS_FLAG: u64 = 1 << 10; // Section hold thread-local data.
pub const COMPRESSED_FLAG: u64 = 1 << 11; // Section with compressed data.
const MASKOS_FLAG: u64 = 0x0ff00000; // OS-specific.
const MASKPROC_FLAG: u64 = 0xf0000000; // Processor-specific

/// Describes a section (Elf64_Shdr).
#[derive(Clone, Debug)]
pub struct SectionHeader {
    /// Index into the section header string table.
    pub name: StringIndex,

    /// Type of the section.
    pub stype: SectionType,

    /// Write, alloc, info link, etc.
    pub flags: u64,

    /// Always zero in a relocatable file.
    pub addr: u64,

    /// The bytes of the section within the file. For NoBits sections these don't
    /// actually exist.
    pub obytes: Extent,

    /// Link to another section with related information, usually a string
    /// or symbol table.
    pub link: u32,

    /// Additional section info. For relocations this is the section being relocated.
    pub info: u32,

    /// Section alignment.
    pub align: u64,

    /// Set if the section holds a table of entries.
    pub entry_size: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionType {
    /// Dynamic linking information.
    Dynamic,

    // Dynamic linker symbol table.
    DynamicSymbolTable,

    /// Array of pointers to termination functions.
    FiniArray,

    /// Section group.
    Group,

    /// Array of pointers to initialization functions.
    InitArray,

    /// Uninitialized data.
    NoBits,

    /// Arbitrary metadata.
    Note,

    /// Not to be used.
    Null,

    /// Array of pointers to functions to be called before the regular
    /// initialization functions.
    PreinitArray,

    /// CPU instructions or constant data.
    ProgBits,

    /// Relocation entries with addends.
    RelocationsWith,

    /// Relocation entries without addends.
    RelocationsWithout,

    /// Strings for use by the linker and debugger.
    StringTable,

    /// Symbol hash table.
    SymbolHashTable,

    /// Link editing symbol table.
    SymbolTable,

    /// Extended section indices for a symbol table.
    SymbolTableIndices,

    /// Anything else: OS, processor, or user specific.
    Other(u32),
}

impl SectionType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x0 => SectionType::Null,
            0x1 => SectionType::ProgBits,
            0x2 => SectionType::SymbolTable,
            0x3 => SectionType::StringTable,
            0x4 => SectionType::RelocationsWith,
            0x5 => SectionType::SymbolHashTable,
            0x6 => SectionType::Dynamic,
            0x7 => SectionType::Note,
            0x8 => SectionType::NoBits,
            0x9 => SectionType::RelocationsWithout,
            0xb => SectionType::DynamicSymbolTable,
            0xe => SectionType::InitArray,
            0xf => SectionType::FiniArray,
            0x10 => SectionType::PreinitArray,
            0x11 => SectionType::Group,
            0x12 => SectionType::SymbolTableIndices,
            _ => SectionType::Other(value),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            SectionType::Null => 0x0,
            SectionType::ProgBits => 0x1,
            SectionType::SymbolTable => 0x2,
            SectionType::StringTable => 0x3,
            SectionType::RelocationsWith => 0x4,
            SectionType::SymbolHashTable => 0x5,
            SectionType::Dynamic => 0x6,
            SectionType::Note => 0x7,
            SectionType::NoBits => 0x8,
            SectionType::RelocationsWithout => 0x9,
            SectionType::DynamicSymbolTable => 0xb,
            SectionType::InitArray => 0xe,
            SectionType::FiniArray => 0xf,
            SectionType::PreinitArray => 0x10,
            SectionType::Group => 0x11,
            SectionType::SymbolTableIndices => 0x12,
            SectionType::Other(value) => value,
        }
    }
}

impl SectionHeader {
    pub fn flags(flags: u64) -> String {
        let mut result = Vec::new();
        if flags & WRITE_FLAG != 0 {
            result.push("WRITE");
        }
        if flags & ALLOC_FLAG != 0 {
            result.push("ALLOC");
        }
        if flags & EXECINSTR_FLAG != 0 {
            result.push("EXEC");
        }
        if flags & MERGE_FLAG != 0 {
            result.push("MERGE");
        }
        if flags & STRINGS_FLAG != 0 {
            result.push("STRINGS");
        }
        if flags & INFO_LINK_FLAG != 0 {
            result.push("INFO");
        }
        if flags & LINK_ORDER_FLAG != 0 {
            result.push("LINK");
        }
        if flags & OS_NONCONFORMING_FLAG != 0 {
            result.push("OS_NONCONFORMING");
        }
        if flags & GROUP_FLAG != 0 {
            result.push("GROUP");
        }
        if flags & TLS_FLAG != 0 {
            result.push("TLS");
        }
        if flags & COMPRESSED_FLAG != 0 {
            result.push("COMPRESSED");
        }
        if flags & MASKOS_FLAG != 0 {
            result.push("MASKOS");
        }
        if flags & MASKPROC_FLAG != 0 {
            result.push("MASKPROC");
        }
        if result.is_empty() {
            result.push("none");
        }
        result.join(" ")
    }
}

impl SectionHeader {
    pub fn new(reader: Reader, offset: Offset) -> Result<Self, KmiError> {
        let mut s = Stream::new(reader, offset);
        let name = s.read_word()?;
        let stype = SectionType::from_u32(s.read_word()?);
        let flags = s.read_xword()?;
        let addr = s.read_xword()?;
        let offset = s.read_xword()?;
        let size = s.read_xword()?;
        let link = s.read_word()?;
        let info = s.read_word()?;
        let align = s.read_xword()?;
        let entry_size = s.read_xword()?;
        Ok(SectionHeader {
            name: StringIndex(name),
            stype,
            flags,
            addr,
            obytes: Extent::from_raw(offset, size),
            link,
            info,
            align,
            entry_size,
        })
    }

    pub fn has_flag(&self, flag: u64) -> bool {
        self.flags & flag != 0
    }

    /// Checks the section against the file and its peers. Only sections with no data
    /// in the file (e.g. .bss) are allowed to extend past the end of the file.
    pub fn validate(
        &self,
        length: u64,
        shstrtab: &SectionHeader,
        num_sections: u32,
    ) -> Result<(), KmiError> {
        require(
            self.addr == 0,
            "relocatable file sections should not have an address",
        )?;
        require(
            self.obytes.start.0 != 0 || self.obytes.size == 0,
            "non-empty section at beginning of file",
        )?;
        let end = self.obytes.end().ok_or_else(|| {
            KmiError::format("arithmetic overflow computing end of section data")
        })?;
        require(
            end.0 <= length || self.stype == SectionType::NoBits,
            "section data outside of file",
        )?;
        require(
            u64::from(self.name.0) < shstrtab.obytes.size,
            "section name outside string section",
        )?;
        require(self.link < num_sections, "invalid sh_link")?;
        require(
            !self.has_flag(INFO_LINK_FLAG) || self.info < num_sections,
            "invalid sh_info link",
        )?;
        require(
            !self.has_flag(COMPRESSED_FLAG),
            "compressed section data not supported",
        )
    }

    /// A string table has to have at least one byte and the byte just after the table
    /// has to be a nul.
    pub fn validate_string_table(&self, reader: Reader) -> Result<(), KmiError> {
        require(self.obytes.size != 0, "string table is empty")?;
        let terminated = match self.obytes.end() {
            Some(end) => matches!(reader.read_byte(end), Ok(0)),
            None => false,
        };
        require(terminated, "string table is not nul terminated")
    }

    /// Returns the string at index within this string table. The string may run into
    /// the nul just past the table which validate_string_table checks for.
    pub fn string<'a>(&self, reader: Reader<'a>, index: StringIndex) -> Result<&'a [u8], KmiError> {
        let start = self
            .obytes
            .start
            .checked_add(u64::from(index.0))
            .ok_or_else(|| KmiError::format("string index overflows"))?;
        let end = self
            .obytes
            .end()
            .and_then(|end| end.checked_add(1))
            .ok_or_else(|| KmiError::format("string table end overflows"))?;
        reader.read_string(start, end)
    }

    pub fn write_fields(
        &self,
        mut out: impl Write,
        name: &[u8],
        index: SectionIndex,
    ) -> std::io::Result<()> {
        write!(out, "section: ")?;
        out.write_all(name)?;
        writeln!(out, " (0x{:x})", index.0)?;
        writeln!(out, "{:<16} 0x{:08x}", "sh_name", self.name.0)?;
        writeln!(out, "{:<16} 0x{:08x}", "sh_type", self.stype.as_u32())?;
        writeln!(
            out,
            "{:<16} 0x{:016x} {}",
            "sh_flags",
            self.flags,
            SectionHeader::flags(self.flags)
        )?;
        writeln!(out, "{:<16} 0x{:016x}", "sh_addr", self.addr)?;
        writeln!(out, "{:<16} 0x{:016x}", "sh_offset", self.obytes.start.0)?;
        writeln!(out, "{:<16} 0x{:016x}", "sh_size", self.obytes.size)?;
        writeln!(out, "{:<16} 0x{:08x}", "sh_link", self.link)?;
        writeln!(out, "{:<16} 0x{:08x}", "sh_info", self.info)?;
        writeln!(out, "{:<16} 0x{:016x}", "sh_addralign", self.align)?;
        writeln!(out, "{:<16} 0x{:016x}", "sh_entsize", self.entry_size)
    }
}

/// The section header table. Headers are decoded on demand from the mapped file.
#[derive(Clone, Copy)]
pub struct SectionTable<'a> {
    reader: Reader<'a>,
    offset: Offset,
    count: u32,
}

impl<'a> SectionTable<'a> {
    /// The header must have already been validated.
    pub fn new(reader: Reader<'a>, header: &ElfHeader) -> Self {
        SectionTable {
            reader,
            offset: header.section_header_offset(0),
            count: u32::from(header.num_section_entries),
        }
    }

    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn get(&self, index: SectionIndex) -> Result<SectionHeader, KmiError> {
        require(index.0 < self.count, "invalid section index")?;
        let offset = Offset(self.offset.0 + u64::from(index.0) * SECTION_HEADER_SIZE);
        SectionHeader::new(self.reader, offset)
    }
}
