//! The link editing symbol table.
use super::{
    Offset, Reader, SectionHeader, SectionIndex, SectionTable, SectionType, Stream, StringIndex,
};
use crate::errors::KmiError;
use crate::utils::require;

pub const SYMBOL_SIZE: u64 = 24;

/// Reserved section index for symbols with an absolute value that will not change
/// with relocation.
pub const SHN_ABS: u16 = 0xfff1;

/// Elf64_Sym
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Symbol {
    /// Index into the symbol string table.
    pub name: StringIndex,

    /// Type and binding. Not interpreted.
    pub info: u8,

    /// Visibility. Not interpreted.
    pub other: u8,

    /// Section the value is relative to, or SHN_ABS and friends.
    pub section: u16,

    /// For the symbols we care about this is an offset into its section.
    pub value: u64,

    /// Number of bytes at value.
    pub size: u64,
}

impl Symbol {
    pub fn new(reader: Reader, offset: Offset) -> Result<Self, KmiError> {
        let mut s = Stream::new(reader, offset);
        let name = s.read_word()?; // 4
        let info = s.read_byte()?; // 1
        let other = s.read_byte()?; // 1
        let section = s.read_half()?; // 2
        let value = s.read_xword()?; // 8
        let size = s.read_xword()?; // 8
        Ok(Symbol {
            name: StringIndex(name),
            info,
            other,
            section,
            value,
            size,
        })
    }

    fn is_null(&self) -> bool {
        self.value == 0 && self.size == 0 && self.section == 0
    }
}

/// A validated symbol table along with the string table its names live in.
pub struct SymbolTable<'a> {
    reader: Reader<'a>,
    pub section: SectionHeader,
    pub strings: SectionHeader,
}

impl<'a> SymbolTable<'a> {
    /// Validates the symbol table found at section and every symbol within it.
    pub fn new(
        reader: Reader<'a>,
        sections: &SectionTable<'a>,
        section: SectionHeader,
    ) -> Result<Self, KmiError> {
        require(
            section.link < sections.len(),
            "symbol table string section is missing",
        )?;
        let strings = sections.get(SectionIndex(section.link))?;
        require(
            strings.stype == SectionType::StringTable,
            "string section for symbol table has wrong type",
        )?;
        require(
            section.entry_size == SYMBOL_SIZE,
            "invalid symbol table entry size",
        )?;
        require(
            section.obytes.size % SYMBOL_SIZE == 0,
            "symbol table size not a multiple of symbol size",
        )?;

        let table = SymbolTable {
            reader,
            section,
            strings,
        };
        table.validate(sections)?;
        Ok(table)
    }

    pub fn len(&self) -> u64 {
        self.section.obytes.size / SYMBOL_SIZE
    }

    pub fn get(&self, index: u64) -> Result<Symbol, KmiError> {
        let offset = index
            .checked_mul(SYMBOL_SIZE)
            .and_then(|delta| self.section.obytes.start.checked_add(delta))
            .ok_or_else(|| KmiError::format("symbol offset overflows"))?;
        Symbol::new(self.reader, offset)
    }

    /// Symbols in table order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Symbol, KmiError>> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    /// The symbol's name. Names have to be nul terminated within the string table, this
    /// is checked for every symbol when the table is created.
    pub fn name(&self, symbol: &Symbol) -> Result<&'a [u8], KmiError> {
        let start = self
            .strings
            .obytes
            .start
            .checked_add(u64::from(symbol.name.0))
            .ok_or_else(|| KmiError::format("symbol name offset overflows"))?;
        let end = self
            .strings
            .obytes
            .end()
            .ok_or_else(|| KmiError::format("string table end overflows"))?;
        self.reader.read_string(start, end)
    }

    fn validate(&self, sections: &SectionTable<'a>) -> Result<(), KmiError> {
        // Symbol zero is conventionally all zeros and references the (empty) section zero.
        let dummy_section_0 = sections.get(SectionIndex(0))?.obytes.size == 0;
        for (i, symbol) in self.iter().enumerate() {
            let symbol = symbol?;
            if i == 0 && symbol.is_null() && dummy_section_0 {
                continue;
            }
            require(
                u64::from(symbol.name.0) < self.strings.obytes.size,
                "string for name outside of string section",
            )?;
            self.name(&symbol)?;
            if u32::from(symbol.section) >= sections.len() {
                if symbol.section == SHN_ABS {
                    continue;
                }
                return Err(KmiError::format("invalid section header index in symbol"));
            }
            let section = sections.get(SectionIndex(u32::from(symbol.section)))?;
            let end = symbol.value.checked_add(symbol.size).ok_or_else(|| {
                KmiError::format("overflow computing end location of value in section")
            })?;
            require(end <= section.obytes.size, "value outside of section")?;
        }
        log::debug!("validated {} symbols", self.len());
        Ok(())
    }
}
