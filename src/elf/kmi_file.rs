//! A validated relocatable object with its KMI_DEFINE section located.
use super::{
    ElfHeader, INFO_LINK_FLAG, Reader, RelocationTable, SectionHeader, SectionIndex, SectionTable,
    SectionType, SymbolTable,
};
use crate::cli::Config;
use crate::errors::KmiError;
use crate::utils::require;
use std::io::Write;

/// Section holding the values of the exported KMI symbols.
pub const KMI_SECTION: &[u8] = b"KMI_DEFINE";

/// Relocations against KMI_SECTION.
pub const RELA_KMI_SECTION: &[u8] = b".relaKMI_DEFINE";

pub struct KmiFile<'a> {
    pub reader: Reader<'a>,
    pub kmi_index: SectionIndex,
    pub kmi: SectionHeader,
    pub rela_kmi: Option<SectionHeader>,
    pub symbols: SymbolTable<'a>,
}

/// Sections found while walking the section table.
#[derive(Default)]
struct Located {
    kmi: Option<(SectionIndex, SectionHeader)>,
    rela_kmi: Option<SectionHeader>,
    symtab: Option<SectionHeader>,
}

impl<'a> KmiFile<'a> {
    /// Validates everything needed to dump the KMI values. In debug mode the header and
    /// sections are written to out as they are validated so a dump may precede an error.
    pub fn new(bytes: &'a [u8], config: &Config, out: &mut impl Write) -> Result<Self, KmiError> {
        let reader = Reader::new(bytes);
        let header = ElfHeader::new(reader)?;
        header.validate(reader.len())?;
        if config.debug {
            header.write_fields(&mut *out).map_err(KmiError::write)?;
            writeln!(out).map_err(KmiError::write)?;
        }

        let sections = SectionTable::new(reader, &header);
        let shstrtab = sections.get(SectionIndex(u32::from(header.string_table_index)))?;
        require(
            shstrtab.stype == SectionType::StringTable,
            "section header string section has wrong type",
        )?;
        shstrtab.validate(reader.len(), &shstrtab, sections.len())?;
        shstrtab.validate_string_table(reader)?;

        let located = locate(reader, &sections, &shstrtab, config, out)?;
        let Some((kmi_index, kmi)) = located.kmi else {
            return Err(KmiError::format("no KMI_DEFINE section"));
        };
        // symbol values are read from the KMI section so its bytes have to be in the file
        require(
            kmi.stype != SectionType::NoBits || kmi.obytes.size == 0,
            "KMI_DEFINE section has no data in file",
        )?;
        let Some(symtab) = located.symtab else {
            return Err(KmiError::format("no symbol table section"));
        };
        if let Some(rela) = &located.rela_kmi {
            require(
                rela.has_flag(INFO_LINK_FLAG),
                ".relaKMI_DEFINE not linked to KMI_DEFINE",
            )?;
            require(
                rela.info == kmi_index.0,
                ".relaKMI_DEFINE linked to wrong section",
            )?;
        }
        if config.debug {
            writeln!(out, "kmiix = 0x{:x}", kmi_index.0).map_err(KmiError::write)?;
        }
        log::debug!("KMI_DEFINE is section {}", kmi_index.0);

        let symbols = SymbolTable::new(reader, &sections, symtab)?;
        Ok(KmiFile {
            reader,
            kmi_index,
            kmi,
            rela_kmi: located.rela_kmi,
            symbols,
        })
    }

    /// Relocations against the KMI section, sorted by offset.
    pub fn relocations(&self) -> Result<RelocationTable<'a>, KmiError> {
        RelocationTable::new(self.reader, self.rela_kmi.as_ref())
    }

    /// The size bytes at value within the KMI section.
    pub fn kmi_value(&self, value: u64, size: u64) -> Result<&'a [u8], KmiError> {
        let start = self
            .kmi
            .obytes
            .start
            .checked_add(value)
            .ok_or_else(|| KmiError::format("KMI value offset overflows"))?;
        self.reader.slice(start, size)
    }
}

/// Validates each section and picks out the ones we need by name or type.
fn locate(
    reader: Reader,
    sections: &SectionTable,
    shstrtab: &SectionHeader,
    config: &Config,
    out: &mut impl Write,
) -> Result<Located, KmiError> {
    let mut located = Located::default();
    for i in 0..sections.len() {
        let index = SectionIndex(i);
        let section = sections.get(index)?;
        section.validate(reader.len(), shstrtab, sections.len())?;
        let name = shstrtab.string(reader, section.name)?;
        if config.debug {
            section
                .write_fields(&mut *out, name, index)
                .map_err(KmiError::write)?;
            writeln!(out).map_err(KmiError::write)?;
        }

        if name == KMI_SECTION {
            require(located.kmi.is_none(), "multiple KMI_DEFINE sections")?;
            located.kmi = Some((index, section.clone()));
        }
        if name == RELA_KMI_SECTION {
            require(
                located.rela_kmi.is_none(),
                "multiple .relaKMI_DEFINE sections",
            )?;
            located.rela_kmi = Some(section.clone());
        }
        if section.stype == SectionType::SymbolTable {
            require(located.symtab.is_none(), "multiple symbol table sections")?;
            located.symtab = Some(section);
        }
    }
    Ok(located)
}
