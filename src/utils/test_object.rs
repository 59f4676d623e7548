//! Builds small but well formed ARM64 relocatable objects for unit tests. Tests then
//! poke at individual fields of the result to exercise the validation code.
//!
//! Layout of the built object:
//! * ELF header
//! * section data, each followed by a nul and aligned to 8 bytes
//! * section header table, always last in the file
//!
//! Sections are, in order: null, KMI_DEFINE, .data, [.relaKMI_DEFINE], [a second
//! KMI_DEFINE], .symtab, .strtab, .shstrtab.

const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_RELA: u32 = 4;

const SHF_WRITE: u64 = 0x1;
const SHF_ALLOC: u64 = 0x2;
const SHF_INFO_LINK: u64 = 0x40;

const R_AARCH64_ABS64: u64 = 257;

const KMI_INDEX: u16 = 1;
const DATA_INDEX: u16 = 2;

/// Section a test symbol is defined in.
#[derive(Clone, Copy, Debug)]
pub enum Shndx {
    Kmi,
    Data,
    Abs,
    Undef,
    Raw(u16),
}

impl Shndx {
    fn value(self) -> u16 {
        match self {
            Shndx::Kmi => KMI_INDEX,
            Shndx::Data => DATA_INDEX,
            Shndx::Abs => 0xfff1,
            Shndx::Undef => 0,
            Shndx::Raw(n) => n,
        }
    }
}

struct TestSymbol {
    name: String,
    shndx: Shndx,
    value: u64,
    size: u64,
}

struct TestSection {
    name: &'static str,
    stype: u32,
    flags: u64,
    link: u32,
    info: u32,
    align: u64,
    entry_size: u64,
    data: Vec<u8>,
}

impl TestSection {
    fn new(name: &'static str, stype: u32, data: Vec<u8>) -> Self {
        TestSection {
            name,
            stype,
            flags: 0,
            link: 0,
            info: 0,
            align: 1,
            entry_size: 0,
            data,
        }
    }
}

pub struct ObjectBuilder {
    kmi_data: Vec<u8>,
    symbols: Vec<TestSymbol>,
    relocations: Option<Vec<u64>>,
    duplicate_kmi: bool,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        ObjectBuilder {
            kmi_data: vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
            symbols: Vec::new(),
            relocations: None,
            duplicate_kmi: false,
        }
    }

    pub fn kmi_data(mut self, data: &[u8]) -> Self {
        self.kmi_data = data.to_vec();
        self
    }

    pub fn symbol(mut self, name: &str, shndx: Shndx, value: u64, size: u64) -> Self {
        self.symbols.push(TestSymbol {
            name: name.to_string(),
            shndx,
            value,
            size,
        });
        self
    }

    /// Adds a .relaKMI_DEFINE section with an entry for each offset, in the given
    /// order. An empty slice still adds the (empty) section.
    pub fn relocations(mut self, offsets: &[u64]) -> Self {
        self.relocations = Some(offsets.to_vec());
        self
    }

    pub fn duplicate_kmi(mut self) -> Self {
        self.duplicate_kmi = true;
        self
    }

    pub fn build(self) -> TestObject {
        let mut sections = vec![TestSection::new("", 0, Vec::new())];

        let mut kmi = TestSection::new("KMI_DEFINE", SHT_PROGBITS, self.kmi_data.clone());
        kmi.flags = SHF_ALLOC;
        kmi.align = 8;
        sections.push(kmi);

        let mut data = TestSection::new(".data", SHT_PROGBITS, vec![0xaa; 8]);
        data.flags = SHF_WRITE | SHF_ALLOC;
        data.align = 8;
        sections.push(data);

        let extra = usize::from(self.relocations.is_some()) + usize::from(self.duplicate_kmi);
        let symtab_index = (sections.len() + extra) as u32;

        if let Some(offsets) = &self.relocations {
            let mut bytes = Vec::new();
            for offset in offsets {
                bytes.extend_from_slice(&offset.to_le_bytes());
                bytes.extend_from_slice(&R_AARCH64_ABS64.to_le_bytes());
                bytes.extend_from_slice(&0i64.to_le_bytes());
            }
            let mut rela = TestSection::new(".relaKMI_DEFINE", SHT_RELA, bytes);
            rela.flags = SHF_INFO_LINK;
            rela.link = symtab_index;
            rela.info = u32::from(KMI_INDEX);
            rela.align = 8;
            rela.entry_size = 24;
            sections.push(rela);
        }

        if self.duplicate_kmi {
            let mut dup = TestSection::new("KMI_DEFINE", SHT_PROGBITS, self.kmi_data.clone());
            dup.flags = SHF_ALLOC;
            dup.align = 8;
            sections.push(dup);
        }

        let mut strtab = vec![0];
        let mut symtab = vec![0; 24];
        for symbol in &self.symbols {
            let name = strtab.len() as u32;
            strtab.extend_from_slice(symbol.name.as_bytes());
            strtab.push(0);

            symtab.extend_from_slice(&name.to_le_bytes());
            symtab.push(0x11); // STB_GLOBAL, STT_OBJECT
            symtab.push(0);
            symtab.extend_from_slice(&symbol.shndx.value().to_le_bytes());
            symtab.extend_from_slice(&symbol.value.to_le_bytes());
            symtab.extend_from_slice(&symbol.size.to_le_bytes());
        }

        let mut sym = TestSection::new(".symtab", SHT_SYMTAB, symtab);
        sym.link = symtab_index + 1;
        sym.info = 1;
        sym.align = 8;
        sym.entry_size = 24;
        sections.push(sym);
        sections.push(TestSection::new(".strtab", SHT_STRTAB, strtab));
        sections.push(TestSection::new(".shstrtab", SHT_STRTAB, Vec::new()));

        let mut shstrtab = vec![0];
        let mut names = Vec::new();
        for section in &sections {
            if section.name.is_empty() {
                names.push(0u32);
            } else {
                names.push(shstrtab.len() as u32);
                shstrtab.extend_from_slice(section.name.as_bytes());
                shstrtab.push(0);
            }
        }
        let shstrtab_index = sections.len() - 1;
        sections[shstrtab_index].data = shstrtab;

        let mut bytes = vec![0; 64];
        let mut offsets = Vec::new();
        for (i, section) in sections.iter().enumerate() {
            if i == 0 {
                offsets.push(0u64);
                continue;
            }
            align(&mut bytes);
            offsets.push(bytes.len() as u64);
            bytes.extend_from_slice(&section.data);
            bytes.push(0);
        }

        align(&mut bytes);
        let shoff = bytes.len() as u64;
        for (i, section) in sections.iter().enumerate() {
            bytes.extend_from_slice(&names[i].to_le_bytes());
            bytes.extend_from_slice(&section.stype.to_le_bytes());
            bytes.extend_from_slice(&section.flags.to_le_bytes());
            bytes.extend_from_slice(&0u64.to_le_bytes());
            bytes.extend_from_slice(&offsets[i].to_le_bytes());
            bytes.extend_from_slice(&(section.data.len() as u64).to_le_bytes());
            bytes.extend_from_slice(&section.link.to_le_bytes());
            bytes.extend_from_slice(&section.info.to_le_bytes());
            let alignment = if i == 0 { 0 } else { section.align };
            bytes.extend_from_slice(&alignment.to_le_bytes());
            bytes.extend_from_slice(&section.entry_size.to_le_bytes());
        }

        let mut object = TestObject { bytes };
        object.bytes[..8].copy_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
        object.set_u16(16, 1); // ET_REL
        object.set_u16(18, 183); // EM_AARCH64
        object.set_u32(20, 1);
        object.set_u64(40, shoff);
        object.set_u16(52, 64);
        object.set_u16(58, 64);
        object.set_u16(60, sections.len() as u16);
        object.set_u16(62, shstrtab_index as u16);
        object
    }
}

fn align(bytes: &mut Vec<u8>) {
    while bytes.len() % 8 != 0 {
        bytes.push(0);
    }
}

/// The bytes of an object file along with helpers to find and patch its fields.
pub struct TestObject {
    pub bytes: Vec<u8>,
}

impl TestObject {
    pub fn get_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes(self.bytes[offset..offset + 2].try_into().unwrap())
    }

    pub fn get_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap())
    }

    pub fn get_u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.bytes[offset..offset + 8].try_into().unwrap())
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }

    pub fn set_u16(&mut self, offset: usize, value: u16) {
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_u64(&mut self, offset: usize, value: u64) {
        self.bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn section_count(&self) -> usize {
        usize::from(self.get_u16(60))
    }

    /// File offset of the header for section index.
    pub fn section_header(&self, index: usize) -> usize {
        self.get_u64(40) as usize + index * 64
    }

    pub fn section_offset(&self, index: usize) -> usize {
        self.get_u64(self.section_header(index) + 24) as usize
    }

    /// File offset just past the data for section index.
    pub fn section_end(&self, index: usize) -> usize {
        self.section_offset(index) + self.get_u64(self.section_header(index) + 32) as usize
    }

    fn name_offset(&self, index: usize) -> usize {
        let shstrtab = usize::from(self.get_u16(62));
        self.section_offset(shstrtab) + self.get_u32(self.section_header(index)) as usize
    }

    fn section_name(&self, index: usize) -> &[u8] {
        let start = self.name_offset(index);
        let len = self.bytes[start..].iter().position(|b| *b == 0).unwrap();
        &self.bytes[start..start + len]
    }

    pub fn find_section_index(&self, name: &str) -> Option<u32> {
        (0..self.section_count())
            .find(|i| self.section_name(*i) == name.as_bytes())
            .map(|i| i as u32)
    }

    pub fn section_index(&self, name: &str) -> u32 {
        self.find_section_index(name)
            .unwrap_or_else(|| panic!("no {name} section"))
    }

    /// File offset of symbol index within .symtab.
    pub fn symbol_offset(&self, index: usize) -> usize {
        self.section_offset(self.section_index(".symtab") as usize) + index * 24
    }

    /// Names of the same length are rewritten in place, otherwise the section is pointed
    /// at the name of an existing section.
    pub fn rename_section(&mut self, from: &str, to: &str) {
        let index = self.section_index(from) as usize;
        if from.len() == to.len() {
            let start = self.name_offset(index);
            self.bytes[start..start + to.len()].copy_from_slice(to.as_bytes());
        } else {
            let other = self.section_index(to) as usize;
            let name = self.get_u32(self.section_header(other));
            self.set_u32(self.section_header(index), name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let object = ObjectBuilder::new()
            .relocations(&[0])
            .duplicate_kmi()
            .build();
        assert_eq!(object.section_count(), 8);
        assert_eq!(object.section_index("KMI_DEFINE"), 1);
        assert_eq!(object.section_index(".data"), 2);
        assert_eq!(object.section_index(".relaKMI_DEFINE"), 3);
        assert_eq!(object.section_index(".symtab"), 5);
        assert_eq!(object.find_section_index(".bss"), None);

        // the section header table is last
        assert_eq!(object.section_header(object.section_count()), object.bytes.len());

        // string tables are followed by a nul
        let shstrtab = object.section_index(".shstrtab") as usize;
        assert_eq!(object.bytes[object.section_end(shstrtab)], 0);
    }

    #[test]
    fn renames() {
        let mut object = ObjectBuilder::new().relocations(&[]).build();
        object.rename_section(".data", ".relaKMI_DEFINE");
        assert_eq!(object.section_index(".relaKMI_DEFINE"), 2);
        object.rename_section("KMI_DEFINE", "KMI_DEFINF");
        assert_eq!(object.find_section_index("KMI_DEFINE"), None);
    }
}
