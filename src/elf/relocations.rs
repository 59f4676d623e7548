//! Relocations against the KMI section. These aren't applied: all we need to know is
//! which KMI values the linker will patch.
use super::{Offset, Reader, SectionHeader, Stream};
use crate::errors::KmiError;
use crate::utils::require;

pub const RELA_SIZE: u64 = 24;

/// Elf64_Rela
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Relocation {
    /// Offset within the section being relocated.
    pub offset: u64,

    /// Symbol index and relocation type. Not interpreted.
    pub info: u64,

    pub addend: i64,
}

impl Relocation {
    pub fn new(reader: Reader, offset: Offset) -> Result<Self, KmiError> {
        let mut s = Stream::new(reader, offset);
        Ok(Relocation {
            offset: s.read_xword()?,
            info: s.read_xword()?,
            addend: s.read_sxword()?,
        })
    }
}

/// The relocation entries as they appear in the file.
#[derive(Clone, Copy)]
pub struct RelaEntries<'a> {
    reader: Reader<'a>,
    start: Offset,
    count: u64,
}

impl<'a> RelaEntries<'a> {
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn get(&self, index: u64) -> Result<Relocation, KmiError> {
        // the section was checked to lie within the file so this can't overflow
        Relocation::new(self.reader, Offset(self.start.0 + index * RELA_SIZE))
    }

    pub fn offset_at(&self, index: u64) -> Result<u64, KmiError> {
        self.reader
            .read_xword(Offset(self.start.0 + index * RELA_SIZE))
    }
}

/// The relocation offsets for the KMI section sorted by offset. If the file already
/// has them in order they are used in place, otherwise they are copied and sorted.
pub enum RelocationTable<'a> {
    /// There is no .relaKMI_DEFINE section.
    Absent,

    /// The entries in the file were already sorted.
    InPlace(RelaEntries<'a>),

    /// A sorted copy of the entries in the file.
    Sorted(Vec<Relocation>),
}

impl<'a> RelocationTable<'a> {
    pub fn new(reader: Reader<'a>, section: Option<&SectionHeader>) -> Result<Self, KmiError> {
        let Some(section) = section else {
            return Ok(RelocationTable::Absent);
        };
        require(
            section.entry_size == RELA_SIZE,
            "invalid reloc table entry size",
        )?;
        require(
            section.obytes.size % RELA_SIZE == 0,
            "reloc table size not a multiple of reloc size",
        )?;
        // make sure the whole table is in the file before indexing into it
        reader.slice(section.obytes.start, section.obytes.size)?;

        let entries = RelaEntries {
            reader,
            start: section.obytes.start,
            count: section.obytes.size / RELA_SIZE,
        };
        if is_sorted(&entries)? {
            log::debug!("{} KMI relocations are already sorted", entries.len());
            return Ok(RelocationTable::InPlace(entries));
        }

        log::debug!("sorting {} KMI relocations", entries.len());
        let mut copy = (0..entries.len())
            .map(|i| entries.get(i))
            .collect::<Result<Vec<_>, _>>()?;
        copy.sort_unstable_by_key(|r| r.offset);
        Ok(RelocationTable::Sorted(copy))
    }

    pub fn len(&self) -> u64 {
        match self {
            RelocationTable::Absent => 0,
            RelocationTable::InPlace(entries) => entries.len(),
            RelocationTable::Sorted(copy) => copy.len() as u64,
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, RelocationTable::Sorted(_))
    }

    /// Offsets in ascending order.
    #[cfg(test)]
    pub fn offsets(&self) -> Result<Vec<u64>, KmiError> {
        match self {
            RelocationTable::Absent => Ok(Vec::new()),
            RelocationTable::InPlace(entries) => {
                (0..entries.len()).map(|i| entries.offset_at(i)).collect()
            }
            RelocationTable::Sorted(copy) => Ok(copy.iter().map(|r| r.offset).collect()),
        }
    }

    /// Returns true if a relocation applies to the KMI section relative address.
    pub fn contains(&self, addr: u64) -> Result<bool, KmiError> {
        match self {
            RelocationTable::Absent => Ok(false),
            RelocationTable::InPlace(entries) => {
                // binary search for the first entry >= addr
                let mut lo = 0;
                let mut hi = entries.len();
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if entries.offset_at(mid)? < addr {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                Ok(lo < entries.len() && entries.offset_at(lo)? == addr)
            }
            RelocationTable::Sorted(copy) => {
                Ok(copy.binary_search_by_key(&addr, |r| r.offset).is_ok())
            }
        }
    }
}

fn is_sorted(entries: &RelaEntries) -> Result<bool, KmiError> {
    let mut previous = None;
    for i in 0..entries.len() {
        let offset = entries.offset_at(i)?;
        if previous.is_some_and(|p| p > offset) {
            return Ok(false);
        }
        previous = Some(offset);
    }
    Ok(true)
}
