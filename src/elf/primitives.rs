/// Index into the section table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SectionIndex(pub u32);

/// Index into a string table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct StringIndex(pub u32);

/// An index into a byte within an ELF file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Offset(pub u64);

/// A range of bytes within the ELF file. For no-data sections (.bss and friends) the
/// range may lie outside of the file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Extent {
    pub start: Offset,
    pub size: u64,
}

impl Offset {
    pub fn checked_add(self, rhs: u64) -> Option<Offset> {
        self.0.checked_add(rhs).map(Offset)
    }
}

impl Extent {
    pub fn from_raw(start: u64, size: u64) -> Self {
        Extent {
            start: Offset(start),
            size,
        }
    }

    /// One past the last byte, or None if that can't be represented.
    pub fn end(&self) -> Option<Offset> {
        self.start.checked_add(self.size)
    }
}
