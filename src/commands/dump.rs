//! Writes the values of the exported KMI symbols.
use crate::cli::Config;
use crate::elf::KmiFile;
use crate::errors::KmiError;
use std::io::Write;

/// Only symbols with this prefix are exported. It isn't part of the dumped name.
pub const KMI_PREFIX: &[u8] = b"__kmi_v_";

/// Dumps the KMI symbols in symbol table order. Unless the config says otherwise values
/// the linker will relocate are skipped: their bytes in the file aren't the final value.
pub fn dump(file: &KmiFile, config: &Config, out: &mut impl Write) -> Result<(), KmiError> {
    let relocations = file.relocations()?;
    log::debug!(
        "{} KMI relocations, copied: {}",
        relocations.len(),
        relocations.is_copy()
    );
    let mut count = 0;
    for symbol in file.symbols.iter() {
        let symbol = symbol?;
        if u32::from(symbol.section) != file.kmi_index.0 {
            continue;
        }
        if !config.include_relocated && relocations.contains(symbol.value)? {
            log::debug!("skipping relocated value at 0x{:x}", symbol.value);
            continue;
        }
        let Some(name) = file.symbols.name(&symbol)?.strip_prefix(KMI_PREFIX) else {
            continue;
        };

        let value = file.kmi_value(symbol.value, symbol.size)?;
        config
            .format
            .write_value(out, name, value)
            .map_err(KmiError::write)?;
        count += 1;
    }
    log::info!("dumped {count} KMI values");
    Ok(())
}
