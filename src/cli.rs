//! Command line arguments and the run configuration derived from them.
use crate::commands::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Set to dump the ELF header and section headers before the values.
pub const DEBUG_VAR: &str = "KMI_DUMP_DEBUG";

/// Set to include values the linker will relocate.
pub const RELOC_VAR: &str = "KMI_DUMP_RELOC";

#[derive(Parser)]
#[command(version, long_about = None)]
#[command(override_usage = "kmi_dump [-e] file.o")]
#[command(
    about = "Dumps values of symbols in KMI_DEFINE section in colon table format or with -e as enum declarations."
)]
pub struct Cli {
    /// Write the values as C enum declarations
    #[arg(short = 'e')]
    pub enums: bool,

    /// ARM64 relocatable object file
    pub file: PathBuf,
}

/// Settings for a run. These are fixed once main starts working on the file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Config {
    pub format: OutputFormat,

    /// Dump the header and section fields as they are validated.
    pub debug: bool,

    /// Dump values at relocated addresses instead of skipping them.
    pub include_relocated: bool,
}

impl Config {
    /// The environment variables only need to be present, their values are ignored.
    pub fn new(cli: &Cli, is_set: impl Fn(&str) -> bool) -> Self {
        Config {
            format: if cli.enums {
                OutputFormat::Enum
            } else {
                OutputFormat::Raw
            },
            debug: is_set(DEBUG_VAR),
            include_relocated: is_set(RELOC_VAR),
        }
    }

    pub fn from_env(cli: &Cli) -> Self {
        Config::new(cli, |name| std::env::var_os(name).is_some())
    }
}
