mod cli;
mod commands;
mod elf;
mod errors;
mod utils;
use clap::Parser;
use cli::{Cli, Config};
use elf::KmiFile;
use errors::KmiError;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

use crate::utils::warn;

/// Name used to prefix diagnostics, i.e. the basename of argv[0].
fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kmi_dump".to_string())
}

fn report(cmd: &str, path: Option<&Path>, err: &KmiError) {
    match (err, path) {
        (KmiError::Usage(mesg), _) => eprint!("{mesg}"),
        (_, Some(path)) => warn(&format!("{cmd}: {}: {err}", path.display())),
        (_, None) => warn(&format!("{cmd}: {err}")),
    }
}

fn run(path: &Path, config: &Config) -> Result<(), KmiError> {
    let file = File::open(path).map_err(|e| KmiError::system("open(2) failed", e))?;
    let length = file
        .metadata()
        .map_err(|e| KmiError::system("stat(2) failed", e))?
        .len();

    // Empty files can't be mapped but still need to be reported as too small. Mapping
    // is unsafe because it has undefined behavior if the file is modified while the
    // map is in use.
    let map = if length == 0 {
        None
    } else {
        Some(unsafe { Mmap::map(&file) }.map_err(|e| KmiError::system("mmap(2) failed", e))?)
    };
    let bytes: &[u8] = map.as_deref().unwrap_or(&[]);
    log::debug!("mapped {} bytes from {}", bytes.len(), path.display());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = KmiFile::new(bytes, config, &mut out)
        .and_then(|kmi| commands::dump(&kmi, config, &mut out));
    match result {
        Ok(()) => out
            .flush()
            .map_err(|e| KmiError::system("fflush(stdout) failed", e)),
        Err(err) => {
            // debug output written before the failure is still useful
            let _ = out.flush();
            Err(err)
        }
    }
}

fn main() {
    env_logger::init();
    let cmd = program_name();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            report(&cmd, None, &KmiError::Usage(e.render().to_string()));
            process::exit(1);
        }
        Err(e) => {
            // --help and --version
            let _ = e.print();
            process::exit(0);
        }
    };
    let config = Config::from_env(&cli);
    log::debug!("{config:?}");

    if let Err(err) = run(&cli.file, &config) {
        report(&cmd, Some(cli.file.as_path()), &err);
        process::exit(1);
    }
}
