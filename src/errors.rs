use std::error::Error;
use std::fmt;
use std::io;

/// Everything that can go wrong while dumping an object file. All of these are fatal:
/// main prints them once and exits with a non-zero status.
#[derive(Debug)]
pub enum KmiError {
    /// Bad invocation.
    Usage(String),

    /// Open, stat, map, write, or flush failed.
    System { context: String, source: io::Error },

    /// The file isn't a relocatable ARM64 object we can make sense of.
    Format(String),
}

impl KmiError {
    pub fn format(mesg: impl Into<String>) -> Self {
        KmiError::Format(mesg.into())
    }

    pub fn system(context: impl Into<String>, source: io::Error) -> Self {
        KmiError::System {
            context: context.into(),
            source,
        }
    }

    /// Used for failures writing to the output stream.
    pub fn write(source: io::Error) -> Self {
        KmiError::system("write to standard output failed", source)
    }
}

impl fmt::Display for KmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KmiError::Usage(mesg) => f.write_str(mesg),
            KmiError::System { context, source } => write!(f, "{context}: {source}"),
            KmiError::Format(mesg) => f.write_str(mesg),
        }
    }
}

impl Error for KmiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            KmiError::System { source, .. } => Some(source),
            _ => None,
        }
    }
}
