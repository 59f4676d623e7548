pub mod styles;
#[cfg(test)]
pub mod test_object;

pub use styles::*;

use crate::errors::KmiError;

pub fn require(predicate: bool, err: &str) -> Result<(), KmiError> {
    if predicate {
        Ok(())
    } else {
        Err(KmiError::format(err))
    }
}

pub fn warn(mesg: &str) {
    eprintln!("{}", mesg.warn());
}
