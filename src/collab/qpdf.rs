use super::{locate, run_tool};
use crate::error::{Result, TaskError};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Writes a decrypted copy of a password-protected PDF.
pub trait Decryptor {
    fn decrypt(&self, input: &Path, password: &str, output: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct Qpdf {
    path: Option<PathBuf>,
}

impl Qpdf {
    pub fn new(path: Option<PathBuf>) -> Self {
        Qpdf { path }
    }
}

impl Decryptor for Qpdf {
    #[instrument(skip(self, password), fields(input = %input.display()))]
    fn decrypt(&self, input: &Path, password: &str, output: &Path) -> Result<()> {
        let program = locate("qpdf", self.path.as_deref())?;
        let mut password_arg = OsString::from("--password=");
        password_arg.push(password);

        match run_tool(
            "qpdf",
            &program,
            [
                password_arg.as_os_str(),
                OsStr::new("--decrypt"),
                input.as_os_str(),
                output.as_os_str(),
            ],
        ) {
            Ok(_) => Ok(()),
            Err(TaskError::Collaborator { message, .. })
                if message.contains("invalid password") =>
            {
                Err(TaskError::InvalidPassword)
            }
            Err(e) => Err(e),
        }
    }
}
