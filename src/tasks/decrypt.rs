use crate::context::TaskContext;
use crate::error::Result;
use crate::pdf::document::{ensure_parent_dir, load};
use crate::pdf::security::{self, Unlock};
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    #[arg(long)]
    pub output_path: PathBuf,
    /// User or owner password
    #[arg(long)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
    /// False when the input had no password and was copied unchanged.
    pub was_encrypted: bool,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let mut doc = load(&params.pdf_path)?;
    let mut progress = ctx.progress(1).with_ceiling(90.0);
    progress.checkpoint()?;

    let outcome = security::unlock(&mut doc, &params.password)?;
    progress.advance();
    match outcome {
        Unlock::NotEncrypted | Unlock::Decrypted => {
            PdfDocument::save(&mut doc, &params.output_path)?;
        }
        Unlock::NeedsExternalDecryption => {
            ensure_parent_dir(&params.output_path)?;
            ctx.collaborators().decryptor.decrypt(
                &params.pdf_path,
                &params.password,
                &params.output_path,
            )?;
        }
    }
    progress.finish();

    let was_encrypted = outcome != Unlock::NotEncrypted;
    info!(?outcome, "PDF decrypted");
    Ok(Output {
        output_path: params.output_path,
        was_encrypted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Collaborators, Decryptor};
    use crate::config::ToolPaths;
    use crate::context::tests::recording_context;
    use crate::error::TaskError;
    use crate::pdf::fixtures;
    use crate::pdf::security::AccessRights;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    const ALL: AccessRights = AccessRights {
        printing: true,
        copying: true,
        modification: true,
    };

    fn write_encrypted(dir: &Path, user: &str, owner: &str) -> PathBuf {
        let mut doc = fixtures::document(2);
        security::encrypt(&mut doc, user, owner, ALL).unwrap();
        fixtures::save(doc, dir, "locked.pdf")
    }

    fn params(pdf_path: PathBuf, output_path: PathBuf, password: &str) -> Params {
        Params {
            pdf_path,
            output_path,
            password: password.into(),
        }
    }

    /// Copies the input and records the password it was given.
    struct CopyingDecryptor(Arc<Mutex<Vec<String>>>);

    impl Decryptor for CopyingDecryptor {
        fn decrypt(&self, input: &Path, password: &str, output: &Path) -> Result<()> {
            self.0.lock().unwrap().push(password.to_string());
            std::fs::copy(input, output)?;
            Ok(())
        }
    }

    #[test]
    fn test_plain_pdf_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 3);
        let out = dir.path().join("out.pdf");
        let (ctx, _) = recording_context();

        let result = run(params(pdf, out.clone(), "whatever"), &ctx).unwrap();
        assert!(!result.was_encrypted);
        assert_eq!(PdfDocument::open(&out).unwrap().page_count(), 3);
    }

    #[test]
    fn test_owner_password_on_empty_user_password() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = write_encrypted(dir.path(), "", "owner");
        let out = dir.path().join("out.pdf");
        let (ctx, seen) = recording_context();

        let result = run(params(pdf, out.clone(), "owner"), &ctx).unwrap();
        assert!(result.was_encrypted);
        let saved = PdfDocument::open(&out).unwrap();
        assert!(!saved.doc.is_encrypted());
        assert_eq!(*seen.lock().unwrap(), vec![90.0, 100.0]);
    }

    #[test]
    fn test_user_password_goes_to_decryptor() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = write_encrypted(dir.path(), "secret", "owner");
        let out = dir.path().join("nested").join("out.pdf");
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut collaborators = Collaborators::system(&ToolPaths::default());
        collaborators.decryptor = Box::new(CopyingDecryptor(Arc::clone(&calls)));
        let (ctx, _) = recording_context();
        let ctx = ctx.with_collaborators(collaborators);

        let result = run(params(pdf, out.clone(), "secret"), &ctx).unwrap();
        assert!(result.was_encrypted);
        assert!(out.exists());
        assert_eq!(*calls.lock().unwrap(), vec!["secret".to_string()]);
    }

    #[test]
    fn test_wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = write_encrypted(dir.path(), "secret", "owner");
        let out = dir.path().join("out.pdf");
        let (ctx, _) = recording_context();

        let err = run(params(pdf, out.clone(), "guess"), &ctx).unwrap_err();
        assert!(matches!(err, TaskError::InvalidPassword));
        assert_eq!(err.to_string(), "Invalid password - could not decrypt PDF");
        assert!(!out.exists());
    }
}
