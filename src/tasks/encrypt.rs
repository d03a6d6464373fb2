use super::require_text;
use crate::context::TaskContext;
use crate::error::Result;
use crate::pdf::security::{self, AccessRights};
use crate::pdf::PdfDocument;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

fn allowed() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, clap::Args, schemars::JsonSchema)]
pub struct Params {
    #[arg(long)]
    pub pdf_path: PathBuf,
    #[arg(long)]
    pub output_path: PathBuf,
    /// Password needed to open the document
    #[arg(long)]
    pub user_password: String,
    /// Password for full access (default: the user password)
    #[arg(long)]
    pub owner_password: Option<String>,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(default = "allowed")]
    pub allow_printing: bool,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(default = "allowed")]
    pub allow_copying: bool,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(default = "allowed")]
    pub allow_modification: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub output_path: PathBuf,
}

#[instrument(skip_all, fields(pdf = %params.pdf_path.display()))]
pub fn run(params: Params, ctx: &TaskContext) -> Result<Output> {
    let user_password = require_text(&params.user_password, "user_password")?;
    let owner_password = params
        .owner_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(user_password);
    let rights = AccessRights {
        printing: params.allow_printing,
        copying: params.allow_copying,
        modification: params.allow_modification,
    };

    let mut pdf = PdfDocument::open(&params.pdf_path)?;
    let mut progress = ctx.progress(1).with_ceiling(90.0);
    progress.checkpoint()?;
    security::encrypt(&mut pdf.doc, user_password, owner_password, rights)?;
    progress.advance();

    PdfDocument::save(&mut pdf.doc, &params.output_path)?;
    progress.finish();

    info!(?rights, "PDF encrypted");
    Ok(Output {
        output_path: params.output_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::recording_context;
    use crate::pdf::document::load;
    use crate::pdf::fixtures;

    fn params(pdf_path: PathBuf, output_path: PathBuf, user: &str) -> Params {
        Params {
            pdf_path,
            output_path,
            user_password: user.into(),
            owner_password: None,
            allow_printing: true,
            allow_copying: false,
            allow_modification: false,
        }
    }

    #[test]
    fn test_encrypted_output_needs_password() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 2);
        let out = dir.path().join("locked.pdf");
        let (ctx, seen) = recording_context();

        run(params(pdf, out.clone(), "secret"), &ctx).unwrap();

        let err = PdfDocument::open(&out).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PasswordRequired);
        let doc = load(&out).unwrap();
        assert!(doc.authenticate_password("secret").is_ok());
        assert_eq!(*seen.lock().unwrap(), vec![90.0, 100.0]);
    }

    #[test]
    fn test_blank_user_password_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::write_pdf(dir.path(), "in.pdf", 1);
        let (ctx, _) = recording_context();
        let err = run(params(pdf, dir.path().join("out.pdf"), "  "), &ctx).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_permission_flags_default_to_allowed() {
        let params: Params = serde_json::from_value(serde_json::json!({
            "pdf_path": "in.pdf",
            "output_path": "out.pdf",
            "user_password": "pw",
        }))
        .unwrap();
        assert!(params.allow_printing && params.allow_copying && params.allow_modification);
    }
}
