//! Password protection through the standard security handler.

use crate::error::{Result, TaskError};
use crate::pdf::document::strip_encryption;
use lopdf::{Document, EncryptionState, EncryptionVersion, Object, Permissions, StringFormat};
use tracing::debug;

/// RC4 key length in bits.
const KEY_LENGTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights {
    pub printing: bool,
    pub copying: bool,
    pub modification: bool,
}

impl AccessRights {
    fn permissions(self) -> Permissions {
        let mut permissions = Permissions::empty();
        if self.printing {
            permissions |= Permissions::PRINTABLE | Permissions::PRINTABLE_IN_HIGH_QUALITY;
        }
        if self.copying {
            permissions |= Permissions::COPYABLE | Permissions::COPYABLE_FOR_ACCESSIBILITY;
        }
        if self.modification {
            permissions |= Permissions::MODIFIABLE
                | Permissions::ANNOTABLE
                | Permissions::FILLABLE
                | Permissions::ASSEMBLABLE;
        }
        permissions
    }
}

/// Encrypt every string and stream of `doc` in place.
pub fn encrypt(
    doc: &mut Document,
    user_password: &str,
    owner_password: &str,
    rights: AccessRights,
) -> Result<()> {
    ensure_file_id(doc);

    let version = EncryptionVersion::V2 {
        document: doc,
        owner_password,
        user_password,
        key_length: KEY_LENGTH,
        permissions: rights.permissions(),
    };
    let state = EncryptionState::try_from(version)
        .map_err(|e| TaskError::library("Failed to set up encryption", e))?;
    doc.encrypt(&state)
        .map_err(|e| TaskError::library("Failed to encrypt PDF", e))?;
    debug!(?rights, "Document encrypted");
    Ok(())
}

/// Outcome of checking a password against a freshly loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlock {
    NotEncrypted,
    /// The security handler is gone and `doc` can be saved in the clear.
    Decrypted,
    /// The password is right, but the loader only decrypts files whose user
    /// password is empty, so the body has to be decrypted by another tool.
    NeedsExternalDecryption,
}

pub fn unlock(doc: &mut Document, password: &str) -> Result<Unlock> {
    if doc.encryption_state.is_some() {
        doc.authenticate_password(password)
            .map_err(|_| TaskError::InvalidPassword)?;
        strip_encryption(doc);
        return Ok(Unlock::Decrypted);
    }

    if !doc.is_encrypted() {
        return Ok(Unlock::NotEncrypted);
    }

    doc.authenticate_password(password)
        .map_err(|_| TaskError::InvalidPassword)?;
    Ok(Unlock::NeedsExternalDecryption)
}

/// Key derivation hashes the first file identifier, so one must exist.
fn ensure_file_id(doc: &mut Document) {
    if doc.trailer.get(b"ID").is_ok() {
        return;
    }
    let id = uuid::Uuid::new_v4().as_bytes().to_vec();
    doc.trailer.set(
        "ID",
        vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ],
    );
}
