//! Attachment upload and removal.

use super::bugs::{edit_bug, get_bug};
use super::Backend;
use crate::blob::{attachment_path, BlobKind};
use crate::domain::{require_text, ActingUser, Attachment, Bug, BugEdit, BugId, ProjectId};
use crate::error::{Result, StorageError};
use crate::id_generation::generate_id;
use tracing::{info, warn};

/// Length of the unique prefix put in front of stored file names.
const UNIQUE_PREFIX_LENGTH: usize = 8;

/// Upload `bytes` for a bug or comment (`owner`) in `project`.
///
/// # Errors
///
/// - `StorageError::FileTooLarge` above the configured size limit
/// - `Error::Validation` for a blank file name
/// - `StorageError::Upload` if the blob store fails
pub async fn upload_attachment(
    backend: &Backend,
    project: &ProjectId,
    owner: &str,
    kind: BlobKind,
    file_name: &str,
    mime_type: &str,
    bytes: &[u8],
) -> Result<Attachment> {
    let name = require_text("File name", file_name)?;
    let size = bytes.len() as u64;
    let limit = backend.settings().max_attachment_bytes;
    if size > limit {
        return Err(StorageError::FileTooLarge { name, size, limit }.into());
    }

    let unique: String = generate_id("blob", &name)
        .chars()
        .take(UNIQUE_PREFIX_LENGTH)
        .collect();
    let path = attachment_path(project, kind, owner, &unique, &name);
    let url = backend.blobs().upload(&path, bytes, mime_type).await?;
    info!(path = %path, size, "Uploaded attachment");

    Ok(Attachment {
        name,
        url,
        storage_path: path,
        mime_type: mime_type.to_string(),
        size,
    })
}

/// Delete an attachment's blob.
///
/// # Errors
///
/// Returns `StorageError::Delete` if the blob store fails.
pub async fn remove_attachment(backend: &Backend, attachment: &Attachment) -> Result<()> {
    backend.blobs().delete(&attachment.storage_path).await?;
    info!(path = %attachment.storage_path, "Removed attachment");
    Ok(())
}

/// Upload a file and append it to a bug's attachments.
///
/// Follows the content edit rules of [`edit_bug`]. The append happens
/// inside the edit's transaction, so concurrent uploads to one bug all
/// land. If the edit is rejected the uploaded blob is removed again.
///
/// # Errors
///
/// Any error of [`upload_attachment`] or [`edit_bug`].
pub async fn attach_to_bug(
    backend: &Backend,
    bug_id: &BugId,
    file_name: &str,
    mime_type: &str,
    bytes: &[u8],
    actor: &ActingUser,
) -> Result<Bug> {
    let bug = get_bug(backend, bug_id).await?;
    let attachment = upload_attachment(
        backend,
        &bug.project_id,
        bug_id.as_str(),
        BlobKind::Bug,
        file_name,
        mime_type,
        bytes,
    )
    .await?;

    let edit = BugEdit {
        added_attachments: vec![attachment.clone()],
        ..BugEdit::default()
    };
    match edit_bug(backend, bug_id, edit, actor).await {
        Ok(bug) => Ok(bug),
        Err(e) => {
            if let Err(cleanup) = remove_attachment(backend, &attachment).await {
                warn!(path = %attachment.storage_path, error = %cleanup, "Failed to remove orphaned upload");
            }
            Err(e)
        }
    }
}
