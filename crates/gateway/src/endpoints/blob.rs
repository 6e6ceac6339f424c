use arena_store::BlobOwner;

use super::RequestContext;
use crate::dispatch::{BoundParameters, Reply};
use crate::error::ApiError;

/// A blob is only as visible as the `ImageUrl` of the record it belongs to.
/// Blobs no person or group points at are not served.
pub(super) fn get_blob(ctx: &RequestContext<'_>, params: &BoundParameters) -> Result<Reply, ApiError> {
    let blob_id = params.require_int("blobID")?;
    let visible = match ctx.store().blob_owner(blob_id)? {
        Some(BlobOwner::Person(person)) => ctx.person_field_visible(&person, "ImageUrl"),
        Some(BlobOwner::Group(group)) => ctx.group_field_visible(&group, "ImageUrl"),
        None => return Err(ApiError::not_found("blob")),
    };
    if !visible {
        tracing::debug!(
            blob_id,
            caller = ctx.caller.subject.person_id,
            "blob.view_denied"
        );
        return Err(ApiError::access_denied());
    }
    raw_blob(ctx, blob_id, "blob")
}

/// Passes the stored bytes through with their recorded MIME type.
pub(super) fn raw_blob(
    ctx: &RequestContext<'_>,
    blob_id: i32,
    what: &str,
) -> Result<Reply, ApiError> {
    let blob = ctx
        .store()
        .blob(blob_id)?
        .ok_or_else(|| ApiError::not_found(what))?;
    let bytes = blob.bytes().map_err(|err| {
        tracing::error!(blob_id, error = %err, "blob.decode_failed");
        ApiError::internal()
    })?;

    let content_type = if blob.mime_type.trim().is_empty() {
        "application/octet-stream".to_string()
    } else {
        blob.mime_type
    };
    Ok(Reply::raw(content_type, bytes))
}
