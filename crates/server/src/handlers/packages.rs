//! Package upload, removal and listing endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use bytes::Bytes;
use depot_metadata::PackageRow;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

/// Multipart field carrying the package archive.
pub const PACKAGE_FIELD: &str = "package";
/// Multipart field carrying the optional detached signature.
pub const SIGNATURE_FIELD: &str = "signature";

/// Response for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub repo: String,
    pub file_name: String,
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub checksum: String,
}

impl From<PackageRow> for UploadResponse {
    fn from(row: PackageRow) -> Self {
        Self {
            repo: row.repo_name,
            file_name: row.file_name,
            name: row.name,
            version: row.version,
            architecture: row.architecture,
            checksum: row.checksum,
        }
    }
}

/// Response for a successful removal.
#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub repo: String,
    pub file_name: String,
}

/// One entry of the package listing.
#[derive(Debug, Serialize)]
pub struct PackageSummary {
    pub file_name: String,
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub checksum: String,
    pub compressed_size: i64,
    pub has_signature: bool,
    pub ingested_at: String,
}

impl TryFrom<PackageRow> for PackageSummary {
    type Error = ApiError;

    fn try_from(row: PackageRow) -> ApiResult<Self> {
        let ingested_at = row
            .ingested_at
            .format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))?;
        Ok(Self {
            has_signature: row.has_signature(),
            file_name: row.file_name,
            name: row.name,
            version: row.version,
            architecture: row.architecture,
            checksum: row.checksum,
            compressed_size: row.compressed_size,
            ingested_at,
        })
    }
}

/// Package listing response.
#[derive(Debug, Serialize)]
pub struct ListPackagesResponse {
    pub repo: String,
    pub packages: Vec<PackageSummary>,
}

/// POST /api/unstable/{repo}/package
#[tracing::instrument(skip(state, multipart), fields(repo = %repo))]
pub async fn upload_package(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut package: Option<(String, Bytes)> = None;
    let mut signature: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(PACKAGE_FIELD) => {
                let file_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ApiError::BadRequest("package part must carry a filename".to_string())
                    })?;
                if package.is_some() {
                    return Err(ApiError::BadRequest(
                        "only one package part is allowed".to_string(),
                    ));
                }
                package = Some((file_name, field.bytes().await?));
            }
            Some(SIGNATURE_FIELD) => {
                signature = Some(field.bytes().await?);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unknown multipart field");
            }
        }
    }

    let (file_name, archive) =
        package.ok_or_else(|| ApiError::BadRequest("missing package part".to_string()))?;

    let row = state
        .engine
        .add_package(&repo, &file_name, archive, signature)
        .await?;

    Ok(Json(row.into()))
}

/// DELETE /api/unstable/{repo}/package/{file_name}
#[tracing::instrument(skip(state))]
pub async fn remove_package(
    State(state): State<AppState>,
    Path((repo, file_name)): Path<(String, String)>,
) -> ApiResult<Json<RemoveResponse>> {
    let row = state.engine.remove_package(&repo, &file_name).await?;

    Ok(Json(RemoveResponse {
        repo: row.repo_name,
        file_name: row.file_name,
    }))
}

/// GET /api/unstable/{repo}/packages
pub async fn list_packages(
    State(state): State<AppState>,
    Path(repo): Path<String>,
) -> ApiResult<Json<ListPackagesResponse>> {
    let packages = state
        .engine
        .list_packages(&repo)
        .await?
        .into_iter()
        .map(PackageSummary::try_from)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(ListPackagesResponse { repo, packages }))
}
