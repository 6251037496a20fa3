//! Package intake and retrieval handlers

use std::collections::HashMap;
use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use spf_common::{
    auth::ActorContext,
    errors::{AppError, Result},
    queue::{RegisterOptions, TaskMessage},
    records::RenditionEntry,
};
use spf_ingress::pipelines::{RetrievalResponse, TempUpload};
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::app_error;
use crate::AppState;

/// Multipart field carrying the package
const FILE_FIELD: &str = "file";

/// Request to build a distributable package
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MakePackageRequest {
    /// XML to package; the article's registered XML when absent
    #[validate(url)]
    #[serde(default)]
    pub xml_uri: Option<String>,

    #[serde(default)]
    pub renditions: Vec<RenditionEntry>,
}

/// Response after enqueuing a task
#[derive(Serialize)]
pub struct TaskAccepted {
    pub task_id: String,
    pub status: String,
}

impl TaskAccepted {
    fn queued(task_id: String) -> (StatusCode, Json<Self>) {
        (
            StatusCode::ACCEPTED,
            Json(Self {
                task_id,
                status: "queued".to_string(),
            }),
        )
    }
}

/// A multipart upload written to the temporary directory.
///
/// The file is removed on drop unless it was handed to the queue.
struct SavedUpload {
    file: TempUpload,
    file_name: String,
    fields: HashMap<String, String>,
}

impl SavedUpload {
    fn file_path(&self) -> String {
        self.file.path().to_string_lossy().into_owned()
    }
}

/// Accept a raw package; the worker stores it as received
pub async fn upload_package(
    State(state): State<AppState>,
    actor: ActorContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TaskAccepted>)> {
    let upload = save_upload(&state, multipart).await?;
    let task = TaskMessage::UploadPackage {
        user_id: actor.user_id,
        file_path: upload.file_path(),
        package_name: upload.file_name.clone(),
    };
    let task_id = state.queue.send(&task).await?;
    upload.file.keep();

    info!(task_id = %task_id, user_id = %actor.user_id, "Package upload queued");
    Ok(TaskAccepted::queued(task_id))
}

/// Accept a package whose content should be registered and synchronized
pub async fn register_package(
    State(state): State<AppState>,
    actor: ActorContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TaskAccepted>)> {
    let upload = save_upload(&state, multipart).await?;
    let options = register_options(&upload.fields)?;
    let task = TaskMessage::RegisterContent {
        user_id: actor.user_id,
        file_path: upload.file_path(),
        options,
    };
    let task_id = state.queue.send(&task).await?;
    upload.file.keep();

    info!(task_id = %task_id, file = %upload.file_name, "Content registration queued");
    Ok(TaskAccepted::queued(task_id))
}

/// Queue a distributable package build
pub async fn make_package(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(pid_v3): Path<String>,
    Json(request): Json<MakePackageRequest>,
) -> Result<(StatusCode, Json<TaskAccepted>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let task = TaskMessage::MakePackage {
        user_id: actor.user_id,
        pid_v3: pid_v3.clone(),
        xml_uri: request.xml_uri,
        renditions: request.renditions,
    };
    let task_id = state.queue.send(&task).await?;

    info!(task_id = %task_id, pid_v3 = %pid_v3, "Package build queued");
    Ok(TaskAccepted::queued(task_id))
}

/// List the generated packages of a document
pub async fn get_packages(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(pid_v3): Path<String>,
) -> Result<Json<RetrievalResponse>> {
    let outcome = state
        .pipelines
        .retrieve_packages(actor.user_id, &pid_v3)
        .await
        .map_err(app_error)?;
    Ok(Json(outcome.response))
}

/// Stream the `file` field to `{temp_dir}/{uuid}/{file name}` and collect
/// the text fields. A partly written file is removed on any error.
async fn save_upload(state: &AppState, mut multipart: Multipart) -> Result<SavedUpload> {
    let mut saved: Option<(TempUpload, String)> = None;
    let mut fields = HashMap::new();

    while let Some(mut field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name != FILE_FIELD {
            let value = field.text().await.map_err(invalid_multipart)?;
            fields.insert(name, value);
            continue;
        }
        if saved.is_some() {
            return Err(AppError::Validation {
                message: "only one file may be uploaded per request".to_string(),
                field: Some(FILE_FIELD.to_string()),
            });
        }

        let file_name = field
            .file_name()
            .and_then(safe_file_name)
            .ok_or_else(|| AppError::Validation {
                message: "uploaded file has no usable name".to_string(),
                field: Some(FILE_FIELD.to_string()),
            })?;

        let dir = FsPath::new(&state.ingress.temp_dir).join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await.map_err(io_error)?;
        let upload = TempUpload::new(dir.join(&file_name));
        let mut file = tokio::fs::File::create(upload.path()).await.map_err(io_error)?;
        while let Some(chunk) = field.chunk().await.map_err(invalid_multipart)? {
            file.write_all(&chunk).await.map_err(io_error)?;
        }
        file.flush().await.map_err(io_error)?;
        saved = Some((upload, file_name));
    }

    let (file, file_name) = saved.ok_or_else(|| AppError::MissingField {
        field: FILE_FIELD.to_string(),
    })?;
    Ok(SavedUpload {
        file,
        file_name,
        fields,
    })
}

fn register_options(fields: &HashMap<String, String>) -> Result<RegisterOptions> {
    let text = |name: &str| {
        fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let is_public = match text("is_public") {
        None => true,
        Some(v) => v.parse().map_err(|_| AppError::Validation {
            message: format!("is_public must be true or false, got {v:?}"),
            field: Some("is_public".to_string()),
        })?,
    };

    Ok(RegisterOptions {
        is_public,
        issue_id: text("issue_id").map(str::to_string),
        order: text("order").map(str::to_string),
        other_pids: text("other_pids")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// Final path component of a client-supplied file name.
fn safe_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

fn invalid_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::InvalidFormat {
        message: e.to_string(),
    }
}

fn io_error(e: std::io::Error) -> AppError {
    AppError::Internal {
        message: format!("Unable to store upload: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("doc.zip").as_deref(), Some("doc.zip"));
        assert_eq!(safe_file_name("../../etc/doc.zip").as_deref(), Some("doc.zip"));
        assert_eq!(safe_file_name("C:\\tmp\\doc.zip").as_deref(), Some("doc.zip"));
        assert_eq!(safe_file_name(".."), None);
        assert_eq!(safe_file_name("dir/"), None);
    }

    #[test]
    fn test_register_options_defaults() {
        let options = register_options(&HashMap::new()).unwrap();
        assert_eq!(options, RegisterOptions::default());

        let bad = HashMap::from([("is_public".to_string(), "maybe".to_string())]);
        assert!(register_options(&bad).is_err());
    }
}
