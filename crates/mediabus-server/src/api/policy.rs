//! Feature-toggle and hidden-path gating shared by the files handlers.

use mediabus_core::types::HostSettings;

use crate::error::ApiError;
use crate::paths::has_hidden_segment;

pub fn require_upload(settings: &HostSettings) -> Result<(), ApiError> {
    if settings.allow_upload {
        Ok(())
    } else {
        Err(ApiError::PolicyDenied("uploads are disabled".into()))
    }
}

pub fn require_download(settings: &HostSettings) -> Result<(), ApiError> {
    if settings.allow_download {
        Ok(())
    } else {
        Err(ApiError::PolicyDenied("downloads are disabled".into()))
    }
}

pub fn require_delete(settings: &HostSettings) -> Result<(), ApiError> {
    if settings.allow_delete {
        Ok(())
    } else {
        Err(ApiError::PolicyDenied("delete is disabled".into()))
    }
}

pub fn require_visible(settings: &HostSettings, segments: &[String]) -> Result<(), ApiError> {
    if !settings.show_hidden_files && has_hidden_segment(segments) {
        return Err(ApiError::PolicyDenied("hidden paths are disabled".into()));
    }
    Ok(())
}

pub fn shared_folder(settings: &HostSettings) -> Result<std::path::PathBuf, ApiError> {
    settings
        .shared_folder_path
        .clone()
        .map(std::path::PathBuf::from)
        .ok_or_else(|| ApiError::ResourceUnavailable("no shared folder configured".into()))
}
