use std::collections::HashMap;

use axum::extract::Multipart;

use super::services::UploadItem;
use crate::error::{AppError, AppResult};

/// A drained multipart body: text fields and at most one file per field name.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadItem>,
}

impl UploadForm {
    pub async fn read(mut mp: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read {name}: {e}")))?;
                form.files.entry(name).or_insert(UploadItem { body, content_type });
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read {name}: {e}")))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    pub fn take_text(&mut self, name: &str) -> String {
        self.fields.remove(name).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadItem> {
        self.files.remove(name)
    }
}
