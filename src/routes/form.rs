//! Multipart form reading
//!
//! Every operation endpoint takes `multipart/form-data`. The whole form is
//! read up front into text fields and uploaded files, then handlers pull
//! typed values out with form defaults applied.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;

use crate::error::{AppError, Result};
use crate::staging::Upload;

/// A fully read multipart form
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, Upload)>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.push((name, Upload::new(file_name, data.to_vec())));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        tracing::debug!(
            fields = form.fields.len(),
            files = form.files.len(),
            "Read multipart form"
        );
        Ok(form)
    }

    /// Raw text of a field, if sent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.text(name).unwrap_or(default)
    }

    /// Parse a field, falling back to `default` when absent or blank
    pub fn parse_or<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.text(name).map(str::trim) {
            None | Some("") => Ok(default),
            Some(value) => value.parse().map_err(|_| self.invalid(name)),
        }
    }

    /// Float field that must not be NaN or infinite
    pub fn finite_or(&self, name: &str, default: f32) -> Result<f32> {
        let value = self.parse_or(name, default)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.invalid(name))
        }
    }

    /// Finite float field that must be above zero
    pub fn positive_or(&self, name: &str, default: f32) -> Result<f32> {
        let value = self.finite_or(name, default)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(name))
        }
    }

    fn invalid(&self, name: &str) -> AppError {
        let value = self.text(name).map(str::trim).unwrap_or_default();
        AppError::bad_request(format!("Invalid value for '{}': '{}'", name, value))
    }

    /// Boolean field: `true`, `1` or `yes` in any case
    pub fn flag(&self, name: &str) -> bool {
        self.text(name).is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            )
        })
    }

    /// Take the first file sent under `name`
    pub fn file(&mut self, name: &str) -> Result<Upload> {
        let position = self
            .files
            .iter()
            .position(|(field, _)| field == name)
            .ok_or_else(|| AppError::bad_request("No file provided"))?;
        Ok(self.files.remove(position).1)
    }

    /// Take every file sent under `name`, in form order
    pub fn files(&mut self, name: &str) -> Vec<Upload> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        taken.into_iter().map(|(_, upload)| upload).collect()
    }

    #[cfg(test)]
    pub(crate) fn from_parts(fields: &[(&str, &str)], files: Vec<(&str, Upload)>) -> Self {
        FormData {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: files
                .into_iter()
                .map(|(name, upload)| (name.to_string(), upload))
                .collect(),
        }
    }
}
