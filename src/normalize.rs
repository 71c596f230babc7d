//! Field value normalization.
//!
//! Each field may declare an ordered chain of text transforms applied to the
//! raw extracted value before it enters a record. Pattern transforms rewrite
//! the value; `ParseNumber` is strict — an empty or non-numeric value at that
//! point fails the run rather than coercing to a default.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declarative transform, as written in a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Drop everything up to and including the first occurrence of the
    /// delimiter; values without the delimiter pass through unchanged.
    StripThrough { delimiter: String },
    /// Regex replacement over the whole value.
    Replace { pattern: String, replacement: String },
    /// Keep ASCII digits only.
    DigitsOnly,
    /// Strict numeric parse; the value is re-rendered in canonical form.
    ParseNumber,
}

impl Transform {
    /// Compile the transform, validating any embedded pattern.
    pub fn compile(&self) -> Result<CompiledTransform, regex::Error> {
        Ok(match self {
            Transform::StripThrough { delimiter } => CompiledTransform::StripThrough {
                delimiter: delimiter.clone(),
            },
            Transform::Replace {
                pattern,
                replacement,
            } => CompiledTransform::Replace {
                regex: Regex::new(pattern)?,
                replacement: replacement.clone(),
            },
            Transform::DigitsOnly => CompiledTransform::DigitsOnly,
            Transform::ParseNumber => CompiledTransform::ParseNumber,
        })
    }
}

/// A transform ready to execute.
#[derive(Debug, Clone)]
pub enum CompiledTransform {
    StripThrough { delimiter: String },
    Replace { regex: Regex, replacement: String },
    DigitsOnly,
    ParseNumber,
}

/// Strict normalization failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("field '{field}': numeric parse on empty value (raw input '{raw}')")]
    EmptyNumeric { field: String, raw: String },
    #[error("field '{field}': '{value}' is not numeric")]
    NotNumeric { field: String, value: String },
}

/// Apply a transform chain in declared order.
pub fn apply_transforms(
    field: &str,
    raw: &str,
    transforms: &[CompiledTransform],
) -> Result<String, NormalizeError> {
    let mut value = raw.to_string();
    for transform in transforms {
        value = match transform {
            CompiledTransform::StripThrough { delimiter } => match value.find(delimiter.as_str()) {
                Some(index) => value[index + delimiter.len()..].to_string(),
                None => value,
            },
            CompiledTransform::Replace { regex, replacement } => {
                regex.replace_all(&value, replacement.as_str()).into_owned()
            }
            CompiledTransform::DigitsOnly => {
                value.chars().filter(char::is_ascii_digit).collect()
            }
            CompiledTransform::ParseNumber => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(NormalizeError::EmptyNumeric {
                        field: field.to_string(),
                        raw: raw.to_string(),
                    });
                }
                let number: i64 =
                    trimmed
                        .parse()
                        .map_err(|_| NormalizeError::NotNumeric {
                            field: field.to_string(),
                            value: trimmed.to_string(),
                        })?;
                number.to_string()
            }
        };
    }
    Ok(value)
}
