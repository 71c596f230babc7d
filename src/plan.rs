//! Declarative selector plans and job files.
//!
//! A job file names one target URL, one selector plan, and the output sinks
//! to write. Plans come in two shapes: a *list* plan repeats its fields over
//! every element matched by a root selector, and an *anchored* plan first
//! locates a single anchor, walks to a relative region, and repeats its
//! fields over the region's items. Plans are plain data (serde) and compile
//! into parsed selectors and compiled transforms before execution, so a bad
//! selector or pattern surfaces before a browser ever launches.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::{CompiledSelector, SelectorError};
use crate::normalize::{CompiledTransform, Transform};

/// Declarative selector, as written in a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Structural CSS path, resolved against the current scope.
    Css(String),
    /// Relational lookup: the next siblings with the given tag name.
    FollowingSibling(String),
}

impl Selector {
    pub fn compile(&self) -> Result<CompiledSelector, SelectorError> {
        match self {
            Selector::Css(input) => CompiledSelector::css(input),
            Selector::FollowingSibling(tag) => Ok(CompiledSelector::following_sibling(tag)),
        }
    }

    fn describe(&self) -> &str {
        match self {
            Selector::Css(input) => input,
            Selector::FollowingSibling(tag) => tag,
        }
    }
}

/// How a field's value is read from its resolved element(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// First match's visible text.
    SingleText,
    /// Visible text of every match, joined with the separator.
    MultiText {
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// A named attribute of the first match.
    Attribute { name: String },
}

impl Default for ExtractMode {
    fn default() -> Self {
        ExtractMode::SingleText
    }
}

fn default_separator() -> String {
    ";".to_string()
}

fn default_sentinel() -> String {
    "not found".to_string()
}

/// One field of a plan: where it lives and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Optional intermediate container; when it is absent the field
    /// short-circuits to its sentinel without attempting the inner lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<Selector>,
    pub selector: Selector,
    #[serde(default)]
    pub mode: ExtractMode,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// A required field that resolves to nothing skips the whole item
    /// instead of emitting a partial record.
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<Transform>,
}

impl FieldSpec {
    /// Minimal field reading the first match's visible text.
    pub fn text(name: impl Into<String>, css: impl Into<String>) -> Self {
        FieldSpec {
            name: name.into(),
            within: None,
            selector: Selector::Css(css.into()),
            mode: ExtractMode::SingleText,
            sentinel: default_sentinel(),
            required: false,
            transforms: Vec::new(),
        }
    }

    pub fn sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn mode(mut self, mode: ExtractMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn within(mut self, selector: Selector) -> Self {
        self.within = Some(selector);
        self
    }

    pub fn transforms(mut self, transforms: Vec<Transform>) -> Self {
        self.transforms = transforms;
        self
    }
}

/// A declarative description of how to find data on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectorPlan {
    /// Repeat the fields over every element matched by `root`.
    List {
        root: Selector,
        fields: Vec<FieldSpec>,
    },
    /// Locate `anchor`, walk to the relative `region`, and repeat the fields
    /// over the region's `item` matches.
    Anchored {
        anchor: Selector,
        region: Selector,
        item: Selector,
        fields: Vec<FieldSpec>,
    },
}

impl SelectorPlan {
    pub fn fields(&self) -> &[FieldSpec] {
        match self {
            SelectorPlan::List { fields, .. } => fields,
            SelectorPlan::Anchored { fields, .. } => fields,
        }
    }

    /// Compile selectors and transforms, validating plan structure.
    pub fn compile(&self) -> Result<CompiledPlan, PlanError> {
        let fields = self.fields();
        if fields.is_empty() {
            return Err(PlanError::NoFields);
        }

        let kind = match self {
            SelectorPlan::List { root, fields: _ } => {
                let root = compile_scoping(root, "root")?;
                CompiledPlanKind::List { root }
            }
            SelectorPlan::Anchored {
                anchor,
                region,
                item,
                fields: _,
            } => CompiledPlanKind::Anchored {
                anchor: compile_scoping(anchor, "anchor")?,
                region: region.compile()?,
                item: item.compile()?,
            },
        };

        let fields = fields
            .iter()
            .map(|field| {
                let transforms = field
                    .transforms
                    .iter()
                    .map(|transform| {
                        transform.compile().map_err(|err| PlanError::Pattern {
                            field: field.name.clone(),
                            message: err.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledField {
                    name: field.name.clone(),
                    within: field
                        .within
                        .as_ref()
                        .map(|selector| selector.compile())
                        .transpose()?,
                    selector: field.selector.compile()?,
                    mode: field.mode.clone(),
                    sentinel: field.sentinel.clone(),
                    required: field.required,
                    transforms,
                })
            })
            .collect::<Result<Vec<_>, PlanError>>()?;

        Ok(CompiledPlan { kind, fields })
    }
}

/// Reject relational selectors where only a document-scoped lookup can run.
fn compile_scoping(selector: &Selector, position: &'static str) -> Result<CompiledSelector, PlanError> {
    let compiled = selector.compile()?;
    if compiled.is_relational() {
        return Err(PlanError::RelationalScope {
            position,
            selector: selector.describe().to_string(),
        });
    }
    Ok(compiled)
}

/// Output sink for a finalized result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkSpec {
    /// Header row of field names, then one delimited row per record.
    Delimited {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
        /// Prepend a positional index column (empty header cell).
        #[serde(default)]
        include_index: bool,
    },
    /// The result set as an indented JSON array of field mappings.
    Json { path: PathBuf },
}

fn default_delimiter() -> char {
    ','
}

/// One extraction job: target page, plan, and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub url: String,
    pub plan: SelectorPlan,
    #[serde(default)]
    pub sinks: Vec<SinkSpec>,
}

impl JobSpec {
    pub fn from_json(text: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn compile(&self) -> Result<CompiledPlan, PlanError> {
        self.plan.compile()
    }
}

/// A plan whose selectors and transforms are parsed and ready to execute.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    pub kind: CompiledPlanKind,
    pub fields: Vec<CompiledField>,
}

impl CompiledPlan {
    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub enum CompiledPlanKind {
    List {
        root: CompiledSelector,
    },
    Anchored {
        anchor: CompiledSelector,
        region: CompiledSelector,
        item: CompiledSelector,
    },
}

#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: String,
    pub within: Option<CompiledSelector>,
    pub selector: CompiledSelector,
    pub mode: ExtractMode,
    pub sentinel: String,
    pub required: bool,
    pub transforms: Vec<CompiledTransform>,
}

/// Errors raised while loading or compiling a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read job file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid job JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("field '{field}' has an invalid transform pattern: {message}")]
    Pattern { field: String, message: String },
    #[error("plan declares no fields")]
    NoFields,
    #[error("{position} selector '{selector}' is relational; a css selector is required here")]
    RelationalScope {
        position: &'static str,
        selector: String,
    },
}
