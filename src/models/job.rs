/// Synthetic print jobs and the provider sets they are quoted against.
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Print shop identifier as used by the service.
pub type ProviderId = u32;

/// Print request identifier assigned by the budget endpoint.
pub type JobId = u64;

/// Page interval a format spec applies to. `0..0` means the whole file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub from: u32,
    pub to: u32,
}

/// Formatting options for one part of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    /// Printing schema id.
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "paperSpecs", default)]
    pub paper_spec: String,
    #[serde(rename = "bindingSpecs", default)]
    pub binding_spec: String,
    #[serde(rename = "coverSpecs", default)]
    pub cover_spec: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(flatten)]
    pub page_range: PageRange,
}

impl FormatSpec {
    /// A spec that only names a printing schema, leaving everything else blank.
    pub fn schema(id: u32) -> Self {
        Self {
            id,
            name: String::new(),
            paper_spec: String::new(),
            binding_spec: String::new(),
            cover_spec: String::new(),
            deleted: false,
            page_range: PageRange::default(),
        }
    }
}

/// A synthetic print order. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    file_ref: String,
    page_count: u32,
    format_specs: Vec<FormatSpec>,
}

impl Job {
    pub fn new(file_ref: impl Into<String>, page_count: u32, format_specs: Vec<FormatSpec>) -> Self {
        Self {
            file_ref: file_ref.into(),
            page_count,
            format_specs,
        }
    }

    /// Name of the file pool entry uploaded with the job.
    pub fn file_ref(&self) -> &str {
        &self.file_ref
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn format_specs(&self) -> &[FormatSpec] {
        &self.format_specs
    }

    /// Build the `printRequest` document sent alongside the uploaded file.
    pub fn print_request<'a>(&'a self, providers: &'a ProviderSet) -> PrintRequest<'a> {
        let mut files = BTreeMap::new();
        files.insert(
            self.file_ref.as_str(),
            PrintFile {
                specs: &self.format_specs,
                pages: self.page_count,
                name: &self.file_ref,
            },
        );
        PrintRequest {
            files,
            printshops: providers.as_slice(),
        }
    }
}

/// Wire form of a budget request.
#[derive(Debug, Serialize)]
pub struct PrintRequest<'a> {
    files: BTreeMap<&'a str, PrintFile<'a>>,
    printshops: &'a [ProviderId],
}

#[derive(Debug, Serialize)]
struct PrintFile<'a> {
    specs: &'a [FormatSpec],
    pages: u32,
    name: &'a str,
}

/// Ordered, non-empty list of providers asked for a quote.
///
/// Duplicates are allowed: the ring walk can revisit the home provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProviderSet(Vec<ProviderId>);

impl ProviderSet {
    pub fn new(ids: Vec<ProviderId>) -> Result<Self, AppError> {
        if ids.is_empty() {
            return Err(AppError::Config(
                "A provider set needs at least one provider".to_string(),
            ));
        }
        Ok(Self(ids))
    }

    /// A set led by `home` and followed by `rest`.
    pub fn with_home(home: ProviderId, rest: impl IntoIterator<Item = ProviderId>) -> Self {
        let mut ids = vec![home];
        ids.extend(rest);
        Self(ids)
    }

    /// The provider always placed first.
    pub fn home(&self) -> ProviderId {
        self.0[0]
    }

    pub fn as_slice(&self) -> &[ProviderId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: ProviderId) -> bool {
        self.0.contains(&id)
    }
}
