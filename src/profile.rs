//! Customer profiles: per-customer defaults, label aliases, and form
//! metadata that steer prompt construction and normalizer back-fill.
//!
//! Profiles are loaded read-only from a JSON store (a map of profile id →
//! profile body) and shared across requests via `Arc`. A lookup miss is not
//! an error: the repository degrades to the well-known `default` profile
//! and emits a warn-level event, because a salesperson uploading with a
//! typo'd customer id should still get an extraction, just without the
//! customer-specific hints.

use crate::error::OrderExtractError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Well-known fallback profile id.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// Well-known fallback form id within a profile.
pub const DEFAULT_FORM_ID: &str = "default_form";

/// Metadata for a specific document layout used by a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerForm {
    pub id: String,
    pub description: Option<String>,
    pub label_aliases: BTreeMap<String, Vec<String>>,
    pub example_orders: Vec<Value>,
    pub reasoning_notes: Vec<String>,
    pub schema_name: Option<String>,
}

/// A customer-specific extraction profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerProfile {
    pub id: String,
    pub default_currency: Option<String>,
    pub label_aliases: BTreeMap<String, Vec<String>>,
    pub example_orders: Vec<Value>,
    /// Free-form metadata. `metadata["extraction_hints"]` may carry a
    /// `force_ocr` flag the pipeline folds into the extraction context.
    pub metadata: BTreeMap<String, Value>,
    pub forms: BTreeMap<String, CustomerForm>,
}

impl CustomerProfile {
    /// Resolve a form by id, falling back to the profile's default form.
    pub fn resolve_form(&self, form_id: Option<&str>) -> Option<&CustomerForm> {
        if let Some(id) = form_id {
            if let Some(form) = self.forms.get(id) {
                return Some(form);
            }
        }
        self.forms.get(DEFAULT_FORM_ID)
    }

    /// Condensed profile description injected into the reasoning prompt.
    pub fn to_prompt_metadata(&self, form_id: Option<&str>) -> String {
        let form = self.resolve_form(form_id);

        let mut alias_map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (label, values) in &self.label_aliases {
            alias_map
                .entry(label.as_str())
                .or_default()
                .extend(values.iter().map(String::as_str));
        }
        if let Some(form) = form {
            for (label, values) in &form.label_aliases {
                alias_map
                    .entry(label.as_str())
                    .or_default()
                    .extend(values.iter().map(String::as_str));
            }
        }
        let mut alias_parts: Vec<String> = Vec::new();
        for (label, mut values) in alias_map {
            values.sort_unstable();
            values.dedup();
            if !values.is_empty() {
                alias_parts.push(format!("{label}: {}", values.join(", ")));
            }
        }
        let alias_text = if alias_parts.is_empty() {
            "none".to_string()
        } else {
            alias_parts.join(", ")
        };

        let metadata_text = if self.metadata.is_empty() {
            "no extra metadata".to_string()
        } else {
            self.metadata
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let form_text = match form {
            Some(form) => format!(
                "Active form: {} ({})",
                form.id,
                form.description.as_deref().unwrap_or("no description")
            ),
            None => "Active form: default".to_string(),
        };

        let defaults = self.default_currency.as_deref().unwrap_or("unspecified");
        let notes = form
            .map(|f| f.reasoning_notes.join(" "))
            .unwrap_or_default();

        format!(
            "Profile {} – default currency: {defaults}. {form_text}. \
             Label aliases: {alias_text}. Metadata: {metadata_text}. {notes}",
            self.id
        )
        .trim_end()
        .to_string()
    }

    /// Few-shot example payloads, one JSON object per line. Empty string
    /// when neither the profile nor the active form carries examples.
    pub fn few_shot_examples(&self, form_id: Option<&str>) -> String {
        let mut examples: Vec<&Value> = self.example_orders.iter().collect();
        if let Some(form) = self.resolve_form(form_id) {
            examples.extend(form.example_orders.iter());
        }
        examples
            .iter()
            .filter_map(|example| serde_json::to_string(example).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read-only repository of customer profiles.
///
/// The backing file is parsed once at construction; entries are shared via
/// `Arc` so each in-flight request holds a consistent snapshot even if the
/// repository is later rebuilt from a changed file.
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    profiles: BTreeMap<String, Arc<CustomerProfile>>,
    source: Option<PathBuf>,
}

impl Default for ProfileRepository {
    fn default() -> Self {
        Self {
            profiles: BTreeMap::new(),
            source: None,
        }
    }
}

impl ProfileRepository {
    /// Load a repository from a JSON file mapping profile id → profile body.
    ///
    /// Form bodies get their `id` injected from the map key, matching how
    /// the store is authored (ids are keys, not repeated in bodies).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OrderExtractError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| OrderExtractError::ProfileStore {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let parsed: BTreeMap<String, CustomerProfile> =
            serde_json::from_str(&raw).map_err(|e| OrderExtractError::ProfileStore {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let mut profiles = BTreeMap::new();
        for (id, mut profile) in parsed {
            profile.id = id.clone();
            for (form_id, form) in profile.forms.iter_mut() {
                form.id = form_id.clone();
            }
            profiles.insert(id, Arc::new(profile));
        }
        Ok(Self {
            profiles,
            source: Some(path.to_path_buf()),
        })
    }

    /// Build a repository from already-constructed profiles (tests, embedded
    /// configuration).
    pub fn from_profiles(profiles: impl IntoIterator<Item = CustomerProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id.clone(), Arc::new(p)))
                .collect(),
            source: None,
        }
    }

    /// Resolve a profile id to a profile, degrading to `default` on a miss.
    ///
    /// Never fails: an unknown id logs a warning and returns the default
    /// profile; a store without a `default` entry returns a minimal
    /// synthetic one.
    pub fn load(&self, profile_id: Option<&str>) -> Arc<CustomerProfile> {
        let mut key = profile_id.unwrap_or(DEFAULT_PROFILE_ID);
        if !self.profiles.contains_key(key) {
            if key != DEFAULT_PROFILE_ID {
                warn!(
                    profile_id = key,
                    source = ?self.source,
                    "profile not found, falling back to default"
                );
            }
            key = DEFAULT_PROFILE_ID;
        }
        self.profiles.get(key).cloned().unwrap_or_else(|| {
            Arc::new(CustomerProfile {
                id: DEFAULT_PROFILE_ID.to_string(),
                ..CustomerProfile::default()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with(contents: &str) -> ProfileRepository {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        ProfileRepository::from_path(file.path()).unwrap()
    }

    #[test]
    fn unknown_profile_falls_back_to_default() {
        let repo = store_with(r#"{"default": {"default_currency": "EUR"}}"#);
        let profile = repo.load(Some("nope"));
        assert_eq!(profile.id, "default");
        assert_eq!(profile.default_currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn missing_default_yields_synthetic_profile() {
        let repo = ProfileRepository::default();
        let profile = repo.load(None);
        assert_eq!(profile.id, DEFAULT_PROFILE_ID);
        assert!(profile.default_currency.is_none());
    }

    #[test]
    fn form_ids_are_injected_from_keys() {
        let repo = store_with(
            r#"{"acme": {"forms": {"default_form": {"description": "fax order"}}}}"#,
        );
        let profile = repo.load(Some("acme"));
        let form = profile.resolve_form(None).unwrap();
        assert_eq!(form.id, "default_form");
        assert_eq!(form.description.as_deref(), Some("fax order"));
    }

    #[test]
    fn prompt_metadata_merges_form_aliases() {
        let repo = store_with(
            r#"{
              "acme": {
                "default_currency": "USD",
                "label_aliases": {"customer_po_number": ["PO", "Order ref"]},
                "forms": {
                  "default_form": {"label_aliases": {"customer_po_number": ["Bestell-Nr"]}}
                }
              }
            }"#,
        );
        let profile = repo.load(Some("acme"));
        let text = profile.to_prompt_metadata(None);
        assert!(text.contains("default currency: USD"));
        assert!(text.contains("Bestell-Nr"));
        assert!(text.contains("Order ref"));
    }

    #[test]
    fn few_shot_examples_are_one_object_per_line() {
        let repo = store_with(
            r#"{"acme": {"example_orders": [{"a": 1}, {"b": 2}]}}"#,
        );
        let profile = repo.load(Some("acme"));
        let examples = profile.few_shot_examples(None);
        assert_eq!(examples.lines().count(), 2);
    }
}
