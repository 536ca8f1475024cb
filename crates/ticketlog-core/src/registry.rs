//! Status/resolution ID-to-name resolution.
//!
//! Two independent maps, one per namespace, so a status ID and a resolution
//! ID that happen to collide numerically never shadow each other. Reverse
//! lookup (name -> ID) is case-insensitive since the backend is not
//! consistent about casing between the snapshot fields and the registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Canonical ID -> name mappings for one project's workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameRegistry {
    statuses: HashMap<String, String>,
    resolutions: HashMap<String, String>,
    #[serde(skip)]
    statuses_rev: HashMap<String, String>,
    #[serde(skip)]
    resolutions_rev: HashMap<String, String>,
}

impl NameRegistry {
    pub fn new(statuses: HashMap<String, String>, resolutions: HashMap<String, String>) -> Self {
        let statuses_rev = reverse_index(&statuses);
        let resolutions_rev = reverse_index(&resolutions);
        Self {
            statuses,
            resolutions,
            statuses_rev,
            resolutions_rev,
        }
    }

    /// Parse a registry payload that may be in the current shape
    /// (`{"statuses": {...}, "resolutions": {...}}`) or the legacy flat shape
    /// where both namespaces share one map, disambiguated by an `s:`/`r:`
    /// key prefix.
    pub fn from_json(value: &serde_json::Value) -> Self {
        if let (Some(statuses), Some(resolutions)) = (
            value.get("statuses").and_then(as_string_map),
            value.get("resolutions").and_then(as_string_map),
        ) {
            return Self::new(statuses, resolutions);
        }

        // Legacy flat format: a single object with `s:`/`r:` prefixed keys.
        let mut statuses = HashMap::new();
        let mut resolutions = HashMap::new();
        if let Some(flat) = as_string_map(value) {
            for (key, name) in flat {
                if let Some(id) = key.strip_prefix("s:") {
                    statuses.insert(id.to_string(), name);
                } else if let Some(id) = key.strip_prefix("r:") {
                    resolutions.insert(id.to_string(), name);
                }
            }
        }
        Self::new(statuses, resolutions)
    }

    pub fn status_name(&self, id: &str) -> Option<&str> {
        self.statuses.get(id).map(String::as_str)
    }

    pub fn resolution_name(&self, id: &str) -> Option<&str> {
        self.resolutions.get(id).map(String::as_str)
    }

    pub fn status_id(&self, name: &str) -> Option<&str> {
        self.statuses_rev.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn resolution_id(&self, name: &str) -> Option<&str> {
        self.resolutions_rev.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Resolve a status name following the fallback chain from the
    /// transformer's failure semantics: registry name, then the backend's
    /// own (possibly translated) string, then the untranslated string, then
    /// empty.
    pub fn resolve_status_name(
        &self,
        id: Option<&str>,
        translated: Option<&str>,
        untranslated: Option<&str>,
    ) -> String {
        id.and_then(|id| self.status_name(id))
            .or(translated)
            .or(untranslated)
            .unwrap_or("")
            .to_string()
    }

    pub fn resolve_resolution_name(
        &self,
        id: Option<&str>,
        translated: Option<&str>,
        untranslated: Option<&str>,
    ) -> String {
        id.and_then(|id| self.resolution_name(id))
            .or(translated)
            .or(untranslated)
            .unwrap_or("")
            .to_string()
    }
}

fn reverse_index(map: &HashMap<String, String>) -> HashMap<String, String> {
    map.iter()
        .map(|(id, name)| (name.to_lowercase(), id.clone()))
        .collect()
}

fn as_string_map(value: &serde_json::Value) -> Option<HashMap<String, String>> {
    value.as_object().map(|obj| {
        obj.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_current_shape() {
        let registry = NameRegistry::from_json(&json!({
            "statuses": {"1": "Backlog", "3": "In Progress"},
            "resolutions": {"10": "Done"},
        }));
        assert_eq!(registry.status_name("1"), Some("Backlog"));
        assert_eq!(registry.resolution_id("done"), Some("10"));
    }

    #[test]
    fn resolves_legacy_flat_prefixed_shape() {
        let registry = NameRegistry::from_json(&json!({
            "s:1": "Backlog",
            "s:3": "In Progress",
            "r:10": "Done",
        }));
        assert_eq!(registry.status_name("3"), Some("In Progress"));
        assert_eq!(registry.resolution_name("10"), Some("Done"));
        assert_eq!(registry.status_id("backlog"), Some("1"));
    }

    #[test]
    fn falls_back_through_translated_then_untranslated_then_empty() {
        let registry = NameRegistry::default();
        assert_eq!(
            registry.resolve_status_name(Some("99"), Some("Translated"), Some("Untranslated")),
            "Translated"
        );
        assert_eq!(
            registry.resolve_status_name(Some("99"), None, Some("Untranslated")),
            "Untranslated"
        );
        assert_eq!(registry.resolve_status_name(Some("99"), None, None), "");
    }
}
