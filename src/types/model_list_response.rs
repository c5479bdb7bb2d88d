use serde::{Deserialize, Serialize};

/// One entry of a model listing.
///
/// OpenAI-style backends identify models by `id`; others use `name` or `model`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Unique model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Alternate identifier used by some backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Alternate identifier used by some backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Creation time in seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<f64>,
}

impl ModelEntry {
    /// The identifier of this entry: the first non-empty of `id`, `name`, and `model`.
    pub fn identifier(&self) -> &str {
        [&self.id, &self.name, &self.model]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }
}

/// Response from a `GET /models` endpoint.
///
/// OpenAI-compatible servers answer with `data`; some others answer with `models`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelListResponse {
    /// Models, as listed by servers that use the `models` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<ModelEntry>>,

    /// Models, as listed by OpenAI-compatible servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<ModelEntry>>,
}

impl ModelListResponse {
    /// The listed entries; `models` is preferred when both keys are present.
    pub fn entries(&self) -> &[ModelEntry] {
        self.models
            .as_deref()
            .or(self.data.as_deref())
            .unwrap_or(&[])
    }

    /// Model identifiers, newest first when the listing carries creation times.
    ///
    /// Ordering is by descending `created` only when the first entry has that field; otherwise
    /// the server's order is kept.
    pub fn model_ids(&self) -> Vec<String> {
        let mut entries: Vec<&ModelEntry> = self.entries().iter().collect();
        if entries.first().is_some_and(|entry| entry.created.is_some()) {
            entries.sort_by(|a, b| {
                let a = a.created.unwrap_or(0.0);
                let b = b.created.unwrap_or(0.0);
                b.total_cmp(&a)
            });
        }
        entries
            .into_iter()
            .map(|entry| entry.identifier().to_string())
            .collect()
    }
}

/// Pick the model to use after a fresh listing.
///
/// The previous selection survives if the server still offers it; otherwise the first listed
/// model is chosen.  Returns `None` when nothing is listed.
pub fn resolve_model(available: &[String], previous: Option<&str>) -> Option<String> {
    match previous {
        Some(prev) if !prev.is_empty() && available.iter().any(|m| m == prev) => {
            Some(prev.to_string())
        }
        _ => available.first().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ModelListResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn openai_listing_sorted_by_created() {
        let response = parse(json!({
            "object": "list",
            "data": [
                {"id": "old", "created": 100},
                {"id": "new", "created": 300},
                {"id": "mid", "created": 200}
            ]
        }));
        assert_eq!(response.model_ids(), vec!["new", "mid", "old"]);
    }

    #[test]
    fn models_key_keeps_server_order() {
        let response = parse(json!({
            "models": [
                {"name": "llama3:8b", "model": "llama3:8b"},
                {"model": "qwen2"},
                {"id": "", "name": "mistral"}
            ]
        }));
        assert_eq!(response.model_ids(), vec!["llama3:8b", "qwen2", "mistral"]);
    }

    #[test]
    fn models_preferred_over_data() {
        let response = parse(json!({
            "models": [{"id": "a"}],
            "data": [{"id": "b"}]
        }));
        assert_eq!(response.model_ids(), vec!["a"]);
    }

    #[test]
    fn missing_created_sorts_last() {
        let response = parse(json!({
            "data": [
                {"id": "x", "created": 5},
                {"id": "y"},
                {"id": "z", "created": 9}
            ]
        }));
        assert_eq!(response.model_ids(), vec!["z", "x", "y"]);
    }

    #[test]
    fn entry_without_identifier() {
        let response = parse(json!({"data": [{"object": "model"}]}));
        assert_eq!(response.model_ids(), vec![""]);
        assert!(parse(json!({})).model_ids().is_empty());
    }

    #[test]
    fn resolve_keeps_previous() {
        let available = vec!["a".to_string(), "b".to_string()];
        assert_eq!(resolve_model(&available, Some("b")), Some("b".to_string()));
        assert_eq!(resolve_model(&available, Some("c")), Some("a".to_string()));
        assert_eq!(resolve_model(&available, None), Some("a".to_string()));
        assert_eq!(resolve_model(&[], Some("a")), None);
    }
}
