use serde::{Deserialize, Serialize};

/// Root document of the Berlin services export.
///
/// Fetched once and never mutated afterwards. Every field is optional on the
/// wire; `null` and missing values both land as `None` / empty vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceCatalog {
    /// Export creation timestamp, kept verbatim as sent upstream
    #[serde(default, deserialize_with = "lenient::text")]
    pub created: Option<String>,
    /// Record count reported by the export (not recomputed from `data`)
    #[serde(default, deserialize_with = "lenient::count")]
    pub datacount: Option<u64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub locale: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub error: Option<bool>,
    /// Services in export order
    #[serde(default, deserialize_with = "lenient::list")]
    pub data: Vec<Service>,
}

impl ServiceCatalog {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn services(&self) -> &[Service] {
        &self.data
    }
}

/// One administrative offering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    /// Upstream identifier. Sent as either a JSON string or number, kept as string.
    #[serde(default, deserialize_with = "lenient::identifier")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub fees: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub process_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub responsibility: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub requirements: Vec<Reference>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub prerequisites: Vec<Reference>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub forms: Vec<Reference>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub authorities: Vec<Authority>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub legal: Vec<Reference>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub links: Vec<Reference>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub meta: Option<ServiceMeta>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub onlineprocessing: Option<OnlineProcessing>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub appointment: Option<Appointment>,
}

impl Service {
    /// Canonical page on service.berlin.de, if the export carries one.
    pub fn url(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|meta| meta.url.as_deref())
    }

    pub fn online_processing_link(&self) -> Option<&str> {
        self.onlineprocessing
            .as_ref()
            .and_then(|online| non_empty(online.link.as_deref()))
    }

    pub fn appointment_link(&self) -> Option<&str> {
        self.appointment
            .as_ref()
            .and_then(|appointment| non_empty(appointment.link.as_deref()))
    }
}

/// Named entry with optional description and link.
/// Used for requirements, prerequisites, forms, legal references and links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub link: Option<String>,
}

impl Reference {
    pub fn link(&self) -> Option<&str> {
        non_empty(self.link.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Authority {
    #[serde(default, deserialize_with = "lenient::identifier")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub webinfo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMeta {
    #[serde(default, deserialize_with = "lenient::text")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub lastupdate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnlineProcessing {
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default, deserialize_with = "lenient::text")]
    pub link: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Deserializers that tolerate the shape drift of the export: `null` in place
/// of lists, empty arrays in place of objects, numbers in place of strings.
mod lenient {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Null => Ok(String::new()),
            other => Err(D::Error::custom(format!(
                "expected string or number identifier, got {other}"
            ))),
        }
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
    }

    pub fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => match n.as_u64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let items = match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            // Sparse PHP arrays are exported as objects keyed by index.
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                entries.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
                entries.into_iter().map(|(_, v)| v).collect()
            }
            _ => return Ok(Vec::new()),
        };
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
            .collect()
    }

    pub fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => serde_json::from_value(value)
                .map(Some)
                .map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}
