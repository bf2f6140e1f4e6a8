//! Declared structure of a backend response.
//!
//! Shapes can be written compactly as `name:type[?],...`, e.g.
//! `reply:string,intent:string?,slots:array`. A trailing `?` marks the
//! field optional; a bare name defaults to `any`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" | "str" => Ok(Self::String),
            "number" | "float" => Ok(Self::Number),
            "integer" | "int" => Ok(Self::Integer),
            "boolean" | "bool" => Ok(Self::Boolean),
            "array" | "list" => Ok(Self::Array),
            "object" | "map" => Ok(Self::Object),
            "any" => Ok(Self::Any),
            other => Err(format!(
                "Unknown field type '{}'. Valid types: string, number, integer, boolean, array, object, any",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedShape {
    fields: Vec<FieldSpec>,
    #[serde(default)]
    allow_extra: bool,
}

impl ExpectedShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.with(name, kind, true)
    }

    pub fn optional(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.with(name, kind, false)
    }

    /// Accept fields the shape does not declare instead of treating them as malformed.
    pub fn allow_extra_fields(mut self) -> Self {
        self.allow_extra = true;
        self
    }

    fn with(mut self, name: impl Into<String>, kind: FieldKind, required: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required,
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn allows_extra_fields(&self) -> bool {
        self.allow_extra
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Instruction text telling the backend which JSON object to produce.
    pub fn describe(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| {
                let optional = if f.required { "" } else { " (optional)" };
                format!("  \"{}\": {}{}", f.name, f.kind, optional)
            })
            .collect();
        format!(
            "Respond with a single JSON object and nothing else, with these fields:\n{{\n{}\n}}",
            fields.join(",\n")
        )
    }
}

impl std::fmt::Display for ExpectedShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                let optional = if field.required { "" } else { "?" };
                format!("{}:{}{}", field.name, field.kind, optional)
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl std::str::FromStr for ExpectedShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut shape = Self::new();
        for raw in s.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let (name, kind) = match raw.split_once(':') {
                Some((name, kind)) => (name.trim(), kind.trim()),
                None => (raw, "any"),
            };
            let (kind, required) = match kind.strip_suffix('?') {
                Some(kind) => (kind, false),
                None => (kind, true),
            };
            let (name, required) = match name.strip_suffix('?') {
                Some(name) => (name, false),
                None => (name, required),
            };
            if name.is_empty() {
                return Err(format!("Empty field name in shape entry '{}'", raw));
            }
            if shape.get(name).is_some() {
                return Err(format!("Duplicate field '{}' in shape", name));
            }
            let kind = if kind.is_empty() {
                FieldKind::Any
            } else {
                kind.parse()?
            };
            shape = shape.with(name, kind, required);
        }
        if shape.fields.is_empty() {
            return Err("Shape must declare at least one field".to_string());
        }
        Ok(shape)
    }
}
