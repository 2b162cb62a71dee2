//! Callable-function registry.
//!
//! Publishes the gating functions under `<catalog>.<schema>.<name>` so a
//! tool-calling agent can invoke them by name. Every registered function is
//! stateless and takes a single JSON argument.

use crate::gating::{review_complexity_score, score_sql_query};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors invoking a registered function.
#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid argument for {function}: expected {expected} `{parameter}`")]
    InvalidArgument {
        function: String,
        parameter: &'static str,
        expected: &'static str,
    },
}

/// JSON type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
}

impl ValueType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
        }
    }
}

/// A registered function.
#[derive(Debug, Clone)]
pub struct RegisteredFunction {
    pub name: &'static str,
    pub description: &'static str,
    pub parameter: &'static str,
    pub parameter_type: ValueType,
    pub returns: ValueType,
    handler: fn(&Value) -> Value,
}

/// Entry of the registry manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub full_name: String,
    pub tool_name: String,
    pub description: String,
    pub parameter: String,
    pub parameter_type: ValueType,
    pub returns: ValueType,
}

/// Functions registered under one catalog and schema.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    catalog: String,
    schema: String,
    functions: BTreeMap<String, RegisteredFunction>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            functions: BTreeMap::new(),
        }
    }

    /// Create a registry holding the scorer and reviewer.
    pub fn with_gating_tools(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        let mut registry = Self::new(catalog, schema);

        registry.register(RegisteredFunction {
            name: "score_sql_query",
            description: "Analyzes a SQL query and returns a complexity score. Higher scores indicate more complex queries.",
            parameter: "sql_query",
            parameter_type: ValueType::String,
            returns: ValueType::Number,
            handler: |arg| json!(score_sql_query(arg.as_str().unwrap_or_default())),
        });

        registry.register(RegisteredFunction {
            name: "review_complexity_score",
            description: "Reviews a complexity score and returns a decision, either \"approved\" or \"too_complex\".",
            parameter: "score",
            parameter_type: ValueType::Number,
            returns: ValueType::String,
            handler: |arg| json!(review_complexity_score(arg.as_f64().unwrap_or_default()).as_str()),
        });

        registry
    }

    /// Register (or replace) a function. Returns its full name.
    pub fn register(&mut self, function: RegisteredFunction) -> String {
        let full_name = self.full_name(function.name);
        debug!("Registering function {}", full_name);
        self.functions.insert(full_name.clone(), function);
        full_name
    }

    /// `<catalog>.<schema>.<name>`
    pub fn full_name(&self, name: &str) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, name)
    }

    /// Look up a function by full name or by tool name.
    pub fn get(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions
            .get(name)
            .or_else(|| self.functions.get(&from_tool_name(name)))
    }

    /// Invoke a function with its single argument.
    pub fn invoke(&self, name: &str, arg: &Value) -> Result<Value, RegistryError> {
        let function = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownFunction(name.to_string()))?;

        if !function.parameter_type.matches(arg) {
            return Err(RegistryError::InvalidArgument {
                function: name.to_string(),
                parameter: function.parameter,
                expected: function.parameter_type.as_str(),
            });
        }

        Ok((function.handler)(arg))
    }

    /// Registered functions with their full names, sorted by name.
    pub fn functions(&self) -> impl Iterator<Item = (&String, &RegisteredFunction)> {
        self.functions.iter()
    }

    /// Describe every registered function.
    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.functions
            .iter()
            .map(|(full_name, f)| ManifestEntry {
                full_name: full_name.clone(),
                tool_name: to_tool_name(full_name),
                description: f.description.to_string(),
                parameter: f.parameter.to_string(),
                parameter_type: f.parameter_type,
                returns: f.returns,
            })
            .collect()
    }
}

/// Tool names cannot contain dots: `a.b.c` becomes `a__b__c`.
pub fn to_tool_name(full_name: &str) -> String {
    full_name.replace('.', "__")
}

fn from_tool_name(tool_name: &str) -> String {
    tool_name.replace("__", ".")
}
