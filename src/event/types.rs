//! Event schema types
//!
//! Describes the shape of recorded events:
//! - `EventType`: a kind of event with an ordered field list
//! - `ValueDescriptor`: one field, possibly structured with nested fields
//! - `Annotations`: rendering hints attached to a field (timestamp, timespan, ...)

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Type name of recorded threads
pub const TYPE_THREAD: &str = "java.lang.Thread";
/// Type name of recorded classes
pub const TYPE_CLASS: &str = "java.lang.Class";
/// Type name of text values
pub const TYPE_STRING: &str = "java.lang.String";
/// Type name of class loaders
pub const TYPE_CLASS_LOADER: &str = "jdk.types.ClassLoader";
/// Type name of methods
pub const TYPE_METHOD: &str = "jdk.types.Method";
/// Type name of stack traces
pub const TYPE_STACK_TRACE: &str = "jdk.types.StackTrace";
/// Type name of a single stack frame
pub const TYPE_STACK_FRAME: &str = "jdk.types.StackFrame";
/// Type name of thread groups
pub const TYPE_THREAD_GROUP: &str = "jdk.types.ThreadGroup";

/// Structured types that are rendered as a whole and never expanded by wildcards
pub const LEAF_TYPES: &[&str] = &[
    TYPE_STRING,
    TYPE_THREAD,
    TYPE_CLASS,
    TYPE_CLASS_LOADER,
    TYPE_METHOD,
    TYPE_STACK_TRACE,
    TYPE_STACK_FRAME,
    TYPE_THREAD_GROUP,
];

const INTEGRAL_TYPES: &[&str] = &["byte", "short", "int", "long"];
const FRACTIONAL_TYPES: &[&str] = &["float", "double"];

/// Unit of a data amount field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountUnit {
    /// Amount measured in bytes
    Bytes,
    /// Amount measured in bits
    Bits,
}

/// Annotations attached to a field descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Annotations {
    /// Value is a point in time
    pub timestamp: bool,
    /// Value is a length of time
    pub timespan: bool,
    /// Value is an amount of data
    pub data_amount: Option<AmountUnit>,
    /// Value is a rate (per second)
    pub frequency: bool,
    /// Value is a fraction rendered as a percentage
    pub percentage: bool,
    /// Value is a memory address
    pub memory_address: bool,
    /// Value is unsigned
    pub unsigned: bool,
}

/// Describes one field of an event type or structured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueDescriptor {
    /// Symbolic field name
    pub name: String,
    /// Type name, either a primitive (`long`, `double`, ...) or a structured type
    pub type_name: String,
    /// Human readable label
    #[serde(default)]
    pub label: Option<String>,
    /// Longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Field holds an array of `type_name`
    #[serde(default)]
    pub array: bool,
    /// Rendering annotations
    #[serde(default)]
    pub annotations: Annotations,
    /// Nested fields for structured types
    #[serde(default)]
    pub fields: Vec<ValueDescriptor>,
}

impl ValueDescriptor {
    /// Create a descriptor with a name and type
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            label: None,
            description: None,
            array: false,
            annotations: Annotations::default(),
            fields: Vec::new(),
        }
    }

    /// Builder method: set label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builder method: mark as array
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Builder method: set annotations
    pub fn annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Builder method: mark as timestamp
    pub fn timestamp(mut self) -> Self {
        self.annotations.timestamp = true;
        self
    }

    /// Builder method: mark as timespan
    pub fn timespan(mut self) -> Self {
        self.annotations.timespan = true;
        self
    }

    /// Builder method: add a nested field
    pub fn field(mut self, field: ValueDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Label, falling back to the symbolic name
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => label_from_name(&self.name),
        }
    }

    /// Whether the type is a primitive number
    pub fn is_numeric(&self) -> bool {
        !self.array && (self.is_integral() || self.is_fractional())
    }

    /// Whether the type is an integral primitive
    pub fn is_integral(&self) -> bool {
        INTEGRAL_TYPES.contains(&self.type_name.as_str())
    }

    /// Whether the type is a floating point primitive
    pub fn is_fractional(&self) -> bool {
        FRACTIONAL_TYPES.contains(&self.type_name.as_str())
    }

    /// Whether the type is structured but rendered as a single value
    pub fn is_leaf_type(&self) -> bool {
        LEAF_TYPES.contains(&self.type_name.as_str())
    }

    /// Find a nested field by name
    pub fn find(&self, name: &str) -> Option<&ValueDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A kind of recorded event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    /// Unique numeric identifier
    pub id: u64,
    /// Fully qualified name, e.g. `jdk.GarbageCollection`
    pub name: String,
    /// Human readable label
    #[serde(default)]
    pub label: Option<String>,
    /// Longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Category path
    #[serde(default)]
    pub category: Vec<String>,
    /// Ordered fields of the event
    #[serde(default)]
    pub fields: Vec<ValueDescriptor>,
}

impl EventType {
    /// Create an event type with no fields
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            label: None,
            description: None,
            category: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Builder method: set label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builder method: set category path
    pub fn category(mut self, category: &[&str]) -> Self {
        self.category = category.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Builder method: add a field
    pub fn field(mut self, field: ValueDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Name without the namespace, e.g. `GarbageCollection`
    pub fn simple_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(index) => &self.name[index + 1..],
            None => &self.name,
        }
    }

    /// Label, falling back to the simple name
    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.simple_name().to_string())
    }

    /// Position of a top-level field
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Find a top-level field
    pub fn find(&self, name: &str) -> Option<&ValueDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve a dotted path, e.g. `eventThread.javaName`
    pub fn descriptor(&self, path: &str) -> Option<&ValueDescriptor> {
        let mut parts = path.split('.');
        let mut current = self.find(parts.next()?)?;
        for part in parts {
            current = current.find(part)?;
        }
        Some(current)
    }

    /// Whether events of this type carry a duration
    pub fn has_duration(&self) -> bool {
        self.find("duration").is_some()
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Derive a label from a camel case name: `gcId` -> `Gc Id`
pub fn label_from_name(name: &str) -> String {
    let mut label = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for (i, c) in name.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else if c.is_uppercase() && previous_lower {
            label.push(' ');
            label.push(c);
        } else {
            label.push(c);
        }
        previous_lower = c.is_lowercase() || c.is_ascii_digit();
    }
    label
}
