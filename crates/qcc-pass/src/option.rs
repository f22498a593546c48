//! Options facility (§4.8): a typed, insertion-ordered configuration set
//! every pass carries.

use rustc_hash::FxHashMap;

use crate::error::{PassError, PassResult};

/// A change callback, invoked with the option's new value after a
/// successful `set`.
pub type OptionCallback = Box<dyn Fn(&OptionValue) + Send + Sync>;

/// One of the five option kinds (§4.8).
#[derive(Debug, Clone)]
pub enum OptionValue {
    /// A free-form string.
    Str(String),
    /// A boolean flag.
    Bool(bool),
    /// A string drawn from a fixed allowed set.
    Enum {
        /// The current value.
        value: String,
        /// The allowed values.
        allowed: Vec<String>,
    },
    /// A bounded integer, with optional named synonyms.
    Int {
        /// The current value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
        /// Named synonyms resolving to a specific value (e.g. `"max" -> i64::MAX`).
        synonyms: FxHashMap<String, i64>,
    },
    /// A bounded real, with optional named synonyms.
    Real {
        /// The current value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
        /// Named synonyms resolving to a specific value.
        synonyms: FxHashMap<String, f64>,
    },
}

impl OptionValue {
    /// The value as a string, if this is a `Str` or `Enum`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            OptionValue::Enum { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The value as a bool, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as an int, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The value as a real, if this is a `Real`.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            OptionValue::Real { value, .. } => Some(*value),
            _ => None,
        }
    }

    fn parse_into(&mut self, name: &str, raw: &str) -> PassResult<()> {
        let invalid = || PassError::InvalidOptionValue {
            name: name.to_string(),
            value: raw.to_string(),
        };
        let out_of_range = || PassError::OutOfRange {
            name: name.to_string(),
            value: raw.to_string(),
        };
        match self {
            OptionValue::Str(s) => *s = raw.to_string(),
            OptionValue::Bool(b) => *b = raw.parse::<bool>().map_err(|_| invalid())?,
            OptionValue::Enum { value, allowed } => {
                if !allowed.iter().any(|a| a == raw) {
                    return Err(invalid());
                }
                *value = raw.to_string();
            }
            OptionValue::Int { value, min, max, synonyms } => {
                let parsed = synonyms.get(raw).copied().map(Ok).unwrap_or_else(|| raw.parse::<i64>().map_err(|_| invalid()))?;
                if parsed < *min || parsed > *max {
                    return Err(out_of_range());
                }
                *value = parsed;
            }
            OptionValue::Real { value, min, max, synonyms } => {
                let parsed = synonyms.get(raw).copied().map(Ok).unwrap_or_else(|| raw.parse::<f64>().map_err(|_| invalid()))?;
                if parsed < *min || parsed > *max {
                    return Err(out_of_range());
                }
                *value = parsed;
            }
        }
        Ok(())
    }
}

/// One named, described, defaulted option (§4.8).
pub struct Opt {
    /// The option's name, unique within its `Options` set.
    pub name: String,
    /// A human-readable description, shown by `Options::help`.
    pub description: String,
    default: OptionValue,
    value: OptionValue,
    configured: bool,
    callbacks: Vec<OptionCallback>,
}

impl std::fmt::Debug for Opt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opt")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("value", &self.value)
            .field("configured", &self.configured)
            .finish()
    }
}

impl Opt {
    /// Create a new option with `default` as both its default and current
    /// value.
    pub fn new(name: impl Into<String>, description: impl Into<String>, default: OptionValue) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value: default.clone(),
            default,
            configured: false,
            callbacks: Vec::new(),
        }
    }

    /// The option's current value.
    pub fn value(&self) -> &OptionValue {
        &self.value
    }

    /// The option's default value.
    pub fn default(&self) -> &OptionValue {
        &self.default
    }

    /// Whether this option has been explicitly set since creation (or the
    /// last reset).
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Register a callback invoked after every successful `set`.
    pub fn on_change(&mut self, callback: impl Fn(&OptionValue) + Send + Sync + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Set this option from a raw string. An empty string resets it to its
    /// default (§4.8).
    pub fn set(&mut self, raw: &str) -> PassResult<()> {
        if raw.is_empty() {
            self.value = self.default.clone();
            self.configured = false;
        } else {
            self.value.parse_into(&self.name, raw)?;
            self.configured = true;
        }
        for callback in &self.callbacks {
            callback(&self.value);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.value = self.default.clone();
        self.configured = false;
    }
}

/// An insertion-ordered set of [`Opt`]s (§4.8).
#[derive(Debug, Default)]
pub struct Options {
    opts: Vec<Opt>,
    index: FxHashMap<String, usize>,
}

impl Options {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new option. Errors if the name is already present.
    pub fn add(&mut self, opt: Opt) -> PassResult<()> {
        if self.index.contains_key(&opt.name) {
            return Err(PassError::DuplicateInstanceName(opt.name));
        }
        self.index.insert(opt.name.clone(), self.opts.len());
        self.opts.push(opt);
        Ok(())
    }

    /// Look up an option by name.
    pub fn get(&self, name: &str) -> Option<&Opt> {
        self.index.get(name).map(|&i| &self.opts[i])
    }

    /// Set a named option from a raw string.
    pub fn set(&mut self, name: &str, raw: &str) -> PassResult<()> {
        let &i = self.index.get(name).ok_or_else(|| PassError::UnknownOption(name.to_string()))?;
        self.opts[i].set(raw)
    }

    /// Iterate over every option, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Opt> {
        self.opts.iter()
    }

    /// A human-readable dump: one line per option, name/description/default/current.
    pub fn help(&self) -> String {
        self.opts
            .iter()
            .map(|o| {
                format!(
                    "{}: {} (default={:?}, current={:?}{})",
                    o.name,
                    o.description,
                    o.default(),
                    o.value(),
                    if o.is_configured() { ", configured" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Copy every *configured* option from `other` into `self` by name,
    /// ignoring names `other` has that `self` does not.
    pub fn update_from(&mut self, other: &Options) -> PassResult<()> {
        for o in other.iter().filter(|o| o.is_configured()) {
            if let Some(&i) = self.index.get(&o.name) {
                self.opts[i].value = o.value().clone();
                self.opts[i].configured = true;
            }
        }
        Ok(())
    }

    /// Reset every option to its default value.
    pub fn reset(&mut self) {
        for o in &mut self.opts {
            o.reset();
        }
    }
}
