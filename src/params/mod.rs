//! Parameter record shared with the engine
//!
//! [`IndexParams`] mirrors the engine's C parameter struct field-for-field,
//! so backends can hand it across the ABI by pointer. Three fields are
//! enumerated and carry a symbol table: `algorithm`, `centers_init` and
//! `log_level`. Symbols translate to their integer code on the way in and
//! back to the canonical name on the way out; codes with no symbol pass
//! through unchanged.

use crate::{Error, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::os::raw::{c_float, c_int, c_long};
use std::str::FromStr;

/// Index structure selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Exhaustive search
    Linear,
    /// Randomized kd-trees
    KdTree,
    /// Hierarchical k-means tree
    KMeans,
    /// kd-trees plus k-means tree
    Composite,
    /// Loaded from a file
    Saved,
    /// Chosen by the engine for the target precision
    Autotuned,
}

/// Cluster-centre seeding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentersInit {
    /// Random points
    Random,
    /// Furthest-point (Gonzales) seeding
    Gonzales,
    /// k-means++ seeding
    KMeansPP,
}

/// Engine log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// No output
    None,
    /// Fatal errors only
    Fatal,
    /// Errors
    Error,
    /// Warnings
    Warning,
    /// Informational
    Info,
}

/// Bidirectional symbol table for one enumerated field
#[derive(Debug)]
pub struct SymbolTable {
    symbols: &'static [(&'static str, c_int)],
    /// Code the forward-only `default` alias maps to
    default: c_int,
}

impl SymbolTable {
    /// Code for a symbol, including the `default` alias
    pub fn code(&self, symbol: &str) -> Option<c_int> {
        if symbol == "default" {
            return Some(self.default);
        }
        self.symbols
            .iter()
            .find(|(name, _)| *name == symbol)
            .map(|&(_, code)| code)
    }

    /// Canonical symbol for a code
    pub fn name(&self, code: c_int) -> Option<&'static str> {
        self.symbols
            .iter()
            .find(|&&(_, c)| c == code)
            .map(|&(name, _)| name)
    }
}

/// Symbols for `algorithm`
pub static ALGORITHM_SYMBOLS: SymbolTable = SymbolTable {
    symbols: &[
        ("linear", 0),
        ("kdtree", 1),
        ("kmeans", 2),
        ("composite", 3),
        ("saved", 254),
        ("autotuned", 255),
    ],
    default: 1,
};

/// Symbols for `centers_init`
pub static CENTERS_INIT_SYMBOLS: SymbolTable = SymbolTable {
    symbols: &[("random", 0), ("gonzales", 1), ("kmeanspp", 2)],
    default: 0,
};

/// Symbols for `log_level`
pub static LOG_LEVEL_SYMBOLS: SymbolTable = SymbolTable {
    symbols: &[
        ("none", 0),
        ("fatal", 1),
        ("error", 2),
        ("warning", 3),
        ("info", 4),
    ],
    default: 2,
};

macro_rules! symbolic_enum {
    ($ty:ident, $table:ident, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical symbol
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }

            /// Integer code passed to the engine
            pub fn code(self) -> c_int {
                // Every variant name is present in its table.
                $table.code(self.name()).unwrap_or_default()
            }

            /// Variant for an engine code, if it has a symbol
            pub fn from_code(code: c_int) -> Option<Self> {
                match $table.name(code)? {
                    $($name => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                $table
                    .code(&s.to_lowercase())
                    .and_then(Self::from_code)
                    .ok_or_else(|| Error::InvalidParameter(format!(
                        "unknown {} '{}'", stringify!($ty), s
                    )))
            }
        }

        impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::Symbol(value.name().to_string())
            }
        }
    };
}

symbolic_enum!(Algorithm, ALGORITHM_SYMBOLS, {
    Linear => "linear",
    KdTree => "kdtree",
    KMeans => "kmeans",
    Composite => "composite",
    Saved => "saved",
    Autotuned => "autotuned",
});

symbolic_enum!(CentersInit, CENTERS_INIT_SYMBOLS, {
    Random => "random",
    Gonzales => "gonzales",
    KMeansPP => "kmeanspp",
});

symbolic_enum!(LogLevel, LOG_LEVEL_SYMBOLS, {
    None => "none",
    Fatal => "fatal",
    Error => "error",
    Warning => "warning",
    Info => "info",
});

impl LogLevel {
    /// Matching filter for the `log` facade
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::None => log::LevelFilter::Off,
            LogLevel::Fatal | LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
        }
    }
}

/// A parameter value as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Symbolic value, translated through a table
    Symbol(String),
}

impl ParamValue {
    /// Parse text as an integer, then a float, else keep it as a symbol
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            ParamValue::Float(f)
        } else {
            ParamValue::Symbol(text.to_string())
        }
    }

    /// Integer value; integral floats convert
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ParamValue::Int(i) => Some(i),
            ParamValue::Float(f) if f.fract() == 0.0 => Some(f as i64),
            _ => None,
        }
    }

    /// Numeric value as f64
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Int(i) => Some(i as f64),
            ParamValue::Float(f) => Some(f),
            ParamValue::Symbol(_) => None,
        }
    }

    /// Symbol text
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            ParamValue::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Symbol(s) => f.write_str(s),
        }
    }
}

macro_rules! param_value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::$variant(value as _)
            }
        })+
    };
}

param_value_from!(Int: i32, i64, u32, usize);
param_value_from!(Float: f32, f64);

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Symbol(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Symbol(value)
    }
}

/// Names of all recognized fields, in record order
pub const FIELD_NAMES: [&str; 13] = [
    "algorithm",
    "checks",
    "cb_index",
    "trees",
    "branching",
    "iterations",
    "centers_init",
    "target_precision",
    "build_weight",
    "memory_weight",
    "sample_fraction",
    "log_level",
    "random_seed",
];

/// Engine parameter record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexParams {
    /// Algorithm code
    pub algorithm: c_int,
    /// Leaves checked per search
    pub checks: c_int,
    /// Cluster boundary index for k-means trees
    pub cb_index: c_float,
    /// Parallel kd-trees
    pub trees: c_int,
    /// k-means branching factor
    pub branching: c_int,
    /// k-means iterations, -1 until convergence
    pub iterations: c_int,
    /// Centre seeding code
    pub centers_init: c_int,
    /// Autotuning target precision
    pub target_precision: c_float,
    /// Autotuning weight of build time
    pub build_weight: c_float,
    /// Autotuning weight of memory
    pub memory_weight: c_float,
    /// Fraction of the data used for autotuning
    pub sample_fraction: c_float,
    /// Engine log verbosity code
    pub log_level: c_int,
    /// Seed, negative for entropy
    pub random_seed: c_long,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::KdTree.code(),
            checks: 32,
            cb_index: 0.5,
            trees: 1,
            branching: 32,
            iterations: 5,
            centers_init: CentersInit::Random.code(),
            target_precision: -1.0,
            build_weight: 0.01,
            memory_weight: 0.0,
            sample_fraction: 0.1,
            log_level: LogLevel::Warning.code(),
            random_seed: -1,
        }
    }
}

fn unknown_field(key: &str) -> Error {
    Error::InvalidParameter(format!("no such member: {}", key))
}

fn to_int(key: &str, value: &ParamValue) -> Result<c_int> {
    value
        .as_i64()
        .and_then(|i| c_int::try_from(i).ok())
        .ok_or_else(|| Error::InvalidParameter(format!("{} expects an integer, got {}", key, value)))
}

fn to_float(key: &str, value: &ParamValue) -> Result<c_float> {
    value
        .as_f64()
        .map(|f| f as c_float)
        .ok_or_else(|| Error::InvalidParameter(format!("{} expects a number, got {}", key, value)))
}

fn to_code(key: &str, table: &SymbolTable, value: &ParamValue) -> Result<c_int> {
    match value {
        ParamValue::Symbol(symbol) => table.code(symbol).ok_or_else(|| {
            Error::InvalidParameter(format!("unknown {} '{}'", key, symbol))
        }),
        _ => to_int(key, value),
    }
}

fn from_code(table: &SymbolTable, code: c_int) -> ParamValue {
    match table.name(code) {
        Some(name) => ParamValue::Symbol(name.to_string()),
        None => ParamValue::Int(code as i64),
    }
}

impl IndexParams {
    /// Names of all recognized fields
    pub fn keys() -> &'static [&'static str] {
        &FIELD_NAMES
    }

    /// Whether `key` names a field
    pub fn is_field(key: &str) -> bool {
        FIELD_NAMES.contains(&key)
    }

    /// Read a field, translating enumerated codes back to their symbol.
    ///
    /// Unknown keys are an error.
    pub fn get(&self, key: &str) -> Result<ParamValue> {
        let value = match key {
            "algorithm" => from_code(&ALGORITHM_SYMBOLS, self.algorithm),
            "checks" => ParamValue::Int(self.checks as i64),
            "cb_index" => ParamValue::Float(self.cb_index as f64),
            "trees" => ParamValue::Int(self.trees as i64),
            "branching" => ParamValue::Int(self.branching as i64),
            "iterations" => ParamValue::Int(self.iterations as i64),
            "centers_init" => from_code(&CENTERS_INIT_SYMBOLS, self.centers_init),
            "target_precision" => ParamValue::Float(self.target_precision as f64),
            "build_weight" => ParamValue::Float(self.build_weight as f64),
            "memory_weight" => ParamValue::Float(self.memory_weight as f64),
            "sample_fraction" => ParamValue::Float(self.sample_fraction as f64),
            "log_level" => from_code(&LOG_LEVEL_SYMBOLS, self.log_level),
            "random_seed" => ParamValue::Int(self.random_seed as i64),
            _ => return Err(unknown_field(key)),
        };
        Ok(value)
    }

    /// Write a field, translating known symbols to their code.
    ///
    /// Unknown keys are an error.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        match key {
            "algorithm" => self.algorithm = to_code(key, &ALGORITHM_SYMBOLS, &value)?,
            "checks" => self.checks = to_int(key, &value)?,
            "cb_index" => self.cb_index = to_float(key, &value)?,
            "trees" => self.trees = to_int(key, &value)?,
            "branching" => self.branching = to_int(key, &value)?,
            "iterations" => self.iterations = to_int(key, &value)?,
            "centers_init" => self.centers_init = to_code(key, &CENTERS_INIT_SYMBOLS, &value)?,
            "target_precision" => self.target_precision = to_float(key, &value)?,
            "build_weight" => self.build_weight = to_float(key, &value)?,
            "memory_weight" => self.memory_weight = to_float(key, &value)?,
            "sample_fraction" => self.sample_fraction = to_float(key, &value)?,
            "log_level" => self.log_level = to_code(key, &LOG_LEVEL_SYMBOLS, &value)?,
            "random_seed" => {
                self.random_seed = value
                    .as_i64()
                    .and_then(|i| c_long::try_from(i).ok())
                    .ok_or_else(|| {
                        Error::InvalidParameter(format!("random_seed expects an integer, got {}", value))
                    })?
            }
            _ => return Err(unknown_field(key)),
        }
        Ok(())
    }

    /// Merge overrides into the record. Keys that name no field are skipped.
    ///
    /// Either every override is applied or, on the first bad value, none is.
    pub fn update(&mut self, overrides: &ParamOverrides) -> Result<()> {
        let mut next = *self;
        for (key, value) in overrides.iter() {
            if Self::is_field(key) {
                next.set(key, value.clone())?;
            } else {
                log::debug!("Ignoring unknown parameter '{}'", key);
            }
        }
        *self = next;
        Ok(())
    }

    /// All fields with enumerated values translated back
    pub fn entries(&self) -> Vec<(&'static str, ParamValue)> {
        FIELD_NAMES
            .iter()
            .filter_map(|&key| self.get(key).ok().map(|value| (key, value)))
            .collect()
    }

    /// `algorithm` as an enum, if it has a symbol
    pub fn algorithm_kind(&self) -> Option<Algorithm> {
        Algorithm::from_code(self.algorithm)
    }

    /// `centers_init` as an enum, if it has a symbol
    pub fn centers_init_kind(&self) -> Option<CentersInit> {
        CentersInit::from_code(self.centers_init)
    }

    /// `log_level` as an enum, if it has a symbol
    pub fn log_level_kind(&self) -> Option<LogLevel> {
        LogLevel::from_code(self.log_level)
    }
}

impl Serialize for IndexParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Per-call partial update of the parameter record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamOverrides {
    entries: Vec<(String, ParamValue)>,
}

impl ParamOverrides {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any earlier value for it
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, replacing an earlier value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Value for `key`
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether `key` is set
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether no key is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys and values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromStr for ParamOverrides {
    type Err = Error;

    /// Parse `key=value[,key=value...]`
    fn from_str(text: &str) -> Result<Self> {
        let mut overrides = ParamOverrides::new();
        for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidParameter(format!("expected key=value, got '{}'", pair))
            })?;
            overrides.insert(key.trim(), ParamValue::parse(value));
        }
        Ok(overrides)
    }
}

/// Parameter snapshot returned by `build_index`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildReport {
    /// Record as left by the engine after building
    pub params: IndexParams,
    /// Engine's estimated speedup over linear search
    pub speedup: f32,
}

impl BuildReport {
    /// Read a parameter, or `speedup`
    pub fn get(&self, key: &str) -> Result<ParamValue> {
        if key == "speedup" {
            return Ok(ParamValue::Float(self.speedup as f64));
        }
        self.params.get(key)
    }

    /// All parameter values followed by the speedup
    pub fn entries(&self) -> Vec<(&'static str, ParamValue)> {
        let mut entries = self.params.entries();
        entries.push(("speedup", ParamValue::Float(self.speedup as f64)));
        entries
    }
}

impl Serialize for BuildReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let params = IndexParams::default();
        assert_eq!(params.get("algorithm").unwrap(), ParamValue::from("kdtree"));
        assert_eq!(params.get("checks").unwrap(), ParamValue::Int(32));
        assert_eq!(params.get("centers_init").unwrap(), ParamValue::from("random"));
        assert_eq!(params.get("log_level").unwrap(), ParamValue::from("warning"));
        assert_eq!(params.get("random_seed").unwrap(), ParamValue::Int(-1));
        assert_relative_eq!(params.build_weight, 0.01);
    }

    #[test]
    fn test_symbol_round_trip() {
        let mut params = IndexParams::default();
        params.set("algorithm", "kmeans").unwrap();
        assert_eq!(params.algorithm, 2);
        assert_eq!(params.get("algorithm").unwrap(), ParamValue::from("kmeans"));

        params.set("algorithm", "kdtree").unwrap();
        assert_eq!(params.algorithm, 1);
        assert_eq!(params.get("algorithm").unwrap(), ParamValue::from("kdtree"));
    }

    #[test]
    fn test_default_alias_reads_back_canonical() {
        let mut params = IndexParams::default();
        params.set("log_level", "default").unwrap();
        assert_eq!(params.log_level, 2);
        assert_eq!(params.get("log_level").unwrap(), ParamValue::from("error"));

        params.set("algorithm", "default").unwrap();
        assert_eq!(params.get("algorithm").unwrap(), ParamValue::from("kdtree"));
    }

    #[test]
    fn test_unmapped_codes_pass_through() {
        let mut params = IndexParams::default();
        params.set("algorithm", 7).unwrap();
        assert_eq!(params.algorithm, 7);
        assert_eq!(params.get("algorithm").unwrap(), ParamValue::Int(7));
        assert_eq!(params.algorithm_kind(), None);
    }

    #[test]
    fn test_update_ignores_unknown_keys() {
        let mut params = IndexParams::default();
        let overrides = ParamOverrides::new()
            .set("trees", 8)
            .set("no_such_field", 3)
            .set("centers_init", CentersInit::KMeansPP);
        params.update(&overrides).unwrap();

        assert_eq!(params.trees, 8);
        assert_eq!(params.centers_init_kind(), Some(CentersInit::KMeansPP));
        // Untouched fields keep their prior value
        assert_eq!(params.checks, 32);
        assert_eq!(params.branching, 32);
    }

    #[test]
    fn test_failed_update_leaves_record_untouched() {
        let mut params = IndexParams::default();
        let overrides = ParamOverrides::new()
            .set("log_level", LogLevel::Info)
            .set("trees", 8)
            .set("checks", "many");
        assert!(matches!(params.update(&overrides), Err(Error::InvalidParameter(_))));
        assert_eq!(params, IndexParams::default());
    }

    #[test]
    fn test_indexing_unknown_key_fails() {
        let mut params = IndexParams::default();
        assert!(matches!(params.get("bogus"), Err(Error::InvalidParameter(_))));
        assert!(matches!(params.set("bogus", 1), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_value_type_checks() {
        let mut params = IndexParams::default();
        assert!(params.set("checks", "many").is_err());
        assert!(params.set("checks", 1.5).is_err());
        params.set("checks", 64.0).unwrap();
        assert_eq!(params.checks, 64);

        params.set("cb_index", 1).unwrap();
        assert_relative_eq!(params.cb_index, 1.0);
        assert!(params.set("algorithm", "octree").is_err());
    }

    #[test]
    fn test_parse_overrides() {
        let overrides: ParamOverrides = "algorithm=kmeans, branching=16,cb_index=0.2".parse().unwrap();
        assert_eq!(overrides.get("algorithm"), Some(&ParamValue::from("kmeans")));
        assert_eq!(overrides.get("branching"), Some(&ParamValue::Int(16)));
        assert_eq!(overrides.get("cb_index"), Some(&ParamValue::Float(0.2)));
        assert!("trees".parse::<ParamOverrides>().is_err());
    }

    #[test]
    fn test_overrides_replace_key() {
        let overrides = ParamOverrides::new().set("trees", 2).set("trees", 4);
        assert_eq!(overrides.iter().count(), 1);
        assert_eq!(overrides.get("trees"), Some(&ParamValue::Int(4)));
    }

    #[test]
    fn test_enum_codes() {
        assert_eq!(Algorithm::Autotuned.code(), 255);
        assert_eq!(Algorithm::from_code(254), Some(Algorithm::Saved));
        assert_eq!("KMEANSPP".parse::<CentersInit>().unwrap(), CentersInit::KMeansPP);
        assert_eq!(LogLevel::Info.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_build_report_serializes_flat() {
        let report = BuildReport {
            params: IndexParams::default(),
            speedup: 2.5,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["algorithm"], "kdtree");
        assert_eq!(json["trees"], 1);
        assert_eq!(json["speedup"], 2.5);
        assert_eq!(report.get("speedup").unwrap(), ParamValue::Float(2.5));
    }
}
