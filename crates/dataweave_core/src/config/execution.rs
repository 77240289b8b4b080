use std::collections::HashMap;
use std::sync::LazyLock;

use dataweave_error::{DbError, Result};

use crate::values::Value;

pub const DEFAULT_MAX_NEGOTIATION_DEPTH: usize = 64;

const MAX_NEGOTIATION_DEPTH_LIMIT: usize = 4096;

/// Configuration for executing expressions against a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Offer subtrees to the data source for native execution.
    pub enable_optimizer: bool,
    /// Run the naive evaluator alongside the optimized execution and error
    /// if the results differ.
    pub verify_optimized: bool,
    /// Depth in the expression tree below which subtrees are no longer
    /// offered to the data source.
    pub max_negotiation_depth: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            enable_optimizer: true,
            verify_optimized: false,
            max_negotiation_depth: DEFAULT_MAX_NEGOTIATION_DEPTH,
        }
    }
}

impl ExecutionConfig {
    pub fn set_from_value(&mut self, name: &str, value: &Value) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_value(&self, name: &str) -> Result<Value> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let default = Self::default();
        let value = default.get_as_value(name)?;
        self.set_from_value(name, &value)
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// Names and descriptions of all settings.
    pub fn settings() -> impl Iterator<Item = (&'static str, &'static str)> {
        GET_SET_FUNCTIONS
            .iter()
            .map(|(name, funcs)| (*name, funcs.description))
    }
}

struct SettingFunctions {
    description: &'static str,
    set: fn(value: &Value, conf: &mut ExecutionConfig) -> Result<()>,
    get: fn(conf: &ExecutionConfig) -> Value,
}

impl SettingFunctions {
    const fn new<S: ExecutionSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_value as _,
            get: S::get_as_value as _,
        }
    }
}

fn insert_setting<S: ExecutionSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<EnableOptimizer>(&mut map);
    insert_setting::<VerifyOptimized>(&mut map);
    insert_setting::<MaxNegotiationDepth>(&mut map);

    map
});

pub trait ExecutionSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_value(value: &Value, conf: &mut ExecutionConfig) -> Result<()>;
    fn get_as_value(conf: &ExecutionConfig) -> Value;
}

pub struct EnableOptimizer;

impl ExecutionSetting for EnableOptimizer {
    const NAME: &'static str = "enable_optimizer";
    const DESCRIPTION: &'static str = "Controls if subtrees are offered for native execution";

    fn set_from_value(value: &Value, conf: &mut ExecutionConfig) -> Result<()> {
        conf.enable_optimizer = value.try_as_bool()?;
        Ok(())
    }

    fn get_as_value(conf: &ExecutionConfig) -> Value {
        conf.enable_optimizer.into()
    }
}

pub struct VerifyOptimized;

impl ExecutionSetting for VerifyOptimized {
    const NAME: &'static str = "verify_optimized";
    const DESCRIPTION: &'static str =
        "Compare optimized results against naive evaluation of the full tree";

    fn set_from_value(value: &Value, conf: &mut ExecutionConfig) -> Result<()> {
        conf.verify_optimized = value.try_as_bool()?;
        Ok(())
    }

    fn get_as_value(conf: &ExecutionConfig) -> Value {
        conf.verify_optimized.into()
    }
}

pub struct MaxNegotiationDepth;

impl ExecutionSetting for MaxNegotiationDepth {
    const NAME: &'static str = "max_negotiation_depth";
    const DESCRIPTION: &'static str = "Deepest subtree offered to a data source";

    fn set_from_value(value: &Value, conf: &mut ExecutionConfig) -> Result<()> {
        let val = value.try_as_i64()?;
        if val < 0 || val as usize > MAX_NEGOTIATION_DEPTH_LIMIT {
            return Err(DbError::new(format!(
                "Negotiation depth must be between 0 and {MAX_NEGOTIATION_DEPTH_LIMIT}"
            )));
        }
        conf.max_negotiation_depth = val as usize;
        Ok(())
    }

    fn get_as_value(conf: &ExecutionConfig) -> Value {
        Value::Int(conf.max_negotiation_depth as i64)
    }
}
