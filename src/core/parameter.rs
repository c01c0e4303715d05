//! 参数
//!
//! 参数是带类型的命名值，值文本可以是字面量，也可以是引用同组件参数（`self.X`）
//! 或上层系统参数的表达式。每次运行前重新求值；任何一个参数求值失败，模型都拒绝启动。

use serde::{Deserialize, Serialize};

use super::error::{KernelError, KernelResult};
use super::expr;

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Double,
    Integer,
    Bool,
    String,
    Conditional,
}

/// 求值后的参数值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Double(v) => Some(*v),
            ParameterValue::Integer(v) => Some(*v as f64),
            ParameterValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParameterValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Integer(v) => Some(*v),
            ParameterValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn type_of(&self) -> ParameterType {
        match self {
            ParameterValue::Bool(_) => ParameterType::Bool,
            ParameterValue::Integer(_) => ParameterType::Integer,
            ParameterValue::Double(_) => ParameterType::Double,
            ParameterValue::Text(_) => ParameterType::String,
        }
    }

    fn to_text(&self) -> String {
        match self {
            ParameterValue::Bool(b) => b.to_string(),
            ParameterValue::Integer(v) => v.to_string(),
            ParameterValue::Double(v) => v.to_string(),
            ParameterValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Double(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Integer(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

/// 单个参数
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    description: String,
    unit: String,
    ptype: ParameterType,
    value_text: String,
    evaluated: Option<ParameterValue>,
    constant: bool,
    conditions: Vec<String>,
}

impl Parameter {
    /// 以默认值创建参数，类型由默认值决定
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        default: ParameterValue,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            ptype: default.type_of(),
            value_text: default.to_text(),
            evaluated: Some(default),
            constant: false,
            conditions: Vec::new(),
        }
    }

    /// 条件参数：值为 `choices` 的下标
    pub fn conditional(
        name: impl Into<String>,
        description: impl Into<String>,
        choices: Vec<String>,
        default: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: String::new(),
            ptype: ParameterType::Conditional,
            value_text: default.to_string(),
            evaluated: Some(ParameterValue::Integer(default)),
            constant: false,
            conditions: choices,
        }
    }

    pub fn as_constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.ptype
    }

    pub fn value_text(&self) -> &str {
        &self.value_text
    }

    pub fn evaluated(&self) -> Option<&ParameterValue> {
        self.evaluated.as_ref()
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_evaluated(&mut self, v: ParameterValue) {
        self.evaluated = Some(v);
    }

    /// 只做语法层面的检查：名字一律视为可解析
    fn check_syntax(&self, text: &str) -> KernelResult<()> {
        let text = text.trim();
        match self.ptype {
            ParameterType::String => Ok(()),
            ParameterType::Bool => {
                if matches!(text, "true" | "false" | "0" | "1") || is_identifier(text) {
                    Ok(())
                } else {
                    Err(self.error(format!("`{text}` is not a bool")))
                }
            }
            _ => expr::evaluate(text, &|_| Some(1.0)).map(|_| ()).map_err(|e| self.error(e.to_string())),
        }
    }

    /// 设置值文本（字面量或表达式），语法不合法时保持原值
    pub fn set_value_text(&mut self, text: &str) -> KernelResult<()> {
        self.check_syntax(text)?;
        self.value_text = text.trim().to_string();
        self.evaluated = None;
        Ok(())
    }

    fn error(&self, reason: String) -> KernelError {
        KernelError::Parameter {
            name: self.name.clone(),
            reason,
        }
    }

    /// 在给定作用域里求值；作用域负责解析 `self.X` 与系统参数名
    pub fn evaluate(&self, scope: &dyn Fn(&str) -> Option<f64>) -> KernelResult<ParameterValue> {
        let text = self.value_text.trim();
        match self.ptype {
            ParameterType::Double => {
                let v = match text.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => expr::evaluate(text, scope).map_err(|e| self.error(e.to_string()))?,
                };
                if v.is_finite() {
                    Ok(ParameterValue::Double(v))
                } else {
                    Err(self.error(format!("`{text}` is not a finite number")))
                }
            }
            ParameterType::Integer | ParameterType::Conditional => {
                let v = match text.parse::<i64>() {
                    Ok(v) => v,
                    Err(_) => {
                        let f = expr::evaluate(text, scope).map_err(|e| self.error(e.to_string()))?;
                        if f.fract() != 0.0 {
                            return Err(self.error(format!("`{text}` = {f} is not an integer")));
                        }
                        f as i64
                    }
                };
                if self.ptype == ParameterType::Conditional
                    && (v < 0 || v as usize >= self.conditions.len())
                {
                    return Err(self.error(format!(
                        "choice {v} out of range 0..{}",
                        self.conditions.len()
                    )));
                }
                Ok(ParameterValue::Integer(v))
            }
            ParameterType::Bool => match text {
                "true" | "1" => Ok(ParameterValue::Bool(true)),
                "false" | "0" => Ok(ParameterValue::Bool(false)),
                name => scope(name)
                    .map(|v| ParameterValue::Bool(v != 0.0))
                    .ok_or_else(|| self.error(format!("`{name}` is not a bool"))),
            },
            ParameterType::String => Ok(ParameterValue::Text(text.to_string())),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '#'))
}

/// 组件（或系统）的参数集合
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn add(&mut self, p: Parameter) -> KernelResult<()> {
        if self.contains(p.name()) {
            return Err(KernelError::NameInUse(p.name().to_string()));
        }
        self.params.push(p);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let idx = self.params.iter().position(|p| p.name == name)?;
        Some(self.params.remove(idx))
    }

    pub fn rename(&mut self, old: &str, new: &str) -> KernelResult<()> {
        if self.contains(new) {
            return Err(KernelError::NameInUse(new.to_string()));
        }
        let p = self.get_mut(old).ok_or_else(|| KernelError::Parameter {
            name: old.to_string(),
            reason: "no such parameter".to_string(),
        })?;
        p.set_name(new);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name == name)
    }

    pub fn set_value(&mut self, name: &str, text: &str) -> KernelResult<()> {
        let p = self.get_mut(name).ok_or_else(|| KernelError::Parameter {
            name: name.to_string(),
            reason: "no such parameter".to_string(),
        })?;
        p.set_value_text(text)
    }

    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.params.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
