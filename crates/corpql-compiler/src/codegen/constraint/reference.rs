//! Reference resolution
//!
//! Turns one side of a comparison into SQL text tagged with the kind of value
//! it produces, adding the lookup joins attribute access needs.

use super::{ConstraintCompiler, Scope};
use crate::error::{CompileError, Result};
use crate::sql::{number_literal, quote_literal, Joins};
use corpql_core::ast::Reference;
use corpql_core::config::{AttributeType, Lookup};

/// Kind of value an operand evaluates to
#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Text,
    Categorical,
    Number,
    Date,
    /// Whole dict-typed attribute
    Dict,
    /// Bitmask with the lookup table resolving label names to bits
    Labels { lookup: Lookup },
    /// Entity identifier of a layer
    Entity { layer: String },
    /// Regular expression pattern (raw, unquoted)
    Regex(String),
    /// String literal (raw, unquoted)
    StringLiteral(String),
    NumberLiteral,
}

impl OperandKind {
    pub fn is_textual(&self) -> bool {
        matches!(self, OperandKind::Text | OperandKind::Categorical)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, OperandKind::Number | OperandKind::NumberLiteral)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            OperandKind::StringLiteral(_) | OperandKind::NumberLiteral | OperandKind::Regex(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperandKind::Text => "text",
            OperandKind::Categorical => "categorical",
            OperandKind::Number => "number",
            OperandKind::Date => "date",
            OperandKind::Dict => "dict",
            OperandKind::Labels { .. } => "labels",
            OperandKind::Entity { .. } => "entity",
            OperandKind::Regex(_) => "regex",
            OperandKind::StringLiteral(_) => "string",
            OperandKind::NumberLiteral => "number literal",
        }
    }
}

/// Resolved side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub sql: String,
    pub kind: OperandKind,
    pub joins: Joins,
}

impl Operand {
    fn new(sql: String, kind: OperandKind) -> Self {
        Self {
            sql,
            kind,
            joins: Joins::new(),
        }
    }
}

impl ConstraintCompiler<'_> {
    /// Resolve any reference
    pub fn resolve(&self, scope: &Scope, reference: &Reference) -> Result<Operand> {
        match reference {
            Reference::String(value) => Ok(Operand::new(
                quote_literal(value),
                OperandKind::StringLiteral(value.clone()),
            )),
            Reference::Regex(pattern) => Ok(Operand::new(
                quote_literal(pattern),
                OperandKind::Regex(pattern.clone()),
            )),
            Reference::Number(value) => {
                Ok(Operand::new(number_literal(*value), OperandKind::NumberLiteral))
            }
            Reference::Attribute(path) => self.resolve_attribute(scope, path),
            Reference::Entity(label) => self.resolve_entity(scope, label),
            Reference::Function { name, args } => self.resolve_function(scope, name, args),
            Reference::Math {
                operator,
                left,
                right,
            } => {
                let left = self.resolve(scope, left)?;
                let right = self.resolve(scope, right)?;
                for operand in [&left, &right] {
                    if !operand.kind.is_numeric() {
                        return Err(CompileError::TypeError(format!(
                            "arithmetic on a {} operand",
                            operand.kind.name()
                        )));
                    }
                }
                let mut joins = left.joins;
                joins.merge(right.joins);
                Ok(Operand {
                    sql: format!("({} {} {})", left.sql, operator.symbol(), right.sql),
                    kind: OperandKind::Number,
                    joins,
                })
            }
        }
    }

    /// Resolve `attr`, `label.attr` or a dict path such as `ufeat.Number`
    pub fn resolve_attribute(&self, scope: &Scope, path: &str) -> Result<Operand> {
        let parts: Vec<&str> = path.split('.').collect();
        let (label, rest) = match parts.as_slice() {
            [head, rest @ ..] if !rest.is_empty() && self.names_unit(head) => {
                (head.to_string(), rest.to_vec())
            }
            _ => match &scope.label {
                Some(label) => (label.clone(), parts.clone()),
                None => {
                    return Err(CompileError::ReferenceError(format!(
                        "attribute '{}' needs a label outside a unit",
                        path
                    )))
                }
            },
        };

        let alias = self.alias_in(scope, &label)?;
        let layer = self.layer_in(scope, &label)?;
        let (attribute, subpath) = match rest.split_first() {
            Some((attribute, subpath)) => (*attribute, subpath),
            None => {
                return Err(CompileError::ReferenceError(format!(
                    "empty attribute path '{}'",
                    path
                )))
            }
        };

        let declared = self.config.attribute(&layer, attribute)?;
        let storage = self.config.attribute_storage(&layer, attribute)?;
        let column = format!("{}.{}", alias, storage.column);

        if !subpath.is_empty() && declared.kind != AttributeType::Dict {
            return Err(CompileError::TypeError(format!(
                "'{}.{}' is {}, not a dict",
                layer,
                attribute,
                declared.kind.name()
            )));
        }

        let operand = match (declared.kind, storage.lookup) {
            (AttributeType::Labels, Some(lookup)) => {
                Operand::new(column, OperandKind::Labels { lookup })
            }
            (AttributeType::Dict, _) => match subpath.split_last() {
                None => Operand::new(column, OperandKind::Dict),
                Some((last, init)) => {
                    let mut sql = column;
                    for key in init {
                        sql = format!("{} -> {}", sql, quote_literal(key));
                    }
                    Operand::new(
                        format!("{} ->> {}", sql, quote_literal(last)),
                        OperandKind::Text,
                    )
                }
            },
            (AttributeType::Entity, _) => {
                let target = declared.entity.clone().ok_or_else(|| {
                    CompileError::ReferenceError(format!(
                        "entity attribute '{}.{}' has no target layer",
                        layer, attribute
                    ))
                })?;
                Operand::new(column, OperandKind::Entity { layer: target })
            }
            (kind, Some(lookup)) => {
                let lookup_alias = format!("{}_{}", alias, attribute);
                let mut joins = Joins::new();
                joins.add_inner(
                    &lookup.table,
                    &lookup_alias,
                    format!("{}.{} = {}", lookup_alias, lookup.key, column),
                    Some(&label),
                );
                Operand {
                    sql: format!("{}.{}", lookup_alias, lookup.value),
                    kind: simple_kind(kind),
                    joins,
                }
            }
            (kind, None) => Operand::new(column, simple_kind(kind)),
        };
        Ok(operand)
    }

    /// Resolve a reference to another labelled entity
    pub fn resolve_entity(&self, scope: &Scope, label: &str) -> Result<Operand> {
        let alias = self.alias_in(scope, label)?;
        let layer = self.layer_in(scope, label)?;
        Ok(Operand::new(
            format!("{}.{}", alias, self.config.id_column(&layer)),
            OperandKind::Entity { layer },
        ))
    }

    fn names_unit(&self, label: &str) -> bool {
        self.labels.get(label).is_some_and(|info| info.is_unit())
    }

    fn resolve_function(&self, scope: &Scope, name: &str, args: &[Reference]) -> Result<Operand> {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "length" => {
                let [arg] = args else {
                    return Err(arity(&name, 1, args.len()));
                };
                let operand = self.resolve(scope, arg)?;
                if !operand.kind.is_textual() {
                    return Err(CompileError::TypeError(format!(
                        "length() of a {} value",
                        operand.kind.name()
                    )));
                }
                Ok(Operand {
                    sql: format!("length({})", operand.sql),
                    kind: OperandKind::Number,
                    joins: operand.joins,
                })
            }
            "year" | "month" | "day" | "decade" | "century" => {
                let [arg] = args else {
                    return Err(arity(&name, 1, args.len()));
                };
                let operand = self.resolve(scope, arg)?;
                if operand.kind != OperandKind::Date {
                    return Err(CompileError::TypeError(format!(
                        "{}() of a {} value",
                        name,
                        operand.kind.name()
                    )));
                }
                Ok(Operand {
                    sql: format!("extract({} from {})", name, operand.sql),
                    kind: OperandKind::Number,
                    joins: operand.joins,
                })
            }
            "position" | "range" => {
                let label = match args {
                    [] => scope.label.clone().ok_or_else(|| {
                        CompileError::SyntaxError(format!("{}() needs a label here", name))
                    })?,
                    [Reference::Entity(label)] | [Reference::Attribute(label)] => label.clone(),
                    [_] => {
                        return Err(CompileError::TypeError(format!(
                            "{}() takes a label",
                            name
                        )))
                    }
                    _ => return Err(arity(&name, 1, args.len())),
                };
                let alias = self.alias_in(scope, &label)?;
                let layer = self.layer_in(scope, &label)?;
                let sql = if name == "position" {
                    if !self.config.is_stream_anchored(&layer) {
                        return Err(CompileError::TypeError(format!(
                            "position() of {} which is not stream-anchored",
                            layer
                        )));
                    }
                    format!("lower({}.char_range)", alias)
                } else {
                    let column = if self.config.is_time_anchored(&layer) {
                        "frame_range"
                    } else if self.config.is_stream_anchored(&layer) {
                        "char_range"
                    } else {
                        return Err(CompileError::TypeError(format!(
                            "range() of {} which is not anchored",
                            layer
                        )));
                    };
                    format!("(upper({a}.{c}) - lower({a}.{c}))", a = alias, c = column)
                };
                Ok(Operand::new(sql, OperandKind::Number))
            }
            _ => Err(CompileError::NotImplemented(format!(
                "function '{}' is not allowed",
                name
            ))),
        }
    }
}

fn simple_kind(kind: AttributeType) -> OperandKind {
    match kind {
        AttributeType::Categorical => OperandKind::Categorical,
        AttributeType::Number => OperandKind::Number,
        AttributeType::Date => OperandKind::Date,
        _ => OperandKind::Text,
    }
}

fn arity(name: &str, expected: usize, actual: usize) -> CompileError {
    CompileError::SyntaxError(format!(
        "{}() takes {} argument(s), got {}",
        name, expected, actual
    ))
}
