//! AST types for DynamoDB expression parsing.
//!
//! This module defines the abstract syntax tree for DynamoDB condition, filter,
//! key-condition, update, and projection expressions. The AST is produced by the
//! parser and consumed by the evaluator. Placeholders stay unresolved in the
//! AST; [`Placeholders`] collects them so a request can check that every
//! reference is defined and every definition is referenced.

use std::collections::HashMap;
use std::fmt;

use super::error::{ExpressionError, ExpressionKind};
use super::path::{DocumentPath, PathStep};

/// Expression AST node for condition, filter, and key-condition expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Comparison expression: `left op right`.
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// Between expression: `value BETWEEN low AND high`.
    Between {
        value: Operand,
        low: Operand,
        high: Operand,
    },
    /// In expression: `value IN (list...)`.
    In { value: Operand, list: Vec<Operand> },
    /// Logical combination: `left AND right` or `left OR right`.
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Logical negation: `NOT expr`.
    Not(Box<Expr>),
    /// Boolean function call, e.g. `attribute_exists(a)`.
    Function {
        name: FunctionName,
        args: Vec<Operand>,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl CompareOp {
    /// The operator with its operands swapped (`a < b` is `b > a`).
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Built-in DynamoDB expression function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `attribute_exists(path)` - true if the attribute exists.
    AttributeExists,
    /// `attribute_not_exists(path)` - true if the attribute does not exist.
    AttributeNotExists,
    /// `attribute_type(path, type)` - true if the attribute is of the given type.
    AttributeType,
    /// `begins_with(path, substr)` - true if the string begins with the prefix.
    BeginsWith,
    /// `contains(path, operand)` - true if string contains substring or set contains element.
    Contains,
    /// `size(path)` - returns the size of the attribute.
    Size,
    /// `if_not_exists(path, operand)` - update only.
    IfNotExists,
    /// `list_append(operand, operand)` - update only.
    ListAppend,
}

impl FunctionName {
    /// Look up a function by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "attribute_exists" => Some(Self::AttributeExists),
            "attribute_not_exists" => Some(Self::AttributeNotExists),
            "attribute_type" => Some(Self::AttributeType),
            "begins_with" => Some(Self::BeginsWith),
            "contains" => Some(Self::Contains),
            "size" => Some(Self::Size),
            "if_not_exists" => Some(Self::IfNotExists),
            "list_append" => Some(Self::ListAppend),
            _ => None,
        }
    }

    /// Number of arguments the function takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::AttributeExists | Self::AttributeNotExists | Self::Size => 1,
            Self::AttributeType
            | Self::BeginsWith
            | Self::Contains
            | Self::IfNotExists
            | Self::ListAppend => 2,
        }
    }

    /// Returns `true` for functions that evaluate to a boolean condition.
    #[must_use]
    pub fn is_condition(self) -> bool {
        matches!(
            self,
            Self::AttributeExists
                | Self::AttributeNotExists
                | Self::AttributeType
                | Self::BeginsWith
                | Self::Contains
        )
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::AttributeType => write!(f, "attribute_type"),
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
            Self::Size => write!(f, "size"),
            Self::IfNotExists => write!(f, "if_not_exists"),
            Self::ListAppend => write!(f, "list_append"),
        }
    }
}

/// An operand in a condition (a value producer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A document path reference (e.g., `info.rating`, `#name`, `myList[0]`).
    Path(AttributePath),
    /// An expression attribute value reference, with its `:` prefix.
    Value(String),
    /// `size(path)` used as a comparison operand.
    Size(AttributePath),
}

/// A document path as written, placeholders unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    /// The path elements in order.
    pub elements: Vec<PathElement>,
}

impl AttributePath {
    /// Substitute `#name` placeholders, producing a [`DocumentPath`].
    pub fn resolve(
        &self,
        names: &HashMap<String, String>,
        kind: ExpressionKind,
    ) -> Result<DocumentPath, ExpressionError> {
        let steps = self
            .elements
            .iter()
            .map(|element| match element {
                PathElement::Attribute(name) => Ok(PathStep::Key(name.clone())),
                PathElement::Placeholder(placeholder) => names
                    .get(placeholder)
                    .map(|name| PathStep::Key(name.clone()))
                    .ok_or_else(|| ExpressionError::UnresolvedName {
                        kind,
                        name: placeholder.clone(),
                    }),
                PathElement::Index(idx) => Ok(PathStep::Index(*idx)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentPath::new(steps))
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elements.iter().enumerate() {
            match elem {
                PathElement::Attribute(name) | PathElement::Placeholder(name) => {
                    if i > 0 {
                        write!(f, ".{name}")?;
                    } else {
                        write!(f, "{name}")?;
                    }
                }
                PathElement::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// A single element in an attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// A literal attribute name.
    Attribute(String),
    /// A `#name` placeholder, with its prefix.
    Placeholder(String),
    /// A list index dereference (e.g., `[0]`).
    Index(usize),
}

/// Update expression AST containing all four clause types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateExpr {
    /// SET actions: assign values to attributes.
    pub set_actions: Vec<SetAction>,
    /// REMOVE actions: remove attributes.
    pub remove_paths: Vec<AttributePath>,
    /// ADD actions: add to numbers or sets.
    pub add_actions: Vec<AddAction>,
    /// DELETE actions: remove elements from sets.
    pub delete_actions: Vec<DeleteAction>,
}

impl UpdateExpr {
    /// Every path the update writes, in clause order.
    pub fn target_paths(&self) -> impl Iterator<Item = &AttributePath> {
        self.set_actions
            .iter()
            .map(|a| &a.path)
            .chain(&self.remove_paths)
            .chain(self.add_actions.iter().map(|a| &a.path))
            .chain(self.delete_actions.iter().map(|a| &a.path))
    }
}

/// A single SET action: `path = value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAction {
    /// Target attribute path.
    pub path: AttributePath,
    /// Value to assign.
    pub value: SetValue,
}

/// The right-hand side of a SET action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetValue {
    /// Simple operand assignment.
    Operand(UpdateOperand),
    /// Addition: `left + right`.
    Plus(UpdateOperand, UpdateOperand),
    /// Subtraction: `left - right`.
    Minus(UpdateOperand, UpdateOperand),
}

/// An operand on the right-hand side of a SET action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOperand {
    /// A document path, read from the item before the update.
    Path(AttributePath),
    /// An expression attribute value, with its `:` prefix.
    Value(String),
    /// `if_not_exists(path, operand)`.
    IfNotExists(AttributePath, Box<UpdateOperand>),
    /// `list_append(operand, operand)`.
    ListAppend(Box<UpdateOperand>, Box<UpdateOperand>),
}

/// A single ADD action: `path :value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddAction {
    /// Target attribute path.
    pub path: AttributePath,
    /// Value placeholder to add.
    pub value: String,
}

/// A single DELETE action: `path :value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAction {
    /// Target attribute path.
    pub path: AttributePath,
    /// Value placeholder holding the set to subtract.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Collecting used expression attribute names and values from ASTs
// ---------------------------------------------------------------------------

/// Placeholders referenced by one or more expressions, in order of first use.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    /// `#name` references.
    pub names: Vec<String>,
    /// `:value` references.
    pub values: Vec<String>,
}

impl Placeholders {
    fn add_name(&mut self, name: &str) {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_owned());
        }
    }

    fn add_value(&mut self, value: &str) {
        if !self.values.iter().any(|v| v == value) {
            self.values.push(value.to_owned());
        }
    }

    /// Record the placeholders of a condition expression.
    pub fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Compare { left, right, .. } => {
                self.visit_operand(left);
                self.visit_operand(right);
            }
            Expr::Between { value, low, high } => {
                self.visit_operand(value);
                self.visit_operand(low);
                self.visit_operand(high);
            }
            Expr::In { value, list } => {
                self.visit_operand(value);
                for item in list {
                    self.visit_operand(item);
                }
            }
            Expr::Logical { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::Not(inner) => self.visit_expr(inner),
            Expr::Function { args, .. } => {
                for arg in args {
                    self.visit_operand(arg);
                }
            }
        }
    }

    /// Record the placeholders of an update expression.
    pub fn visit_update(&mut self, update: &UpdateExpr) {
        for action in &update.set_actions {
            self.visit_path(&action.path);
            match &action.value {
                SetValue::Operand(op) => self.visit_update_operand(op),
                SetValue::Plus(a, b) | SetValue::Minus(a, b) => {
                    self.visit_update_operand(a);
                    self.visit_update_operand(b);
                }
            }
        }
        for path in &update.remove_paths {
            self.visit_path(path);
        }
        for action in &update.add_actions {
            self.visit_path(&action.path);
            self.add_value(&action.value);
        }
        for action in &update.delete_actions {
            self.visit_path(&action.path);
            self.add_value(&action.value);
        }
    }

    /// Record the placeholders of projection paths.
    pub fn visit_projection(&mut self, paths: &[AttributePath]) {
        for path in paths {
            self.visit_path(path);
        }
    }

    fn visit_operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Path(path) | Operand::Size(path) => self.visit_path(path),
            Operand::Value(value) => self.add_value(value),
        }
    }

    fn visit_update_operand(&mut self, operand: &UpdateOperand) {
        match operand {
            UpdateOperand::Path(path) => self.visit_path(path),
            UpdateOperand::Value(value) => self.add_value(value),
            UpdateOperand::IfNotExists(path, fallback) => {
                self.visit_path(path);
                self.visit_update_operand(fallback);
            }
            UpdateOperand::ListAppend(a, b) => {
                self.visit_update_operand(a);
                self.visit_update_operand(b);
            }
        }
    }

    fn visit_path(&mut self, path: &AttributePath) {
        for element in &path.elements {
            if let PathElement::Placeholder(name) = element {
                self.add_name(name);
            }
        }
    }
}
