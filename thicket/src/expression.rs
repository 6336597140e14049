use std::fmt;

/// A literal value written directly in a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Where a binding path starts resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot {
    /// Variables in scope first, then the model.
    Scope,
    /// The model root only (`$`).
    Model,
}

/// A dotted access path such as `order.Lines.0.Price` or `$.Title`.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingPath {
    pub root: PathRoot,
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Logical not: !x
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    LogicalAnd,
    LogicalOr,
    Equality,
    Inequality,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

/// A value-producing expression inside a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Path(BindingPath),
    FunctionCall {
        name: String,
        arguments: Vec<Expression>,
    },
    UnaryOperation {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    BinaryOperation {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl fmt::Display for BindingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.root == PathRoot::Model {
            write!(f, "$")?;
            for segment in &self.segments {
                write!(f, ".{}", segment)?;
            }
            return Ok(());
        }
        write!(f, "{}", self.segments.join("."))
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::Equality => "==",
            BinaryOperator::Inequality => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThanOrEqual => "<=",
        };
        write!(f, "{}", symbol)
    }
}
