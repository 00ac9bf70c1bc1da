//! Structural expression trees
//!
//! The serializable form of a host-language lambda. Facts authored outside
//! the rule language arrive in this shape; the snippet parser also lowers
//! its source text into the same tree before compilation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters every compiled expression receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TreeParameter {
    /// The execution context (members: `Target`, `Mode`, variables)
    Context,
    /// The current frame's scoped object
    #[serde(alias = "scopedObject")]
    Scope,
    /// The value being transformed by a normalize entry
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

/// A node of a structural expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum ExprTree {
    Constant {
        value: Value,
    },
    Parameter {
        name: TreeParameter,
    },
    /// A lambda parameter or a context variable
    Variable {
        name: String,
    },
    Member {
        target: Box<ExprTree>,
        member: String,
    },
    Index {
        target: Box<ExprTree>,
        index: Box<ExprTree>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ExprTree>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprTree>,
        right: Box<ExprTree>,
    },
    Conditional {
        test: Box<ExprTree>,
        then: Box<ExprTree>,
        otherwise: Box<ExprTree>,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Vec<ExprTree>,
    },
    Method {
        target: Box<ExprTree>,
        method: String,
        #[serde(default)]
        args: Vec<ExprTree>,
    },
    /// Only valid as a method argument
    Lambda {
        parameter: String,
        body: Box<ExprTree>,
    },
}

impl ExprTree {
    pub fn constant(value: impl Into<Value>) -> Self {
        ExprTree::Constant {
            value: value.into(),
        }
    }

    pub fn parameter(name: TreeParameter) -> Self {
        ExprTree::Parameter { name }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ExprTree::Variable { name: name.into() }
    }

    pub fn member(target: ExprTree, member: impl Into<String>) -> Self {
        ExprTree::Member {
            target: Box::new(target),
            member: member.into(),
        }
    }

    pub fn not(operand: ExprTree) -> Self {
        ExprTree::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: ExprTree, right: ExprTree) -> Self {
        ExprTree::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn method(target: ExprTree, method: impl Into<String>, args: Vec<ExprTree>) -> Self {
        ExprTree::Method {
            target: Box::new(target),
            method: method.into(),
            args,
        }
    }

    pub fn lambda(parameter: impl Into<String>, body: ExprTree) -> Self {
        ExprTree::Lambda {
            parameter: parameter.into(),
            body: Box::new(body),
        }
    }
}
