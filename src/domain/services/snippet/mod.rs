//! Rule expression language
//!
//! A small C#-flavoured expression language over JSON values:
//!
//! ```text
//! !scopedObject.deceasedDate.HasValue
//! scopedObject.tags.Any(t => t.key == "smoker" && t.value == true)
//! ageInYears(scope.dateOfBirth) >= 65 ? "senior" : "adult"
//! ```
//!
//! Source text is tokenized with logos, parsed with a Pratt parser into the same
//! [`ExprTree`](crate::domain::entities::ExprTree) used by structural
//! expressions, and then compiled by the expression compiler.

mod lexer;
mod parser;

pub use lexer::{tokenize, Token, TokenKind};
pub use parser::parse;
