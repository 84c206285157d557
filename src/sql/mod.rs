/// jsql query language
///
/// Architecture:
/// - Lexer: Tokenizes SQL strings
/// - Binder: Resolves `$params` and `NOW()`
/// - Segmenter: Splits UNION statements and clause keywords
/// - Parser: Builds `Query` values from clause segments
/// - Optimizer: Picks an index/count shortcut or a full scan
/// - Executor: Runs queries against a `TableStore`

pub mod token;
pub mod lexer;
pub mod params;
pub mod segment;
pub mod query;
pub mod parser;
pub mod where_builder;
pub mod format;
pub mod evaluator;
pub mod optimizer;
pub mod executor;

pub use token::{Token, TokenType};
pub use lexer::Lexer;
pub use params::{Binder, Clock, FixedClock, Params, SystemClock};
pub use query::{
    AggregateFunction, AggregateSpec, Check, CheckItem, ColumnAlias, Condition, Format, FormatKind,
    Operator, Order, Query, SortDirection, StatementType,
};
pub use parser::{parse, Parser};
pub use evaluator::Evaluator;
pub use optimizer::{AccessPath, QueryPlan};
pub use executor::{Executor, QueryOutput};
