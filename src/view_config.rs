/// View configuration
///
/// Turns a loosely-typed view request (pivots, aggregates, sorts, filters)
/// into a `ViewConfig` whose every column reference is checked against the
/// table schema and whose filter terms are typed for their column.
///
/// Building fails hard only on references that cannot mean anything (a
/// missing column, an unknown aggregate or sort order). A filter clause that
/// is malformed or does not suit its column is dropped with a warning and
/// the view builds from the remaining clauses.
///
/// # Examples
///
/// ```
/// use livepivot::{
///     build_view_config, IsoDateParser, LogDiagnostics, RawViewConfig, Schema, Sidedness,
///     StorageType, StringInterner,
/// };
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let schema = Schema::new(vec![
///     ("sym".to_string(), StorageType::String, true),
///     ("px".to_string(), StorageType::Float64, true),
/// ]);
/// let raw = RawViewConfig::from_json(r#"{"row-pivots": ["sym"], "columns": ["px"]}"#).unwrap();
///
/// let pool = Rc::new(RefCell::new(StringInterner::new()));
/// let config = build_view_config(&schema, &IsoDateParser, &raw, &pool, &LogDiagnostics).unwrap();
///
/// assert_eq!(config.sidedness(), Sidedness::One);
/// assert_eq!(config.aggspecs()[0].aggregate.as_str(), "sum");
/// ```

use crate::column::StorageType;
use crate::data_table::Schema;
use crate::date::DateParser;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::ingest::PRIMARY_KEY;
use crate::interner::{StringId, StringInterner};
use crate::value::parse_bool;
use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// View request as it arrives from a client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawViewConfig {
    #[serde(rename = "row-pivots", alias = "row_pivots")]
    pub row_pivots: Vec<String>,

    #[serde(rename = "column-pivots", alias = "column_pivots")]
    pub column_pivots: Vec<String>,

    /// `[column, aggregate]` pairs; a JSON object is read in key order
    #[serde(deserialize_with = "aggregate_pairs")]
    pub aggregates: Vec<(String, String)>,

    pub columns: Vec<String>,

    /// `[column, order]` pairs
    pub sort: Vec<Vec<String>>,

    /// `[column, operator, term?]` clauses
    pub filter: Vec<Vec<Value>>,

    pub filter_op: Option<String>,

    pub row_pivot_depth: Option<usize>,

    pub column_pivot_depth: Option<usize>,
}

impl RawViewConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn aggregate_pairs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, String)>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(column, agg)| match agg {
                Value::String(agg) => Ok((column, agg)),
                other => Err(D::Error::custom(format!(
                    "aggregate for column '{}' must be a string, got {}",
                    column, other
                ))),
            })
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value::<(String, String)>(item).map_err(D::Error::custom))
            .collect(),
        other => Err(D::Error::custom(format!("aggregates must be a list or an object, got {}", other))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    LessThan,
    GreaterThan,
    Equals,
    LessThanOrEquals,
    GreaterThanOrEquals,
    NotEquals,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    Contains,
    BeginsWith,
    EndsWith,
    /// `&` or `and`
    And,
    /// `|` or `or`
    Or,
}

impl FilterOp {
    pub fn from_name(name: &str) -> Option<FilterOp> {
        let op = match name {
            "<" => FilterOp::LessThan,
            ">" => FilterOp::GreaterThan,
            "==" => FilterOp::Equals,
            "<=" => FilterOp::LessThanOrEquals,
            ">=" => FilterOp::GreaterThanOrEquals,
            "!=" => FilterOp::NotEquals,
            "is null" => FilterOp::IsNull,
            "is not null" => FilterOp::IsNotNull,
            "in" => FilterOp::In,
            "not in" => FilterOp::NotIn,
            "contains" => FilterOp::Contains,
            "begins with" => FilterOp::BeginsWith,
            "ends with" => FilterOp::EndsWith,
            "&" | "and" => FilterOp::And,
            "|" | "or" => FilterOp::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::LessThan => "<",
            FilterOp::GreaterThan => ">",
            FilterOp::Equals => "==",
            FilterOp::LessThanOrEquals => "<=",
            FilterOp::GreaterThanOrEquals => ">=",
            FilterOp::NotEquals => "!=",
            FilterOp::IsNull => "is null",
            FilterOp::IsNotNull => "is not null",
            FilterOp::In => "in",
            FilterOp::NotIn => "not in",
            FilterOp::Contains => "contains",
            FilterOp::BeginsWith => "begins with",
            FilterOp::EndsWith => "ends with",
            FilterOp::And => "&",
            FilterOp::Or => "|",
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            FilterOp::LessThan
                | FilterOp::GreaterThan
                | FilterOp::Equals
                | FilterOp::LessThanOrEquals
                | FilterOp::GreaterThanOrEquals
                | FilterOp::NotEquals
        )
    }

    fn is_null_check(self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }

    /// Whether a column of `dtype` can be filtered with this operator.
    pub fn applies_to(self, dtype: StorageType) -> bool {
        if self.is_null_check() {
            return true;
        }
        match dtype {
            StorageType::String | StorageType::None => !matches!(self, FilterOp::And | FilterOp::Or),
            StorageType::Bool => matches!(
                self,
                FilterOp::Equals | FilterOp::NotEquals | FilterOp::And | FilterOp::Or
            ),
            _ => self.is_comparison() || matches!(self, FilterOp::In | FilterOp::NotIn),
        }
    }
}

/// How filter clauses combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterCombinator {
    #[default]
    And,
    Or,
}

/// Filter operand typed for its column. String terms hold a reference in
/// the table's interner for as long as the owning [`ViewConfig`] lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterTerm {
    Int32(i32),
    Float64(f64),
    Bool(bool),
    Date(NaiveDate),
    /// Epoch milliseconds
    Time(i64),
    String(StringId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub terms: Vec<FilterTerm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    SumAbs,
    AbsSum,
    Avg,
    Mean,
    Count,
    DistinctCount,
    Dominant,
    FirstByIndex,
    LastByIndex,
    Last,
    High,
    Low,
    PctSumParent,
    PctSumGrandTotal,
    Median,
    Unique,
    Any,
    Join,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Result<Aggregate> {
        let agg = match name {
            "sum" => Aggregate::Sum,
            "sum abs" => Aggregate::SumAbs,
            "abs sum" => Aggregate::AbsSum,
            "avg" => Aggregate::Avg,
            "mean" => Aggregate::Mean,
            "count" => Aggregate::Count,
            "distinct count" => Aggregate::DistinctCount,
            "dominant" => Aggregate::Dominant,
            "first by index" => Aggregate::FirstByIndex,
            "last by index" => Aggregate::LastByIndex,
            "last" => Aggregate::Last,
            "high" => Aggregate::High,
            "low" => Aggregate::Low,
            "pct sum parent" => Aggregate::PctSumParent,
            "pct sum grand total" => Aggregate::PctSumGrandTotal,
            "median" => Aggregate::Median,
            "unique" => Aggregate::Unique,
            "any" => Aggregate::Any,
            "join" => Aggregate::Join,
            _ => return Err(Error::UnknownAggregate(name.to_string())),
        };
        Ok(agg)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::SumAbs => "sum abs",
            Aggregate::AbsSum => "abs sum",
            Aggregate::Avg => "avg",
            Aggregate::Mean => "mean",
            Aggregate::Count => "count",
            Aggregate::DistinctCount => "distinct count",
            Aggregate::Dominant => "dominant",
            Aggregate::FirstByIndex => "first by index",
            Aggregate::LastByIndex => "last by index",
            Aggregate::Last => "last",
            Aggregate::High => "high",
            Aggregate::Low => "low",
            Aggregate::PctSumParent => "pct sum parent",
            Aggregate::PctSumGrandTotal => "pct sum grand total",
            Aggregate::Median => "median",
            Aggregate::Unique => "unique",
            Aggregate::Any => "any",
            Aggregate::Join => "join",
        }
    }

    pub fn is_numeric_only(self) -> bool {
        matches!(
            self,
            Aggregate::Sum
                | Aggregate::SumAbs
                | Aggregate::AbsSum
                | Aggregate::Avg
                | Aggregate::Mean
                | Aggregate::High
                | Aggregate::Low
                | Aggregate::PctSumParent
                | Aggregate::PctSumGrandTotal
                | Aggregate::Median
        )
    }

    /// Aggregate for a displayed column that names none.
    pub fn default_for(dtype: StorageType) -> Aggregate {
        if dtype.is_numeric() {
            Aggregate::Sum
        } else {
            Aggregate::Count
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggSpec {
    pub column: String,
    pub aggregate: Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    None,
    Asc,
    Desc,
    ColAsc,
    ColDesc,
    AscAbs,
    DescAbs,
    ColAscAbs,
    ColDescAbs,
}

impl SortOrder {
    pub fn from_name(name: &str) -> Result<SortOrder> {
        let order = match name {
            "none" => SortOrder::None,
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            "col asc" => SortOrder::ColAsc,
            "col desc" => SortOrder::ColDesc,
            "asc abs" => SortOrder::AscAbs,
            "desc abs" => SortOrder::DescAbs,
            "col asc abs" => SortOrder::ColAscAbs,
            "col desc abs" => SortOrder::ColDescAbs,
            _ => return Err(Error::UnknownSortOrder(name.to_string())),
        };
        Ok(order)
    }

    /// True for orders that sort the column axis of a two-sided view.
    pub fn is_column_sort(self) -> bool {
        matches!(
            self,
            SortOrder::ColAsc | SortOrder::ColDesc | SortOrder::ColAscAbs | SortOrder::ColDescAbs
        )
    }
}

/// A single sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    /// Position among the displayed columns, `None` when sorting by a hidden one
    pub index: Option<usize>,
    pub order: SortOrder,
}

/// Shape of the pivot query a config asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sidedness {
    Zero,
    One,
    Two,
}

/// Where totals rows appear in a two-sided view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Totals {
    Before,
    Hidden,
}

/// The fields each context shape consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextConfig {
    Zero {
        columns: Vec<String>,
        filters: Vec<Filter>,
        filter_op: FilterCombinator,
    },
    One {
        row_pivots: Vec<String>,
        aggspecs: Vec<AggSpec>,
        sort: Vec<SortSpec>,
        depth: usize,
        filters: Vec<Filter>,
        filter_op: FilterCombinator,
    },
    Two {
        row_pivots: Vec<String>,
        column_pivots: Vec<String>,
        aggspecs: Vec<AggSpec>,
        sort: Vec<SortSpec>,
        col_sort: Vec<SortSpec>,
        totals: Totals,
        row_depth: usize,
        column_depth: usize,
        column_only: bool,
        filters: Vec<Filter>,
        filter_op: FilterCombinator,
    },
}

/// Builds whatever evaluates a view. The crate only decides which shape is
/// needed and hands over the resolved fields.
pub trait ContextFactory {
    type Context;

    fn make_context(&mut self, sides: Sidedness, config: &ContextConfig) -> Result<Self::Context>;
}

/// Resolved view request. Owns one interner reference per string filter
/// term and gives them back when dropped.
#[derive(Debug)]
pub struct ViewConfig {
    row_pivots: Vec<String>,
    column_pivots: Vec<String>,
    aggspecs: Vec<AggSpec>,
    columns: Vec<String>,
    filters: Vec<Filter>,
    filter_op: FilterCombinator,
    sort: Vec<SortSpec>,
    col_sort: Vec<SortSpec>,
    row_pivot_depth: usize,
    column_pivot_depth: usize,
    column_only: bool,
    interner: Rc<RefCell<StringInterner>>,
}

impl ViewConfig {
    pub fn row_pivots(&self) -> &[String] {
        &self.row_pivots
    }

    pub fn column_pivots(&self) -> &[String] {
        &self.column_pivots
    }

    /// Declared aggregates in declaration order, then one default per
    /// displayed column that declared none.
    pub fn aggspecs(&self) -> &[AggSpec] {
        &self.aggspecs
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn filter_op(&self) -> FilterCombinator {
        self.filter_op
    }

    pub fn sort(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn col_sort(&self) -> &[SortSpec] {
        &self.col_sort
    }

    pub fn row_pivot_depth(&self) -> usize {
        self.row_pivot_depth
    }

    pub fn column_pivot_depth(&self) -> usize {
        self.column_pivot_depth
    }

    pub fn is_column_only(&self) -> bool {
        self.column_only
    }

    pub fn sidedness(&self) -> Sidedness {
        if !self.column_pivots.is_empty() {
            Sidedness::Two
        } else if !self.row_pivots.is_empty() {
            Sidedness::One
        } else {
            Sidedness::Zero
        }
    }

    pub fn totals(&self) -> Totals {
        if self.sort.is_empty() && self.col_sort.is_empty() {
            Totals::Hidden
        } else {
            Totals::Before
        }
    }

    /// Fields for the context factory. String terms in the returned filters
    /// borrow this config's interner references and are valid while it lives.
    pub fn context_config(&self) -> ContextConfig {
        match self.sidedness() {
            Sidedness::Zero => ContextConfig::Zero {
                columns: self.columns.clone(),
                filters: self.filters.clone(),
                filter_op: self.filter_op,
            },
            Sidedness::One => ContextConfig::One {
                row_pivots: self.row_pivots.clone(),
                aggspecs: self.aggspecs.clone(),
                sort: self.sort.clone(),
                depth: self.row_pivot_depth,
                filters: self.filters.clone(),
                filter_op: self.filter_op,
            },
            Sidedness::Two => ContextConfig::Two {
                row_pivots: self.row_pivots.clone(),
                column_pivots: self.column_pivots.clone(),
                aggspecs: self.aggspecs.clone(),
                sort: self.sort.clone(),
                col_sort: self.col_sort.clone(),
                totals: self.totals(),
                row_depth: self.row_pivot_depth,
                column_depth: self.column_pivot_depth,
                column_only: self.column_only,
                filters: self.filters.clone(),
                filter_op: self.filter_op,
            },
        }
    }

    fn string_terms(&self) -> impl Iterator<Item = StringId> + '_ {
        self.filters.iter().flat_map(|f| &f.terms).filter_map(|term| match term {
            FilterTerm::String(id) => Some(*id),
            _ => None,
        })
    }
}

impl Clone for ViewConfig {
    fn clone(&self) -> Self {
        {
            let mut pool = self.interner.borrow_mut();
            for id in self.string_terms() {
                pool.add_ref(id);
            }
        }
        ViewConfig {
            row_pivots: self.row_pivots.clone(),
            column_pivots: self.column_pivots.clone(),
            aggspecs: self.aggspecs.clone(),
            columns: self.columns.clone(),
            filters: self.filters.clone(),
            filter_op: self.filter_op,
            sort: self.sort.clone(),
            col_sort: self.col_sort.clone(),
            row_pivot_depth: self.row_pivot_depth,
            column_pivot_depth: self.column_pivot_depth,
            column_only: self.column_only,
            interner: Rc::clone(&self.interner),
        }
    }
}

impl PartialEq for ViewConfig {
    fn eq(&self, other: &Self) -> bool {
        self.row_pivots == other.row_pivots
            && self.column_pivots == other.column_pivots
            && self.aggspecs == other.aggspecs
            && self.columns == other.columns
            && self.filters == other.filters
            && self.filter_op == other.filter_op
            && self.sort == other.sort
            && self.col_sort == other.col_sort
            && self.row_pivot_depth == other.row_pivot_depth
            && self.column_pivot_depth == other.column_pivot_depth
            && self.column_only == other.column_only
    }
}

impl Drop for ViewConfig {
    fn drop(&mut self) {
        if let Ok(mut pool) = self.interner.try_borrow_mut() {
            for id in self.string_terms() {
                pool.release(id);
            }
        }
    }
}

/// Resolves `raw` against `schema`.
pub fn build_view_config(
    schema: &Schema,
    date_parser: &dyn DateParser,
    raw: &RawViewConfig,
    interner: &Rc<RefCell<StringInterner>>,
    diagnostics: &dyn Diagnostics,
) -> Result<ViewConfig> {
    let dtype_of = |name: &str| schema.get_dtype(name).ok_or_else(|| Error::ColumnNotFound(name.to_string()));

    for name in raw.row_pivots.iter().chain(&raw.column_pivots).chain(&raw.columns) {
        dtype_of(name)?;
    }

    let mut row_pivots = raw.row_pivots.clone();
    let column_only = row_pivots.is_empty() && !raw.column_pivots.is_empty();
    if column_only {
        row_pivots.push(PRIMARY_KEY.to_string());
    }

    let mut aggspecs = Vec::with_capacity(raw.aggregates.len() + raw.columns.len());
    for (column, name) in &raw.aggregates {
        let dtype = dtype_of(column)?;
        let aggregate = Aggregate::from_name(name)?;
        if aggregate.is_numeric_only() && !dtype.is_numeric() {
            diagnostics.warn(&format!(
                "Dropping aggregate '{}' on non-numeric column '{}' ({})",
                name, column, dtype
            ));
            continue;
        }
        aggspecs.push(AggSpec {
            column: column.clone(),
            aggregate,
        });
    }
    for column in &raw.columns {
        if !aggspecs.iter().any(|spec| &spec.column == column) {
            aggspecs.push(AggSpec {
                column: column.clone(),
                aggregate: Aggregate::default_for(dtype_of(column)?),
            });
        }
    }

    let mut sort = Vec::new();
    let mut col_sort = Vec::new();
    for entry in &raw.sort {
        let [column, order] = entry.as_slice() else {
            return Err(Error::InvalidOption(format!("sort entry must be [column, order], got {:?}", entry)));
        };
        dtype_of(column)?;
        let order = SortOrder::from_name(order)?;
        let spec = SortSpec {
            column: column.clone(),
            index: raw.columns.iter().position(|c| c == column),
            order,
        };
        if order.is_column_sort() {
            col_sort.push(spec);
        } else {
            sort.push(spec);
        }
    }

    let filter_op = match raw.filter_op.as_deref() {
        None | Some("and") => FilterCombinator::And,
        Some("or") => FilterCombinator::Or,
        Some(other) => {
            diagnostics.warn(&format!("Unknown filter_op '{}', combining filters with 'and'", other));
            FilterCombinator::And
        }
    };

    // Column lookups fail before any term is interned.
    let mut clauses = Vec::with_capacity(raw.filter.len());
    for clause in &raw.filter {
        match (clause.first(), clause.get(1)) {
            (Some(Value::String(column)), Some(Value::String(op))) => {
                let dtype = dtype_of(column)?;
                clauses.push((column, op, dtype, clause.get(2)));
            }
            _ => diagnostics.warn(&format!("Skipping malformed filter {:?}", clause)),
        }
    }

    let mut filters = Vec::with_capacity(clauses.len());
    for (column, op_name, dtype, term) in clauses {
        let Some(op) = FilterOp::from_name(op_name) else {
            diagnostics.warn(&format!("Skipping filter on '{}': unknown operator '{}'", column, op_name));
            continue;
        };
        if !op.applies_to(dtype) {
            diagnostics.warn(&format!(
                "Skipping filter on '{}': operator '{}' does not apply to {}",
                column, op_name, dtype
            ));
            continue;
        }
        match make_terms(dtype, op, term, date_parser, &mut interner.borrow_mut()) {
            Some(terms) => filters.push(Filter {
                column: column.clone(),
                op,
                terms,
            }),
            None => diagnostics.warn(&format!(
                "Skipping filter on '{}': invalid term {} for {}",
                column,
                term.map_or_else(|| "null".to_string(), Value::to_string),
                dtype
            )),
        }
    }

    log::debug!(
        "view config: {} row pivots, {} column pivots, {} filters kept of {}",
        row_pivots.len(),
        raw.column_pivots.len(),
        filters.len(),
        raw.filter.len()
    );

    Ok(ViewConfig {
        row_pivot_depth: raw.row_pivot_depth.unwrap_or(row_pivots.len()),
        column_pivot_depth: raw.column_pivot_depth.unwrap_or(raw.column_pivots.len()),
        row_pivots,
        column_pivots: raw.column_pivots.clone(),
        aggspecs,
        columns: raw.columns.clone(),
        filters,
        filter_op,
        sort,
        col_sort,
        column_only,
        interner: Rc::clone(interner),
    })
}

/// Typed terms for one clause, `None` when the term is invalid for the
/// column. Nothing is interned unless the whole clause is valid.
fn make_terms(
    dtype: StorageType,
    op: FilterOp,
    term: Option<&Value>,
    date_parser: &dyn DateParser,
    interner: &mut StringInterner,
) -> Option<Vec<FilterTerm>> {
    if op.is_null_check() {
        return Some(vec![FilterTerm::Int32(0)]);
    }

    let term = term.filter(|t| !t.is_null())?;
    let parse_date = |term: &Value| term.as_str().and_then(|s| date_parser.parse(s));
    if matches!(dtype, StorageType::Date | StorageType::Time) && parse_date(term).is_none() {
        return None;
    }

    if matches!(op, FilterOp::In | FilterOp::NotIn) {
        let items = term
            .as_array()?
            .iter()
            .map(|item| item.as_str())
            .collect::<Option<Vec<&str>>>()?;
        return Some(items.into_iter().map(|s| FilterTerm::String(interner.intern(s))).collect());
    }

    let single = match dtype {
        StorageType::Int32 => FilterTerm::Int32(term_i32(term)?),
        StorageType::Int8 | StorageType::Int16 | StorageType::Int64 | StorageType::Float32 | StorageType::Float64 => {
            FilterTerm::Float64(term_f64(term)?)
        }
        StorageType::Bool => FilterTerm::Bool(match term {
            Value::Bool(b) => *b,
            Value::String(s) => parse_bool(s)?,
            _ => return None,
        }),
        StorageType::Date => FilterTerm::Date(parse_date(term)?.date()),
        StorageType::Time => FilterTerm::Time(parse_date(term)?.to_millis()),
        StorageType::String | StorageType::None => {
            let text = match term {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            FilterTerm::String(interner.intern(&text))
        }
    };
    Some(vec![single])
}

fn term_f64(term: &Value) -> Option<f64> {
    match term {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn term_i32(term: &Value) -> Option<i32> {
    let f = term_f64(term)?;
    if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}
