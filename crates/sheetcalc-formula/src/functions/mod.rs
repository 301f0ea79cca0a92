//! Built-in spreadsheet functions

pub mod args;
pub mod criteria;
pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;
pub mod workday;

use std::sync::{Arc, OnceLock};

use ahash::AHashMap;

use crate::context::ParsingContext;
use crate::error::FormulaResult;
use crate::value::{CompileResult, ExcelError, FunctionArgument};

/// A callable spreadsheet function
///
/// Implementations receive compiled arguments (references stay unresolved ranges) and read
/// cells only through the context's data provider.
pub trait ExcelFunction: Send + Sync {
    fn execute(
        &self,
        args: &[FunctionArgument],
        ctx: &ParsingContext<'_>,
    ) -> FormulaResult<CompileResult>;

    /// Volatile functions (TODAY, NOW) produce a new value on every evaluation
    fn is_volatile(&self) -> bool {
        false
    }
}

/// Function implementation signature
pub type FunctionImpl =
    fn(&[FunctionArgument], &ParsingContext<'_>) -> FormulaResult<CompileResult>;

/// A built-in function with its arity
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
}

impl FunctionDef {
    pub fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
        }
    }

    /// Mark the function volatile
    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }
}

impl ExcelFunction for FunctionDef {
    fn execute(
        &self,
        args: &[FunctionArgument],
        ctx: &ParsingContext<'_>,
    ) -> FormulaResult<CompileResult> {
        let too_many = self.max_args.map(|max| args.len() > max).unwrap_or(false);
        if args.len() < self.min_args || too_many {
            return Ok(CompileResult::error(ExcelError::Value));
        }
        (self.implementation)(args, ctx)
    }

    fn is_volatile(&self) -> bool {
        self.volatile
    }
}

/// Functions by lower-cased name
pub struct FunctionRepository {
    functions: AHashMap<String, Arc<dyn ExcelFunction>>,
}

impl Default for FunctionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRepository {
    /// Create a repository with all built-in functions
    pub fn new() -> Self {
        let mut repository = Self::empty();

        repository.register_math_functions();
        repository.register_statistical_functions();
        repository.register_logical_functions();
        repository.register_info_functions();
        repository.register_text_functions();
        repository.register_date_functions();
        repository.register_lookup_functions();

        repository
    }

    /// Create a repository without any functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// The shared built-in repository, created on first use
    pub fn global() -> &'static FunctionRepository {
        static REPOSITORY: OnceLock<FunctionRepository> = OnceLock::new();
        REPOSITORY.get_or_init(FunctionRepository::new)
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExcelFunction>> {
        self.functions.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    /// Register or replace a function under a name
    pub fn register(&mut self, name: &str, function: Arc<dyn ExcelFunction>) {
        self.functions.insert(name.to_lowercase(), function);
    }

    /// Register a built-in style definition
    pub fn register_def(&mut self, def: FunctionDef) {
        let name = def.name;
        self.register(name, Arc::new(def));
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) {
        self.register_def(FunctionDef::new("SUM", 1, None, math::fn_sum));
        self.register_def(FunctionDef::new("SUMSQ", 1, None, math::fn_sumsq));
        self.register_def(FunctionDef::new("AVERAGE", 1, None, math::fn_average));
        self.register_def(FunctionDef::new("MIN", 1, None, math::fn_min));
        self.register_def(FunctionDef::new("MAX", 1, None, math::fn_max));
        self.register_def(FunctionDef::new("COUNT", 1, None, math::fn_count));
        self.register_def(FunctionDef::new("COUNTA", 1, None, math::fn_counta));
        self.register_def(FunctionDef::new("COUNTBLANK", 1, Some(1), math::fn_countblank));
        self.register_def(FunctionDef::new("ABS", 1, Some(1), math::fn_abs));
        self.register_def(FunctionDef::new("ROUND", 2, Some(2), math::fn_round));
        self.register_def(FunctionDef::new("INT", 1, Some(1), math::fn_int));
        self.register_def(FunctionDef::new("MOD", 2, Some(2), math::fn_mod));
        self.register_def(FunctionDef::new("POWER", 2, Some(2), math::fn_power));
        self.register_def(FunctionDef::new("SQRT", 1, Some(1), math::fn_sqrt));
        self.register_def(FunctionDef::new("PI", 0, Some(0), math::fn_pi));
        self.register_def(FunctionDef::new("DEGREES", 1, Some(1), math::fn_degrees));
        self.register_def(FunctionDef::new("RADIANS", 1, Some(1), math::fn_radians));
        self.register_def(FunctionDef::new("FACT", 1, Some(1), math::fn_fact));
        self.register_def(FunctionDef::new("QUOTIENT", 2, Some(2), math::fn_quotient));
        self.register_def(FunctionDef::new("LARGE", 2, Some(2), math::fn_large));
        self.register_def(FunctionDef::new("SMALL", 2, Some(2), math::fn_small));
    }

    fn register_statistical_functions(&mut self) {
        self.register_def(FunctionDef::new("SUMIF", 2, Some(3), statistical::fn_sumif));
        self.register_def(FunctionDef::new("SUMIFS", 3, None, statistical::fn_sumifs));
        self.register_def(FunctionDef::new("COUNTIF", 2, Some(2), statistical::fn_countif));
        self.register_def(FunctionDef::new("COUNTIFS", 2, None, statistical::fn_countifs));
        self.register_def(FunctionDef::new("AVERAGEIF", 2, Some(3), statistical::fn_averageif));
        self.register_def(FunctionDef::new("AVERAGEIFS", 3, None, statistical::fn_averageifs));
    }

    fn register_logical_functions(&mut self) {
        self.register_def(FunctionDef::new("IF", 2, Some(3), logical::fn_if));
        self.register_def(FunctionDef::new("IFERROR", 2, Some(2), logical::fn_iferror));
        self.register_def(FunctionDef::new("IFNA", 2, Some(2), logical::fn_ifna));
        self.register_def(FunctionDef::new("AND", 1, None, logical::fn_and));
        self.register_def(FunctionDef::new("OR", 1, None, logical::fn_or));
        self.register_def(FunctionDef::new("NOT", 1, Some(1), logical::fn_not));
        self.register_def(FunctionDef::new("TRUE", 0, Some(0), logical::fn_true));
        self.register_def(FunctionDef::new("FALSE", 0, Some(0), logical::fn_false));
    }

    fn register_info_functions(&mut self) {
        self.register_def(FunctionDef::new("ISERROR", 1, Some(1), info::fn_iserror));
        self.register_def(FunctionDef::new("ISERR", 1, Some(1), info::fn_iserr));
        self.register_def(FunctionDef::new("ISNA", 1, Some(1), info::fn_isna));
        self.register_def(FunctionDef::new("ISBLANK", 1, Some(1), info::fn_isblank));
        self.register_def(FunctionDef::new("ISNUMBER", 1, Some(1), info::fn_isnumber));
        self.register_def(FunctionDef::new("ISTEXT", 1, Some(1), info::fn_istext));
        self.register_def(FunctionDef::new("ISLOGICAL", 1, Some(1), info::fn_islogical));
        self.register_def(FunctionDef::new("NA", 0, Some(0), info::fn_na));
    }

    fn register_text_functions(&mut self) {
        self.register_def(FunctionDef::new("LEN", 1, Some(1), text::fn_len));
        self.register_def(FunctionDef::new("LEFT", 1, Some(2), text::fn_left));
        self.register_def(FunctionDef::new("RIGHT", 1, Some(2), text::fn_right));
        self.register_def(FunctionDef::new("MID", 3, Some(3), text::fn_mid));
        self.register_def(FunctionDef::new("UPPER", 1, Some(1), text::fn_upper));
        self.register_def(FunctionDef::new("LOWER", 1, Some(1), text::fn_lower));
        self.register_def(FunctionDef::new("TRIM", 1, Some(1), text::fn_trim));
        self.register_def(FunctionDef::new("CONCATENATE", 1, None, text::fn_concatenate));
        self.register_def(FunctionDef::new("TEXT", 2, Some(2), text::fn_text));
        self.register_def(FunctionDef::new("VALUE", 1, Some(1), text::fn_value));
        self.register_def(FunctionDef::new("EXACT", 2, Some(2), text::fn_exact));
        self.register_def(FunctionDef::new("REPT", 2, Some(2), text::fn_rept));
        self.register_def(FunctionDef::new("FIXED", 1, Some(3), text::fn_fixed));
    }

    fn register_date_functions(&mut self) {
        self.register_def(FunctionDef::new("DATE", 3, Some(3), date::fn_date));
        self.register_def(FunctionDef::new("YEAR", 1, Some(1), date::fn_year));
        self.register_def(FunctionDef::new("MONTH", 1, Some(1), date::fn_month));
        self.register_def(FunctionDef::new("DAY", 1, Some(1), date::fn_day));
        self.register_def(FunctionDef::new("WEEKDAY", 1, Some(2), date::fn_weekday));
        self.register_def(FunctionDef::new("TODAY", 0, Some(0), date::fn_today).volatile());
        self.register_def(FunctionDef::new("NOW", 0, Some(0), date::fn_now).volatile());
        self.register_def(FunctionDef::new("DAYS", 2, Some(2), date::fn_days));
        self.register_def(FunctionDef::new("HOUR", 1, Some(1), date::fn_hour));
        self.register_def(FunctionDef::new("MINUTE", 1, Some(1), date::fn_minute));
        self.register_def(FunctionDef::new("SECOND", 1, Some(1), date::fn_second));
        self.register_def(FunctionDef::new("DAYS360", 2, Some(3), date::fn_days360));
        self.register_def(FunctionDef::new("YEARFRAC", 2, Some(3), date::fn_yearfrac));
        self.register_def(FunctionDef::new("EDATE", 2, Some(2), date::fn_edate));
        self.register_def(FunctionDef::new("EOMONTH", 2, Some(2), date::fn_eomonth));
        self.register_def(FunctionDef::new("TIME", 1, Some(3), date::fn_time));
        self.register_def(FunctionDef::new("DATEVALUE", 1, Some(1), date::fn_datevalue));
        self.register_def(FunctionDef::new("WORKDAY", 2, Some(3), date::fn_workday));
        self.register_def(FunctionDef::new("NETWORKDAYS", 2, Some(3), date::fn_networkdays));
    }

    fn register_lookup_functions(&mut self) {
        self.register_def(FunctionDef::new("ADDRESS", 2, Some(5), lookup::fn_address));
        self.register_def(FunctionDef::new("OFFSET", 3, Some(5), lookup::fn_offset));
        self.register_def(FunctionDef::new("ROW", 0, Some(1), lookup::fn_row));
        self.register_def(FunctionDef::new("COLUMN", 0, Some(1), lookup::fn_column));
        self.register_def(FunctionDef::new("ROWS", 1, Some(1), lookup::fn_rows));
        self.register_def(FunctionDef::new("COLUMNS", 1, Some(1), lookup::fn_columns));
        self.register_def(FunctionDef::new("INDEX", 2, Some(3), lookup::fn_index));
        self.register_def(FunctionDef::new("MATCH", 2, Some(3), lookup::fn_match));
        self.register_def(FunctionDef::new("CHOOSE", 2, None, lookup::fn_choose));
        self.register_def(FunctionDef::new("INDIRECT", 1, Some(2), lookup::fn_indirect));
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingConfiguration;
    use crate::context::ParsingScope;
    use crate::value::Value;

    struct Double;

    impl ExcelFunction for Double {
        fn execute(
            &self,
            args: &[FunctionArgument],
            ctx: &ParsingContext<'_>,
        ) -> FormulaResult<CompileResult> {
            Ok(CompileResult::number(args::arg_to_decimal(&args[0], ctx)? * 2.0))
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let repository = FunctionRepository::global();
        assert!(repository.contains("sum"));
        assert!(repository.contains("YearFrac"));
        assert!(repository.get("nosuch").is_none());
        assert!(repository.get("TODAY").unwrap().is_volatile());
        assert!(!repository.get("SUM").unwrap().is_volatile());
        assert!(repository.names().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_custom_registration_and_arity() {
        let mut repository = FunctionRepository::empty();
        assert!(repository.is_empty());
        repository.register("double", Arc::new(Double));
        repository.register_def(FunctionDef::new("ONE", 1, Some(1), |args, ctx| {
            Ok(CompileResult::number(args::arg_to_decimal(&args[0], ctx)?))
        }));
        assert_eq!(repository.len(), 2);

        let config = ParsingConfiguration::default();
        let scope = ParsingScope::new("Sheet1", 0, 0);
        let ctx = ParsingContext::new(None, &repository, &config, scope);
        let two = [FunctionArgument::new(2.0)];
        assert_eq!(
            repository.get("DOUBLE").unwrap().execute(&two, &ctx).unwrap(),
            CompileResult::number(4.0)
        );
        let none: [FunctionArgument; 0] = [];
        assert_eq!(
            repository.get("one").unwrap().execute(&none, &ctx).unwrap(),
            CompileResult::error(ExcelError::Value)
        );
        assert_eq!(
            repository.get("one").unwrap().execute(&two, &ctx).unwrap().value,
            Value::Number(2.0)
        );
    }
}
