//! Classified statements
//!
//! A submitted script is split into statements, each tagged with a semantic
//! category that decides which pipeline stage consumes it and which result
//! strategy interprets its output. Classification here is deliberately
//! keyword-shallow: the full parser lives in the compute engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic category of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    With,
    Insert,
    /// INSERT rewritten to a simulated sink for previewing mutations.
    MockedInsert,
    Show,
    Desc,
    Explain,
    Set,
    Reset,
    Use,
    Create,
    /// Function/extension registration, compiled before any execution.
    CreateFunction,
    Drop,
    Alter,
    Truncate,
    /// Registers a jar with the executor's artifact loader; consumed during
    /// pretreatment.
    AddJar,
    /// Registers a plain file dependency; consumed during pretreatment.
    AddFile,
    /// Full custom program handed to the executor's general execution path.
    Execute,
    Unknown,
}

impl StatementKind {
    /// Classifies a pretreated statement by its leading keywords.
    pub fn classify(statement: &str) -> Self {
        let lowered = statement.trim_start().to_lowercase();
        let starts = |prefix: &str| {
            lowered.starts_with(prefix)
                && lowered[prefix.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| c.is_whitespace() || c == '(')
        };

        if starts("select") {
            StatementKind::Select
        } else if starts("with") {
            StatementKind::With
        } else if starts("insert") {
            StatementKind::Insert
        } else if starts("show") {
            StatementKind::Show
        } else if starts("desc") || starts("describe") {
            StatementKind::Desc
        } else if starts("explain") {
            StatementKind::Explain
        } else if starts("set") {
            StatementKind::Set
        } else if starts("reset") {
            StatementKind::Reset
        } else if starts("use") {
            StatementKind::Use
        } else if lowered.starts_with("add jar") {
            StatementKind::AddJar
        } else if lowered.starts_with("add file") {
            StatementKind::AddFile
        } else if lowered.starts_with("create temporary function")
            || lowered.starts_with("create function")
        {
            StatementKind::CreateFunction
        } else if starts("create") {
            StatementKind::Create
        } else if starts("drop") {
            StatementKind::Drop
        } else if starts("alter") {
            StatementKind::Alter
        } else if starts("truncate") {
            StatementKind::Truncate
        } else if starts("execute") {
            StatementKind::Execute
        } else {
            StatementKind::Unknown
        }
    }

    /// Statements executed synchronously by the schema stage.
    pub fn is_schema(self) -> bool {
        matches!(
            self,
            StatementKind::Create
                | StatementKind::CreateFunction
                | StatementKind::Drop
                | StatementKind::Alter
                | StatementKind::Truncate
                | StatementKind::Set
                | StatementKind::Reset
                | StatementKind::Use
                | StatementKind::Unknown
        )
    }

    /// Statements handled by the transform stage.
    pub fn is_transform(self) -> bool {
        self.is_mutation() || self.is_query() || self.is_introspection()
    }

    /// Row-producing query statements.
    pub fn is_query(self) -> bool {
        matches!(self, StatementKind::Select | StatementKind::With)
    }

    /// Catalog introspection statements.
    pub fn is_introspection(self) -> bool {
        matches!(self, StatementKind::Show | StatementKind::Desc)
    }

    /// Statements that mutate data through a compiled plan.
    pub fn is_mutation(self) -> bool {
        matches!(self, StatementKind::Insert | StatementKind::MockedInsert)
    }

    /// Extension declarations registered before any execution.
    pub fn is_extension(self) -> bool {
        matches!(self, StatementKind::CreateFunction)
    }

    /// Custom program statements for the general execution path.
    pub fn is_program(self) -> bool {
        matches!(self, StatementKind::Execute)
    }

    /// Pretreatment directives with no downstream stage.
    pub fn is_directive(self) -> bool {
        matches!(self, StatementKind::AddJar | StatementKind::AddFile)
    }
}

/// One pretreated statement plus its classified category.
///
/// Stages stamp start/finish times on the units they touch, and record
/// per-statement errors without necessarily failing the whole script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementUnit {
    /// Position within the pretreated script, zero-based.
    pub index: usize,
    pub text: String,
    pub kind: StatementKind,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StatementUnit {
    pub fn new(index: usize, text: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            index,
            text: text.into(),
            kind,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn stamp_start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn stamp_finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_common_statements() {
        assert_eq!(
            StatementKind::classify("SELECT * FROM t"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::classify("  with x as (select 1) select * from x"),
            StatementKind::With
        );
        assert_eq!(
            StatementKind::classify("INSERT INTO t VALUES (1)"),
            StatementKind::Insert
        );
        assert_eq!(StatementKind::classify("SHOW TABLES"), StatementKind::Show);
        assert_eq!(StatementKind::classify("DESCRIBE t"), StatementKind::Desc);
        assert_eq!(
            StatementKind::classify("CREATE TABLE t (a INT)"),
            StatementKind::Create
        );
        assert_eq!(
            StatementKind::classify("CREATE TEMPORARY FUNCTION f AS 'pkg.F'"),
            StatementKind::CreateFunction
        );
        assert_eq!(
            StatementKind::classify("ADD JAR '/tmp/udf.jar'"),
            StatementKind::AddJar
        );
        assert_eq!(
            StatementKind::classify("EXECUTE PIPELINE my_stream"),
            StatementKind::Execute
        );
        assert_eq!(StatementKind::classify("VACUUM t"), StatementKind::Unknown);
    }

    #[test]
    fn test_classify_requires_keyword_boundary() {
        // "selection" is not SELECT
        assert_eq!(
            StatementKind::classify("selection_table_scan"),
            StatementKind::Unknown
        );
    }

    #[test]
    fn test_stage_groups() {
        assert!(StatementKind::Select.is_transform());
        assert!(StatementKind::Insert.is_mutation());
        assert!(StatementKind::Show.is_introspection());
        assert!(StatementKind::Create.is_schema());
        assert!(StatementKind::Execute.is_program());
        assert!(StatementKind::AddJar.is_directive());
        // Function declarations register first, then execute as schema DDL.
        assert!(StatementKind::CreateFunction.is_extension());
        assert!(StatementKind::CreateFunction.is_schema());
        // Transform and schema never overlap.
        assert!(!StatementKind::Select.is_schema());
        assert!(!StatementKind::Create.is_transform());
    }

    #[test]
    fn test_unit_stamps_and_error() {
        let mut unit = StatementUnit::new(0, "SELECT 1", StatementKind::Select);
        assert!(unit.started_at.is_none());
        unit.stamp_start();
        unit.stamp_finish();
        unit.mark_error("no such table");
        assert!(unit.started_at.is_some());
        assert!(unit.finished_at.is_some());
        assert_eq!(unit.error.as_deref(), Some("no such table"));
    }
}
