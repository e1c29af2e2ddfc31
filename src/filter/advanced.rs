//! Advanced filter conditions: explicit (field, operator, value) triples
//! built by the filter modal and sent as a JSON list. Conditions are
//! AND-combined in order; operator/field compatibility is checked against
//! the field registry before any SQL is emitted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::search::escape_like;
use super::{field_spec, push_array_contains, FieldType, FilterError, QueryPredicates, SqlParam};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Like,
    Ilike,
    Is,
    Not,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
            Operator::Is => "is",
            Operator::Not => "not",
        }
    }

    /// Operators that make sense for a given field type. `gt` on a
    /// boolean (and friends) is rejected here rather than producing a
    /// meaningless query.
    pub fn valid_for(self, ty: FieldType) -> bool {
        use Operator::*;
        match ty {
            FieldType::Number => !matches!(self, Like | Ilike),
            FieldType::Text => !matches!(self, Gt | Gte | Lt | Lte),
            FieldType::Select | FieldType::ArraySelect => {
                matches!(self, Eq | Neq | In | Nin | Is | Not)
            }
            FieldType::Boolean => matches!(self, Eq | Neq | Is | Not),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

fn bad_value(field: &str, reason: impl Into<String>) -> FilterError {
    FilterError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Convert a JSON scalar into a bind parameter appropriate for the field.
fn scalar_param(field: &str, ty: FieldType, v: &Value) -> Result<SqlParam, FilterError> {
    match ty {
        FieldType::Number => {
            if let Some(n) = v.as_i64() {
                Ok(Box::new(n))
            } else if let Some(n) = v.as_f64() {
                Ok(Box::new(n))
            } else if let Some(s) = v.as_str() {
                if let Ok(n) = s.trim().parse::<i64>() {
                    Ok(Box::new(n))
                } else if let Ok(n) = s.trim().parse::<f64>() {
                    Ok(Box::new(n))
                } else {
                    Err(bad_value(field, format!("expected a number, got '{s}'")))
                }
            } else {
                Err(bad_value(field, "expected a number"))
            }
        }
        FieldType::Boolean => match v {
            Value::Bool(b) => Ok(Box::new(*b as i64)),
            Value::String(s) if s == "true" => Ok(Box::new(1i64)),
            Value::String(s) if s == "false" => Ok(Box::new(0i64)),
            _ => Err(bad_value(field, "expected true or false")),
        },
        FieldType::Text | FieldType::Select | FieldType::ArraySelect => match v {
            Value::String(s) => Ok(Box::new(s.clone())),
            Value::Number(n) => Ok(Box::new(n.to_string())),
            _ => Err(bad_value(field, "expected a string")),
        },
    }
}

/// A value list for in/nin: a JSON array, or a comma-separated string.
fn value_list(field: &str, v: &Value) -> Result<Vec<Value>, FilterError> {
    let items: Vec<Value> = match v {
        Value::Array(items) => items.clone(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
        other => vec![other.clone()],
    };
    if items.is_empty() {
        return Err(bad_value(field, "expected a non-empty value list"));
    }
    Ok(items)
}

fn string_list(field: &str, v: &Value) -> Result<Vec<String>, FilterError> {
    value_list(field, v)?
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(bad_value(field, "expected string values")),
        })
        .collect()
}

/// Compile one condition into WHERE fragments.
pub fn compile_condition(
    cond: &FilterCondition,
    out: &mut QueryPredicates,
) -> Result<(), FilterError> {
    let spec = field_spec(&cond.field)
        .ok_or_else(|| FilterError::UnknownField(cond.field.clone()))?;
    if !cond.operator.valid_for(spec.ty) {
        return Err(FilterError::IncompatibleOperator {
            field: cond.field.clone(),
            operator: cond.operator.as_str().to_string(),
            ty: spec.ty.name(),
        });
    }

    let col = spec.expr;
    match cond.operator {
        Operator::Eq if spec.ty == FieldType::ArraySelect => {
            let values = string_list(&cond.field, &cond.value)?;
            push_array_contains(out, col, &values[..1]);
        }
        Operator::Neq if spec.ty == FieldType::ArraySelect => {
            let values = string_list(&cond.field, &cond.value)?;
            out.push_with(
                format!(
                    "NOT EXISTS (SELECT 1 FROM json_each({col}) WHERE json_each.value = ?)"
                ),
                [Box::new(values[0].clone()) as SqlParam],
            );
        }
        Operator::In if spec.ty == FieldType::ArraySelect => {
            let values = string_list(&cond.field, &cond.value)?;
            push_array_contains(out, col, &values);
        }
        Operator::Nin if spec.ty == FieldType::ArraySelect => {
            let values = string_list(&cond.field, &cond.value)?;
            let mut inner = QueryPredicates::default();
            push_array_contains(&mut inner, col, &values);
            let clause = inner.clauses.pop().unwrap_or_else(|| "0".to_string());
            out.push_with(format!("NOT {clause}"), inner.params);
        }
        // A question with no QA record counts as pending/unflagged,
        // same as the legacy filter path.
        Operator::Eq if cond.field == "qa_status" && cond.value.as_str() == Some("pending") => {
            out.push("(qa_status = 'pending' OR qa_status IS NULL)");
        }
        Operator::Eq if cond.field == "is_flagged" => {
            let flagged = match &cond.value {
                Value::Bool(b) => *b,
                Value::String(s) if s == "true" => true,
                Value::String(s) if s == "false" => false,
                _ => return Err(bad_value("is_flagged", "expected true or false")),
            };
            if flagged {
                out.push("is_flagged = 1");
            } else {
                out.push("(is_flagged = 0 OR is_flagged IS NULL)");
            }
        }
        Operator::Eq => {
            let p = scalar_param(&cond.field, spec.ty, &cond.value)?;
            out.push_with(format!("{col} = ?"), [p]);
        }
        Operator::Neq => {
            let p = scalar_param(&cond.field, spec.ty, &cond.value)?;
            out.push_with(format!("{col} <> ?"), [p]);
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let op = match cond.operator {
                Operator::Gt => ">",
                Operator::Gte => ">=",
                Operator::Lt => "<",
                _ => "<=",
            };
            let p = scalar_param(&cond.field, spec.ty, &cond.value)?;
            out.push_with(format!("{col} {op} ?"), [p]);
        }
        Operator::In | Operator::Nin => {
            let values = value_list(&cond.field, &cond.value)?;
            let params: Vec<SqlParam> = values
                .iter()
                .map(|v| scalar_param(&cond.field, spec.ty, v))
                .collect::<Result<_, _>>()?;
            let placeholders = vec!["?"; params.len()].join(", ");
            let not = if cond.operator == Operator::Nin { "NOT " } else { "" };
            out.push_with(format!("{col} {not}IN ({placeholders})"), params);
        }
        // SQLite LIKE is already case-insensitive for ASCII, so both
        // substring operators share a codepath.
        Operator::Like | Operator::Ilike => {
            let s = cond
                .value
                .as_str()
                .ok_or_else(|| bad_value(&cond.field, "expected a string pattern"))?;
            out.push_with(
                format!("{col} LIKE ? ESCAPE '\\'"),
                [Box::new(format!("%{}%", escape_like(s))) as SqlParam],
            );
        }
        Operator::Is => out.push(format!("{col} IS NULL")),
        Operator::Not => out.push(format!("{col} IS NOT NULL")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(field: &str, operator: Operator, value: Value) -> Result<QueryPredicates, FilterError> {
        let mut out = QueryPredicates::default();
        compile_condition(
            &FilterCondition {
                field: field.into(),
                operator,
                value,
            },
            &mut out,
        )?;
        Ok(out)
    }

    #[test]
    fn range_operator_on_number_field() {
        let p = compile("difficulty", Operator::Gte, json!(4)).unwrap();
        assert_eq!(p.clauses, vec!["difficulty >= ?"]);
    }

    #[test]
    fn range_operator_on_boolean_field_is_rejected() {
        let err = compile("is_pyq", Operator::Gt, json!(1)).unwrap_err();
        assert!(matches!(err, FilterError::IncompatibleOperator { .. }));
    }

    #[test]
    fn like_on_number_field_is_rejected() {
        let err = compile("difficulty", Operator::Like, json!("5")).unwrap_err();
        assert!(matches!(err, FilterError::IncompatibleOperator { .. }));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = compile("no_such_field", Operator::Eq, json!("x")).unwrap_err();
        assert!(matches!(err, FilterError::UnknownField(_)));
    }

    #[test]
    fn in_splits_comma_separated_input() {
        let p = compile("grade", Operator::In, json!("11, 12")).unwrap();
        assert_eq!(p.clauses, vec!["grade IN (?, ?)"]);
        assert_eq!(p.params.len(), 2);
    }

    #[test]
    fn eq_on_array_field_means_containment() {
        let p = compile("boards", Operator::Eq, json!("IBDP")).unwrap();
        assert!(p.clauses[0].starts_with("EXISTS (SELECT 1 FROM json_each(boards)"));
    }

    #[test]
    fn in_on_array_field_ors_containment_checks() {
        let p = compile("boards", Operator::In, json!(["IBDP", "CBSE"])).unwrap();
        assert!(p.clauses[0].contains(" OR "));
        assert_eq!(p.params.len(), 2);
    }

    #[test]
    fn null_checks_take_no_params() {
        let p = compile("topic", Operator::Is, Value::Null).unwrap();
        assert_eq!(p.clauses, vec!["topic IS NULL"]);
        assert!(p.params.is_empty());
        let p = compile("topic", Operator::Not, Value::Null).unwrap();
        assert_eq!(p.clauses, vec!["topic IS NOT NULL"]);
    }

    #[test]
    fn like_pattern_is_escaped() {
        let p = compile("topic", Operator::Ilike, json!("100%")).unwrap();
        assert_eq!(p.clauses, vec!["topic LIKE ? ESCAPE '\\'"]);
    }

    #[test]
    fn pending_status_includes_rows_without_a_qa_record() {
        let p = compile("qa_status", Operator::Eq, json!("pending")).unwrap();
        assert_eq!(p.clauses, vec!["(qa_status = 'pending' OR qa_status IS NULL)"]);
        assert!(p.params.is_empty());

        // Any other status is a plain equality
        let p = compile("qa_status", Operator::Eq, json!("approved")).unwrap();
        assert_eq!(p.clauses, vec!["qa_status = ?"]);
    }

    #[test]
    fn unflagged_includes_rows_without_a_qa_record() {
        let p = compile("is_flagged", Operator::Eq, json!(false)).unwrap();
        assert_eq!(p.clauses, vec!["(is_flagged = 0 OR is_flagged IS NULL)"]);

        let p = compile("is_flagged", Operator::Eq, json!(true)).unwrap();
        assert_eq!(p.clauses, vec!["is_flagged = 1"]);
    }

    #[test]
    fn year_comparisons_cast_the_text_column() {
        let p = compile("pyq_year", Operator::Gte, json!(2020)).unwrap();
        assert_eq!(p.clauses, vec!["CAST(pyq_year AS INTEGER) >= ?"]);
    }
}
