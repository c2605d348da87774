//! Typed user records and the row parser that produces them.
//!
//! CSV columns, by position:
//!
//! | 0  | 1          | 2         | 3     | 4   | 5      | 6          | 7       | 8      | 9           | 10        |
//! |----|------------|-----------|-------|-----|--------|------------|---------|--------|-------------|-----------|
//! | id | first_name | last_name | email | age | gender | department | company | salary | date_joined | is_active |
//!
//! The `id` column is ignored; storage assigns identity on insert.

use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::errors::RowRejection;

/// Columns a row must have. Anything after these is ignored.
pub const FIELD_COUNT: usize = 11;

const FIRST_NAME: usize = 1;
const LAST_NAME: usize = 2;
const EMAIL: usize = 3;
const AGE: usize = 4;
const GENDER: usize = 5;
const DEPARTMENT: usize = 6;
const COMPANY: usize = 7;
const SALARY: usize = 8;
const DATE_JOINED: usize = 9;
const IS_ACTIVE: usize = 10;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A validated row, ready to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub gender: String,
    pub department: String,
    pub company: String,
    pub salary: f64,
    pub date_joined: NaiveDate,
    pub is_active: bool,
}

/// A record as read back from storage, with its assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
    pub gender: String,
    pub department: String,
    pub company: String,
    pub salary: f64,
    pub date_joined: NaiveDate,
    pub is_active: bool,
}

impl StoredUser {
    pub fn from_record(id: i64, record: UserRecord) -> Self {
        Self {
            id,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            age: record.age,
            gender: record.gender,
            department: record.department,
            company: record.company,
            salary: record.salary,
            date_joined: record.date_joined,
            is_active: record.is_active,
        }
    }
}

/// Turns one raw CSV row into a [`UserRecord`].
///
/// Numeric columns must parse exactly (base 10, no locale); a bad value rejects
/// the whole row instead of defaulting. `is_active` is lenient: only the exact
/// token `true` is true, anything else is false.
pub fn parse_row(row: &StringRecord) -> Result<UserRecord, RowRejection> {
    if row.len() < FIELD_COUNT {
        return Err(RowRejection::MissingFields {
            expected: FIELD_COUNT,
            found: row.len(),
        });
    }

    let first_name = required_text(row, FIRST_NAME, "first_name")?;
    let last_name = required_text(row, LAST_NAME, "last_name")?;
    let email = required_text(row, EMAIL, "email")?;

    let raw_age = &row[AGE];
    let age = raw_age
        .parse::<i32>()
        .map_err(|_| RowRejection::InvalidInteger {
            field: "age",
            value: raw_age.to_string(),
        })?;

    let raw_salary = &row[SALARY];
    let salary = raw_salary
        .parse::<f64>()
        .map_err(|_| RowRejection::InvalidFloat {
            field: "salary",
            value: raw_salary.to_string(),
        })?;

    let raw_date = &row[DATE_JOINED];
    let date_joined =
        NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| RowRejection::InvalidDate {
            field: "date_joined",
            value: raw_date.to_string(),
        })?;

    Ok(UserRecord {
        first_name,
        last_name,
        email,
        age,
        gender: row[GENDER].to_string(),
        department: row[DEPARTMENT].to_string(),
        company: row[COMPANY].to_string(),
        salary,
        date_joined,
        is_active: parse_flag(&row[IS_ACTIVE]),
    })
}

fn required_text(
    row: &StringRecord,
    index: usize,
    field: &'static str,
) -> Result<String, RowRejection> {
    let value = &row[index];
    if value.is_empty() {
        return Err(RowRejection::EmptyField { field });
    }
    Ok(value.to_string())
}

fn parse_flag(raw: &str) -> bool {
    raw == "true"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    fn valid_fields() -> Vec<&'static str> {
        vec![
            "1",
            "John",
            "Doe",
            "john@example.com",
            "30",
            "Male",
            "IT",
            "ExampleCorp",
            "50000",
            "2020-01-01",
            "true",
        ]
    }

    #[test]
    fn test_parse_valid_row() {
        let record = parse_row(&row(&valid_fields())).unwrap();

        assert_eq!(record.first_name, "John");
        assert_eq!(record.email, "john@example.com");
        assert_eq!(record.age, 30);
        assert_eq!(record.salary, 50000.0);
        assert_eq!(record.date_joined, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert!(record.is_active);
    }

    #[test]
    fn test_non_numeric_age_is_rejected() {
        let mut fields = valid_fields();
        fields[AGE] = "thirty";

        let rejection = parse_row(&row(&fields)).unwrap_err();
        assert_eq!(
            rejection,
            RowRejection::InvalidInteger {
                field: "age",
                value: "thirty".to_string()
            }
        );
    }

    #[test]
    fn test_fractional_and_padded_age_is_rejected() {
        for raw in ["30.5", " 30", ""] {
            let mut fields = valid_fields();
            fields[AGE] = raw;
            assert!(parse_row(&row(&fields)).is_err(), "age {raw:?} should be rejected");
        }
    }

    #[test]
    fn test_non_numeric_salary_is_rejected() {
        let mut fields = valid_fields();
        fields[SALARY] = "lots";

        assert!(matches!(
            parse_row(&row(&fields)),
            Err(RowRejection::InvalidFloat { field: "salary", .. })
        ));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let mut fields = valid_fields();
        fields[DATE_JOINED] = "01/02/2020";

        assert!(matches!(
            parse_row(&row(&fields)),
            Err(RowRejection::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_only_exact_true_is_true() {
        for (raw, expected) in [
            ("true", true),
            ("True", false),
            ("TRUE", false),
            ("1", false),
            ("yes", false),
            ("", false),
        ] {
            let mut fields = valid_fields();
            fields[IS_ACTIVE] = raw;
            let record = parse_row(&row(&fields)).unwrap();
            assert_eq!(record.is_active, expected, "raw value {raw:?}");
        }
    }

    #[test]
    fn test_short_row_is_rejected() {
        let fields = &valid_fields()[..10];

        assert_eq!(
            parse_row(&row(fields)).unwrap_err(),
            RowRejection::MissingFields {
                expected: FIELD_COUNT,
                found: 10
            }
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let mut fields = valid_fields();
        fields.push("unexpected");
        fields.push("columns");

        let record = parse_row(&row(&fields)).unwrap();
        assert_eq!(record.last_name, "Doe");
    }

    #[test]
    fn test_empty_email_is_rejected() {
        let mut fields = valid_fields();
        fields[EMAIL] = "";

        assert_eq!(
            parse_row(&row(&fields)).unwrap_err(),
            RowRejection::EmptyField { field: "email" }
        );
    }
}
