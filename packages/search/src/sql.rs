//! SQL rendering of [`FacilityFilter`].
//!
//! The clause is written against the RMP tables and expects the facility
//! row being tested to be visible as `latest` (one row per
//! `epa_facility_id`, the latest submission). Placeholders are `$n`, which
//! both Postgres and `SQLite` accept.

use crate::filter::{FacilityFilter, ProcessFilter, TextMatch};

/// A positional SQL parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

/// A rendered `WHERE` body and its parameters, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlClause {
    /// Conjunction of conditions, `1=1` when the filter is empty.
    pub sql: String,
    pub params: Vec<SqlParam>,
}

struct Builder {
    conditions: Vec<String>,
    params: Vec<SqlParam>,
    offset: usize,
}

impl Builder {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.offset + self.params.len())
    }

    fn text(&mut self, column: &str, m: &TextMatch) {
        let condition = match m {
            TextMatch::Contains(needle) => {
                let p = self.bind(SqlParam::Text(format!("%{}%", escape_like(needle))));
                format!("LOWER({column}) LIKE {p} ESCAPE '\\'")
            }
            TextMatch::Exact(needle) => {
                let p = self.bind(SqlParam::Text(needle.clone()));
                format!("LOWER(TRIM({column})) = {p}")
            }
        };
        self.conditions.push(condition);
    }

    fn eq_trimmed(&mut self, column: &str, value: Option<&String>) {
        if let Some(value) = value {
            let p = self.bind(SqlParam::Text(value.clone()));
            self.conditions.push(format!("TRIM({column}) = {p}"));
        }
    }

    fn process(&mut self, filter: &ProcessFilter) {
        if filter.is_empty() {
            return;
        }

        let mut sql = String::from(
            "EXISTS (SELECT 1 FROM tbl_s1_facilities ps \
             JOIN tbl_s1_processes p ON p.facility_id = ps.facility_id \
             WHERE ps.epa_facility_id = latest.epa_facility_id",
        );

        if let Some(level) = filter.program_level {
            let p = self.bind(SqlParam::Int(level));
            sql.push_str(&format!(" AND p.program_level = {p}"));
        }
        if !filter.naics_codes.is_empty() {
            let list = self.bind_list(filter.naics_codes.iter().cloned().map(SqlParam::Text));
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM tbl_s1_process_naics pn \
                 WHERE pn.process_id = p.process_id AND TRIM(pn.naics_code) IN ({list}))"
            ));
        }
        if !filter.chemicals.is_empty() {
            let list = self.bind_list(filter.chemicals.iter().copied().map(SqlParam::Int));
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM tbl_s1_process_chemicals pc \
                 WHERE pc.process_id = p.process_id AND pc.chemical_id IN ({list}))"
            ));
        }

        sql.push(')');
        self.conditions.push(sql);
    }

    fn bind_list(&mut self, values: impl Iterator<Item = SqlParam>) -> String {
        values.map(|v| self.bind(v)).collect::<Vec<_>>().join(", ")
    }
}

/// SQL expression yielding the `YYYY-MM-DD` key of a date column, or
/// `NULL` when the text does not have that shape.
///
/// Mirrors [`rmp_facility_models::date_key`] with functions Postgres and
/// `SQLite` share: digits are checked by stripping them and expecting only
/// the two dashes to remain.
#[must_use]
pub fn date_key_sql(column: &str) -> String {
    let head = format!("SUBSTR(TRIM(COALESCE({column}, '')), 1, 10)");
    let digits_stripped =
        (0..=9).fold(head.clone(), |acc, d| format!("REPLACE({acc}, '{d}', '')"));
    format!(
        "CASE WHEN LENGTH({head}) = 10 \
         AND SUBSTR({head}, 5, 1) = '-' AND SUBSTR({head}, 8, 1) = '-' \
         AND {digits_stripped} = '--' \
         AND SUBSTR({head}, 6, 2) BETWEEN '01' AND '12' \
         AND SUBSTR({head}, 9, 2) BETWEEN '01' AND '31' \
         THEN {head} END"
    )
}

/// Escapes `LIKE` metacharacters so user input matches literally under
/// `ESCAPE '\'`.
#[must_use]
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl FacilityFilter {
    /// Renders the filter as a SQL condition whose first placeholder is
    /// `$offset + 1`.
    #[must_use]
    pub fn to_sql(&self, offset: usize) -> SqlClause {
        let mut b = Builder {
            conditions: Vec::new(),
            params: Vec::new(),
            offset,
        };

        if let Some(m) = &self.facility_name {
            b.text("latest.facility_name", m);
        }
        b.eq_trimmed("latest.epa_facility_id", self.facility_id.as_ref());
        if let Some(m) = &self.parent_company {
            b.text("latest.parent_company_name", m);
        }
        b.eq_trimmed("latest.facility_duns", self.facility_duns.as_ref());
        if let Some(m) = &self.address {
            b.text("latest.facility_str_1", m);
        }
        if let Some(city) = &self.city {
            let p = b.bind(SqlParam::Text(city.clone()));
            b.conditions
                .push(format!("LOWER(TRIM(latest.facility_city)) = {p}"));
        }
        if let Some(state) = &self.state {
            let p = b.bind(SqlParam::Text(state.clone()));
            b.conditions
                .push(format!("UPPER(TRIM(latest.facility_state)) = {p}"));
        }
        b.eq_trimmed("latest.facility_county_fips", self.county.as_ref());
        b.eq_trimmed("latest.facility_zip_code", self.zip.as_ref());
        if self.active_only {
            b.conditions.push(format!(
                "{} IS NOT NULL AND TRIM(COALESCE(latest.deregistration_date, '')) = ''",
                date_key_sql("latest.safety_inspection_date")
            ));
        }
        b.process(&self.process);

        let sql = if b.conditions.is_empty() {
            "1=1".to_string()
        } else {
            b.conditions
                .iter()
                .map(|c| format!("({c})"))
                .collect::<Vec<_>>()
                .join(" AND ")
        };

        SqlClause {
            sql,
            params: b.params,
        }
    }
}
