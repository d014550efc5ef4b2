// Compiles admin filters into the document store's boolean search dialect.
// Clauses are kept as a small tree and escaped in one place while rendering,
// since the dialect has no parameter binding.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::domain::entities::{QueryFilter, SearchRequest};
use crate::domain::normalizer::{FieldNormalizer, LogicalField};

pub const DEFAULT_LIMIT: u32 = 30;
pub const MAX_LIMIT: u32 = 100;
// Civil dates are entered in Taipei time.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

pub const ID_FIELD: &str = "public_id";
pub const CREATED_FIELD: &str = "created_at";
const SEARCH_BAGS: &[&str] = &["context", "metadata"];
const SEARCH_FIELDS: &[LogicalField] = &[
    LogicalField::Name,
    LogicalField::Phone,
    LogicalField::Service,
];
const RESERVED: &[char] = &[
    '!', '(', ')', '{', '}', '[', ']', '*', '^', '~', '?', ':', '=', '\\', '&', '>', '<', '"',
    '|', '/', '+', ',',
];
const OPERATOR_WORDS: &[&str] = &["AND", "OR", "NOT"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeOp {
    AtLeast,
    AtMost,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Clause {
    Prefix {
        field: String,
        prefix: String,
    },
    Range {
        field: String,
        op: RangeOp,
        instant: DateTime<Utc>,
    },
    AnyContains {
        fields: Vec<String>,
        term: String,
    },
}

impl Clause {
    fn render(&self) -> String {
        match self {
            Clause::Prefix { field, prefix } => format!("{field}:{prefix}*"),
            Clause::Range { field, op, instant } => {
                let op = match op {
                    RangeOp::AtLeast => ">=",
                    RangeOp::AtMost => "<=",
                };
                format!(
                    "{field}{op}{}",
                    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
                )
            }
            Clause::AnyContains { fields, term } => {
                let term = escape_term(term);
                let parts = fields
                    .iter()
                    .map(|field| format!("{field}~{term}"))
                    .collect::<Vec<_>>();
                format!("({})", parts.join(" OR "))
            }
        }
    }
}

// Conjunction of clauses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Expression {
    pub clauses: Vec<Clause>,
}

impl Expression {
    pub fn render(&self) -> String {
        self.clauses
            .iter()
            .map(Clause::render)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

#[derive(Clone)]
pub struct QueryCompiler {
    prefix: String,
    offset: FixedOffset,
    normalizer: FieldNormalizer,
}

impl QueryCompiler {
    pub fn new(
        prefix: impl Into<String>,
        offset: FixedOffset,
        normalizer: FieldNormalizer,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            offset,
            normalizer,
        }
    }

    pub fn normalizer(&self) -> FieldNormalizer {
        self.normalizer
    }

    pub fn build(&self, filter: &QueryFilter) -> Expression {
        let mut clauses = vec![Clause::Prefix {
            field: ID_FIELD.to_string(),
            prefix: self.prefix.clone(),
        }];

        // Unparseable bounds are dropped rather than guessed.
        let bounds = [
            (&filter.date_from, Boundary::Start, RangeOp::AtLeast),
            (&filter.date_to, Boundary::End, RangeOp::AtMost),
        ];
        for (value, boundary, op) in bounds {
            let instant = value
                .as_deref()
                .and_then(|value| parse_civil_datetime(value, boundary, self.offset));
            if let Some(instant) = instant {
                clauses.push(Clause::Range {
                    field: CREATED_FIELD.to_string(),
                    op,
                    instant,
                });
            }
        }

        if let Some(term) = filter.keyword.as_deref().map(str::trim) {
            if !term.is_empty() {
                clauses.push(Clause::AnyContains {
                    fields: self.keyword_fields(),
                    term: term.to_string(),
                });
            }
        }

        Expression { clauses }
    }

    pub fn compile(&self, filter: &QueryFilter) -> String {
        self.build(filter).render()
    }

    pub fn search_request(&self, filter: &QueryFilter) -> SearchRequest {
        SearchRequest {
            expression: self.compile(filter),
            max_results: clamp_limit(filter.limit),
            next_cursor: filter
                .cursor
                .clone()
                .filter(|cursor| !cursor.trim().is_empty()),
        }
    }

    // The id itself plus every name/phone/service alias in both bags.
    fn keyword_fields(&self) -> Vec<String> {
        let mut fields = vec![ID_FIELD.to_string()];
        for bag in SEARCH_BAGS {
            for field in SEARCH_FIELDS {
                fields.extend(
                    self.normalizer
                        .aliases(*field)
                        .iter()
                        .map(|alias| format!("{bag}.{alias}")),
                );
            }
        }
        fields
    }
}

pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// Reserved characters or whitespace force a quoted literal.
pub fn escape_term(term: &str) -> String {
    let term = term.trim();
    let escaped = term.replace('\\', "\\\\").replace('"', "\\\"");
    let needs_quotes = term
        .chars()
        .any(|c| c.is_whitespace() || RESERVED.contains(&c))
        || OPERATOR_WORDS
            .iter()
            .any(|word| term.eq_ignore_ascii_case(word));

    if needs_quotes {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

// Accepts `YYYY-MM-DD` or `YYYY/MM/DD`, optionally followed by `HH[:MM[:SS[.mmm]]]`.
// Missing times default to the start or the inclusive end of the day.
pub fn parse_civil_datetime(
    input: &str,
    boundary: Boundary,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let normalized = input.trim().replace('/', "-");
    let (date_part, time_part) = match normalized.split_once([' ', 'T']) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (normalized.as_str(), None),
    };

    let mut pieces = date_part.split('-');
    let year: i32 = digits(pieces.next()?, 4, 4)?;
    let month: u32 = digits(pieces.next()?, 1, 2)?;
    let day: u32 = digits(pieces.next()?, 1, 2)?;
    if pieces.next().is_some() {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time = match time_part {
        Some(time) => parse_time(time)?,
        None => match boundary {
            Boundary::Start => NaiveTime::from_hms_milli_opt(0, 0, 0, 0)?,
            Boundary::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?,
        },
    };

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}

fn parse_time(input: &str) -> Option<NaiveTime> {
    let (clock, fraction) = match input.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (input, None),
    };

    let mut pieces = clock.split(':');
    let hour: u32 = digits(pieces.next()?, 1, 2)?;
    let minute: u32 = pieces.next().map(|m| digits(m, 1, 2)).unwrap_or(Some(0))?;
    let second: u32 = pieces.next().map(|s| digits(s, 1, 2)).unwrap_or(Some(0))?;
    if pieces.next().is_some() {
        return None;
    }

    let milli = match fraction {
        Some(fraction) => {
            let value: u32 = digits(fraction, 1, 3)?;
            value * 10u32.pow(3 - fraction.len() as u32)
        }
        None => 0,
    };

    NaiveTime::from_hms_milli_opt(hour, minute, second, milli)
}

fn digits<T: FromStr>(text: &str, min_len: usize, max_len: usize) -> Option<T> {
    let valid = (min_len..=max_len).contains(&text.len())
        && text.chars().all(|c| c.is_ascii_digit());
    if valid { text.parse().ok() } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn taipei() -> FixedOffset {
        FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).expect("valid offset")
    }

    fn compiler() -> QueryCompiler {
        QueryCompiler::new("booking", taipei(), FieldNormalizer::default())
    }

    // Drops quoted literals (honouring backslash escapes) so only structure remains.
    fn unquoted(expression: &str) -> String {
        let mut out = String::new();
        let mut in_quotes = false;
        let mut chars = expression.chars();
        while let Some(c) = chars.next() {
            match (in_quotes, c) {
                (true, '\\') => {
                    chars.next();
                }
                (_, '"') => in_quotes = !in_quotes,
                (true, _) => {}
                (false, c) => out.push(c),
            }
        }
        out
    }

    #[test]
    fn when_filter_is_empty_then_only_namespace_clause_is_emitted() {
        let expression = compiler().compile(&QueryFilter::default());

        assert_eq!(expression, "public_id:booking*");
    }

    #[test]
    fn when_date_to_has_no_time_then_bound_is_end_of_local_day() {
        let filter = QueryFilter {
            date_to: Some("2025-10-01".to_string()),
            ..QueryFilter::default()
        };

        assert_eq!(
            compiler().compile(&filter),
            "public_id:booking* AND created_at<=2025-10-01T15:59:59.999Z"
        );
    }

    #[test]
    fn when_date_from_uses_slashes_then_bound_is_start_of_local_day() {
        let filter = QueryFilter {
            date_from: Some("2025/10/01".to_string()),
            ..QueryFilter::default()
        };

        assert_eq!(
            compiler().compile(&filter),
            "public_id:booking* AND created_at>=2025-09-30T16:00:00.000Z"
        );
    }

    #[test]
    fn when_date_carries_a_time_then_that_time_is_used() {
        let render = |text: &str, boundary: Boundary| {
            parse_civil_datetime(text, boundary, taipei())
                .map(|instant| instant.to_rfc3339_opts(SecondsFormat::Millis, true))
        };

        assert_eq!(
            render("2025-10-01 13:00", Boundary::End).as_deref(),
            Some("2025-10-01T05:00:00.000Z")
        );
        assert_eq!(
            render("2025-10-01T08:30:15.5", Boundary::Start).as_deref(),
            Some("2025-10-01T00:30:15.500Z")
        );
    }

    #[test]
    fn when_date_is_malformed_then_bound_is_omitted() {
        let malformed = [
            "2025-13-01",
            "2025-02-30",
            "yesterday",
            "10/01/2025",
            "2025-10-01 25:00",
            "",
        ];

        for bad in malformed {
            let filter = QueryFilter {
                date_from: Some(bad.to_string()),
                date_to: Some(bad.to_string()),
                ..QueryFilter::default()
            };
            let expression = compiler().compile(&filter);
            assert_eq!(expression, "public_id:booking*", "input {bad:?}");
        }
    }

    #[test]
    fn when_keyword_is_plain_then_it_searches_every_alias_unquoted() {
        let expression = compiler().compile(&QueryFilter {
            keyword: Some(" 0912345678 ".to_string()),
            ..QueryFilter::default()
        });

        let head = "public_id:booking* AND (public_id~0912345678 OR ";
        assert!(expression.starts_with(head));
        assert!(expression.contains("context.name~0912345678"));
        assert!(expression.contains("context.customer_name~0912345678"));
        assert!(expression.contains("context.電話~0912345678"));
        assert!(expression.contains("metadata.phone_number~0912345678"));
        assert!(expression.contains("metadata.service_category~0912345678"));
        assert!(expression.ends_with(')'));
    }

    #[test]
    fn when_keyword_has_reserved_characters_then_it_becomes_a_quoted_literal() {
        assert_eq!(escape_term("O'Brien & Co"), "\"O'Brien & Co\"");
        assert_eq!(escape_term(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(escape_term(r"a\b"), r#""a\\b""#);
        assert_eq!(escape_term("or"), "\"or\"");
        assert_eq!(escape_term("王小明"), "王小明");
    }

    #[test]
    fn when_keyword_tries_to_inject_clauses_then_structure_is_unchanged() {
        let hostile = [
            "O'Brien & Co",
            "x) OR (public_id:*",
            r#"a" OR public_id:* OR "b"#,
            r"\) (\",
        ];

        for keyword in hostile {
            let expression = compiler().compile(&QueryFilter {
                keyword: Some(keyword.to_string()),
                ..QueryFilter::default()
            });
            let structure = unquoted(&expression);

            assert!(!structure.contains('&'), "{expression}");
            assert_eq!(structure.matches('(').count(), 1, "{expression}");
            assert_eq!(structure.matches(')').count(), 1, "{expression}");
            assert_eq!(structure.matches(" AND ").count(), 1, "{expression}");
        }
    }

    #[test]
    fn when_limit_is_out_of_range_then_it_is_clamped() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(42)), 42);
    }

    #[test]
    fn when_cursor_is_present_then_it_is_passed_through_untouched() {
        let request = compiler().search_request(&QueryFilter {
            cursor: Some("abc==:def".to_string()),
            limit: Some(10),
            ..QueryFilter::default()
        });

        assert_eq!(request.next_cursor.as_deref(), Some("abc==:def"));
        assert_eq!(request.max_results, 10);
    }

    #[test]
    fn when_searchable_aliases_are_rendered_then_they_need_no_escaping() {
        let fields = compiler().keyword_fields();

        for field in &fields {
            assert_eq!(escape_term(field), *field);
        }
        assert_eq!(fields.len(), 1 + 2 * (5 + 7 + 6));
    }

    proptest! {
        #[test]
        fn when_any_keyword_is_compiled_then_only_the_term_varies(keyword in any::<String>()) {
            prop_assume!(!keyword.trim().is_empty());
            let compiler = compiler();
            let fields = compiler.keyword_fields();

            let expression = compiler.compile(&QueryFilter {
                keyword: Some(keyword),
                ..QueryFilter::default()
            });
            let structure = unquoted(&expression);

            prop_assert!(structure.starts_with("public_id:booking* AND ("), "{}", expression);
            prop_assert!(structure.ends_with(')'), "{}", expression);
            prop_assert_eq!(structure.matches('(').count(), 1);
            prop_assert_eq!(structure.matches(')').count(), 1);
            prop_assert_eq!(structure.matches(" AND ").count(), 1);
            prop_assert_eq!(structure.matches(" OR ").count(), fields.len() - 1);
        }
    }
}
