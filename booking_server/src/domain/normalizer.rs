// Field normalization for booking documents.
// Producers never agreed on a schema, so every logical field is resolved
// through a declarative alias table. Scalars take the first non-empty alias;
// lists gather every alias, split, dedup and order against a known vocabulary.
// Normalizing an already-normalized map is a no-op.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

pub const OTHER_LABEL: &str = "其他";
// Joiner used when a list has to be flattened into a single string.
pub const LIST_JOINER: &str = "、";

const LIST_SEPARATORS: &[char] = &[',', '，', '、', '|', '｜', '/', '／', ';', '；', '\n', '\r'];
const PLACEHOLDERS: &[&str] = &["other", "others", "其他", "on"];
// Longest first so "其他指定時間：" is not read as "其他" + "指定時間：".
const OTHER_PREFIXES: &[&str] = &["其他指定時間", "其他", "others", "other"];
const UNIT_TOKENS: &[&str] = &["floor", "units", "unit", "樓", "楼", "層", "层", "台", "f"];
const TRUTHY: &[&str] = &["on", "true", "yes", "y", "1", "是", "需要", "要"];
const TIME_OPTIONS: &[&str] = &["平日", "假日", "上午", "下午", "晚上", "皆可"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Name,
    Phone,
    Service,
    Address,
    Area,
    Date,
    Timeslot,
    ContactTime,
    Brand,
    AcType,
    Count,
    Floor,
    IsInverter,
    Addons,
    Note,
}

impl LogicalField {
    pub fn is_list(self) -> bool {
        matches!(
            self,
            LogicalField::Timeslot
                | LogicalField::ContactTime
                | LogicalField::Brand
                | LogicalField::Floor
                | LogicalField::Addons
        )
    }
}

// Boolean-style keys that contribute a fixed label to a list field.
#[derive(Debug)]
pub struct FlagAlias {
    pub keys: &'static [&'static str],
    pub label: &'static str,
}

// Bare numbers at or above `threshold` get `suffix`; number+unit values are canonicalized.
#[derive(Clone, Copy, Debug)]
pub struct UnitRule {
    pub suffix: &'static str,
    pub threshold: u64,
}

#[derive(Debug)]
pub struct FieldSpec {
    pub field: LogicalField,
    // The first alias is the canonical key written back out.
    pub aliases: &'static [&'static str],
    // Free-text companions of an "other" option.
    pub other_keys: &'static [&'static str],
    pub flags: &'static [FlagAlias],
    pub known: &'static [&'static str],
    pub unit: Option<UnitRule>,
}

impl FieldSpec {
    pub fn canonical_key(&self) -> &'static str {
        self.aliases[0]
    }

    fn owns(&self, key: &str) -> bool {
        let matches = |keys: &[&str]| keys.iter().any(|candidate| *candidate == key);
        matches(self.aliases)
            || matches(self.other_keys)
            || self.flags.iter().any(|flag| matches(flag.keys))
    }
}

const fn field(field: LogicalField, aliases: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        field,
        aliases,
        other_keys: &[],
        flags: &[],
        known: &[],
        unit: None,
    }
}

pub static ALIAS_TABLE: &[FieldSpec] = &[
    field(
        LogicalField::Name,
        &["name", "customer_name", "fullname", "姓名", "顧客姓名"],
    ),
    field(
        LogicalField::Phone,
        &[
            "phone",
            "phone_number",
            "mobile",
            "tel",
            "電話",
            "聯絡電話",
            "聯繫電話",
        ],
    ),
    FieldSpec {
        other_keys: &["service_other"],
        ..field(
            LogicalField::Service,
            &[
                "service",
                "service_item",
                "service_category",
                "select_service",
                "服務",
                "服務類別",
            ],
        )
    },
    field(LogicalField::Address, &["address", "地址", "清洗保養地址"]),
    field(LogicalField::Area, &["area", "city", "region", "地區"]),
    field(LogicalField::Date, &["date", "預約日期"]),
    FieldSpec {
        other_keys: &["timeslot_other", "time_other", "other_time"],
        known: TIME_OPTIONS,
        ..field(
            LogicalField::Timeslot,
            &["timeslot", "time", "預約時段", "可安排時段"],
        )
    },
    FieldSpec {
        other_keys: &["contact_time_preference_other"],
        known: TIME_OPTIONS,
        ..field(
            LogicalField::ContactTime,
            &[
                "contact_time_preference",
                "contact_time",
                "聯絡時間",
                "方便聯繫時間",
            ],
        )
    },
    FieldSpec {
        other_keys: &["brand_other", "ac_brand_other"],
        known: &["大金", "日立", "國際牌", "三菱", "東元", "LG"],
        ..field(LogicalField::Brand, &["brand", "ac_brand", "冷氣品牌"])
    },
    field(LogicalField::AcType, &["ac_type", "冷氣類型"]),
    FieldSpec {
        unit: Some(UnitRule {
            suffix: "台",
            threshold: 5,
        }),
        ..field(
            LogicalField::Count,
            &["count", "ac_count", "quantity", "清洗數量", "台數"],
        )
    },
    FieldSpec {
        other_keys: &["floor_other", "indoor_floor_other"],
        unit: Some(UnitRule {
            suffix: "樓",
            threshold: 5,
        }),
        ..field(
            LogicalField::Floor,
            &["floor", "indoor_floor", "樓層", "室內機所在樓層"],
        )
    },
    field(
        LogicalField::IsInverter,
        &["is_inverter", "變頻", "是否為變頻機型系列"],
    ),
    FieldSpec {
        flags: &[
            FlagAlias {
                keys: &["antifungus", "anti_mold", "冷氣防霉抗菌處理", "防霉抗菌"],
                label: "防霉抗菌",
            },
            FlagAlias {
                keys: &["ozone", "臭氧殺菌消毒", "臭氧空間消毒"],
                label: "臭氧消毒",
            },
        ],
        known: &["防霉抗菌", "臭氧消毒"],
        ..field(
            LogicalField::Addons,
            &[
                "addons",
                "add_ons",
                "extra_service",
                "加購服務",
                "其他清洗服務",
            ],
        )
    },
    field(
        LogicalField::Note,
        &["note", "備註", "其他備註", "其他備註說明"],
    ),
];

// Canonical booking fields plus every raw key no alias claimed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NormalizedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub timeslot: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contact_time_preference: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub brand: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub floor: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_inverter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl NormalizedFields {
    pub fn scalar(&self, field: LogicalField) -> Option<&str> {
        let value = match field {
            LogicalField::Name => &self.name,
            LogicalField::Phone => &self.phone,
            LogicalField::Service => &self.service,
            LogicalField::Address => &self.address,
            LogicalField::Area => &self.area,
            LogicalField::Date => &self.date,
            LogicalField::AcType => &self.ac_type,
            LogicalField::Count => &self.count,
            LogicalField::IsInverter => &self.is_inverter,
            LogicalField::Note => &self.note,
            _ => return None,
        };
        value.as_deref()
    }

    pub fn list(&self, field: LogicalField) -> &[String] {
        match field {
            LogicalField::Timeslot => &self.timeslot,
            LogicalField::ContactTime => &self.contact_time_preference,
            LogicalField::Brand => &self.brand,
            LogicalField::Floor => &self.floor,
            LogicalField::Addons => &self.addons,
            _ => &[],
        }
    }

    fn set_scalar(&mut self, field: LogicalField, value: Option<String>) {
        let slot = match field {
            LogicalField::Name => &mut self.name,
            LogicalField::Phone => &mut self.phone,
            LogicalField::Service => &mut self.service,
            LogicalField::Address => &mut self.address,
            LogicalField::Area => &mut self.area,
            LogicalField::Date => &mut self.date,
            LogicalField::AcType => &mut self.ac_type,
            LogicalField::Count => &mut self.count,
            LogicalField::IsInverter => &mut self.is_inverter,
            LogicalField::Note => &mut self.note,
            _ => return,
        };
        *slot = value;
    }

    fn set_list(&mut self, field: LogicalField, values: Vec<String>) {
        let slot = match field {
            LogicalField::Timeslot => &mut self.timeslot,
            LogicalField::ContactTime => &mut self.contact_time_preference,
            LogicalField::Brand => &mut self.brand,
            LogicalField::Floor => &mut self.floor,
            LogicalField::Addons => &mut self.addons,
            _ => return,
        };
        *slot = values;
    }

    // Canonical raw map: lists stay arrays. Feeding it back yields the same fields.
    pub fn to_raw(&self, table: &[FieldSpec]) -> Map<String, Value> {
        let mut raw = self.extra.clone();
        for spec in table {
            let key = spec.canonical_key().to_string();
            if spec.field.is_list() {
                let values = self.list(spec.field);
                if !values.is_empty() {
                    raw.insert(
                        key,
                        Value::Array(values.iter().cloned().map(Value::String).collect()),
                    );
                }
            } else if let Some(value) = self.scalar(spec.field) {
                raw.insert(key, Value::String(value.to_string()));
            }
        }
        raw
    }

    // Flat string map for stores whose metadata values are plain text.
    pub fn to_flat_context(&self, table: &[FieldSpec]) -> Map<String, Value> {
        self.to_raw(table)
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text,
                    Value::Array(items) => items
                        .iter()
                        .filter_map(value_text)
                        .collect::<Vec<_>>()
                        .join(LIST_JOINER),
                    Value::Null => return None,
                    other => value_text(&other)?,
                };
                (!text.is_empty()).then(|| (key, Value::String(text)))
            })
            .collect()
    }
}

#[derive(Clone, Copy)]
pub struct FieldNormalizer {
    table: &'static [FieldSpec],
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new(ALIAS_TABLE)
    }
}

impl FieldNormalizer {
    pub fn new(table: &'static [FieldSpec]) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'static [FieldSpec] {
        self.table
    }

    // Raw keys an alias-oblivious search has to look at for one field.
    pub fn aliases(&self, field: LogicalField) -> &'static [&'static str] {
        self.table
            .iter()
            .find(|spec| spec.field == field)
            .map(|spec| spec.aliases)
            .unwrap_or(&[])
    }

    pub fn normalize(&self, raw: &Map<String, Value>) -> NormalizedFields {
        let mut fields = NormalizedFields::default();
        for spec in self.table {
            if spec.field.is_list() {
                fields.set_list(spec.field, resolve_list(spec, raw));
            } else {
                fields.set_scalar(spec.field, resolve_scalar(spec, raw));
            }
        }

        fields.extra = raw
            .iter()
            .filter(|(key, _)| !self.table.iter().any(|spec| spec.owns(key)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        fields
    }
}

fn resolve_scalar(spec: &FieldSpec, raw: &Map<String, Value>) -> Option<String> {
    let value = first_text(spec.aliases, raw);
    let other = first_text(spec.other_keys, raw);

    let resolved = match (value, other) {
        (Some(value), Some(other)) if is_placeholder(&value) => {
            format!("{OTHER_LABEL}：{other}")
        }
        (Some(value), _) => value,
        (None, Some(other)) => other,
        (None, None) => return None,
    };

    Some(match spec.unit {
        Some(rule) => apply_unit(&resolved, rule),
        None => resolved,
    })
}

fn first_text(keys: &[&str], raw: &Map<String, Value>) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(value_text)
}

#[derive(Debug, PartialEq, Eq)]
enum Entry {
    Normal(String),
    Custom(String),
}

fn resolve_list(spec: &FieldSpec, raw: &Map<String, Value>) -> Vec<String> {
    let mut entries = Vec::new();

    for key in spec.aliases {
        for item in raw.get(*key).map(list_items).unwrap_or_default() {
            entries.extend(
                item.split(LIST_SEPARATORS)
                    .filter_map(|piece| classify(piece, spec.unit)),
            );
        }
    }

    for key in spec.other_keys {
        for item in raw.get(*key).map(list_items).unwrap_or_default() {
            for piece in item.split(LIST_SEPARATORS) {
                // Companion keys are free text even without an explicit prefix.
                match classify(piece, spec.unit) {
                    Some(Entry::Normal(text)) => entries.push(Entry::Custom(text)),
                    Some(custom) => entries.push(custom),
                    None => {}
                }
            }
        }
    }

    for flag in spec.flags {
        let raised = flag
            .keys
            .iter()
            .filter_map(|key| raw.get(*key))
            .any(|value| is_truthy(value, flag.label));
        if raised {
            entries.push(Entry::Normal(flag.label.to_string()));
        }
    }

    order_known_first(entries, spec.known)
}

// Known vocabulary first (in vocabulary order), then other values, then free text.
fn order_known_first(entries: Vec<Entry>, known: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    for option in known {
        let key = dedup_key(option);
        let present = entries.iter().any(|entry| match entry {
            Entry::Normal(text) | Entry::Custom(text) => dedup_key(text) == key,
        });
        if present && seen.insert(key) {
            ordered.push(option.to_string());
        }
    }

    for entry in &entries {
        if let Entry::Normal(text) = entry {
            if seen.insert(dedup_key(text)) {
                ordered.push(text.clone());
            }
        }
    }

    for entry in &entries {
        if let Entry::Custom(text) = entry {
            if seen.insert(dedup_key(text)) {
                ordered.push(format!("{OTHER_LABEL}：{text}"));
            }
        }
    }

    ordered
}

fn classify(piece: &str, unit: Option<UnitRule>) -> Option<Entry> {
    let text = collapse_whitespace(piece);
    if text.is_empty() || is_placeholder(&text) {
        return None;
    }

    if let Some(rest) = strip_other_prefix(&text) {
        let rest = collapse_whitespace(rest);
        if rest.is_empty() || is_placeholder(&rest) {
            return None;
        }
        return Some(Entry::Custom(with_unit(rest, unit)));
    }

    Some(Entry::Normal(with_unit(text, unit)))
}

fn with_unit(text: String, unit: Option<UnitRule>) -> String {
    match unit {
        Some(rule) => apply_unit(&text, rule),
        None => text,
    }
}

fn strip_other_prefix(text: &str) -> Option<&str> {
    OTHER_PREFIXES.iter().find_map(|prefix| {
        let head = text.get(..prefix.len())?;
        if !head.eq_ignore_ascii_case(prefix) {
            return None;
        }
        let rest = text[prefix.len()..].trim_start();
        rest.strip_prefix(':').or_else(|| rest.strip_prefix('：'))
    })
}

fn is_placeholder(text: &str) -> bool {
    PLACEHOLDERS
        .iter()
        .any(|placeholder| text.trim().eq_ignore_ascii_case(placeholder))
}

fn is_truthy(value: &Value, label: &str) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => {
            let text = text.trim();
            text == label || TRUTHY.iter().any(|word| text.eq_ignore_ascii_case(word))
        }
        Value::Array(items) => items.iter().any(|item| is_truthy(item, label)),
        _ => false,
    }
}

// "9" -> "9 台" above the threshold; "5F" / "5 樓" -> "5 樓"; anything else untouched.
pub fn apply_unit(text: &str, rule: UnitRule) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if is_digits(&compact) {
        return match compact.parse::<u64>() {
            Ok(number) if number >= rule.threshold => format!("{number} {}", rule.suffix),
            _ => text.to_string(),
        };
    }

    match strip_unit_suffix(&compact.to_lowercase()) {
        Some(digits) if is_digits(&digits) => match digits.parse::<u64>() {
            Ok(number) => format!("{number} {}", rule.suffix),
            Err(_) => text.to_string(),
        },
        _ => text.to_string(),
    }
}

// Ignores whitespace, case and unit tokens so "5F" and "5 樓" collide.
pub fn dedup_key(text: &str) -> String {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    match strip_unit_suffix(&compact) {
        Some(rest) if is_digits(&rest) => rest,
        _ => compact,
    }
}

fn strip_unit_suffix(compact_lower: &str) -> Option<String> {
    let mut rest = compact_lower;
    let mut stripped = false;
    while let Some(token) = UNIT_TOKENS.iter().find(|token| rest.ends_with(**token)) {
        rest = &rest[..rest.len() - token.len()];
        stripped = true;
    }
    (stripped && !rest.is_empty()).then(|| rest.to_string())
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(LIST_JOINER),
        Value::Object(_) => value.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn list_items(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Number(number) => vec![number.to_string()],
        Value::Array(items) => items.iter().flat_map(list_items).collect(),
        _ => Vec::new(),
    }
}
