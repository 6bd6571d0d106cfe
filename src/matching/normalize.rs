// src/matching/normalize.rs - Arabic text folding and record normalization
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::core::{FieldMapping, NormalizedRecord, RawFields, RawRecord};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static CHILD_DELIMITERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;,،|]+").unwrap());

enum Folded {
    Keep(char),
    Space,
    Drop,
}

fn fold_char(c: char) -> Folded {
    match c {
        'أ' | 'إ' | 'آ' | 'ٱ' => Folded::Keep('ا'),
        'ة' => Folded::Keep('ه'),
        'ى' => Folded::Keep('ي'),
        'ؤ' => Folded::Keep('و'),
        'ئ' => Folded::Keep('ي'),
        // Arabic-Indic and extended Arabic-Indic digits
        '\u{0660}'..='\u{0669}' => digit_from(c, 0x0660),
        '\u{06F0}'..='\u{06F9}' => digit_from(c, 0x06F0),
        // harakat, superscript alef, Quranic marks, tatweel
        '\u{064B}'..='\u{065F}'
        | '\u{0670}'
        | '\u{0610}'..='\u{061A}'
        | '\u{06D6}'..='\u{06ED}'
        | '\u{0640}' => Folded::Drop,
        // Arabic punctuation separates words like its Latin counterpart
        '\u{060C}' | '\u{061B}' | '\u{061F}' | '\u{066A}'..='\u{066D}' | '\u{06D4}' => Folded::Space,
        '\u{0600}'..='\u{06FF}' => Folded::Keep(c),
        c if c.is_ascii_alphanumeric() => Folded::Keep(c.to_ascii_lowercase()),
        c if c.is_whitespace() => Folded::Space,
        _ => Folded::Drop,
    }
}

fn digit_from(c: char, zero: u32) -> Folded {
    match char::from_digit(c as u32 - zero, 10) {
        Some(d) => Folded::Keep(d),
        None => Folded::Drop,
    }
}

/// Canonical form of a name or place: folded letter variants, no diacritics,
/// ASCII digits, lowercase ASCII, single spaces, trimmed.
pub fn normalize_text(s: &str) -> String {
    let mut folded = String::with_capacity(s.len());
    for c in s.chars() {
        match fold_char(c) {
            Folded::Keep(k) => folded.push(k),
            Folded::Space => folded.push(' '),
            Folded::Drop => {}
        }
    }
    WHITESPACE_RUN.replace_all(&folded, " ").trim().to_string()
}

pub fn tokenize(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Keeps only digits, mapping Arabic-Indic digits to ASCII.
pub fn digits_only(s: &str) -> String {
    s.chars()
        .filter_map(|c| match fold_char(c) {
            Folded::Keep(d) if d.is_ascii_digit() => Some(d),
            _ => None,
        })
        .collect()
}

/// Accepts an already-split list or a delimited string.
pub fn normalize_children(value: &Value) -> Vec<String> {
    let entries: Vec<String> = match value {
        Value::Array(items) => items.iter().map(value_to_text).collect(),
        Value::Null => Vec::new(),
        other => CHILD_DELIMITERS
            .split(&value_to_text(other))
            .map(str::to_string)
            .collect(),
    };
    entries
        .iter()
        .map(|e| normalize_text(e))
        .filter(|e| !e.is_empty())
        .collect()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(_) => String::new(),
    }
}

fn field<'a>(raw: &'a RawRecord, column: &str) -> &'a Value {
    raw.get(column).unwrap_or(&Value::Null)
}

/// Builds the normalized view of one source row. Missing columns become empty values.
pub fn normalize_record(id: usize, raw: &RawRecord, mapping: &FieldMapping) -> NormalizedRecord {
    let woman_raw = value_to_text(field(raw, &mapping.woman_name));
    let husband_raw = value_to_text(field(raw, &mapping.husband_name));
    let id_raw = value_to_text(field(raw, &mapping.national_id));
    let phone_raw = value_to_text(field(raw, &mapping.phone));
    let village_raw = value_to_text(field(raw, &mapping.village));
    let subdistrict_raw = value_to_text(field(raw, &mapping.subdistrict));
    let children_value = field(raw, &mapping.children);

    let woman_name = normalize_text(&woman_raw);
    let husband_name = normalize_text(&husband_raw);

    NormalizedRecord {
        id,
        beneficiary_id: mapping
            .beneficiary_id
            .as_deref()
            .map(|col| value_to_text(field(raw, col)).trim().to_string())
            .filter(|s| !s.is_empty()),
        woman_tokens: tokenize(&woman_name),
        husband_tokens: tokenize(&husband_name),
        woman_name,
        husband_name,
        national_id: id_raw.trim().to_string(),
        national_id_digits: digits_only(&id_raw),
        phone_digits: digits_only(&phone_raw),
        village: normalize_text(&village_raw),
        subdistrict: normalize_text(&subdistrict_raw),
        children: normalize_children(children_value),
        raw: RawFields {
            woman_name: woman_raw,
            husband_name: husband_raw,
            national_id: id_raw,
            phone: phone_raw,
            village: village_raw,
            subdistrict: subdistrict_raw,
            children: value_to_text(children_value),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    #[test]
    fn test_folds_letter_variants() {
        assert_eq!(normalize_text("أحمد"), "احمد");
        assert_eq!(normalize_text("إيمان"), "ايمان");
        assert_eq!(normalize_text("آمنة"), "امنه");
        assert_eq!(normalize_text("فاطمة"), "فاطمه");
        assert_eq!(normalize_text("مصطفى"), "مصطفي");
        assert_eq!(normalize_text("مؤمن"), "مومن");
        assert_eq!(normalize_text("هانئ"), "هاني");
    }

    #[test]
    fn test_strips_diacritics_and_tatweel() {
        assert_eq!(normalize_text("مُحَمَّد"), "محمد");
        assert_eq!(normalize_text("عـــلي"), "علي");
    }

    #[test]
    fn test_whitespace_case_and_symbols() {
        assert_eq!(normalize_text("  Fatima   AHMED\t"), "fatima ahmed");
        assert_eq!(normalize_text("سارة - (علي)"), "ساره علي");
        assert_eq!(normalize_text("علي،حسن"), "علي حسن");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
        assert_eq!(normalize_text("٠١٢٣"), "0123");
    }

    #[test]
    fn test_tokenize_drops_empty() {
        assert_eq!(tokenize("نور  احمد"), vec!["نور", "احمد"]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("+963 (11) 555-0199"), "963115550199");
        assert_eq!(digits_only("٠٩٤٤ ١٢٣"), "0944123");
        assert_eq!(digits_only("n/a"), "");
    }

    #[test]
    fn test_normalize_children() {
        assert_eq!(
            normalize_children(&json!("أحمد;; سارة ،، | علي,")),
            vec!["احمد", "ساره", "علي"]
        );
        assert_eq!(normalize_children(&json!(["محمد", "", " ـ "])), vec!["محمد"]);
        assert!(normalize_children(&Value::Null).is_empty());
        assert_eq!(normalize_children(&json!(7)), vec!["7"]);
    }

    #[test]
    fn test_normalize_record_tolerates_missing_fields() {
        let mapping = FieldMapping {
            woman_name: "name".into(),
            husband_name: "husband".into(),
            national_id: "nid".into(),
            phone: "phone".into(),
            village: "village".into(),
            subdistrict: "sub".into(),
            children: "kids".into(),
            beneficiary_id: Some("bid".into()),
        };
        let raw: RawRecord = json!({"name": "فاطمة أحمد علي", "nid": 123456, "phone": "0944-123-456"})
            .as_object()
            .cloned()
            .unwrap();

        let rec = normalize_record(7, &raw, &mapping);
        assert_eq!(rec.id, 7);
        assert_eq!(rec.woman_tokens, vec!["فاطمه", "احمد", "علي"]);
        assert_eq!(rec.national_id, "123456");
        assert_eq!(rec.phone_digits, "0944123456");
        assert_eq!(rec.husband_name, "");
        assert!(rec.husband_tokens.is_empty());
        assert!(rec.children.is_empty());
        assert_eq!(rec.beneficiary_id, None);
        assert_eq!(rec.raw.woman_name, "فاطمة أحمد علي");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let alphabet: Vec<char> = "أإآٱاةهىيؤوئبتـَُِّ ٠٥٩AbZ9-_،؛,.\t"
            .chars()
            .collect();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let len = rng.gen_range(0..24);
            let s: String = (0..len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            let once = normalize_text(&s);
            assert_eq!(normalize_text(&once), once, "input {:?}", s);
        }
    }
}
