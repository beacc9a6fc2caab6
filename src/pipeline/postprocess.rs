//! Post-processing: turn raw model output into a clean [`ContractData`].
//!
//! Even with a response schema, models occasionally wrap the JSON in
//! ```` ```json ```` fences, prepend a sentence, or leave stray whitespace and
//! zero-width characters in values copied off a scanned page. These passes are
//! cheap and deterministic, and each is independently testable.
//!
//! ## Rule Order
//!
//! Strip fences and invisible characters before locating the JSON object,
//! then deserialize, then normalise individual values.

use crate::contract::ContractData;
use crate::error::ItemError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Parse a model answer into a normalised record.
///
/// Only a missing or non-object JSON payload is an error. `null` values,
/// bare numbers and an unrecognised `contractType` degrade to the field
/// defaults instead of failing the whole document.
pub fn parse_contract(raw: &str) -> Result<ContractData, ItemError> {
    let cleaned = remove_invisible_chars(&strip_code_fences(raw));
    let json = extract_json_object(&cleaned).ok_or_else(|| ItemError::InvalidResponse {
        detail: format!("no JSON object in response: {}", preview(raw)),
    })?;

    let value: Value = serde_json::from_str(json).map_err(|e| ItemError::InvalidResponse {
        detail: e.to_string(),
    })?;
    let Value::Object(fields) = value else {
        return Err(ItemError::InvalidResponse {
            detail: format!("expected a JSON object, got: {}", preview(json)),
        });
    };

    let data: ContractData = serde_json::from_value(Value::Object(coerce_fields(fields)))
        .map_err(|e| ItemError::InvalidResponse {
            detail: e.to_string(),
        })?;

    Ok(normalise_record(data))
}

// ── Rule 1: Strip code fences ────────────────────────────────────────────────

static RE_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Locate the outermost JSON object ─────────────────────────────────

fn extract_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

// ── Rule 4: Coerce loosely typed values ──────────────────────────────────────

/// Drop `null`s so the field default applies, stringify scalars, and
/// upper-case the classification so `"pm"` still reads as `PM`.
fn coerce_fields(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                Value::String(s) if key == "contractType" => {
                    Value::String(s.trim().to_ascii_uppercase())
                }
                other => other,
            };
            Some((key, value))
        })
        .collect()
}

// ── Rule 5: Normalise values ─────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse internal whitespace runs and trim every value; keep only digits
/// in NIP and account-number fields.
fn normalise_record(mut data: ContractData) -> ContractData {
    for field in [
        &mut data.pihak1,
        &mut data.pihak2,
        &mut data.nomor_kks_pihak1,
        &mut data.nomor_kks_pihak2,
        &mut data.kks_tentang,
        &mut data.hari_kks,
        &mut data.tanggal_kks,
        &mut data.nama_pihak1,
        &mut data.jabatan_pihak1,
        &mut data.alamat_pihak1,
        &mut data.hp_pihak1,
        &mut data.email_pihak1,
        &mut data.nama_pihak2,
        &mut data.jabatan_pihak2,
        &mut data.alamat_pihak2,
        &mut data.hp_pihak2,
        &mut data.email_pihak2,
        &mut data.sasaran,
        &mut data.total_biaya,
        &mut data.biaya_pnbp,
        &mut data.biaya_non_pnbp,
        &mut data.sasaran_kepsek,
        &mut data.sasaran_guru,
        &mut data.pnbp_kepsek,
        &mut data.non_pnbp_kepsek,
        &mut data.total_kepsek,
        &mut data.pnbp_guru,
        &mut data.non_pnbp_guru,
        &mut data.total_guru,
        &mut data.total_biaya_pelatihan_pm,
        &mut data.setoran_kas_negara,
        &mut data.rekening_nama,
        &mut data.rekening_bank,
        &mut data.jangka_waktu,
    ] {
        *field = collapse_whitespace(field);
    }

    for field in [
        &mut data.nip_pihak1,
        &mut data.nip_pihak2,
        &mut data.rekening_nomor,
    ] {
        *field = digits_only(field);
    }

    data
}

fn collapse_whitespace(s: &str) -> String {
    RE_WHITESPACE.replace_all(s.trim(), " ").to_string()
}

fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn preview(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(80) {
        Some((idx, _)) => format!("{}\u{2026}", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractType;

    #[test]
    fn strips_json_fence() {
        let input = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\":1}");
    }

    #[test]
    fn leaves_bare_json_alone() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn finds_object_after_preamble() {
        let input = "Here is the data: {\"contractType\":\"PM\"} Hope this helps.";
        assert_eq!(
            extract_json_object(input),
            Some("{\"contractType\":\"PM\"}")
        );
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[test]
    fn parse_fenced_response_with_noise() {
        let raw = "```json\n{\"contractType\":\"KODING\",\"pihak1\":\"  Balai  Guru\u{200B}\\nPenggerak \",\"pihak2\":\"SMK 2\",\"rekeningNomor\":\"123-456 789\",\"nipPihak1\":\"19700101 199001 1 001\"}\n```";
        let data = parse_contract(raw).unwrap();
        assert_eq!(data.contract_type, ContractType::Koding);
        assert_eq!(data.pihak1, "Balai Guru Penggerak");
        assert_eq!(data.rekening_nomor, "123456789");
        assert_eq!(data.nip_pihak1, "197001011990011001");
        assert_eq!(data.jangka_waktu, "");
    }

    #[test]
    fn non_json_is_invalid_response() {
        let err = parse_contract("I cannot read this document.").unwrap_err();
        assert!(matches!(err, ItemError::InvalidResponse { .. }));
    }

    #[test]
    fn null_values_become_empty() {
        let raw = r#"{"contractType":"PM","pihak1":"BGP Maluku Utara","emailPihak2":null,"nipPihak2":null}"#;
        let data = parse_contract(raw).unwrap();
        assert_eq!(data.contract_type, ContractType::Pm);
        assert_eq!(data.pihak1, "BGP Maluku Utara");
        assert_eq!(data.email_pihak2, "");
        assert_eq!(data.nip_pihak2, "");
    }

    #[test]
    fn null_contract_type_is_unknown() {
        let data = parse_contract(r#"{"contractType":null,"pihak1":"A"}"#).unwrap();
        assert_eq!(data.contract_type, ContractType::Unknown);
        assert_eq!(data.pihak1, "A");
    }

    #[test]
    fn unexpected_contract_type_is_unknown() {
        for raw in [
            r#"{"contractType":"","pihak1":"A"}"#,
            r#"{"contractType":"SEWA","pihak1":"A"}"#,
        ] {
            let data = parse_contract(raw).unwrap();
            assert_eq!(data.contract_type, ContractType::Unknown, "input: {raw}");
            assert_eq!(data.pihak1, "A");
        }
    }

    #[test]
    fn lowercase_contract_type_is_accepted() {
        let data = parse_contract(r#"{"contractType":" koding "}"#).unwrap();
        assert_eq!(data.contract_type, ContractType::Koding);
    }

    #[test]
    fn numeric_values_become_strings() {
        let raw = r#"{"contractType":"KODING","sasaran":25,"rekeningNomor":1234567890}"#;
        let data = parse_contract(raw).unwrap();
        assert_eq!(data.sasaran, "25");
        assert_eq!(data.rekening_nomor, "1234567890");
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "x".repeat(200);
        let p = preview(&long);
        assert!(p.ends_with('\u{2026}'));
        assert_eq!(p.chars().count(), 81);
    }
}
