//! Extraction prompt and response schema.
//!
//! Centralising the prompt and the schema here keeps the two extractor
//! backends ([`crate::pipeline::extract::GeminiExtractor`] and
//! [`crate::pipeline::llm::LlmExtractor`]) asking the same question, and lets
//! unit tests check that every [`crate::contract::ContractData`] field is
//! described to the model.

use serde_json::{json, Map, Value};

/// Instruction text sent after the page images.
pub const EXTRACTION_PROMPT: &str = r#"You are a meticulous legal contract auditor. Extract the data from the following Indonesian cooperation agreement (Kesepakatan Kerja Sama, KKS) page images into JSON.

1. PARTY 1 & PARTY 2 (DO NOT SWAP)
   - Institution name (fields pihak1 / pihak2): the agency or school, e.g. "SMA N 1 ...".
   - Official name (fields namaPihak1 / namaPihak2): the PERSON who signs.
   - Check both the opening "Yang bertanda tangan di bawah ini" block and the
     signature block on the last page. If they differ, use the signature block.
   - NIP should be 18 digits when present.

2. CONTRACT NUMBERS
   - Found in the header. Party 1's number (agency) usually comes first,
     party 2's number (school/partner) below it.
   - Copy them complete with punctuation, e.g. 1234/BGP.MU/2024.

3. BANK ACCOUNT (PASAL 6)
   - Account number: digits only, none skipped.
   - Account name: copy exactly what follows "atas nama" or "a.n.", unabridged.
   - Bank: BNI, BRI, Mandiri, BSI, ...

4. FINANCE & CONTRACT TYPE
   - PM: title contains "Pembelajaran Mendalam" or separate teacher vs principal cost tables.
     Use PER-PERSON unit costs, not multiplied totals. The PM grand total is the
     bottom/right total of the cost table in Pasal 5. setoranKasNegara is "" for PM.
   - KODING: title "Koding dan Kecerdasan Artifisial". setoranKasNegara is the
     amount in Pasal 5 "...disetorkan ke kas negara sebesar...".

5. CONTACTS (PHONE & EMAIL)
   - Look in Pasal 12 or the article titled "PEMBERITAHUAN"; otherwise below the
     signature block.

If a value is not present at all, use an empty string "".
Respond with the JSON object only."#;

/// Wire names and descriptions of every string field of the record.
///
/// `contractType` is handled separately because it is an enum.
pub const FIELD_DESCRIPTIONS: &[(&str, &str)] = &[
    ("pihak1", "Institution name of party 1 (not a person)."),
    ("pihak2", "Institution name of party 2 (not a person)."),
    ("nomorKksPihak1", "Party 1 document number, complete with slashes."),
    ("nomorKksPihak2", "Party 2 document number, complete with slashes."),
    ("kksTentang", "Agreement title: the text after TENTANG."),
    ("hariKks", "Day of signing."),
    ("tanggalKks", "Date of signing."),
    ("namaPihak1", "Full name of the party 1 signatory, from the signature block when it differs."),
    ("nipPihak1", "NIP of party 1 (18 digits)."),
    ("jabatanPihak1", "Position of party 1."),
    ("alamatPihak1", "Office address of party 1."),
    ("hpPihak1", "Phone number of party 1 (Pasal 12 / PEMBERITAHUAN / below signature)."),
    ("emailPihak1", "Email of party 1 (Pasal 12 / PEMBERITAHUAN)."),
    ("namaPihak2", "Full name of the party 2 signatory (principal/rector)."),
    ("nipPihak2", "NIP of party 2."),
    ("jabatanPihak2", "Position of party 2."),
    ("alamatPihak2", "Office address of party 2."),
    ("hpPihak2", "Phone number of party 2 (Pasal 12 / PEMBERITAHUAN / below signature)."),
    ("emailPihak2", "Email of party 2 (Pasal 12 / PEMBERITAHUAN)."),
    ("sasaran", "Number of participants (KODING)."),
    ("totalBiaya", "Total contract cost (KODING)."),
    ("biayaPnbp", "PNBP cost (KODING)."),
    ("biayaNonPnbp", "Non-PNBP cost (KODING)."),
    ("sasaranKepsek", "Number of targeted principals (Pasal 3)."),
    ("sasaranGuru", "Number of targeted teachers (Pasal 3)."),
    ("pnbpKepsek", "Functional PNBP value PER PERSON for principals."),
    ("nonPnbpKepsek", "Value outside functional PNBP PER PERSON for principals."),
    ("totalKepsek", "Total cost PER PERSON for principals."),
    ("pnbpGuru", "Functional PNBP value PER PERSON for teachers."),
    ("nonPnbpGuru", "Value outside functional PNBP PER PERSON for teachers."),
    ("totalGuru", "Total cost PER PERSON for teachers."),
    ("totalBiayaPelatihanPM", "TOTAL training cost paid (Pasal 5, bottom/right of the table)."),
    ("setoranKasNegara", "KODING only: amount deposited to the state treasury (Pasal 5). Empty for PM."),
    ("rekeningNomor", "Destination account number, digits only (Pasal 6)."),
    ("rekeningNama", "Account holder name after 'atas nama' / 'a.n', unabridged (Pasal 6)."),
    ("rekeningBank", "Bank name, e.g. BNI, BRI, Bank Mandiri (Pasal 6)."),
    ("jangkaWaktu", "Contract end date."),
];

/// Properties the service must always return.
pub const REQUIRED_FIELDS: &[&str] = &["contractType", "pihak1", "pihak2"];

/// Build the response schema in the Gemini `responseSchema` dialect
/// (OpenAPI subset with upper-case type names).
pub fn response_schema() -> Value {
    let mut properties = Map::new();
    properties.insert(
        "contractType".to_string(),
        json!({
            "type": "STRING",
            "enum": ["KODING", "PM", "UNKNOWN"],
            "description": "Contract classification. 'PM' for 'Pembelajaran Mendalam' or separate teacher vs principal costs; 'KODING' for 'Koding dan Kecerdasan Artifisial' training."
        }),
    );
    for (key, description) in FIELD_DESCRIPTIONS {
        properties.insert(
            (*key).to_string(),
            json!({ "type": "STRING", "description": description }),
        );
    }

    json!({
        "type": "OBJECT",
        "properties": Value::Object(properties),
        "required": REQUIRED_FIELDS,
    })
}

/// Prompt variant for backends without schema-constrained output: the
/// instruction plus an explicit list of the keys to return.
pub fn prompt_with_inline_schema() -> String {
    let mut s = String::from(EXTRACTION_PROMPT);
    s.push_str("\n\nReturn exactly these keys:\n");
    s.push_str("- contractType: one of \"KODING\", \"PM\", \"UNKNOWN\"\n");
    for (key, description) in FIELD_DESCRIPTIONS {
        s.push_str(&format!("- {key}: {description}\n"));
    }
    s
}
