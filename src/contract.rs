//! The structured record extracted from one KKS contract.
//!
//! Field names on the wire are camelCase and double as the property names of
//! the extraction response schema (see [`crate::prompts::response_schema`]).
//! Every field defaults to an empty string so a response that omits optional
//! properties still deserializes, and any classification other than `KODING`
//! or `PM` reads as `UNKNOWN`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract classification.
///
/// `Pm` is a "Pembelajaran Mendalam" contract with separate per-person costs
/// for principals and teachers; `Koding` is a "Koding dan Kecerdasan
/// Artifisial" training contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractType {
    Koding,
    Pm,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Koding => "KODING",
            ContractType::Pm => "PM",
            ContractType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One extracted contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractData {
    pub contract_type: ContractType,

    // ── Header ────────────────────────────────────────────────────────────
    /// Institution of party 1 (not a person).
    pub pihak1: String,
    /// Institution of party 2 (not a person).
    pub pihak2: String,
    pub nomor_kks_pihak1: String,
    pub nomor_kks_pihak2: String,
    pub kks_tentang: String,
    pub hari_kks: String,
    pub tanggal_kks: String,

    // ── Signatories ───────────────────────────────────────────────────────
    pub nama_pihak1: String,
    pub nip_pihak1: String,
    pub jabatan_pihak1: String,
    pub alamat_pihak1: String,
    pub hp_pihak1: String,
    pub email_pihak1: String,
    pub nama_pihak2: String,
    pub nip_pihak2: String,
    pub jabatan_pihak2: String,
    pub alamat_pihak2: String,
    pub hp_pihak2: String,
    pub email_pihak2: String,

    // ── KODING costs ──────────────────────────────────────────────────────
    pub sasaran: String,
    pub total_biaya: String,
    pub biaya_pnbp: String,
    pub biaya_non_pnbp: String,

    // ── PM costs (per person) ─────────────────────────────────────────────
    pub sasaran_kepsek: String,
    pub sasaran_guru: String,
    pub pnbp_kepsek: String,
    pub non_pnbp_kepsek: String,
    pub total_kepsek: String,
    pub pnbp_guru: String,
    pub non_pnbp_guru: String,
    pub total_guru: String,
    #[serde(rename = "totalBiayaPelatihanPM")]
    pub total_biaya_pelatihan_pm: String,

    // ── Finance ───────────────────────────────────────────────────────────
    /// KODING only; empty for PM contracts.
    pub setoran_kas_negara: String,
    pub rekening_nomor: String,
    pub rekening_nama: String,
    pub rekening_bank: String,
    pub jangka_waktu: String,
}

impl ContractData {
    /// The record an extractor degrades to when it contains its own failure:
    /// `UNKNOWN` classification and every text field empty.
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// True when this record carries no information at all.
    ///
    /// A genuine "nothing found" answer from the service is indistinguishable
    /// from [`ContractData::sentinel`]; this only tells the two shapes apart
    /// from a populated record.
    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }
}
