//! Export: serialise the result collection into one tabular artifact.
//!
//! One row per record, in result order, under a fixed header. The header
//! labels are the Indonesian column names the recap spreadsheet has always
//! used, so downstream sheets that reference them by name keep working.
//!
//! ## Atomic writes
//!
//! [`export_to_path`] writes into a temporary file in the destination
//! directory and renames it into place, so an interrupted export never
//! leaves a truncated recap behind.

use crate::contract::ContractData;
use crate::error::KksError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Serialises records into an artifact.
pub trait Aggregator: Send + Sync {
    /// Write all `records` to `out`.
    fn write_records(&self, records: &[ContractData], out: &mut dyn Write) -> Result<(), KksError>;

    /// Conventional file extension of the artifact, without the dot.
    fn extension(&self) -> &'static str;
}

/// Number of exported columns.
pub const COLUMN_COUNT: usize = 38;

/// Header labels of every exported column, in order.
pub const HEADERS: [&str; COLUMN_COUNT] = [
    "Tipe Kontrak",
    "Pihak 1",
    "Pihak 2",
    "Nomor KKS Pihak 1",
    "Nomor KKS Pihak 2",
    "KKS Tentang",
    "Hari KKS",
    "Tanggal KKS",
    "Nama Pihak 1",
    "NIP Pihak 1",
    "Jabatan Pihak 1",
    "Alamat Pihak 1",
    "HP Pihak 1",
    "Email Pihak 1",
    "Nama Pihak 2",
    "NIP Pihak 2",
    "Jabatan Pihak 2",
    "Alamat Pihak 2",
    "HP Pihak 2",
    "Email Pihak 2",
    // KODING
    "Sasaran (Koding)",
    "Total Biaya (Koding)",
    "Biaya PNBP (Koding)",
    "Biaya Non-PNBP (Koding)",
    // PM, principals
    "Sasaran Kepsek (PM)",
    "PNBP Kepsek (PM)",
    "Non-PNBP Kepsek (PM)",
    "Total Kepsek (PM)",
    // PM, teachers
    "Sasaran Guru (PM)",
    "PNBP 1 Guru (PM)",
    "Non-PNBP 1 Guru (PM)",
    "Total Biaya Per 1 Guru (PM)",
    "Total Biaya Pelatihan (PM)",
    "Setoran ke Kas Negara",
    "Nomor Rekening RPL",
    "Nama Rekening RPL",
    "Bank Rekening RPL",
    "Jangka Waktu Kontrak Sampai Tanggal",
];

/// Cell values of one record, aligned with [`HEADERS`].
pub fn row(d: &ContractData) -> [&str; COLUMN_COUNT] {
    [
        d.contract_type.as_str(),
        d.pihak1.as_str(),
        d.pihak2.as_str(),
        d.nomor_kks_pihak1.as_str(),
        d.nomor_kks_pihak2.as_str(),
        d.kks_tentang.as_str(),
        d.hari_kks.as_str(),
        d.tanggal_kks.as_str(),
        d.nama_pihak1.as_str(),
        d.nip_pihak1.as_str(),
        d.jabatan_pihak1.as_str(),
        d.alamat_pihak1.as_str(),
        d.hp_pihak1.as_str(),
        d.email_pihak1.as_str(),
        d.nama_pihak2.as_str(),
        d.nip_pihak2.as_str(),
        d.jabatan_pihak2.as_str(),
        d.alamat_pihak2.as_str(),
        d.hp_pihak2.as_str(),
        d.email_pihak2.as_str(),
        // KODING
        d.sasaran.as_str(),
        d.total_biaya.as_str(),
        d.biaya_pnbp.as_str(),
        d.biaya_non_pnbp.as_str(),
        // PM, principals
        d.sasaran_kepsek.as_str(),
        d.pnbp_kepsek.as_str(),
        d.non_pnbp_kepsek.as_str(),
        d.total_kepsek.as_str(),
        // PM, teachers
        d.sasaran_guru.as_str(),
        d.pnbp_guru.as_str(),
        d.non_pnbp_guru.as_str(),
        d.total_guru.as_str(),
        d.total_biaya_pelatihan_pm.as_str(),
        d.setoran_kas_negara.as_str(),
        d.rekening_nomor.as_str(),
        d.rekening_nama.as_str(),
        d.rekening_bank.as_str(),
        d.jangka_waktu.as_str(),
    ]
}

/// CSV [`Aggregator`].
///
/// A UTF-8 byte-order mark is written first by default; without it some
/// spreadsheet applications read the file as Latin-1.
#[derive(Debug, Clone)]
pub struct CsvAggregator {
    delimiter: u8,
    bom: bool,
}

impl Default for CsvAggregator {
    fn default() -> Self {
        Self {
            delimiter: b',',
            bom: true,
        }
    }
}

impl CsvAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different field delimiter (e.g. `b';'` for locales with a decimal comma).
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }
}

impl Aggregator for CsvAggregator {
    fn write_records(&self, records: &[ContractData], out: &mut dyn Write) -> Result<(), KksError> {
        if self.bom {
            out.write_all("\u{FEFF}".as_bytes())
                .map_err(|e| KksError::ExportEncoding(e.to_string()))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(out);

        writer
            .write_record(HEADERS)
            .map_err(|e| KksError::ExportEncoding(e.to_string()))?;

        for record in records {
            writer
                .write_record(row(record))
                .map_err(|e| KksError::ExportEncoding(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| KksError::ExportEncoding(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}

/// Pretty-printed JSON array [`Aggregator`], using the camelCase wire names.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAggregator;

impl Aggregator for JsonAggregator {
    fn write_records(&self, records: &[ContractData], out: &mut dyn Write) -> Result<(), KksError> {
        serde_json::to_writer_pretty(&mut *out, records)
            .map_err(|e| KksError::ExportEncoding(e.to_string()))?;
        out.write_all(b"\n")
            .map_err(|e| KksError::ExportEncoding(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Write `records` to `path` atomically and return the final path.
pub fn export_to_path(
    aggregator: &dyn Aggregator,
    records: &[ContractData],
    path: &Path,
) -> Result<PathBuf, KksError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |source: std::io::Error| KksError::ExportFailed {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(&dir).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;

    {
        let mut buffered = std::io::BufWriter::new(tmp.as_file_mut());
        aggregator.write_records(records, &mut buffered)?;
        buffered.flush().map_err(io_err)?;
    }

    tmp.persist(path).map_err(|e| io_err(e.error))?;
    info!("Exported {} records to {}", records.len(), path.display());
    Ok(path.to_path_buf())
}
