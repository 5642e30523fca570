#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const TRANS_HEADER: &str = "ACCESSION_NUMBER\tNONDERIV_TRANS_SK\tSECURITY_TITLE\tSECURITY_TITLE_FN\tTRANS_DATE\tTRANS_DATE_FN\tDEEMED_EXECUTION_DATE\tDEEMED_EXECUTION_DATE_FN\tTRANS_FORM_TYPE\tTRANS_CODE\tEQUITY_SWAP_INVOLVED\tEQUITY_SWAP_TRANS_CD_FN\tTRANS_TIMELINESS\tTRANS_TIMELINESS_FN\tTRANS_SHARES\tTRANS_SHARES_FN\tTRANS_PRICEPERSHARE\tTRANS_PRICEPERSHARE_FN\tTRANS_ACQUIRED_DISP_CD\tTRANS_ACQUIRED_DISP_CD_FN\tSHRS_OWND_FOLWNG_TRANS\tSHRS_OWND_FOLWNG_TRANS_FN\tVALU_OWND_FOLWNG_TRANS\tVALU_OWND_FOLWNG_TRANS_FN\tDIRECT_INDIRECT_OWNERSHIP\tDIRECT_INDIRECT_OWNERSHIP_FN\tNATURE_OF_OWNERSHIP\tNATURE_OF_OWNERSHIP_FN";

pub const SUBMISSION_HEADER: &str = "ACCESSION_NUMBER\tFILING_DATE\tPERIOD_OF_REPORT\tDATE_OF_ORIG_SUB\tNO_SECURITIES_OWNED\tNOT_SUBJECT_SEC16\tFORM3_HOLDINGS_REPORTED\tFORM4_TRANS_REPORTED\tDOCUMENT_TYPE\tISSUERCIK\tISSUERNAME\tISSUERTRADINGSYMBOL\tREMARKS";

pub const OWNER_HEADER: &str = "ACCESSION_NUMBER\tRPTOWNERCIK\tRPTOWNERNAME\tRPTOWNER_RELATIONSHIP\tRPTOWNER_TITLE\tRPTOWNER_TXT\tRPTOWNER_STREET1\tRPTOWNER_STREET2\tRPTOWNER_CITY\tRPTOWNER_STATE\tRPTOWNER_ZIPCODE\tRPTOWNER_STATE_DESC\tFILE_NUMBER";

/// A `NONDERIV_TRANS.tsv` line; footnote cells are left empty.
pub fn trans_line(accession: &str, title: &str, date: &str, shares: &str, price: &str) -> String {
    [
        accession, "1", title, "", date, "", "", "", "4", "S", "0", "", "", "", shares, "",
        price, "", "D", "", "1000", "", "", "", "D", "", "", "",
    ]
    .join("\t")
}

pub fn submission_line(accession: &str, issuer: &str, ticker: &str) -> String {
    [
        accession,
        "20-MAR-2024",
        "15-MAR-2024",
        "",
        "0",
        "0",
        "",
        "",
        "4",
        "0000320193",
        issuer,
        ticker,
        "",
    ]
    .join("\t")
}

pub fn owner_line(accession: &str, name: &str) -> String {
    [
        accession,
        "0001214156",
        name,
        "Officer",
        "CFO",
        "",
        "1 Main St",
        "",
        "Cupertino",
        "CA",
        "95014",
        "",
        "",
    ]
    .join("\t")
}

pub fn relation(header: &str, lines: &[String]) -> String {
    let mut text = String::from(header);
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text.push('\n');
    text
}

pub fn write_archive(path: &Path, members: &[(&str, String)]) -> PathBuf {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, content) in members {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path.to_path_buf()
}

/// Two admitted trades (A1, A2), one option grant, one zero-price gift, one
/// trade whose submission is missing, and one short row.
pub fn sample_archive(path: &Path) -> PathBuf {
    let transactions = relation(
        TRANS_HEADER,
        &[
            trans_line("A1", "Common Stock", "15-MAR-2024", "1000", "12.5"),
            trans_line("A2", "Class A Common Stock", "18-MAR-2024", "200", "50"),
            trans_line("A3", "Employee Stock Option", "18-MAR-2024", "10", "1"),
            trans_line("A4", "Common Stock", "19-MAR-2024", "500", "0"),
            trans_line("A9", "Common Stock", "20-MAR-2024", "5", "5"),
            "A5\t1\tCommon Stock".to_string(),
        ],
    );
    let submissions = relation(
        SUBMISSION_HEADER,
        &[
            submission_line("A1", "ACME CORP", "ACME"),
            submission_line("A2", "O'Brien Holdings", "OBH"),
            submission_line("A3", "ACME CORP", "ACME"),
            submission_line("A4", "ACME CORP", "ACME"),
        ],
    );
    let owners = relation(
        OWNER_HEADER,
        &[
            owner_line("A1", "J. Doe"),
            owner_line("A2", "O'Brien Pat"),
            owner_line("A9", "Nobody"),
        ],
    );
    write_archive(
        path,
        &[
            ("NONDERIV_TRANS.tsv", transactions),
            ("SUBMISSION.tsv", submissions),
            ("REPORTINGOWNER.tsv", owners),
        ],
    )
}

/// Serves canned bodies by URL and counts requests; unknown URLs are 404s.
#[derive(Default)]
pub struct FakeClient {
    pub bodies: std::collections::HashMap<String, Vec<u8>>,
    pub requests: std::cell::RefCell<Vec<String>>,
}

impl FakeClient {
    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl edgar_insiders::fetch::FetchClient for FakeClient {
    fn fetch(
        &self,
        url: &str,
    ) -> Result<Box<dyn std::io::Read + Send>, edgar_insiders::error::InsiderError> {
        self.requests.borrow_mut().push(url.to_string());
        match self.bodies.get(url) {
            Some(body) => Ok(Box::new(std::io::Cursor::new(body.clone()))),
            None => Err(edgar_insiders::error::InsiderError::NotFound(url.to_string())),
        }
    }

    fn download(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<u64, edgar_insiders::error::InsiderError> {
        let mut body = self.fetch(url)?;
        edgar_insiders::fetch::write_stream_atomic(&mut body, destination)
            .map_err(|err| edgar_insiders::error::InsiderError::Filesystem(format!("{err:?}")))
    }
}
