use crate::error::InsiderError;
use crate::normalize::{FromRow, NormalizedRow};

/// One line of `NONDERIV_TRANS.tsv`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub accession_number: String,
    pub nonderiv_trans_sk: Option<String>,
    pub security_title: String,
    pub trans_date: Option<String>,
    pub deemed_execution_date: Option<String>,
    pub trans_form_type: Option<String>,
    pub trans_code: Option<String>,
    pub equity_swap_involved: Option<String>,
    pub trans_timeliness: Option<String>,
    pub trans_shares: f64,
    pub trans_price_per_share: f64,
    pub trans_acquired_disp_cd: Option<String>,
    pub shrs_ownd_folwng_trans: Option<f64>,
    pub valu_ownd_folwng_trans: Option<f64>,
    pub direct_indirect_ownership: Option<String>,
    pub nature_of_ownership: Option<String>,
    /// `trans_shares * trans_price_per_share`.
    pub trans_dollars: f64,
}

impl FromRow for TransactionRecord {
    const RELATION: &'static str = "transactions";

    fn from_row(row: &NormalizedRow<'_>) -> Result<Self, InsiderError> {
        let trans_shares = row.require_number("TRANS_SHARES")?;
        let trans_price_per_share = row.require_number("TRANS_PRICEPERSHARE")?;
        Ok(Self {
            accession_number: row.require("ACCESSION_NUMBER")?.to_string(),
            nonderiv_trans_sk: row.text("NONDERIV_TRANS_SK"),
            security_title: row.text("SECURITY_TITLE").unwrap_or_default(),
            trans_date: row.text("TRANS_DATE"),
            deemed_execution_date: row.text("DEEMED_EXECUTION_DATE"),
            trans_form_type: row.text("TRANS_FORM_TYPE"),
            trans_code: row.text("TRANS_CODE"),
            equity_swap_involved: row.text("EQUITY_SWAP_INVOLVED"),
            trans_timeliness: row.text("TRANS_TIMELINESS"),
            trans_shares,
            trans_price_per_share,
            trans_acquired_disp_cd: row.text("TRANS_ACQUIRED_DISP_CD"),
            shrs_ownd_folwng_trans: row.number("SHRS_OWND_FOLWNG_TRANS")?,
            valu_ownd_folwng_trans: row.number("VALU_OWND_FOLWNG_TRANS")?,
            direct_indirect_ownership: row.text("DIRECT_INDIRECT_OWNERSHIP"),
            nature_of_ownership: row.text("NATURE_OF_OWNERSHIP"),
            trans_dollars: trans_shares * trans_price_per_share,
        })
    }
}

/// One line of `SUBMISSION.tsv`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionRecord {
    pub accession_number: String,
    pub filing_date: Option<String>,
    pub period_of_report: Option<String>,
    pub no_securities_owned: Option<String>,
    pub document_type: Option<String>,
    pub issuer_cik: Option<String>,
    pub issuer_name: Option<String>,
    pub issuer_trading_symbol: Option<String>,
}

impl FromRow for SubmissionRecord {
    const RELATION: &'static str = "submissions";

    fn from_row(row: &NormalizedRow<'_>) -> Result<Self, InsiderError> {
        Ok(Self {
            accession_number: row.require("ACCESSION_NUMBER")?.to_string(),
            filing_date: row.text("FILING_DATE"),
            period_of_report: row.text("PERIOD_OF_REPORT"),
            no_securities_owned: row.text("NO_SECURITIES_OWNED"),
            document_type: row.text("DOCUMENT_TYPE"),
            issuer_cik: row.text("ISSUERCIK"),
            issuer_name: row.text("ISSUERNAME"),
            issuer_trading_symbol: row.text("ISSUERTRADINGSYMBOL"),
        })
    }
}

/// One line of `REPORTINGOWNER.tsv`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnerRecord {
    pub accession_number: String,
    pub rpt_owner_cik: Option<String>,
    pub rpt_owner_name: Option<String>,
    pub rpt_owner_relationship: Option<String>,
    pub rpt_owner_title: Option<String>,
    pub rpt_owner_txt: Option<String>,
    pub file_number: Option<String>,
}

impl FromRow for OwnerRecord {
    const RELATION: &'static str = "owners";

    fn from_row(row: &NormalizedRow<'_>) -> Result<Self, InsiderError> {
        Ok(Self {
            accession_number: row.require("ACCESSION_NUMBER")?.to_string(),
            rpt_owner_cik: row.text("RPTOWNERCIK"),
            rpt_owner_name: row.text("RPTOWNERNAME"),
            rpt_owner_relationship: row.text("RPTOWNER_RELATIONSHIP"),
            rpt_owner_title: row.text("RPTOWNER_TITLE"),
            rpt_owner_txt: row.text("RPTOWNER_TXT"),
            file_number: row.text("FILE_NUMBER"),
        })
    }
}

/// A transaction with the submission and owner fields copied in. This is the
/// persisted row.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedTransaction {
    pub transaction: TransactionRecord,
    pub filing_date: Option<String>,
    pub no_securities_owned: Option<String>,
    pub document_type: Option<String>,
    pub issuer_cik: Option<String>,
    pub issuer_name: Option<String>,
    pub issuer_trading_symbol: Option<String>,
    pub rpt_owner_cik: Option<String>,
    pub rpt_owner_name: Option<String>,
    pub rpt_owner_relationship: Option<String>,
    pub rpt_owner_title: Option<String>,
    pub rpt_owner_txt: Option<String>,
    pub file_number: Option<String>,
}

impl EnrichedTransaction {
    pub fn new(
        transaction: TransactionRecord,
        submission: &SubmissionRecord,
        owner: &OwnerRecord,
    ) -> Self {
        Self {
            transaction,
            filing_date: submission.filing_date.clone(),
            no_securities_owned: submission.no_securities_owned.clone(),
            document_type: submission.document_type.clone(),
            issuer_cik: submission.issuer_cik.clone(),
            issuer_name: submission.issuer_name.clone(),
            issuer_trading_symbol: submission.issuer_trading_symbol.clone(),
            rpt_owner_cik: owner.rpt_owner_cik.clone(),
            rpt_owner_name: owner.rpt_owner_name.clone(),
            rpt_owner_relationship: owner.rpt_owner_relationship.clone(),
            rpt_owner_title: owner.rpt_owner_title.clone(),
            rpt_owner_txt: owner.rpt_owner_txt.clone(),
            file_number: owner.file_number.clone(),
        }
    }

    pub fn accession_number(&self) -> &str {
        &self.transaction.accession_number
    }
}
