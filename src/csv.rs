use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::amount::ParseAmountError;
use crate::model::ParseSplitTypeError;
use crate::{Amount, Balances, CurrencyCode, Expense, MemberId, Record, Settlement, Transaction};

/// Errors that can occur when reading csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized record type '{record_type}'")]
    UnrecognizedType { line: usize, record_type: String },

    #[error("line {line}: {record_type} missing {field}")]
    MissingField {
        line: usize,
        record_type: String,
        field: &'static str,
    },

    #[error("line {line}: invalid {field}: {source}")]
    InvalidAmount {
        line: usize,
        field: &'static str,
        source: ParseAmountError,
    },

    #[error("line {line}: {source}")]
    InvalidSplitType {
        line: usize,
        source: ParseSplitTypeError,
    },

    #[error("line {line}: malformed entry '{entry}' in {field}")]
    MalformedEntry {
        line: usize,
        field: &'static str,
        entry: String,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    id: Option<String>,
    currency: Option<String>,
    amount: Option<String>,
    payer: Option<String>,
    receiver: Option<String>,
    split_type: Option<String>,
    split_to: Option<String>,
    split_data: Option<String>,
    active: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SettlementRow<'a> {
    currency: &'a str,
    from: &'a str,
    to: &'a str,
    amount: String,
}

#[derive(Debug, Serialize)]
struct BalanceRow<'a> {
    currency: &'a str,
    member: &'a str,
    balance: String,
}

/// Read records from a csv file
///
/// Each row becomes one [`Record`]; rows that fail to parse are yielded as
/// errors so the caller can report them and keep going.
pub fn read_records(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Record, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        }))
}

fn parse_row(line: usize, row: InputRow) -> Result<Record, CsvError> {
    let record_type = row.r#type.as_str();
    let require = |value: Option<String>, field: &'static str| {
        value.ok_or_else(|| CsvError::MissingField {
            line,
            record_type: record_type.to_string(),
            field,
        })
    };

    match record_type {
        "member" => Ok(Record::Member(require(row.id, "id")?)),
        "remove" => Ok(Record::Remove(require(row.id, "id")?)),
        "payment" => {
            let amount = parse_amount(line, "amount", &require(row.amount, "amount")?)?;
            let mut tx = Transaction::new(
                require(row.id, "id")?,
                require(row.currency, "currency")?,
                require(row.payer, "payer")?,
                require(row.receiver, "receiver")?,
                amount,
            );
            tx.is_active = row.active.unwrap_or(true);
            Ok(Record::Transaction(tx))
        }
        "expense" => {
            let amount = parse_amount(line, "amount", &require(row.amount, "amount")?)?;
            let payer = require(row.payer, "payer")?;
            let mut expense = Expense::new(
                require(row.id, "id")?,
                require(row.currency, "currency")?,
                amount,
            );

            expense.paid_by = if payer.contains(':') {
                parse_weights(line, "payer", &payer)?
            } else {
                BTreeMap::from([(payer, amount)])
            };
            expense.split_to = parse_members(&require(row.split_to, "split_to")?).collect();
            if let Some(split_type) = row.split_type {
                expense.split_type = split_type
                    .parse()
                    .map_err(|source| CsvError::InvalidSplitType { line, source })?;
            }
            if let Some(split_data) = row.split_data {
                expense.split_data = parse_weights(line, "split_data", &split_data)?;
            }
            expense.is_active = row.active.unwrap_or(true);
            Ok(Record::Expense(expense))
        }
        other => Err(CsvError::UnrecognizedType {
            line,
            record_type: other.to_string(),
        }),
    }
}

fn parse_amount(line: usize, field: &'static str, value: &str) -> Result<Amount, CsvError> {
    value
        .parse()
        .map_err(|source| CsvError::InvalidAmount {
            line,
            field,
            source,
        })
}

/// `a;b;c`
fn parse_members(value: &str) -> impl Iterator<Item = MemberId> + '_ {
    value
        .split(';')
        .map(str::trim)
        .filter(|member| !member.is_empty())
        .map(str::to_string)
}

/// `a:1.5;b:2`
fn parse_weights(
    line: usize,
    field: &'static str,
    value: &str,
) -> Result<BTreeMap<MemberId, Amount>, CsvError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<(MemberId, Amount), CsvError> {
            let (member, weight) = entry
                .split_once(':')
                .map(|(member, weight)| (member.trim(), weight.trim()))
                .filter(|(member, _)| !member.is_empty())
                .ok_or_else(|| CsvError::MalformedEntry {
                    line,
                    field,
                    entry: entry.to_string(),
                })?;
            Ok((member.to_string(), parse_amount(line, field, weight)?))
        })
        .collect()
}

/// Write settlements as csv, ordered by currency then emission order
pub fn write_settlements<W: io::Write>(
    writer: W,
    settlements: &BTreeMap<CurrencyCode, Vec<Settlement>>,
) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(["currency", "from", "to", "amount"])?;

    for settlement in settlements.values().flatten() {
        writer.serialize(SettlementRow {
            currency: &settlement.currency,
            from: &settlement.sender_id,
            to: &settlement.receiver_id,
            amount: settlement.amount.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Write net balances as csv, ordered by currency then member
pub fn write_balances<W: io::Write>(writer: W, balances: &Balances) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(["currency", "member", "balance"])?;

    for (currency, sheet) in balances {
        for (member, balance) in sheet {
            writer.serialize(BalanceRow {
                currency,
                member,
                balance: balance.to_string(),
            })?;
        }
    }

    writer.flush()?;
    Ok(())
}
