use rust_decimal::Decimal;

pub fn write_csv<I, R, W>(records: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = R>,
    R: serde::Serialize,
    W: std::io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records.into_iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn format_dkk(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-{:.2} kr", amount.abs())
    } else {
        format!("{:.2} kr", amount)
    }
}

pub fn format_usd(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

pub fn format_pct(rate: Decimal) -> String {
    format!("{:.2}%", rate)
}
