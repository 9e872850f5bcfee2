#[cfg(test)]
#[path = "csv_test.rs"]
mod tests;

use chrono::SecondsFormat;

use crate::models::Conversation;

use super::ExportError;

pub const HEADER: [&str; 3] = ["timestamp", "role", "content"];

/// One row per message. Quoting follows RFC 4180, so content holding
/// commas, quotes or line breaks survives a round trip through any
/// standard CSV reader.
pub fn render(conversation: &Conversation) -> Result<Vec<u8>, ExportError> {
    let mut writer = ::csv::WriterBuilder::new()
        .quote_style(::csv::QuoteStyle::Necessary)
        .from_writer(vec![]);

    writer.write_record(HEADER)?;
    for msg in conversation.messages() {
        writer.write_record([
            msg.timestamp()
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                .as_str(),
            msg.role().as_str(),
            msg.content(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| ExportError::Csv(::csv::Error::from(err.into_error())))
}
