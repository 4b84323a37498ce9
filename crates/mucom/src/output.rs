use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A record the CLI prints: serialized as one JSON object, shown as a
/// two-column table, a single `key=value` line, or just its primary field.
pub trait Record: Serialize {
    /// Ordered field names and display values.
    fn fields(&self) -> Vec<(&'static str, String)>;

    /// The value printed in raw mode.
    fn raw(&self) -> String;
}

pub fn print_record<R: Record>(record: &R, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in record.fields() {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = record
                .fields()
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
        OutputFormat::Raw => {
            println!("{}", record.raw());
        }
    }
    let _ = std::io::stdout().flush();
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[derive(Serialize)]
pub struct ValueOutput {
    pub id: u8,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: String,
    pub bytes: String,
}

impl Record for ValueOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.to_string()),
            ("type", self.value_type.clone()),
            ("value", self.value.clone()),
            ("bytes", self.bytes.clone()),
        ]
    }

    fn raw(&self) -> String {
        self.value.clone()
    }
}

#[derive(Serialize)]
pub struct FrameOutput {
    pub kind: String,
    pub id: u8,
    pub data_count: u8,
    pub payload: String,
    pub wire: String,
    pub wire_len: usize,
}

impl Record for FrameOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("kind", self.kind.clone()),
            ("id", self.id.to_string()),
            ("data_count", self.data_count.to_string()),
            ("payload", self.payload.clone()),
            ("wire", self.wire.clone()),
            ("wire_len", self.wire_len.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.wire.clone()
    }
}

/// Something the device emulator observed.
#[derive(Serialize)]
pub struct DeviceEvent {
    pub event: &'static str,
    pub id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub payload: String,
}

impl Record for DeviceEvent {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("event", self.event.to_string()), ("id", self.id.to_string())];
        if let Some(value) = &self.value {
            fields.push(("value", value.clone()));
        }
        fields.push(("payload", self.payload.clone()));
        fields
    }

    fn raw(&self) -> String {
        self.payload.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_output_serializes_type_field() {
        let out = ValueOutput {
            id: 5,
            value_type: "u16".to_string(),
            value: "4660".to_string(),
            bytes: "3412".to_string(),
        };
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(
            json,
            r#"{"id":5,"type":"u16","value":"4660","bytes":"3412"}"#
        );
        assert_eq!(out.raw(), "4660");
    }

    #[test]
    fn device_event_omits_missing_value() {
        let event = DeviceEvent {
            event: "execute",
            id: 237,
            value: None,
            payload: "43".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("value"));
        assert_eq!(event.fields().len(), 3);
    }
}
