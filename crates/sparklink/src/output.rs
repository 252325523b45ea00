use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sparklink::channel::ChannelStatus;
use sparklink::sexpr::{Expr, ExprNode};
use sparklink::RunSummary;

use crate::exit::{CliError, CliResult, USAGE};

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

#[derive(Serialize)]
struct FrameOutput<'a> {
    peer: &'a str,
    framing: &'a str,
    payload_size: usize,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<&'a ExprNode>,
    timestamp: String,
}

/// Print one received message. `tree` is set when the payload parsed.
pub fn print_frame(
    payload: &[u8],
    tree: Option<&ExprNode>,
    peer: &str,
    framing: &str,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                peer,
                framing,
                payload_size: payload.len(),
                payload: payload_preview(payload),
                tree,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["PEER", "SIZE", "SENSORS", "PAYLOAD"]);
            table.add_row(vec![
                peer.to_string(),
                payload.len().to_string(),
                tree.map(|tree| sensor_names(tree).join(" "))
                    .unwrap_or_else(|| "-".to_string()),
                payload_preview(payload),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "peer={} size={} payload={}",
                peer,
                payload.len(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
            println!();
        }
    }
}

/// Print a parsed document.
pub fn print_tree(tree: &ExprNode, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(tree),
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "HEAD", "CONTENT"]);
            for (index, child) in tree.children().iter().enumerate() {
                let (head, content) = match child {
                    Expr::Node(node) => (
                        node.head().unwrap_or("-").to_string(),
                        node.children()
                            .iter()
                            .skip(1)
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" "),
                    ),
                    Expr::Leaf(token) => ("-".to_string(), token.clone()),
                };
                table.add_row(vec![index.to_string(), head, content]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for child in tree.children() {
                println!("{child}");
            }
        }
        OutputFormat::Raw => println!("{tree}"),
    }
}

#[derive(Serialize)]
struct BytesOutput<'a> {
    operation: &'a str,
    input_size: usize,
    output_size: usize,
    hex: String,
}

/// Print the result of a byte transformation (SLIP encode/decode).
pub fn print_bytes(operation: &str, input_size: usize, output: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BytesOutput {
            operation,
            input_size,
            output_size: output.len(),
            hex: hex::encode(output),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["OPERATION", "IN", "OUT", "HEX"]);
            table.add_row(vec![
                operation.to_string(),
                input_size.to_string(),
                output.len().to_string(),
                hex::encode(output),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", hex::encode(output)),
        OutputFormat::Raw => print_raw(output),
    }
}

pub fn print_channels(channels: &[ChannelStatus], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&channels),
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut table = new_table(vec!["ID", "NAME", "KIND", "MAIN", "CONNECTION", "DATA", "LAST ERROR"]);
            for channel in channels {
                table.add_row(vec![
                    channel.id.to_string(),
                    channel.name.clone(),
                    format!("{:?}", channel.kind).to_lowercase(),
                    channel.main.to_string(),
                    channel.state.connection.as_str().to_string(),
                    format!("{:?}", channel.state.data),
                    channel.state.last_error.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Raw => {
            for channel in channels {
                println!("{} {}", channel.name, channel.state.connection.as_str());
            }
        }
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    summary: &'a RunSummary,
    sim_time_ms: Option<u64>,
    final_behavior: &'a str,
    channels: &'a [ChannelStatus],
}

pub fn print_run(
    summary: &RunSummary,
    sim_time_ms: Option<u64>,
    final_behavior: &str,
    channels: &[ChannelStatus],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&RunOutput {
            summary,
            sim_time_ms,
            final_behavior,
            channels,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut table = new_table(vec![
                "CYCLES",
                "PERCEPTIONS",
                "DECISIONS",
                "RECONNECTS",
                "LOST MAIN",
                "SIM TIME",
                "BEHAVIOR",
            ]);
            table.add_row(vec![
                summary.cycles.to_string(),
                summary.perceptions.to_string(),
                summary.decisions.to_string(),
                format!("{}/{}", summary.reconnects, summary.reconnect_attempts),
                summary.lost_main.to_string(),
                sim_time_ms.map_or_else(|| "-".to_string(), |ms| format!("{:.2}s", ms as f64 / 1000.0)),
                final_behavior.to_string(),
            ]);
            println!("{table}");
            print_channels(channels, format);
        }
        OutputFormat::Raw => println!("{}", summary.cycles),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn sensor_names(tree: &ExprNode) -> Vec<&str> {
    tree.nodes().filter_map(ExprNode::head).collect()
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

/// Parse hex digits, ignoring whitespace.
pub fn from_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    hex::decode(digits).map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
