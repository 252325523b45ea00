use std::time::Duration;

use sparklink::frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use sparklink::sexpr;
use sparklink::transport::{Connector, TcpConnector};

use crate::cmd::SendArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = args
        .payload
        .resolve()?
        .ok_or_else(|| CliError::new(USAGE, "one of --data, --hex or --file is required"))?;

    let connector = TcpConnector::new(args.addr.as_str()).with_connect_timeout(wait_timeout);
    let stream = connector
        .connect()
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = connector.describe();
    let config = FrameConfig::default()
        .with_framing(args.framing)
        .with_read_timeout(Some(wait_timeout));

    let reader_stream = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;
    let mut writer = FrameWriter::with_config(stream, config.clone());
    writer
        .send(&payload)
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        let mut reader = FrameReader::with_config_stream(reader_stream, config)
            .map_err(|err| frame_error("receive failed", err))?;
        let reply = reader.read_frame().map_err(|err| match err {
            err if err.is_timeout() => CliError::new(TIMEOUT, format!("no reply within {wait_timeout:?}")),
            FrameError::ConnectionClosed => frame_error("peer closed before replying", err),
            err => frame_error("receive failed", err),
        })?;
        let tree = sexpr::parse_bytes(&reply).ok();
        print_frame(&reply, tree.as_ref(), &peer, args.framing.as_str(), format);
    }

    Ok(SUCCESS)
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}
