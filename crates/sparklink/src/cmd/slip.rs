use sparklink::frame::slip;

use crate::cmd::{PayloadArgs, SlipCommand};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_bytes, OutputFormat};

pub fn run(command: SlipCommand, format: OutputFormat) -> CliResult<i32> {
    match command {
        SlipCommand::Encode(args) => {
            let input = require_payload(&args)?;
            let encoded = slip::encode(&input);
            print_bytes("encode", input.len(), &encoded, format);
        }
        SlipCommand::Decode(args) => {
            let input = require_payload(&args)?;
            let decoded =
                slip::decode(&input).map_err(|err| frame_error("invalid SLIP frame", err))?;
            print_bytes("decode", input.len(), &decoded, format);
        }
    }
    Ok(SUCCESS)
}

fn require_payload(args: &PayloadArgs) -> CliResult<Vec<u8>> {
    args.resolve()?
        .ok_or_else(|| CliError::new(USAGE, "one of --data, --hex or --file is required"))
}
