use std::io::Read;

use sparklink::sexpr;

use crate::cmd::ParseArgs;
use crate::exit::{io_error, parse_error, CliResult, SUCCESS};
use crate::output::{print_tree, OutputFormat};

pub fn run(args: ParseArgs, format: OutputFormat) -> CliResult<i32> {
    let input = match (&args.message, args.payload.resolve()?) {
        (Some(message), _) => message.as_bytes().to_vec(),
        (None, Some(payload)) => payload,
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            buf
        }
    };

    let tree = sexpr::parse_bytes(trim_line_end(&input))
        .map_err(|err| parse_error("malformed message", err))?;
    print_tree(&tree, format);
    Ok(SUCCESS)
}

fn trim_line_end(input: &[u8]) -> &[u8] {
    let end = input
        .iter()
        .rposition(|byte| !matches!(byte, b'\n' | b'\r'))
        .map_or(0, |pos| pos + 1);
    &input[..end]
}
