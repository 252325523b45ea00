use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sparklink::frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use sparklink::sexpr;
use sparklink::transport::TcpServer;
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let server = TcpServer::bind(&args.addr).map_err(|err| transport_error("bind failed", err))?;
    if let Ok(addr) = server.local_addr() {
        info!(%addr, framing = %args.framing, "listening");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = FrameConfig::default().with_framing(args.framing);
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let stream = server
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let peer = stream
            .peer_description()
            .unwrap_or_else(|| "unknown".to_string());
        let mut writer = match &args.reply {
            Some(_) => Some(FrameWriter::with_config(
                stream
                    .try_clone()
                    .map_err(|err| transport_error("accept failed", err))?,
                config.clone(),
            )),
            None => None,
        };
        let mut reader = FrameReader::with_config(stream, config.clone());

        while running.load(Ordering::SeqCst) {
            let payload = match reader.read_frame() {
                Ok(payload) => payload,
                Err(FrameError::ConnectionClosed) => break,
                Err(err) if err.is_frame_local() => {
                    warn!(%peer, error = %err, "dropping malformed frame");
                    continue;
                }
                Err(err) => return Err(frame_error("receive failed", err)),
            };

            let tree = sexpr::parse_bytes(&payload).ok();
            print_frame(&payload, tree.as_ref(), &peer, args.framing.as_str(), format);
            printed = printed.saturating_add(1);

            if let (Some(writer), Some(reply)) = (writer.as_mut(), &args.reply) {
                writer
                    .send(reply.as_bytes())
                    .map_err(|err| frame_error("reply failed", err))?;
            }

            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
